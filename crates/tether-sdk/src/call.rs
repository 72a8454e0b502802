//! Call frames and deferred completions for native member bodies

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::convert::FromNative;
use crate::error::{NativeError, NativeResult};
use crate::value::{NativeValue, ObjectRef};

/// Native member body.
///
/// Constructors return the new object, getters return the property value,
/// setters read the new value from argument 0, and methods return their
/// result (or [`NativeValue::Null`]).
pub type NativeFn = Arc<dyn Fn(&mut NativeCall<'_>) -> NativeResult<NativeValue> + Send + Sync>;

// ============================================================================
// Call Frame
// ============================================================================

/// One invocation of a native member.
///
/// Carries the receiver, the converted script-visible arguments, the error
/// slot for members declaring an out-error, and the completer for deferred
/// members.
pub struct NativeCall<'a> {
    receiver: Option<&'a ObjectRef>,
    args: Vec<NativeValue>,
    error: Option<NativeError>,
    completer: Option<Completer>,
}

impl<'a> NativeCall<'a> {
    /// Create a call frame
    pub fn new(receiver: Option<&'a ObjectRef>, args: Vec<NativeValue>) -> Self {
        Self {
            receiver,
            args,
            error: None,
            completer: None,
        }
    }

    /// Attach the completer of a deferred member
    pub fn with_completer(mut self, completer: Completer) -> Self {
        self.completer = Some(completer);
        self
    }

    /// The receiver of an instance member
    pub fn receiver(&self) -> NativeResult<&'a ObjectRef> {
        self.receiver
            .ok_or_else(|| NativeError::argument("Instance member called without a receiver"))
    }

    /// The receiver downcast to its concrete native type
    pub fn this<T: Any>(&self) -> NativeResult<&'a T> {
        let receiver = self.receiver()?;
        receiver.downcast::<T>().ok_or_else(|| NativeError::TypeMismatch {
            expected: std::any::type_name::<T>().to_string(),
            got: receiver.type_name().to_string(),
        })
    }

    /// All arguments
    pub fn args(&self) -> &[NativeValue] {
        &self.args
    }

    /// Borrow argument `index`
    pub fn raw_arg(&self, index: usize) -> NativeResult<&NativeValue> {
        self.args.get(index).ok_or_else(|| {
            NativeError::argument(format!(
                "Missing argument {} (got {} arguments)",
                index,
                self.args.len()
            ))
        })
    }

    /// Convert argument `index` to `T`
    pub fn arg<T: FromNative>(&self, index: usize) -> NativeResult<T> {
        T::from_native(self.raw_arg(index)?)
    }

    /// Report failure through the out-error slot
    pub fn set_error(&mut self, error: impl Into<NativeError>) {
        self.error = Some(error.into());
    }

    /// Take the out-error slot
    pub fn take_error(&mut self) -> Option<NativeError> {
        self.error.take()
    }

    /// Take ownership of the completer.
    ///
    /// A deferred body that completes later (on another thread, say) takes the
    /// completer here. If the body leaves it in place, the bridge completes
    /// with the body's return value once the body returns.
    pub fn take_completer(&mut self) -> Option<Completer> {
        self.completer.take()
    }
}

impl fmt::Debug for NativeCall<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeCall")
            .field("receiver", &self.receiver)
            .field("args", &self.args)
            .field("error", &self.error)
            .field("deferred", &self.completer.is_some())
            .finish()
    }
}

// ============================================================================
// Deferred Completion
// ============================================================================

type SettleFn = Box<dyn FnOnce(NativeResult<NativeValue>) + Send>;

struct CompletionState {
    settle: Mutex<Option<SettleFn>>,
}

impl CompletionState {
    fn settle(&self, result: NativeResult<NativeValue>) -> bool {
        let pending = self.settle.lock().take();
        match pending {
            Some(settle) => {
                settle(result);
                true
            }
            None => false,
        }
    }
}

/// Completion callback of a deferred member.
///
/// Settles exactly once: by [`complete`](Completer::complete),
/// [`fail`](Completer::fail), or with [`NativeError::Dropped`] when dropped
/// unsettled.
pub struct Completer {
    state: Arc<CompletionState>,
}

impl Completer {
    /// Create a completer that delivers its outcome to `settle`
    pub fn new(settle: impl FnOnce(NativeResult<NativeValue>) + Send + 'static) -> Self {
        Self {
            state: Arc::new(CompletionState {
                settle: Mutex::new(Some(Box::new(settle))),
            }),
        }
    }

    /// A handle that can settle the same completion
    pub fn handle(&self) -> CompletionHandle {
        CompletionHandle {
            state: self.state.clone(),
        }
    }

    /// Complete successfully with a value
    pub fn complete(self, value: impl Into<NativeValue>) {
        self.finish(Ok(value.into()));
    }

    /// Complete with a failure
    pub fn fail(self, error: impl Into<NativeError>) {
        self.finish(Err(error.into()));
    }

    /// Complete with a result
    pub fn finish(self, result: NativeResult<NativeValue>) {
        if !self.state.settle(result) {
            tracing::warn!("deferred completion settled more than once; later outcome ignored");
        }
    }
}

impl Drop for Completer {
    fn drop(&mut self) {
        self.state.settle(Err(NativeError::Dropped));
    }
}

impl fmt::Debug for Completer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Completer")
            .field("settled", &self.state.settle.lock().is_none())
            .finish()
    }
}

/// Shared handle to a [`Completer`]'s completion.
#[derive(Clone)]
pub struct CompletionHandle {
    state: Arc<CompletionState>,
}

impl CompletionHandle {
    /// Settle the completion, returning false if it was already settled
    pub fn settle(&self, result: NativeResult<NativeValue>) -> bool {
        self.state.settle(result)
    }

    /// Check if the completion was settled
    pub fn is_settled(&self) -> bool {
        self.state.settle.lock().is_none()
    }
}
