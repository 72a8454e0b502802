//! Execution of a selected member under its calling convention

use std::fmt;
use std::sync::Arc;

use tether_sdk::{
    CallConvention, Completer, CompletionStyle, MemberDescriptor, NativeCall, NativeError,
    NativeValue, ObjectRef, TypeRef,
};

use super::{call_guarded, Reply};
use crate::error::{BridgeError, BridgeResult};
use crate::marshal::Marshaller;
use crate::ScriptValue;

/// A selected member with converted arguments, ready to run
pub struct ResolvedInvocation {
    marshaller: Arc<Marshaller>,
    label: String,
    member: Arc<MemberDescriptor>,
    receiver: Option<ObjectRef>,
    args: Vec<NativeValue>,
}

impl ResolvedInvocation {
    pub(crate) fn new(
        marshaller: Arc<Marshaller>,
        label: String,
        member: Arc<MemberDescriptor>,
        receiver: Option<ObjectRef>,
        args: Vec<NativeValue>,
    ) -> Self {
        Self {
            marshaller,
            label,
            member,
            receiver,
            args,
        }
    }

    /// The selected member
    pub fn member(&self) -> &MemberDescriptor {
        &self.member
    }

    /// Converted arguments
    pub fn args(&self) -> &[NativeValue] {
        &self.args
    }

    /// Run a synchronous member and return its native result
    pub fn call(self) -> BridgeResult<NativeValue> {
        if self.member.convention.is_deferred() {
            return Err(BridgeError::invalid(format!(
                "{} completes asynchronously and must be invoked with a reply",
                self.label
            )));
        }
        let body = self
            .member
            .body
            .clone()
            .ok_or_else(|| BridgeError::NotImplemented(self.label.clone()))?;

        let mut call = NativeCall::new(self.receiver.as_ref(), self.args);
        let result = call_guarded(&body, &mut call);
        let out_error = match self.member.convention {
            CallConvention::ErrorOut => call.take_error(),
            _ => None,
        };
        match (result, out_error) {
            (Err(e), _) | (Ok(_), Some(e)) => Err(native_failure(&self.label, e)),
            (Ok(value), None) => Ok(value),
        }
    }

    /// Run a synchronous member and marshal its result
    pub fn call_to_script(self) -> BridgeResult<ScriptValue> {
        let marshaller = self.marshaller.clone();
        let returns = self.member.returns.clone();
        let value = self.call()?;
        marshal_result(&marshaller, &value, returns.as_ref())
    }

    /// Run the member, delivering its outcome through `reply`.
    ///
    /// Synchronous members fail synchronously: the error is returned and
    /// `reply` never fires. Deferred members always report through `reply`,
    /// even when the body fails before returning.
    pub fn invoke(self, reply: Reply) -> BridgeResult<()> {
        let Some(style) = self.member.convention.completion() else {
            let value = self.call_to_script()?;
            reply.succeed(value);
            return Ok(());
        };
        let body = self
            .member
            .body
            .clone()
            .ok_or_else(|| BridgeError::NotImplemented(self.label.clone()))?;

        let marshaller = self.marshaller.clone();
        let returns = self.member.returns.clone();
        let label = self.label.clone();
        let completer = Completer::new(move |outcome| match outcome {
            Ok(value) => {
                let delivered = match style {
                    CompletionStyle::ThenCatch => Ok(ScriptValue::Null),
                    CompletionStyle::ResultCatch => {
                        marshal_result(&marshaller, &value, returns.as_ref())
                    }
                };
                reply.deliver(delivered);
            }
            Err(e) => reply.fail(native_failure(&label, e)),
        });
        let handle = completer.handle();

        let mut call = NativeCall::new(self.receiver.as_ref(), self.args).with_completer(completer);
        let result = call_guarded(&body, &mut call);
        let out_error = if self.member.convention.has_out_error() {
            call.take_error()
        } else {
            None
        };
        // Settle before the pending completer drops, or it reports Dropped
        let pending = call.take_completer();

        match (result, out_error) {
            (Err(e), _) | (Ok(_), Some(e)) => {
                if !handle.settle(Err(e)) {
                    tracing::warn!(member = %self.label, "failure raised after the call completed");
                }
                drop(pending);
            }
            (Ok(value), None) => {
                if let Some(completer) = pending {
                    completer.complete(value);
                }
            }
        }
        Ok(())
    }
}

fn marshal_result(
    marshaller: &Marshaller,
    value: &NativeValue,
    returns: Option<&TypeRef>,
) -> BridgeResult<ScriptValue> {
    match returns {
        Some(ty) => Ok(marshaller.to_script(value, ty)?),
        None => Ok(ScriptValue::Null),
    }
}

fn native_failure(label: &str, error: NativeError) -> BridgeError {
    tracing::error!(member = %label, error = %error, "native member failed");
    BridgeError::NativeFailure(error)
}

impl fmt::Debug for ResolvedInvocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedInvocation")
            .field("member", &self.label)
            .field("receiver", &self.receiver)
            .field("args", &self.args)
            .finish()
    }
}
