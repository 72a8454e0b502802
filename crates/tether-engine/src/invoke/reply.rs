//! One-shot result delivery to script code

use std::fmt;

use crate::error::{BridgeError, BridgeResult};
use crate::ScriptValue;

type SuccessFn = Box<dyn FnOnce(ScriptValue) + Send>;
type FailureFn = Box<dyn FnOnce(BridgeError) + Send>;
type OutcomeFn = Box<dyn FnOnce(BridgeResult<ScriptValue>) + Send>;

enum Callbacks {
    Split { success: SuccessFn, failure: FailureFn },
    Single(OutcomeFn),
}

/// Success and failure callbacks of one script call.
///
/// Consumed on delivery, so exactly one of them fires exactly once.
pub struct Reply {
    callbacks: Callbacks,
}

impl Reply {
    /// Create from separate success and failure callbacks
    pub fn new(
        success: impl FnOnce(ScriptValue) + Send + 'static,
        failure: impl FnOnce(BridgeError) + Send + 'static,
    ) -> Self {
        Self {
            callbacks: Callbacks::Split {
                success: Box::new(success),
                failure: Box::new(failure),
            },
        }
    }

    /// Create from a single callback receiving the outcome
    pub fn from_fn(outcome: impl FnOnce(BridgeResult<ScriptValue>) + Send + 'static) -> Self {
        Self {
            callbacks: Callbacks::Single(Box::new(outcome)),
        }
    }

    /// Deliver success
    pub fn succeed(self, value: ScriptValue) {
        self.deliver(Ok(value));
    }

    /// Deliver failure
    pub fn fail(self, error: BridgeError) {
        self.deliver(Err(error));
    }

    /// Deliver an outcome
    pub fn deliver(self, outcome: BridgeResult<ScriptValue>) {
        match (self.callbacks, outcome) {
            (Callbacks::Split { success, .. }, Ok(value)) => success(value),
            (Callbacks::Split { failure, .. }, Err(error)) => failure(error),
            (Callbacks::Single(callback), outcome) => callback(outcome),
        }
    }
}

impl fmt::Debug for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let shape = match self.callbacks {
            Callbacks::Split { .. } => "split",
            Callbacks::Single(_) => "single",
        };
        f.debug_struct("Reply").field("callbacks", &shape).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use serde_json::json;
    use std::sync::Arc;

    #[test]
    fn test_split_callbacks() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let (ok, err) = (seen.clone(), seen.clone());
        let reply = Reply::new(
            move |v| ok.lock().push(format!("ok {}", v)),
            move |e| err.lock().push(format!("err {}", e.code())),
        );
        reply.fail(BridgeError::MemberNotFound("x".into()));
        assert_eq!(*seen.lock(), vec!["err MemberNotFound".to_string()]);
    }

    #[test]
    fn test_single_callback() {
        let seen = Arc::new(Mutex::new(None));
        let sink = seen.clone();
        Reply::from_fn(move |r| *sink.lock() = Some(r)).succeed(json!(1));
        assert_eq!(*seen.lock(), Some(Ok(json!(1))));
    }
}
