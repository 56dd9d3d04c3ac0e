/// Exported-method calls
///
/// A call is sugar over message passing, not a true RPC: the request travels
/// to the target's hub as an envelope, the hub runs the method between two
/// message deliveries, and the result travels back on a one-shot channel.
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use serde_json::Value;
use std::time::Duration;

use crate::error::BusError;

/// Outcome of an exported-method call
pub type CallResult = Result<Value, BusError>;

/// Where the result of a call should go
pub enum ReplyTo {
    /// A caller blocked in [`PendingCall::wait`]
    Wait(Sender<CallResult>),

    /// Post a `CallReply` message addressed to the calling component
    Message { caller: String, call_id: u64 },
}

/// A call on its way to the hub owning the target component
pub struct CallRequest {
    pub target: String,
    pub method: String,
    pub args: Vec<Value>,
    pub reply: ReplyTo,
}

impl CallRequest {
    /// Create a request whose result is waited for synchronously
    pub fn waiting(
        target: impl Into<String>,
        method: impl Into<String>,
        args: Vec<Value>,
    ) -> (Self, PendingCall) {
        let (tx, rx) = bounded(1);
        let request = Self {
            target: target.into(),
            method: method.into(),
            args,
            reply: ReplyTo::Wait(tx),
        };
        let pending = PendingCall {
            target: request.target.clone(),
            method: request.method.clone(),
            rx,
        };
        (request, pending)
    }

    /// Get a human-readable description of the call
    pub fn description(&self) -> String {
        format!("{}.{}({} args)", self.target, self.method, self.args.len())
    }
}

/// Caller side of a synchronous call
pub struct PendingCall {
    target: String,
    method: String,
    rx: Receiver<CallResult>,
}

impl PendingCall {
    /// Block the calling thread until the reply arrives or `timeout` elapses
    pub fn wait(self, timeout: Duration) -> CallResult {
        match self.rx.recv_timeout(timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => Err(BusError::CallTimeout {
                component: self.target,
                method: self.method,
            }),
            // The hub dropped the request without answering: it was closing
            Err(RecvTimeoutError::Disconnected) => Err(BusError::ComponentNotFound(self.target)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_call_description() {
        let (request, _pending) = CallRequest::waiting("toy", "set_power", vec![json!(0.5)]);
        assert_eq!(request.description(), "toy.set_power(1 args)");
    }

    #[test]
    fn test_pending_call_receives_reply() {
        let (request, pending) = CallRequest::waiting("toy", "is_active", vec![]);
        match request.reply {
            ReplyTo::Wait(tx) => tx.send(Ok(json!(true))).unwrap(),
            ReplyTo::Message { .. } => panic!("Expected a waiting reply"),
        }
        assert_eq!(pending.wait(Duration::from_secs(1)).unwrap(), json!(true));
    }

    #[test]
    fn test_pending_call_times_out() {
        let (_request, pending) = CallRequest::waiting("toy", "is_active", vec![]);
        match pending.wait(Duration::from_millis(10)) {
            Err(BusError::CallTimeout { component, method }) => {
                assert_eq!(component, "toy");
                assert_eq!(method, "is_active");
            }
            other => panic!("Expected timeout, got {:?}", other),
        }
    }

    #[test]
    fn test_dropped_request_reports_missing_component() {
        let (request, pending) = CallRequest::waiting("toy", "is_active", vec![]);
        drop(request);
        assert!(matches!(
            pending.wait(Duration::from_secs(1)),
            Err(BusError::ComponentNotFound(_))
        ));
    }
}
