//! JSON-RPC request ids and response matching over a [`Transport`].

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use proxyprobe_core::{Armed, SettleError, arm_event};
use proxyprobe_types::{RequestId, RpcOutcome, RpcRequest, RpcResponse};
use serde_json::Value;
use thiserror::Error;

use crate::transport::{Frame, Transport, TransportError, TransportEvent};

#[derive(Debug, Error)]
pub enum RpcError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("waiting for response: {0}")]
    Settle(#[from] SettleError),
    #[error("remote error{}: {message}", .code.map(|c| format!(" {c}")).unwrap_or_default())]
    Remote { code: Option<i64>, message: String },
    #[error("response {id} carried neither result nor error")]
    Malformed { id: RequestId },
    #[error("encoding request: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Monotonic request ids, starting at zero.
#[derive(Debug, Default)]
pub struct RpcCounter {
    next: AtomicU64,
}

impl RpcCounter {
    #[must_use]
    pub fn new() -> Self {
        Self::starting_at(0)
    }

    #[must_use]
    pub fn starting_at(first: u64) -> Self {
        Self {
            next: AtomicU64::new(first),
        }
    }

    pub fn next_id(&self) -> RequestId {
        RequestId::new(self.next.fetch_add(1, Ordering::Relaxed))
    }
}

/// Request/response correlation for one transport.
///
/// Responses are matched by `id` only. Frames that are binary, not JSON, or
/// carry another id are ignored by a pending wait.
pub struct RpcChannel {
    transport: Arc<dyn Transport>,
    counter: RpcCounter,
}

impl RpcChannel {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self::with_counter(transport, RpcCounter::new())
    }

    pub fn with_counter(transport: Arc<dyn Transport>, counter: RpcCounter) -> Self {
        Self { transport, counter }
    }

    #[must_use]
    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    /// Build a request with the next id. Nothing is sent.
    pub fn prepare(&self, method: &str, params: Option<Value>) -> RpcRequest {
        RpcRequest::new(self.counter.next_id(), method, params)
    }

    pub fn send(&self, request: &RpcRequest) -> Result<(), RpcError> {
        let text = serde_json::to_string(request)?;
        self.transport.send(Frame::Text(text))?;
        Ok(())
    }

    /// Register for the response to `id` without waiting yet.
    pub fn arm_response(&self, id: RequestId, timeout: Duration) -> Armed<RpcOutcome> {
        arm_event(self.transport.events(), Some(timeout), move |event| match event {
            TransportEvent::Message(Frame::Text(text)) => {
                let response = RpcResponse::parse(text)?;
                if response.id != id {
                    tracing::trace!(%id, got = %response.id, "ignoring response for another request");
                    return None;
                }
                Some(Ok(response.outcome))
            }
            TransportEvent::Message(Frame::Binary(_)) | TransportEvent::Open => None,
            TransportEvent::Error(reason) => Some(Err(SettleError::Error(reason.clone()))),
            TransportEvent::Close => Some(Err(SettleError::Closed)),
        })
    }

    /// Wait for the response to a request that was already sent.
    ///
    /// A response that arrived before this call is not seen; prefer
    /// [`request`](Self::request) or [`arm_response`](Self::arm_response).
    pub async fn await_response(&self, id: RequestId, timeout: Duration) -> Result<Value, RpcError> {
        let outcome = self.arm_response(id, timeout).wait().await;
        into_result(id, outcome)
    }

    /// Send `method` and wait for its response.
    pub async fn request(
        &self,
        method: &str,
        params: Option<Value>,
        timeout: Duration,
    ) -> Result<Value, RpcError> {
        let request = self.prepare(method, params);
        let id = request.id;
        let armed = self.arm_response(id, timeout);
        self.send(&request)?;
        tracing::debug!(%id, method, "sent request");
        let outcome = armed.wait().await;
        into_result(id, outcome)
    }
}

fn into_result(id: RequestId, outcome: Result<RpcOutcome, SettleError>) -> Result<Value, RpcError> {
    match outcome? {
        RpcOutcome::Result(value) => Ok(value),
        RpcOutcome::Error(remote) => Err(RpcError::Remote {
            code: remote.code,
            message: remote.message,
        }),
        RpcOutcome::Missing => Err(RpcError::Malformed { id }),
    }
}
