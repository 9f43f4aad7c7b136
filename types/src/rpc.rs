//! JSON-RPC envelopes exchanged with a proxy over its text frames.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::RequestId;

pub const JSONRPC_VERSION: &str = "2.0";

/// Outbound request envelope.
///
/// `params` is omitted from the wire entirely when absent, never sent as
/// `null`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RpcRequest {
    pub jsonrpc: &'static str,
    pub id: RequestId,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl RpcRequest {
    pub fn new(id: RequestId, method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id,
            method: method.into(),
            params,
        }
    }
}

/// Error object embedded in a failed response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteError {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<i64>,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RpcOutcome {
    Result(Value),
    Error(RemoteError),
    /// The frame carried an id but neither `result` nor `error`.
    Missing,
}

/// Inbound response envelope, correlated by `id`.
#[derive(Debug, Clone, PartialEq)]
pub struct RpcResponse {
    pub id: RequestId,
    pub outcome: RpcOutcome,
}

impl RpcResponse {
    #[must_use]
    pub fn success(id: RequestId, result: Value) -> Self {
        Self {
            id,
            outcome: RpcOutcome::Result(result),
        }
    }

    #[must_use]
    pub fn failure(id: RequestId, message: impl Into<String>) -> Self {
        Self {
            id,
            outcome: RpcOutcome::Error(RemoteError {
                code: None,
                message: message.into(),
            }),
        }
    }

    /// Parse a text frame.
    ///
    /// Returns `None` when the frame cannot be correlated at all: not JSON,
    /// not an object, or no unsigned integer `id`.
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        let frame: Value = serde_json::from_str(text).ok()?;
        Self::from_value(&frame)
    }

    #[must_use]
    pub fn from_value(frame: &Value) -> Option<Self> {
        let id = RequestId::new(frame.get("id")?.as_u64()?);

        let outcome = if let Some(error) = frame.get("error") {
            let remote = serde_json::from_value::<RemoteError>(error.clone()).unwrap_or_else(|_| {
                RemoteError {
                    code: None,
                    message: error.to_string(),
                }
            });
            RpcOutcome::Error(remote)
        } else if let Some(result) = frame.get("result") {
            RpcOutcome::Result(result.clone())
        } else {
            RpcOutcome::Missing
        };

        Some(Self { id, outcome })
    }

    /// Serialize back to the wire shape (`{"jsonrpc","id","result"|"error"}`).
    #[must_use]
    pub fn to_value(&self) -> Value {
        let mut frame = serde_json::json!({
            "jsonrpc": JSONRPC_VERSION,
            "id": self.id,
        });
        match &self.outcome {
            RpcOutcome::Result(result) => {
                frame["result"] = result.clone();
            }
            RpcOutcome::Error(error) => {
                frame["error"] = serde_json::to_value(error).unwrap_or(Value::Null);
            }
            RpcOutcome::Missing => {}
        }
        frame
    }
}
