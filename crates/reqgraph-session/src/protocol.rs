//! Resolver protocol definitions.
//!
//! Every message is one JSON text frame. A request envelope carries a
//! correlation id that the matching response echoes back.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Resolver method types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Method {
    ResolveRequest,
    QueryRequestsMetaInfo,
    Ping,
    SubmitAsync,
    GetAsyncStatus,
    GetAsyncErrorMessage,
    GetSubContexts,
    GetAsyncResponse,
    RequestCancellation,
    FinishAsync,
}

/// Expected type of a resolved value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultShape {
    #[default]
    String,
    Blob,
    Metadata,
    Json,
}

/// Parameters of a `resolve_request` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolveParams {
    pub graph: Value,
    pub result: ResultShape,
    #[serde(default)]
    pub remote: bool,
}

/// Parameters of a `submit_async` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmitParams {
    pub graph: Value,
    #[serde(default)]
    pub remote: bool,
}

/// Resolver-assigned handle of an asynchronously evaluated request.
pub type AsyncId = u64;

/// Parameters of the calls that address one async request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AsyncParams {
    pub async_id: AsyncId,
}

/// Parameters of a `get_async_response` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AsyncResponseParams {
    pub async_id: AsyncId,
    pub result: ResultShape,
}

/// Progress of an async request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AsyncStatus {
    Created,
    SubsRunning,
    SelfRunning,
    AwaitingResult,
    Cancelled,
    Finished,
    Error,
}

impl AsyncStatus {
    /// No further transitions happen from a final status.
    pub fn is_final(self) -> bool {
        matches!(self, Self::Cancelled | Self::Finished | Self::Error)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Created => "CREATED",
            Self::SubsRunning => "SUBS_RUNNING",
            Self::SelfRunning => "SELF_RUNNING",
            Self::AwaitingResult => "AWAITING_RESULT",
            Self::Cancelled => "CANCELLED",
            Self::Finished => "FINISHED",
            Self::Error => "ERROR",
        }
    }
}

impl std::fmt::Display for AsyncStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A child of an async request, as reported by `get_sub_contexts`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubContext {
    pub async_id: AsyncId,
    /// True for a request argument, false for a plain value.
    pub is_request: bool,
}

/// Request envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Request ID for correlation.
    pub id: String,
    pub method: Method,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl Envelope {
    /// Create a new envelope with auto-generated ID.
    pub fn new(method: Method) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            method,
            params: None,
        }
    }

    /// Create a new envelope with parameters.
    pub fn with_params(method: Method, params: Value) -> Self {
        Self {
            params: Some(params),
            ..Self::new(method)
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// Outcome carried by a response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Content {
    Value(Value),
    Error(Value),
}

/// Response envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    /// ID of the request this answers.
    pub id: String,
    pub content: Content,
}

impl Response {
    /// Create a successful response.
    pub fn value(id: &str, value: Value) -> Self {
        Self {
            id: id.to_string(),
            content: Content::Value(value),
        }
    }

    /// Create an error response with a structured payload.
    pub fn error(id: &str, payload: Value) -> Self {
        Self {
            id: id.to_string(),
            content: Content::Error(payload),
        }
    }

    /// Create an error response in the resolver's usual `{"unknown": msg}` form.
    pub fn unknown_error(id: &str, message: &str) -> Self {
        Self::error(id, serde_json::json!({ "unknown": message }))
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn is_success(&self) -> bool {
        matches!(self.content, Content::Value(_))
    }
}
