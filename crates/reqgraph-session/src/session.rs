//! Resolver session.

use crate::protocol::{
    AsyncId, AsyncParams, AsyncResponseParams, AsyncStatus, Content, Envelope, Method,
    ResolveParams, Response, ResultShape, SubContext, SubmitParams,
};
use crate::transport::{ConnectPolicy, Transport, WebSocketTransport};
use crate::{ResolverError, SessionError, SessionResult};
use reqgraph_types::codec::from_base64;
use reqgraph_types::{wire, BlobPayload, FunctionId, NodeId, RequestGraph};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashSet};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Session configuration.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Resolver WebSocket URL.
    pub url: String,
    /// Context identifier; a fresh one is generated when unset.
    pub context_id: Option<String>,
    /// Version tag for function ids; asked from the resolver when unset.
    pub version_tag: Option<String>,
    pub connect: ConnectPolicy,
    /// Upper bound for one request/response exchange.
    pub request_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            url: "ws://localhost:41071".to_string(),
            context_id: None,
            version_tag: None,
            connect: ConnectPolicy::default(),
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// Where the resolver should evaluate a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Target {
    #[default]
    Local,
    Remote,
}

impl Target {
    pub fn is_remote(self) -> bool {
        self == Self::Remote
    }
}

/// A decoded resolver result.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedValue {
    String(String),
    Blob(Vec<u8>),
    Metadata(BTreeMap<String, String>),
    Json(Value),
}

impl ResolvedValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Blob(bytes) => Some(bytes),
            _ => None,
        }
    }

    pub fn as_metadata(&self) -> Option<&BTreeMap<String, String>> {
        match self {
            Self::Metadata(map) => Some(map),
            _ => None,
        }
    }

    /// JSON rendering of the value; blobs become base64 text.
    pub fn to_json(&self) -> Value {
        match self {
            Self::String(s) => Value::String(s.clone()),
            Self::Blob(bytes) => Value::String(reqgraph_types::codec::to_base64(bytes)),
            Self::Metadata(map) => map
                .iter()
                .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                .collect::<serde_json::Map<_, _>>()
                .into(),
            Self::Json(value) => value.clone(),
        }
    }
}

/// Resolver build information.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetaInfo {
    /// Revision of the resolver build, used as the version tag.
    pub git_version: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

/// A connection to one resolver with a fixed context and version.
pub struct Session {
    context_id: String,
    version_tag: String,
    transport: Box<dyn Transport>,
    request_timeout: Duration,
    /// Ids of timed out requests whose replies may still be in flight.
    abandoned: Mutex<HashSet<String>>,
}

impl Session {
    /// Connect to the resolver at `config.url`.
    pub async fn connect(config: SessionConfig) -> SessionResult<Self> {
        let transport = WebSocketTransport::connect(&config.url, &config.connect).await?;
        Self::with_transport(Box::new(transport), config).await
    }

    /// Build a session over an already established transport.
    pub async fn with_transport(
        transport: Box<dyn Transport>,
        config: SessionConfig,
    ) -> SessionResult<Self> {
        let mut session = Self {
            context_id: config
                .context_id
                .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            version_tag: String::new(),
            transport,
            request_timeout: config.request_timeout,
            abandoned: Mutex::new(HashSet::new()),
        };
        session.version_tag = match config.version_tag {
            Some(tag) => tag,
            None => session.query_meta_info().await?.git_version,
        };
        info!(
            context_id = %session.context_id,
            version_tag = %session.version_tag,
            "Session ready"
        );
        Ok(session)
    }

    pub fn context_id(&self) -> &str {
        &self.context_id
    }

    pub fn version_tag(&self) -> &str {
        &self.version_tag
    }

    /// Function id bound to this session's resolver revision.
    pub fn function_id(&self, name: &str) -> FunctionId {
        FunctionId::versioned(name, &self.version_tag)
    }

    /// Resolve the request rooted at `root`.
    ///
    /// The graph is encoded before anything is sent, so a cyclic or dangling
    /// graph fails without touching the transport.
    pub async fn resolve(
        &self,
        graph: &RequestGraph,
        root: NodeId,
        shape: ResultShape,
        target: Target,
    ) -> SessionResult<ResolvedValue> {
        let encoded = wire::encode(graph, root, Some(&self.context_id))?;
        debug!(nodes = graph.len(), ?shape, ?target, "Resolving request");
        self.resolve_raw(encoded, shape, target).await
    }

    /// Submit an already encoded graph unchanged.
    pub async fn resolve_raw(
        &self,
        graph: Value,
        shape: ResultShape,
        target: Target,
    ) -> SessionResult<ResolvedValue> {
        let params = ResolveParams {
            graph,
            result: shape,
            remote: target.is_remote(),
        };
        let value = self
            .call(Method::ResolveRequest, Some(serde_json::to_value(params)?))
            .await?;
        decode_result(value, shape)
    }

    /// Resolver compatibility identifier.
    pub async fn ping(&self) -> SessionResult<String> {
        match self.call(Method::Ping, None).await? {
            Value::String(pong) => Ok(pong),
            other => Err(SessionError::Protocol(format!(
                "expected a string ping reply, got {other}"
            ))),
        }
    }

    pub async fn query_meta_info(&self) -> SessionResult<MetaInfo> {
        let value = self.call(Method::QueryRequestsMetaInfo, None).await?;
        Ok(serde_json::from_value(value)?)
    }

    /// Submit the request rooted at `root` without waiting for its result.
    pub async fn submit_async(
        &self,
        graph: &RequestGraph,
        root: NodeId,
        target: Target,
    ) -> SessionResult<AsyncId> {
        let encoded = wire::encode(graph, root, Some(&self.context_id))?;
        self.submit_async_raw(encoded, target).await
    }

    /// Submit an already encoded graph without waiting for its result.
    pub async fn submit_async_raw(&self, graph: Value, target: Target) -> SessionResult<AsyncId> {
        let params = SubmitParams {
            graph,
            remote: target.is_remote(),
        };
        let value = self
            .call(Method::SubmitAsync, Some(serde_json::to_value(params)?))
            .await?;
        let async_id: AsyncId = serde_json::from_value(value)?;
        info!(async_id, ?target, "Request submitted");
        Ok(async_id)
    }

    pub async fn async_status(&self, id: AsyncId) -> SessionResult<AsyncStatus> {
        let value = self.call_async(Method::GetAsyncStatus, id).await?;
        Ok(serde_json::from_value(value)?)
    }

    /// Error message of an async request whose status is `ERROR`.
    pub async fn async_error_message(&self, id: AsyncId) -> SessionResult<String> {
        let value = self.call_async(Method::GetAsyncErrorMessage, id).await?;
        Ok(serde_json::from_value(value)?)
    }

    /// Child requests and values the resolver created for `id`.
    pub async fn sub_contexts(&self, id: AsyncId) -> SessionResult<Vec<SubContext>> {
        let value = self.call_async(Method::GetSubContexts, id).await?;
        Ok(serde_json::from_value(value)?)
    }

    /// Result of a finished async request.
    pub async fn async_response(
        &self,
        id: AsyncId,
        shape: ResultShape,
    ) -> SessionResult<ResolvedValue> {
        let params = AsyncResponseParams {
            async_id: id,
            result: shape,
        };
        let value = self
            .call(Method::GetAsyncResponse, Some(serde_json::to_value(params)?))
            .await?;
        decode_result(value, shape)
    }

    /// Ask the resolver to stop working on `id`. Cancelling a request that
    /// already reached a final status has no effect.
    pub async fn request_cancellation(&self, id: AsyncId) -> SessionResult<()> {
        self.call_async(Method::RequestCancellation, id).await?;
        info!(async_id = id, "Cancellation requested");
        Ok(())
    }

    /// Release the resolver's bookkeeping for `id`.
    pub async fn finish_async(&self, id: AsyncId) -> SessionResult<()> {
        self.call_async(Method::FinishAsync, id).await?;
        Ok(())
    }

    /// Poll the status of `id` every `poll` until it is final.
    ///
    /// Only `FINISHED` counts as success; a cancelled or failed request is
    /// reported as an error carrying the resolver's message.
    pub async fn wait_for_async(&self, id: AsyncId, poll: Duration) -> SessionResult<()> {
        loop {
            let status = self.async_status(id).await?;
            debug!(async_id = id, %status, "Polled async status");
            match status {
                AsyncStatus::Finished => return Ok(()),
                AsyncStatus::Cancelled => return Err(SessionError::AsyncCancelled(id)),
                AsyncStatus::Error => {
                    let message = self.async_error_message(id).await?;
                    return Err(SessionError::AsyncFailed { id, message });
                }
                _ => tokio::time::sleep(poll).await,
            }
        }
    }

    pub async fn close(&self) -> SessionResult<()> {
        self.transport.close().await
    }

    /// Send `message` and read replies until the one for `id` arrives.
    ///
    /// Replies to abandoned requests are dropped; any other id is a protocol
    /// error.
    async fn exchange(&self, id: &str, message: String) -> SessionResult<Response> {
        let mut reply = self.transport.round_trip(message).await?;
        loop {
            let response = Response::from_json(&reply)?;
            if response.id == id {
                return Ok(response);
            }
            if !self.abandoned.lock().remove(&response.id) {
                return Err(SessionError::Protocol(format!(
                    "response id {} does not match request id {}",
                    response.id, id
                )));
            }
            debug!(id = %id, stale = %response.id, "Dropping reply to a timed out request");
            reply = self.transport.receive().await?;
        }
    }

    async fn call_async(&self, method: Method, id: AsyncId) -> SessionResult<Value> {
        let params = serde_json::to_value(AsyncParams { async_id: id })?;
        self.call(method, Some(params)).await
    }

    async fn call(&self, method: Method, params: Option<Value>) -> SessionResult<Value> {
        let envelope = match params {
            Some(params) => Envelope::with_params(method, params),
            None => Envelope::new(method),
        };
        let message = envelope.to_json()?;

        let exchange = self.exchange(&envelope.id, message);
        let response = match tokio::time::timeout(self.request_timeout, exchange).await {
            Ok(response) => response?,
            Err(_) => {
                // The reply may still arrive; remember to skip it.
                self.abandoned.lock().insert(envelope.id.clone());
                warn!(id = %envelope.id, ?method, "Request timed out");
                return Err(SessionError::Timeout(self.request_timeout));
            }
        };

        match response.content {
            Content::Value(value) => Ok(value),
            Content::Error(payload) => {
                let err = ResolverError::from_payload(payload);
                warn!(id = %envelope.id, kind = %err.kind, message = %err.message, "Resolver reported an error");
                Err(err.into())
            }
        }
    }
}

fn decode_result(value: Value, shape: ResultShape) -> SessionResult<ResolvedValue> {
    match shape {
        ResultShape::String => match value {
            Value::String(s) => Ok(ResolvedValue::String(s)),
            other => Err(unexpected("string", &other)),
        },
        ResultShape::Blob => match value {
            Value::String(text) => Ok(ResolvedValue::Blob(from_base64(&text)?)),
            Value::Object(_) => {
                let payload: BlobPayload = serde_json::from_value(value)?;
                Ok(ResolvedValue::Blob(payload.bytes()?))
            }
            other => Err(unexpected("blob", &other)),
        },
        ResultShape::Metadata => match value {
            Value::Object(object) => Ok(ResolvedValue::Metadata(
                object
                    .into_iter()
                    .map(|(k, v)| match v {
                        Value::String(s) => (k, s),
                        other => (k, other.to_string()),
                    })
                    .collect(),
            )),
            other => Err(unexpected("metadata map", &other)),
        },
        ResultShape::Json => Ok(ResolvedValue::Json(value)),
    }
}

fn unexpected(expected: &str, got: &Value) -> SessionError {
    SessionError::Protocol(format!("expected a {expected} result, got {got}"))
}
