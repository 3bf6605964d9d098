//! In-process resolver used by the integration tests.
//!
//! It evaluates the object-store functions against an in-memory store. The
//! sample value `("abc", "def", "ghi")` gets the ids recorded from a real
//! object store so tests can assert on them; other values get ids derived
//! from their content.

#![allow(dead_code)]

use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use reqgraph_session::protocol::{
    AsyncParams, AsyncResponseParams, ResolveParams, SubContext, SubmitParams,
};
use reqgraph_session::requests::{
    GET_OBJECT_METADATA, POST_OBJECT, RESOLVE_OBJECT_TO_IMMUTABLE, RETRIEVE_IMMUTABLE_OBJECT,
};
use reqgraph_session::{AsyncId, AsyncStatus, Envelope, LoopbackTransport, Method, Response};
use reqgraph_types::codec::to_base64;
use reqgraph_types::{wire, Arg, BlobPayload, GraphError, NodeId, RequestGraph};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message;

pub const GIT_VERSION: &str = "gb6df901-dirty";
pub const SAMPLE_OBJECT_ID: &str = "61e8256000c030b6c41dffee788df15f";
pub const SAMPLE_IMMUTABLE_ID: &str = "61e8255f01c0e555298e8c7360a98955";
pub const SAMPLE_BYTES: &[u8] = b"\x93\xa3abc\xa3def\xa3ghi";

#[derive(Default)]
struct Store {
    // object id -> (schema, immutable id)
    objects: HashMap<String, (String, String)>,
    // immutable id -> bytes
    immutables: HashMap<String, Vec<u8>>,
}

/// An async request. Its outcome is computed on submission and revealed one
/// status step per poll.
struct Job {
    status: AsyncStatus,
    outcome: Result<Value, String>,
    children: Vec<SubContext>,
}

#[derive(Default)]
pub struct FakeResolver {
    store: Mutex<Store>,
    resolve_calls: AtomicUsize,
    jobs: Mutex<HashMap<AsyncId, Job>>,
    next_async_id: AtomicU64,
    hold_jobs: AtomicBool,
}

impl FakeResolver {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn transport(self: &Arc<Self>) -> LoopbackTransport {
        let resolver = Arc::clone(self);
        LoopbackTransport::from_fn(move |message| resolver.handle(message))
    }

    /// Number of `resolve_request` envelopes received.
    pub fn resolve_calls(&self) -> usize {
        self.resolve_calls.load(Ordering::SeqCst)
    }

    /// Keep async requests running until cancelled.
    pub fn hold_jobs(&self) {
        self.hold_jobs.store(true, Ordering::SeqCst);
    }

    /// Number of async requests not yet finished by the client.
    pub fn open_jobs(&self) -> usize {
        self.jobs.lock().len()
    }

    pub fn handle(&self, message: &str) -> String {
        let response = match Envelope::from_json(message) {
            Ok(envelope) => match self.dispatch(&envelope) {
                Ok(value) => Response::value(&envelope.id, value),
                Err(message) => Response::unknown_error(&envelope.id, &message),
            },
            Err(e) => Response::unknown_error("", &e.to_string()),
        };
        serde_json::to_string(&response).unwrap()
    }

    fn dispatch(&self, envelope: &Envelope) -> Result<Value, String> {
        match envelope.method {
            Method::Ping => Ok(json!("fake-resolver")),
            Method::QueryRequestsMetaInfo => Ok(json!({"git_version": GIT_VERSION})),
            Method::ResolveRequest => {
                self.resolve_calls.fetch_add(1, Ordering::SeqCst);
                let params: ResolveParams = params(envelope)?;
                self.evaluate(&params.graph)
            }
            Method::SubmitAsync => {
                let params: SubmitParams = params(envelope)?;
                Ok(json!(self.submit(&params.graph)))
            }
            Method::GetAsyncStatus => {
                let AsyncParams { async_id } = params(envelope)?;
                let held = self.hold_jobs.load(Ordering::SeqCst);
                self.with_job(async_id, |job| {
                    job.status = match (job.status, &job.outcome) {
                        (status, _) if status.is_final() => status,
                        (_, _) if held => AsyncStatus::SubsRunning,
                        (AsyncStatus::Created, _) => AsyncStatus::SubsRunning,
                        (_, Ok(_)) => AsyncStatus::Finished,
                        (_, Err(_)) => AsyncStatus::Error,
                    };
                    Ok(json!(job.status))
                })
            }
            Method::GetAsyncErrorMessage => {
                let AsyncParams { async_id } = params(envelope)?;
                self.with_job(async_id, |job| match (job.status, &job.outcome) {
                    (AsyncStatus::Error, Err(message)) => Ok(json!(message)),
                    _ => Err(format!("async request {async_id} did not fail")),
                })
            }
            Method::GetSubContexts => {
                let AsyncParams { async_id } = params(envelope)?;
                self.with_job(async_id, |job| Ok(json!(job.children)))
            }
            Method::GetAsyncResponse => {
                let AsyncResponseParams { async_id, .. } = params(envelope)?;
                self.with_job(async_id, |job| match (job.status, &job.outcome) {
                    (AsyncStatus::Finished, Ok(value)) => Ok(value.clone()),
                    (status, _) => Err(format!("async request {async_id} is {status}")),
                })
            }
            Method::RequestCancellation => {
                let AsyncParams { async_id } = params(envelope)?;
                self.with_job(async_id, |job| {
                    if !job.status.is_final() {
                        job.status = AsyncStatus::Cancelled;
                    }
                    Ok(Value::Null)
                })
            }
            Method::FinishAsync => {
                let AsyncParams { async_id } = params(envelope)?;
                self.jobs
                    .lock()
                    .remove(&async_id)
                    .map(|_| Value::Null)
                    .ok_or_else(|| format!("unknown async request {async_id}"))
            }
        }
    }

    fn evaluate(&self, graph: &Value) -> Result<Value, String> {
        let decoded = wire::decode_with_context(graph).map_err(|e| match e {
            GraphError::MissingField("function_id") => "no uuid found in JSON".to_string(),
            other => other.to_string(),
        })?;
        let mut memo = HashMap::new();
        self.eval(&decoded.graph, decoded.root, &mut memo)
    }

    fn submit(&self, graph: &Value) -> AsyncId {
        let outcome = self.evaluate(graph);
        // One child per root argument; the context id is not one of them.
        let children = graph["args"]
            .as_array()
            .map(|args| {
                args.iter()
                    .skip(1)
                    .map(|arg| SubContext {
                        async_id: self.next_async_id.fetch_add(1, Ordering::SeqCst) + 1,
                        is_request: arg.get("value").is_none(),
                    })
                    .collect()
            })
            .unwrap_or_default();
        let async_id = self.next_async_id.fetch_add(1, Ordering::SeqCst) + 1;
        self.jobs.lock().insert(
            async_id,
            Job {
                status: AsyncStatus::Created,
                outcome,
                children,
            },
        );
        async_id
    }

    fn with_job(
        &self,
        async_id: AsyncId,
        f: impl FnOnce(&mut Job) -> Result<Value, String>,
    ) -> Result<Value, String> {
        let mut jobs = self.jobs.lock();
        let job = jobs
            .get_mut(&async_id)
            .ok_or_else(|| format!("unknown async request {async_id}"))?;
        f(job)
    }

    fn eval(
        &self,
        graph: &RequestGraph,
        id: NodeId,
        memo: &mut HashMap<NodeId, Value>,
    ) -> Result<Value, String> {
        if let Some(value) = memo.get(&id) {
            return Ok(value.clone());
        }
        let node = graph.node(id).map_err(|e| e.to_string())?;
        let mut args = Vec::new();
        for arg in node.args() {
            args.push(match arg {
                Arg::Literal(value) => value.clone(),
                Arg::Node(child) => self.eval(graph, *child, memo)?,
            });
        }

        let function_id = node.function_id();
        let name = function_id.name();
        let unknown = || format!("no request registered with uuid {function_id}");
        if name.starts_with("normalization<") {
            let value = args.into_iter().next().ok_or("normalization without argument")?;
            memo.insert(id, value.clone());
            return Ok(value);
        }
        if function_id.revision() != Some(GIT_VERSION) {
            return Err(unknown());
        }

        let text = |i: usize| -> Result<String, String> {
            args.get(i)
                .and_then(Value::as_str)
                .map(str::to_string)
                .ok_or_else(|| format!("argument {i} of {name} is not a string"))
        };
        let value = match name {
            POST_OBJECT => {
                let schema = text(0)?;
                let payload: BlobPayload = args
                    .get(1)
                    .cloned()
                    .ok_or("no blob found in JSON".to_string())
                    .and_then(|v| serde_json::from_value(v).map_err(|e| e.to_string()))?;
                let bytes = payload.bytes().map_err(|e| e.to_string())?;
                json!(self.post(schema, bytes))
            }
            GET_OBJECT_METADATA => {
                let object_id = text(0)?;
                let store = self.store.lock();
                let (schema, immutable_id) = store
                    .objects
                    .get(&object_id)
                    .ok_or_else(|| format!("object {object_id} not found"))?;
                let size = store.immutables.get(immutable_id).map_or(0, Vec::len);
                json!({
                    "Content-Type": "application/octet-stream",
                    "Thinknode-Reference-Id": object_id,
                    "Thinknode-Size": size.to_string(),
                    "Thinknode-Type": schema,
                })
            }
            RESOLVE_OBJECT_TO_IMMUTABLE => {
                let object_id = text(0)?;
                let store = self.store.lock();
                let (_, immutable_id) = store
                    .objects
                    .get(&object_id)
                    .ok_or_else(|| format!("object {object_id} not found"))?;
                json!(immutable_id)
            }
            RETRIEVE_IMMUTABLE_OBJECT => {
                let immutable_id = text(0)?;
                let store = self.store.lock();
                let bytes = store
                    .immutables
                    .get(&immutable_id)
                    .ok_or_else(|| format!("immutable {immutable_id} not found"))?;
                json!(to_base64(bytes))
            }
            _ => return Err(unknown()),
        };
        memo.insert(id, value.clone());
        Ok(value)
    }

    fn post(&self, schema: String, bytes: Vec<u8>) -> String {
        let (object_id, immutable_id) = if bytes == SAMPLE_BYTES {
            (SAMPLE_OBJECT_ID.to_string(), SAMPLE_IMMUTABLE_ID.to_string())
        } else {
            (content_id("object", &bytes), content_id("immutable", &bytes))
        };
        let mut store = self.store.lock();
        store.immutables.insert(immutable_id.clone(), bytes);
        store
            .objects
            .insert(object_id.clone(), (schema, immutable_id));
        object_id
    }
}

fn params<T: serde::de::DeserializeOwned>(envelope: &Envelope) -> Result<T, String> {
    let params = envelope.params.clone().ok_or("no params found in JSON")?;
    serde_json::from_value(params).map_err(|_| "no graph found in JSON".to_string())
}

fn content_id(kind: &str, bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(kind.as_bytes());
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())[..32].to_string()
}

/// Serve `resolver` over WebSocket on an ephemeral local port.
///
/// Every reply is preceded by a ping frame so clients have to answer pings
/// while waiting.
pub async fn serve_websocket(resolver: Arc<FakeResolver>) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let resolver = Arc::clone(&resolver);
            tokio::spawn(async move {
                let Ok(mut ws) = tokio_tungstenite::accept_async(stream).await else {
                    return;
                };
                while let Some(Ok(frame)) = ws.next().await {
                    if let Message::Text(text) = frame {
                        let reply = resolver.handle(text.as_str());
                        if ws.send(Message::Ping(Vec::new().into())).await.is_err() {
                            break;
                        }
                        if ws.send(Message::Text(reply.into())).await.is_err() {
                            break;
                        }
                    }
                }
            });
        }
    });

    addr
}
