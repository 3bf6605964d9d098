//! Session behaviour against the in-process resolver.

mod support;

use reqgraph_session::requests::{
    get_object_metadata, post_object, resolve_object_to_immutable, retrieve_immutable_object,
};
use reqgraph_session::{
    AsyncStatus, ErrorKind, LoopbackTransport, ResultShape, Session, SessionConfig, SessionError,
    SubContext, Target,
};
use reqgraph_types::codec::decode;
use reqgraph_types::{Arg, FunctionId, GraphError, PackValue, RequestGraph, RequestNode};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use support::{FakeResolver, GIT_VERSION, SAMPLE_BYTES, SAMPLE_IMMUTABLE_ID, SAMPLE_OBJECT_ID};

fn sample_value() -> PackValue {
    PackValue::Array(vec!["abc".into(), "def".into(), "ghi".into()])
}

async fn session(resolver: &Arc<FakeResolver>) -> Session {
    Session::with_transport(Box::new(resolver.transport()), SessionConfig::default())
        .await
        .unwrap()
}

#[tokio::test]
async fn test_session_picks_up_resolver_version() {
    let resolver = FakeResolver::new();
    let session = session(&resolver).await;

    assert_eq!(session.version_tag(), GIT_VERSION);
    assert_eq!(session.ping().await.unwrap(), "fake-resolver");
    let meta = session.query_meta_info().await.unwrap();
    assert_eq!(meta.git_version, GIT_VERSION);
}

#[tokio::test]
async fn test_post_object_twice_yields_same_id() {
    let resolver = FakeResolver::new();
    let session = session(&resolver).await;

    for _ in 0..2 {
        let mut graph = RequestGraph::new();
        let root = post_object(&mut graph, session.version_tag(), "array/string", &sample_value())
            .unwrap();
        let object_id = session
            .resolve(&graph, root, ResultShape::String, Target::Local)
            .await
            .unwrap();
        assert_eq!(object_id.as_str(), Some(SAMPLE_OBJECT_ID));
    }
}

#[tokio::test]
async fn test_object_metadata() {
    let resolver = FakeResolver::new();
    let session = session(&resolver).await;

    let mut graph = RequestGraph::new();
    let object_id =
        post_object(&mut graph, session.version_tag(), "array/string", &sample_value()).unwrap();
    let root = get_object_metadata(&mut graph, session.version_tag(), object_id.into()).unwrap();

    let metadata = session
        .resolve(&graph, root, ResultShape::Metadata, Target::Local)
        .await
        .unwrap();
    let metadata = metadata.as_metadata().unwrap();
    assert_eq!(metadata["Content-Type"], "application/octet-stream");
    assert_eq!(metadata["Thinknode-Reference-Id"], SAMPLE_OBJECT_ID);
    assert_eq!(metadata["Thinknode-Size"], "13");
    assert_eq!(metadata["Thinknode-Type"], "array/string");
}

#[tokio::test]
async fn test_composite_round_trip() {
    let resolver = FakeResolver::new();
    let session = session(&resolver).await;
    let rev = session.version_tag().to_string();

    let mut graph = RequestGraph::new();
    let object_id = post_object(&mut graph, &rev, "array/string", &sample_value()).unwrap();
    let immutable_id = resolve_object_to_immutable(&mut graph, &rev, object_id.into()).unwrap();
    let root = retrieve_immutable_object(&mut graph, &rev, immutable_id.into()).unwrap();

    for target in [Target::Local, Target::Remote] {
        let bytes = session
            .resolve(&graph, root, ResultShape::Blob, target)
            .await
            .unwrap();
        let bytes = bytes.as_bytes().unwrap();
        assert_eq!(bytes, SAMPLE_BYTES);
        assert_eq!(decode(bytes).unwrap(), sample_value());
    }

    let mut graph = RequestGraph::new();
    let immutable_id =
        resolve_object_to_immutable(&mut graph, &rev, Arg::literal(SAMPLE_OBJECT_ID)).unwrap();
    let immutable_id = session
        .resolve(&graph, immutable_id, ResultShape::String, Target::Local)
        .await
        .unwrap();
    assert_eq!(immutable_id.as_str(), Some(SAMPLE_IMMUTABLE_ID));
}

#[tokio::test]
async fn test_missing_function_id() {
    let resolver = FakeResolver::new();
    let session = session(&resolver).await;

    for target in [Target::Local, Target::Remote] {
        let graph = json!({
            "title": "sample title",
            "args": [{"value": session.context_id()}],
        });
        let err = session
            .resolve_raw(graph, ResultShape::String, target)
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "no uuid found in JSON");
        let resolver_err = err.as_resolver().unwrap();
        assert_eq!(
            resolver_err.kind,
            ErrorKind::MalformedRequest {
                field: "uuid".to_string()
            }
        );
        assert_eq!(
            resolver_err.response,
            json!({"unknown": "no uuid found in JSON"})
        );
    }
}

#[tokio::test]
async fn test_unknown_function() {
    let resolver = FakeResolver::new();
    let session = session(&resolver).await;

    let mut graph = RequestGraph::new();
    let root = graph
        .add(RequestNode::new(FunctionId::unversioned("unknown_uuid"), "sample title"))
        .unwrap();
    let err = session
        .resolve(&graph, root, ResultShape::String, Target::Remote)
        .await
        .unwrap_err();

    assert_eq!(err.to_string(), "no request registered with uuid unknown_uuid");
    assert_eq!(
        err.as_resolver().unwrap().kind,
        ErrorKind::UnknownFunction {
            id: "unknown_uuid".to_string()
        }
    );
}

#[tokio::test]
async fn test_stale_revision_is_unknown() {
    let resolver = FakeResolver::new();
    let session = session(&resolver).await;

    let mut graph = RequestGraph::new();
    let root = post_object(&mut graph, "g0000000", "array/string", &sample_value()).unwrap();
    let err = session
        .resolve(&graph, root, ResultShape::String, Target::Local)
        .await
        .unwrap_err();
    assert!(err.as_resolver().unwrap().is_unknown_function());
}

#[tokio::test]
async fn test_cycle_fails_before_submission() {
    let resolver = FakeResolver::new();
    let session = session(&resolver).await;

    let mut graph = RequestGraph::new();
    let rev = session.version_tag().to_string();
    let object_id = post_object(&mut graph, &rev, "array/string", &sample_value()).unwrap();
    let root = resolve_object_to_immutable(&mut graph, &rev, object_id.into()).unwrap();
    graph.push_arg(object_id, root).unwrap();

    let err = session
        .resolve(&graph, root, ResultShape::String, Target::Local)
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::Graph(GraphError::Cycle { .. })));
    assert_eq!(resolver.resolve_calls(), 0);
}

#[tokio::test]
async fn test_request_timeout() {
    let transport = LoopbackTransport::new(|_| std::future::pending());
    let config = SessionConfig {
        version_tag: Some(GIT_VERSION.to_string()),
        request_timeout: Duration::from_millis(50),
        ..SessionConfig::default()
    };
    let session = Session::with_transport(Box::new(transport), config)
        .await
        .unwrap();

    let err = session.ping().await.unwrap_err();
    assert!(matches!(err, SessionError::Timeout(d) if d == Duration::from_millis(50)));
}

const POLL: Duration = Duration::from_millis(1);

#[tokio::test]
async fn test_async_submission_finishes() {
    let resolver = FakeResolver::new();
    let session = session(&resolver).await;

    let mut graph = RequestGraph::new();
    let root =
        post_object(&mut graph, session.version_tag(), "array/string", &sample_value()).unwrap();
    let async_id = session
        .submit_async(&graph, root, Target::Local)
        .await
        .unwrap();

    assert_eq!(session.async_status(async_id).await.unwrap(), AsyncStatus::SubsRunning);
    session.wait_for_async(async_id, POLL).await.unwrap();

    // The schema is a plain value, the normalized payload is a request.
    let children = session.sub_contexts(async_id).await.unwrap();
    assert_eq!(
        children,
        [
            SubContext { async_id: 1, is_request: false },
            SubContext { async_id: 2, is_request: true },
        ]
    );
    assert_eq!(async_id, 3);

    let object_id = session
        .async_response(async_id, ResultShape::String)
        .await
        .unwrap();
    assert_eq!(object_id.as_str(), Some(SAMPLE_OBJECT_ID));
    assert_eq!(resolver.resolve_calls(), 0);

    session.finish_async(async_id).await.unwrap();
    assert_eq!(resolver.open_jobs(), 0);
    assert!(session.finish_async(async_id).await.is_err());
}

#[tokio::test]
async fn test_async_failure_carries_message() {
    let resolver = FakeResolver::new();
    let session = session(&resolver).await;

    let mut graph = RequestGraph::new();
    let root = post_object(&mut graph, "g0000000", "array/string", &sample_value()).unwrap();
    let async_id = session
        .submit_async(&graph, root, Target::Remote)
        .await
        .unwrap();

    match session.wait_for_async(async_id, POLL).await {
        Err(SessionError::AsyncFailed { id, message }) => {
            assert_eq!(id, async_id);
            assert!(message.starts_with("no request registered with uuid"));
        }
        other => panic!("expected a failed async request, got {other:?}"),
    }
    assert!(session
        .async_response(async_id, ResultShape::String)
        .await
        .is_err());
}

#[tokio::test]
async fn test_async_cancellation() {
    let resolver = FakeResolver::new();
    resolver.hold_jobs();
    let session = session(&resolver).await;

    let mut graph = RequestGraph::new();
    let rev = session.version_tag().to_string();
    let root = retrieve_immutable_object(&mut graph, &rev, Arg::literal(SAMPLE_IMMUTABLE_ID))
        .unwrap();
    let async_id = session
        .submit_async(&graph, root, Target::Local)
        .await
        .unwrap();

    for _ in 0..3 {
        assert_eq!(session.async_status(async_id).await.unwrap(), AsyncStatus::SubsRunning);
    }
    session.request_cancellation(async_id).await.unwrap();
    assert!(matches!(
        session.wait_for_async(async_id, POLL).await,
        Err(SessionError::AsyncCancelled(id)) if id == async_id
    ));

    // Cancelling again leaves the final status alone.
    session.request_cancellation(async_id).await.unwrap();
    assert_eq!(session.async_status(async_id).await.unwrap(), AsyncStatus::Cancelled);
    assert!(session
        .async_response(async_id, ResultShape::Blob)
        .await
        .is_err());
    session.finish_async(async_id).await.unwrap();
}

#[tokio::test]
async fn test_unknown_async_id() {
    let resolver = FakeResolver::new();
    let session = session(&resolver).await;

    let err = session.async_status(404).await.unwrap_err();
    assert_eq!(err.to_string(), "unknown async request 404");
}
