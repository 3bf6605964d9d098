//! Graph file commands.

use super::connect;
use crate::output::{self, OutputFormat};
use anyhow::{Context, Result};
use reqgraph_config_and_utils::Config;
use reqgraph_session::{ResultShape, Target};
use reqgraph_types::{assign_identities, wire, DecodedGraph};
use serde_json::{json, Value};
use std::path::Path;
use tracing::info;

/// What `show` reports about a graph file.
#[derive(Debug)]
struct GraphSummary {
    nodes: usize,
    shared: usize,
    digest: String,
    canonical: Value,
}

fn read_json(path: &Path) -> Result<Value> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Cannot read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("{} is not valid JSON", path.display()))
}

fn load_graph(path: &Path) -> Result<DecodedGraph> {
    let value = read_json(path)?;
    wire::decode(&value).with_context(|| format!("{} is not a valid request graph", path.display()))
}

fn summarize(decoded: &DecodedGraph) -> Result<GraphSummary> {
    let plan = assign_identities(&decoded.graph, decoded.root)?;
    Ok(GraphSummary {
        nodes: decoded.graph.len(),
        shared: plan.shared_count(),
        digest: decoded.graph.digest(decoded.root)?,
        canonical: wire::encode(&decoded.graph, decoded.root, None)?,
    })
}

/// Validate a graph file and print its canonical form.
pub fn show(path: &Path, format: OutputFormat) -> Result<()> {
    let decoded = load_graph(path)?;
    let summary = summarize(&decoded)?;

    match format {
        OutputFormat::Text => {
            output::print_heading(&format!("Graph {}", path.display()));
            output::print_row("Nodes", &summary.nodes.to_string());
            output::print_row("Shared nodes", &summary.shared.to_string());
            output::print_row("Digest", &summary.digest);
            println!();
            println!("{}", serde_json::to_string_pretty(&summary.canonical)?);
        }
        OutputFormat::Json => {
            output::print_value(
                &json!({
                    "nodes": summary.nodes,
                    "shared": summary.shared,
                    "digest": summary.digest,
                    "graph": summary.canonical,
                }),
                format,
            );
        }
    }
    Ok(())
}

/// Submit a graph file and print the result, or only the async id when
/// `detach` is set.
pub async fn submit(
    config: &Config,
    path: &Path,
    shape: ResultShape,
    remote: bool,
    raw: bool,
    detach: bool,
    format: OutputFormat,
) -> Result<()> {
    let target = if remote { Target::Remote } else { Target::Local };

    // Validate before connecting so a broken file never reaches the resolver.
    let request = if raw {
        Request::Raw(read_json(path)?)
    } else {
        Request::Decoded(load_graph(path)?)
    };

    let session = connect(config).await?;
    if detach {
        let async_id = match request {
            Request::Raw(graph) => session.submit_async_raw(graph, target).await?,
            Request::Decoded(decoded) => {
                session
                    .submit_async(&decoded.graph, decoded.root, target)
                    .await?
            }
        };
        session.close().await?;
        super::jobs::print_submitted(async_id, format);
        return Ok(());
    }

    let value = match &request {
        Request::Raw(graph) => session.resolve_raw(graph.clone(), shape, target).await?,
        Request::Decoded(decoded) => {
            session
                .resolve(&decoded.graph, decoded.root, shape, target)
                .await?
        }
    };
    session.close().await?;
    info!(path = %path.display(), ?shape, ?target, "Request resolved");

    output::print_value(&value.to_json(), format);
    Ok(())
}

enum Request {
    Raw(Value),
    Decoded(DecodedGraph),
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn shared_graph() -> Value {
        json!({
            "function_id": {"name": "concat", "revision": "g1"},
            "title": "concat",
            "args": [
                {
                    "function_id": {"name": "upper"},
                    "title": "upper",
                    "args": [{"value": "abc"}],
                    "id": 1
                },
                {"ref": 1}
            ]
        })
    }

    #[test]
    fn test_summarize_shared_graph() {
        let decoded = wire::decode(&shared_graph()).unwrap();
        let summary = summarize(&decoded).unwrap();

        assert_eq!(summary.nodes, 2);
        assert_eq!(summary.shared, 1);
        assert_eq!(summary.digest.len(), 64);
        assert_eq!(summary.canonical, shared_graph());
    }

    #[test]
    fn test_load_graph_from_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("graph.json");
        std::fs::write(&path, shared_graph().to_string()).unwrap();

        let decoded = load_graph(&path).unwrap();
        assert_eq!(decoded.graph.len(), 2);
        assert!(decoded.context_id.is_none());
    }

    #[test]
    fn test_load_graph_reports_bad_files() {
        let dir = tempdir().unwrap();

        let missing = dir.path().join("missing.json");
        let err = load_graph(&missing).unwrap_err();
        assert!(err.to_string().starts_with("Cannot read"));

        let not_json = dir.path().join("not.json");
        std::fs::write(&not_json, "{").unwrap();
        let err = load_graph(&not_json).unwrap_err();
        assert!(err.to_string().ends_with("is not valid JSON"));

        let no_title = dir.path().join("no_title.json");
        std::fs::write(&no_title, r#"{"function_id": {"name": "f"}, "args": []}"#).unwrap();
        let err = load_graph(&no_title).unwrap_err();
        assert!(err.to_string().ends_with("is not a valid request graph"));
    }
}
