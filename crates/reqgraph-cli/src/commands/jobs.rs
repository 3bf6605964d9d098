//! Async request commands.

use super::connect;
use crate::output::{self, OutputFormat};
use anyhow::Result;
use reqgraph_config_and_utils::Config;
use reqgraph_session::{AsyncId, AsyncStatus, ResultShape, SubContext};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::info;

/// Print the id of a request submitted with `submit --detach`.
pub fn print_submitted(async_id: AsyncId, format: OutputFormat) {
    match format {
        OutputFormat::Text => println!("{}", async_id),
        OutputFormat::Json => output::print_value(&json!({"async_id": async_id}), format),
    }
}

/// Show the progress of an async request.
pub async fn status(config: &Config, async_id: AsyncId, format: OutputFormat) -> Result<()> {
    let session = connect(config).await?;
    let status = session.async_status(async_id).await?;
    let children = session.sub_contexts(async_id).await?;
    let error = match status {
        AsyncStatus::Error => Some(session.async_error_message(async_id).await?),
        _ => None,
    };
    session.close().await?;

    match format {
        OutputFormat::Text => {
            output::print_heading(&format!("Async request {}", async_id));
            output::print_row("Status", status.as_str());
            for child in &children {
                output::print_row(&child.async_id.to_string(), child_kind(child));
            }
            if let Some(message) = &error {
                output::print_row("Error", message);
            }
        }
        OutputFormat::Json => output::print_value(&status_json(status, &children, error), format),
    }
    Ok(())
}

/// Wait for an async request, print its result and release it.
pub async fn result(
    config: &Config,
    async_id: AsyncId,
    shape: ResultShape,
    poll: Duration,
    format: OutputFormat,
) -> Result<()> {
    let session = connect(config).await?;
    session.wait_for_async(async_id, poll).await?;
    let value = session.async_response(async_id, shape).await?;
    session.finish_async(async_id).await?;
    session.close().await?;
    info!(async_id, ?shape, "Async request resolved");

    output::print_value(&value.to_json(), format);
    Ok(())
}

/// Ask the resolver to stop an async request.
pub async fn cancel(config: &Config, async_id: AsyncId, format: OutputFormat) -> Result<()> {
    let session = connect(config).await?;
    session.request_cancellation(async_id).await?;
    let status = session.async_status(async_id).await?;
    session.close().await?;

    match format {
        OutputFormat::Text => println!("Async request {} is {}", async_id, status),
        OutputFormat::Json => {
            output::print_value(&json!({"async_id": async_id, "status": status}), format)
        }
    }
    Ok(())
}

fn child_kind(child: &SubContext) -> &'static str {
    if child.is_request {
        "REQ"
    } else {
        "VAL"
    }
}

fn status_json(status: AsyncStatus, children: &[SubContext], error: Option<String>) -> Value {
    let mut value = json!({
        "status": status,
        "sub_contexts": children
            .iter()
            .map(|child| json!({"async_id": child.async_id, "kind": child_kind(child)}))
            .collect::<Vec<_>>(),
    });
    if let Some(message) = error {
        value["error"] = Value::String(message);
    }
    value
}
