//! Object store commands.

use super::connect;
use crate::output::{self, OutputFormat};
use anyhow::{anyhow, Result};
use reqgraph_config_and_utils::Config;
use reqgraph_session::requests;
use reqgraph_session::{ResultShape, Target};
use reqgraph_types::codec::{self, to_base64};
use reqgraph_types::{Arg, PackValue, RequestGraph};
use serde_json::{json, Value};

/// Store a list of strings and print the new object id.
pub async fn post(
    config: &Config,
    schema: &str,
    values: &[String],
    format: OutputFormat,
) -> Result<()> {
    let session = connect(config).await?;
    let value = PackValue::Array(values.iter().map(|v| PackValue::from(v.as_str())).collect());

    let mut graph = RequestGraph::new();
    let root = requests::post_object(&mut graph, session.version_tag(), schema, &value)?;
    let object_id = session
        .resolve(&graph, root, ResultShape::String, Target::Local)
        .await?;
    session.close().await?;

    let object_id = object_id
        .as_str()
        .ok_or_else(|| anyhow!("Resolver returned no object id"))?;
    match format {
        OutputFormat::Text => println!("{}", object_id),
        OutputFormat::Json => output::print_value(&json!({"object_id": object_id}), format),
    }
    Ok(())
}

/// Print the metadata headers of an object.
pub async fn metadata(config: &Config, object_id: &str, format: OutputFormat) -> Result<()> {
    let session = connect(config).await?;

    let mut graph = RequestGraph::new();
    let root =
        requests::get_object_metadata(&mut graph, session.version_tag(), Arg::literal(object_id))?;
    let value = session
        .resolve(&graph, root, ResultShape::Metadata, Target::Local)
        .await?;
    session.close().await?;

    let headers = value
        .as_metadata()
        .ok_or_else(|| anyhow!("Resolver returned no metadata"))?;
    match format {
        OutputFormat::Text => {
            output::print_heading(&format!("Object {}", object_id));
            for (key, value) in headers {
                output::print_row(key, value);
            }
        }
        OutputFormat::Json => output::print_value(&value.to_json(), format),
    }
    Ok(())
}

/// Retrieve and decode the content stored under an immutable id.
pub async fn retrieve(config: &Config, immutable_id: &str, format: OutputFormat) -> Result<()> {
    let session = connect(config).await?;

    let mut graph = RequestGraph::new();
    let root = requests::retrieve_immutable_object(
        &mut graph,
        session.version_tag(),
        Arg::literal(immutable_id),
    )?;
    let value = session
        .resolve(&graph, root, ResultShape::Blob, Target::Local)
        .await?;
    session.close().await?;

    let bytes = value
        .as_bytes()
        .ok_or_else(|| anyhow!("Resolver returned no content"))?;
    let content = codec::decode(bytes)?;
    output::print_value(&pack_to_json(&content), format);
    Ok(())
}

/// JSON view of a decoded payload; binary data becomes base64 text.
fn pack_to_json(value: &PackValue) -> Value {
    match value {
        PackValue::Nil => Value::Null,
        PackValue::Bool(b) => Value::Bool(*b),
        PackValue::Int(i) => json!(i),
        PackValue::Float(f) => json!(f),
        PackValue::Str(s) => Value::String(s.clone()),
        PackValue::Bin(bytes) => Value::String(to_base64(bytes)),
        PackValue::Array(items) => Value::Array(items.iter().map(pack_to_json).collect()),
        PackValue::Map(entries) => Value::Object(
            entries
                .iter()
                .map(|(k, v)| {
                    let key = match k {
                        PackValue::Str(s) => s.clone(),
                        other => pack_to_json(other).to_string(),
                    };
                    (key, pack_to_json(v))
                })
                .collect(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pack_to_json_sample_array() {
        let bytes = b"\x93\xa3abc\xa3def\xa3ghi";
        let value = codec::decode(bytes).unwrap();
        assert_eq!(pack_to_json(&value), json!(["abc", "def", "ghi"]));
    }

    #[test]
    fn test_pack_to_json_nested_values() {
        let value = PackValue::Map(vec![
            ("flag".into(), PackValue::Bool(true)),
            (PackValue::Int(7), PackValue::Nil),
            ("raw".into(), PackValue::Bin(vec![1, 2, 3])),
            (
                "items".into(),
                PackValue::Array(vec![PackValue::Int(-1), PackValue::Float(0.5)]),
            ),
        ]);

        assert_eq!(
            pack_to_json(&value),
            json!({
                "flag": true,
                "7": null,
                "raw": "AQID",
                "items": [-1, 0.5],
            })
        );
    }
}
