//! Scaffolding for new schemas and consumers

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use serde_json::json;
use tracing::info;

use crate::error::{Result, SyncError};
use crate::naming;

/// Create `schemas/<subdir>/<name>.json` under `root` for `message_path`.
///
/// `message_path` is a message name optionally preceded by `/`-separated
/// directories, e.g. `widgets/app.widgets.created`.
pub fn generate_schema(root: &Path, message_path: &str) -> Result<PathBuf> {
    let mut segments: Vec<&str> = message_path.split('/').filter(|s| !s.is_empty()).collect();
    let name = segments
        .pop()
        .ok_or_else(|| SyncError::Scaffold("a message name is required".to_string()))?;
    naming::validate_message_name(name)?;

    let mut path = root.join("schemas");
    for dir in segments {
        path.push(dir);
    }
    path.push(format!("{}.json", name));

    if path.exists() {
        return Err(SyncError::Scaffold(format!(
            "{} already exists",
            path.display()
        )));
    }

    let template = json!({
        "$id": naming::dot_to_colon(name),
        "$schema": "http://json-schema.org/draft-07/schema#",
        "description": format!("This is why {} exists and what it does", name),
        "type": "object",
        "properties": {}
    });
    let content = serde_json::to_string_pretty(&template).unwrap_or_default();

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&path, content + "\n")?;

    info!("Created new schema {}", path.display());
    Ok(path)
}

/// Append a durable JetStream consumer for `message` to the stream's Terraform file
pub fn generate_consumer(
    root: &Path,
    stream: &str,
    destination: &str,
    message: &str,
) -> Result<PathBuf> {
    naming::validate_stream_name(stream)?;
    naming::validate_destination_name(destination)?;
    naming::validate_message_name(message)?;

    let stream_name = naming::format_stream_name(stream);
    let tf_path = root.join("tf").join(format!("{}.tf", stream.to_lowercase()));
    if !tf_path.exists() {
        return Err(SyncError::Scaffold(format!(
            "You must first create a stream configuration for {} at {}",
            stream_name,
            tf_path.display()
        )));
    }

    let schema_path = root.join("schemas").join(format!("{}.json", message));
    if !schema_path.exists() {
        return Err(SyncError::Scaffold(format!(
            "You must first create a schema for {} at {}",
            message,
            schema_path.display()
        )));
    }

    let consumer = naming::consumer_name(destination, message);
    let block = format!(
        r#"
resource "jetstream_consumer" "{consumer}" {{
  stream_id = jetstream_stream.{stream_name}.id
  durable_name = "{consumer}"
  deliver_all = true
  filter_subject = "{message}"
  sample_freq = 100
}}
"#
    );

    let mut file = OpenOptions::new().append(true).open(&tf_path)?;
    file.write_all(block.as_bytes())?;

    info!(
        "Created new consumer config {} for stream {}",
        consumer, stream_name
    );
    Ok(tf_path)
}
