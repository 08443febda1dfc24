//! Conversational-AI export (FAE) extraction
//!
//! Provider export archives come in two known JSON shapes: the graph form,
//! where each conversation carries a `mapping` of message nodes, and the
//! flat form with a `conversations[].messages[]` array. Both are rendered
//! into the same prose shape as ordinary documents: conversation title as a
//! heading, one paragraph per message, `role: text`.

use serde_json::Value;
use std::fmt::Write as _;
use std::path::Path;

use super::{Extraction, Extractor};
use crate::error::{Error, Result};

/// Parses provider export archives into prose
pub struct FaeExtractor;

impl FaeExtractor {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn render(&self, root: &Value) -> Option<String> {
        let conversations = match root {
            Value::Array(items) => items.clone(),
            Value::Object(map) => map.get("conversations")?.as_array()?.clone(),
            _ => return None,
        };

        let mut out = String::new();
        let mut messages_seen = 0usize;
        for conversation in &conversations {
            let title = conversation
                .get("title")
                .and_then(Value::as_str)
                .unwrap_or("Untitled conversation");
            let _ = writeln!(out, "# {title}\n");

            if let Some(mapping) = conversation.get("mapping").and_then(Value::as_object) {
                // Graph form: message nodes keyed by id, ordered by create_time
                let mut nodes: Vec<(&str, f64, String)> = Vec::new();
                for node in mapping.values() {
                    let Some(message) = node.get("message") else {
                        continue;
                    };
                    let role = message
                        .pointer("/author/role")
                        .and_then(Value::as_str)
                        .unwrap_or("unknown");
                    let created = message
                        .get("create_time")
                        .and_then(Value::as_f64)
                        .unwrap_or(0.0);
                    let Some(text) = render_parts(message) else {
                        continue;
                    };
                    nodes.push((role, created, text));
                }
                nodes.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
                for (role, _, text) in nodes {
                    let _ = writeln!(out, "{role}: {text}\n");
                    messages_seen += 1;
                }
            } else if let Some(messages) = conversation.get("messages").and_then(Value::as_array) {
                // Flat form
                for message in messages {
                    let role = message
                        .get("role")
                        .or_else(|| message.get("sender"))
                        .and_then(Value::as_str)
                        .unwrap_or("unknown");
                    let text = message
                        .get("text")
                        .or_else(|| message.get("content"))
                        .and_then(Value::as_str)
                        .unwrap_or_default();
                    if text.is_empty() {
                        continue;
                    }
                    let _ = writeln!(out, "{role}: {text}\n");
                    messages_seen += 1;
                }
            }
        }

        (messages_seen > 0).then_some(out)
    }
}

/// Join the `content.parts` strings of a graph-form message
fn render_parts(message: &Value) -> Option<String> {
    let parts = message.pointer("/content/parts")?.as_array()?;
    let text: Vec<&str> = parts.iter().filter_map(Value::as_str).collect();
    let joined = text.join("\n").trim().to_string();
    (!joined.is_empty()).then_some(joined)
}

impl Default for FaeExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl Extractor for FaeExtractor {
    fn name(&self) -> &str {
        "fae"
    }

    fn handles_extension(&self, extension: &str) -> bool {
        extension == "json"
    }

    fn sniff(&self, bytes: &[u8]) -> bool {
        let head: &[u8] = &bytes[..bytes.len().min(64)];
        let Ok(text) = std::str::from_utf8(head) else {
            return false;
        };
        matches!(text.trim_start().as_bytes().first(), Some(b'{' | b'['))
    }

    fn extract(&self, bytes: &[u8], path: &Path) -> Result<Extraction> {
        let root: Value = serde_json::from_slice(bytes).map_err(|e| {
            Error::Extraction(format!("{} is not valid JSON: {}", path.display(), e))
        })?;
        match self.render(&root) {
            Some(text) => Ok(Extraction::prose(text)),
            // JSON that is not a conversation export still indexes as text
            None => Ok(Extraction::prose(
                String::from_utf8_lossy(bytes).into_owned(),
            )),
        }
    }
}
