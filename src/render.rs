// Copyright 2024-2026 gitifold Contributors
// SPDX-License-Identifier: Apache-2.0

//! Configuration template rendering.
//!
//! Templates use `{{ .field.nested }}` actions. `{{- ` drops the whitespace
//! right before an action and ` -}}` the whitespace right after it. Every
//! referenced field must exist in the data record and be a scalar; a
//! missing field is an error, never an empty string.
//!
//! The output is opaque bytes. Whether it is valid ini or yaml is up to
//! the template.

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

const OPEN: &str = "{{";
const CLOSE: &str = "}}";

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Template references missing field '{path}'")]
    MissingField { path: String },
    #[error("Field '{path}' is not a scalar value")]
    NotScalar { path: String },
    #[error("Unterminated action starting at byte {offset}")]
    Unterminated { offset: usize },
    #[error("Invalid action '{action}' at byte {offset}")]
    InvalidAction { offset: usize, action: String },
    #[error("Data record could not be serialized: {0}")]
    Data(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Node {
    Text(String),
    Field { path: Vec<String> },
}

/// A parsed template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    nodes: Vec<Node>,
}

impl Template {
    /// Parse `source` into text and field nodes.
    pub fn parse(source: &str) -> Result<Self, RenderError> {
        let mut nodes = Vec::new();
        let mut text = String::new();
        let mut trim_next = false;
        let mut rest = source;
        let mut offset = 0;

        while let Some(start) = rest.find(OPEN) {
            let mut before = &rest[..start];
            if trim_next {
                before = before.trim_start();
            }
            text.push_str(before);

            let action_offset = offset + start;
            let after_open = &rest[start + OPEN.len()..];
            let end = after_open
                .find(CLOSE)
                .ok_or(RenderError::Unterminated { offset: action_offset })?;
            let mut inner = &after_open[..end];

            if is_trim_marker(inner.strip_prefix('-'), true) {
                inner = &inner[1..];
                let kept = text.trim_end().len();
                text.truncate(kept);
            }
            trim_next = false;
            if is_trim_marker(inner.strip_suffix('-'), false) {
                inner = &inner[..inner.len() - 1];
                trim_next = true;
            }

            let path = parse_path(inner.trim()).ok_or_else(|| RenderError::InvalidAction {
                offset: action_offset,
                action: inner.trim().to_string(),
            })?;

            if !text.is_empty() {
                nodes.push(Node::Text(std::mem::take(&mut text)));
            }
            nodes.push(Node::Field { path });

            let consumed = start + OPEN.len() + end + CLOSE.len();
            offset += consumed;
            rest = &rest[consumed..];
        }

        let tail = if trim_next { rest.trim_start() } else { rest };
        text.push_str(tail);
        if !text.is_empty() {
            nodes.push(Node::Text(text));
        }
        Ok(Self { nodes })
    }

    /// Dotted paths of every field the template references, in order.
    #[cfg(test)]
    pub(crate) fn fields(&self) -> Vec<String> {
        self.nodes
            .iter()
            .filter_map(|node| match node {
                Node::Field { path } => Some(dotted(path)),
                Node::Text(_) => None,
            })
            .collect()
    }

    /// Render against an already-converted data record.
    pub fn execute(&self, data: &Value) -> Result<Vec<u8>, RenderError> {
        let mut out = String::new();
        for node in &self.nodes {
            match node {
                Node::Text(text) => out.push_str(text),
                Node::Field { path } => out.push_str(&lookup(data, path)?),
            }
        }
        Ok(out.into_bytes())
    }
}

/// Parse `template` and render it against `data`.
pub fn render<T: Serialize + ?Sized>(template: &str, data: &T) -> Result<Vec<u8>, RenderError> {
    let value = serde_json::to_value(data)?;
    Template::parse(template)?.execute(&value)
}

/// `rest` is what remains after stripping the `-`; the marker only counts
/// when whitespace separates it from the field.
fn is_trim_marker(rest: Option<&str>, leading: bool) -> bool {
    match rest {
        Some(rest) if leading => rest.starts_with(char::is_whitespace),
        Some(rest) => rest.ends_with(char::is_whitespace),
        None => false,
    }
}

fn parse_path(action: &str) -> Option<Vec<String>> {
    if action == "." {
        return Some(Vec::new());
    }
    let body = action.strip_prefix('.')?;
    let segments: Vec<String> = body.split('.').map(str::to_string).collect();
    let valid = segments.iter().all(|s| {
        !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
    });
    valid.then_some(segments)
}

fn lookup(data: &Value, path: &[String]) -> Result<String, RenderError> {
    let mut current = data;
    for (depth, segment) in path.iter().enumerate() {
        current = match current.get(segment.as_str()) {
            Some(Value::Null) | None => {
                return Err(RenderError::MissingField { path: dotted(&path[..=depth]) })
            }
            Some(value) => value,
        };
    }
    match current {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Null => Err(RenderError::MissingField { path: dotted(path) }),
        Value::Array(_) | Value::Object(_) => Err(RenderError::NotScalar { path: dotted(path) }),
    }
}

fn dotted(path: &[String]) -> String {
    if path.is_empty() {
        ".".to_string()
    } else {
        format!(".{}", path.join("."))
    }
}

#[cfg(test)]
#[path = "render_tests.rs"]
mod tests;
