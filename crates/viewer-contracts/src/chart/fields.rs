use serde_json::{Map, Value};

use super::bdata::{DecodeError, EncodedArray};

/// Trace fields that may hold an encoded array directly.
pub const BDATA_FIELDS: &[&str] = &[
    "x",
    "y",
    "z",
    "text",
    "hovertext",
    "hovertemplate",
    "values",
    "labels",
    "parents",
    "ids",
    "customdata",
    "error_x",
    "error_y",
    "error_z",
    "open",
    "high",
    "low",
    "close",
];

/// Style objects on a trace that may hold encoded arrays at any depth.
pub const NESTED_FIELDS: &[&str] = &["marker", "line", "fill", "error_x", "error_y", "error_z"];

#[derive(Debug)]
pub struct FieldFailure {
    pub path: String,
    pub error: DecodeError,
}

#[derive(Debug, Default)]
pub struct RewriteReport {
    pub decoded: usize,
    pub failures: Vec<FieldFailure>,
}

impl RewriteReport {
    fn record(&mut self, path: String, outcome: Result<usize, DecodeError>) {
        match outcome {
            Ok(_) => self.decoded += 1,
            Err(error) => {
                tracing::warn!(%path, %error, "encoded array replaced with empty sequence");
                self.failures.push(FieldFailure { path, error });
            }
        }
    }
}

/// Replaces every encoded array reachable from the scanned fields of one
/// trace with its decoded sequence. Failed decodes leave an empty sequence.
pub fn rewrite_trace(trace: &mut Map<String, Value>, trace_index: usize, report: &mut RewriteReport) {
    for field in BDATA_FIELDS {
        let Some(value) = trace.get_mut(*field) else {
            continue;
        };
        if EncodedArray::is_placeholder(value) {
            let outcome = replace_encoded(value);
            report.record(format!("data[{trace_index}].{field}"), outcome);
        }
    }

    for field in NESTED_FIELDS {
        if let Some(value) = trace.get_mut(*field) {
            rewrite_nested(value, format!("data[{trace_index}].{field}"), report);
        }
    }
}

/// Walks a style object depth-first with an explicit worklist, in document
/// order. Encoded arrays below the root are replaced; other mappings and
/// sequences are descended into. The root itself is never replaced.
fn rewrite_nested(root: &mut Value, root_path: String, report: &mut RewriteReport) {
    let mut pending: Vec<(String, &mut Value)> = Vec::new();
    push_children(root_path, root, &mut pending);

    while let Some((path, node)) = pending.pop() {
        if EncodedArray::is_placeholder(node) {
            let outcome = replace_encoded(node);
            report.record(path, outcome);
        } else {
            push_children(path, node, &mut pending);
        }
    }
}

/// Pushes the children of a mapping or sequence so the first child pops next.
fn push_children<'v>(path: String, node: &'v mut Value, pending: &mut Vec<(String, &'v mut Value)>) {
    let start = pending.len();
    match node {
        Value::Object(map) => pending.extend(
            map.iter_mut()
                .map(|(key, child)| (format!("{path}.{key}"), child)),
        ),
        Value::Array(items) => pending.extend(
            items
                .iter_mut()
                .enumerate()
                .map(|(idx, child)| (format!("{path}[{idx}]"), child)),
        ),
        _ => return,
    }
    pending[start..].reverse();
}

fn replace_encoded(slot: &mut Value) -> Result<usize, DecodeError> {
    let decoded = EncodedArray::from_value(slot).and_then(|encoded| encoded.decode());
    match decoded {
        Ok(values) => {
            let len = values.len();
            *slot = values.into_value();
            Ok(len)
        }
        Err(err) => {
            *slot = Value::Array(Vec::new());
            Err(err)
        }
    }
}
