use std::io::BufRead;

use anyhow::{Context, Result};
use serde_json::Value;

const DATA_PREFIX: &str = "data:";

/// Parses one line of the response stream. Only `data:` lines carry records;
/// blank lines, `event:`/`id:` fields and `:` comments yield `None`.
pub fn parse_sse_line(line: &str) -> Option<Result<Value>> {
    let line = line.trim_end_matches(['\n', '\r']);
    let payload = line.strip_prefix(DATA_PREFIX)?.trim();
    Some(serde_json::from_str(payload).with_context(|| {
        format!(
            "invalid JSON in stream record: {}",
            truncate_text(payload, 120)
        )
    }))
}

/// Buffers every record of a stream.
pub fn read_sse_records(reader: impl BufRead) -> Result<Vec<Value>> {
    let mut records = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("failed reading stream line {}", idx + 1))?;
        if let Some(record) = parse_sse_line(&line) {
            records.push(record.with_context(|| format!("stream line {}", idx + 1))?);
        }
    }
    Ok(records)
}

/// Clips `value` to `max_chars` characters, marking the cut with an ellipsis.
pub fn truncate_text(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    value.chars().take(max_chars).collect::<String>() + "…"
}
