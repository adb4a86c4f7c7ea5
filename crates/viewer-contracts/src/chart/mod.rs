//! Chart document normalization.
//!
//! Chart frames carry a figure whose numeric arrays may be packed as
//! `{"bdata", "dtype"}` placeholders and whose template may name trace types
//! the renderer rejects. [`normalize_figure`] fixes both in place.

pub mod bdata;
pub mod fields;
pub mod template;

use serde_json::Value;
use thiserror::Error;

pub use bdata::{decode_bdata, DecodeError, Dtype, EncodedArray, NumericArray};
pub use fields::{rewrite_trace, FieldFailure, RewriteReport, BDATA_FIELDS, NESTED_FIELDS};
pub use template::{fix_template, TemplateFix, SUPPORTED_TRACE_TYPES};

/// Structural problems that stop one chart from rendering.
#[derive(Debug, Error)]
pub enum NormalizeError {
    #[error("chart payload is missing")]
    MissingPayload,
    #[error("chart payload is not valid JSON")]
    InvalidJson(#[from] serde_json::Error),
    #[error("chart document must be a JSON object, got {0}")]
    NotAnObject(&'static str),
    #[error("chart document has no `data` trace list")]
    MissingData,
    #[error("chart `data` must be a list of traces, got {0}")]
    DataNotAList(&'static str),
    #[error("trace {index} must be a JSON object, got {kind}")]
    TraceNotAnObject { index: usize, kind: &'static str },
}

#[derive(Debug, Default)]
pub struct NormalizeReport {
    pub template: TemplateFix,
    pub traces: usize,
    pub fields: RewriteReport,
}

/// Turns a `json_plotly` payload into a figure document. The payload is
/// either the figure object itself or a string holding its JSON.
pub fn figure_from_payload(payload: &Value) -> Result<Value, NormalizeError> {
    match payload {
        Value::Null => Err(NormalizeError::MissingPayload),
        Value::String(raw) => Ok(serde_json::from_str(raw)?),
        other => Ok(other.clone()),
    }
}

/// Prunes the template, then decodes every encoded array of every trace.
/// Decode failures are reported, not returned; only shape errors fail.
pub fn normalize_figure(figure: &mut Value) -> Result<NormalizeReport, NormalizeError> {
    if !figure.is_object() {
        return Err(NormalizeError::NotAnObject(kind_of(figure)));
    }
    match figure.get("data") {
        None => return Err(NormalizeError::MissingData),
        Some(Value::Array(traces)) => {
            if let Some((index, trace)) = traces
                .iter()
                .enumerate()
                .find(|(_, trace)| !trace.is_object())
            {
                return Err(NormalizeError::TraceNotAnObject {
                    index,
                    kind: kind_of(trace),
                });
            }
        }
        Some(other) => return Err(NormalizeError::DataNotAList(kind_of(other))),
    }

    let mut report = NormalizeReport {
        template: fix_template(figure),
        ..NormalizeReport::default()
    };

    let traces = figure
        .get_mut("data")
        .and_then(Value::as_array_mut)
        .ok_or(NormalizeError::MissingData)?;
    for (index, trace) in traces.iter_mut().enumerate() {
        if let Some(trace) = trace.as_object_mut() {
            rewrite_trace(trace, index, &mut report.fields);
        }
    }
    report.traces = traces.len();
    Ok(report)
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "object",
    }
}
