use indexmap::IndexSet;
use serde_json::{Map, Value};

/// Response kinds requested from the agent on every call.
pub const ACCEPTABLE_RESPONSES: &[&str] = &[
    "text",
    "image",
    "link",
    "buttons",
    "dataframe",
    "plotly",
    "sql",
];

const DEFAULT_BUTTON_LABEL: &str = "Unnamed Button";
const DEFAULT_ERROR_TEXT: &str = "Unknown error";

#[derive(Debug, Clone, PartialEq)]
pub struct Button {
    pub label: String,
}

/// Tabular payload of a dataframe frame, columns in order of first appearance.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl Table {
    /// Accepts records (`[{"col": v}, ...]`) or columns
    /// (`{"col": [v, ...]}`). Anything else is not a table.
    pub fn from_json(data: &Value) -> Option<Self> {
        match data {
            Value::Array(records) => Self::from_records(records),
            Value::Object(columns) => Self::from_columns(columns),
            _ => None,
        }
    }

    fn from_records(records: &[Value]) -> Option<Self> {
        let mut columns: IndexSet<String> = IndexSet::new();
        for record in records {
            columns.extend(record.as_object()?.keys().cloned());
        }
        let rows = records
            .iter()
            .filter_map(Value::as_object)
            .map(|record| {
                columns
                    .iter()
                    .map(|column| record.get(column).cloned().unwrap_or(Value::Null))
                    .collect()
            })
            .collect();
        Some(Self {
            columns: columns.into_iter().collect(),
            rows,
        })
    }

    fn from_columns(columns: &Map<String, Value>) -> Option<Self> {
        let mut cells: Vec<&Vec<Value>> = Vec::with_capacity(columns.len());
        for values in columns.values() {
            cells.push(values.as_array()?);
        }
        let height = cells.iter().map(|values| values.len()).max().unwrap_or(0);
        let rows = (0..height)
            .map(|row| {
                cells
                    .iter()
                    .map(|values| values.get(row).cloned().unwrap_or(Value::Null))
                    .collect()
            })
            .collect();
        Some(Self {
            columns: columns.keys().cloned().collect(),
            rows,
        })
    }
}

/// One decoded record of the response stream.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Text {
        text: String,
    },
    Image {
        image_url: Option<String>,
        caption: String,
    },
    Link {
        title: String,
        url: String,
        description: Option<String>,
    },
    Buttons {
        text: String,
        buttons: Vec<Button>,
    },
    Dataframe {
        table: Option<Table>,
    },
    Plotly {
        payload: Value,
    },
    Sql {
        query: String,
    },
    Error {
        error: String,
    },
    End,
    Unknown {
        kind: String,
    },
}

impl Frame {
    pub fn from_record(record: &Value) -> Self {
        let kind = record.get("type").and_then(Value::as_str).unwrap_or("");
        match kind {
            "text" => Self::Text {
                text: string_field(record, "text").unwrap_or_default(),
            },
            "image" => Self::Image {
                image_url: record
                    .get("image_url")
                    .and_then(Value::as_str)
                    .map(str::trim)
                    .filter(|url| !url.is_empty())
                    .map(str::to_string),
                caption: string_field(record, "caption").unwrap_or_default(),
            },
            "link" => Self::Link {
                title: string_field(record, "title").unwrap_or_default(),
                url: string_field(record, "url").unwrap_or_default(),
                description: string_field(record, "description")
                    .filter(|description| !description.is_empty()),
            },
            "buttons" => Self::Buttons {
                text: string_field(record, "text").unwrap_or_default(),
                buttons: record
                    .get("buttons")
                    .and_then(Value::as_array)
                    .map(|rows| rows.iter().map(button_from_value).collect())
                    .unwrap_or_default(),
            },
            "dataframe" => Self::Dataframe {
                table: record
                    .pointer("/json_table/data")
                    .and_then(Table::from_json),
            },
            "plotly" => Self::Plotly {
                payload: record.get("json_plotly").cloned().unwrap_or(Value::Null),
            },
            "sql" => Self::Sql {
                query: string_field(record, "query").unwrap_or_default(),
            },
            "error" => Self::Error {
                error: string_field(record, "error")
                    .unwrap_or_else(|| DEFAULT_ERROR_TEXT.to_string()),
            },
            "end" => Self::End,
            other => Self::Unknown {
                kind: other.to_string(),
            },
        }
    }

    pub fn kind(&self) -> &str {
        match self {
            Self::Text { .. } => "text",
            Self::Image { .. } => "image",
            Self::Link { .. } => "link",
            Self::Buttons { .. } => "buttons",
            Self::Dataframe { .. } => "dataframe",
            Self::Plotly { .. } => "plotly",
            Self::Sql { .. } => "sql",
            Self::Error { .. } => "error",
            Self::End => "end",
            Self::Unknown { kind } => kind.as_str(),
        }
    }
}

fn button_from_value(value: &Value) -> Button {
    Button {
        label: string_field(value, "label").unwrap_or_else(|| DEFAULT_BUTTON_LABEL.to_string()),
    }
}

/// Strings are taken as-is, other scalars and structures are rendered as
/// JSON, `null` and missing keys are `None`.
fn string_field(record: &Value, key: &str) -> Option<String> {
    match record.get(key)? {
        Value::Null => None,
        Value::String(text) => Some(text.clone()),
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Value};

    use super::{Button, Frame, Table};

    #[test]
    fn parses_every_known_kind() {
        assert_eq!(
            Frame::from_record(&json!({"type": "text", "text": "Hello"})),
            Frame::Text {
                text: "Hello".to_string()
            }
        );
        assert_eq!(
            Frame::from_record(&json!({"type": "sql", "query": "SELECT 1"})),
            Frame::Sql {
                query: "SELECT 1".to_string()
            }
        );
        assert_eq!(
            Frame::from_record(&json!({"type": "error"})),
            Frame::Error {
                error: "Unknown error".to_string()
            }
        );
        assert_eq!(Frame::from_record(&json!({"type": "end"})), Frame::End);
        assert_eq!(
            Frame::from_record(&json!({"type": "link", "title": "Docs", "url": "https://x.test", "description": ""})),
            Frame::Link {
                title: "Docs".to_string(),
                url: "https://x.test".to_string(),
                description: None,
            }
        );
    }

    #[test]
    fn image_url_must_be_a_non_empty_string() {
        let frame = Frame::from_record(&json!({"type": "image", "image_url": 42}));
        assert_eq!(
            frame,
            Frame::Image {
                image_url: None,
                caption: String::new()
            }
        );
        let frame = Frame::from_record(
            &json!({"type": "image", "image_url": "https://img.test/a.png", "caption": "A"}),
        );
        assert_eq!(
            frame,
            Frame::Image {
                image_url: Some("https://img.test/a.png".to_string()),
                caption: "A".to_string()
            }
        );
    }

    #[test]
    fn buttons_default_their_labels() {
        let frame = Frame::from_record(&json!({
            "type": "buttons",
            "text": "Pick one",
            "buttons": [{"label": "Yes"}, {}],
        }));
        assert_eq!(
            frame,
            Frame::Buttons {
                text: "Pick one".to_string(),
                buttons: vec![
                    Button {
                        label: "Yes".to_string()
                    },
                    Button {
                        label: "Unnamed Button".to_string()
                    },
                ],
            }
        );
    }

    #[test]
    fn unknown_and_missing_types_keep_their_name() {
        let frame = Frame::from_record(&json!({"type": "audio"}));
        assert_eq!(frame.kind(), "audio");
        let frame = Frame::from_record(&json!({"text": "no type"}));
        assert_eq!(
            frame,
            Frame::Unknown {
                kind: String::new()
            }
        );
    }

    #[test]
    fn plotly_keeps_raw_payload() {
        let frame = Frame::from_record(&json!({"type": "plotly", "json_plotly": {"data": []}}));
        assert_eq!(
            frame,
            Frame::Plotly {
                payload: json!({"data": []})
            }
        );
        let frame = Frame::from_record(&json!({"type": "plotly"}));
        assert_eq!(
            frame,
            Frame::Plotly {
                payload: Value::Null
            }
        );
    }

    #[test]
    fn records_and_columns_build_the_same_table() {
        let records = json!([
            {"email": "a@x.test", "queries": 3},
            {"email": "b@x.test", "queries": 5, "errors": 1},
        ]);
        let table = Table::from_json(&records).unwrap_or_else(|| panic!("records table"));
        assert_eq!(table.columns, vec!["email", "queries", "errors"]);
        assert_eq!(
            table.rows,
            vec![
                vec![json!("a@x.test"), json!(3), Value::Null],
                vec![json!("b@x.test"), json!(5), json!(1)],
            ]
        );

        let columns = json!({
            "email": ["a@x.test", "b@x.test"],
            "queries": [3, 5],
            "errors": [null, 1],
        });
        assert_eq!(Table::from_json(&columns), Some(table));
    }

    #[test]
    fn dataframe_without_usable_data_has_no_table() {
        let frame = Frame::from_record(&json!({"type": "dataframe", "json_table": {"data": "x"}}));
        assert_eq!(frame, Frame::Dataframe { table: None });
        let frame = Frame::from_record(&json!({"type": "dataframe", "json_table": {"data": [1, 2]}}));
        assert_eq!(frame, Frame::Dataframe { table: None });
    }
}
