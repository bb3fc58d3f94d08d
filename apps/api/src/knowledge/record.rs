use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Longest snippet rendered into a prompt for one record.
pub const MAX_SNIPPET_CHARS: usize = 600;

/// One JSON object read from a JSONL line. Fields are free-form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextRecord {
    /// File name the record was read from.
    pub source: String,
    /// 1-based line number within `source`.
    pub line: usize,
    pub fields: Map<String, Value>,
}

impl ContextRecord {
    /// All scalar leaf values of the record, keys excluded.
    pub fn leaf_text(&self) -> Vec<String> {
        let mut out = Vec::new();
        for value in self.fields.values() {
            collect_leaves(value, &mut out);
        }
        out
    }

    /// Compact `key: value; key: value` rendering, truncated to `MAX_SNIPPET_CHARS`.
    pub fn snippet(&self) -> String {
        let rendered = self
            .fields
            .iter()
            .filter(|(_, v)| !v.is_null())
            .map(|(k, v)| format!("{k}: {}", render_value(v)))
            .collect::<Vec<_>>()
            .join("; ");
        truncate_chars(&rendered, MAX_SNIPPET_CHARS)
    }
}

fn collect_leaves(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::String(s) => out.push(s.clone()),
        Value::Number(n) => out.push(n.to_string()),
        Value::Bool(b) => out.push(b.to_string()),
        Value::Array(items) => items.iter().for_each(|v| collect_leaves(v, out)),
        Value::Object(map) => map.values().for_each(|v| collect_leaves(v, out)),
        Value::Null => {}
    }
}

fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => format!("{}…", &text[..idx]),
        None => text.to_string(),
    }
}
