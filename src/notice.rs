//! Purpose: Define a stable, structured schema for non-fatal stderr notices.
//! Exports: `Notice`, `notice_json`, `anomaly_notice`.
//! Role: Shared contract for replay diagnostics (data-quality anomalies).
//! Invariants: Notices are non-fatal and never alter stdout payloads.
//! Invariants: JSON schema is additive-only.
use serde_json::{Map, Value, json};

use crate::core::anomaly::Anomaly;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub kind: String,
    pub time: String,
    pub cmd: String,
    pub line: Option<u64>,
    pub message: String,
    pub details: Map<String, Value>,
}

pub fn notice_json(notice: &Notice) -> Value {
    let mut inner = Map::new();
    inner.insert("kind".to_string(), json!(notice.kind));
    inner.insert("time".to_string(), json!(notice.time));
    inner.insert("cmd".to_string(), json!(notice.cmd));
    if let Some(line) = notice.line {
        inner.insert("line".to_string(), json!(line));
    }
    inner.insert("message".to_string(), json!(notice.message));
    inner.insert("details".to_string(), Value::Object(notice.details.clone()));

    let mut outer = Map::new();
    outer.insert("notice".to_string(), Value::Object(inner));
    Value::Object(outer)
}

pub fn anomaly_notice(anomaly: &Anomaly, cmd: &str, line: Option<u64>, time: String) -> Notice {
    let mut details = Map::new();
    details.insert("set".to_string(), json!(anomaly.set()));
    details.insert("cookie".to_string(), json!(anomaly.cookie()));
    Notice {
        kind: anomaly.label().to_string(),
        time,
        cmd: cmd.to_string(),
        line,
        message: anomaly.message().to_string(),
        details,
    }
}
