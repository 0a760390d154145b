use crate::errors::ReplayCheckError;
use serde::Serialize;
use serde_json::Value;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Append-only JSONL run log, one event per pipeline phase transition.
/// Stdout rendering stays in the bin layer; this is the structured trail.
#[derive(Debug, Clone)]
pub struct JsonlLogger {
    pub path: PathBuf,
    pub max_payload_bytes: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunEvent<'a> {
    pub level: &'a str,
    pub phase: &'a str,
    pub payload: Value,
}

impl JsonlLogger {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            max_payload_bytes: 4096,
        }
    }

    pub fn append(&self, event: &RunEvent<'_>) -> Result<(), ReplayCheckError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| ReplayCheckError::Io(e.to_string()))?;
        }
        let truncated = truncate_json(event.payload.clone(), self.max_payload_bytes);
        let line = serde_json::to_string(&RunEvent {
            level: event.level,
            phase: event.phase,
            payload: truncated,
        })
        .map_err(|e| ReplayCheckError::Io(e.to_string()))?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| ReplayCheckError::Io(e.to_string()))?;
        writeln!(file, "{line}").map_err(|e| ReplayCheckError::Io(e.to_string()))
    }

    /// Best-effort variant for diagnostics paths that must never abort the
    /// run they are describing.
    pub fn append_quiet(&self, event: &RunEvent<'_>) {
        let _ = self.append(event);
    }
}

fn truncate_json(value: Value, max_bytes: usize) -> Value {
    let rendered = serde_json::to_string(&value).unwrap_or_default();
    if rendered.len() <= max_bytes {
        return value;
    }
    // Channel strings come from user TOML and may be multi-byte; back the
    // cut off to a char boundary so truncation cannot panic.
    let mut cut = max_bytes.saturating_sub(3);
    while !rendered.is_char_boundary(cut) {
        cut -= 1;
    }
    let mut truncated = rendered;
    truncated.truncate(cut);
    Value::String(format!("{truncated}..."))
}

#[cfg(test)]
mod tests {
    use super::{JsonlLogger, RunEvent};
    use serde_json::json;

    #[test]
    fn logger_appends_one_json_line_per_event() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("run-log.jsonl");
        let logger = JsonlLogger::new(&path);

        logger
            .append(&RunEvent {
                level: "info",
                phase: "publish",
                payload: json!({"message_count": 1000}),
            })
            .expect("append");
        logger
            .append(&RunEvent {
                level: "warn",
                phase: "locate",
                payload: json!({"attempt": 3}),
            })
            .expect("append");

        let text = std::fs::read_to_string(&path).expect("read");
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("\"phase\":\"publish\""));
        assert!(lines[1].contains("\"level\":\"warn\""));
    }

    #[test]
    fn oversized_payloads_are_truncated() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("run-log.jsonl");
        let mut logger = JsonlLogger::new(&path);
        logger.max_payload_bytes = 20;

        logger
            .append(&RunEvent {
                level: "info",
                phase: "consume",
                payload: json!({"text": "abcdefghijklmnopqrstuvwxyz"}),
            })
            .expect("append");

        let text = std::fs::read_to_string(&path).expect("read");
        assert!(text.contains("..."));
    }

    #[test]
    fn truncation_backs_off_to_a_char_boundary() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("run-log.jsonl");
        let mut logger = JsonlLogger::new(&path);
        logger.max_payload_bytes = 5;

        // The cut index lands inside a two-byte character; the payload must
        // be truncated, not panic.
        logger
            .append(&RunEvent {
                level: "info",
                phase: "locate",
                payload: json!("ééé"),
            })
            .expect("append");

        let text = std::fs::read_to_string(&path).expect("read");
        assert!(text.contains("..."));
    }
}
