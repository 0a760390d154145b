use serde::Serialize;

/// Archive-side metadata for one durable recording. Created by the archive
/// asynchronously after the recorded publication closes; the harness only
/// observes it. `stop_position` is meaningful once the recording is
/// finalized, `-1` while unknown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordingDescriptor {
    pub recording_id: i64,
    pub channel: String,
    pub stream_id: i32,
    pub session_id: i32,
    pub start_position: i64,
    pub stop_position: i64,
    pub source_identity: String,
}

impl RecordingDescriptor {
    pub fn recorded_bytes(&self) -> Option<i64> {
        if self.stop_position < self.start_position {
            return None;
        }
        Some(self.stop_position - self.start_position)
    }
}

/// A live replay session handed out by the archive. The session ends either
/// when the harness stops it or when the archive exhausts the recording.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplaySession {
    pub replay_session_id: i64,
    pub recording_id: i64,
    pub from_position: i64,
    pub length: i64,
}

/// Counters owned by the consumer for the duration of one run.
/// `message_count` only moves up; `first_value` is set once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ConsumptionStats {
    pub message_count: u64,
    pub first_value: Option<i64>,
    pub last_value: Option<i64>,
}

impl ConsumptionStats {
    pub fn observe(&mut self, value: i64) {
        if self.first_value.is_none() {
            self.first_value = Some(value);
        }
        self.last_value = Some(value);
        self.message_count += 1;
    }
}

/// Why the consumer stopped polling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    /// Expected message count reached.
    Complete,
    /// Idle-poll limit reached first. The archive signals end-of-recording
    /// by going quiet, so a stalled replay and a finished one look the same
    /// here; the report carries whatever count was reached.
    Idle,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VerificationReport {
    pub expected_count: u64,
    pub message_count: u64,
    pub first_value: Option<i64>,
    pub last_value: Option<i64>,
    pub efficiency_pct: f64,
    pub matched: bool,
    pub publish_millis: u64,
    pub replay_millis: u64,
}
