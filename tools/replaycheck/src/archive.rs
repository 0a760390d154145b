use crate::errors::ReplayCheckError;
use crate::types::RecordingDescriptor;

/// Sentinel for "replay to the recording's stop position".
pub const REPLAY_LENGTH_ALL: i64 = -1;

/// Archiving-service control surface. Recordings are indexed asynchronously:
/// a `find_recording` immediately after the publication closes may miss a
/// recording that a later query returns.
pub trait Archive: Send + Sync {
    /// Most recent recording matching the channel and stream. `session_id`
    /// narrows the match to one publication instance; `None` accepts any
    /// session.
    fn find_recording(
        &self,
        channel: &str,
        stream_id: i32,
        session_id: Option<i32>,
    ) -> Result<Option<i64>, ReplayCheckError>;

    fn list_recordings(
        &self,
        from_index: usize,
        count: usize,
    ) -> Result<Vec<RecordingDescriptor>, ReplayCheckError>;

    fn list_recordings_for(
        &self,
        channel: &str,
        stream_id: i32,
        from_index: usize,
        count: usize,
    ) -> Result<Vec<RecordingDescriptor>, ReplayCheckError>;

    fn start_replay(
        &self,
        recording_id: i64,
        from_position: i64,
        length: i64,
        replay_channel: &str,
        replay_stream_id: i32,
    ) -> Result<i64, ReplayCheckError>;

    /// Stop a live replay session. Returns `ReplayAlreadyStopped` when the
    /// session has already finished; callers treat that as success.
    fn stop_replay(&self, replay_session_id: i64) -> Result<(), ReplayCheckError>;
}
