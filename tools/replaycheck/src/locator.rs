use crate::archive::Archive;
use crate::config::AppConfig;
use crate::errors::ReplayCheckError;
use crate::retry::retry;
use crate::runtime::Clock;
use crate::types::RecordingDescriptor;

/// Correlation tuple from the finished publication. `resolved_channel` is
/// the transport's session-qualified form of `channel` and gives the
/// strongest match; the base channel is the fallback when the archive
/// indexes with qualifiers stripped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordingQuery {
    pub channel: String,
    pub stream_id: i32,
    pub session_id: i32,
    pub resolved_channel: String,
}

/// Resolves the recording for a finished publication. The archive indexes
/// recordings asynchronously, so this settles first and then retries the
/// lookup on a fixed interval before giving up with `RecordingNotFound`.
pub fn locate(
    archive: &dyn Archive,
    clock: &dyn Clock,
    cfg: &AppConfig,
    query: &RecordingQuery,
) -> Result<RecordingDescriptor, ReplayCheckError> {
    clock.sleep(cfg.settle_delay())?;

    let found = retry(clock, cfg.locate_policy(), |_| {
        let exact = archive.find_recording(
            &query.resolved_channel,
            query.stream_id,
            Some(query.session_id),
        )?;
        if exact.is_some() {
            return Ok(exact);
        }
        archive.find_recording(&query.channel, query.stream_id, None)
    })?;

    let Some(recording_id) = found else {
        return Err(ReplayCheckError::RecordingNotFound {
            channel: query.channel.clone(),
            stream_id: query.stream_id,
            session_id: query.session_id,
            attempts: cfg.locate.retry_attempts,
        });
    };

    Ok(describe(archive, cfg, query, recording_id))
}

/// Materializes the descriptor for a located recording id. Listing is
/// metadata-only, so failures fall back to a minimal descriptor rather
/// than failing a locate that already succeeded.
fn describe(
    archive: &dyn Archive,
    cfg: &AppConfig,
    query: &RecordingQuery,
    recording_id: i64,
) -> RecordingDescriptor {
    let window = cfg.locate.list_window;
    let scoped = archive
        .list_recordings_for(&query.channel, query.stream_id, 0, window)
        .unwrap_or_default();
    if let Some(descriptor) = scoped.into_iter().find(|d| d.recording_id == recording_id) {
        return descriptor;
    }
    let all = archive.list_recordings(0, window).unwrap_or_default();
    if let Some(descriptor) = all.into_iter().find(|d| d.recording_id == recording_id) {
        return descriptor;
    }
    RecordingDescriptor {
        recording_id,
        channel: query.resolved_channel.clone(),
        stream_id: query.stream_id,
        session_id: query.session_id,
        start_position: 0,
        stop_position: -1,
        source_identity: String::new(),
    }
}

/// Everything the archive currently knows, for the not-found diagnostic.
/// Best effort: a failing listing yields an empty set, never an error.
pub fn known_recordings(archive: &dyn Archive, window: usize) -> Vec<RecordingDescriptor> {
    archive.list_recordings(0, window).unwrap_or_default()
}
