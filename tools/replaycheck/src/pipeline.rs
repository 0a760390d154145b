//! One sequential verification run: publish, locate, replay, consume,
//! report. Each phase completes before the next starts; the phases share
//! nothing but the values threaded between them.

use crate::config::AppConfig;
use crate::consumer;
use crate::errors::ReplayCheckError;
use crate::locator::{self, RecordingQuery};
use crate::logging::{JsonlLogger, RunEvent};
use crate::publisher;
use crate::replay;
use crate::report;
use crate::runtime::Harness;
use crate::types::{RecordingDescriptor, Termination, VerificationReport};
use serde_json::json;

#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub recording: RecordingDescriptor,
    pub termination: Termination,
    pub report: VerificationReport,
}

pub fn run_verification(
    cfg: &AppConfig,
    harness: &Harness,
    logger: &JsonlLogger,
) -> Result<RunSummary, ReplayCheckError> {
    let clock = harness.clock.as_ref();
    let transport = harness.transport.as_ref();
    let archive = harness.archive.as_ref();

    logger.append_quiet(&RunEvent {
        level: "info",
        phase: "publish",
        payload: json!({
            "channel": cfg.stream.channel,
            "stream_id": cfg.stream.stream_id,
            "message_count": cfg.publish.message_count,
            "message_size": cfg.publish.message_size,
        }),
    });
    let published = publisher::publish(transport, clock, cfg)?;
    logger.append_quiet(&RunEvent {
        level: "info",
        phase: "publish",
        payload: json!({
            "session_id": published.session_id,
            "resolved_channel": published.resolved_channel,
            "millis": published.duration.as_millis() as u64,
        }),
    });

    let query = RecordingQuery {
        channel: cfg.stream.channel.clone(),
        stream_id: cfg.stream.stream_id,
        session_id: published.session_id,
        resolved_channel: published.resolved_channel.clone(),
    };
    let recording = match locator::locate(archive, clock, cfg, &query) {
        Ok(recording) => recording,
        Err(err) => {
            if matches!(err, ReplayCheckError::RecordingNotFound { .. }) {
                let known = locator::known_recordings(archive, cfg.locate.list_window);
                logger.append_quiet(&RunEvent {
                    level: "error",
                    phase: "locate",
                    payload: json!({
                        "session_id": published.session_id,
                        "known_recordings": known,
                    }),
                });
            }
            return Err(err);
        }
    };
    logger.append_quiet(&RunEvent {
        level: "info",
        phase: "locate",
        payload: json!({
            "recording_id": recording.recording_id,
            "recorded_bytes": recording.recorded_bytes(),
        }),
    });

    let (session, subscription) = replay::start_replay(transport, archive, clock, cfg, recording.recording_id)?;
    logger.append_quiet(&RunEvent {
        level: "info",
        phase: "replay",
        payload: json!({
            "replay_session_id": session.replay_session_id,
            "replay_channel": cfg.stream.replay_channel,
            "replay_stream_id": cfg.stream.replay_stream_id,
        }),
    });

    let consumed = consumer::consume(
        subscription.as_ref(),
        clock,
        cfg.publish.message_count,
        cfg.consume.idle_poll_limit,
        cfg.consume.max_fragments_per_poll,
    );
    // Release replay resources before interpreting the outcome so a consume
    // failure cannot leave the session or subscription behind.
    let stopped = replay::stop_replay(archive, &session);
    let closed = subscription.close();
    let consumed = consumed?;
    stopped?;
    closed?;

    logger.append_quiet(&RunEvent {
        level: "info",
        phase: "consume",
        payload: json!({
            "message_count": consumed.stats.message_count,
            "termination": consumed.termination,
            "millis": consumed.duration.as_millis() as u64,
        }),
    });

    let report = report::report(
        cfg.publish.message_count,
        &consumed.stats,
        published.duration,
        consumed.duration,
    );
    logger.append_quiet(&RunEvent {
        level: if report.matched { "info" } else { "warn" },
        phase: "report",
        payload: json!(report),
    });

    Ok(RunSummary {
        recording,
        termination: consumed.termination,
        report,
    })
}
