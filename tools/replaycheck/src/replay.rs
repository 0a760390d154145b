use crate::archive::{Archive, REPLAY_LENGTH_ALL};
use crate::config::AppConfig;
use crate::errors::ReplayCheckError;
use crate::retry::retry;
use crate::runtime::Clock;
use crate::transport::{Subscription, Transport};
use crate::types::ReplaySession;

/// Opens the replay subscription, asks the archive to replay the whole
/// recording onto it, and waits for the archive's replay feeder to connect.
/// The caller owns the returned subscription and must close it on every
/// exit path.
pub fn start_replay(
    transport: &dyn Transport,
    archive: &dyn Archive,
    clock: &dyn Clock,
    cfg: &AppConfig,
    recording_id: i64,
) -> Result<(ReplaySession, Box<dyn Subscription>), ReplayCheckError> {
    let subscription =
        transport.open_subscription(&cfg.stream.replay_channel, cfg.stream.replay_stream_id)?;

    let replay_session_id = match archive.start_replay(
        recording_id,
        0,
        REPLAY_LENGTH_ALL,
        &cfg.stream.replay_channel,
        cfg.stream.replay_stream_id,
    ) {
        Ok(id) => id,
        Err(err) => {
            let _ = subscription.close();
            return Err(err);
        }
    };
    let session = ReplaySession {
        replay_session_id,
        recording_id,
        from_position: 0,
        length: REPLAY_LENGTH_ALL,
    };

    let connected = retry(clock, cfg.connect_policy(), |_| {
        Ok(subscription.is_connected().then_some(()))
    });
    match connected {
        Ok(Some(())) => Ok((session, subscription)),
        Ok(None) => {
            let _ = stop_replay(archive, &session);
            let _ = subscription.close();
            Err(ReplayCheckError::ConnectTimeout {
                endpoint: "replay subscription",
                channel: cfg.stream.replay_channel.clone(),
                stream_id: cfg.stream.replay_stream_id,
                polls: cfg.connect.max_polls,
            })
        }
        Err(err) => {
            let _ = stop_replay(archive, &session);
            let _ = subscription.close();
            Err(err)
        }
    }
}

/// Stops a replay session. Safe to call after the replay has naturally
/// completed: the archive's "already stopped" response is swallowed, any
/// other failure propagates.
pub fn stop_replay(archive: &dyn Archive, session: &ReplaySession) -> Result<(), ReplayCheckError> {
    match archive.stop_replay(session.replay_session_id) {
        Err(ReplayCheckError::ReplayAlreadyStopped(_)) => Ok(()),
        other => other,
    }
}
