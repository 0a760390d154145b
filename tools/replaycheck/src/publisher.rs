use crate::config::AppConfig;
use crate::errors::ReplayCheckError;
use crate::retry::{retry, spin};
use crate::runtime::Clock;
use crate::transport::{Offer, Transport};
use std::time::Duration;

/// What the locator needs to correlate the publication with its recording,
/// plus the wall-clock publish time for the report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishOutcome {
    pub session_id: i32,
    pub resolved_channel: String,
    pub duration: Duration,
}

/// Publishes `publish.message_count` fixed-size messages on the recorded
/// channel, payload `i` at index `i` as a little-endian i64. Back pressure
/// re-offers the same payload with a yield in between; indexes are never
/// skipped or duplicated. The handle is closed after the last accepted
/// offer so the archive sees a final stream length.
pub fn publish(
    transport: &dyn Transport,
    clock: &dyn Clock,
    cfg: &AppConfig,
) -> Result<PublishOutcome, ReplayCheckError> {
    if cfg.publish.message_count == 0 {
        return Err(ReplayCheckError::InvalidConfig(
            "cannot publish zero messages".to_string(),
        ));
    }
    if cfg.publish.message_size < 8 {
        return Err(ReplayCheckError::InvalidConfig(
            "message size below the 8-byte payload".to_string(),
        ));
    }

    let publication = transport.open_publication(&cfg.stream.channel, cfg.stream.stream_id)?;
    let session_id = publication.session_id();
    let resolved_channel = publication.resolved_channel();

    let connected = retry(clock, cfg.connect_policy(), |_| {
        Ok(publication.is_connected().then_some(()))
    });
    match connected {
        Ok(Some(())) => {}
        Ok(None) => {
            let _ = publication.close();
            return Err(ReplayCheckError::ConnectTimeout {
                endpoint: "publication",
                channel: cfg.stream.channel.clone(),
                stream_id: cfg.stream.stream_id,
                polls: cfg.connect.max_polls,
            });
        }
        Err(err) => {
            let _ = publication.close();
            return Err(err);
        }
    }

    let started = clock.now();
    let mut payload = vec![0u8; cfg.publish.message_size];
    for index in 0..cfg.publish.message_count {
        payload[..8].copy_from_slice(&(index as i64).to_le_bytes());
        let offered = spin(clock, || match publication.offer(&payload)? {
            Offer::Accepted => Ok(Some(())),
            Offer::BackPressured | Offer::NotConnected => Ok(None),
        });
        if let Err(err) = offered {
            let _ = publication.close();
            return Err(err);
        }
    }
    let duration = clock
        .now()
        .duration_since(started)
        .unwrap_or_default();

    publication.close()?;
    Ok(PublishOutcome {
        session_id,
        resolved_channel,
        duration,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loopback::Loopback;
    use crate::runtime::FakeClock;

    fn quick_config(count: u64) -> AppConfig {
        let mut cfg = AppConfig::default();
        cfg.publish.message_count = count;
        cfg.connect.max_polls = 5;
        cfg
    }

    #[test]
    fn publishes_full_sequence_and_finalizes_recording() {
        let loopback = Loopback::new();
        let clock = FakeClock::default();
        let cfg = quick_config(10);

        let outcome =
            publish(loopback.transport().as_ref(), &clock, &cfg).expect("publish");
        assert!(outcome.resolved_channel.starts_with("aeron:ipc?session-id="));

        let recordings = loopback.archive().list_recordings(0, 10).expect("list");
        assert_eq!(recordings.len(), 1);
        assert_eq!(recordings[0].session_id, outcome.session_id);
        // 10 messages at the default 8-byte size.
        assert_eq!(recordings[0].stop_position, 80);
    }

    #[test]
    fn backpressure_re_offers_the_same_index() {
        let loopback = Loopback::new();
        loopback.set_backpressure_offers(3);
        let clock = FakeClock::default();
        let cfg = quick_config(5);

        publish(loopback.transport().as_ref(), &clock, &cfg).expect("publish");

        // All five messages land despite the pushback, and each rejected
        // offer cost one yield.
        let recordings = loopback.archive().list_recordings(0, 10).expect("list");
        assert_eq!(recordings[0].stop_position, 40);
        assert_eq!(clock.yield_count(), 3);
    }

    #[test]
    fn unconnected_publication_times_out_after_bounded_polls() {
        let loopback = Loopback::new();
        loopback.set_publications_never_connect(true);
        let clock = FakeClock::default();
        let cfg = quick_config(5);

        let err = publish(loopback.transport().as_ref(), &clock, &cfg)
            .expect_err("never connects");
        assert!(matches!(
            err,
            ReplayCheckError::ConnectTimeout {
                endpoint: "publication",
                polls: 5,
                ..
            }
        ));
        assert_eq!(clock.sleeps().len(), 4);
    }

    #[test]
    fn wider_payloads_still_carry_the_index_in_the_first_8_bytes() {
        let loopback = Loopback::new();
        let clock = FakeClock::default();
        let mut cfg = quick_config(3);
        cfg.publish.message_size = 32;

        publish(loopback.transport().as_ref(), &clock, &cfg).expect("publish");
        let recordings = loopback.archive().list_recordings(0, 10).expect("list");
        assert_eq!(recordings[0].stop_position, 96);
    }
}
