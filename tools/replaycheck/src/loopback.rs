//! In-memory transport/archive pair: every accepted offer lands in the
//! archive's recording store, and replay re-delivers the captured fragments
//! on the replay channel in publish order. Knobs simulate the failure modes
//! a real deployment shows (indexing lag, stripped session qualifiers,
//! back pressure, truncated replay, endpoints that never connect).

use crate::archive::{Archive, REPLAY_LENGTH_ALL};
use crate::errors::ReplayCheckError;
use crate::transport::{Offer, Publication, Subscription, Transport};
use crate::types::RecordingDescriptor;
use std::sync::{Arc, Mutex};

// ── Shared hub state ──────────────────────────────────────────────────────────

struct StoredRecording {
    descriptor: RecordingDescriptor,
    fragments: Vec<Vec<u8>>,
    bytes_recorded: i64,
    finalized: bool,
}

struct ReplayFeed {
    replay_session_id: i64,
    channel: String,
    stream_id: i32,
    fragments: Vec<Vec<u8>>,
    cursor: usize,
    limit: usize,
    stopped: bool,
}

struct Hub {
    next_session_id: i32,
    next_recording_id: i64,
    next_replay_session_id: i64,
    recordings: Vec<StoredRecording>,
    feeds: Vec<ReplayFeed>,
    index_lag_lookups: u32,
    strip_session_qualifier: bool,
    replay_truncate_after: Option<usize>,
    backpressure_offers: u32,
    publications_never_connect: bool,
    subscriptions_never_connect: bool,
}

impl Default for Hub {
    fn default() -> Self {
        Self {
            next_session_id: 101,
            next_recording_id: 0,
            next_replay_session_id: 1,
            recordings: Vec::new(),
            feeds: Vec::new(),
            index_lag_lookups: 0,
            strip_session_qualifier: false,
            replay_truncate_after: None,
            backpressure_offers: 0,
            publications_never_connect: false,
            subscriptions_never_connect: false,
        }
    }
}

/// Matches a stored channel against a query: either exact, or the stored
/// channel is the query plus a `?session-id=` qualifier. Lets base-channel
/// queries see session-qualified recordings without letting a qualified
/// query match a stripped one.
fn channel_matches(stored: &str, query: &str) -> bool {
    stored == query || stored.strip_prefix(query).is_some_and(|rest| rest.starts_with('?'))
}

// ── Loopback handle and knobs ─────────────────────────────────────────────────

#[derive(Clone, Default)]
pub struct Loopback {
    hub: Arc<Mutex<Hub>>,
}

impl Loopback {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn transport(&self) -> Arc<dyn Transport> {
        Arc::new(LoopbackTransport {
            hub: Arc::clone(&self.hub),
        })
    }

    pub fn archive(&self) -> Arc<dyn Archive> {
        Arc::new(InMemoryArchive {
            hub: Arc::clone(&self.hub),
        })
    }

    /// Number of `find_recording` calls that miss before the index catches
    /// up. One locate attempt issues up to two lookups (exact + fallback).
    pub fn set_index_lag_lookups(&self, lookups: u32) {
        self.hub.lock().expect("hub lock").index_lag_lookups = lookups;
    }

    /// Index recordings under the base channel instead of the resolved,
    /// session-qualified channel, so exact-match lookups miss.
    pub fn set_strip_session_qualifier(&self, on: bool) {
        self.hub.lock().expect("hub lock").strip_session_qualifier = on;
    }

    /// Deliver at most `n` fragments per replay, simulating a replay that
    /// goes quiet partway through the recording.
    pub fn set_replay_truncate_after(&self, n: usize) {
        self.hub.lock().expect("hub lock").replay_truncate_after = Some(n);
    }

    /// Back-pressure the next `n` offers before accepting.
    pub fn set_backpressure_offers(&self, n: u32) {
        self.hub.lock().expect("hub lock").backpressure_offers = n;
    }

    pub fn set_publications_never_connect(&self, on: bool) {
        self.hub.lock().expect("hub lock").publications_never_connect = on;
    }

    pub fn set_subscriptions_never_connect(&self, on: bool) {
        self.hub.lock().expect("hub lock").subscriptions_never_connect = on;
    }
}

// ── Transport side ────────────────────────────────────────────────────────────

struct LoopbackTransport {
    hub: Arc<Mutex<Hub>>,
}

impl Transport for LoopbackTransport {
    fn open_publication(
        &self,
        channel: &str,
        stream_id: i32,
    ) -> Result<Box<dyn Publication>, ReplayCheckError> {
        let mut hub = self.hub.lock().expect("hub lock");
        let session_id = hub.next_session_id;
        hub.next_session_id += 1;
        let recording_id = hub.next_recording_id;
        hub.next_recording_id += 1;

        let resolved_channel = format!("{channel}?session-id={session_id}");
        let indexed_channel = if hub.strip_session_qualifier {
            channel.to_string()
        } else {
            resolved_channel.clone()
        };

        hub.recordings.push(StoredRecording {
            descriptor: RecordingDescriptor {
                recording_id,
                channel: indexed_channel,
                stream_id,
                session_id,
                start_position: 0,
                stop_position: -1,
                source_identity: "loopback".to_string(),
            },
            fragments: Vec::new(),
            bytes_recorded: 0,
            finalized: false,
        });

        Ok(Box::new(LoopbackPublication {
            hub: Arc::clone(&self.hub),
            recording_id,
            session_id,
            resolved_channel,
        }))
    }

    fn open_subscription(
        &self,
        channel: &str,
        stream_id: i32,
    ) -> Result<Box<dyn Subscription>, ReplayCheckError> {
        Ok(Box::new(LoopbackSubscription {
            hub: Arc::clone(&self.hub),
            channel: channel.to_string(),
            stream_id,
        }))
    }
}

struct LoopbackPublication {
    hub: Arc<Mutex<Hub>>,
    recording_id: i64,
    session_id: i32,
    resolved_channel: String,
}

impl LoopbackPublication {
    fn with_recording<T>(
        &self,
        f: impl FnOnce(&mut Hub, usize) -> Result<T, ReplayCheckError>,
    ) -> Result<T, ReplayCheckError> {
        let mut hub = self.hub.lock().expect("hub lock");
        let index = hub
            .recordings
            .iter()
            .position(|r| r.descriptor.recording_id == self.recording_id)
            .ok_or_else(|| {
                ReplayCheckError::Transport(format!(
                    "recording {} vanished from loopback hub",
                    self.recording_id
                ))
            })?;
        f(&mut hub, index)
    }
}

impl Publication for LoopbackPublication {
    fn session_id(&self) -> i32 {
        self.session_id
    }

    fn resolved_channel(&self) -> String {
        self.resolved_channel.clone()
    }

    fn is_connected(&self) -> bool {
        !self.hub.lock().expect("hub lock").publications_never_connect
    }

    fn offer(&self, payload: &[u8]) -> Result<Offer, ReplayCheckError> {
        self.with_recording(|hub, index| {
            if hub.publications_never_connect {
                return Ok(Offer::NotConnected);
            }
            if hub.backpressure_offers > 0 {
                hub.backpressure_offers -= 1;
                return Ok(Offer::BackPressured);
            }
            let recording = &mut hub.recordings[index];
            if recording.finalized {
                return Err(ReplayCheckError::Transport(
                    "offer on closed publication".to_string(),
                ));
            }
            recording.fragments.push(payload.to_vec());
            recording.bytes_recorded += payload.len() as i64;
            Ok(Offer::Accepted)
        })
    }

    fn close(&self) -> Result<(), ReplayCheckError> {
        self.with_recording(|hub, index| {
            let recording = &mut hub.recordings[index];
            if !recording.finalized {
                recording.finalized = true;
                recording.descriptor.stop_position = recording.bytes_recorded;
            }
            Ok(())
        })
    }
}

struct LoopbackSubscription {
    hub: Arc<Mutex<Hub>>,
    channel: String,
    stream_id: i32,
}

impl Subscription for LoopbackSubscription {
    fn is_connected(&self) -> bool {
        let hub = self.hub.lock().expect("hub lock");
        if hub.subscriptions_never_connect {
            return false;
        }
        // The replay feeder is the producer; the endpoint connects once a
        // replay session targets this channel/stream and stays connected.
        hub.feeds
            .iter()
            .any(|feed| feed.channel == self.channel && feed.stream_id == self.stream_id)
    }

    fn poll(&self, max_fragments: usize) -> Result<Vec<Vec<u8>>, ReplayCheckError> {
        let mut hub = self.hub.lock().expect("hub lock");
        if hub.subscriptions_never_connect {
            return Ok(Vec::new());
        }
        let Some(feed) = hub.feeds.iter_mut().find(|feed| {
            feed.channel == self.channel
                && feed.stream_id == self.stream_id
                && !feed.stopped
                && feed.cursor < feed.limit
        }) else {
            return Ok(Vec::new());
        };
        let remaining = feed.limit.saturating_sub(feed.cursor);
        let take = remaining.min(max_fragments);
        let delivered = feed.fragments[feed.cursor..feed.cursor + take].to_vec();
        feed.cursor += take;
        Ok(delivered)
    }

    fn close(&self) -> Result<(), ReplayCheckError> {
        Ok(())
    }
}

// ── Archive side ──────────────────────────────────────────────────────────────

struct InMemoryArchive {
    hub: Arc<Mutex<Hub>>,
}

impl Archive for InMemoryArchive {
    fn find_recording(
        &self,
        channel: &str,
        stream_id: i32,
        session_id: Option<i32>,
    ) -> Result<Option<i64>, ReplayCheckError> {
        let mut hub = self.hub.lock().expect("hub lock");
        if hub.index_lag_lookups > 0 {
            hub.index_lag_lookups -= 1;
            return Ok(None);
        }
        let found = hub
            .recordings
            .iter()
            .rev()
            .find(|recording| {
                recording.finalized
                    && recording.descriptor.stream_id == stream_id
                    && channel_matches(&recording.descriptor.channel, channel)
                    && session_id.map_or(true, |s| recording.descriptor.session_id == s)
            })
            .map(|recording| recording.descriptor.recording_id);
        Ok(found)
    }

    fn list_recordings(
        &self,
        from_index: usize,
        count: usize,
    ) -> Result<Vec<RecordingDescriptor>, ReplayCheckError> {
        let hub = self.hub.lock().expect("hub lock");
        Ok(hub
            .recordings
            .iter()
            .skip(from_index)
            .take(count)
            .map(|recording| recording.descriptor.clone())
            .collect())
    }

    fn list_recordings_for(
        &self,
        channel: &str,
        stream_id: i32,
        from_index: usize,
        count: usize,
    ) -> Result<Vec<RecordingDescriptor>, ReplayCheckError> {
        let hub = self.hub.lock().expect("hub lock");
        Ok(hub
            .recordings
            .iter()
            .filter(|recording| {
                recording.descriptor.stream_id == stream_id
                    && channel_matches(&recording.descriptor.channel, channel)
            })
            .skip(from_index)
            .take(count)
            .map(|recording| recording.descriptor.clone())
            .collect())
    }

    fn start_replay(
        &self,
        recording_id: i64,
        from_position: i64,
        length: i64,
        replay_channel: &str,
        replay_stream_id: i32,
    ) -> Result<i64, ReplayCheckError> {
        if from_position != 0 {
            return Err(ReplayCheckError::Archive(format!(
                "loopback archive only replays from position 0, got {from_position}"
            )));
        }
        if length != REPLAY_LENGTH_ALL {
            return Err(ReplayCheckError::Archive(format!(
                "loopback archive only replays full recordings, got length {length}"
            )));
        }
        let mut hub = self.hub.lock().expect("hub lock");
        let recording = hub
            .recordings
            .iter()
            .find(|r| r.descriptor.recording_id == recording_id)
            .ok_or_else(|| {
                ReplayCheckError::Archive(format!("unknown recording {recording_id}"))
            })?;
        if !recording.finalized {
            return Err(ReplayCheckError::Archive(format!(
                "recording {recording_id} is still active"
            )));
        }
        let fragments = recording.fragments.clone();
        let limit = hub
            .replay_truncate_after
            .map_or(fragments.len(), |n| n.min(fragments.len()));

        let replay_session_id = hub.next_replay_session_id;
        hub.next_replay_session_id += 1;
        hub.feeds.push(ReplayFeed {
            replay_session_id,
            channel: replay_channel.to_string(),
            stream_id: replay_stream_id,
            fragments,
            cursor: 0,
            limit,
            stopped: false,
        });
        Ok(replay_session_id)
    }

    fn stop_replay(&self, replay_session_id: i64) -> Result<(), ReplayCheckError> {
        let mut hub = self.hub.lock().expect("hub lock");
        let feed = hub
            .feeds
            .iter_mut()
            .find(|feed| feed.replay_session_id == replay_session_id)
            .ok_or_else(|| {
                ReplayCheckError::Archive(format!("unknown replay session {replay_session_id}"))
            })?;
        // A fully delivered feed counts as finished on the archive side.
        if feed.stopped || feed.cursor >= feed.limit {
            return Err(ReplayCheckError::ReplayAlreadyStopped(replay_session_id));
        }
        feed.stopped = true;
        Ok(())
    }
}
