use crate::errors::ReplayCheckError;

/// Outcome of offering one message to the transport. Anything other than
/// `Accepted` means the same payload must be re-offered; the send side never
/// skips or duplicates an index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Offer {
    Accepted,
    BackPressured,
    NotConnected,
}

/// Send-side endpoint. The transport assigns a session id per connection
/// attempt and may resolve the requested channel to a session-qualified
/// form. Closing the handle is the only signal to the archive that the
/// recorded stream has a final length.
pub trait Publication: Send {
    fn session_id(&self) -> i32;
    fn resolved_channel(&self) -> String;
    fn is_connected(&self) -> bool;
    fn offer(&self, payload: &[u8]) -> Result<Offer, ReplayCheckError>;
    fn close(&self) -> Result<(), ReplayCheckError>;
}

/// Receive-side endpoint. A poll may deliver zero fragments; that is not an
/// error, it is how the replay feeder signals it has nothing (or nothing
/// left) to deliver.
pub trait Subscription: Send {
    fn is_connected(&self) -> bool;
    fn poll(&self, max_fragments: usize) -> Result<Vec<Vec<u8>>, ReplayCheckError>;
    fn close(&self) -> Result<(), ReplayCheckError>;
}

impl std::fmt::Debug for dyn Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("is_connected", &self.is_connected())
            .finish()
    }
}

pub trait Transport: Send + Sync {
    fn open_publication(
        &self,
        channel: &str,
        stream_id: i32,
    ) -> Result<Box<dyn Publication>, ReplayCheckError>;

    fn open_subscription(
        &self,
        channel: &str,
        stream_id: i32,
    ) -> Result<Box<dyn Subscription>, ReplayCheckError>;
}
