use crate::errors::ReplayCheckError;
use crate::runtime::Clock;
use crate::transport::Subscription;
use crate::types::{ConsumptionStats, Termination};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConsumeOutcome {
    pub stats: ConsumptionStats,
    pub termination: Termination,
    pub duration: Duration,
}

/// Polls the replay subscription until the expected count is reached or
/// `idle_limit` consecutive polls come back empty. The idle bound exists
/// because the archive ends a replay by going quiet, not by sending an
/// end-of-stream marker; a stalled replay and a finished one are
/// indistinguishable here, and the stats report whatever was reached.
pub fn consume(
    subscription: &dyn Subscription,
    clock: &dyn Clock,
    expected_count: u64,
    idle_limit: u32,
    max_fragments: usize,
) -> Result<ConsumeOutcome, ReplayCheckError> {
    let started = clock.now();
    let mut stats = ConsumptionStats::default();
    let mut idle_polls = 0u32;

    let termination = loop {
        if stats.message_count >= expected_count {
            break Termination::Complete;
        }
        let fragments = subscription.poll(max_fragments)?;
        if fragments.is_empty() {
            idle_polls += 1;
            if idle_polls >= idle_limit {
                break Termination::Idle;
            }
            clock.yield_now();
            continue;
        }
        idle_polls = 0;
        for fragment in &fragments {
            if let Some(value) = decode(fragment) {
                stats.observe(value);
            }
        }
    };

    let duration = clock.now().duration_since(started).unwrap_or_default();
    Ok(ConsumeOutcome {
        stats,
        termination,
        duration,
    })
}

fn decode(fragment: &[u8]) -> Option<i64> {
    let bytes: [u8; 8] = fragment.get(..8)?.try_into().ok()?;
    Some(i64::from_le_bytes(bytes))
}
