use crate::types::{ConsumptionStats, VerificationReport};
use std::time::Duration;

/// Pure comparison of expected against observed. A mismatch is the run's
/// verdict, not an error: the caller decides what to do with a failed
/// verification.
pub fn report(
    expected_count: u64,
    stats: &ConsumptionStats,
    publish_duration: Duration,
    replay_duration: Duration,
) -> VerificationReport {
    let efficiency_pct = if expected_count == 0 {
        0.0
    } else {
        stats.message_count as f64 * 100.0 / expected_count as f64
    };
    let complete = stats.message_count == expected_count;
    let matched = complete
        && stats.first_value == Some(0)
        && stats.last_value == Some(expected_count as i64 - 1);

    VerificationReport {
        expected_count,
        message_count: stats.message_count,
        first_value: stats.first_value,
        last_value: stats.last_value,
        efficiency_pct,
        matched,
        publish_millis: publish_duration.as_millis() as u64,
        replay_millis: replay_duration.as_millis() as u64,
    }
}

/// Human-readable results block. Kept apart from `report` so the verdict
/// stays a pure value.
pub fn render(report: &VerificationReport) -> String {
    let first = report.first_value.map_or("-".to_string(), |v| v.to_string());
    let last = report.last_value.map_or("-".to_string(), |v| v.to_string());
    let verdict = if report.matched {
        "VERIFIED: all messages replayed in order".to_string()
    } else {
        format!(
            "MISMATCH: expected {} messages but replayed {}",
            report.expected_count, report.message_count
        )
    };
    format!(
        "=== RESULTS ===\n\
         Published: {} messages\n\
         Replayed:  {} messages\n\
         First value: {first} (expected 0)\n\
         Last value:  {last} (expected {})\n\
         Publish time: {} ms\n\
         Replay time:  {} ms\n\
         REPLAY EFFICIENCY: {:.2}%\n\
         {verdict}",
        report.expected_count,
        report.message_count,
        report.expected_count.saturating_sub(1),
        report.publish_millis,
        report.replay_millis,
        report.efficiency_pct,
    )
}
