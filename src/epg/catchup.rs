//! Catch-up window rules for past programs

use crate::error::{PvrError, Result};

use super::parser::EpgEntry;

const SECONDS_PER_HOUR: i64 = 3600;

/// Oldest end time still inside a `catchup_hours` window at `now`
fn window_start(catchup_hours: i64, now: i64) -> i64 {
    now.saturating_sub(catchup_hours.saturating_mul(SECONDS_PER_HOUR))
}

/// True iff the channel offers catch-up, the program has fully ended, and it
/// ended no longer than `catchup_hours` ago.
pub fn is_playable_at(entry: &EpgEntry, catchup_hours: i64, now: i64) -> bool {
    catchup_hours > 0 && entry.end <= now && entry.end >= window_start(catchup_hours, now)
}

/// Re-check before building catch-up stream properties. Violations are
/// `NotEligible`, never a server error.
pub fn check_catchup_window(entry: &EpgEntry, catchup_hours: i64, now: i64) -> Result<()> {
    if catchup_hours <= 0 {
        return Err(PvrError::NotEligible(format!(
            "channel {} has no catch-up window",
            entry.channel_uid
        )));
    }
    if entry.start > now {
        return Err(PvrError::NotEligible(format!(
            "program starts in the future ({} > {})",
            entry.start, now
        )));
    }
    if entry.end < window_start(catchup_hours, now) {
        return Err(PvrError::NotEligible(format!(
            "program ended outside the {}h catch-up window",
            catchup_hours
        )));
    }
    Ok(())
}

/// Current wall-clock time as Unix timestamp
pub fn current_timestamp() -> i64 {
    chrono::Utc::now().timestamp()
}
