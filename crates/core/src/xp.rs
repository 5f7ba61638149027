// crates/core/src/xp.rs
//! Weekly XP ledger accounting.
//!
//! Pure calendar + arithmetic: given the stored ledger and a freshly
//! observed progress counter, compute the next ledger state. The weekly
//! boundary is the Wednesday of the ISO week at 01:00 UTC; the raw
//! counter wraps at a fixed modulus whenever the account advances a rank.

use chrono::{DateTime, Datelike, Duration, NaiveTime, TimeZone, Utc};

use crate::types::XpLedger;

/// Progression constants. The wrap modulus and rank threshold come from
/// game-side progression rules, not from anything derived in this crate.
#[derive(Debug, Clone, Copy)]
pub struct XpConfig {
    /// The raw progress counter wraps back past zero at this modulus.
    pub wrap_modulus: i64,
}

impl Default for XpConfig {
    fn default() -> Self {
        Self { wrap_modulus: 5_000 }
    }
}

/// Outcome of applying an observed progress counter to a ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerOutcome {
    /// The ledger changed; persist the new state.
    Updated(XpLedger),
    /// Nothing worth writing (malformed counter, or zero delta within the
    /// same week).
    NoChange,
}

/// The most recent weekly-reset boundary that is not in the future.
///
/// Start from this ISO week's Wednesday 01:00 UTC and step back a week
/// while the candidate is still ahead of `now`. The result is always
/// `<= now` and `> now - 7 days`.
pub fn weekly_reset_marker(now: DateTime<Utc>) -> DateTime<Utc> {
    let date = now.date_naive();
    let monday = date - Duration::days(i64::from(date.weekday().num_days_from_monday()));
    let midnight = NaiveTime::from_hms_opt(0, 0, 0).expect("valid time");
    let mut marker =
        Utc.from_utc_datetime(&monday.and_time(midnight)) + Duration::days(2) + Duration::hours(1);
    while marker > now {
        marker -= Duration::weeks(1);
    }
    marker
}

/// Apply a freshly observed progress counter to the ledger.
///
/// A negative raw delta means the counter wrapped; it is corrected by the
/// modulus. On a new week the weekly total rebases to the corrected delta
/// and the marker moves forward; the lifetime total keeps accumulating
/// either way.
pub fn apply_progress(
    config: &XpConfig,
    ledger: &XpLedger,
    observed: Option<i64>,
    now: DateTime<Utc>,
) -> LedgerOutcome {
    let Some(next) = observed else {
        return LedgerOutcome::NoChange;
    };

    let marker = weekly_reset_marker(now);
    let new_week = marker != ledger.week_marker;

    let mut delta = next - ledger.current_progress;
    if delta < 0 {
        delta += config.wrap_modulus;
    }

    if new_week {
        return LedgerOutcome::Updated(XpLedger {
            current_progress: next,
            week_marker: marker,
            earned_this_week: delta,
            earned_lifetime: ledger.earned_lifetime + delta,
        });
    }

    if delta == 0 {
        return LedgerOutcome::NoChange;
    }

    LedgerOutcome::Updated(XpLedger {
        current_progress: next,
        week_marker: ledger.week_marker,
        earned_this_week: ledger.earned_this_week + delta,
        earned_lifetime: ledger.earned_lifetime + delta,
    })
}
