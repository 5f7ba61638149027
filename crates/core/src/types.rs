// crates/core/src/types.rs
//! Shared domain types: accounts, ledgers, profile snapshots, and the
//! transient records produced by crawling and matchmaking polls.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Stable identity of a player, whether or not it is one of our own
/// accounts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(pub String);

impl PlayerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PlayerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PlayerId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Role and eligibility flags on an owned account.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountFlags {
    /// Prime matchmaking status observed on the account.
    pub prime: bool,
    /// Sticky ban flag: once set by the crawler it is never cleared here.
    pub banned: bool,
    /// Store-type account (excluded from crawling, eligible for relay).
    pub store_account: bool,
    /// Private profile.
    pub private: bool,
    /// Operator opt-in for the primary (privileged polling) role.
    pub primary_enabled: bool,
}

/// Weekly XP ledger state for one account.
///
/// `earned_this_week` rebases at every weekly boundary; `earned_lifetime`
/// only ever grows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct XpLedger {
    /// Last observed raw progress counter (wraps at the progress modulus).
    pub current_progress: i64,
    /// Canonical weekly-reset boundary this ledger is accumulating against.
    pub week_marker: DateTime<Utc>,
    /// Progress earned since `week_marker`.
    pub earned_this_week: i64,
    /// Progress earned across all weeks. Monotonically non-decreasing.
    pub earned_lifetime: i64,
}

impl Default for XpLedger {
    fn default() -> Self {
        Self {
            current_progress: 0,
            week_marker: DateTime::<Utc>::UNIX_EPOCH,
            earned_this_week: 0,
            earned_lifetime: 0,
        }
    }
}

/// A matchmaking cooldown penalty observed on an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CooldownPenalty {
    pub expires_at: DateTime<Utc>,
    pub acknowledged: bool,
}

/// A persisted owned account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: PlayerId,
    /// Opaque credential handed to the session provider. Never logged.
    pub credential: String,
    pub flags: AccountFlags,
    /// Friend identities in stored order. May contain duplicates; consumers
    /// dedup by identity.
    pub friends: Vec<PlayerId>,
    pub ledger: XpLedger,
    pub cooldown: Option<CooldownPenalty>,
    /// Last observed profile level.
    pub level: Option<i64>,
    pub elo: Option<i64>,
    /// Set once the profile level crosses the advanced-tier threshold.
    /// Never cleared by the crawler.
    pub advanced_tier: bool,
}

impl Account {
    /// Minimal account with default flags and an empty ledger.
    pub fn new(id: impl Into<PlayerId>, credential: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            credential: credential.into(),
            flags: AccountFlags::default(),
            friends: Vec::new(),
            ledger: XpLedger::default(),
            cooldown: None,
            level: None,
            elo: None,
            advanced_tier: false,
        }
    }
}

impl From<String> for PlayerId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Transient result of refreshing one identity through a live session.
///
/// `current_progress` is `None` when the provider returned a malformed or
/// missing counter; the accountant treats that as a no-op.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfileSnapshot {
    pub current_progress: Option<i64>,
    pub elo: Option<i64>,
    pub level: Option<i64>,
    pub prime: bool,
    pub vac_banned: bool,
    pub game_banned: bool,
}

impl ProfileSnapshot {
    pub fn is_banned(&self) -> bool {
        self.vac_banned || self.game_banned
    }
}

/// Lightweight record for any identity we have observed, owned or not.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FriendRecord {
    pub id: PlayerId,
    pub prime: bool,
    pub elo: Option<i64>,
    pub banned: bool,
    /// Operator-set; upserts from the crawler must never clobber this.
    pub followed: bool,
    pub last_refreshed: DateTime<Utc>,
}

/// One player observed in a matchmaking party-search result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchCandidate {
    pub id: PlayerId,
    pub prime: bool,
    pub display_name: String,
    pub rank: String,
    pub friend_code: String,
    pub observed_at: DateTime<Utc>,
}

/// Matchmaking queue type for a privileged party-search query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueType {
    Competitive,
    Wingman,
}

impl std::fmt::Display for QueueType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QueueType::Competitive => f.write_str("competitive"),
            QueueType::Wingman => f.write_str("wingman"),
        }
    }
}

/// Parameters for one privileged party-search query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartySearchParams {
    pub prime: bool,
    pub queue: QueueType,
    /// Minimum rank floor, e.g. "Gold Nova I".
    pub min_rank: String,
    /// Timeout enforced by the provider for this single query.
    pub timeout_secs: u64,
}
