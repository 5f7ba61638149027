// crates/core/src/store.rs
//! Persistent account/record store capability.
//!
//! The core only needs filter + project + upsert semantics; each method
//! documents the predicate it stands for. The concrete query language is
//! the implementation's business.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::CoreError;
use crate::types::{Account, FriendRecord, MatchCandidate, PlayerId};

#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Accounts eligible for the primary role — prime, primary-enabled,
    /// not banned — as a random sample of at most `limit` so election
    /// never scans the whole store.
    async fn sample_primary_candidates(&self, limit: u32) -> Result<Vec<Account>, CoreError>;

    /// Identities of private prime accounts: the "parents" a relay
    /// account may speak for.
    async fn private_prime_ids(&self) -> Result<Vec<PlayerId>, CoreError>;

    /// Accounts eligible for the relay role — store-type, not prime —
    /// whose friend list intersects `parents`.
    async fn relay_candidates(&self, parents: &[PlayerId]) -> Result<Vec<Account>, CoreError>;

    /// Accounts the crawler walks: not banned, not store-type.
    async fn crawl_accounts(&self) -> Result<Vec<Account>, CoreError>;

    /// Look up one owned account by identity.
    async fn find_account(&self, id: &PlayerId) -> Result<Option<Account>, CoreError>;

    /// Write back an owned account (full-record upsert keyed by identity).
    async fn update_account(&self, account: &Account) -> Result<(), CoreError>;

    /// Upsert an observed-identity record. Implementations must preserve
    /// the operator-set `followed` flag on existing rows.
    async fn upsert_friend(&self, record: &FriendRecord) -> Result<(), CoreError>;

    /// Whether the identity has a followed friend record.
    async fn is_followed(&self, id: &PlayerId) -> Result<bool, CoreError>;

    /// Upsert a leaderboard entry keyed by identity, overwriting prior
    /// fields and timestamp. No history is retained.
    async fn upsert_match_candidate(&self, candidate: &MatchCandidate) -> Result<(), CoreError>;

    /// Record that `job` observed `id` at `at`. Monotonic timestamp
    /// overwrite keyed by (job, identity); no other semantics.
    async fn mark_seen(&self, job: &str, id: &PlayerId, at: DateTime<Utc>)
        -> Result<(), CoreError>;
}
