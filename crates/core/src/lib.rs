// crates/core/src/lib.rs
//! Core domain logic for lobbyscout: session-pool election and failover,
//! deduplicated profile crawling, weekly XP accounting, and the capability
//! traits the rest of the system plugs into.

pub mod crawler;
pub mod error;
pub mod notify;
pub mod pool;
pub mod session;
pub mod store;
pub mod types;
pub mod xp;

pub use crawler::{CrawlReport, CrawlerConfig, ProfileCrawler};
pub use error::CoreError;
pub use notify::{format_alert, Notifier};
pub use pool::{PoolConfig, SessionPool};
pub use session::{Acquire, GameSession, SessionProvider};
pub use store::AccountStore;
pub use types::{
    Account, AccountFlags, CooldownPenalty, FriendRecord, MatchCandidate, PartySearchParams,
    PlayerId, ProfileSnapshot, QueueType, XpLedger,
};
pub use xp::{apply_progress, weekly_reset_marker, LedgerOutcome, XpConfig};

#[cfg(test)]
pub(crate) mod testutil;
