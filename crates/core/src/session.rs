// crates/core/src/session.rs
//! Capability traits for the authenticated game-client transport.
//!
//! The concrete handshake lives outside the core; this module only fixes
//! the surface the pool, crawler and poll task consume. `acquire` returns
//! a tagged outcome instead of delivering the session through a callback,
//! so callers branch explicitly on playability.

use async_trait::async_trait;

use crate::error::CoreError;
use crate::types::{MatchCandidate, PartySearchParams, PlayerId, ProfileSnapshot};

/// Outcome of a session acquisition attempt.
///
/// Transient provider failures surface as `Unplayable`; the caller moves
/// on to the next candidate rather than treating them as errors.
pub enum Acquire {
    Playable(Box<dyn GameSession>),
    Unplayable,
}

impl std::fmt::Debug for Acquire {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Acquire::Playable(_) => f.write_str("Playable"),
            Acquire::Unplayable => f.write_str("Unplayable"),
        }
    }
}

/// A live, exclusively-owned game session.
///
/// Ownership discipline: whoever holds the box must release it (detach
/// listeners, then log off) on every exit path before discarding it. A
/// leaked session keeps a credential logged in with stale event bindings.
#[async_trait]
pub trait GameSession: Send + Sync {
    /// Whether the session is still usable. A degraded session may keep
    /// answering `false` here without the transport having dropped.
    async fn is_playable(&self) -> bool;

    /// Fetch a profile snapshot for any identity through this session.
    /// `Ok(None)` means the provider had nothing for this identity right
    /// now; the caller retries on a later run.
    async fn profile(&self, id: &PlayerId) -> Result<Option<ProfileSnapshot>, CoreError>;

    /// Run one privileged party-search query. Only meaningful on a
    /// primary-role session. The timeout inside `params` is the only
    /// cancellation granularity the system has.
    async fn party_search(
        &self,
        params: &PartySearchParams,
    ) -> Result<Vec<MatchCandidate>, CoreError>;

    /// Send a direct message to a peer. Only meaningful on a relay-role
    /// session.
    async fn send_direct_message(&self, to: &PlayerId, text: &str) -> Result<(), CoreError>;

    /// Acknowledge a pending matchmaking cooldown penalty.
    async fn acknowledge_cooldown(&self) -> Result<(), CoreError>;

    /// Detach all default event listeners. Idempotent.
    async fn detach_listeners(&self);

    /// Log the session off. Errors from an already-dead session are the
    /// provider's to report; callers swallow them.
    async fn log_off(&self) -> Result<(), CoreError>;
}

/// Yields playable sessions for credentials.
#[async_trait]
pub trait SessionProvider: Send + Sync {
    async fn acquire(&self, credential: &str) -> Acquire;
}

/// Release a session: detach listeners, then log off, swallowing provider
/// errors. Logging off an already-dead session must never abort the
/// caller.
pub async fn release(session: Box<dyn GameSession>) {
    session.detach_listeners().await;
    if let Err(e) = session.log_off().await {
        tracing::warn!(error = %e, "log-off failed during session release");
    }
}
