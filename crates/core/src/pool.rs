// crates/core/src/pool.rs
//! Session pool: keeps one playable session per role (primary, relay),
//! swapping a role's session in atomically only when a better candidate
//! is actually playable, and running the guarded re-election path when the
//! matchmaking poll has gone empty for too long.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, info, warn};

use crate::error::CoreError;
use crate::session::{release, Acquire, GameSession, SessionProvider};
use crate::store::AccountStore;
use crate::types::PlayerId;

/// Election policy knobs.
#[derive(Debug, Clone, Copy)]
pub struct PoolConfig {
    /// Upper bound on candidates sampled per election, so an election
    /// never scans the whole store.
    pub candidate_limit: u32,
    /// Consecutive empty poll results before a forced primary
    /// re-election.
    pub empty_poll_threshold: u32,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            candidate_limit: 16,
            empty_poll_threshold: 30,
        }
    }
}

/// The relay session plus the privileged identity it speaks for.
pub struct RelaySlot {
    pub session: Box<dyn GameSession>,
    /// The private prime "parent" account this relay counts among its
    /// friends; direct messages go here.
    pub parent: Option<PlayerId>,
}

/// Owns the live sessions. At most one per role at any time; superseded
/// sessions are always released before being discarded.
pub struct SessionPool {
    store: Arc<dyn AccountStore>,
    provider: Arc<dyn SessionProvider>,
    config: PoolConfig,
    primary: Mutex<Option<Box<dyn GameSession>>>,
    relay: Mutex<Option<RelaySlot>>,
    empty_polls: AtomicU32,
    /// Single-flight guard for the re-election path.
    reelecting: AtomicBool,
}

impl SessionPool {
    pub fn new(
        store: Arc<dyn AccountStore>,
        provider: Arc<dyn SessionProvider>,
        config: PoolConfig,
    ) -> Self {
        Self {
            store,
            provider,
            config,
            primary: Mutex::new(None),
            relay: Mutex::new(None),
            empty_polls: AtomicU32::new(0),
            reelecting: AtomicBool::new(false),
        }
    }

    /// Elect a primary session from a bounded sample of eligible accounts.
    ///
    /// Stops at the first playable candidate; the superseded session (if
    /// any) is released after the replacement is in hand. When nothing is
    /// playable the current session, however degraded, stays installed.
    /// Returns whether a new session was installed.
    pub async fn elect_primary(&self) -> Result<bool, CoreError> {
        let candidates = self
            .store
            .sample_primary_candidates(self.config.candidate_limit)
            .await?;
        if candidates.is_empty() {
            debug!("primary election: no eligible candidates");
            return Ok(false);
        }

        for account in candidates {
            match self.provider.acquire(&account.credential).await {
                Acquire::Playable(session) => {
                    session.detach_listeners().await;
                    let mut slot = self.primary.lock().await;
                    if let Some(old) = slot.take() {
                        release(old).await;
                    }
                    *slot = Some(session);
                    info!(account = %account.id, "primary session elected");
                    return Ok(true);
                }
                Acquire::Unplayable => {
                    debug!(account = %account.id, "primary candidate unplayable, trying next");
                }
            }
        }

        let slot = self.primary.lock().await;
        if let Some(current) = slot.as_ref() {
            if current.is_playable().await {
                debug!("primary election: no playable candidate, keeping current session");
            } else {
                warn!("primary election: no playable candidate, keeping degraded session");
            }
        } else {
            debug!("primary election: no playable candidate, none installed");
        }
        Ok(false)
    }

    /// Elect a relay session: a store-type account counting a private
    /// prime account among its friends. Records which parent identity the
    /// relay speaks for.
    pub async fn elect_relay(&self) -> Result<bool, CoreError> {
        let parents = self.store.private_prime_ids().await?;
        if parents.is_empty() {
            debug!("relay election: no private prime parents");
            return Ok(false);
        }

        let candidates = self.store.relay_candidates(&parents).await?;
        for account in candidates {
            match self.provider.acquire(&account.credential).await {
                Acquire::Playable(session) => {
                    session.detach_listeners().await;
                    let parent = account
                        .friends
                        .iter()
                        .find(|f| parents.contains(f))
                        .cloned();
                    let mut slot = self.relay.lock().await;
                    if let Some(old) = slot.take() {
                        release(old.session).await;
                    }
                    *slot = Some(RelaySlot { session, parent });
                    info!(account = %account.id, "relay session elected");
                    return Ok(true);
                }
                Acquire::Unplayable => {
                    debug!(account = %account.id, "relay candidate unplayable, trying next");
                }
            }
        }

        debug!("relay election: no playable candidate");
        Ok(false)
    }

    /// Lock the primary slot for the duration of a poll.
    pub async fn primary(&self) -> MutexGuard<'_, Option<Box<dyn GameSession>>> {
        self.primary.lock().await
    }

    pub async fn has_primary(&self) -> bool {
        self.primary.lock().await.is_some()
    }

    /// The parent identity the current relay speaks for, if any.
    pub async fn relay_parent(&self) -> Option<PlayerId> {
        self.relay.lock().await.as_ref().and_then(|s| s.parent.clone())
    }

    /// Send a direct message through the relay to its parent identity.
    /// Returns whether a message went out; failures are logged, never
    /// propagated.
    pub async fn relay_message(&self, text: &str) -> bool {
        let slot = self.relay.lock().await;
        let Some(relay) = slot.as_ref() else {
            debug!("relay message dropped: no relay session");
            return false;
        };
        let Some(parent) = relay.parent.as_ref() else {
            debug!("relay message dropped: relay has no parent identity");
            return false;
        };
        match relay.session.send_direct_message(parent, text).await {
            Ok(()) => true,
            Err(e) => {
                warn!(parent = %parent, error = %e, "relay message failed");
                false
            }
        }
    }

    /// Record one empty poll result; returns the new consecutive count.
    pub fn record_empty_poll(&self) -> u32 {
        self.empty_polls.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn reset_empty_polls(&self) {
        self.empty_polls.store(0, Ordering::Relaxed);
    }

    pub fn empty_polls(&self) -> u32 {
        self.empty_polls.load(Ordering::Relaxed)
    }

    fn over_threshold(&self) -> bool {
        self.empty_polls() > self.config.empty_poll_threshold
    }

    /// Guarded primary re-election after sustained empty polls.
    ///
    /// Single-flight: concurrent triggers collapse to one attempt. The
    /// empty counter is reset *before* the attempt so a failure during
    /// re-election does not compound, and the guard is cleared on every
    /// exit path. Election errors are logged, never propagated. Returns
    /// whether an attempt ran.
    pub async fn maybe_reelect(&self) -> bool {
        if !self.over_threshold() {
            return false;
        }
        if self
            .reelecting
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }

        self.reset_empty_polls();
        info!("empty-poll threshold exceeded, re-electing primary session");
        match self.elect_primary().await {
            Ok(true) => info!("re-election installed a fresh primary session"),
            Ok(false) => warn!("re-election found no playable candidate"),
            Err(e) => warn!(error = %e, "re-election failed"),
        }
        self.reelecting.store(false, Ordering::Release);
        true
    }

    /// Release both role sessions. Used at process shutdown.
    pub async fn shutdown(&self) {
        if let Some(session) = self.primary.lock().await.take() {
            release(session).await;
        }
        if let Some(slot) = self.relay.lock().await.take() {
            release(slot.session).await;
        }
    }
}
