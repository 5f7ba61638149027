// crates/core/src/crawler.rs
//! Deduplicated friend-graph profile refresh.
//!
//! One run walks every crawlable owned account, refreshing a bounded,
//! shuffled batch of identities through a single session per account. A
//! run-scoped visited set guarantees each identity is refreshed at most
//! once no matter how many friend lists reference it.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use rand::seq::SliceRandom;
use tracing::{debug, warn};

use crate::error::CoreError;
use crate::session::{release, Acquire, GameSession, SessionProvider};
use crate::store::AccountStore;
use crate::types::{Account, FriendRecord, PlayerId, ProfileSnapshot};
use crate::xp::{apply_progress, LedgerOutcome, XpConfig};

/// Job name written into last-seen markers for refreshed identities.
const SEEN_JOB: &str = "profile-refresh";

/// Crawl policy knobs.
#[derive(Debug, Clone, Copy)]
pub struct CrawlerConfig {
    /// Per-account cap on identities refreshed in one run.
    pub batch_size: usize,
    /// Chance of acknowledging an expired cooldown on any given run, to
    /// spread the acknowledgement load.
    pub ack_chance: f64,
    /// Profile level at which the advanced matchmaking tier unlocks.
    pub advanced_tier_level: i64,
    pub xp: XpConfig,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            batch_size: 30,
            ack_chance: 0.30,
            advanced_tier_level: 10,
            xp: XpConfig::default(),
        }
    }
}

/// Summary of one crawl run, logged by the scheduler task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlReport {
    pub wide: bool,
    pub accounts_scanned: usize,
    pub sessions_acquired: usize,
    pub profiles_refreshed: usize,
    pub profiles_missing: usize,
    pub elapsed: Duration,
}

pub struct ProfileCrawler {
    store: Arc<dyn AccountStore>,
    provider: Arc<dyn SessionProvider>,
    config: CrawlerConfig,
}

impl ProfileCrawler {
    pub fn new(
        store: Arc<dyn AccountStore>,
        provider: Arc<dyn SessionProvider>,
        config: CrawlerConfig,
    ) -> Self {
        Self {
            store,
            provider,
            config,
        }
    }

    /// Run one crawl. `wide` includes identities outside the owned-account
    /// universe; otherwise only owned identities are refreshed.
    pub async fn run(&self, wide: bool) -> Result<CrawlReport, CoreError> {
        let started = Instant::now();
        let accounts = self.store.crawl_accounts().await?;
        let owned: HashSet<PlayerId> = accounts.iter().map(|a| a.id.clone()).collect();

        let mut report = CrawlReport {
            wide,
            accounts_scanned: 0,
            sessions_acquired: 0,
            profiles_refreshed: 0,
            profiles_missing: 0,
            elapsed: Duration::ZERO,
        };
        let mut visited: HashSet<PlayerId> = HashSet::new();

        for account in &accounts {
            if visited.contains(&account.id) {
                continue;
            }
            report.accounts_scanned += 1;

            let batch = self.pick_batch(account, &owned, &visited, wide);
            if batch.is_empty() {
                continue;
            }

            let session = match self.provider.acquire(&account.credential).await {
                Acquire::Playable(session) => session,
                Acquire::Unplayable => {
                    debug!(account = %account.id, "crawl skipping account, session unplayable");
                    continue;
                }
            };
            report.sessions_acquired += 1;

            self.maybe_acknowledge_cooldown(account, session.as_ref())
                .await;

            for id in batch {
                match session.profile(&id).await {
                    Ok(Some(snapshot)) => {
                        if let Err(e) = self.merge(&id, &snapshot).await {
                            warn!(identity = %id, error = %e, "profile merge failed");
                        }
                        visited.insert(id);
                        report.profiles_refreshed += 1;
                    }
                    Ok(None) => {
                        // Not refreshed: stays out of the visited set and
                        // gets retried on a later run.
                        report.profiles_missing += 1;
                    }
                    Err(e) => {
                        warn!(identity = %id, error = %e, "profile fetch failed");
                        report.profiles_missing += 1;
                    }
                }
            }

            release(session).await;
        }

        report.elapsed = started.elapsed();
        Ok(report)
    }

    /// Candidate identities for one account: itself plus its friends,
    /// deduped, minus already-visited, restricted to owned identities
    /// unless `wide`, shuffled, and capped at the batch size.
    fn pick_batch(
        &self,
        account: &Account,
        owned: &HashSet<PlayerId>,
        visited: &HashSet<PlayerId>,
        wide: bool,
    ) -> Vec<PlayerId> {
        let mut local: HashSet<&PlayerId> = HashSet::new();
        let mut batch: Vec<PlayerId> = std::iter::once(&account.id)
            .chain(account.friends.iter())
            .filter(|id| local.insert(*id))
            .filter(|id| !visited.contains(*id))
            .filter(|id| wide || owned.contains(*id))
            .cloned()
            .collect();

        batch.shuffle(&mut rand::thread_rng());
        batch.truncate(self.config.batch_size);
        batch
    }

    /// Acknowledge an expired, unacknowledged cooldown with a dice roll,
    /// persisting the acknowledgement so the next run does not repeat it.
    async fn maybe_acknowledge_cooldown(&self, account: &Account, session: &dyn GameSession) {
        let Some(cooldown) = account.cooldown else {
            return;
        };
        if cooldown.acknowledged || cooldown.expires_at > Utc::now() {
            return;
        }
        if rand::random::<f64>() >= self.config.ack_chance {
            return;
        }
        if let Err(e) = session.acknowledge_cooldown().await {
            warn!(account = %account.id, error = %e, "cooldown acknowledgement failed");
            return;
        }
        let mut updated = account.clone();
        updated.cooldown = Some(crate::types::CooldownPenalty {
            acknowledged: true,
            ..cooldown
        });
        if let Err(e) = self.store.update_account(&updated).await {
            warn!(account = %account.id, error = %e, "failed to persist cooldown acknowledgement");
        }
    }

    /// Merge one fetched snapshot: ledger delta via the accountant, sticky
    /// ban flags, advanced-tier threshold, and the always-written friend
    /// record and last-seen marker.
    async fn merge(&self, id: &PlayerId, snapshot: &ProfileSnapshot) -> Result<(), CoreError> {
        let now = Utc::now();

        if let Some(mut account) = self.store.find_account(id).await? {
            if let LedgerOutcome::Updated(next) =
                apply_progress(&self.config.xp, &account.ledger, snapshot.current_progress, now)
            {
                account.ledger = next;
            }
            account.flags.prime = snapshot.prime;
            if let Some(elo) = snapshot.elo {
                account.elo = Some(elo);
            }
            if let Some(level) = snapshot.level {
                account.level = Some(level);
                if level >= self.config.advanced_tier_level {
                    account.advanced_tier = true;
                }
            }
            if snapshot.is_banned() {
                account.flags.banned = true;
            }
            self.store.update_account(&account).await?;
        }

        self.store
            .upsert_friend(&FriendRecord {
                id: id.clone(),
                prime: snapshot.prime,
                elo: snapshot.elo,
                banned: snapshot.is_banned(),
                followed: false, // preserved by the store on existing rows
                last_refreshed: now,
            })
            .await?;

        self.store.mark_seen(SEEN_JOB, id, now).await
    }
}
