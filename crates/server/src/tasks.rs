// crates/server/src/tasks.rs
//! The recurring units of work: profile refresh runs and the privileged
//! matchmaking poll.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, info, warn};

use lobbyscout_core::{
    format_alert, AccountStore, MatchCandidate, Notifier, PartySearchParams, ProfileCrawler,
    QueueType, SessionPool,
};

use crate::scheduler::PeriodicTask;

/// Friend-graph profile refresh on a fixed cadence. Narrow runs cover
/// owned accounts only; wide runs include everything their friend lists
/// reach.
pub struct ProfileRefreshTask {
    crawler: Arc<ProfileCrawler>,
    wide: bool,
}

impl ProfileRefreshTask {
    pub fn new(crawler: Arc<ProfileCrawler>, wide: bool) -> Self {
        Self { crawler, wide }
    }
}

#[async_trait]
impl PeriodicTask for ProfileRefreshTask {
    async fn run(&self) -> anyhow::Result<()> {
        let report = self.crawler.run(self.wide).await?;
        info!(
            wide = report.wide,
            accounts_scanned = report.accounts_scanned,
            sessions_acquired = report.sessions_acquired,
            profiles_refreshed = report.profiles_refreshed,
            profiles_missing = report.profiles_missing,
            elapsed_secs = report.elapsed.as_secs_f64(),
            "profile refresh complete"
        );
        Ok(())
    }
}

/// Poll policy: query shaping and alert rendering.
#[derive(Debug, Clone)]
pub struct PollTaskConfig {
    /// Channel reference handed to the notifier.
    pub channel: String,
    /// Rank floor applied to every query.
    pub min_rank: String,
    /// Per-query timeout.
    pub timeout_secs: u64,
    /// Base URL for the profile link segment in alerts.
    pub profile_url_base: String,
    /// Direct message relayed when a followed player matched.
    pub relay_found_text: String,
}

impl Default for PollTaskConfig {
    fn default() -> Self {
        Self {
            channel: "alerts".to_string(),
            min_rank: "Gold Nova I".to_string(),
            timeout_secs: 60,
            profile_url_base: "https://steamcommunity.com/profiles".to_string(),
            relay_found_text: "===(partySearch found following)===".to_string(),
        }
    }
}

/// One matchmaking poll through the primary session.
///
/// Runs the guarded re-election check first; a tick that re-elects does
/// no polling. With a primary in hand it runs the three query shapes,
/// dedups by identity, and either extends the empty-poll streak or
/// resets it and fans the results out: an alert per followed candidate,
/// one relay message if any matched, and a leaderboard upsert for every
/// candidate.
pub struct MatchmakingPollTask {
    pool: Arc<SessionPool>,
    store: Arc<dyn AccountStore>,
    notifier: Option<Arc<dyn Notifier>>,
    config: PollTaskConfig,
}

impl MatchmakingPollTask {
    pub fn new(
        pool: Arc<SessionPool>,
        store: Arc<dyn AccountStore>,
        notifier: Option<Arc<dyn Notifier>>,
        config: PollTaskConfig,
    ) -> Self {
        Self {
            pool,
            store,
            notifier,
            config,
        }
    }

    fn queries(&self) -> [PartySearchParams; 3] {
        let shape = |prime, queue| PartySearchParams {
            prime,
            queue,
            min_rank: self.config.min_rank.clone(),
            timeout_secs: self.config.timeout_secs,
        };
        [
            shape(true, QueueType::Competitive),
            shape(false, QueueType::Competitive),
            shape(true, QueueType::Wingman),
        ]
    }

    /// Run all query shapes through the primary, deduplicated by
    /// identity. `None` when no primary session is installed.
    async fn collect_candidates(&self) -> Option<Vec<MatchCandidate>> {
        let guard = self.pool.primary().await;
        let session = guard.as_ref()?;

        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for params in self.queries() {
            match session.party_search(&params).await {
                Ok(found) => {
                    for candidate in found {
                        if seen.insert(candidate.id.clone()) {
                            out.push(candidate);
                        }
                    }
                }
                Err(e) => {
                    warn!(queue = %params.queue, prime = params.prime, error = %e,
                        "party search query failed");
                }
            }
        }
        Some(out)
    }

    fn alert_text(&self, candidate: &MatchCandidate) -> String {
        let tier = if candidate.prime { "prime" } else { "non-prime" };
        format_alert(
            Utc::now(),
            "party-search",
            &[
                tier.to_string(),
                candidate.display_name.clone(),
                candidate.rank.clone(),
                candidate.friend_code.clone(),
                format!("{}/{}", self.config.profile_url_base, candidate.id),
            ],
        )
    }
}

#[async_trait]
impl PeriodicTask for MatchmakingPollTask {
    async fn run(&self) -> anyhow::Result<()> {
        if self.pool.maybe_reelect().await {
            return Ok(());
        }

        let Some(candidates) = self.collect_candidates().await else {
            debug!("no primary session, skipping matchmaking poll");
            return Ok(());
        };

        if candidates.is_empty() {
            let streak = self.pool.record_empty_poll();
            debug!(streak, "matchmaking poll came back empty");
            return Ok(());
        }
        self.pool.reset_empty_polls();

        let observed_at = Utc::now();
        let mut followed_matched = false;
        for candidate in &candidates {
            if self.store.is_followed(&candidate.id).await? {
                followed_matched = true;
                info!(player = %candidate.id, rank = %candidate.rank,
                    "followed player seen in matchmaking");
                if let Some(notifier) = &self.notifier {
                    let text = self.alert_text(candidate);
                    match notifier.send(&self.config.channel, &text).await {
                        Ok(true) => {}
                        Ok(false) => warn!(player = %candidate.id, "alert not delivered"),
                        Err(e) => warn!(player = %candidate.id, error = %e, "alert send failed"),
                    }
                }
            }
            let fresh = MatchCandidate {
                observed_at,
                ..candidate.clone()
            };
            self.store.upsert_match_candidate(&fresh).await?;
        }

        if followed_matched {
            self.pool.relay_message(&self.config.relay_found_text).await;
        }
        Ok(())
    }
}
