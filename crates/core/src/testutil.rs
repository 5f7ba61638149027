// crates/core/src/testutil.rs
//! Mock capability implementations shared by the pool, crawler and
//! accounting tests. Sessions record every call into a shared event log
//! so tests can assert release discipline.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::CoreError;
use crate::session::{Acquire, GameSession, SessionProvider};
use crate::store::AccountStore;
use crate::types::{
    Account, FriendRecord, MatchCandidate, PartySearchParams, PlayerId, ProfileSnapshot,
};

/// Append-only call log shared across mock sessions.
#[derive(Clone, Default)]
pub struct EventLog(Arc<Mutex<Vec<String>>>);

impl EventLog {
    pub fn push(&self, entry: impl Into<String>) {
        self.0.lock().unwrap().push(entry.into());
    }

    pub fn contains(&self, entry: &str) -> bool {
        self.0.lock().unwrap().iter().any(|e| e == entry)
    }

    pub fn count(&self, entry: &str) -> usize {
        self.0.lock().unwrap().iter().filter(|e| *e == entry).count()
    }

    pub fn count_matching(&self, needle: &str) -> usize {
        self.0
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.contains(needle))
            .count()
    }
}

/// Scripted session. Profile lookups read the provider's shared "world"
/// table; party searches pop the provider's shared result queue.
/// Playability tracks the provider's live allow-list, so clearing it
/// degrades already-minted sessions too.
pub struct MockSession {
    name: String,
    log: EventLog,
    world: Arc<Mutex<HashMap<PlayerId, ProfileSnapshot>>>,
    searches: Arc<Mutex<VecDeque<Vec<MatchCandidate>>>>,
    playable: Arc<Mutex<HashSet<String>>>,
}

#[async_trait]
impl GameSession for MockSession {
    async fn is_playable(&self) -> bool {
        let playable = self.playable.lock().unwrap().contains(&self.name);
        self.log.push(format!("playable:{}:{}", self.name, playable));
        playable
    }

    async fn profile(&self, id: &PlayerId) -> Result<Option<ProfileSnapshot>, CoreError> {
        self.log.push(format!("profile:{}:{}", self.name, id));
        Ok(self.world.lock().unwrap().get(id).cloned())
    }

    async fn party_search(
        &self,
        params: &PartySearchParams,
    ) -> Result<Vec<MatchCandidate>, CoreError> {
        self.log
            .push(format!("search:{}:{}:{}", self.name, params.queue, params.prime));
        Ok(self
            .searches
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_default())
    }

    async fn send_direct_message(&self, to: &PlayerId, text: &str) -> Result<(), CoreError> {
        self.log.push(format!("dm:{}:{}:{}", self.name, to, text));
        Ok(())
    }

    async fn acknowledge_cooldown(&self) -> Result<(), CoreError> {
        self.log.push(format!("ack:{}", self.name));
        Ok(())
    }

    async fn detach_listeners(&self) {
        self.log.push(format!("detach:{}", self.name));
    }

    async fn log_off(&self) -> Result<(), CoreError> {
        self.log.push(format!("logoff:{}", self.name));
        Ok(())
    }
}

/// Provider whose playability is a credential allow-list. Each acquire of
/// a playable credential mints a fresh session named after it.
#[derive(Default)]
pub struct MockProvider {
    playable: Arc<Mutex<HashSet<String>>>,
    pub world: Arc<Mutex<HashMap<PlayerId, ProfileSnapshot>>>,
    pub searches: Arc<Mutex<VecDeque<Vec<MatchCandidate>>>>,
    pub log: EventLog,
    acquire_delay: Mutex<Option<Duration>>,
    pub acquires: AtomicUsize,
}

impl MockProvider {
    pub fn set_playable(&self, credential: &str) {
        self.playable.lock().unwrap().insert(credential.to_string());
    }

    pub fn clear_playable(&self) {
        self.playable.lock().unwrap().clear();
    }

    pub fn set_profile(&self, id: impl Into<PlayerId>, snapshot: ProfileSnapshot) {
        self.world.lock().unwrap().insert(id.into(), snapshot);
    }

    pub fn push_search_result(&self, candidates: Vec<MatchCandidate>) {
        self.searches.lock().unwrap().push_back(candidates);
    }

    pub fn set_acquire_delay(&self, delay: Duration) {
        *self.acquire_delay.lock().unwrap() = Some(delay);
    }
}

#[async_trait]
impl SessionProvider for MockProvider {
    async fn acquire(&self, credential: &str) -> Acquire {
        self.acquires.fetch_add(1, Ordering::Relaxed);
        let delay = *self.acquire_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.playable.lock().unwrap().contains(credential) {
            Acquire::Playable(Box::new(MockSession {
                name: credential.to_string(),
                log: self.log.clone(),
                world: self.world.clone(),
                searches: self.searches.clone(),
                playable: self.playable.clone(),
            }))
        } else {
            Acquire::Unplayable
        }
    }
}

/// In-memory store with the same predicate semantics as the SQLite
/// implementation. Iteration orders are made deterministic by identity.
#[derive(Default)]
pub struct MockStore {
    pub accounts: Mutex<HashMap<PlayerId, Account>>,
    pub friends: Mutex<HashMap<PlayerId, FriendRecord>>,
    pub leaderboard: Mutex<HashMap<PlayerId, MatchCandidate>>,
    pub seen: Mutex<HashMap<(String, PlayerId), DateTime<Utc>>>,
    pub sample_calls: AtomicUsize,
    fail_sample: AtomicBool,
}

impl MockStore {
    pub fn insert_account(&self, account: Account) {
        self.accounts
            .lock()
            .unwrap()
            .insert(account.id.clone(), account);
    }

    pub fn insert_friend(&self, record: FriendRecord) {
        self.friends
            .lock()
            .unwrap()
            .insert(record.id.clone(), record);
    }

    pub fn account(&self, id: &PlayerId) -> Option<Account> {
        self.accounts.lock().unwrap().get(id).cloned()
    }

    pub fn friend(&self, id: &PlayerId) -> Option<FriendRecord> {
        self.friends.lock().unwrap().get(id).cloned()
    }

    pub fn candidate(&self, id: &PlayerId) -> Option<MatchCandidate> {
        self.leaderboard.lock().unwrap().get(id).cloned()
    }

    pub fn seen_at(&self, job: &str, id: &PlayerId) -> Option<DateTime<Utc>> {
        self.seen
            .lock()
            .unwrap()
            .get(&(job.to_string(), id.clone()))
            .copied()
    }

    pub fn fail_next_sample(&self) {
        self.fail_sample.store(true, Ordering::Relaxed);
    }

    fn sorted(mut accounts: Vec<Account>) -> Vec<Account> {
        accounts.sort_by(|a, b| a.id.cmp(&b.id));
        accounts
    }
}

#[async_trait]
impl AccountStore for MockStore {
    async fn sample_primary_candidates(&self, limit: u32) -> Result<Vec<Account>, CoreError> {
        self.sample_calls.fetch_add(1, Ordering::Relaxed);
        if self.fail_sample.swap(false, Ordering::Relaxed) {
            return Err(CoreError::store("injected sample failure"));
        }
        let mut out = Self::sorted(
            self.accounts
                .lock()
                .unwrap()
                .values()
                .filter(|a| a.flags.prime && a.flags.primary_enabled && !a.flags.banned)
                .cloned()
                .collect(),
        );
        out.truncate(limit as usize);
        Ok(out)
    }

    async fn private_prime_ids(&self) -> Result<Vec<PlayerId>, CoreError> {
        let mut ids: Vec<PlayerId> = self
            .accounts
            .lock()
            .unwrap()
            .values()
            .filter(|a| a.flags.private && a.flags.prime && !a.flags.store_account)
            .map(|a| a.id.clone())
            .collect();
        ids.sort();
        Ok(ids)
    }

    async fn relay_candidates(&self, parents: &[PlayerId]) -> Result<Vec<Account>, CoreError> {
        Ok(Self::sorted(
            self.accounts
                .lock()
                .unwrap()
                .values()
                .filter(|a| {
                    a.flags.store_account
                        && !a.flags.prime
                        && a.friends.iter().any(|f| parents.contains(f))
                })
                .cloned()
                .collect(),
        ))
    }

    async fn crawl_accounts(&self) -> Result<Vec<Account>, CoreError> {
        Ok(Self::sorted(
            self.accounts
                .lock()
                .unwrap()
                .values()
                .filter(|a| !a.flags.banned && !a.flags.store_account)
                .cloned()
                .collect(),
        ))
    }

    async fn find_account(&self, id: &PlayerId) -> Result<Option<Account>, CoreError> {
        Ok(self.accounts.lock().unwrap().get(id).cloned())
    }

    async fn update_account(&self, account: &Account) -> Result<(), CoreError> {
        self.accounts
            .lock()
            .unwrap()
            .insert(account.id.clone(), account.clone());
        Ok(())
    }

    async fn upsert_friend(&self, record: &FriendRecord) -> Result<(), CoreError> {
        let mut friends = self.friends.lock().unwrap();
        let prior = friends.get(&record.id);
        let mut next = record.clone();
        next.followed = prior.map(|f| f.followed).unwrap_or(false);
        next.elo = record.elo.or_else(|| prior.and_then(|f| f.elo));
        friends.insert(next.id.clone(), next);
        Ok(())
    }

    async fn is_followed(&self, id: &PlayerId) -> Result<bool, CoreError> {
        Ok(self
            .friends
            .lock()
            .unwrap()
            .get(id)
            .map(|f| f.followed)
            .unwrap_or(false))
    }

    async fn upsert_match_candidate(&self, candidate: &MatchCandidate) -> Result<(), CoreError> {
        self.leaderboard
            .lock()
            .unwrap()
            .insert(candidate.id.clone(), candidate.clone());
        Ok(())
    }

    async fn mark_seen(
        &self,
        job: &str,
        id: &PlayerId,
        at: DateTime<Utc>,
    ) -> Result<(), CoreError> {
        self.seen
            .lock()
            .unwrap()
            .insert((job.to_string(), id.clone()), at);
        Ok(())
    }
}
