// crates/db/src/store.rs
//! `AccountStore` implementation over the SQLite database.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::Row;
use tracing::warn;

use lobbyscout_core::{
    Account, AccountFlags, AccountStore, CooldownPenalty, CoreError, FriendRecord, MatchCandidate,
    PlayerId, XpLedger,
};

use crate::{Database, DbError};

impl From<DbError> for CoreError {
    fn from(e: DbError) -> Self {
        CoreError::store(e.to_string())
    }
}

fn store_err(e: sqlx::Error) -> CoreError {
    CoreError::store(e.to_string())
}

fn ts(dt: DateTime<Utc>) -> i64 {
    dt.timestamp()
}

fn dt(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

/// Raw accounts row; decoded manually because the domain type splits
/// flags, ledger and cooldown into nested structs.
struct AccountRow {
    id: String,
    credential: String,
    prime: i64,
    banned: i64,
    store_account: i64,
    private: i64,
    primary_enabled: i64,
    friends: String,
    current_progress: i64,
    week_marker: i64,
    earned_this_week: i64,
    earned_lifetime: i64,
    cooldown_expires_at: Option<i64>,
    cooldown_acknowledged: i64,
    level: Option<i64>,
    elo: Option<i64>,
    advanced_tier: i64,
}

impl<'r> sqlx::FromRow<'r, sqlx::sqlite::SqliteRow> for AccountRow {
    fn from_row(row: &'r sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            credential: row.try_get("credential")?,
            prime: row.try_get("prime")?,
            banned: row.try_get("banned")?,
            store_account: row.try_get("store_account")?,
            private: row.try_get("private")?,
            primary_enabled: row.try_get("primary_enabled")?,
            friends: row.try_get("friends")?,
            current_progress: row.try_get("current_progress")?,
            week_marker: row.try_get("week_marker")?,
            earned_this_week: row.try_get("earned_this_week")?,
            earned_lifetime: row.try_get("earned_lifetime")?,
            cooldown_expires_at: row.try_get("cooldown_expires_at")?,
            cooldown_acknowledged: row.try_get("cooldown_acknowledged")?,
            level: row.try_get("level")?,
            elo: row.try_get("elo")?,
            advanced_tier: row.try_get("advanced_tier")?,
        })
    }
}

impl From<AccountRow> for Account {
    fn from(row: AccountRow) -> Self {
        let friends: Vec<PlayerId> = serde_json::from_str(&row.friends).unwrap_or_else(|e| {
            warn!(account = %row.id, error = %e, "malformed friends column, treating as empty");
            Vec::new()
        });
        Account {
            id: PlayerId::new(row.id),
            credential: row.credential,
            flags: AccountFlags {
                prime: row.prime != 0,
                banned: row.banned != 0,
                store_account: row.store_account != 0,
                private: row.private != 0,
                primary_enabled: row.primary_enabled != 0,
            },
            friends,
            ledger: XpLedger {
                current_progress: row.current_progress,
                week_marker: dt(row.week_marker),
                earned_this_week: row.earned_this_week,
                earned_lifetime: row.earned_lifetime,
            },
            cooldown: row.cooldown_expires_at.map(|expires| CooldownPenalty {
                expires_at: dt(expires),
                acknowledged: row.cooldown_acknowledged != 0,
            }),
            level: row.level,
            elo: row.elo,
            advanced_tier: row.advanced_tier != 0,
        }
    }
}

/// SQLite-backed account store.
#[derive(Debug, Clone)]
pub struct SqliteAccountStore {
    db: Database,
}

impl SqliteAccountStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Operator surface: mark an observed identity as followed (or not).
    /// The crawler never touches this flag.
    pub async fn set_followed(&self, id: &PlayerId, followed: bool) -> Result<(), CoreError> {
        sqlx::query(
            "INSERT INTO friends (id, followed, last_refreshed) VALUES (?, ?, 0)
             ON CONFLICT(id) DO UPDATE SET followed = excluded.followed",
        )
        .bind(id.as_str())
        .bind(followed as i64)
        .execute(self.db.pool())
        .await
        .map_err(store_err)?;
        Ok(())
    }
}

const ACCOUNT_COLUMNS: &str = "id, credential, prime, banned, store_account, private, \
     primary_enabled, friends, current_progress, week_marker, earned_this_week, \
     earned_lifetime, cooldown_expires_at, cooldown_acknowledged, level, elo, advanced_tier";

#[async_trait]
impl AccountStore for SqliteAccountStore {
    async fn sample_primary_candidates(&self, limit: u32) -> Result<Vec<Account>, CoreError> {
        let rows: Vec<AccountRow> = sqlx::query_as(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts
             WHERE prime = 1 AND primary_enabled = 1 AND banned = 0
             ORDER BY RANDOM() LIMIT ?"
        ))
        .bind(i64::from(limit))
        .fetch_all(self.db.pool())
        .await
        .map_err(store_err)?;
        Ok(rows.into_iter().map(Account::from).collect())
    }

    async fn private_prime_ids(&self) -> Result<Vec<PlayerId>, CoreError> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT id FROM accounts WHERE private = 1 AND prime = 1 AND store_account = 0",
        )
        .fetch_all(self.db.pool())
        .await
        .map_err(store_err)?;
        Ok(rows.into_iter().map(|(id,)| PlayerId::new(id)).collect())
    }

    async fn relay_candidates(&self, parents: &[PlayerId]) -> Result<Vec<Account>, CoreError> {
        if parents.is_empty() {
            return Ok(Vec::new());
        }
        // Friend lists are JSON columns; the intersection check runs over
        // the already-bounded store-account set.
        let rows: Vec<AccountRow> = sqlx::query_as(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE store_account = 1 AND prime = 0"
        ))
        .fetch_all(self.db.pool())
        .await
        .map_err(store_err)?;
        Ok(rows
            .into_iter()
            .map(Account::from)
            .filter(|a| a.friends.iter().any(|f| parents.contains(f)))
            .collect())
    }

    async fn crawl_accounts(&self) -> Result<Vec<Account>, CoreError> {
        let rows: Vec<AccountRow> = sqlx::query_as(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE banned = 0 AND store_account = 0"
        ))
        .fetch_all(self.db.pool())
        .await
        .map_err(store_err)?;
        Ok(rows.into_iter().map(Account::from).collect())
    }

    async fn find_account(&self, id: &PlayerId) -> Result<Option<Account>, CoreError> {
        let row: Option<AccountRow> =
            sqlx::query_as(&format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = ?"))
                .bind(id.as_str())
                .fetch_optional(self.db.pool())
                .await
                .map_err(store_err)?;
        Ok(row.map(Account::from))
    }

    async fn update_account(&self, account: &Account) -> Result<(), CoreError> {
        let friends = serde_json::to_string(&account.friends)
            .map_err(|e| CoreError::store(e.to_string()))?;
        sqlx::query(
            "INSERT INTO accounts (id, credential, prime, banned, store_account, private,
                 primary_enabled, friends, current_progress, week_marker, earned_this_week,
                 earned_lifetime, cooldown_expires_at, cooldown_acknowledged, level, elo,
                 advanced_tier)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 credential = excluded.credential,
                 prime = excluded.prime,
                 banned = excluded.banned,
                 store_account = excluded.store_account,
                 private = excluded.private,
                 primary_enabled = excluded.primary_enabled,
                 friends = excluded.friends,
                 current_progress = excluded.current_progress,
                 week_marker = excluded.week_marker,
                 earned_this_week = excluded.earned_this_week,
                 earned_lifetime = excluded.earned_lifetime,
                 cooldown_expires_at = excluded.cooldown_expires_at,
                 cooldown_acknowledged = excluded.cooldown_acknowledged,
                 level = excluded.level,
                 elo = excluded.elo,
                 advanced_tier = excluded.advanced_tier",
        )
        .bind(account.id.as_str())
        .bind(&account.credential)
        .bind(account.flags.prime as i64)
        .bind(account.flags.banned as i64)
        .bind(account.flags.store_account as i64)
        .bind(account.flags.private as i64)
        .bind(account.flags.primary_enabled as i64)
        .bind(friends)
        .bind(account.ledger.current_progress)
        .bind(ts(account.ledger.week_marker))
        .bind(account.ledger.earned_this_week)
        .bind(account.ledger.earned_lifetime)
        .bind(account.cooldown.map(|c| ts(c.expires_at)))
        .bind(account.cooldown.map(|c| c.acknowledged as i64).unwrap_or(0))
        .bind(account.level)
        .bind(account.elo)
        .bind(account.advanced_tier as i64)
        .execute(self.db.pool())
        .await
        .map_err(store_err)?;
        Ok(())
    }

    async fn upsert_friend(&self, record: &FriendRecord) -> Result<(), CoreError> {
        // `followed` is deliberately absent from the UPDATE arm: it
        // belongs to the operator, not the crawler. A stored elo only
        // changes when the new record carries a numeric one.
        sqlx::query(
            "INSERT INTO friends (id, prime, elo, banned, followed, last_refreshed)
             VALUES (?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 prime = excluded.prime,
                 elo = COALESCE(excluded.elo, friends.elo),
                 banned = excluded.banned,
                 last_refreshed = excluded.last_refreshed",
        )
        .bind(record.id.as_str())
        .bind(record.prime as i64)
        .bind(record.elo)
        .bind(record.banned as i64)
        .bind(record.followed as i64)
        .bind(ts(record.last_refreshed))
        .execute(self.db.pool())
        .await
        .map_err(store_err)?;
        Ok(())
    }

    async fn is_followed(&self, id: &PlayerId) -> Result<bool, CoreError> {
        let row: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM friends WHERE id = ? AND followed = 1")
                .bind(id.as_str())
                .fetch_one(self.db.pool())
                .await
                .map_err(store_err)?;
        Ok(row.0 > 0)
    }

    async fn upsert_match_candidate(&self, candidate: &MatchCandidate) -> Result<(), CoreError> {
        sqlx::query(
            "INSERT INTO leaderboard (id, prime, display_name, rank, friend_code, observed_at)
             VALUES (?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 prime = excluded.prime,
                 display_name = excluded.display_name,
                 rank = excluded.rank,
                 friend_code = excluded.friend_code,
                 observed_at = excluded.observed_at",
        )
        .bind(candidate.id.as_str())
        .bind(candidate.prime as i64)
        .bind(&candidate.display_name)
        .bind(&candidate.rank)
        .bind(&candidate.friend_code)
        .bind(ts(candidate.observed_at))
        .execute(self.db.pool())
        .await
        .map_err(store_err)?;
        Ok(())
    }

    async fn mark_seen(
        &self,
        job: &str,
        id: &PlayerId,
        at: DateTime<Utc>,
    ) -> Result<(), CoreError> {
        sqlx::query(
            "INSERT INTO seen_markers (job, player_id, seen_at) VALUES (?, ?, ?)
             ON CONFLICT(job, player_id) DO UPDATE SET seen_at = excluded.seen_at",
        )
        .bind(job)
        .bind(id.as_str())
        .bind(ts(at))
        .execute(self.db.pool())
        .await
        .map_err(store_err)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    async fn store() -> SqliteAccountStore {
        let db = Database::new_in_memory().await.expect("in-memory db");
        SqliteAccountStore::new(db)
    }

    fn account(id: &str) -> Account {
        Account::new(id, format!("cred-{id}"))
    }

    fn now_secs() -> DateTime<Utc> {
        dt(Utc::now().timestamp())
    }

    #[tokio::test]
    async fn test_account_roundtrip() {
        let store = store().await;
        let mut original = account("a1");
        original.flags = AccountFlags {
            prime: true,
            banned: false,
            store_account: false,
            private: true,
            primary_enabled: true,
        };
        original.friends = vec!["f1".into(), "f2".into()];
        original.ledger = XpLedger {
            current_progress: 4_990,
            week_marker: Utc.with_ymd_and_hms(2026, 8, 19, 1, 0, 0).unwrap(),
            earned_this_week: 330,
            earned_lifetime: 12_000,
        };
        original.cooldown = Some(CooldownPenalty {
            expires_at: now_secs() + Duration::hours(2),
            acknowledged: false,
        });
        original.level = Some(12);
        original.elo = Some(1_750);
        original.advanced_tier = true;

        store.update_account(&original).await.unwrap();
        let loaded = store.find_account(&"a1".into()).await.unwrap().unwrap();
        assert_eq!(loaded, original);
    }

    #[tokio::test]
    async fn test_find_account_missing() {
        let store = store().await;
        assert!(store.find_account(&"ghost".into()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_primary_sample_respects_predicate_and_limit() {
        let store = store().await;
        for i in 0..10 {
            let mut a = account(&format!("p{i}"));
            a.flags.prime = true;
            a.flags.primary_enabled = true;
            store.update_account(&a).await.unwrap();
        }
        // Ineligible: banned, not prime, not enabled.
        let mut banned = account("banned");
        banned.flags = AccountFlags {
            prime: true,
            primary_enabled: true,
            banned: true,
            ..AccountFlags::default()
        };
        store.update_account(&banned).await.unwrap();
        let mut disabled = account("disabled");
        disabled.flags.prime = true;
        store.update_account(&disabled).await.unwrap();

        let sample = store.sample_primary_candidates(4).await.unwrap();
        assert_eq!(sample.len(), 4);
        for a in &sample {
            assert!(a.flags.prime && a.flags.primary_enabled && !a.flags.banned);
        }

        let all = store.sample_primary_candidates(64).await.unwrap();
        assert_eq!(all.len(), 10);
    }

    #[tokio::test]
    async fn test_relay_candidates_predicate() {
        let store = store().await;
        let mut parent = account("parent");
        parent.flags.private = true;
        parent.flags.prime = true;
        store.update_account(&parent).await.unwrap();

        let mut relay = account("relay");
        relay.flags.store_account = true;
        relay.friends = vec!["other".into(), "parent".into()];
        store.update_account(&relay).await.unwrap();

        // Store account without a parent friend.
        let mut orphan = account("orphan");
        orphan.flags.store_account = true;
        orphan.friends = vec!["other".into()];
        store.update_account(&orphan).await.unwrap();

        // Prime store accounts are not relay material.
        let mut prime_store = account("prime-store");
        prime_store.flags.store_account = true;
        prime_store.flags.prime = true;
        prime_store.friends = vec!["parent".into()];
        store.update_account(&prime_store).await.unwrap();

        let parents = store.private_prime_ids().await.unwrap();
        assert_eq!(parents, vec![PlayerId::from("parent")]);

        let candidates = store.relay_candidates(&parents).await.unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].id, "relay".into());
    }

    #[tokio::test]
    async fn test_crawl_accounts_excludes_banned_and_store() {
        let store = store().await;
        store.update_account(&account("plain")).await.unwrap();
        let mut banned = account("banned");
        banned.flags.banned = true;
        store.update_account(&banned).await.unwrap();
        let mut shop = account("shop");
        shop.flags.store_account = true;
        store.update_account(&shop).await.unwrap();

        let crawlable = store.crawl_accounts().await.unwrap();
        assert_eq!(crawlable.len(), 1);
        assert_eq!(crawlable[0].id, "plain".into());
    }

    #[tokio::test]
    async fn test_friend_upsert_preserves_followed() {
        let store = store().await;
        let id: PlayerId = "f1".into();
        store.set_followed(&id, true).await.unwrap();

        store
            .upsert_friend(&FriendRecord {
                id: id.clone(),
                prime: true,
                elo: Some(1_500),
                banned: false,
                followed: false,
                last_refreshed: now_secs(),
            })
            .await
            .unwrap();

        assert!(store.is_followed(&id).await.unwrap());

        let row: (i64, Option<i64>) =
            sqlx::query_as("SELECT prime, elo FROM friends WHERE id = ?")
                .bind(id.as_str())
                .fetch_one(store.db.pool())
                .await
                .unwrap();
        assert_eq!(row, (1, Some(1_500)));
    }

    #[tokio::test]
    async fn test_friend_upsert_keeps_elo_when_record_lacks_one() {
        let store = store().await;
        let id: PlayerId = "f1".into();
        let base = FriendRecord {
            id: id.clone(),
            prime: true,
            elo: Some(1_500),
            banned: false,
            followed: false,
            last_refreshed: now_secs(),
        };
        store.upsert_friend(&base).await.unwrap();

        store
            .upsert_friend(&FriendRecord {
                elo: None,
                ..base.clone()
            })
            .await
            .unwrap();

        let row: (Option<i64>,) = sqlx::query_as("SELECT elo FROM friends WHERE id = ?")
            .bind(id.as_str())
            .fetch_one(store.db.pool())
            .await
            .unwrap();
        assert_eq!(row.0, Some(1_500), "stored elo survives a non-numeric refresh");

        store
            .upsert_friend(&FriendRecord {
                elo: Some(1_600),
                ..base
            })
            .await
            .unwrap();
        let row: (Option<i64>,) = sqlx::query_as("SELECT elo FROM friends WHERE id = ?")
            .bind(id.as_str())
            .fetch_one(store.db.pool())
            .await
            .unwrap();
        assert_eq!(row.0, Some(1_600));
    }

    #[tokio::test]
    async fn test_is_followed_defaults_false() {
        let store = store().await;
        assert!(!store.is_followed(&"nobody".into()).await.unwrap());
    }

    #[tokio::test]
    async fn test_leaderboard_upsert_overwrites() {
        let store = store().await;
        let first_seen = now_secs() - Duration::minutes(10);
        let candidate = MatchCandidate {
            id: "c1".into(),
            prime: false,
            display_name: "old name".to_string(),
            rank: "Silver IV".to_string(),
            friend_code: "AAAA-BBBB".to_string(),
            observed_at: first_seen,
        };
        store.upsert_match_candidate(&candidate).await.unwrap();

        let fresh = MatchCandidate {
            prime: true,
            display_name: "new name".to_string(),
            observed_at: now_secs(),
            ..candidate
        };
        store.upsert_match_candidate(&fresh).await.unwrap();

        let row: (i64, String, i64) =
            sqlx::query_as("SELECT prime, display_name, observed_at FROM leaderboard WHERE id = ?")
                .bind("c1")
                .fetch_one(store.db.pool())
                .await
                .unwrap();
        assert_eq!(row.0, 1);
        assert_eq!(row.1, "new name");
        assert_eq!(row.2, fresh.observed_at.timestamp());

        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM leaderboard")
            .fetch_one(store.db.pool())
            .await
            .unwrap();
        assert_eq!(count.0, 1, "no history retained");
    }

    #[tokio::test]
    async fn test_mark_seen_overwrites_timestamp() {
        let store = store().await;
        let id: PlayerId = "s1".into();
        let early = now_secs() - Duration::hours(1);
        let late = now_secs();

        store.mark_seen("profile-refresh", &id, early).await.unwrap();
        store.mark_seen("profile-refresh", &id, late).await.unwrap();
        // A different job keeps its own marker.
        store.mark_seen("other-job", &id, early).await.unwrap();

        let row: (i64,) =
            sqlx::query_as("SELECT seen_at FROM seen_markers WHERE job = ? AND player_id = ?")
                .bind("profile-refresh")
                .bind(id.as_str())
                .fetch_one(store.db.pool())
                .await
                .unwrap();
        assert_eq!(row.0, late.timestamp());

        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM seen_markers")
            .fetch_one(store.db.pool())
            .await
            .unwrap();
        assert_eq!(count.0, 2);
    }

    #[tokio::test]
    async fn test_malformed_friends_column_treated_as_empty() {
        let store = store().await;
        store.update_account(&account("a1")).await.unwrap();
        sqlx::query("UPDATE accounts SET friends = 'not-json' WHERE id = 'a1'")
            .execute(store.db.pool())
            .await
            .unwrap();

        let loaded = store.find_account(&"a1".into()).await.unwrap().unwrap();
        assert!(loaded.friends.is_empty());
    }
}
