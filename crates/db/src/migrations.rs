/// Inline SQL migrations for the lobbyscout database schema.
///
/// Simple inline migrations rather than sqlx migration files: the schema
/// is small and self-contained.

pub const MIGRATIONS: &[&str] = &[
    // Migration 1: owned accounts
    r#"
CREATE TABLE IF NOT EXISTS accounts (
    id TEXT PRIMARY KEY,
    credential TEXT NOT NULL,
    prime INTEGER NOT NULL DEFAULT 0,
    banned INTEGER NOT NULL DEFAULT 0,
    store_account INTEGER NOT NULL DEFAULT 0,
    private INTEGER NOT NULL DEFAULT 0,
    primary_enabled INTEGER NOT NULL DEFAULT 0,
    friends TEXT NOT NULL DEFAULT '[]',
    current_progress INTEGER NOT NULL DEFAULT 0,
    week_marker INTEGER NOT NULL DEFAULT 0,
    earned_this_week INTEGER NOT NULL DEFAULT 0,
    earned_lifetime INTEGER NOT NULL DEFAULT 0,
    cooldown_expires_at INTEGER,
    cooldown_acknowledged INTEGER NOT NULL DEFAULT 0,
    level INTEGER,
    elo INTEGER,
    advanced_tier INTEGER NOT NULL DEFAULT 0
);
"#,
    // Migration 2: election predicate index
    r#"
CREATE INDEX IF NOT EXISTS idx_accounts_primary ON accounts(prime, primary_enabled, banned);
"#,
    // Migration 3: observed identities (owned or not)
    r#"
CREATE TABLE IF NOT EXISTS friends (
    id TEXT PRIMARY KEY,
    prime INTEGER NOT NULL DEFAULT 0,
    elo INTEGER,
    banned INTEGER NOT NULL DEFAULT 0,
    followed INTEGER NOT NULL DEFAULT 0,
    last_refreshed INTEGER NOT NULL DEFAULT 0
);
"#,
    r#"
CREATE INDEX IF NOT EXISTS idx_friends_followed ON friends(followed);
"#,
    // Migration 4: matchmaking leaderboard (latest observation only)
    r#"
CREATE TABLE IF NOT EXISTS leaderboard (
    id TEXT PRIMARY KEY,
    prime INTEGER NOT NULL DEFAULT 0,
    display_name TEXT NOT NULL DEFAULT '',
    rank TEXT NOT NULL DEFAULT '',
    friend_code TEXT NOT NULL DEFAULT '',
    observed_at INTEGER NOT NULL
);
"#,
    // Migration 5: per-job last-seen markers
    r#"
CREATE TABLE IF NOT EXISTS seen_markers (
    job TEXT NOT NULL,
    player_id TEXT NOT NULL,
    seen_at INTEGER NOT NULL,
    PRIMARY KEY (job, player_id)
);
"#,
];
