// crates/server/src/lib.rs
//! Service wiring for lobbyscout: configuration, the periodic-task
//! scheduler, the poll and refresh tasks, and the HTTP-backed notifier
//! and session-provider implementations.

pub mod config;
pub mod notifier;
pub mod provider;
pub mod scheduler;
pub mod tasks;

pub use config::Config;
pub use notifier::WebhookNotifier;
pub use provider::BrokerSessionProvider;
pub use scheduler::{spawn_cadences, Cadence, PeriodicTask};
pub use tasks::{MatchmakingPollTask, PollTaskConfig, ProfileRefreshTask};
