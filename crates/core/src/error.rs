// crates/core/src/error.rs
use thiserror::Error;

use crate::types::PlayerId;

/// Errors crossing the capability boundaries of the core.
///
/// Nothing in here is fatal to the process: callers either skip to the
/// next candidate (provider failures) or log and carry on at the task
/// boundary (store / notify failures).
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("account store failure: {message}")]
    Store { message: String },

    #[error("session provider failure for {account}: {message}")]
    Provider { account: PlayerId, message: String },

    #[error("notification channel failure: {message}")]
    Notify { message: String },
}

impl CoreError {
    pub fn store(message: impl Into<String>) -> Self {
        Self::Store {
            message: message.into(),
        }
    }

    pub fn provider(account: impl Into<PlayerId>, message: impl Into<String>) -> Self {
        Self::Provider {
            account: account.into(),
            message: message.into(),
        }
    }

    pub fn notify(message: impl Into<String>) -> Self {
        Self::Notify {
            message: message.into(),
        }
    }
}
