// crates/server/src/provider.rs
//! HTTP session broker client.
//!
//! The broker owns the actual game-network handshake and keeps the live
//! connections; this client only leases sessions from it and forwards
//! the per-session operations. A broker that is down or refuses a lease
//! surfaces as `Unplayable`, never as an error.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use lobbyscout_core::{
    Acquire, CoreError, GameSession, MatchCandidate, PartySearchParams, PlayerId, ProfileSnapshot,
    SessionProvider,
};

#[derive(Debug, Serialize)]
struct LeaseRequest<'a> {
    credential: &'a str,
}

#[derive(Debug, Deserialize)]
struct LeaseResponse {
    session_id: String,
    playable: bool,
}

#[derive(Debug, Deserialize)]
struct ProfileWire {
    current_progress: Option<i64>,
    elo: Option<i64>,
    level: Option<i64>,
    #[serde(default)]
    prime: bool,
    #[serde(default)]
    vac_banned: bool,
    #[serde(default)]
    game_banned: bool,
}

impl From<ProfileWire> for ProfileSnapshot {
    fn from(w: ProfileWire) -> Self {
        ProfileSnapshot {
            current_progress: w.current_progress,
            elo: w.elo,
            level: w.level,
            prime: w.prime,
            vac_banned: w.vac_banned,
            game_banned: w.game_banned,
        }
    }
}

#[derive(Debug, Deserialize)]
struct CandidateWire {
    id: String,
    #[serde(default)]
    prime: bool,
    #[serde(default)]
    display_name: String,
    #[serde(default)]
    rank: String,
    #[serde(default)]
    friend_code: String,
}

#[derive(Debug, Clone)]
pub struct BrokerSessionProvider {
    client: reqwest::Client,
    base_url: String,
}

impl BrokerSessionProvider {
    pub fn new(base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self {
            client: reqwest::Client::new(),
            base_url,
        }
    }
}

#[async_trait]
impl SessionProvider for BrokerSessionProvider {
    async fn acquire(&self, credential: &str) -> Acquire {
        let response = self
            .client
            .post(format!("{}/sessions", self.base_url))
            .json(&LeaseRequest { credential })
            .send()
            .await;

        let lease: LeaseResponse = match response {
            Ok(r) if r.status().is_success() => match r.json().await {
                Ok(lease) => lease,
                Err(e) => {
                    warn!(error = %e, "malformed lease response");
                    return Acquire::Unplayable;
                }
            },
            Ok(r) => {
                debug!(status = %r.status(), "broker refused session lease");
                return Acquire::Unplayable;
            }
            Err(e) => {
                warn!(error = %e, "session broker unreachable");
                return Acquire::Unplayable;
            }
        };

        if !lease.playable {
            return Acquire::Unplayable;
        }
        Acquire::Playable(Box::new(BrokerSession {
            client: self.client.clone(),
            url: format!("{}/sessions/{}", self.base_url, lease.session_id),
            session_id: lease.session_id,
        }))
    }
}

/// One leased broker session. All operations are plain HTTP calls
/// against the session's resource URL.
struct BrokerSession {
    client: reqwest::Client,
    url: String,
    session_id: String,
}

impl BrokerSession {
    fn err(&self, message: impl std::fmt::Display) -> CoreError {
        CoreError::provider(self.session_id.as_str(), message.to_string())
    }
}

#[async_trait]
impl GameSession for BrokerSession {
    async fn is_playable(&self) -> bool {
        match self.client.get(&self.url).send().await {
            Ok(r) if r.status().is_success() => r
                .json::<LeaseResponse>()
                .await
                .map(|l| l.playable)
                .unwrap_or(false),
            _ => false,
        }
    }

    async fn profile(&self, id: &PlayerId) -> Result<Option<ProfileSnapshot>, CoreError> {
        let response = self
            .client
            .get(format!("{}/profile/{}", self.url, id))
            .send()
            .await
            .map_err(|e| self.err(e))?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(self.err(format!("profile fetch returned {}", response.status())));
        }
        let wire: ProfileWire = response.json().await.map_err(|e| self.err(e))?;
        Ok(Some(wire.into()))
    }

    async fn party_search(
        &self,
        params: &PartySearchParams,
    ) -> Result<Vec<MatchCandidate>, CoreError> {
        let response = self
            .client
            .post(format!("{}/party-search", self.url))
            .timeout(Duration::from_secs(params.timeout_secs))
            .json(params)
            .send()
            .await
            .map_err(|e| self.err(e))?;
        if !response.status().is_success() {
            return Err(self.err(format!("party search returned {}", response.status())));
        }
        let wires: Vec<CandidateWire> = response.json().await.map_err(|e| self.err(e))?;
        let observed_at = Utc::now();
        Ok(wires
            .into_iter()
            .map(|w| MatchCandidate {
                id: PlayerId::new(w.id),
                prime: w.prime,
                display_name: w.display_name,
                rank: w.rank,
                friend_code: w.friend_code,
                observed_at,
            })
            .collect())
    }

    async fn send_direct_message(&self, to: &PlayerId, text: &str) -> Result<(), CoreError> {
        let response = self
            .client
            .post(format!("{}/messages", self.url))
            .json(&serde_json::json!({ "to": to, "text": text }))
            .send()
            .await
            .map_err(|e| self.err(e))?;
        if !response.status().is_success() {
            return Err(self.err(format!("message send returned {}", response.status())));
        }
        Ok(())
    }

    async fn acknowledge_cooldown(&self) -> Result<(), CoreError> {
        let response = self
            .client
            .post(format!("{}/cooldown-ack", self.url))
            .send()
            .await
            .map_err(|e| self.err(e))?;
        if !response.status().is_success() {
            return Err(self.err(format!("cooldown ack returned {}", response.status())));
        }
        Ok(())
    }

    async fn detach_listeners(&self) {
        if let Err(e) = self
            .client
            .post(format!("{}/detach", self.url))
            .send()
            .await
        {
            debug!(session = %self.session_id, error = %e, "listener detach failed");
        }
    }

    async fn log_off(&self) -> Result<(), CoreError> {
        let response = self
            .client
            .delete(&self.url)
            .send()
            .await
            .map_err(|e| self.err(e))?;
        if !response.status().is_success() {
            return Err(self.err(format!("log off returned {}", response.status())));
        }
        Ok(())
    }
}
