// crates/server/src/scheduler.rs
//! Data-driven periodic task scheduler. Each cadence gets its own timer
//! task; every tick spawns the run so a slow run never blocks its own
//! timer. Task failures are logged here and never escalate.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

/// One unit of recurring work.
#[async_trait]
pub trait PeriodicTask: Send + Sync {
    async fn run(&self) -> anyhow::Result<()>;
}

/// A named task and how often it runs.
pub struct Cadence {
    pub name: &'static str,
    pub interval: Duration,
    pub task: Arc<dyn PeriodicTask>,
}

impl Cadence {
    pub fn new(name: &'static str, interval: Duration, task: Arc<dyn PeriodicTask>) -> Self {
        Self {
            name,
            interval,
            task,
        }
    }
}

/// Spawn one timer task per cadence. The first tick fires immediately.
/// Returned handles can be aborted for shutdown.
pub fn spawn_cadences(cadences: Vec<Cadence>) -> Vec<JoinHandle<()>> {
    cadences
        .into_iter()
        .map(|cadence| {
            tokio::spawn(async move {
                let mut timer = tokio::time::interval(cadence.interval);
                timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
                loop {
                    timer.tick().await;
                    debug!(task = cadence.name, "tick");
                    let task = Arc::clone(&cadence.task);
                    let name = cadence.name;
                    tokio::spawn(async move {
                        if let Err(e) = task.run().await {
                            warn!(task = name, error = %e, "periodic task failed");
                        }
                    });
                }
            })
        })
        .collect()
}
