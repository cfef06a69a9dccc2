//! Alarm-driven cache warming (§4.8 "Alarm handler").
//!
//! There is no serverless one-shot alarm primitive here; the idiomatic
//! tokio equivalent is a background task that sleeps for the interval and
//! re-arms itself, which is exactly the "in `finally`, schedule one
//! `alarmIntervalMs` ahead" behavior the original describes.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::task::JoinHandle;

/// Per-actor alarm toggle (Open Question resolution, SPEC_FULL §13).
#[derive(Debug, Clone, Copy)]
pub struct AlarmConfig {
    pub enabled: bool,
    pub interval: Duration,
}

impl AlarmConfig {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            interval: Duration::from_secs(300),
        }
    }

    pub fn enabled_every(interval: Duration) -> Self {
        Self {
            enabled: true,
            interval,
        }
    }
}

/// An actor that knows how to run one cache-warming pass over its own
/// "warmable" endpoints and index.
#[async_trait]
pub trait Warmable: Send + Sync {
    async fn warm_once(&self);
}

/// Spawns the background warm loop for `actor` if its alarm is enabled;
/// returns `None` otherwise (so e.g. `bns` and `chainhooks`, which have no
/// natural warm set, simply don't get a task).
pub fn spawn_alarm_loop(config: AlarmConfig, actor: Arc<dyn Warmable>) -> Option<JoinHandle<()>> {
    if !config.enabled {
        return None;
    }
    let interval = config.interval;
    Some(tokio::spawn(async move {
        loop {
            tokio::time::sleep(interval).await;
            actor.warm_once().await;
        }
    }))
}
