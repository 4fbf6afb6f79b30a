//! Poll pacing

use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;

/// Suspension point of every polling loop
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Attempt-bounded poll cadence. The first poll happens immediately.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PollSchedule {
    #[serde(with = "millis")]
    pub interval: Duration,
    pub max_attempts: u32,
}

impl PollSchedule {
    pub fn new(interval: Duration, max_attempts: u32) -> Self {
        Self { interval, max_attempts }
    }
}

mod millis {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }
}
