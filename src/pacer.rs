//! Request pacing.
//!
//! The rate API publishes no limits, so the backfill keeps a fixed minimum
//! gap between consecutive requests instead of reacting to 429s.

use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use tokio::time::Instant;

pub const DEFAULT_PACING_DELAY: Duration = Duration::from_millis(200);

#[async_trait]
pub trait Pacer: Send {
    /// Resolves once the next request may be issued.
    async fn ready(&mut self);
}

/// Lets one request through per `interval`. The first call never waits.
#[derive(Debug)]
pub struct FixedInterval {
    interval: Duration,
    last: Option<Instant>,
}

impl FixedInterval {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: None,
        }
    }
}

#[async_trait]
impl Pacer for FixedInterval {
    async fn ready(&mut self) {
        if let Some(last) = self.last {
            let next = last + self.interval;
            if next > Instant::now() {
                debug!("Pacing: waiting {:?}", next - Instant::now());
                tokio::time::sleep_until(next).await;
            }
        }
        self.last = Some(Instant::now());
    }
}
