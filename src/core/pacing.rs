//! Pacing between spin batches
//!
//! After a batch's results go out, the drain loop waits long enough for
//! viewers to finish animating before emitting the next batch. The wait goes
//! through `Pacer` so tests can swap in virtual time or record delays.

use std::time::Duration;

use async_trait::async_trait;

use crate::config::PacingConfig;

/// Timed suspension used by the drain loop.
#[async_trait]
pub trait Pacer: Send + Sync {
    async fn pause(&self, delay: Duration);
}

/// `Pacer` backed by `tokio::time::sleep`.
///
/// Under `#[tokio::test(start_paused = true)]` this runs on virtual time.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioPacer;

#[async_trait]
impl Pacer for TokioPacer {
    async fn pause(&self, delay: Duration) {
        tokio::time::sleep(delay).await;
    }
}

/// Delay after a batch of `spins`: `per_spin * spins + buffer`.
pub fn pacing_delay(config: &PacingConfig, spins: u32) -> Duration {
    let per_spin = Duration::from_millis(config.per_spin_ms);
    per_spin
        .saturating_mul(spins)
        .saturating_add(Duration::from_millis(config.buffer_ms))
}
