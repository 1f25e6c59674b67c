//! Gift intake: turns live events into spin batches
//!
//! A single intake task consumes `LiveEvent`s from an `mpsc` channel, so the
//! connector's lifecycle never touches queue state directly.

use std::sync::{Arc, PoisonError, RwLock};

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::config::ConfigPort;
use crate::core::{
    spins_for_coins, BroadcastHub, QueueStatus, ServerEvent, SpinBatchRequest, SpinQueue,
};
use crate::error::{AppError, Result};

use super::types::{ConnectionState, GiftNotification, LiveEvent};

/// Gift label used for batches created through the control plane.
pub const MANUAL_GIFT_LABEL: &str = "Manual Test";

/// Adapter between the live connector and the spin queue.
#[derive(Clone)]
pub struct GiftIntake {
    queue: SpinQueue,
    hub: Arc<BroadcastHub>,
    store: Arc<dyn ConfigPort>,
    connection: Arc<RwLock<ConnectionState>>,
}

impl GiftIntake {
    pub fn new(queue: SpinQueue, hub: Arc<BroadcastHub>, store: Arc<dyn ConfigPort>) -> Self {
        Self {
            queue,
            hub,
            store,
            connection: Arc::new(RwLock::new(ConnectionState::default())),
        }
    }

    pub fn connection_state(&self) -> ConnectionState {
        *self.connection.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_connection_state(&self, state: ConnectionState) {
        *self.connection.write().unwrap_or_else(PoisonError::into_inner) = state;
    }

    /// Convert a gift into a batch and enqueue it.
    ///
    /// Gifts worth less than one spin are dropped silently (`None`).
    pub fn handle_gift(&self, gift: &GiftNotification) -> Option<QueueStatus> {
        let normalized = gift.normalize();
        let spins = spins_for_coins(normalized.total_coins);

        info!(
            user = %normalized.source_identity,
            gift = %normalized.gift_label,
            coin = normalized.total_coins,
            spins = spins,
            "Gift received"
        );

        if spins < 1 {
            return None;
        }

        let batch = SpinBatchRequest::from_coins(
            normalized.source_identity,
            normalized.gift_label,
            normalized.total_coins,
        )
        .ok()?;

        match self.queue.enqueue(batch) {
            Ok(status) => Some(status),
            Err(e) => {
                error!(error = %e, "Failed to enqueue gift batch");
                None
            }
        }
    }

    /// Enqueue a batch on behalf of an operator, bypassing the live connector.
    ///
    /// # Errors
    /// - `InvalidSpin` when `coins` buys less than one spin.
    /// - `EmptyPrizeTable` when the current table has no prizes, since the
    ///   drain loop would skip the batch.
    pub async fn manual_trigger(&self, user: &str, coins: u64) -> Result<SpinBatchRequest> {
        let batch = SpinBatchRequest::from_coins(user, MANUAL_GIFT_LABEL, coins)?;
        if self.store.load().await?.is_empty() {
            warn!(user = %user, "Manual spin refused, prize table is empty");
            return Err(AppError::EmptyPrizeTable);
        }
        self.queue.enqueue(batch.clone())?;
        info!(user = %user, spins = batch.spins, coin = coins, "Manual spin queued");
        Ok(batch)
    }

    /// Apply one live event.
    pub fn handle_event(&self, event: LiveEvent) {
        match event {
            LiveEvent::Connected => {
                let target = self.store.target_identity();
                info!(target = %target, "Live source connected");
                self.set_connection_state(ConnectionState::Connected);
                self.hub.publish(ServerEvent::system(format!(
                    "Connected to live stream (@{})",
                    target
                )));
            }
            LiveEvent::Disconnected => {
                info!("Live source disconnected");
                self.set_connection_state(ConnectionState::Disconnected);
                self.hub
                    .publish(ServerEvent::system("Disconnected from live stream"));
            }
            LiveEvent::Error(message) => {
                warn!(error = %message, "Live source error");
                self.set_connection_state(ConnectionState::Error);
                self.hub
                    .publish(ServerEvent::system(format!("Live stream error: {}", message)));
            }
            LiveEvent::Gift(gift) => {
                self.handle_gift(&gift);
            }
        }
    }

    /// Consume live events until every sender is dropped.
    pub async fn run(self, mut events: mpsc::Receiver<LiveEvent>) {
        info!("Gift intake started");
        let mut handled: u64 = 0;

        while let Some(event) = events.recv().await {
            handled += 1;
            debug!(event = ?event, "Live event");
            self.handle_event(event);
        }

        info!(events = handled, "Gift intake stopped");
    }
}
