//! Flush scheduler
//!
//! Background task persisting the inventory every flush interval. A shutdown
//! request triggers one last flush whose result is sent back as the
//! acknowledgement.

use std::fmt;
use std::sync::Weak;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::error::CoreError;
use crate::inventory::Inventory;

/// Lifecycle of the flush scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushState {
    Running,
    ShuttingDown,
    Stopped,
}

impl fmt::Display for FlushState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FlushState::Running => "running",
            FlushState::ShuttingDown => "shutting_down",
            FlushState::Stopped => "stopped",
        };
        write!(f, "{s}")
    }
}

/// Shutdown request, answered with the final flush result
pub(crate) type ShutdownRequest = oneshot::Sender<Result<(), CoreError>>;

pub(crate) fn spawn(
    inventory: Weak<Inventory>,
    interval: Duration,
    requests: mpsc::Receiver<ShutdownRequest>,
    state_tx: watch::Sender<FlushState>,
) {
    tokio::spawn(run(inventory, interval, requests, state_tx));
}

async fn run(
    inventory: Weak<Inventory>,
    interval: Duration,
    mut requests: mpsc::Receiver<ShutdownRequest>,
    state_tx: watch::Sender<FlushState>,
) {
    info!(interval = ?interval, "flush scheduler started");

    let mut ticker = time::interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;

            request = requests.recv() => {
                state_tx.send_replace(FlushState::ShuttingDown);
                shut_down(&inventory, request).await;
                state_tx.send_replace(FlushState::Stopped);
                info!("flush scheduler stopped");
                return;
            }

            _ = ticker.tick() => {
                let Some(inventory) = inventory.upgrade() else {
                    debug!("inventory dropped, flush scheduler exiting");
                    state_tx.send_replace(FlushState::Stopped);
                    return;
                };
                if let Err(e) = inventory.save().await {
                    warn!(error = %e, "scheduled flush failed, retrying next cycle");
                }
            }
        }
    }
}

async fn shut_down(inventory: &Weak<Inventory>, request: Option<ShutdownRequest>) {
    let Some(ack) = request else {
        // Every handle is gone; nothing left to flush.
        debug!("shutdown channel closed without request");
        return;
    };

    info!("shutdown signal received, performing final flush");
    let result = match inventory.upgrade() {
        Some(inventory) => inventory.save().await,
        None => Err(CoreError::ShutdownFailed(
            "inventory dropped before final flush".to_string(),
        )),
    };

    if let Err(e) = &result {
        error!(error = %e, "final flush failed");
    }
    if ack.send(result).is_err() {
        warn!("shutdown requester went away before acknowledgement");
    }
}

/// Ask the scheduler to stop and wait a bounded time for its acknowledgement
pub(crate) async fn request_shutdown(
    requests: &mpsc::Sender<ShutdownRequest>,
    timeout: Duration,
) -> Result<(), CoreError> {
    let (ack_tx, ack_rx) = oneshot::channel();

    requests
        .send(ack_tx)
        .await
        .map_err(|_| CoreError::ShutdownFailed("flush scheduler is not running".to_string()))?;

    match time::timeout(timeout, ack_rx).await {
        Ok(Ok(result)) => result,
        Ok(Err(_)) => Err(CoreError::ShutdownFailed(
            "flush scheduler exited without acknowledging".to_string(),
        )),
        Err(_) => Err(CoreError::ShutdownTimeout(timeout)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(FlushState::Running.to_string(), "running");
        assert_eq!(FlushState::ShuttingDown.to_string(), "shutting_down");
        assert_eq!(FlushState::Stopped.to_string(), "stopped");
    }

    #[tokio::test]
    async fn test_request_without_scheduler_fails() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);

        let err = request_shutdown(&tx, Duration::from_millis(50))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::ShutdownFailed(_)));
    }

    #[tokio::test]
    async fn test_dropped_ack_is_reported() {
        let (tx, mut rx) = mpsc::channel::<ShutdownRequest>(1);
        tokio::spawn(async move {
            let ack = rx.recv().await;
            drop(ack);
        });

        let err = request_shutdown(&tx, Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::ShutdownFailed(_)));
    }

    #[tokio::test]
    async fn test_missing_ack_times_out() {
        let (tx, mut rx) = mpsc::channel::<ShutdownRequest>(1);
        let holder = tokio::spawn(async move {
            let ack = rx.recv().await;
            time::sleep(Duration::from_secs(5)).await;
            drop(ack);
        });

        let err = request_shutdown(&tx, Duration::from_millis(50))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::ShutdownTimeout(d) if d == Duration::from_millis(50)));
        holder.abort();
    }
}
