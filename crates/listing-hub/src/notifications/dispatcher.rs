//! Background delivery of queued flat notifications.
//!
//! Each pass fetches every unsent outbox row and tries to deliver it before the
//! pass deadline. A row is marked sent only after a successful send, so a crash
//! or a failed mark between the two steps re-delivers on a later pass.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::{JoinError, JoinHandle};
use tokio::time::{timeout_at, Instant};
use tracing::{debug, info, warn};

use super::sender::NotificationSender;
use crate::storage::NotifyRepository;

/// Counters for one dispatcher pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PollReport {
    pub fetched: usize,
    pub delivered: usize,
    pub failed: usize,
}

pub struct NotificationDispatcher {
    outbox: Arc<dyn NotifyRepository>,
    sender: Arc<dyn NotificationSender>,
}

impl NotificationDispatcher {
    pub fn new(outbox: Arc<dyn NotifyRepository>, sender: Arc<dyn NotificationSender>) -> Self {
        Self { outbox, sender }
    }

    /// Run a single pass bounded by `timeout`.
    ///
    /// Rows not reached before the deadline stay unsent for the next pass.
    pub async fn poll_once(&self, timeout: Duration) -> PollReport {
        let deadline = Instant::now() + timeout;
        let mut report = PollReport::default();

        let pending = match timeout_at(deadline, self.outbox.unsent()).await {
            Ok(Ok(rows)) => rows,
            Ok(Err(err)) => {
                warn!(error = %err, "failed to fetch unsent notifications");
                return report;
            }
            Err(_) => {
                warn!(?timeout, "fetching unsent notifications timed out");
                return report;
            }
        };
        report.fetched = pending.len();

        for (position, notify) in pending.iter().enumerate() {
            if Instant::now() >= deadline {
                debug!(
                    remaining = pending.len() - position,
                    "pass deadline reached, deferring notifications"
                );
                break;
            }

            let message = notify.message();
            match timeout_at(
                deadline,
                self.sender.send_email(&notify.recipient_mail, &message),
            )
            .await
            {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    warn!(notify_id = notify.id, error = %err, "notification delivery failed");
                    report.failed += 1;
                    continue;
                }
                Err(_) => {
                    warn!(notify_id = notify.id, "notification delivery hit the pass deadline");
                    report.failed += 1;
                    break;
                }
            }
            report.delivered += 1;

            match timeout_at(deadline, self.outbox.mark_sent(notify.id)).await {
                Ok(Ok(())) => debug!(notify_id = notify.id, "notification marked sent"),
                Ok(Err(err)) => {
                    warn!(notify_id = notify.id, error = %err, "delivered notification not marked sent")
                }
                Err(_) => {
                    warn!(notify_id = notify.id, "marking notification sent hit the pass deadline")
                }
            }
        }

        report
    }

    /// Spawn the polling loop on the current tokio runtime.
    pub fn start(self, frequency: Duration, timeout: Duration) -> DispatcherHandle {
        let (stop_tx, mut stop_rx) = watch::channel(false);

        let task = tokio::spawn(async move {
            info!(?frequency, ?timeout, "notification dispatcher started");
            loop {
                if *stop_rx.borrow() {
                    break;
                }

                let report = self.poll_once(timeout).await;
                if report.fetched > 0 {
                    info!(
                        fetched = report.fetched,
                        delivered = report.delivered,
                        failed = report.failed,
                        "notification pass finished"
                    );
                }

                tokio::select! {
                    _ = tokio::time::sleep(frequency) => {}
                    changed = stop_rx.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                }
            }
            info!("notification dispatcher stopped");
        });

        DispatcherHandle {
            stop: stop_tx,
            task,
        }
    }
}

/// Owner of a running dispatcher task.
///
/// Dropping the handle also ends the loop after its current pass.
pub struct DispatcherHandle {
    stop: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl DispatcherHandle {
    /// Signal the loop to exit and wait for the in-flight pass to finish.
    pub async fn stop(self) -> Result<(), JoinError> {
        let _ = self.stop.send(true);
        self.task.await
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}
