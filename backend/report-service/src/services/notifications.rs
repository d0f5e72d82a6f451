//! Outbound email notifications
//!
//! Mutations hand notifications to a bounded queue and return immediately. A dispatcher
//! task drains the queue and delivers through a [`Mailer`] with bounded concurrency.
//! Delivery outcome never affects the request that produced the notification:
//! - a full queue drops the notification with a warning
//! - delivery failures are logged and counted
//! - closing the queue lets in-flight deliveries finish before the dispatcher exits

use crate::domain::{IssueType, ReportStatus};
use crate::metrics::NOTIFICATION_EVENTS;
use crate::repository::ContactDirectory;
use anyhow::{Context, Result};
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::Semaphore;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    ReportReceived {
        user_id: Uuid,
        report_id: Uuid,
        issue_type: IssueType,
    },
    StatusChanged {
        user_id: Uuid,
        report_id: Uuid,
        status: ReportStatus,
        rejection_reason: Option<String>,
    },
}

impl Notification {
    pub fn recipient(&self) -> Uuid {
        match self {
            Notification::ReportReceived { user_id, .. }
            | Notification::StatusChanged { user_id, .. } => *user_id,
        }
    }

    pub fn subject(&self) -> String {
        match self {
            Notification::ReportReceived { issue_type, .. } => {
                format!("We received your {} report", issue_type)
            }
            Notification::StatusChanged { status, .. } => {
                format!("Your report is now {}", status)
            }
        }
    }

    pub fn body(&self) -> String {
        match self {
            Notification::ReportReceived {
                report_id,
                issue_type,
                ..
            } => format!(
                "Thank you for reporting a {} issue. Your report {} is pending review.",
                issue_type, report_id
            ),
            Notification::StatusChanged {
                report_id,
                status,
                rejection_reason,
                ..
            } => match rejection_reason {
                Some(reason) => format!(
                    "Your report {} was marked {}. Reason: {}",
                    report_id, status, reason
                ),
                None => format!("Your report {} was marked {}.", report_id, status),
            },
        }
    }
}

/// Delivery backend for notifications
#[async_trait::async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, notification: &Notification) -> Result<()>;
}

/// Mailer used when no SMTP relay is configured
pub struct LogMailer;

#[async_trait::async_trait]
impl Mailer for LogMailer {
    async fn send(&self, notification: &Notification) -> Result<()> {
        info!(
            user_id = %notification.recipient(),
            subject = %notification.subject(),
            "Notification (log-only mailer)"
        );
        Ok(())
    }
}

/// SMTP relay mailer; recipients are resolved at delivery time
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    directory: Arc<dyn ContactDirectory>,
}

impl SmtpMailer {
    pub fn new(
        host: &str,
        credentials: Option<(String, String)>,
        from: &str,
        directory: Arc<dyn ContactDirectory>,
    ) -> Result<Self> {
        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::relay(host)
            .with_context(|| format!("invalid SMTP relay host {}", host))?;
        if let Some((username, password)) = credentials {
            builder = builder.credentials(Credentials::new(username, password));
        }

        Ok(Self {
            transport: builder.build(),
            from: from
                .parse()
                .with_context(|| format!("invalid SMTP_FROM address {}", from))?,
            directory,
        })
    }
}

#[async_trait::async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, notification: &Notification) -> Result<()> {
        let user_id = notification.recipient();
        let Some(address) = self.directory.email_for(user_id).await? else {
            debug!(%user_id, "No email on file; skipping notification");
            return Ok(());
        };

        let message = Message::builder()
            .from(self.from.clone())
            .to(address
                .parse()
                .with_context(|| format!("invalid recipient address for user {}", user_id))?)
            .subject(notification.subject())
            .body(notification.body())
            .context("failed to build notification email")?;

        self.transport
            .send(message)
            .await
            .context("SMTP delivery failed")?;
        Ok(())
    }
}

/// Producer side of the notification queue
#[derive(Clone)]
pub struct NotificationQueue {
    tx: mpsc::Sender<Notification>,
}

pub type NotificationReceiver = mpsc::Receiver<Notification>;

/// Create a bounded notification queue
pub fn notification_queue(capacity: usize) -> (NotificationQueue, NotificationReceiver) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (NotificationQueue { tx }, rx)
}

impl NotificationQueue {
    /// Queue without waiting. Returns false when the notification was dropped.
    pub fn enqueue(&self, notification: Notification) -> bool {
        match self.tx.try_send(notification) {
            Ok(()) => {
                NOTIFICATION_EVENTS.with_label_values(&["queued"]).inc();
                true
            }
            Err(TrySendError::Full(dropped)) => {
                warn!(
                    user_id = %dropped.recipient(),
                    "Notification queue full; dropping notification"
                );
                NOTIFICATION_EVENTS.with_label_values(&["dropped"]).inc();
                false
            }
            Err(TrySendError::Closed(dropped)) => {
                warn!(
                    user_id = %dropped.recipient(),
                    "Notification queue closed; dropping notification"
                );
                NOTIFICATION_EVENTS.with_label_values(&["dropped"]).inc();
                false
            }
        }
    }
}

/// Spawn the dispatcher that drains `receiver` with at most `concurrency` deliveries in flight
pub fn spawn_notification_dispatcher(
    mut receiver: NotificationReceiver,
    mailer: Arc<dyn Mailer>,
    concurrency: usize,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(concurrency, "Notification dispatcher started");

        let permits = Arc::new(Semaphore::new(concurrency.max(1)));
        let mut in_flight = JoinSet::new();

        while let Some(notification) = receiver.recv().await {
            let permit = match permits.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => break,
            };
            let mailer = mailer.clone();

            in_flight.spawn(async move {
                let _permit = permit;
                match mailer.send(&notification).await {
                    Ok(()) => {
                        NOTIFICATION_EVENTS.with_label_values(&["sent"]).inc();
                    }
                    Err(e) => {
                        error!(
                            user_id = %notification.recipient(),
                            error = ?e,
                            "Notification delivery failed"
                        );
                        NOTIFICATION_EVENTS.with_label_values(&["failed"]).inc();
                    }
                }
            });

            // reap finished deliveries so the set does not grow unbounded
            while in_flight.try_join_next().is_some() {}
        }

        while in_flight.join_next().await.is_some() {}
        info!("Notification dispatcher stopped (queue closed)");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingMailer {
        sent: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl Mailer for CountingMailer {
        async fn send(&self, _notification: &Notification) -> Result<()> {
            self.sent.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn received() -> Notification {
        Notification::ReportReceived {
            user_id: Uuid::new_v4(),
            report_id: Uuid::new_v4(),
            issue_type: IssueType::Streetlight,
        }
    }

    #[test]
    fn test_rejection_body_includes_reason() {
        let notification = Notification::StatusChanged {
            user_id: Uuid::new_v4(),
            report_id: Uuid::new_v4(),
            status: ReportStatus::Rejected,
            rejection_reason: Some("Duplicate report".to_string()),
        };

        assert_eq!(notification.subject(), "Your report is now Rejected");
        assert!(notification.body().contains("Duplicate report"));
    }

    #[test]
    fn test_full_queue_drops_without_blocking() {
        let (queue, _rx) = notification_queue(1);
        assert!(queue.enqueue(received()));
        assert!(!queue.enqueue(received()));
    }

    #[tokio::test]
    async fn test_dispatcher_drains_queue_before_exit() {
        let mailer = Arc::new(CountingMailer {
            sent: AtomicUsize::new(0),
        });
        let (queue, rx) = notification_queue(16);
        let handle = spawn_notification_dispatcher(rx, mailer.clone(), 2);

        for _ in 0..5 {
            assert!(queue.enqueue(received()));
        }
        drop(queue);

        handle.await.unwrap();
        assert_eq!(mailer.sent.load(Ordering::SeqCst), 5);
    }
}
