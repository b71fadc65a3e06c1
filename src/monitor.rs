//! The periodic batch loop: every check interval, refresh each monitored
//! user's full schedule, fingerprint it, and notify on change. One user's
//! failure never aborts the rest of the batch, and a mandatory pacing delay
//! separates consecutive users so the upstream site is never hammered.

use crate::config::Config;
use crate::service::ScheduleService;
use crate::store::{DataManager, MonitoredUser};
use crate::types::{member_url, serialize_events, ScheduleMode};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info, warn};

/// Notification embeds cap their body at this length.
const NOTIFY_TEXT_LIMIT: usize = 4000;

/// Where change notifications go. The chat layer supplies the real one.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, username: &str, user_id: &str, event_text: &str, source_url: &str);
}

/// Writes notifications to the log; used when running without a chat layer.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, username: &str, user_id: &str, event_text: &str, source_url: &str) {
        let body = if event_text.is_empty() {
            "登録されている今後の予定はありません。"
        } else {
            truncate_chars(event_text, NOTIFY_TEXT_LIMIT)
        };
        info!(
            user = username,
            user_id,
            url = source_url,
            schedule = body,
            "schedule updated"
        );
    }
}

fn truncate_chars(text: &str, limit: usize) -> &str {
    match text.char_indices().nth(limit) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Snapshot of the loop for status reporting.
#[derive(Debug, Clone)]
pub struct MonitorStatus {
    pub running: bool,
    pub next_run_at: Option<DateTime<Utc>>,
    pub user_count: usize,
    pub notification_target_configured: bool,
}

pub struct Monitor {
    service: Arc<ScheduleService>,
    data: Arc<Mutex<DataManager>>,
    notifier: Arc<dyn Notifier>,
    check_interval: Duration,
    access_interval: Duration,
    notification_target: RwLock<Option<String>>,
    running: AtomicBool,
    next_run_at: RwLock<Option<DateTime<Utc>>>,
}

impl Monitor {
    pub fn new(
        service: Arc<ScheduleService>,
        data: Arc<Mutex<DataManager>>,
        notifier: Arc<dyn Notifier>,
        config: &Config,
    ) -> Self {
        Self {
            service,
            data,
            notifier,
            check_interval: Duration::from_secs(config.check_interval_hours * 3600),
            access_interval: Duration::from_secs(config.access_interval_seconds),
            notification_target: RwLock::new(config.notification_target.clone()),
            running: AtomicBool::new(false),
            next_run_at: RwLock::new(None),
        }
    }

    /// Runtime update of the notification target; takes effect on the next
    /// batch without restarting the loop.
    pub fn set_notification_target(&self, target: Option<String>) {
        *self.notification_target.write().unwrap() = target;
    }

    pub fn notification_target(&self) -> Option<String> {
        self.notification_target.read().unwrap().clone()
    }

    pub fn status(&self) -> MonitorStatus {
        MonitorStatus {
            running: self.running.load(Ordering::Relaxed),
            next_run_at: *self.next_run_at.read().unwrap(),
            user_count: self.data.lock().unwrap().user_count(),
            notification_target_configured: self.notification_target().is_some(),
        }
    }

    /// Runs the batch loop until `shutdown` fires. The first batch starts
    /// immediately. The signal also interrupts an in-flight batch between
    /// users, which is safe: fingerprints persist at batch end, so the worst
    /// outcome is one repeated notification.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        self.running.store(true, Ordering::Relaxed);
        let mut interval = tokio::time::interval(self.check_interval);

        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                _ = interval.tick() => {
                    *self.next_run_at.write().unwrap() =
                        Some(Utc::now()
                            + chrono::Duration::from_std(self.check_interval)
                                .unwrap_or_else(|_| chrono::Duration::zero()));
                    if self.run_batch(&mut shutdown).await {
                        break;
                    }
                }
            }
        }

        self.running.store(false, Ordering::Relaxed);
        self.data.lock().unwrap().save_all();
        info!("monitor loop stopped");
    }

    /// One pass over every registered user, not interruptible from outside.
    /// On-demand callers use this; the loop goes through [`Monitor::run`].
    pub async fn check_all_users(&self) {
        let (tx, mut rx) = watch::channel(false);
        self.run_batch(&mut rx).await;
        drop(tx);
    }

    /// One pass over every registered user. Checks `shutdown` at every user
    /// boundary (and against the pacing sleep and the in-flight check), so a
    /// stop request never waits out the rest of the batch. Returns true when
    /// interrupted.
    async fn run_batch(&self, shutdown: &mut watch::Receiver<bool>) -> bool {
        if self.notification_target().is_none() {
            warn!("no notification target configured; skipping batch check");
            return false;
        }

        info!("=== batch check started ===");
        let users: Vec<MonitoredUser> = self.data.lock().unwrap().users().to_vec();

        let mut interrupted = false;
        for (i, user) in users.iter().enumerate() {
            if i > 0 {
                // Mandatory pacing between consecutive users
                tokio::select! {
                    _ = shutdown.changed() => {
                        interrupted = true;
                        break;
                    }
                    _ = tokio::time::sleep(self.access_interval) => {}
                }
            }
            tokio::select! {
                _ = shutdown.changed() => {
                    interrupted = true;
                    break;
                }
                _ = self.check_user(user) => {}
            }
        }

        self.data.lock().unwrap().save_all();
        if interrupted {
            info!("=== batch check interrupted by shutdown ===");
        } else {
            info!("=== batch check complete ===");
        }
        interrupted
    }

    async fn check_user(&self, user: &MonitoredUser) {
        match self
            .service
            .refresh(&user.id, &user.name, ScheduleMode::AllFuture)
            .await
        {
            Ok(events) => {
                let text = serialize_events(&events);
                let changed = self.data.lock().unwrap().has_changed(&user.id, &text);
                if changed {
                    info!(user = %user.name, "schedule updated");
                    self.notifier
                        .notify(&user.name, &user.id, &text, &member_url(&user.id))
                        .await;
                } else {
                    info!(user = %user.name, "no schedule change");
                }
            }
            // Fetch failures are retried on the next cycle, never in-loop
            Err(e) => error!(user = %user.name, error = %e, "schedule check failed"),
        }
    }
}
