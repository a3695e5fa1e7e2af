//! Offline-tolerant debrief submission queue.
//!
//! Every mutation rewrites the persisted slot in full, so a fresh
//! [`DebriefQueue::open`] over the same store recovers the same records.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{SubsecRound, Utc};
use tokio::sync::watch;
use uuid::Uuid;

use crate::models::{QueuedSubmission, SubmissionStatus};
use crate::notify::{NotificationKind, NotificationSink};
use crate::remote::RemoteDataService;
use crate::storage::KeyValueStore;

pub const DEFAULT_STORAGE_KEY: &str = "debrief-queue";
pub const DEFAULT_RETENTION: Duration = Duration::from_millis(3000);
pub const DEFAULT_SUBMIT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct QueueSettings {
    pub storage_key: String,
    /// How long a submitted record stays visible before removal.
    pub retention: Duration,
    pub submit_timeout: Duration,
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
            retention: DEFAULT_RETENTION,
            submit_timeout: DEFAULT_SUBMIT_TIMEOUT,
        }
    }
}

#[derive(Clone)]
pub struct DebriefQueue {
    inner: Arc<Inner>,
}

struct Inner {
    records: watch::Sender<Vec<QueuedSubmission>>,
    online: watch::Sender<bool>,
    in_flight: Mutex<HashSet<String>>,
    store: Arc<dyn KeyValueStore>,
    remote: Arc<dyn RemoteDataService>,
    sink: Arc<dyn NotificationSink>,
    settings: QueueSettings,
}

impl DebriefQueue {
    /// Loads the persisted queue and schedules removal of records that were
    /// already submitted. Must be called inside a tokio runtime.
    pub fn open(
        store: Arc<dyn KeyValueStore>,
        remote: Arc<dyn RemoteDataService>,
        sink: Arc<dyn NotificationSink>,
        settings: QueueSettings,
        online: bool,
    ) -> Self {
        let records = load_records(store.as_ref(), &settings.storage_key);
        let submitted: Vec<String> = records
            .iter()
            .filter(|r| r.status == SubmissionStatus::Submitted)
            .map(|r| r.id.clone())
            .collect();

        let queue = Self {
            inner: Arc::new(Inner {
                records: watch::Sender::new(records),
                online: watch::Sender::new(online),
                in_flight: Mutex::new(HashSet::new()),
                store,
                remote,
                sink,
                settings,
            }),
        };

        for id in submitted {
            queue.schedule_removal(id);
        }
        queue
    }

    pub fn is_online(&self) -> bool {
        *self.inner.online.borrow()
    }

    pub fn records(&self) -> Vec<QueuedSubmission> {
        self.inner.records.borrow().clone()
    }

    pub fn pending_count(&self) -> usize {
        self.inner
            .records
            .borrow()
            .iter()
            .filter(|r| r.is_outstanding())
            .count()
    }

    pub fn subscribe(&self) -> watch::Receiver<Vec<QueuedSubmission>> {
        self.inner.records.subscribe()
    }

    pub fn subscribe_connectivity(&self) -> watch::Receiver<bool> {
        self.inner.online.subscribe()
    }

    pub async fn enqueue(
        &self,
        subject_id: impl Into<String>,
        payload: serde_json::Value,
    ) -> QueuedSubmission {
        let online = self.is_online();
        let record = QueuedSubmission {
            id: Uuid::now_v7().to_string(),
            subject_id: subject_id.into(),
            payload,
            // Persisted at millisecond precision.
            enqueued_at: Utc::now().trunc_subsecs(3),
            status: if online {
                SubmissionStatus::Submitting
            } else {
                SubmissionStatus::Pending
            },
        };

        // Claimed before it becomes visible so no drain treats it as orphaned.
        if online {
            self.mark_in_flight(&record.id);
        }
        self.mutate(|records| records.push(record.clone()));
        log::info!(
            "queued debrief {} for meeting {} ({})",
            record.id,
            record.subject_id,
            record.status
        );

        if online {
            self.inner.sink.notify(
                NotificationKind::Info,
                "Submitting debrief",
                "Your debrief is being submitted.",
            );
            self.deliver(&record.id).await;
            self.drain().await;
        } else {
            self.inner.sink.notify(
                NotificationKind::Info,
                "Saved offline",
                "Your debrief was saved and will sync when you are back online.",
            );
        }

        record
    }

    /// Delivers every record that is pending when the pass starts. Records
    /// enqueued during the pass wait for the next one.
    pub async fn drain(&self) {
        if !self.is_online() {
            log::debug!("drain skipped while offline");
            return;
        }

        let candidates: Vec<String> = {
            let in_flight = self.lock_in_flight();
            let records = self.inner.records.borrow();
            records
                .iter()
                .filter(|r| match r.status {
                    SubmissionStatus::Pending => true,
                    // Left behind by a previous process.
                    SubmissionStatus::Submitting => !in_flight.contains(&r.id),
                    _ => false,
                })
                .map(|r| r.id.clone())
                .collect()
        };

        for id in candidates {
            if self.claim(&id) {
                self.deliver(&id).await;
            }
        }
    }

    pub async fn retry_failed(&self) {
        let mut retried = 0usize;
        self.mutate(|records| {
            for record in records
                .iter_mut()
                .filter(|r| r.status == SubmissionStatus::Failed)
            {
                record.status = SubmissionStatus::Pending;
                retried += 1;
            }
        });
        log::info!("retrying {retried} failed debriefs");
        self.drain().await;
    }

    pub async fn handle_online(&self) {
        self.inner.online.send_replace(true);
        self.inner.sink.notify(
            NotificationKind::Success,
            "Back online",
            "Syncing queued debriefs.",
        );
        self.drain().await;
    }

    pub fn handle_offline(&self) {
        self.inner.online.send_replace(false);
        self.inner.sink.notify(
            NotificationKind::Info,
            "You are offline",
            "New debriefs will be queued and submitted when you reconnect.",
        );
    }

    /// Drops submitted records without waiting for the retention delay.
    pub fn clear_submitted(&self) -> usize {
        let mut removed = 0usize;
        self.mutate(|records| {
            let before = records.len();
            records.retain(|r| r.status != SubmissionStatus::Submitted);
            removed = before - records.len();
        });
        removed
    }

    /// Moves a pending or orphaned record to `submitting`. Returns false when
    /// another pass already owns it.
    fn claim(&self, id: &str) -> bool {
        {
            let mut in_flight = self.lock_in_flight();
            if in_flight.contains(id) {
                return false;
            }
            let claimable = self.inner.records.borrow().iter().any(|r| {
                r.id == id
                    && matches!(
                        r.status,
                        SubmissionStatus::Pending | SubmissionStatus::Submitting
                    )
            });
            if !claimable {
                return false;
            }
            in_flight.insert(id.to_string());
        }
        self.set_status(id, SubmissionStatus::Submitting);
        true
    }

    fn mark_in_flight(&self, id: &str) {
        self.lock_in_flight().insert(id.to_string());
    }

    async fn deliver(&self, id: &str) {
        let record = self
            .inner
            .records
            .borrow()
            .iter()
            .find(|r| r.id == id)
            .cloned();
        let Some(record) = record else {
            self.lock_in_flight().remove(id);
            return;
        };

        let outcome = tokio::time::timeout(
            self.inner.settings.submit_timeout,
            self.inner.remote.submit(&record.subject_id, &record.payload),
        )
        .await;

        let result = match outcome {
            Ok(result) => result,
            Err(_) => Err(anyhow::anyhow!(
                "submit timed out after {:?}",
                self.inner.settings.submit_timeout
            )),
        };

        match result {
            Ok(()) => {
                self.set_status(id, SubmissionStatus::Submitted);
                log::info!("debrief {id} submitted for meeting {}", record.subject_id);
                self.inner.sink.notify(
                    NotificationKind::Success,
                    "Debrief submitted",
                    "Your debrief was submitted for review.",
                );
                self.schedule_removal(id.to_string());
            }
            Err(err) => {
                self.set_status(id, SubmissionStatus::Failed);
                log::warn!("debrief {id} failed to submit: {err:#}");
                self.inner.sink.notify(
                    NotificationKind::Error,
                    "Submission failed",
                    "Your debrief is saved and will retry automatically when you are back online.",
                );
            }
        }

        self.lock_in_flight().remove(id);
    }

    fn schedule_removal(&self, id: String) {
        let queue = self.clone();
        let retention = self.inner.settings.retention;
        tokio::spawn(async move {
            tokio::time::sleep(retention).await;
            queue.mutate(|records| {
                records.retain(|r| !(r.id == id && r.status == SubmissionStatus::Submitted))
            });
        });
    }

    fn set_status(&self, id: &str, status: SubmissionStatus) {
        self.mutate(|records| {
            if let Some(record) = records.iter_mut().find(|r| r.id == id) {
                record.status = status;
            }
        });
    }

    /// Applies `apply` and rewrites the persisted slot while the watch value
    /// is still write-locked, so saves land in the same order as mutations.
    fn mutate(&self, apply: impl FnOnce(&mut Vec<QueuedSubmission>)) {
        let mut written = Ok(());
        self.inner.records.send_modify(|records| {
            apply(records);
            written = self.write_snapshot(records);
        });

        if let Err(err) = written {
            log::error!("failed to persist debrief queue: {err:#}");
            self.inner.sink.notify(
                NotificationKind::Error,
                "Offline storage unavailable",
                "Queued debriefs may not survive a reload.",
            );
        }
    }

    fn write_snapshot(&self, records: &[QueuedSubmission]) -> anyhow::Result<()> {
        let text = serde_json::to_string(records)?;
        self.inner
            .store
            .write(&self.inner.settings.storage_key, &text)?;
        Ok(())
    }

    fn lock_in_flight(&self) -> std::sync::MutexGuard<'_, HashSet<String>> {
        self.inner
            .in_flight
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn load_records(store: &dyn KeyValueStore, key: &str) -> Vec<QueuedSubmission> {
    let text = match store.read(key) {
        Ok(Some(text)) => text,
        Ok(None) => return Vec::new(),
        Err(err) => {
            log::error!("failed to read debrief queue: {err}");
            return Vec::new();
        }
    };

    match serde_json::from_str(&text) {
        Ok(records) => records,
        Err(err) => {
            log::error!("discarding unreadable debrief queue: {err}");
            Vec::new()
        }
    }
}
