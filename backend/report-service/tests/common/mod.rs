//! In-memory collaborators for integration tests
#![allow(dead_code)]

use chrono::{DateTime, Utc};
use civic_cache::{CacheError, CacheResult, KeyValueCache};
use report_service::domain::{Comment, IssueType, Report, ReportFilter, ReportStatus, Upvote};
use report_service::repository::ReportStore;
use report_service::services::{
    notification_queue, InvalidationCoordinator, Mailer, Notification, NotificationQueue,
};
use report_service::{CoreSettings, ReportCore, StoreError, StoreResult};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use uuid::Uuid;

// ========== Store ==========

#[derive(Default)]
struct Collections {
    reports: Vec<Report>,
    comments: Vec<Comment>,
    upvotes: Vec<Upvote>,
}

/// Call-counting store with per-operation failure injection
#[derive(Default)]
pub struct MemoryStore {
    data: Mutex<Collections>,
    calls: Mutex<HashMap<&'static str, usize>>,
    failing: Mutex<HashSet<&'static str>>,
    after_find_report: Mutex<Option<Box<dyn FnOnce(&mut Report) + Send>>>,
}

impl MemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn enter(&self, op: &'static str) -> StoreResult<()> {
        *self.calls.lock().unwrap().entry(op).or_insert(0) += 1;
        if self.failing.lock().unwrap().contains(op) {
            return Err(StoreError::Unavailable(format!("injected failure in {}", op)));
        }
        Ok(())
    }

    /// Make every call to `op` fail until `heal` is called
    pub fn fail(&self, op: &'static str) {
        self.failing.lock().unwrap().insert(op);
    }

    pub fn heal(&self, op: &'static str) {
        self.failing.lock().unwrap().remove(op);
    }

    pub fn calls(&self, op: &str) -> usize {
        self.calls.lock().unwrap().get(op).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().values().sum()
    }

    pub fn reset_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    /// Apply `change` to the stored report right after the next `find_report` has taken its
    /// snapshot, as a concurrent writer committing between a read and a write would
    pub fn after_next_find_report(&self, change: impl FnOnce(&mut Report) + Send + 'static) {
        *self.after_find_report.lock().unwrap() = Some(Box::new(change));
    }

    pub fn report(&self, report_id: Uuid) -> Option<Report> {
        self.data
            .lock()
            .unwrap()
            .reports
            .iter()
            .find(|r| r.id == report_id)
            .cloned()
    }

    /// Seed a report directly, bypassing the service layer
    pub fn seed_report(&self, report: Report) {
        self.data.lock().unwrap().reports.push(report);
    }

    pub fn upvote_count(&self, report_id: Uuid) -> usize {
        self.data
            .lock()
            .unwrap()
            .upvotes
            .iter()
            .filter(|u| u.report_id == report_id)
            .count()
    }
}

#[async_trait::async_trait]
impl ReportStore for MemoryStore {
    async fn find_reports(&self, filter: ReportFilter) -> StoreResult<Vec<Report>> {
        self.enter("find_reports")?;
        let data = self.data.lock().unwrap();
        let mut reports: Vec<Report> = data
            .reports
            .iter()
            .filter(|r| filter.matches(r.status, r.issue_type))
            .cloned()
            .collect();
        reports.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(reports)
    }

    async fn find_report(&self, report_id: Uuid) -> StoreResult<Option<Report>> {
        self.enter("find_report")?;
        let mut data = self.data.lock().unwrap();
        let snapshot = data.reports.iter().find(|r| r.id == report_id).cloned();

        if let Some(change) = self.after_find_report.lock().unwrap().take() {
            if let Some(stored) = data.reports.iter_mut().find(|r| r.id == report_id) {
                change(stored);
            }
        }
        Ok(snapshot)
    }

    async fn insert_report(&self, report: &Report) -> StoreResult<()> {
        self.enter("insert_report")?;
        self.data.lock().unwrap().reports.push(report.clone());
        Ok(())
    }

    async fn update_pending_report(&self, owner_id: Uuid, report: &Report) -> StoreResult<bool> {
        self.enter("update_pending_report")?;
        let mut data = self.data.lock().unwrap();
        let existing = data.reports.iter_mut().find(|r| {
            r.id == report.id && r.user_id == owner_id && r.status == ReportStatus::Pending
        });
        match existing {
            Some(existing) => {
                existing.issue_type = report.issue_type;
                existing.location = report.location;
                existing.address = report.address.clone();
                existing.description = report.description.clone();
                existing.images = report.images.clone();
                existing.updated_at = report.updated_at;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn update_report_status(
        &self,
        report_id: Uuid,
        status: ReportStatus,
        rejection_reason: Option<&str>,
        updated_at: DateTime<Utc>,
    ) -> StoreResult<Option<Report>> {
        self.enter("update_report_status")?;
        let mut data = self.data.lock().unwrap();
        Ok(data.reports.iter_mut().find(|r| r.id == report_id).map(|existing| {
            existing.status = status;
            existing.rejection_reason = rejection_reason.map(str::to_string);
            existing.updated_at = updated_at;
            existing.clone()
        }))
    }

    async fn delete_report(&self, report_id: Uuid) -> StoreResult<bool> {
        self.enter("delete_report")?;
        let mut data = self.data.lock().unwrap();
        let before = data.reports.len();
        data.reports.retain(|r| r.id != report_id);
        data.comments.retain(|c| c.report_id != report_id);
        data.upvotes.retain(|u| u.report_id != report_id);
        Ok(data.reports.len() != before)
    }

    async fn count_upvotes_by_report(&self, report_ids: &[Uuid]) -> StoreResult<Vec<(Uuid, i64)>> {
        self.enter("count_upvotes_by_report")?;
        let data = self.data.lock().unwrap();
        let mut counts: HashMap<Uuid, i64> = HashMap::new();
        for upvote in data.upvotes.iter().filter(|u| report_ids.contains(&u.report_id)) {
            *counts.entry(upvote.report_id).or_insert(0) += 1;
        }
        Ok(counts.into_iter().collect())
    }

    async fn count_comments_by_report(
        &self,
        report_ids: &[Uuid],
    ) -> StoreResult<Vec<(Uuid, i64)>> {
        self.enter("count_comments_by_report")?;
        let data = self.data.lock().unwrap();
        let mut counts: HashMap<Uuid, i64> = HashMap::new();
        for comment in data.comments.iter().filter(|c| report_ids.contains(&c.report_id)) {
            *counts.entry(comment.report_id).or_insert(0) += 1;
        }
        Ok(counts.into_iter().collect())
    }

    async fn upvoted_report_ids(&self, user_id: Uuid, report_ids: &[Uuid]) -> StoreResult<Vec<Uuid>> {
        self.enter("upvoted_report_ids")?;
        let data = self.data.lock().unwrap();
        Ok(data
            .upvotes
            .iter()
            .filter(|u| u.user_id == user_id && report_ids.contains(&u.report_id))
            .map(|u| u.report_id)
            .collect())
    }

    async fn insert_upvote(&self, upvote: &Upvote) -> StoreResult<()> {
        self.enter("insert_upvote")?;
        let mut data = self.data.lock().unwrap();
        if data
            .upvotes
            .iter()
            .any(|u| u.user_id == upvote.user_id && u.report_id == upvote.report_id)
        {
            return Err(StoreError::Duplicate("upvotes_user_id_report_id_key".to_string()));
        }
        data.upvotes.push(upvote.clone());
        Ok(())
    }

    async fn delete_upvote(&self, user_id: Uuid, report_id: Uuid) -> StoreResult<bool> {
        self.enter("delete_upvote")?;
        let mut data = self.data.lock().unwrap();
        let before = data.upvotes.len();
        data.upvotes
            .retain(|u| !(u.user_id == user_id && u.report_id == report_id));
        Ok(data.upvotes.len() != before)
    }

    async fn find_comment(&self, comment_id: Uuid) -> StoreResult<Option<Comment>> {
        self.enter("find_comment")?;
        let data = self.data.lock().unwrap();
        Ok(data.comments.iter().find(|c| c.id == comment_id).cloned())
    }

    async fn insert_comment(&self, comment: &Comment) -> StoreResult<()> {
        self.enter("insert_comment")?;
        self.data.lock().unwrap().comments.push(comment.clone());
        Ok(())
    }

    async fn update_comment(&self, comment: &Comment) -> StoreResult<bool> {
        self.enter("update_comment")?;
        let mut data = self.data.lock().unwrap();
        match data.comments.iter_mut().find(|c| c.id == comment.id) {
            Some(existing) => {
                *existing = comment.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_comment(&self, comment_id: Uuid) -> StoreResult<bool> {
        self.enter("delete_comment")?;
        let mut data = self.data.lock().unwrap();
        let before = data.comments.len();
        data.comments.retain(|c| c.id != comment_id);
        Ok(data.comments.len() != before)
    }

    async fn count_reports_by_status(&self) -> StoreResult<Vec<(ReportStatus, i64)>> {
        self.enter("count_reports_by_status")?;
        let data = self.data.lock().unwrap();
        let mut counts: HashMap<ReportStatus, i64> = HashMap::new();
        for report in &data.reports {
            *counts.entry(report.status).or_insert(0) += 1;
        }
        Ok(counts.into_iter().collect())
    }

    async fn average_resolution_secs(&self) -> StoreResult<Option<f64>> {
        self.enter("average_resolution_secs")?;
        let data = self.data.lock().unwrap();
        let durations: Vec<f64> = data
            .reports
            .iter()
            .filter(|r| r.status == ReportStatus::Fixed)
            .map(|r| (r.updated_at - r.created_at).num_milliseconds() as f64 / 1000.0)
            .collect();

        if durations.is_empty() {
            return Ok(None);
        }
        Ok(Some(durations.iter().sum::<f64>() / durations.len() as f64))
    }

    async fn count_reports_by_type(&self) -> StoreResult<Vec<(IssueType, i64)>> {
        self.enter("count_reports_by_type")?;
        let data = self.data.lock().unwrap();
        let mut counts: HashMap<IssueType, i64> = HashMap::new();
        for report in &data.reports {
            *counts.entry(report.issue_type).or_insert(0) += 1;
        }
        Ok(counts.into_iter().collect())
    }
}

// ========== Cache ==========

struct Entry {
    value: String,
    ttl_secs: u64,
    expires_at: Instant,
}

/// Expiring in-memory cache that can be switched off
#[derive(Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, Entry>>,
    down: AtomicBool,
}

impl MemoryCache {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }

    fn check(&self) -> CacheResult<()> {
        if self.down.load(Ordering::SeqCst) {
            return Err(CacheError::Unavailable("cache offline".to_string()));
        }
        Ok(())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries
            .lock()
            .unwrap()
            .get(key)
            .map(|e| e.expires_at > Instant::now())
            .unwrap_or(false)
    }

    pub fn ttl_of(&self, key: &str) -> Option<u64> {
        self.entries.lock().unwrap().get(key).map(|e| e.ttl_secs)
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.entries.lock().unwrap().keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Write a raw entry, e.g. to simulate corruption
    pub fn put_raw(&self, key: &str, value: &str) {
        self.entries.lock().unwrap().insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                ttl_secs: 300,
                expires_at: Instant::now() + Duration::from_secs(300),
            },
        );
    }

    /// Expire every entry as if the TTL elapsed
    pub fn expire_all(&self) {
        let now = Instant::now();
        for entry in self.entries.lock().unwrap().values_mut() {
            entry.expires_at = now;
        }
    }
}

#[async_trait::async_trait]
impl KeyValueCache for MemoryCache {
    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        self.check()?;
        let mut entries = self.entries.lock().unwrap();
        let live = entries
            .get(key)
            .map(|entry| (entry.expires_at > Instant::now(), entry.value.clone()));
        match live {
            Some((true, value)) => Ok(Some(value)),
            Some((false, _)) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: String, ttl_secs: u64) -> CacheResult<()> {
        self.check()?;
        self.entries.lock().unwrap().insert(
            key.to_string(),
            Entry {
                value,
                ttl_secs,
                expires_at: Instant::now() + Duration::from_secs(ttl_secs),
            },
        );
        Ok(())
    }

    async fn del(&self, key: &str) -> CacheResult<()> {
        self.check()?;
        self.entries.lock().unwrap().remove(key);
        Ok(())
    }
}

// ========== Mailer ==========

#[derive(Default)]
pub struct RecordingMailer {
    pub sent: Mutex<Vec<Notification>>,
}

#[async_trait::async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, notification: &Notification) -> anyhow::Result<()> {
        self.sent.lock().unwrap().push(notification.clone());
        Ok(())
    }
}

// ========== Harness ==========

pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub cache: Arc<MemoryCache>,
    pub core: ReportCore,
    pub notifications: report_service::services::notifications::NotificationReceiver,
}

pub fn harness() -> Harness {
    let store = MemoryStore::new();
    let cache = MemoryCache::new();
    let (queue, notifications): (NotificationQueue, _) = notification_queue(64);

    let core = ReportCore::new(
        store.clone(),
        cache.clone(),
        queue,
        CoreSettings::default(),
    );

    Harness {
        store,
        cache,
        core,
        notifications,
    }
}

impl Harness {
    pub fn listing_key(&self, user_id: Uuid) -> String {
        format!("reports:all:all:user:{}", user_id)
    }

    pub fn coordinator(&self) -> InvalidationCoordinator {
        self.core.invalidation.clone()
    }
}
