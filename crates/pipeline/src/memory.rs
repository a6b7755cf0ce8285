//! In-process store and object storage.
//!
//! Mirrors the Postgres semantics that the flows rely on (conditional
//! debit, status CAS, one credit per task, outbox
//! leases) behind one mutex, so a whole terminal transition is atomic here
//! too. Used by tests and local runs without a database.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::Utc;
use mediagen_core::channels::Channel;
use mediagen_core::storage::{ObjectHead, ObjectStorage, StorageError, StoredObject};
use mediagen_core::types::{DbId, Points, TaskId, Timestamp};
use mediagen_db::models::asset_archive::{AssetArchiveJob, NewAssetArchiveJob};
use mediagen_db::models::generation_task::{
    GenerationTask, NewGenerationTask, TaskListQuery, TerminalTransition,
};
use mediagen_db::models::points::LedgerEntry;
use mediagen_db::models::status::{ArchiveJobStatus, GenerationStatus};
use serde_json::Value;

use crate::error::StoreError;
use crate::store::{PointsStore, TaskStore};

#[derive(Default)]
struct State {
    tasks: HashMap<TaskId, GenerationTask>,
    accounts: HashMap<String, Points>,
    ledger: Vec<LedgerEntry>,
    jobs: Vec<AssetArchiveJob>,
    next_ledger_id: DbId,
    next_job_id: DbId,
}

impl State {
    fn credit(
        &mut self,
        owner_id: &str,
        amount: Points,
        task_id: TaskId,
        reason: &str,
        description: &str,
    ) -> bool {
        // At most one credit per task, whatever its reason.
        let duplicate = self
            .ledger
            .iter()
            .any(|e| e.task_id == Some(task_id) && (e.reason == reason || e.amount > 0));
        if duplicate {
            return false;
        }
        self.push_ledger(owner_id, amount, task_id, reason, description);
        *self.accounts.entry(owner_id.to_string()).or_insert(0) += amount;
        true
    }

    fn push_ledger(
        &mut self,
        owner_id: &str,
        amount: Points,
        task_id: TaskId,
        reason: &str,
        description: &str,
    ) {
        self.next_ledger_id += 1;
        self.ledger.push(LedgerEntry {
            id: self.next_ledger_id,
            owner_id: owner_id.to_string(),
            task_id: Some(task_id),
            amount,
            reason: reason.to_string(),
            description: Some(description.to_string()),
            created_at: Utc::now(),
        });
    }

    fn enqueue(&mut self, task_id: TaskId, job: &NewAssetArchiveJob) {
        if self
            .jobs
            .iter()
            .any(|j| j.task_id == task_id && j.pointer == job.pointer)
        {
            return;
        }
        self.next_job_id += 1;
        let now = Utc::now();
        self.jobs.push(AssetArchiveJob {
            id: self.next_job_id,
            task_id,
            asset_index: job.asset_index,
            pointer: job.pointer.clone(),
            source_url: job.source_url.clone(),
            object_key: job.object_key.clone(),
            status_id: ArchiveJobStatus::Pending.id(),
            attempts: 0,
            next_attempt_at: now,
            last_error: None,
            archived_url: None,
            created_at: now,
            updated_at: now,
        });
    }

    fn claim<F>(&mut self, limit: usize, lease_secs: i64, filter: F) -> Vec<AssetArchiveJob>
    where
        F: Fn(&AssetArchiveJob) -> bool,
    {
        let now = Utc::now();
        let mut claimed = Vec::new();
        for job in self.jobs.iter_mut() {
            if claimed.len() >= limit {
                break;
            }
            if job.status_id != ArchiveJobStatus::Pending.id()
                || job.next_attempt_at > now
                || !filter(job)
            {
                continue;
            }
            job.attempts += 1;
            job.next_attempt_at = now + chrono::Duration::seconds(lease_secs);
            job.updated_at = now;
            claimed.push(job.clone());
        }
        claimed
    }

    fn pending_job(&mut self, job_id: DbId) -> Option<&mut AssetArchiveJob> {
        self.jobs
            .iter_mut()
            .find(|j| j.id == job_id && j.status_id == ArchiveJobStatus::Pending.id())
    }
}

/// Task ledger, points and archive outbox kept in memory.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Top up an owner's balance, creating the account if needed.
    pub fn deposit(&self, owner_id: &str, amount: Points) -> Points {
        let mut state = self.state();
        let balance = state.accounts.entry(owner_id.to_string()).or_insert(0);
        *balance += amount;
        *balance
    }

    /// Ledger reasons of an owner, oldest first.
    pub fn ledger_reasons(&self, owner_id: &str) -> Vec<String> {
        self.state()
            .ledger
            .iter()
            .filter(|e| e.owner_id == owner_id)
            .map(|e| e.reason.clone())
            .collect()
    }

    /// Number of stored tasks.
    pub fn task_count(&self) -> usize {
        self.state().tasks.len()
    }
}

#[async_trait]
impl TaskStore for MemoryStore {
    async fn insert_task(&self, task: &NewGenerationTask) -> Result<GenerationTask, StoreError> {
        let mut state = self.state();
        let channel = task.channel.name();
        if state.tasks.contains_key(&task.id)
            || state
                .tasks
                .values()
                .any(|t| t.channel == channel && t.provider_task_id == task.provider_task_id)
        {
            return Err(StoreError::Conflict(format!(
                "Task {} or provider task {} already exists",
                task.id, task.provider_task_id
            )));
        }

        let now = Utc::now();
        let row = GenerationTask {
            id: task.id,
            owner_id: task.owner.id.clone(),
            owner_kind: task.owner.kind.name().to_string(),
            media_type: task.media_type.name().to_string(),
            channel: channel.to_string(),
            model: task.model.clone(),
            action: task.action.clone(),
            provider_task_id: task.provider_task_id.clone(),
            status_id: GenerationStatus::Generating.id(),
            points_cost: task.points_cost,
            request: task.request.clone(),
            response: None,
            error_message: None,
            started_at: task.started_at,
            finished_at: None,
            duration_ms: None,
            created_at: now,
            updated_at: now,
        };
        state.tasks.insert(row.id, row.clone());
        Ok(row)
    }

    async fn find_task(&self, id: TaskId) -> Result<Option<GenerationTask>, StoreError> {
        Ok(self.state().tasks.get(&id).cloned())
    }

    async fn find_task_by_provider_id(
        &self,
        channel: Channel,
        provider_task_id: &str,
    ) -> Result<Option<GenerationTask>, StoreError> {
        Ok(self
            .state()
            .tasks
            .values()
            .find(|t| t.channel == channel.name() && t.provider_task_id == provider_task_id)
            .cloned())
    }

    async fn list_tasks(
        &self,
        query: &TaskListQuery,
    ) -> Result<(Vec<GenerationTask>, i64), StoreError> {
        let state = self.state();
        let mut matching: Vec<&GenerationTask> = state
            .tasks
            .values()
            .filter(|t| {
                t.is_owned_by(&query.owner)
                    && t.media_type == query.media_type.name()
                    && query.channel.map_or(true, |c| t.channel == c.name())
            })
            .collect();
        matching.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.cmp(&a.id))
        });

        let total = matching.len() as i64;
        let page = matching
            .into_iter()
            .skip(query.offset.max(0) as usize)
            .take(query.limit.max(0) as usize)
            .cloned()
            .collect();
        Ok((page, total))
    }

    async fn apply_terminal(
        &self,
        id: TaskId,
        transition: &TerminalTransition,
    ) -> Result<bool, StoreError> {
        let mut state = self.state();
        let Some(task) = state.tasks.get_mut(&id) else {
            return Ok(false);
        };
        if task.status_id != GenerationStatus::Generating.id() {
            return Ok(false);
        }

        task.status_id = transition.status.id();
        task.response = Some(transition.response.clone());
        task.error_message = transition.error_message.clone();
        task.finished_at = transition.finished_at;
        task.duration_ms = transition.duration_ms;
        task.updated_at = Utc::now();

        if let Some(refund) = &transition.refund {
            state.credit(
                &refund.owner_id,
                refund.amount,
                id,
                refund.reason,
                &refund.description,
            );
        }
        for job in &transition.archive_jobs {
            state.enqueue(id, job);
        }
        Ok(true)
    }

    async fn archive_jobs_for_task(
        &self,
        task_id: TaskId,
    ) -> Result<Vec<AssetArchiveJob>, StoreError> {
        let mut jobs: Vec<AssetArchiveJob> = self
            .state()
            .jobs
            .iter()
            .filter(|j| j.task_id == task_id)
            .cloned()
            .collect();
        jobs.sort_by_key(|j| j.asset_index);
        Ok(jobs)
    }

    async fn claim_task_archive_jobs(
        &self,
        task_id: TaskId,
        lease_secs: i64,
    ) -> Result<Vec<AssetArchiveJob>, StoreError> {
        Ok(self
            .state()
            .claim(usize::MAX, lease_secs, |j| j.task_id == task_id))
    }

    async fn claim_due_archive_jobs(
        &self,
        limit: i64,
        lease_secs: i64,
    ) -> Result<Vec<AssetArchiveJob>, StoreError> {
        Ok(self
            .state()
            .claim(limit.max(0) as usize, lease_secs, |_| true))
    }

    async fn complete_archive_job(
        &self,
        job_id: DbId,
        archived_url: &str,
    ) -> Result<bool, StoreError> {
        let mut state = self.state();
        let Some(job) = state.pending_job(job_id) else {
            return Ok(false);
        };
        job.status_id = ArchiveJobStatus::Done.id();
        job.archived_url = Some(archived_url.to_string());
        job.last_error = None;
        job.updated_at = Utc::now();
        let (task_id, pointer) = (job.task_id, job.pointer.clone());

        if let Some(slot) = state
            .tasks
            .get_mut(&task_id)
            .and_then(|t| t.response.as_mut())
            .and_then(|r| r.pointer_mut(&pointer))
        {
            *slot = Value::String(archived_url.to_string());
        }
        Ok(true)
    }

    async fn retry_archive_job(
        &self,
        job_id: DbId,
        error: &str,
        next_attempt_at: Timestamp,
    ) -> Result<(), StoreError> {
        if let Some(job) = self.state().pending_job(job_id) {
            job.last_error = Some(error.to_string());
            job.next_attempt_at = next_attempt_at;
            job.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn fail_archive_job(&self, job_id: DbId, error: &str) -> Result<(), StoreError> {
        if let Some(job) = self.state().pending_job(job_id) {
            job.status_id = ArchiveJobStatus::Failed.id();
            job.last_error = Some(error.to_string());
            job.updated_at = Utc::now();
        }
        Ok(())
    }
}

#[async_trait]
impl PointsStore for MemoryStore {
    async fn balance(&self, owner_id: &str) -> Result<Option<Points>, StoreError> {
        Ok(self.state().accounts.get(owner_id).copied())
    }

    async fn debit(
        &self,
        owner_id: &str,
        amount: Points,
        task_id: TaskId,
        reason: &str,
        description: &str,
    ) -> Result<bool, StoreError> {
        let mut state = self.state();
        match state.accounts.get_mut(owner_id) {
            Some(balance) if *balance >= amount => *balance -= amount,
            _ => return Ok(false),
        }
        state.push_ledger(owner_id, -amount, task_id, reason, description);
        Ok(true)
    }

    async fn credit(
        &self,
        owner_id: &str,
        amount: Points,
        task_id: TaskId,
        reason: &str,
        description: &str,
    ) -> Result<bool, StoreError> {
        Ok(self
            .state()
            .credit(owner_id, amount, task_id, reason, description))
    }

    async fn ledger_for_task(&self, task_id: TaskId) -> Result<Vec<LedgerEntry>, StoreError> {
        Ok(self
            .state()
            .ledger
            .iter()
            .filter(|e| e.task_id == Some(task_id))
            .cloned()
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Object storage
// ---------------------------------------------------------------------------

/// Object storage that records keys instead of copying bytes.
pub struct MemoryObjectStorage {
    base_url: String,
    objects: Mutex<HashMap<String, String>>,
    failing_sources: Mutex<HashSet<String>>,
    uploads: AtomicUsize,
}

impl MemoryObjectStorage {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            objects: Mutex::new(HashMap::new()),
            failing_sources: Mutex::new(HashSet::new()),
            uploads: AtomicUsize::new(0),
        }
    }

    /// Make downloads of `source_url` fail until [`Self::heal_source`].
    pub fn fail_source(&self, source_url: &str) {
        self.failing_sources
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(source_url.to_string());
    }

    pub fn heal_source(&self, source_url: &str) {
        self.failing_sources
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(source_url);
    }

    /// Number of successful `put_object_from_url` calls.
    pub fn upload_count(&self) -> usize {
        self.uploads.load(Ordering::SeqCst)
    }

    /// Source URL an object was copied from.
    pub fn source_of(&self, key: &str) -> Option<String> {
        self.objects
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }
}

#[async_trait]
impl ObjectStorage for MemoryObjectStorage {
    async fn put_object_from_url(
        &self,
        source_url: &str,
        key: &str,
    ) -> Result<StoredObject, StorageError> {
        let failing = self
            .failing_sources
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(source_url);
        if failing {
            return Err(StorageError::Download {
                url: source_url.to_string(),
                message: "connection refused".into(),
            });
        }

        self.objects
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), source_url.to_string());
        self.uploads.fetch_add(1, Ordering::SeqCst);
        Ok(StoredObject {
            key: key.to_string(),
            url: self.public_url(key),
        })
    }

    async fn head_object(&self, key: &str) -> Result<Option<ObjectHead>, StorageError> {
        let exists = self
            .objects
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(key);
        Ok(exists.then(|| ObjectHead {
            key: key.to_string(),
            size_bytes: None,
        }))
    }

    fn public_url(&self, key: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), key)
    }
}
