//! Asynchronous archive-export engine
//!
//! A per-process job queue with idempotency replay, criteria-level
//! de-duplication, a semaphore-bounded worker pool, exponential-backoff
//! retries, cooperative cancellation and retention GC. The job index is
//! guarded by one lock; workers take it only for short state mutations and
//! never hold it across I/O.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::sync::{Notify, RwLock, Semaphore};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::ExportConfig;
use crate::domain::export::{
    ArtifactStore, ConflictReason, ExportJob, ExportResult, JobError, JobStatus, ValidatedExport,
};

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("job queue is full")]
    QueueFull { retry_after: Duration },

    #[error("{}", reason.message())]
    Conflict { reason: ConflictReason },

    #[error("job not found")]
    NotFound,
}

/// Outcome of one processing attempt.
enum AttemptError {
    /// The job was canceled underneath the worker; stop silently.
    Canceled,
    /// Transient failure; eligible for backoff and retry.
    Failed(String),
}

#[derive(Debug)]
struct JobState {
    job: ExportJob,
    tenant_id: String,
    request: ValidatedExport,
    cancel: Arc<Notify>,
}

#[derive(Debug, Default)]
struct JobIndex {
    jobs: HashMap<Uuid, JobState>,
    /// (tenant, idempotency key) -> job
    by_idempotency: HashMap<(String, String), Uuid>,
    /// (tenant, criteria hash) -> job
    by_criteria: HashMap<(String, String), Uuid>,
}

impl JobIndex {
    fn active_count(&self) -> usize {
        self.jobs
            .values()
            .filter(|s| !s.job.status.is_terminal())
            .count()
    }
}

#[derive(Debug)]
struct EngineShared {
    cfg: ExportConfig,
    storage: Arc<dyn ArtifactStore>,
    index: RwLock<JobIndex>,
    slots: Arc<Semaphore>,
}

#[derive(Debug, Clone)]
pub struct ExportEngine {
    shared: Arc<EngineShared>,
}

impl ExportEngine {
    pub fn new(cfg: ExportConfig, storage: Arc<dyn ArtifactStore>) -> Self {
        let slots = Arc::new(Semaphore::new(cfg.max_concurrent_jobs));
        Self {
            shared: Arc::new(EngineShared {
                cfg,
                storage,
                index: RwLock::new(JobIndex::default()),
                slots,
            }),
        }
    }

    /// Admit a submission into the queue.
    ///
    /// Replays of the same `(tenant, idempotency key)` with identical
    /// criteria return the existing job; a different body is a conflict.
    /// A second non-terminal job for the same `(tenant, criteria)` is a
    /// duplicate. Everything is decided under one exclusive hold, so two
    /// concurrent identical submissions yield one job.
    pub async fn enqueue(
        &self,
        tenant_id: &str,
        idempotency_key: &str,
        criteria_hash: &str,
        request: ValidatedExport,
    ) -> Result<ExportJob, EngineError> {
        let mut index = self.shared.index.write().await;

        if index.active_count() >= self.shared.cfg.max_queue_depth {
            return Err(EngineError::QueueFull {
                retry_after: self.shared.cfg.queue_retry_after,
            });
        }

        let idem_key = (tenant_id.to_string(), idempotency_key.to_string());
        if let Some(job_id) = index.by_idempotency.get(&idem_key) {
            if let Some(existing) = index.jobs.get(job_id) {
                if existing.job.criteria_hash == criteria_hash {
                    return Ok(existing.job.clone());
                }
                return Err(EngineError::Conflict {
                    reason: ConflictReason::IdempotencyBodyMismatch,
                });
            }
        }

        let criteria_key = (tenant_id.to_string(), criteria_hash.to_string());
        if let Some(job_id) = index.by_criteria.get(&criteria_key) {
            if let Some(existing) = index.jobs.get(job_id) {
                if !existing.job.status.is_terminal() {
                    return Err(EngineError::Conflict {
                        reason: ConflictReason::DuplicateJob,
                    });
                }
            }
        }

        let job = ExportJob::queued(criteria_hash);
        let job_id = job.job_id;
        let state = JobState {
            job: job.clone(),
            tenant_id: tenant_id.to_string(),
            request,
            cancel: Arc::new(Notify::new()),
        };
        index.jobs.insert(job_id, state);
        index.by_idempotency.insert(idem_key, job_id);
        index.by_criteria.insert(criteria_key, job_id);
        drop(index);

        debug!(job_id = %job_id, tenant_id, "export job queued");
        let shared = self.shared.clone();
        tokio::spawn(async move { run_job(shared, job_id).await });

        Ok(job)
    }

    /// The job as seen by its owning tenant; `None` for anyone else. A
    /// succeeded job whose signed URL already lapsed gets a fresh one
    /// before it is surfaced.
    pub async fn get(&self, tenant_id: &str, job_id: &Uuid) -> Option<ExportJob> {
        let job = {
            let index = self.shared.index.read().await;
            let state = index.jobs.get(job_id)?;
            if state.tenant_id != tenant_id {
                return None;
            }
            state.job.clone()
        };

        if let Some(result) = &job.result {
            if result.expires_at <= Utc::now() {
                return Some(self.reissue_url(tenant_id, job_id).await.unwrap_or(job));
            }
        }
        Some(job)
    }

    /// Cancel a running job. Queued and terminal jobs answer
    /// `not-cancelable`; the worker observes the flipped state at its next
    /// progress update, and a backoff wait aborts immediately.
    pub async fn cancel(&self, tenant_id: &str, job_id: &Uuid) -> Result<ExportJob, EngineError> {
        let mut index = self.shared.index.write().await;

        let state = index
            .jobs
            .get_mut(job_id)
            .filter(|s| s.tenant_id == tenant_id)
            .ok_or(EngineError::NotFound)?;

        if state.job.status != JobStatus::Running {
            return Err(EngineError::Conflict {
                reason: ConflictReason::NotCancelable,
            });
        }

        state.job.status = JobStatus::Canceled;
        state.job.finished_at = Some(Utc::now());
        state.job.can_cancel = false;
        state.job.result = None;
        state.job.error = Some(JobError::canceled());
        state.cancel.notify_waiters();
        let job = state.job.clone();
        drop(index);

        info!(job_id = %job_id, tenant_id, "export job canceled");
        schedule_gc(self.shared.clone(), *job_id);
        Ok(job)
    }

    async fn reissue_url(&self, tenant_id: &str, job_id: &Uuid) -> Option<ExportJob> {
        let (zip_key, _, _) = artifact_keys(&self.shared.cfg, tenant_id, job_id);
        let url = self
            .shared
            .storage
            .signed_url(&zip_key, self.shared.cfg.sign_url_ttl)
            .await
            .ok()?;
        let expires_at = Utc::now() + to_chrono(self.shared.cfg.sign_url_ttl);

        let mut index = self.shared.index.write().await;
        let state = index.jobs.get_mut(job_id)?;
        if let Some(result) = &mut state.job.result {
            result.signed_url = url;
            result.expires_at = expires_at;
        }
        Some(state.job.clone())
    }
}

async fn run_job(shared: Arc<EngineShared>, job_id: Uuid) {
    // the semaphore lives as long as the engine and is never closed
    let Ok(_permit) = shared.slots.clone().acquire_owned().await else {
        return;
    };

    let Some((request, tenant_id, cancel)) = start_job(&shared, &job_id).await else {
        return;
    };

    let mut attempt = 0u32;
    loop {
        attempt += 1;
        set_retry_count(&shared, &job_id, attempt - 1).await;

        match process_job(&shared, &job_id, &tenant_id, &request).await {
            Ok(()) => return,
            Err(AttemptError::Canceled) => return,
            Err(AttemptError::Failed(message)) => {
                if attempt >= shared.cfg.max_retries {
                    error!(job_id = %job_id, attempt, %message, "export job failed");
                    fail_job(&shared, &job_id, message).await;
                    return;
                }
                warn!(job_id = %job_id, attempt, %message, "export attempt failed, backing off");
                let backoff = shared.cfg.retry_base_delay * 2u32.pow(attempt - 1);
                tokio::select! {
                    _ = tokio::time::sleep(backoff) => {}
                    _ = cancel.notified() => return,
                }
            }
        }
    }
}

/// Transition to running; returns what the worker needs without keeping
/// the index locked.
async fn start_job(
    shared: &Arc<EngineShared>,
    job_id: &Uuid,
) -> Option<(ValidatedExport, String, Arc<Notify>)> {
    let mut index = shared.index.write().await;
    let state = index.jobs.get_mut(job_id)?;
    if state.job.status != JobStatus::Queued {
        return None;
    }
    state.job.status = JobStatus::Running;
    state.job.started_at = Some(Utc::now());
    state.job.can_cancel = true;
    state.job.progress = state.job.progress.max(5);
    Some((
        state.request.clone(),
        state.tenant_id.clone(),
        state.cancel.clone(),
    ))
}

async fn process_job(
    shared: &Arc<EngineShared>,
    job_id: &Uuid,
    tenant_id: &str,
    request: &ValidatedExport,
) -> Result<(), AttemptError> {
    bump_progress(shared, job_id, 10).await?;

    let archive = build_archive(request);
    let indexdoc = build_index(request);
    let manifest = build_manifest(&archive, &indexdoc);
    bump_progress(shared, job_id, 50).await?;

    let (zip_key, index_key, hashes_key) = artifact_keys(&shared.cfg, tenant_id, job_id);
    let artifacts = [
        (&zip_key, archive.clone(), "application/zip"),
        (&index_key, indexdoc, "application/json"),
        (&hashes_key, manifest, "text/plain"),
    ];
    for ((key, body, content_type), checkpoint) in artifacts.into_iter().zip([60u8, 70, 80]) {
        shared
            .storage
            .put_object(key, body, content_type)
            .await
            .map_err(|e| AttemptError::Failed(e.to_string()))?;
        bump_progress(shared, job_id, checkpoint).await?;
    }
    bump_progress(shared, job_id, 90).await?;

    let url = shared
        .storage
        .signed_url(&zip_key, shared.cfg.sign_url_ttl)
        .await
        .map_err(|e| AttemptError::Failed(e.to_string()))?;
    let expires_at = Utc::now() + to_chrono(shared.cfg.sign_url_ttl);

    complete_job(shared, job_id, url, expires_at, archive.len()).await;
    Ok(())
}

fn build_archive(request: &ValidatedExport) -> Vec<u8> {
    format!(
        "audit export {} to {} partner {} amounts {:?}..{:?}\n",
        request.from,
        request.to,
        request.partner.as_deref().unwrap_or("*"),
        request.min_amount,
        request.max_amount,
    )
    .into_bytes()
}

fn build_index(request: &ValidatedExport) -> Vec<u8> {
    #[derive(Serialize)]
    #[serde(rename_all = "camelCase")]
    struct IndexDoc<'a> {
        from: String,
        to: String,
        partner: Option<&'a str>,
        min_amount: Option<f64>,
        max_amount: Option<f64>,
        format: &'a str,
    }
    serde_json::to_vec(&IndexDoc {
        from: request.from.to_string(),
        to: request.to.to_string(),
        partner: request.partner.as_deref(),
        min_amount: request.min_amount,
        max_amount: request.max_amount,
        format: &request.format,
    })
    .expect("index document serializes")
}

/// One `<sha256> <name>` line per artifact.
fn build_manifest(archive: &[u8], index: &[u8]) -> Vec<u8> {
    format!(
        "{} archive.zip\n{} index.json\n",
        hex::encode(Sha256::digest(archive)),
        hex::encode(Sha256::digest(index)),
    )
    .into_bytes()
}

fn artifact_keys(cfg: &ExportConfig, tenant_id: &str, job_id: &Uuid) -> (String, String, String) {
    let base = format!("{}/{}/{}", cfg.bucket, tenant_id, job_id);
    (
        format!("{base}/archive.zip"),
        format!("{base}/index.json"),
        format!("{base}/hashes.txt"),
    )
}

/// Raise progress, never lower it. Doubles as the cooperative cancellation
/// point: a job flipped to canceled aborts the attempt here.
async fn bump_progress(
    shared: &Arc<EngineShared>,
    job_id: &Uuid,
    progress: u8,
) -> Result<(), AttemptError> {
    let mut index = shared.index.write().await;
    let Some(state) = index.jobs.get_mut(job_id) else {
        return Err(AttemptError::Canceled);
    };
    if state.job.status == JobStatus::Canceled {
        return Err(AttemptError::Canceled);
    }
    if progress > state.job.progress {
        state.job.progress = progress;
    }
    Ok(())
}

async fn set_retry_count(shared: &Arc<EngineShared>, job_id: &Uuid, retries: u32) {
    let mut index = shared.index.write().await;
    if let Some(state) = index.jobs.get_mut(job_id) {
        if !state.job.status.is_terminal() {
            state.job.retry_count = retries;
        }
    }
}

async fn complete_job(
    shared: &Arc<EngineShared>,
    job_id: &Uuid,
    signed_url: String,
    expires_at: chrono::DateTime<Utc>,
    size: usize,
) {
    {
        let mut index = shared.index.write().await;
        let Some(state) = index.jobs.get_mut(job_id) else {
            return;
        };
        if state.job.status.is_terminal() {
            return;
        }
        state.job.status = JobStatus::Succeeded;
        state.job.finished_at = Some(Utc::now());
        state.job.progress = 100;
        state.job.can_cancel = false;
        state.job.error = None;
        state.job.result = Some(ExportResult {
            signed_url,
            expires_at,
            size,
        });
    }
    info!(job_id = %job_id, "export job succeeded");
    schedule_gc(shared.clone(), *job_id);
}

async fn fail_job(shared: &Arc<EngineShared>, job_id: &Uuid, message: String) {
    {
        let mut index = shared.index.write().await;
        let Some(state) = index.jobs.get_mut(job_id) else {
            return;
        };
        if state.job.status.is_terminal() {
            return;
        }
        state.job.status = JobStatus::Failed;
        state.job.finished_at = Some(Utc::now());
        state.job.can_cancel = false;
        state.job.result = None;
        state.job.error = Some(JobError::internal(message));
    }
    schedule_gc(shared.clone(), *job_id);
}

/// Retention GC: after the configured period, delete the three artifacts
/// and drop the terminal job from every index. Removing the entry is what
/// keeps queue depth and the de-duplication maps bounded.
fn schedule_gc(shared: Arc<EngineShared>, job_id: Uuid) {
    tokio::spawn(async move {
        tokio::time::sleep(shared.cfg.retention_period).await;

        let tenant_id = {
            let index = shared.index.read().await;
            match index.jobs.get(&job_id) {
                Some(state) => state.tenant_id.clone(),
                None => return,
            }
        };

        let (zip_key, index_key, hashes_key) = artifact_keys(&shared.cfg, &tenant_id, &job_id);
        for key in [&zip_key, &index_key, &hashes_key] {
            if let Err(e) = shared.storage.delete_object(key).await {
                warn!(job_id = %job_id, key, error = %e, "retention delete failed");
            }
        }

        let mut index = shared.index.write().await;
        if let Some(state) = index.jobs.remove(&job_id) {
            index
                .by_criteria
                .retain(|_, id| *id != job_id);
            index.by_idempotency.retain(|_, id| *id != job_id);
            debug!(job_id = %job_id, tenant_id = %state.tenant_id, "export job expired from index");
        }
    });
}

fn to_chrono(d: Duration) -> chrono::Duration {
    chrono::Duration::milliseconds(d.as_millis() as i64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::export::criteria_hash;
    use crate::domain::DomainError;
    use crate::infrastructure::export::storage::InMemoryArtifactStore;
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Wraps the in-memory store with an injectable put delay and a number
    /// of leading failures, so tests can observe intermediate job states.
    #[derive(Debug)]
    struct FlakyStore {
        inner: InMemoryArtifactStore,
        put_delay: Duration,
        failures_left: AtomicU32,
    }

    impl FlakyStore {
        fn new(put_delay: Duration, failures: u32) -> Self {
            Self {
                inner: InMemoryArtifactStore::new(),
                put_delay,
                failures_left: AtomicU32::new(failures),
            }
        }
    }

    #[async_trait]
    impl ArtifactStore for FlakyStore {
        async fn put_object(
            &self,
            key: &str,
            body: Vec<u8>,
            content_type: &str,
        ) -> Result<(), DomainError> {
            tokio::time::sleep(self.put_delay).await;
            if self
                .failures_left
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
            {
                return Err(DomainError::storage("injected failure"));
            }
            self.inner.put_object(key, body, content_type).await
        }

        async fn signed_url(&self, key: &str, ttl: Duration) -> Result<String, DomainError> {
            self.inner.signed_url(key, ttl).await
        }

        async fn delete_object(&self, key: &str) -> Result<(), DomainError> {
            self.inner.delete_object(key).await
        }
    }

    fn fast_cfg() -> ExportConfig {
        ExportConfig {
            retry_base_delay: Duration::from_millis(10),
            retention_period: Duration::from_secs(30),
            ..ExportConfig::default()
        }
    }

    fn request(from: &str, to: &str) -> ValidatedExport {
        ValidatedExport {
            from: NaiveDate::parse_from_str(from, "%Y-%m-%d").unwrap(),
            to: NaiveDate::parse_from_str(to, "%Y-%m-%d").unwrap(),
            partner: None,
            min_amount: None,
            max_amount: None,
            format: "zip".to_string(),
        }
    }

    async fn wait_for(
        engine: &ExportEngine,
        tenant: &str,
        job_id: &Uuid,
        predicate: impl Fn(&ExportJob) -> bool,
    ) -> ExportJob {
        for _ in 0..400 {
            if let Some(job) = engine.get(tenant, job_id).await {
                if predicate(&job) {
                    return job;
                }
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("job {job_id} never reached the expected state");
    }

    #[tokio::test]
    async fn test_happy_path_produces_signed_artifact() {
        let storage = Arc::new(InMemoryArtifactStore::new());
        let engine = ExportEngine::new(fast_cfg(), storage.clone());
        let req = request("2025-01-01", "2025-01-31");
        let hash = criteria_hash("acme", &req);

        let job = engine.enqueue("acme", "idem-A", &hash, req).await.unwrap();
        assert_eq!(job.status, JobStatus::Queued);

        let done = wait_for(&engine, "acme", &job.job_id, |j| {
            j.status == JobStatus::Succeeded
        })
        .await;

        assert_eq!(done.progress, 100);
        assert!(!done.can_cancel);
        let result = done.result.unwrap();
        assert!(result.signed_url.contains(&job.job_id.to_string()));
        assert!(result.signed_url.contains("exp="));
        assert!(result.size > 0);
        assert!(result.expires_at > Utc::now());

        // archive, index and hash manifest are all persisted
        assert_eq!(storage.object_count().await, 3);
    }

    #[tokio::test]
    async fn test_idempotent_replay_returns_same_job() {
        let engine = ExportEngine::new(fast_cfg(), Arc::new(InMemoryArtifactStore::new()));
        let req = request("2025-01-01", "2025-01-31");
        let hash = criteria_hash("acme", &req);

        let first = engine
            .enqueue("acme", "idem-A", &hash, req.clone())
            .await
            .unwrap();
        let replay = engine.enqueue("acme", "idem-A", &hash, req).await.unwrap();

        assert_eq!(first.job_id, replay.job_id);
    }

    #[tokio::test]
    async fn test_idempotency_key_with_new_body_conflicts() {
        let engine = ExportEngine::new(fast_cfg(), Arc::new(InMemoryArtifactStore::new()));
        let req = request("2025-01-01", "2025-01-31");
        let other = request("2025-01-01", "2025-02-28");

        engine
            .enqueue("acme", "idem-A", &criteria_hash("acme", &req), req)
            .await
            .unwrap();
        let err = engine
            .enqueue("acme", "idem-A", &criteria_hash("acme", &other), other)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            EngineError::Conflict {
                reason: ConflictReason::IdempotencyBodyMismatch
            }
        ));
    }

    #[tokio::test]
    async fn test_duplicate_criteria_conflicts_while_in_flight() {
        let storage = Arc::new(FlakyStore::new(Duration::from_millis(100), 0));
        let engine = ExportEngine::new(fast_cfg(), storage);
        let req = request("2025-01-01", "2025-01-31");
        let hash = criteria_hash("acme", &req);

        let job = engine
            .enqueue("acme", "idem-A", &hash, req.clone())
            .await
            .unwrap();
        let err = engine
            .enqueue("acme", "idem-B", &hash, req.clone())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::Conflict {
                reason: ConflictReason::DuplicateJob
            }
        ));

        // once the first run is terminal the same criteria may run again
        wait_for(&engine, "acme", &job.job_id, |j| j.status.is_terminal()).await;
        engine.enqueue("acme", "idem-C", &hash, req).await.unwrap();
    }

    #[tokio::test]
    async fn test_same_criteria_different_tenants_run_concurrently() {
        let storage = Arc::new(FlakyStore::new(Duration::from_millis(50), 0));
        let engine = ExportEngine::new(fast_cfg(), storage);
        let req = request("2025-01-01", "2025-01-31");

        engine
            .enqueue("acme", "idem-A", &criteria_hash("acme", &req), req.clone())
            .await
            .unwrap();
        engine
            .enqueue("globex", "idem-A", &criteria_hash("globex", &req), req)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_queue_depth_gate() {
        let cfg = ExportConfig {
            max_queue_depth: 1,
            ..fast_cfg()
        };
        let storage = Arc::new(FlakyStore::new(Duration::from_millis(200), 0));
        let engine = ExportEngine::new(cfg, storage);

        let first = request("2025-01-01", "2025-01-31");
        engine
            .enqueue("acme", "idem-A", &criteria_hash("acme", &first), first)
            .await
            .unwrap();

        let second = request("2025-02-01", "2025-02-28");
        let err = engine
            .enqueue("acme", "idem-B", &criteria_hash("acme", &second), second)
            .await
            .unwrap_err();
        match err {
            EngineError::QueueFull { retry_after } => {
                assert_eq!(retry_after, Duration::from_secs(30));
            }
            other => panic!("expected QueueFull, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_cancel_running_job() {
        let storage = Arc::new(FlakyStore::new(Duration::from_millis(150), 0));
        let engine = ExportEngine::new(fast_cfg(), storage);
        let req = request("2025-01-01", "2025-01-31");
        let hash = criteria_hash("acme", &req);

        let job = engine.enqueue("acme", "idem-A", &hash, req).await.unwrap();
        wait_for(&engine, "acme", &job.job_id, |j| {
            j.status == JobStatus::Running
        })
        .await;

        let canceled = engine.cancel("acme", &job.job_id).await.unwrap();
        assert_eq!(canceled.status, JobStatus::Canceled);
        assert!(canceled.result.is_none());
        assert!(!canceled.can_cancel);
        let error = canceled.error.unwrap();
        assert_eq!(error.code, "canceled");
        assert_eq!(error.message, "canceled by user");

        // the worker must not resurrect the job after its next checkpoint
        tokio::time::sleep(Duration::from_millis(400)).await;
        let after = engine.get("acme", &job.job_id).await.unwrap();
        assert_eq!(after.status, JobStatus::Canceled);
        assert!(after.result.is_none());
    }

    #[tokio::test]
    async fn test_queued_and_terminal_jobs_not_cancelable() {
        let cfg = ExportConfig {
            max_concurrent_jobs: 1,
            ..fast_cfg()
        };
        let storage = Arc::new(FlakyStore::new(Duration::from_millis(150), 0));
        let engine = ExportEngine::new(cfg, storage);

        let first = request("2025-01-01", "2025-01-31");
        let a = engine
            .enqueue("acme", "idem-A", &criteria_hash("acme", &first), first)
            .await
            .unwrap();

        let second = request("2025-02-01", "2025-02-28");
        let b = engine
            .enqueue("acme", "idem-B", &criteria_hash("acme", &second), second)
            .await
            .unwrap();

        // with a single worker slot, exactly one of the two is starved;
        // find it rather than assume scheduling order
        let queued_id = loop {
            let a_status = engine.get("acme", &a.job_id).await.unwrap().status;
            let b_status = engine.get("acme", &b.job_id).await.unwrap().status;
            match (a_status, b_status) {
                (JobStatus::Running, JobStatus::Queued) => break b.job_id,
                (JobStatus::Queued, JobStatus::Running) => break a.job_id,
                _ => tokio::time::sleep(Duration::from_millis(2)).await,
            }
        };

        let err = engine.cancel("acme", &queued_id).await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::Conflict {
                reason: ConflictReason::NotCancelable
            }
        ));

        let done = wait_for(&engine, "acme", &a.job_id, |j| j.status.is_terminal()).await;
        assert_eq!(done.status, JobStatus::Succeeded);
        let err = engine.cancel("acme", &a.job_id).await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::Conflict {
                reason: ConflictReason::NotCancelable
            }
        ));
    }

    #[tokio::test]
    async fn test_transient_failures_retry_then_succeed() {
        let storage = Arc::new(FlakyStore::new(Duration::ZERO, 2));
        let engine = ExportEngine::new(fast_cfg(), storage);
        let req = request("2025-01-01", "2025-01-31");
        let hash = criteria_hash("acme", &req);

        let job = engine.enqueue("acme", "idem-A", &hash, req).await.unwrap();
        let done = wait_for(&engine, "acme", &job.job_id, |j| {
            j.status == JobStatus::Succeeded
        })
        .await;

        assert_eq!(done.retry_count, 2);
    }

    #[tokio::test]
    async fn test_exhausted_retries_fail_the_job() {
        let storage = Arc::new(FlakyStore::new(Duration::ZERO, u32::MAX));
        let engine = ExportEngine::new(fast_cfg(), storage);
        let req = request("2025-01-01", "2025-01-31");
        let hash = criteria_hash("acme", &req);

        let job = engine.enqueue("acme", "idem-A", &hash, req).await.unwrap();
        let done = wait_for(&engine, "acme", &job.job_id, |j| {
            j.status == JobStatus::Failed
        })
        .await;

        assert!(done.result.is_none());
        let error = done.error.unwrap();
        assert_eq!(error.code, "internal-error");
        assert!(error.retryable);
    }

    #[tokio::test]
    async fn test_get_is_tenant_scoped() {
        let engine = ExportEngine::new(fast_cfg(), Arc::new(InMemoryArtifactStore::new()));
        let req = request("2025-01-01", "2025-01-31");
        let hash = criteria_hash("acme", &req);

        let job = engine.enqueue("acme", "idem-A", &hash, req).await.unwrap();

        assert!(engine.get("acme", &job.job_id).await.is_some());
        assert!(engine.get("globex", &job.job_id).await.is_none());
        assert!(engine.get("acme", &Uuid::new_v4()).await.is_none());
    }

    #[tokio::test]
    async fn test_retention_gc_removes_artifacts_and_job() {
        let cfg = ExportConfig {
            retention_period: Duration::from_millis(50),
            ..fast_cfg()
        };
        let storage = Arc::new(InMemoryArtifactStore::new());
        let engine = ExportEngine::new(cfg, storage.clone());
        let req = request("2025-01-01", "2025-01-31");
        let hash = criteria_hash("acme", &req);

        let job = engine
            .enqueue("acme", "idem-A", &hash, req.clone())
            .await
            .unwrap();
        wait_for(&engine, "acme", &job.job_id, |j| {
            j.status == JobStatus::Succeeded
        })
        .await;
        assert_eq!(storage.object_count().await, 3);

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(storage.object_count().await, 0);
        assert!(engine.get("acme", &job.job_id).await.is_none());

        // with the entry gone the criteria and idempotency slots are free
        engine.enqueue("acme", "idem-A", &hash, req).await.unwrap();
    }
}
