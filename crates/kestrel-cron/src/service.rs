// SPDX-FileCopyrightText: 2026 Kestrel Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The scheduler: one timer task armed to the earliest due job.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use futures::FutureExt;
use futures::future::BoxFuture;
use kestrel_core::KestrelError;
use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::schedule::{compute_next_run, now_ms, validate_schedule};
use crate::store::{load_store, save_store};
use crate::types::{CronJob, CronJobState, CronStore, JobStatus, NewJob};

/// Invoked for every job run. `Ok(Some(text))` is the produced response, if any.
pub type JobCallback =
    Arc<dyn Fn(CronJob) -> BoxFuture<'static, Result<Option<String>, KestrelError>> + Send + Sync>;

/// Snapshot returned by [`CronService::status`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CronStatus {
    pub running: bool,
    pub jobs: usize,
    pub next_wake_at_ms: Option<i64>,
}

/// Durable job scheduler.
///
/// The store is loaded lazily on first use, so list/add/remove work without
/// `start` (the CLI relies on this).
pub struct CronService {
    store_path: PathBuf,
    store: Mutex<Option<CronStore>>,
    on_job: RwLock<Option<JobCallback>>,
    wake: Notify,
    timer: std::sync::Mutex<Option<(CancellationToken, JoinHandle<()>)>>,
}

impl CronService {
    pub fn new(store_path: impl Into<PathBuf>) -> Self {
        Self {
            store_path: store_path.into(),
            store: Mutex::new(None),
            on_job: RwLock::new(None),
            wake: Notify::new(),
            timer: std::sync::Mutex::new(None),
        }
    }

    pub fn store_path(&self) -> &Path {
        &self.store_path
    }

    /// Installs the callback run for every firing job.
    pub fn set_on_job<F, Fut>(&self, callback: F)
    where
        F: Fn(CronJob) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Option<String>, KestrelError>> + Send + 'static,
    {
        let callback: JobCallback = Arc::new(move |job| callback(job).boxed());
        *self.on_job.write().unwrap_or_else(|e| e.into_inner()) = Some(callback);
    }

    /// Loads the store, fills in missing next-run times, and spawns the timer task.
    pub async fn start(self: &Arc<Self>) -> Result<(), KestrelError> {
        {
            let mut guard = self.store.lock().await;
            let mut store = load_store(&self.store_path).await?;
            let now = now_ms();
            for job in store.jobs.iter_mut().filter(|j| j.enabled) {
                if job.state.next_run_at_ms.is_none() {
                    job.state.next_run_at_ms = next_run_or_log(job, now);
                }
            }
            save_store(&self.store_path, &store).await?;
            info!(jobs = store.jobs.len(), path = %self.store_path.display(), "cron service started");
            *guard = Some(store);
        }

        let mut timer = self.timer.lock().unwrap_or_else(|e| e.into_inner());
        if timer.is_some() {
            return Ok(());
        }
        let token = CancellationToken::new();
        let handle = tokio::spawn(Arc::clone(self).run_timer(token.clone()));
        *timer = Some((token, handle));
        Ok(())
    }

    /// Cancels the timer task. Jobs stay in the store.
    pub async fn stop(&self) {
        let taken = self.timer.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some((token, handle)) = taken {
            token.cancel();
            if let Err(e) = handle.await {
                warn!(error = %e, "cron timer task ended abnormally");
            }
            info!("cron service stopped");
        }
    }

    async fn run_timer(self: Arc<Self>, token: CancellationToken) {
        loop {
            let sleep_for = self
                .next_wake_ms()
                .await
                .map(|at| Duration::from_millis(at.saturating_sub(now_ms()).max(0) as u64));
            debug!(?sleep_for, "cron timer armed");

            tokio::select! {
                _ = token.cancelled() => break,
                _ = self.wake.notified() => continue,
                _ = sleep_or_forever(sleep_for) => {
                    if let Err(e) = self.on_timer().await {
                        error!(error = %e, "cron tick failed");
                    }
                }
            }
        }
    }

    async fn on_timer(&self) -> Result<(), KestrelError> {
        let now = now_ms();
        let due: Vec<CronJob> = {
            let mut guard = self.store.lock().await;
            let store = self.loaded(&mut guard).await?;
            store
                .jobs
                .iter()
                .filter(|j| j.enabled && j.state.next_run_at_ms.is_some_and(|at| at <= now))
                .cloned()
                .collect()
        };
        if due.is_empty() {
            return Ok(());
        }
        debug!(count = due.len(), "cron jobs due");
        for job in due {
            let id = job.id.clone();
            if let Err(e) = self.execute(job).await {
                error!(job_id = %id, error = %e, "failed to record cron job outcome");
            }
        }
        Ok(())
    }

    /// Runs one job through the callback and records the outcome.
    ///
    /// The store lock is not held while the callback runs, so the callback may
    /// use the service itself.
    async fn execute(&self, job: CronJob) -> Result<(), KestrelError> {
        let started = now_ms();
        info!(job_id = %job.id, name = %job.name, "running cron job");

        let callback = self
            .on_job
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        let outcome = match callback {
            Some(callback) => match AssertUnwindSafe(callback(job.clone())).catch_unwind().await {
                Ok(Ok(_)) => Ok(()),
                Ok(Err(e)) => Err(e.to_string()),
                Err(_) => Err("job callback panicked".to_string()),
            },
            None => {
                warn!(job_id = %job.id, "no cron callback installed");
                Ok(())
            }
        };
        if let Err(e) = &outcome {
            warn!(job_id = %job.id, error = %e, "cron job failed");
        }

        let mut guard = self.store.lock().await;
        let store = self.loaded(&mut guard).await?;
        let Some(pos) = store.jobs.iter().position(|j| j.id == job.id) else {
            // removed while it ran
            return Ok(());
        };
        let now = now_ms();
        let entry = &mut store.jobs[pos];
        entry.state.last_run_at_ms = Some(started);
        match outcome {
            Ok(()) => {
                entry.state.last_status = Some(JobStatus::Ok);
                entry.state.last_error = None;
            }
            Err(e) => {
                entry.state.last_status = Some(JobStatus::Error);
                entry.state.last_error = Some(e);
            }
        }
        entry.updated_at_ms = now;

        if entry.schedule.is_one_shot() {
            if entry.delete_after_run {
                store.jobs.remove(pos);
                debug!(job_id = %job.id, "one-shot job deleted after run");
            } else {
                entry.enabled = false;
                entry.state.next_run_at_ms = None;
            }
        } else {
            entry.state.next_run_at_ms = next_run_or_log(entry, now);
        }

        save_store(&self.store_path, store).await
    }

    pub async fn add_job(&self, spec: NewJob) -> Result<CronJob, KestrelError> {
        validate_schedule(&spec.schedule)?;
        let now = now_ms();
        let next = compute_next_run(&spec.schedule, now)?;
        if next.is_none() {
            return Err(KestrelError::Cron("scheduled time is in the past".into()));
        }

        let job = CronJob {
            id: new_job_id(),
            name: spec.name,
            enabled: true,
            schedule: spec.schedule,
            payload: spec.payload,
            state: CronJobState {
                next_run_at_ms: next,
                ..CronJobState::default()
            },
            created_at_ms: now,
            updated_at_ms: now,
            delete_after_run: spec.delete_after_run,
        };

        self.mutate(|store| store.jobs.push(job.clone())).await?;
        info!(job_id = %job.id, name = %job.name, schedule = %job.schedule.describe(), "cron job added");
        Ok(job)
    }

    /// Removes a job; `false` when no job has that id.
    pub async fn remove_job(&self, id: &str) -> Result<bool, KestrelError> {
        let removed = self
            .mutate(|store| {
                let before = store.jobs.len();
                store.jobs.retain(|j| j.id != id);
                store.jobs.len() != before
            })
            .await?;
        if removed {
            info!(job_id = %id, "cron job removed");
        }
        Ok(removed)
    }

    /// Jobs ordered by next run time; disabled jobs only with `include_disabled`.
    pub async fn list_jobs(&self, include_disabled: bool) -> Result<Vec<CronJob>, KestrelError> {
        let mut guard = self.store.lock().await;
        let store = self.loaded(&mut guard).await?;
        let mut jobs: Vec<CronJob> = store
            .jobs
            .iter()
            .filter(|j| include_disabled || j.enabled)
            .cloned()
            .collect();
        jobs.sort_by_key(|j| j.state.next_run_at_ms.unwrap_or(i64::MAX));
        Ok(jobs)
    }

    /// Enables or disables a job, recomputing its next run.
    pub async fn enable_job(&self, id: &str, enabled: bool) -> Result<Option<CronJob>, KestrelError> {
        let now = now_ms();
        self.mutate(|store| {
            let job = store.jobs.iter_mut().find(|j| j.id == id)?;
            job.enabled = enabled;
            job.updated_at_ms = now;
            job.state.next_run_at_ms = if enabled {
                next_run_or_log(job, now)
            } else {
                None
            };
            Some(job.clone())
        })
        .await
    }

    /// Runs a job now. Disabled jobs run only with `force`.
    /// Returns `false` when the job is missing or disabled.
    pub async fn run_job(&self, id: &str, force: bool) -> Result<bool, KestrelError> {
        let job = {
            let mut guard = self.store.lock().await;
            let store = self.loaded(&mut guard).await?;
            match store.jobs.iter().find(|j| j.id == id) {
                Some(job) if job.enabled || force => job.clone(),
                _ => return Ok(false),
            }
        };
        self.execute(job).await?;
        self.wake.notify_one();
        Ok(true)
    }

    pub async fn status(&self) -> Result<CronStatus, KestrelError> {
        let running = self
            .timer
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .is_some();
        let next_wake_at_ms = self.next_wake_ms().await;
        let mut guard = self.store.lock().await;
        let store = self.loaded(&mut guard).await?;
        Ok(CronStatus {
            running,
            jobs: store.jobs.len(),
            next_wake_at_ms,
        })
    }

    async fn next_wake_ms(&self) -> Option<i64> {
        let guard = self.store.lock().await;
        guard.as_ref().and_then(|store| {
            store
                .jobs
                .iter()
                .filter(|j| j.enabled)
                .filter_map(|j| j.state.next_run_at_ms)
                .min()
        })
    }

    /// Applies `f` to the store, persists it, and re-arms the timer.
    async fn mutate<T>(&self, f: impl FnOnce(&mut CronStore) -> T) -> Result<T, KestrelError> {
        let mut guard = self.store.lock().await;
        let store = self.loaded(&mut guard).await?;
        let result = f(store);
        save_store(&self.store_path, store).await?;
        drop(guard);
        self.wake.notify_one();
        Ok(result)
    }

    async fn loaded<'a>(
        &self,
        slot: &'a mut Option<CronStore>,
    ) -> Result<&'a mut CronStore, KestrelError> {
        if slot.is_none() {
            *slot = Some(load_store(&self.store_path).await?);
        }
        slot.as_mut()
            .ok_or_else(|| KestrelError::Internal("cron store not loaded".into()))
    }
}

fn next_run_or_log(job: &CronJob, now: i64) -> Option<i64> {
    match compute_next_run(&job.schedule, now) {
        Ok(next) => next,
        Err(e) => {
            warn!(job_id = %job.id, error = %e, "cannot compute next run");
            None
        }
    }
}

async fn sleep_or_forever(duration: Option<Duration>) {
    match duration {
        Some(d) => tokio::time::sleep(d).await,
        None => std::future::pending().await,
    }
}

fn new_job_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..8].to_string()
}
