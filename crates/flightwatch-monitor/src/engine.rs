// SPDX-FileCopyrightText: 2026 Flightwatch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Monitoring job lifecycle.
//!
//! A job is triggered by the external [`JobScheduler`] and, when enabled, by
//! an in-process timer as well. Duplicate triggers are harmless: checks for
//! one key are serialized in-process and every check re-resolves through the
//! cache and lock.

use std::sync::{Arc, Weak};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use dashmap::DashMap;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use flightwatch_config::model::MonitorConfig;
use flightwatch_core::{
    CheckPayload, Clock, EventSink, FlightStatus, FlightwatchError, JobScheduler, MonitorEvent,
    MonitoringJob, MonitoringOptions, MonitoringStatus, NotificationRequest, ResolutionKey,
    ResolutionOutcome, StopReason,
};
use flightwatch_resolver::{ResolutionService, ResolveOptions};

use crate::changes::{descriptions, detect_changes};
use crate::job_store::JobStore;
use crate::notify::notifiable_changes;

struct LocalTimer {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

pub struct MonitoringEngine {
    service: Arc<ResolutionService>,
    jobs: JobStore,
    scheduler: Option<Arc<dyn JobScheduler>>,
    sink: Arc<dyn EventSink>,
    clock: Arc<dyn Clock>,
    config: MonitorConfig,
    timers: DashMap<String, LocalTimer>,
    check_guards: DashMap<String, Arc<Mutex<()>>>,
    this: Weak<Self>,
}

impl MonitoringEngine {
    /// Fails with `Config` when neither trigger would be available.
    pub fn new(
        service: Arc<ResolutionService>,
        scheduler: Option<Arc<dyn JobScheduler>>,
        sink: Arc<dyn EventSink>,
        clock: Arc<dyn Clock>,
        config: &MonitorConfig,
    ) -> Result<Arc<Self>, FlightwatchError> {
        if scheduler.is_none() && !config.local_timer {
            return Err(FlightwatchError::Config(
                "monitor.local_timer is disabled and no job scheduler is configured".into(),
            ));
        }
        let jobs = JobStore::new(service.cache().backend().clone());
        Ok(Arc::new_cyclic(|this| Self {
            service,
            jobs,
            scheduler,
            sink,
            clock,
            config: config.clone(),
            timers: DashMap::new(),
            check_guards: DashMap::new(),
            this: this.clone(),
        }))
    }

    pub fn service(&self) -> &Arc<ResolutionService> {
        &self.service
    }

    /// Starts monitoring `key` after one immediate resolution.
    ///
    /// The job record is claimed before the baseline resolves, so of several
    /// concurrent starts for one key exactly one succeeds.
    pub async fn start(
        &self,
        key: &ResolutionKey,
        options: MonitoringOptions,
    ) -> Result<MonitoringJob, FlightwatchError> {
        let previous = self.jobs.load_versioned(key).await?;
        if let Some((existing, _)) = &previous
            && existing.is_active()
        {
            return Err(FlightwatchError::AlreadyMonitoring {
                job_id: existing.id.clone(),
            });
        }

        let interval = options
            .interval_minutes
            .unwrap_or(self.config.default_interval_minutes);
        let (min, max) = (
            self.config.min_interval_minutes.max(1),
            self.config.max_interval_minutes,
        );
        if !(min..=max).contains(&interval) {
            return Err(FlightwatchError::InvalidOptions(format!(
                "interval_minutes must be between {min} and {max}, got {interval}"
            )));
        }

        let previous_raw = previous.as_ref().map(|(_, raw)| raw.as_str());
        let mut job = MonitoringJob::new(key.clone(), interval, options, self.clock.now());
        let Some(claimed) = self.jobs.replace(&job, previous_raw).await? else {
            debug!(job_id = %job.id, "lost start race for key");
            return Err(FlightwatchError::AlreadyMonitoring { job_id: job.id });
        };

        // Leftover triggers from an earlier, stopped run of the same key.
        self.cancel_triggers(&job.id).await;

        let baseline = match self.service.resolve(key, &ResolveOptions::default()).await {
            Ok(baseline) => baseline,
            Err(e) => {
                if let Err(restore) = self.jobs.restore(key, &claimed, previous_raw).await {
                    warn!(job_id = %job.id, error = %restore, "could not release job claim");
                }
                return Err(e);
            }
        };
        job.current_snapshot = Some(baseline);
        if self.jobs.replace(&job, Some(&claimed)).await?.is_none() {
            info!(job_id = %job.id, "job stopped before its baseline completed");
            return self
                .jobs
                .load(key)
                .await?
                .ok_or(FlightwatchError::JobNotFound { job_id: job.id });
        }

        if let Some(scheduler) = &self.scheduler {
            let payload = CheckPayload {
                job_id: job.id.clone(),
                key: key.clone(),
            };
            if let Err(e) = scheduler.schedule(&job.id, payload, job.interval()).await {
                warn!(job_id = %job.id, error = %e, "external scheduling failed, relying on local timer");
            }
        }
        if self.config.local_timer {
            self.arm_local_timer(&job);
        }

        info!(job_id = %job.id, interval_minutes = interval, "monitoring started");
        self.sink
            .publish(MonitorEvent::MonitoringStarted { job: job.clone() });
        Ok(job)
    }

    /// Stops monitoring `key`. Returns whether a job existed.
    pub async fn stop(&self, key: &ResolutionKey) -> Result<bool, FlightwatchError> {
        loop {
            let Some((mut job, raw)) = self.jobs.load_versioned(key).await? else {
                return Ok(false);
            };
            self.cancel_triggers(&job.id).await;
            if job.status != MonitoringStatus::Active {
                return Ok(true);
            }
            job.status = MonitoringStatus::Stopped;
            job.next_check_at = None;
            if self.jobs.replace(&job, Some(&raw)).await?.is_some() {
                info!(job_id = %job.id, "monitoring stopped");
                self.sink.publish(MonitorEvent::MonitoringStopped {
                    job_id: job.id,
                    reason: StopReason::Requested,
                });
                return Ok(true);
            }
            debug!(job_id = %job.id, "job changed during stop, retrying");
        }
    }

    /// Runs one check for `key`. A job that is not active is returned unchanged.
    ///
    /// The result is written only if the job record is unchanged since the
    /// check began; a stop that landed meanwhile wins.
    pub async fn check(
        &self,
        key: &ResolutionKey,
    ) -> Result<Option<MonitoringJob>, FlightwatchError> {
        let guard = self.check_guards.entry(key.id()).or_default().clone();
        let _serialized = guard.lock().await;

        let Some((mut job, version)) = self.jobs.load_versioned(key).await? else {
            debug!(key = %key, "check for unknown job ignored");
            self.check_guards.remove(&key.id());
            return Ok(None);
        };
        if !job.is_active() {
            debug!(job_id = %job.id, status = %job.status, "check skipped for inactive job");
            self.check_guards.remove(&job.id);
            return Ok(Some(job));
        }
        if job.current_snapshot.is_none() {
            debug!(job_id = %job.id, "check skipped, baseline still resolving");
            return Ok(Some(job));
        }

        let outcome = match self
            .service
            .resolve(key, &ResolveOptions::polling(None))
            .await
        {
            Ok(outcome) => outcome,
            Err(e) => {
                job.status = MonitoringStatus::Error;
                job.next_check_at = None;
                if self.jobs.replace(&job, Some(&version)).await?.is_none() {
                    return self.jobs.load(key).await;
                }
                error!(job_id = %job.id, error = %e, "monitoring check failed, job moved to ERROR");
                self.cancel_triggers(&job.id).await;
                self.sink.publish(MonitorEvent::MonitoringStopped {
                    job_id: job.id.clone(),
                    reason: StopReason::Failed,
                });
                return Ok(Some(job));
            }
        };

        let now = self.clock.now();
        job.record_check(now);
        if !outcome.success {
            warn!(
                job_id = %job.id,
                error = outcome.error.as_deref().unwrap_or("unknown"),
                "monitoring check could not resolve flight"
            );
        }

        let changes = detect_changes(job.current_snapshot.as_ref(), &outcome);
        let change_list = descriptions(&changes);
        if !changes.is_empty() {
            job.changes_detected += changes.len() as u64;
            info!(job_id = %job.id, changes = ?change_list, "flight changes detected");
            self.sink.publish(MonitorEvent::FlightChanged {
                job_id: job.id.clone(),
                previous: job.current_snapshot.clone(),
                current: outcome.clone(),
                changes: change_list.clone(),
            });

            let notify = notifiable_changes(&job.options, &changes);
            if !notify.is_empty() {
                self.sink
                    .publish(MonitorEvent::NotificationSend(NotificationRequest {
                        job: job.clone(),
                        outcome: outcome.clone(),
                        changes: notify,
                        channels: job.options.channels.clone(),
                        raised_at: now,
                    }));
            }
        }
        job.current_snapshot = Some(outcome.clone());

        if let Err(e) = self
            .service
            .cache()
            .append_history(key, &outcome, Some(change_list))
            .await
        {
            warn!(job_id = %job.id, error = %e, "failed to append monitoring history");
        }

        let mut auto_stop = auto_stop_reason(&job, &outcome, now);
        if auto_stop.is_some() {
            job.status = MonitoringStatus::Stopped;
            job.next_check_at = None;
        }
        let mut expected = version;
        while self.jobs.replace(&job, Some(&expected)).await?.is_none() {
            let Some((stored, raw)) = self.jobs.load_versioned(key).await? else {
                return Ok(None);
            };
            if stored.is_active() {
                debug!(job_id = %job.id, "job replaced while checking, keeping stored state");
                return Ok(Some(stored));
            }
            // A stop landed while this check was resolving. Its status wins;
            // the check's results are kept.
            job.status = stored.status;
            job.next_check_at = None;
            auto_stop = None;
            expected = raw;
        }

        if let Some(reason) = auto_stop {
            self.cancel_triggers(&job.id).await;
            info!(job_id = %job.id, reason = ?reason, "monitoring auto-stopped");
            self.sink.publish(MonitorEvent::MonitoringStopped {
                job_id: job.id.clone(),
                reason,
            });
        }
        Ok(Some(job))
    }

    /// Entry point for external scheduler deliveries.
    pub async fn on_trigger(
        &self,
        payload: &CheckPayload,
    ) -> Result<Option<MonitoringJob>, FlightwatchError> {
        self.check(&payload.key).await
    }

    /// Checks immediately, outside the regular cadence.
    pub async fn check_now(&self, key: &ResolutionKey) -> Result<MonitoringJob, FlightwatchError> {
        self.check(key)
            .await?
            .ok_or_else(|| FlightwatchError::JobNotFound { job_id: key.id() })
    }

    pub async fn get_job(
        &self,
        key: &ResolutionKey,
    ) -> Result<Option<MonitoringJob>, FlightwatchError> {
        self.jobs.load(key).await
    }

    pub async fn list_active_jobs(&self) -> Result<Vec<MonitoringJob>, FlightwatchError> {
        Ok(self
            .jobs
            .list()
            .await?
            .into_iter()
            .filter(MonitoringJob::is_active)
            .collect())
    }

    pub async fn list_all_jobs(&self) -> Result<Vec<MonitoringJob>, FlightwatchError> {
        self.jobs.list().await
    }

    /// Changes between the two most recent history records for `key`.
    pub async fn latest_changes(
        &self,
        key: &ResolutionKey,
    ) -> Result<Vec<String>, FlightwatchError> {
        let history = self.service.cache().get_history(key, 2).await?;
        Ok(match history.as_slice() {
            [newer, older, ..] => descriptions(&detect_changes(Some(&older.outcome), &newer.outcome)),
            _ => Vec::new(),
        })
    }

    /// Re-arms local timers for active jobs persisted by an earlier process.
    /// Returns how many were armed.
    pub async fn resume(&self) -> Result<usize, FlightwatchError> {
        if !self.config.local_timer {
            return Ok(0);
        }
        let mut armed = 0;
        for job in self.list_active_jobs().await? {
            if !self.timers.contains_key(&job.id) {
                self.arm_local_timer(&job);
                armed += 1;
            }
        }
        if armed > 0 {
            info!(jobs = armed, "resumed monitoring jobs");
        }
        Ok(armed)
    }

    /// Number of armed in-process timers.
    pub fn local_timer_count(&self) -> usize {
        self.timers.len()
    }

    /// Number of keys with a live check guard.
    pub fn check_guard_count(&self) -> usize {
        self.check_guards.len()
    }

    /// Cancels every local timer and waits for in-flight checks to finish.
    /// External registrations are left in place.
    pub async fn shutdown(&self) {
        let ids: Vec<String> = self.timers.iter().map(|t| t.key().clone()).collect();
        let mut handles = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some((_, timer)) = self.timers.remove(&id) {
                timer.cancel.cancel();
                handles.push(timer.handle);
            }
        }
        let count = handles.len();
        for handle in handles {
            if let Err(e) = handle.await {
                warn!(error = %e, "local timer task ended abnormally");
            }
        }
        info!(timers = count, "monitoring engine shut down");
    }

    fn arm_local_timer(&self, job: &MonitoringJob) {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let engine = self.this.clone();
        let key = job.key.clone();
        let period = job.interval().max(Duration::from_secs(1));

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {}
                }
                let Some(engine) = engine.upgrade() else {
                    break;
                };
                if let Err(e) = engine.check(&key).await {
                    warn!(key = %key, error = %e, "local timer check failed");
                }
            }
            debug!(key = %key, "local timer stopped");
        });

        if let Some(previous) = self.timers.insert(
            job.id.clone(),
            LocalTimer { cancel, handle },
        ) {
            previous.cancel.cancel();
        }
    }

    /// Clears the local timer, the check guard and the external registration
    /// for `job_id`. An in-flight check is left to finish.
    async fn cancel_triggers(&self, job_id: &str) {
        if let Some((_, timer)) = self.timers.remove(job_id) {
            timer.cancel.cancel();
        }
        self.check_guards.remove(job_id);
        if let Some(scheduler) = &self.scheduler {
            if let Err(e) = scheduler.cancel(job_id).await {
                warn!(job_id, error = %e, "failed to cancel external schedule");
            }
        }
    }
}

fn auto_stop_reason(
    job: &MonitoringJob,
    outcome: &ResolutionOutcome,
    now: DateTime<Utc>,
) -> Option<StopReason> {
    let policy = job.options.auto_stop.as_ref()?;
    let departed = outcome
        .flight
        .as_ref()
        .is_some_and(|f| f.status == FlightStatus::Departed);
    if policy.after_departure && departed {
        return Some(StopReason::Departed);
    }
    let budget_spent = policy.after_minutes.is_some_and(|minutes| {
        let limit = i64::try_from(minutes)
            .ok()
            .and_then(TimeDelta::try_minutes)
            .unwrap_or(TimeDelta::MAX);
        now - job.started_at >= limit
    });
    budget_spent.then_some(StopReason::TimeLimit)
}
