use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::task::ScheduleTask;
use super::{ControllerError, JobSummary};
use crate::definition::JobDefinition;
use crate::pipeline::PipelineDeps;
use crate::schedule::Schedule;

/// Generations are unique across every controller in the process.
static NEXT_GENERATION: AtomicU64 = AtomicU64::new(1);

/// Registry entry for one active job generation.
pub(super) struct RunningJob {
    pub(super) definition: Arc<JobDefinition>,
    pub(super) schedule: Arc<Schedule>,
    pub(super) generation: u64,
    pub(super) cancel: Arc<Notify>,
    pub(super) handle: JoinHandle<()>,
    pub(super) started_at: DateTime<Utc>,
}

pub struct JobController {
    pub(super) jobs: Mutex<HashMap<String, RunningJob>>,
    pub(super) deps: Arc<PipelineDeps>,
    pub(super) tick: Duration,
}

impl JobController {
    pub fn new(deps: Arc<PipelineDeps>, tick: Duration) -> Self {
        Self {
            jobs: Mutex::new(HashMap::new()),
            deps,
            tick,
        }
    }

    /// Start a job that is not running. Returns the new generation.
    pub async fn start(&self, definition: JobDefinition) -> Result<u64, ControllerError> {
        let mut jobs = self.jobs.lock().await;
        if jobs.contains_key(&definition.name) {
            return Err(ControllerError::AlreadyActive(definition.name));
        }
        self.spawn_locked(&mut jobs, definition)
    }

    /// Stop a running job and wait for its scheduling task to exit.
    pub async fn stop(&self, name: &str) -> Result<(), ControllerError> {
        let mut jobs = self.jobs.lock().await;
        self.stop_locked(&mut jobs, name).await
    }

    /// Replace a job's definition, starting it if absent. The old generation
    /// has fully exited before the new one is spawned. If the new schedule
    /// does not compile the old job stays stopped.
    pub async fn reload(&self, definition: JobDefinition) -> Result<u64, ControllerError> {
        let mut jobs = self.jobs.lock().await;
        if jobs.contains_key(&definition.name) {
            self.stop_locked(&mut jobs, &definition.name).await?;
        }
        self.spawn_locked(&mut jobs, definition)
    }

    pub async fn is_active(&self, name: &str) -> bool {
        self.jobs.lock().await.contains_key(name)
    }

    /// Snapshot of running jobs, sorted by name.
    pub async fn list(&self) -> Vec<JobSummary> {
        let now = Utc::now();
        let jobs = self.jobs.lock().await;
        let mut out: Vec<JobSummary> = jobs
            .values()
            .map(|job| JobSummary {
                name: job.definition.name.clone(),
                title: job.definition.title.clone(),
                generation: job.generation,
                schedule: job.schedule.source().to_string(),
                started_at: job.started_at,
                next_fire: job.schedule.next(now),
            })
            .collect();
        out.sort_by(|a, b| a.name.cmp(&b.name));
        out
    }

    fn spawn_locked(
        &self,
        jobs: &mut HashMap<String, RunningJob>,
        definition: JobDefinition,
    ) -> Result<u64, ControllerError> {
        let schedule = Arc::new(Schedule::compile(&definition.schedule_spec)?);
        let definition = Arc::new(definition);
        let generation = NEXT_GENERATION.fetch_add(1, Ordering::Relaxed);
        let cancel = Arc::new(Notify::new());

        let task = ScheduleTask {
            definition: definition.clone(),
            schedule: schedule.clone(),
            generation,
            cancel: cancel.clone(),
            tick: self.tick,
            deps: self.deps.clone(),
        };
        let handle = tokio::spawn(task.run());

        info!(
            job = %definition.name,
            generation,
            schedule = %schedule,
            "job started"
        );
        jobs.insert(
            definition.name.clone(),
            RunningJob {
                definition,
                schedule,
                generation,
                cancel,
                handle,
                started_at: Utc::now(),
            },
        );
        Ok(generation)
    }

    pub(super) async fn stop_locked(
        &self,
        jobs: &mut HashMap<String, RunningJob>,
        name: &str,
    ) -> Result<(), ControllerError> {
        let job = jobs
            .remove(name)
            .ok_or_else(|| ControllerError::NotActive(name.to_string()))?;
        terminate(job).await;
        Ok(())
    }
}

/// Signal a generation and wait for its task to acknowledge by exiting.
pub(super) async fn terminate(job: RunningJob) {
    // notify_one stores a permit, so a task that has not reached its first
    // wait still observes the stop.
    job.cancel.notify_one();
    match job.handle.await {
        Ok(()) => info!(job = %job.definition.name, generation = job.generation, "job stopped"),
        Err(e) => warn!(
            job = %job.definition.name,
            generation = job.generation,
            error = %e,
            "scheduling task ended abnormally"
        ),
    }
}
