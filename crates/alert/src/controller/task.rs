use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::definition::JobDefinition;
use crate::pipeline::{AlertPipeline, PipelineDeps};
use crate::schedule::Schedule;

/// The polling loop of one job generation.
pub(super) struct ScheduleTask {
    pub(super) definition: Arc<JobDefinition>,
    pub(super) schedule: Arc<Schedule>,
    pub(super) generation: u64,
    pub(super) cancel: Arc<Notify>,
    pub(super) tick: Duration,
    pub(super) deps: Arc<PipelineDeps>,
}

impl ScheduleTask {
    pub(super) async fn run(self) {
        let job = self.definition.name.as_str();
        let generation = self.generation;
        let mut next = self.schedule.next(Utc::now());
        let mut in_flight: Option<JoinHandle<()>> = None;

        loop {
            let Some(due) = next else {
                info!(job, generation, "schedule has no future fire; idling until stopped");
                self.cancel.notified().await;
                break;
            };

            let now = Utc::now();
            if now >= due {
                let busy = in_flight.as_ref().is_some_and(|h| !h.is_finished());
                if self.definition.exclusive && busy {
                    warn!(job, generation, "previous run still in progress; skipping fire");
                } else {
                    debug!(job, generation, due = %due, "fire");
                    in_flight = Some(self.fire());
                }
                // Same sampled `now`: a late tick fires once, never replays.
                next = self.schedule.next_after(now);
            }

            tokio::select! {
                _ = self.cancel.notified() => break,
                _ = tokio::time::sleep(self.tick) => {}
            }
        }

        debug!(job, generation, "scheduling task exited");
    }

    fn fire(&self) -> JoinHandle<()> {
        let pipeline = AlertPipeline::new(self.definition.clone(), self.deps.clone());
        tokio::spawn(async move {
            pipeline.run().await;
        })
    }
}
