//! Alert jobs: schedules, the execution pipeline, and the job controller.

pub mod controller;
pub mod decision;
pub mod definition;
pub mod pipeline;
pub mod schedule;
pub mod search;
pub mod store;
pub mod templating;

pub use controller::{ControllerError, JobController, JobSummary, RecoverReport};
pub use decision::{DecisionEngine, DecisionError, TemplateDecisionEngine};
pub use definition::{DecisionRef, DefinitionError, JobDefinition, SearchTemplate};
pub use pipeline::{AlertPipeline, PipelineDeps, PipelineError, PipelineOutcome, Stage};
pub use schedule::{Schedule, ScheduleError};
pub use search::{HttpSearchBackend, SearchBackend, SearchError};
pub use store::{JobStore, StoreError};
#[cfg(any(test, feature = "test-util"))]
pub use store::MemoryJobStore;
pub use templating::{TemplateError, TemplateRenderer};
