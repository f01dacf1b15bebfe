//! One alert run: render → search → decide → act.
//!
//! The stages are strictly linear. The first failing stage ends the run with
//! [`PipelineOutcome::Failed`]; nothing is retried.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use vigil_core::ExecutionContext;
use vigil_notify::{ActionError, ActionRegistry};

use crate::decision::{DecisionEngine, DecisionError};
use crate::definition::JobDefinition;
use crate::search::{SearchBackend, SearchError};
use crate::templating::{TemplateError, TemplateRenderer};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Rendering,
    Searching,
    Deciding,
    Acting,
    Done,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Rendering => "rendering",
            Stage::Searching => "searching",
            Stage::Deciding => "deciding",
            Stage::Acting => "acting",
            Stage::Done => "done",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Template(#[from] TemplateError),
    #[error(transparent)]
    Search(#[from] SearchError),
    #[error(transparent)]
    Decision(#[from] DecisionError),
    #[error(transparent)]
    Action(#[from] ActionError),
}

#[derive(Debug)]
pub enum PipelineOutcome {
    /// Every produced action executed (possibly none).
    Done { actions: usize },
    Failed { stage: Stage, error: PipelineError },
}

impl PipelineOutcome {
    pub fn is_done(&self) -> bool {
        matches!(self, PipelineOutcome::Done { .. })
    }

    pub fn failed_stage(&self) -> Option<Stage> {
        match self {
            PipelineOutcome::Failed { stage, .. } => Some(*stage),
            PipelineOutcome::Done { .. } => None,
        }
    }
}

/// Collaborators shared by every run of every job.
#[derive(Clone)]
pub struct PipelineDeps {
    pub search: Arc<dyn SearchBackend>,
    pub decision: Arc<dyn DecisionEngine>,
    pub registry: ActionRegistry,
    pub renderer: TemplateRenderer,
}

impl PipelineDeps {
    pub fn new(
        search: Arc<dyn SearchBackend>,
        decision: Arc<dyn DecisionEngine>,
        registry: ActionRegistry,
    ) -> Self {
        Self {
            search,
            decision,
            registry,
            renderer: TemplateRenderer::new(),
        }
    }
}

/// Executes a single job definition against its collaborators.
#[derive(Clone)]
pub struct AlertPipeline {
    definition: Arc<JobDefinition>,
    deps: Arc<PipelineDeps>,
}

impl AlertPipeline {
    pub fn new(definition: Arc<JobDefinition>, deps: Arc<PipelineDeps>) -> Self {
        Self { definition, deps }
    }

    pub fn definition(&self) -> &JobDefinition {
        &self.definition
    }

    pub async fn run(&self) -> PipelineOutcome {
        self.run_at(Utc::now()).await
    }

    /// Run with an explicit start instant.
    pub async fn run_at(&self, started_at: DateTime<Utc>) -> PipelineOutcome {
        let job = self.definition.name.as_str();
        let mut ctx = ExecutionContext::new(job, started_at);

        let outcome = match self.execute(&mut ctx).await {
            Ok(actions) => PipelineOutcome::Done { actions },
            Err((stage, error)) => PipelineOutcome::Failed { stage, error },
        };

        match &outcome {
            PipelineOutcome::Done { actions } => tracing::info!(
                job,
                stage = %Stage::Done,
                outcome = "ok",
                actions,
                "alert run finished"
            ),
            PipelineOutcome::Failed { stage, error } => tracing::error!(
                job,
                stage = %stage,
                outcome = "failed",
                error = %error,
                "alert run failed"
            ),
        }
        outcome
    }

    async fn execute(&self, ctx: &mut ExecutionContext) -> Result<usize, (Stage, PipelineError)> {
        let def = &self.definition;
        let job = def.name.as_str();
        let fail = |stage: Stage| move |e: PipelineError| (stage, e);

        let body = self
            .deps
            .renderer
            .render_search(&def.search_template, &ctx.template_value())
            .map_err(PipelineError::from)
            .map_err(fail(Stage::Rendering))?;
        tracing::debug!(job, stage = %Stage::Rendering, outcome = "ok", "search body rendered");

        let result = self
            .deps
            .search
            .search(&def.search_endpoint, &body)
            .await
            .map_err(PipelineError::from)
            .map_err(fail(Stage::Searching))?;
        tracing::debug!(
            job,
            stage = %Stage::Searching,
            outcome = "ok",
            hits = result.total_hits,
            "search completed"
        );
        ctx.search_result = Some(result);

        let raw_actions = self
            .deps
            .decision
            .evaluate(&def.decision, ctx)
            .await
            .map_err(PipelineError::from)
            .map_err(fail(Stage::Deciding))?;
        if raw_actions.is_empty() {
            tracing::info!(job, stage = %Stage::Deciding, outcome = "ok", "no actions produced");
            return Ok(0);
        }
        tracing::debug!(
            job,
            stage = %Stage::Deciding,
            outcome = "ok",
            actions = raw_actions.len(),
            "decision produced actions"
        );

        let handlers = self
            .deps
            .registry
            .parse_batch(&raw_actions)
            .map_err(PipelineError::from)
            .map_err(fail(Stage::Acting))?;

        for handler in &handlers {
            handler
                .execute(ctx)
                .await
                .map_err(PipelineError::from)
                .map_err(fail(Stage::Acting))?;
        }
        tracing::debug!(job, stage = %Stage::Acting, outcome = "ok", "actions executed");
        Ok(handlers.len())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use serde_json::{json, Value};
    use vigil_core::SearchResult;
    use vigil_notify::{ActionEnv, Mailer};

    use super::*;
    use crate::decision::TemplateDecisionEngine;
    use crate::definition::{DecisionRef, SearchTemplate};

    struct MockSearch {
        calls: Arc<AtomicUsize>,
        bodies: Arc<Mutex<Vec<Value>>>,
        total_hits: u64,
        fail: bool,
    }

    impl MockSearch {
        fn hits(total_hits: u64) -> Self {
            Self {
                calls: Arc::default(),
                bodies: Arc::default(),
                total_hits,
                fail: false,
            }
        }

        fn failing() -> Self {
            Self {
                fail: true,
                ..Self::hits(0)
            }
        }
    }

    #[async_trait::async_trait]
    impl SearchBackend for MockSearch {
        async fn search(&self, _endpoint: &str, body: &Value) -> Result<SearchResult, SearchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.bodies.lock().unwrap().push(body.clone());
            if self.fail {
                return Err(SearchError::Status {
                    status: 503,
                    body: "unavailable".into(),
                });
            }
            Ok(SearchResult {
                total_hits: self.total_hits,
                ..Default::default()
            })
        }
    }

    /// Returns a fixed action list regardless of the context.
    struct FixedDecision(Vec<Value>);

    #[async_trait::async_trait]
    impl DecisionEngine for FixedDecision {
        async fn evaluate(
            &self,
            _decision: &DecisionRef,
            _ctx: &ExecutionContext,
        ) -> Result<Vec<Value>, DecisionError> {
            Ok(self.0.clone())
        }
    }

    /// Delegates to a real engine and keeps every action list it returned.
    struct CapturingDecision {
        inner: TemplateDecisionEngine,
        decided: Arc<Mutex<Vec<Vec<Value>>>>,
    }

    #[async_trait::async_trait]
    impl DecisionEngine for CapturingDecision {
        async fn evaluate(
            &self,
            decision: &DecisionRef,
            ctx: &ExecutionContext,
        ) -> Result<Vec<Value>, DecisionError> {
            let actions = self.inner.evaluate(decision, ctx).await?;
            self.decided.lock().unwrap().push(actions.clone());
            Ok(actions)
        }
    }

    #[derive(Default)]
    struct RecordingMailer {
        sent: Mutex<Vec<String>>,
    }

    #[async_trait::async_trait]
    impl Mailer for RecordingMailer {
        async fn send_html(
            &self,
            _recipients: &[String],
            subject: &str,
            _html: &str,
        ) -> Result<(), ActionError> {
            self.sent.lock().unwrap().push(subject.to_string());
            Ok(())
        }
    }

    fn definition(search: SearchTemplate, decision: &str) -> Arc<JobDefinition> {
        Arc::new(JobDefinition {
            name: "42".into(),
            title: "test".into(),
            owner: "ops".into(),
            schedule_spec: "@every 1m".into(),
            search_template: search,
            search_endpoint: "/logs/_search".into(),
            decision: DecisionRef::Inline(decision.into()),
            exclusive: false,
        })
    }

    fn deps(
        search: MockSearch,
        decision: Arc<dyn DecisionEngine>,
        mailer: Arc<RecordingMailer>,
    ) -> Arc<PipelineDeps> {
        let env = ActionEnv::new(reqwest::Client::new()).with_mailer(mailer);
        Arc::new(PipelineDeps::new(
            Arc::new(search),
            decision,
            ActionRegistry::new(env),
        ))
    }

    fn mail(subject: &str) -> Value {
        json!({"type": "mail", "to": ["ops@example.com"], "subject": subject, "content": "x"})
    }

    #[tokio::test]
    async fn end_to_end_log_action() {
        let search = MockSearch::hits(3);
        let bodies = search.bodies.clone();
        let decision = r#"
{% if result.total_hits > 0 %}
- type: log
  message: "{{ result.total_hits }} hits"
{% endif %}
"#;
        let decided = Arc::new(Mutex::new(Vec::new()));
        let engine = CapturingDecision {
            inner: TemplateDecisionEngine::new(),
            decided: decided.clone(),
        };
        let pipeline = AlertPipeline::new(
            definition(
                SearchTemplate::Structured(json!({"query": {"term": {"job": "{{ name }}"}}})),
                decision,
            ),
            deps(search, Arc::new(engine), Arc::default()),
        );

        let outcome = pipeline.run().await;
        assert!(matches!(outcome, PipelineOutcome::Done { actions: 1 }), "got: {outcome:?}");
        assert_eq!(bodies.lock().unwrap()[0], json!({"query": {"term": {"job": "42"}}}));
        assert_eq!(
            *decided.lock().unwrap(),
            vec![vec![json!({"type": "log", "message": "3 hits"})]]
        );
    }

    #[tokio::test]
    async fn no_actions_is_done() {
        let pipeline = AlertPipeline::new(
            definition(SearchTemplate::Structured(json!({})), ""),
            deps(MockSearch::hits(0), Arc::new(TemplateDecisionEngine::new()), Arc::default()),
        );
        assert!(matches!(pipeline.run().await, PipelineOutcome::Done { actions: 0 }));
    }

    #[tokio::test]
    async fn render_failure_skips_search() {
        let search = MockSearch::hits(1);
        let calls = search.calls.clone();
        let pipeline = AlertPipeline::new(
            definition(SearchTemplate::Text("{{ unclosed".into()), ""),
            deps(search, Arc::new(TemplateDecisionEngine::new()), Arc::default()),
        );
        assert_eq!(pipeline.run().await.failed_stage(), Some(Stage::Rendering));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn search_failure_stops_before_decision() {
        let mailer = Arc::new(RecordingMailer::default());
        let pipeline = AlertPipeline::new(
            definition(SearchTemplate::Structured(json!({})), ""),
            deps(
                MockSearch::failing(),
                Arc::new(FixedDecision(vec![mail("never")])),
                mailer.clone(),
            ),
        );
        match pipeline.run().await {
            PipelineOutcome::Failed { stage, error } => {
                assert_eq!(stage, Stage::Searching);
                assert!(matches!(error, PipelineError::Search(_)));
            }
            other => panic!("expected Failed, got: {other:?}"),
        }
        assert!(mailer.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn decision_shape_error_fails_deciding() {
        let pipeline = AlertPipeline::new(
            definition(SearchTemplate::Structured(json!({})), "type: log"),
            deps(MockSearch::hits(1), Arc::new(TemplateDecisionEngine::new()), Arc::default()),
        );
        assert_eq!(pipeline.run().await.failed_stage(), Some(Stage::Deciding));
    }

    #[tokio::test]
    async fn failing_action_stops_the_batch() {
        let mailer = Arc::new(RecordingMailer::default());
        let actions = vec![
            json!({"type": "log", "message": "first"}),
            json!({"type": "http", "method": "GET", "url": "http://127.0.0.1:1/unreachable"}),
            mail("after failure"),
        ];
        let pipeline = AlertPipeline::new(
            definition(SearchTemplate::Structured(json!({})), ""),
            deps(MockSearch::hits(1), Arc::new(FixedDecision(actions)), mailer.clone()),
        );

        assert_eq!(pipeline.run().await.failed_stage(), Some(Stage::Acting));
        assert!(mailer.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn undecodable_action_executes_nothing() {
        let mailer = Arc::new(RecordingMailer::default());
        let actions = vec![
            json!({"type": "log", "message": "first"}),
            mail("before bad action"),
            json!({"type": "http", "method": "GET", "url": "::not a url::"}),
        ];
        let pipeline = AlertPipeline::new(
            definition(SearchTemplate::Structured(json!({})), ""),
            deps(MockSearch::hits(1), Arc::new(FixedDecision(actions)), mailer.clone()),
        );

        match pipeline.run().await {
            PipelineOutcome::Failed { stage, error } => {
                assert_eq!(stage, Stage::Acting);
                assert!(matches!(error, PipelineError::Action(ActionError::AtIndex { index: 2, .. })));
            }
            other => panic!("expected Failed, got: {other:?}"),
        }
        assert!(mailer.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn all_actions_run_in_order() {
        let mailer = Arc::new(RecordingMailer::default());
        let pipeline = AlertPipeline::new(
            definition(SearchTemplate::Structured(json!({})), ""),
            deps(
                MockSearch::hits(1),
                Arc::new(FixedDecision(vec![mail("one"), mail("two")])),
                mailer.clone(),
            ),
        );
        assert!(matches!(pipeline.run().await, PipelineOutcome::Done { actions: 2 }));
        assert_eq!(*mailer.sent.lock().unwrap(), vec!["one", "two"]);
    }
}
