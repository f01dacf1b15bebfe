//! Decision step: turns a run's search result into an ordered action list.

use std::path::{Path, PathBuf};

use serde_json::Value;
use vigil_core::ExecutionContext;

use crate::definition::DecisionRef;
use crate::templating::{TemplateError, TemplateRenderer};

/// Decision logic behind a narrow seam. Implementations inspect the context
/// (including `search_result`) and return zero or more action descriptions.
#[async_trait::async_trait]
pub trait DecisionEngine: Send + Sync {
    async fn evaluate(
        &self,
        decision: &DecisionRef,
        ctx: &ExecutionContext,
    ) -> Result<Vec<Value>, DecisionError>;
}

#[derive(Debug, thiserror::Error)]
pub enum DecisionError {
    #[error("cannot read decision template {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error("decision output must be a list of actions, got {0}")]
    Shape(&'static str),
}

/// Renders the decision as a minijinja template and reads the output as a
/// YAML list. Blank output or `null` means no actions.
#[derive(Debug, Clone, Default)]
pub struct TemplateDecisionEngine {
    renderer: TemplateRenderer,
    /// Directory that relative `file:` references resolve against.
    base_dir: Option<PathBuf>,
}

impl TemplateDecisionEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(dir.into());
        self
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        match &self.base_dir {
            Some(dir) if path.is_relative() => dir.join(path),
            _ => path.to_path_buf(),
        }
    }

    async fn template_text(&self, decision: &DecisionRef) -> Result<String, DecisionError> {
        match decision {
            DecisionRef::Inline(text) => Ok(text.clone()),
            DecisionRef::File { file } => {
                let path = self.resolve(file);
                tokio::fs::read_to_string(&path)
                    .await
                    .map_err(|source| DecisionError::Io { path, source })
            }
        }
    }
}

#[async_trait::async_trait]
impl DecisionEngine for TemplateDecisionEngine {
    async fn evaluate(
        &self,
        decision: &DecisionRef,
        ctx: &ExecutionContext,
    ) -> Result<Vec<Value>, DecisionError> {
        let text = self.template_text(decision).await?;
        let rendered = self.renderer.render(&text, &ctx.template_value())?;
        actions_from_output(&rendered)
    }
}

fn actions_from_output(rendered: &str) -> Result<Vec<Value>, DecisionError> {
    if rendered.trim().is_empty() {
        return Ok(Vec::new());
    }
    let parsed: Value = serde_yaml::from_str(rendered).map_err(TemplateError::from)?;
    match parsed {
        Value::Null => Ok(Vec::new()),
        Value::Array(items) => Ok(items),
        Value::Bool(_) => Err(DecisionError::Shape("a boolean")),
        Value::Number(_) => Err(DecisionError::Shape("a number")),
        Value::String(_) => Err(DecisionError::Shape("a string")),
        Value::Object(_) => Err(DecisionError::Shape("a mapping")),
    }
}
