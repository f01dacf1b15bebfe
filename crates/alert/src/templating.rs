//! Minijinja rendering for search bodies and decision templates.
//!
//! Templates are arbitrary strings taken from job definitions (not
//! pre-registered), so a fresh [`minijinja::Environment`] is created per
//! render call. The context is the execution context's template view:
//! `name`, `started_ts`, `time`, and `result`. Templates come from stored
//! records, so no global exposes the process environment.

use serde_json::{Map, Value};

use crate::definition::SearchTemplate;

#[derive(Debug, thiserror::Error)]
pub enum TemplateError {
    #[error("template rendering failed: {0}")]
    Render(String),

    #[error("rendered template is not valid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Renders job templates using minijinja.
#[derive(Debug, Default, Clone, Copy)]
pub struct TemplateRenderer;

impl TemplateRenderer {
    pub fn new() -> Self {
        Self
    }

    /// Build a minijinja environment with the custom filters.
    fn build_env() -> minijinja::Environment<'static> {
        let mut env = minijinja::Environment::new();

        env.add_filter("round", round_filter);
        env.add_filter("lower", lower_filter);
        env.add_filter("upper", upper_filter);
        env.add_filter("json", json_filter);

        env
    }

    /// Render a template string with the given context.
    pub fn render(&self, template_str: &str, ctx: &Value) -> Result<String, TemplateError> {
        let env = Self::build_env();
        env.render_str(template_str, ctx)
            .map_err(|e| TemplateError::Render(e.to_string()))
    }

    /// Render a template and parse the output as YAML.
    pub fn render_yaml(&self, template_str: &str, ctx: &Value) -> Result<Value, TemplateError> {
        let rendered = self.render(template_str, ctx)?;
        Ok(serde_yaml::from_str(&rendered)?)
    }

    /// Render every string key and string leaf of a structured value in place.
    pub fn render_value(&self, value: &Value, ctx: &Value) -> Result<Value, TemplateError> {
        let env = Self::build_env();
        render_tree(&env, value, ctx)
    }

    /// Produce the search request body for one run.
    pub fn render_search(
        &self,
        template: &SearchTemplate,
        ctx: &Value,
    ) -> Result<Value, TemplateError> {
        match template {
            SearchTemplate::Text(text) => self.render_yaml(text, ctx),
            SearchTemplate::Structured(value) => self.render_value(value, ctx),
        }
    }

    /// Check that a template string parses, without evaluating it.
    pub fn validate(&self, template_str: &str) -> Result<(), TemplateError> {
        let env = Self::build_env();
        env.template_from_str(template_str)
            .map_err(|e| TemplateError::Render(e.to_string()))?;
        Ok(())
    }

    /// Check every template fragment of a search template.
    pub fn validate_search(&self, template: &SearchTemplate) -> Result<(), TemplateError> {
        match template {
            SearchTemplate::Text(text) => self.validate(text),
            SearchTemplate::Structured(value) => self.validate_tree(value),
        }
    }

    fn validate_tree(&self, value: &Value) -> Result<(), TemplateError> {
        match value {
            Value::String(s) => self.validate(s),
            Value::Array(items) => items.iter().try_for_each(|v| self.validate_tree(v)),
            Value::Object(map) => map.iter().try_for_each(|(k, v)| {
                self.validate(k)?;
                self.validate_tree(v)
            }),
            _ => Ok(()),
        }
    }
}

fn render_tree(
    env: &minijinja::Environment<'static>,
    value: &Value,
    ctx: &Value,
) -> Result<Value, TemplateError> {
    let render = |s: &str| {
        env.render_str(s, ctx)
            .map_err(|e| TemplateError::Render(e.to_string()))
    };
    Ok(match value {
        Value::String(s) => Value::String(render(s)?),
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|v| render_tree(env, v, ctx))
                .collect::<Result<_, _>>()?,
        ),
        Value::Object(map) => {
            let mut out = Map::with_capacity(map.len());
            for (k, v) in map {
                out.insert(render(k)?, render_tree(env, v, ctx)?);
            }
            Value::Object(out)
        }
        other => other.clone(),
    })
}

/// Custom filter: round a float to N decimal places.
fn round_filter(value: f64, decimals: Option<u32>) -> String {
    let n = decimals.unwrap_or(0);
    format!("{:.prec$}", value, prec = n as usize)
}

fn lower_filter(value: String) -> String {
    value.to_lowercase()
}

fn upper_filter(value: String) -> String {
    value.to_uppercase()
}

/// Custom filter: serialize any value as compact JSON (also valid YAML).
fn json_filter(value: minijinja::Value) -> Result<String, minijinja::Error> {
    serde_json::to_string(&value).map_err(|e| {
        minijinja::Error::new(minijinja::ErrorKind::InvalidOperation, e.to_string())
    })
}
