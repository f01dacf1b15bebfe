//! Command-line surface.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};

use vigil_alert::{JobDefinition, Schedule, SearchTemplate, TemplateRenderer};

/// Alert job scheduler and control API.
#[derive(Parser, Debug)]
#[command(name = "vigil-server", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Recover stored jobs and serve the control API (default).
    Serve,

    /// Check a job definition file and print its upcoming fire times.
    Validate {
        /// YAML job definition, as stored in `alert_job.value`.
        file: PathBuf,

        /// How many upcoming fires to print.
        #[arg(long, short = 'n', default_value_t = 5)]
        count: usize,
    },
}

/// Parse, compile and template-check a definition without touching the store.
pub fn validate(file: &Path, count: usize) -> anyhow::Result<()> {
    let yaml = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read {}", file.display()))?;
    let name = file
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("job");

    let report = check_definition(name, &yaml, chrono::Utc::now(), count)?;
    println!("{report}");
    Ok(())
}

fn check_definition(
    name: &str,
    yaml: &str,
    now: chrono::DateTime<chrono::Utc>,
    count: usize,
) -> anyhow::Result<String> {
    let definition = JobDefinition::from_yaml(name, yaml).context("invalid definition")?;
    let schedule = Schedule::compile(&definition.schedule_spec).context("invalid schedule")?;
    TemplateRenderer::new()
        .validate_search(&definition.search_template)
        .context("invalid search template")?;

    let search_kind = match definition.search_template {
        SearchTemplate::Text(_) => "text",
        SearchTemplate::Structured(_) => "structured",
    };

    let mut out = format!(
        "{}: {}\n  schedule: {}\n  search:   {} template -> {}\n  exclusive: {}\n  next fires:",
        definition.name,
        definition.title,
        schedule,
        search_kind,
        definition.search_endpoint,
        definition.exclusive,
    );
    let fires = schedule.upcoming(now, count);
    if fires.is_empty() {
        out.push_str(" none");
    }
    for fire in fires {
        out.push_str(&format!("\n    {}", fire.to_rfc3339()));
    }
    Ok(out)
}
