//! `serve`: connect the store, recover jobs, run the control API until a
//! shutdown signal arrives.

use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};

use vigil_alert::{
    HttpSearchBackend, JobController, JobStore, PipelineDeps, TemplateDecisionEngine,
};
use vigil_notify::{ActionEnv, ActionRegistry};

use crate::job_store::PgJobStore;
use crate::router::build_router;
use crate::state::AppState;
use crate::db;

pub async fn serve(config: vigil_core::Config) -> anyhow::Result<()> {
    config.log_summary();

    let pool = db::init_pg_pool(&config.postgres).await?;
    let store: Arc<dyn JobStore> = Arc::new(PgJobStore::new(pool));

    let deps = build_pipeline_deps(&config)?;
    let controller = Arc::new(JobController::new(deps, config.scheduler.tick()));

    // A store failure here is fatal; malformed records are only reported.
    let report = controller
        .recover(store.as_ref())
        .await
        .context("failed to load alert jobs from the store")?;
    for (job, reason) in &report.failed {
        warn!(job = %job, reason = %reason, "job skipped during recovery");
    }

    let state = Arc::new(AppState {
        controller: controller.clone(),
        store,
    });
    let app = build_router(state, &config.server.cors_origin);

    let addr = config.server.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(addr = %addr, jobs = report.started.len(), "vigil control API listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    controller.shutdown().await;
    info!("vigil-server exited cleanly");
    Ok(())
}

fn build_pipeline_deps(config: &vigil_core::Config) -> anyhow::Result<Arc<PipelineDeps>> {
    let search = HttpSearchBackend::from_config(&config.search)
        .context("invalid search backend configuration")?;
    let env = ActionEnv::from_config(config).context("invalid action configuration")?;
    if config.mail.host.is_none() {
        info!("MAIL_HOST not set: mail actions will fail");
    }
    if config.broadcast.url.is_none() {
        info!("BROADCAST_URL not set: webhook broadcast actions will fail");
    }

    Ok(Arc::new(PipelineDeps::new(
        Arc::new(search),
        Arc::new(TemplateDecisionEngine::new()),
        ActionRegistry::new(env),
    )))
}

/// Wait for SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for ctrl_c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {},
                    _ = sigterm.recv() => {},
                }
            }
            Err(e) => {
                warn!(error = %e, "failed to register SIGTERM handler");
                ctrl_c.await;
            }
        }
    }

    #[cfg(not(unix))]
    ctrl_c.await;

    info!("shutdown signal received");
}
