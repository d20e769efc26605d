//! Top-level orchestration: construct the collaborators, recover persisted
//! state, then run the dispatcher and the HTTP surface until a signal.

use std::sync::Arc;

use anyhow::Context;
use courier_api::{AppState, create_router};
use courier_scheduler::{
    Clock, DemoSender, RecoveryOptions, Scheduler, SchedulerConfig, Sender, SystemClock, recover,
};
use courier_store::{S3StateStore, StateStore};
use tracing::info;

use crate::config::Config;

/// Success probability of the built-in demo sender. Stands in for a real
/// carrier integration.
const DEMO_SENDER_SUCCESS_RATE: f64 = 0.8;

/// The assembled process.
#[derive(Debug)]
pub struct Courier {
    config: Config,
}

impl Courier {
    pub const fn new(config: Config) -> Self {
        Self { config }
    }

    /// Run until a shutdown signal arrives.
    ///
    /// Exit semantics: a recovery failure or a dispatcher panic surfaces as
    /// an error (and hence a non-zero exit); a signal-driven stop drains
    /// in-flight attempts and returns cleanly.
    ///
    /// # Errors
    /// Store construction, recovery, binding the listener, or an abnormal
    /// dispatcher termination.
    pub async fn run(self) -> anyhow::Result<()> {
        let store: Arc<dyn StateStore> = Arc::new(
            S3StateStore::connect(self.config.store.clone())
                .context("failed to open the object store")?,
        );
        let sender: Arc<dyn Sender> = Arc::new(DemoSender::new(DEMO_SENDER_SUCCESS_RATE));
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);

        let scheduler_config = SchedulerConfig {
            batch_size: self.config.batch_size,
            ..SchedulerConfig::default()
        };
        let scheduler = Scheduler::new(Arc::clone(&store), sender, clock, scheduler_config)?;

        let report = recover(
            &scheduler,
            RecoveryOptions {
                skip_unreadable: self.config.recovery_skip_unreadable,
            },
        )
        .await
        .context("startup recovery failed")?;
        info!(
            loaded = report.loaded,
            discarded = report.discarded,
            skipped = report.skipped,
            "state recovered"
        );

        scheduler.start();

        let app = create_router(AppState {
            scheduler: Arc::clone(&scheduler),
            store,
        });
        let addr = format!("{}:{}", self.config.api_host, self.config.api_port);
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .with_context(|| format!("failed to bind {addr}"))?;
        info!(addr = %addr, "api listening");

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        info!("draining dispatcher");
        scheduler.shutdown().await?;
        info!("shutdown complete");
        Ok(())
    }
}

/// Resolves on SIGINT or SIGTERM.
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install the Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install the SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }

    info!("shutdown signal received");
}
