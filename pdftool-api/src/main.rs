use anyhow::Context;
use clap::Parser;
use pdftool::{DocumentEngine, Janitor, QpdfEngine};
use pdftool_api::{app, telemetry, AppState, Config};
use tokio::net::TcpListener;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();
    telemetry::init(&config.log_level).context("failed to install tracing subscriber")?;
    config.validate()?;

    let engine = QpdfEngine::with_program(config.qpdf_bin.clone());
    if !engine.is_available().await {
        warn!(
            program = %engine.program().display(),
            engine = engine.name(),
            "document engine not found; transforms will fail until it is installed"
        );
    }

    let listen = config.listen;
    let retention = config.retention_policy();
    let state = AppState::from_config(config).context("failed to initialize service")?;

    if state.auth.is_open() {
        warn!("neither API_KEY nor AUTH_USER/AUTH_PASS is set; /v1 is unauthenticated");
    }
    if state.store.is_some() && state.ocr.is_none() {
        warn!("S3 is enabled but MISTRAL is not set; /v1/ocr is disabled");
    }

    let janitor = state
        .store
        .clone()
        .map(|store| Janitor::new(store, retention).spawn());

    info!(
        work_dir = %state.work_area.root().display(),
        ocr = state.ocr_enabled(),
        "pdftool starting"
    );

    let listener = TcpListener::bind(listen)
        .await
        .with_context(|| format!("failed to bind {listen}"))?;
    info!("pdftool listening on http://{listen}");

    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    if let Some(janitor) = janitor {
        janitor.shutdown().await;
    }
    info!("pdftool stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received");
}
