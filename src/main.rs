use std::future::ready;
use std::net::SocketAddr;

use axum::Router;
use axum::routing::get;
use tokio::net::TcpListener;
use tokio::signal;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use paedia::{app, initialize_state, telemetry};

const DEFAULT_PORT: u16 = 8080;
const DEFAULT_METRICS_PORT: u16 = 9090;

fn port(key: &str, default: u16) -> u16 {
    std::env::var(key)
        .ok()
        .and_then(|port| port.parse().ok())
        .unwrap_or(default)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            },
            Err(err) => tracing::error!(error = %err, "failed to install SIGTERM handler"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutdown signal received");
}

#[tokio::main]
async fn main() {
    // export logs and traces when an OTLP collector is set.
    let endpoint = std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT").ok();
    let otlp_logs = endpoint
        .as_deref()
        .and_then(|endpoint| telemetry::setup_logging(endpoint).ok());

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .with(otlp_logs)
        .init();

    if endpoint.is_some() {
        match telemetry::setup_tracer() {
            Ok(provider) => {
                opentelemetry::global::set_tracer_provider(provider);
            },
            Err(err) => tracing::error!(error = %err, "failed to start OTLP tracer"),
        }
    }

    let state = match initialize_state().await {
        Ok(state) => state,
        Err(err) => {
            tracing::error!(error = %err, "failed to initialize application state");
            std::process::exit(1);
        },
    };

    match telemetry::setup_metrics_recorder() {
        Ok(handle) => {
            let metrics = Router::new().route("/metrics", get(move || ready(handle.render())));
            let addr = SocketAddr::from(([0, 0, 0, 0], port("METRICS_PORT", DEFAULT_METRICS_PORT)));
            tokio::spawn(async move {
                match TcpListener::bind(addr).await {
                    Ok(listener) => {
                        tracing::info!(%addr, "metrics exporter listening");
                        if let Err(err) = axum::serve(listener, metrics).await {
                            tracing::error!(error = %err, "metrics exporter stopped");
                        }
                    },
                    Err(err) => tracing::error!(%addr, error = %err, "cannot bind metrics exporter"),
                }
            });
        },
        Err(err) => tracing::warn!(error = %err, "prometheus recorder not installed"),
    }

    let addr = SocketAddr::from(([0, 0, 0, 0], port("PORT", DEFAULT_PORT)));
    let listener = match TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(err) => {
            tracing::error!(%addr, error = %err, "cannot bind server");
            std::process::exit(1);
        },
    };

    tracing::info!(%addr, "server started");
    if let Err(err) = axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        tracing::error!(error = %err, "server stopped");
    }
}
