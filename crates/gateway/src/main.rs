#[cfg(not(feature = "ort-backend"))]
compile_error!("the gateway binary needs a model backend: enable the `ort-backend` feature");

use anyhow::Context;
use common::{TelemetryGuard, retry_with_backoff};
use gateway::{
    AppState, DetectionPipeline, ImageValidator, config::get_configuration, logging::setup_logging,
    router,
};
use inference::{InferenceBackend, InferenceExecutor, backend::ort::OrtBackend};
use preprocess::Normalizer;
use std::sync::Arc;
use tokio::net::TcpListener;

const SERVICE_NAME: &str = "object-detector";
const MODEL_LOAD_BASE_DELAY_MS: u64 = 500;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = get_configuration().context("failed to load configuration")?;

    let _telemetry = match settings.otel_endpoint.as_deref() {
        Some(endpoint) => Some(TelemetryGuard::init(
            SERVICE_NAME,
            endpoint,
            settings.log_level,
            settings.environment,
        )?),
        None => {
            setup_logging(&settings);
            None
        }
    };

    let inference_config = settings.inference_config();
    tracing::info!(
        model_path = %inference_config.model_path,
        workers = inference_config.workers,
        confidence_threshold = inference_config.confidence_threshold,
        max_dimension = settings.max_dimension,
        environment = settings.environment.as_str(),
        "Detection service starting"
    );

    let executor = Arc::new(InferenceExecutor::new(&inference_config));

    // Load in the background; requests arriving first get model_not_ready.
    let loader = Arc::clone(&executor);
    let retries = settings.model_load_retries;
    tokio::spawn(async move {
        let result = loader
            .load(move || {
                retry_with_backoff(
                    || OrtBackend::load_model(&inference_config),
                    retries,
                    MODEL_LOAD_BASE_DELAY_MS,
                    "Model load",
                )
            })
            .await;
        if let Err(e) = result {
            tracing::error!(error = %e, "Model unavailable, predictions will be refused");
        }
    });

    let pipeline = DetectionPipeline::new(
        ImageValidator::new(&settings.allowed_extensions, settings.max_upload_bytes()),
        Normalizer::new(settings.max_dimension),
        executor,
    );
    let app = router(AppState::new(pipeline, &settings.model_path));

    let listener = TcpListener::bind(settings.address())
        .await
        .with_context(|| format!("failed to bind {}", settings.address()))?;
    tracing::info!(address = %listener.local_addr()?, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Detection service stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
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

    tracing::info!("Shutdown signal received");
}
