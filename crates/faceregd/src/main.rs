use std::sync::Arc;

use anyhow::{Context, Result};
use facereg_core::OnnxExtractor;
use facereg_index::{CollectionSpec, MemoryIndex, Metric, QdrantIndex, VectorIndex};
use tracing_subscriber::EnvFilter;

mod config;
mod engine;
mod extractor;
mod server;
#[cfg(test)]
mod testing;

use config::{Config, IndexBackend};
use engine::{Engine, EngineOptions, VerifyPolicy};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "faceregd starting");

    let config = Config::from_env();

    let detector_path = config.detector_model_path();
    let recognizer_path = config.recognizer_model_path();
    let onnx = OnnxExtractor::load(&detector_path, &recognizer_path)
        .with_context(|| format!("loading models from {}", config.model_dir.display()))?;
    let extractor = extractor::spawn_extractor(onnx).context("spawning extractor thread")?;

    let spec = CollectionSpec::new(&config.collection, extractor.dimension(), Metric::Cosine);
    let index: Arc<dyn VectorIndex> = match config.index_backend {
        IndexBackend::Qdrant => Arc::new(QdrantIndex::new(&config.index_endpoint(), spec)?),
        IndexBackend::Memory => {
            tracing::warn!("using in-memory index; identities are lost on exit");
            Arc::new(MemoryIndex::new(spec))
        }
    };

    // No reconnection after this point.
    if let Err(e) = facereg_index::connect_with_retry(
        index.as_ref(),
        config.connect_attempts,
        config.connect_delay(),
    )
    .await
    {
        tracing::error!(
            backend = index.backend(),
            host = %config.index_host,
            port = config.index_port,
            error = %e,
            "vector index unavailable"
        );
        return Err(e.into());
    }

    let options = EngineOptions {
        verify: if config.verify_strict {
            VerifyPolicy::Strict
        } else {
            VerifyPolicy::Warn
        },
        min_score: config.min_score,
        page_size: config.page_size,
    };
    let engine = Engine::new(index, extractor, options)?;
    let app = server::create_app(server::AppState::new(engine, config.upload_limit_bytes));

    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    tracing::info!(%addr, "faceregd ready");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("faceregd shutting down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "cannot listen for shutdown signal");
    }
}
