//! FAQ Voice Agent Server binary
//!
//! Wires configuration, the knowledge index, retrieval, generation, and the
//! session orchestrator into an axum server.

use std::path::Path;
use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use faq_agent_agent::{Composer, ComposerSettings, Orchestrator, OrchestratorConfig};
use faq_agent_config::{load_settings, EmbedderBackend, Settings};
use faq_agent_core::{Embedder, GenerativeModel};
use faq_agent_llm::{GeneratorConfig, HttpGenerator};
use faq_agent_rag::{
    load_knowledge_file, sample_knowledge, write_sample_knowledge, EmbeddingIndex, HashEmbedder,
    HttpEmbedder, Retriever, RetrieverConfig, SharedIndex,
};
use faq_agent_server::{create_router, AppState};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let env = std::env::var("FAQ_AGENT_ENV").ok();
    let settings = match load_settings(env.as_deref()) {
        Ok(settings) => settings,
        Err(e) => {
            // Tracing is not up yet.
            eprintln!("Failed to load configuration: {}, using defaults", e);
            Settings::new()
        }
    };

    init_tracing(&settings);

    tracing::info!(
        host = %settings.server.host,
        port = settings.server.port,
        "Starting FAQ voice agent server"
    );

    let embedder = build_embedder(&settings);
    let index = build_index(&settings, embedder.as_ref()).await?;

    let retriever = Retriever::new(
        embedder.clone(),
        index.clone(),
        RetrieverConfig::from_settings(&settings.retrieval),
    );

    let generator: Arc<dyn GenerativeModel> = Arc::new(HttpGenerator::new(
        GeneratorConfig::from_settings(&settings.composer),
    )?);
    if !generator.is_available().await {
        tracing::warn!(
            model = generator.model_name(),
            "Generation backend unreachable at startup, turns will use the failure fallback"
        );
    }

    let orchestrator = Orchestrator::new(
        Arc::new(retriever),
        Composer::new(ComposerSettings::from_settings(&settings.composer)),
        generator.clone(),
        OrchestratorConfig::from_settings(&settings.session),
    );

    let addr = format!("{}:{}", settings.server.host, settings.server.port);
    let state = AppState::new(settings, orchestrator, index, embedder, generator);
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(addr = %addr, "Listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

fn init_tracing(settings: &Settings) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(settings.observability.log_level.clone()));

    if settings.observability.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

fn build_embedder(settings: &Settings) -> Arc<dyn Embedder> {
    match settings.retrieval.embedder {
        EmbedderBackend::Hash => {
            tracing::info!(dim = settings.retrieval.embedding_dim, "Using hash embedder");
            Arc::new(HashEmbedder::new(settings.retrieval.embedding_dim))
        }
        EmbedderBackend::Http => {
            // validate() guarantees the endpoint is present for this backend.
            let endpoint = settings
                .retrieval
                .embedder_endpoint
                .clone()
                .unwrap_or_default();
            tracing::info!(endpoint = %endpoint, "Using HTTP embedder");
            Arc::new(HttpEmbedder::new(
                endpoint,
                settings.retrieval.embedding_dim,
                "http-v1",
            ))
        }
    }
}

/// Load the knowledge base and build the initial index.
///
/// A missing knowledge file is seeded with the built-in sample set so the
/// server still comes up answerable and operators have a file to edit.
async fn build_index(
    settings: &Settings,
    embedder: &dyn Embedder,
) -> Result<SharedIndex, faq_agent_core::Error> {
    let path = Path::new(&settings.server.knowledge_path);
    if !path.exists() {
        tracing::warn!(path = %path.display(), "Knowledge file missing, seeding sample knowledge");
        if let Err(e) = write_sample_knowledge(path) {
            tracing::warn!(error = %e, "Could not seed knowledge file");
        }
    }

    let entries = match load_knowledge_file(path) {
        Ok(entries) => {
            tracing::info!(path = %path.display(), entries = entries.len(), "Knowledge base loaded");
            entries
        }
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "Knowledge file unavailable, using built-in sample knowledge"
            );
            sample_knowledge()
        }
    };

    let index = EmbeddingIndex::build(entries, embedder).await?;
    tracing::info!(
        entries = index.len(),
        model = index.model_version(),
        "Embedding index built"
    );
    Ok(SharedIndex::new(index))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => tracing::error!("Failed to install SIGTERM handler: {}", e),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl+C, shutting down"),
        _ = terminate => tracing::info!("Received SIGTERM, shutting down"),
    }
}
