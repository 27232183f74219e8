use std::sync::Arc;

use aide::{axum::ApiRouter, openapi::OpenApi};
use anyhow::Context;
use axum::{routing::get, Extension, Router};
use listenfd::ListenFd;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::config::GatewayConfig;
use crate::embedding::{self, Embedder, FastEmbedModel};
use crate::server::docs::{api_docs, docs_routes};
use crate::server::shutdown::shutdown_signal;
use crate::server::state::AppState;

#[tokio::main]
pub async fn start_server(config: GatewayConfig) -> anyhow::Result<()> {
    let state = AppState::new(load_model(&config).await);
    let app = app(state, &config.api_base_url);

    let mut listenfd = ListenFd::from_env();
    let listener = match listenfd
        .take_tcp_listener(0)
        .context("failed to take inherited listener")?
    {
        // if we are given a tcp listener on listen fd 0, we use that one
        Some(listener) => {
            listener.set_nonblocking(true)?;
            TcpListener::from_std(listener)?
        }
        // otherwise fall back to local listening
        None => TcpListener::bind(config.bind_addr)
            .await
            .with_context(|| format!("failed to bind {}", config.bind_addr))?,
    };

    tracing::info!(
        "Embedding gateway listening on http://{}{}",
        listener.local_addr()?,
        config.api_base_url
    );
    tracing::info!(
        "API docs are accessible at http://{}{}",
        listener.local_addr()?,
        base_api_route_builder("/docs", &config.api_base_url)
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")
}

/// Builds the full router: embedding endpoints, docs and request tracing.
pub fn app(state: AppState, api_base_url: &str) -> Router {
    aide::gen::on_error(|error| {
        tracing::warn!("{error}");
    });
    aide::gen::extract_schemas(true);

    let mut api = OpenApi::default();
    let docs_path = base_api_route_builder("/docs", api_base_url);
    ApiRouter::new()
        .route(
            &base_api_route_builder("/", api_base_url),
            get(embedding::routes::hello_world),
        )
        .merge(embedding::routes::embed_routes(state, api_base_url))
        .nest(&docs_path, docs_routes(&docs_path))
        .finish_api_with(&mut api, api_docs)
        .layer(Extension(Arc::new(api)))
        .layer(TraceLayer::new_for_http())
}

fn base_api_route_builder(endpoint: &str, api_base_url: &str) -> String {
    format!("{}{}", api_base_url, endpoint)
}

/// Loads the model once. Failure is logged and leaves the gateway running
/// without a model.
pub async fn load_model(config: &GatewayConfig) -> Option<Arc<dyn Embedder>> {
    let model_name = config.model.clone();
    let cache_dir = config.cache_dir.clone();
    let show_download_progress = config.show_download_progress;
    tracing::info!(model = ?model_name, cache_dir = %cache_dir.display(), "loading embedding model");

    let loaded = tokio::task::spawn_blocking(move || {
        FastEmbedModel::try_new(&model_name, cache_dir, show_download_progress)
    })
    .await;

    match loaded {
        Ok(Ok(model)) => {
            let info = model.model_info();
            tracing::info!(
                name = %info.name,
                dimension = info.dimension,
                "model loaded successfully"
            );
            Some(Arc::new(model))
        }
        Ok(Err(err)) => {
            tracing::error!(error = %format!("{err:#}"), "failed to load model");
            None
        }
        Err(err) => {
            tracing::error!(error = %err, "model loading task failed");
            None
        }
    }
}
