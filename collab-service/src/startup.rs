use crate::config::{CollabConfig, CookieConfig, StoreBackend};
use crate::handlers;
use crate::services::{
    ActivitySink, CollabBroker, CollabDb, CollabStore, ContentServiceClient, DocumentCatalog,
    EtherpadClient, MemoryStore, PermissionGate, RenewalCheck, UserDirectory,
};
use axum::{
    middleware::from_fn,
    routing::{get, post},
    Router,
};
use secrecy::Secret;
use service_core::error::AppError;
use service_core::middleware::{
    metrics_middleware, request_id_middleware, REQUEST_ID_HEADER,
};
use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub broker: Arc<CollabBroker>,
    pub store: Arc<dyn CollabStore>,
    pub documents: Arc<dyn DocumentCatalog>,
    pub users: Arc<dyn UserDirectory>,
    pub gate: Arc<dyn PermissionGate>,
    pub activity: Arc<dyn ActivitySink>,
    pub cookie: CookieConfig,
    /// Shared key the pad service presents on callbacks.
    pub pad_api_key: Secret<String>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check))
        .route("/metrics", get(handlers::metrics_endpoint))
        .route(
            "/documents/:id/collab-session",
            get(handlers::create_collab_session),
        )
        .route(
            "/documents/:id/collab-template",
            post(handlers::create_from_template),
        )
        .route("/pad-events/update", post(handlers::pad_update))
        .route("/pad-events/session-holder", post(handlers::session_holder))
        .with_state(state)
        .layer(from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http().make_span_with(
            |request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get(REQUEST_ID_HEADER)
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                    user_id = tracing::field::Empty,
                )
            },
        ))
        .layer(from_fn(request_id_middleware))
}

pub struct Application {
    port: u16,
    server: Box<dyn std::future::Future<Output = std::io::Result<()>> + Send + Unpin>,
}

impl Application {
    pub async fn build(config: CollabConfig) -> Result<Self, AppError> {
        let state = build_state(&config).await?;
        let app = router(state);

        let addr = SocketAddr::from(([0, 0, 0, 0], config.common.port));
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!("Failed to bind TCP listener to {}: {}", addr, e);
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!("Listening on {}", port);

        let server = axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal());

        Ok(Self {
            port,
            server: Box::new(server.into_future()),
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        self.server.await
    }
}

async fn build_state(config: &CollabConfig) -> Result<AppState, AppError> {
    let remote = Arc::new(
        EtherpadClient::new(
            config.remote.clone(),
            RenewalCheck::from(&config.session),
        )
        .map_err(|e| AppError::ConfigError(anyhow::anyhow!(e)))?,
    );

    let content = Arc::new(
        ContentServiceClient::new(
            config.content_service.base_url.as_str(),
            Duration::from_secs(config.remote.timeout_secs),
        )
        .map_err(|e| AppError::ConfigError(anyhow::anyhow!(e)))?,
    );

    let policy = config.session.clone();
    let external_endpoint = config.remote.external_endpoint.as_str();

    let (broker, store) = match config.store.backend {
        StoreBackend::Mongo => {
            let uri = config.store.mongodb_uri.as_deref().ok_or_else(|| {
                AppError::ConfigError(anyhow::anyhow!(
                    "MONGODB_URI is required for the mongo store"
                ))
            })?;
            let db = Arc::new(CollabDb::connect(uri, &config.store.mongodb_database).await?);
            db.initialize_indexes().await?;

            let broker = CollabBroker::new(
                db.clone(),
                remote,
                content.clone(),
                policy,
                external_endpoint,
            );
            let store: Arc<dyn CollabStore> = db;
            (broker, store)
        }
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory store; mappings are lost on restart");
            let memory = Arc::new(MemoryStore::new());

            let broker = CollabBroker::new(
                memory.clone(),
                remote,
                content.clone(),
                policy,
                external_endpoint,
            );
            let store: Arc<dyn CollabStore> = memory;
            (broker, store)
        }
    };

    Ok(AppState {
        broker: Arc::new(broker),
        store,
        documents: content.clone(),
        users: content.clone(),
        gate: content.clone(),
        activity: content,
        cookie: config.cookie.clone(),
        pad_api_key: config.remote.api_key.clone(),
    })
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
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
                tracing::error!("Failed to install SIGTERM handler: {}", e);
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
