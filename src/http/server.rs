//! HTTP server setup and composition root.
//!
//! # Responsibilities
//! - Build the subsystems (repository, snapshot provider, channel manager, notifier)
//!   and wire the notifier in as the repository's commit hook
//! - Create the Axum router with all handlers
//! - Wire up middleware (request ID, tracing, timeout, body limit)
//! - Serve plain or TLS, and close every gateway channel on shutdown

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::Request;
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::api;
use crate::config::{ControlPlaneConfig, TlsConfig};
use crate::gateway::ChannelManager;
use crate::net::tls::load_tls_config;
use crate::notifier::ChangeNotifier;
use crate::repository::RouteRepository;
use crate::snapshot::SnapshotProvider;
use crate::store::ConfigStore;

/// Time in-flight requests get to finish once shutdown starts (TLS listener only).
const TLS_DRAIN_SECS: u64 = 10;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: ConfigStore,
    pub repository: RouteRepository,
    pub snapshots: SnapshotProvider,
    pub channels: Arc<ChannelManager>,
    pub notifier: Arc<ChangeNotifier>,
    /// Operator token → owner id.
    pub operators: Arc<HashMap<String, i64>>,
}

impl AppState {
    /// Build every subsystem over `store`.
    pub fn new(config: &ControlPlaneConfig, store: ConfigStore) -> Self {
        let channels = Arc::new(ChannelManager::new(&config.gateway));
        let notifier = Arc::new(ChangeNotifier::new(channels.clone()));
        let repository = RouteRepository::new(store.clone()).with_commit_hook(notifier.clone());
        let operators = config
            .auth
            .operators
            .iter()
            .map(|op| (op.token.clone(), op.owner_id))
            .collect();

        Self {
            snapshots: SnapshotProvider::new(store.clone()),
            store,
            repository,
            channels,
            notifier,
            operators: Arc::new(operators),
        }
    }
}

/// HTTP server for the control plane.
pub struct HttpServer {
    router: Router,
    state: AppState,
}

impl HttpServer {
    /// Create a new HTTP server over an already-migrated store.
    pub fn new(config: ControlPlaneConfig, store: ConfigStore) -> Self {
        let state = AppState::new(&config, store);
        let router = Self::build_router(&config, state.clone());
        Self { router, state }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &ControlPlaneConfig, state: AppState) -> Router {
        let trace = TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
            let request_id = request
                .headers()
                .get("x-request-id")
                .and_then(|v| v.to_str().ok())
                .unwrap_or("-");
            tracing::info_span!(
                "request",
                method = %request.method(),
                path = %request.uri().path(),
                request_id = %request_id,
            )
        });

        Router::new()
            .merge(api::operator_router(state.clone()))
            .merge(api::gateway_router())
            .with_state(state)
            .layer(RequestBodyLimitLayer::new(config.security.max_body_size))
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(trace)
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    /// Shared state, for callers that need the channel manager or repository directly.
    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Serve plain HTTP on `listener` until `shutdown` fires.
    pub async fn run(self, listener: TcpListener, mut shutdown: broadcast::Receiver<()>) -> std::io::Result<()> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "Control API listening");

        let channels = self.state.channels.clone();
        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
                channels.close_all();
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Serve HTTPS on `addr` until `shutdown` fires.
    pub async fn run_tls(
        self,
        addr: SocketAddr,
        tls: &TlsConfig,
        mut shutdown: broadcast::Receiver<()>,
    ) -> std::io::Result<()> {
        let rustls = load_tls_config(tls).await?;
        let handle = axum_server::Handle::new();

        let channels = self.state.channels.clone();
        let shutdown_handle = handle.clone();
        tokio::spawn(async move {
            let _ = shutdown.recv().await;
            tracing::info!("Shutdown signal received");
            channels.close_all();
            shutdown_handle.graceful_shutdown(Some(Duration::from_secs(TLS_DRAIN_SECS)));
        });

        tracing::info!(address = %addr, "Control API listening (TLS)");
        axum_server::bind_rustls(addr, rustls)
            .handle(handle)
            .serve(self.router.into_make_service_with_connect_info::<SocketAddr>())
            .await?;

        tracing::info!("HTTPS server stopped");
        Ok(())
    }
}
