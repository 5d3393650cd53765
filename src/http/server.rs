//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router with the campaign, dockerflow and dev routes
//! - Wire up middleware (request ID, tracing, request timeout)
//! - Build the campaign registry, target builder and forwarder from config
//! - Serve until the shutdown broadcast fires

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::Request;
use axum::routing::{any, get};
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::campaign::CampaignRegistry;
use crate::config::schema::ServerConfig;
use crate::config::RelayConfig;
use crate::forward::{Forwarder, TlsError};
use crate::http::request::{RequestIdExt, X_REQUEST_ID};
use crate::http::{dispatch, dockerflow};
use crate::lifecycle::shutdown;
use crate::target::TargetBuilder;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<CampaignRegistry>,
    pub builder: Arc<TargetBuilder>,
    pub forwarder: Forwarder,
    pub server: Arc<ServerConfig>,
}

/// HTTP server for the relay.
pub struct HttpServer {
    router: Router,
    config: RelayConfig,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    ///
    /// Campaign `${VAR}` references are expanded from the process environment.
    pub fn new(config: RelayConfig) -> Result<Self, TlsError> {
        let registry = CampaignRegistry::from_config(&config.campaigns);
        Self::with_registry(config, registry)
    }

    /// Create a server around an already built registry.
    pub fn with_registry(config: RelayConfig, registry: CampaignRegistry) -> Result<Self, TlsError> {
        let forwarder = Forwarder::from_config(&config)?;

        tracing::info!(
            campaigns = registry.len(),
            forward_timeout = ?forwarder.timeout(),
            "Campaign registry loaded"
        );

        let state = AppState {
            registry: Arc::new(registry),
            builder: Arc::new(TargetBuilder::new(
                config.rules.clone().with_env(|name| std::env::var(name).ok()),
            )),
            forwarder,
            server: Arc::new(config.server.clone()),
        };

        let router = Self::build_router(&config, state);
        Ok(Self { router, config })
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &RelayConfig, state: AppState) -> Router {
        let mut router = Router::new()
            .route("/cid/{cid}", any(dispatch::campaign))
            .route("/cid", any(dispatch::missing_campaign))
            .route("/cid/", any(dispatch::missing_campaign))
            .route("/__heartbeat__", get(dockerflow::heartbeat))
            .route("/__lbheartbeat__", get(dockerflow::lbheartbeat))
            .route("/__version__", get(dockerflow::version));

        if config.server.dev_routes {
            tracing::warn!("Development routes enabled");
            router = router.route("/test", any(dispatch::echo));
        }

        router.with_state(state).layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(X_REQUEST_ID, MakeRequestUuid))
                .layer(TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                    tracing::info_span!(
                        "request",
                        method = %request.method(),
                        uri = %request.uri(),
                        request_id = %request.request_id(),
                    )
                }))
                .layer(PropagateRequestIdLayer::new(X_REQUEST_ID))
                .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs))),
        )
    }

    /// Run the server until `shutdown` fires.
    pub async fn run(self, listener: TcpListener, shutdown: broadcast::Receiver<()>) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown::wait(shutdown))
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &RelayConfig {
        &self.config
    }
}
