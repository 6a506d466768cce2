//! ServerBuilder for the OrgPilot edge server

use super::state::EdgeState;
use super::{auth, multimedia, session};
use crate::config::OrgPilotConfig;
use anyhow::Result;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

/// Builder for the edge server router
///
/// # Example
///
/// ```ignore
/// ServerBuilder::new()
///     .with_config(OrgPilotConfig::load(Some("orgpilot.yaml"))?)
///     .serve()
///     .await?;
/// ```
pub struct ServerBuilder {
    config: OrgPilotConfig,
    http: Option<reqwest::Client>,
    custom_routes: Vec<Router>,
}

impl ServerBuilder {
    /// Create a new ServerBuilder with default configuration
    pub fn new() -> Self {
        Self {
            config: OrgPilotConfig::default(),
            http: None,
            custom_routes: Vec::new(),
        }
    }

    pub fn with_config(mut self, config: OrgPilotConfig) -> Self {
        self.config = config;
        self
    }

    /// Use a preconfigured HTTP client for backend calls
    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.http = Some(client);
        self
    }

    /// Add custom routes to the server
    ///
    /// Use this for routes outside the built-in proxy surface.
    ///
    /// ```ignore
    /// let extra = Router::new().route("/api/version", get(version));
    /// ServerBuilder::new().with_custom_routes(extra).build()?;
    /// ```
    pub fn with_custom_routes(mut self, routes: Router) -> Self {
        self.custom_routes.push(routes);
        self
    }

    /// Build the state shared by all routes
    pub fn build_state(&self) -> Result<EdgeState> {
        self.config.validate()?;
        let base_url = self.config.base_url();
        Ok(match &self.http {
            Some(client) => EdgeState::with_client(client.clone(), &base_url),
            None => EdgeState::new(&base_url, self.config.api.timeout())?,
        })
    }

    /// Build the final router
    ///
    /// Health routes, the multimedia proxy, auth forwarding, the session
    /// route and any custom routes, wrapped in a trace layer.
    pub fn build(mut self) -> Result<Router> {
        let state = self.build_state()?;
        let custom_routes = std::mem::take(&mut self.custom_routes);

        let api_routes = Router::new()
            .route("/api/multimedia/{id}", get(multimedia::multimedia_image))
            .route("/api/auth/login", post(auth::login))
            .route("/api/auth/register", post(auth::register))
            .route("/api/auth/logout", post(auth::logout))
            .route("/api/session", get(session::current_session))
            .with_state(state);

        let mut app = Self::health_routes().merge(api_routes);
        for custom_router in custom_routes {
            app = app.merge(custom_router);
        }

        Ok(app.layer(TraceLayer::new_for_http()))
    }

    fn health_routes() -> Router {
        Router::new()
            .route("/health", get(health_check))
            .route("/healthz", get(health_check))
    }

    /// Serve the application with graceful shutdown
    ///
    /// Binds to `server.bind_addr` and stops on SIGTERM or Ctrl+C.
    pub async fn serve(self) -> Result<()> {
        let addr = self.config.server.socket_addr()?;
        let app = self.build()?;
        let listener = TcpListener::bind(addr).await?;

        tracing::info!("Server listening on {}", addr);

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        tracing::info!("Server shutdown complete");
        Ok(())
    }
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "orgpilot"
    }))
}

async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
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
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal, initiating graceful shutdown...");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM signal, initiating graceful shutdown...");
        },
    }
}
