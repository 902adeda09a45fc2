pub mod admission_review;
mod api;
mod certs;
pub mod cli;
pub mod config;
pub mod errors;
pub mod patch;
pub mod policy;
pub mod review;
pub mod scheme;
pub mod tracing;

#[cfg(test)]
mod test_utils;

use ::tracing::info;
use anyhow::Result;
use axum::{
    http::Method,
    routing::{get, post},
    Router,
};
use axum_server::{tls_rustls::RustlsConfig, Handle};
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::api::{
    handlers::{api_not_found_handler, healthz_handler, mutate_handler, not_found_handler},
    state::ApiServerState,
};
use crate::certs::create_tls_config_and_watch_certificate_changes;
use crate::config::Config;
use crate::scheme::Scheme;

/// How long in-flight requests are given to complete once a shutdown
/// signal has been received
const GRACEFUL_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

pub struct WebhookServer {
    router: Router,
    addr: SocketAddr,
    tls_config: Option<RustlsConfig>,
}

impl WebhookServer {
    pub async fn new_from_config(config: Config) -> Result<Self> {
        let state = Arc::new(ApiServerState {
            scheme: Scheme::new(),
            default_allow_privilege_escalation: config.default_allow_privilege_escalation,
        });

        let tls_config = match config.tls_config {
            Some(tls_config) => {
                Some(create_tls_config_and_watch_certificate_changes(tls_config).await?)
            }
            None => None,
        };

        let v1_routes = Router::new()
            .route("/mutate", post(mutate_handler).fallback(api_not_found_handler))
            .route("/healthz", get(healthz_handler).fallback(api_not_found_handler))
            .fallback(api_not_found_handler);

        let api_routes = Router::new()
            .nest("/v1", v1_routes)
            .fallback(api_not_found_handler)
            .layer(
                CorsLayer::new().allow_origin(Any).allow_methods([
                    Method::GET,
                    Method::POST,
                    Method::HEAD,
                    Method::PUT,
                    Method::DELETE,
                    Method::PATCH,
                ]),
            );

        let router = Router::new()
            .nest("/api", api_routes)
            .fallback(not_found_handler)
            .layer(TraceLayer::new_for_http())
            .with_state(state);

        Ok(Self {
            router,
            addr: config.addr,
            tls_config,
        })
    }

    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub async fn run(self) -> Result<()> {
        let handle = Handle::new();
        tokio::spawn(shutdown_on_signal(handle.clone()));

        match self.tls_config {
            Some(tls_config) => {
                info!(address = %self.addr, tls = true, "started HTTPS server");
                axum_server::bind_rustls(self.addr, tls_config)
                    .handle(handle)
                    .serve(self.router.into_make_service())
                    .await?;
            }
            None => {
                info!(address = %self.addr, tls = false, "started HTTP server");
                axum_server::bind(self.addr)
                    .handle(handle)
                    .serve(self.router.into_make_service())
                    .await?;
            }
        }

        info!("server stopped");
        Ok(())
    }
}

/// Wait for SIGINT or SIGTERM, then start the graceful shutdown of the server
async fn shutdown_on_signal(handle: Handle) {
    let ctrl_c = async {
        if let Err(error) = tokio::signal::ctrl_c().await {
            ::tracing::error!(%error, "cannot listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(error) => {
                ::tracing::error!(%error, "cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!(signal = "SIGINT", "shutting down"),
        _ = terminate => info!(signal = "SIGTERM", "shutting down"),
    }

    handle.graceful_shutdown(Some(GRACEFUL_SHUTDOWN_TIMEOUT));
}
