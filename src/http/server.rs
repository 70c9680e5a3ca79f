//! HTTP server setup.
//!
//! # Responsibilities
//! - Hold the shared application state
//! - Build the Axum router: probes, metrics, and the contract operations
//!   mounted under each base path
//! - Wire up middleware (request ID, tracing, metrics, identity)
//! - Serve on a listener until shutdown

use std::future::Future;
use std::sync::Arc;

use axum::{
    middleware,
    routing::{any, get},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::compose::ComposeBackend;
use crate::config::GatewayConfig;
use crate::contract::{check_examples_and_defaults, ContractDocument, DocumentError};
use crate::http::request::{propagate_request_id_layer, request_span, set_request_id_layer};
use crate::http::{admission, handlers};
use crate::observability::metrics::track_metrics;
use crate::routing::OperationRouter;
use crate::security::identity::{extract_identity, reject_associates};
use crate::security::DistroAccessGate;
use crate::validation::{RequestValidator, ValidationOption, ValidationOptions};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub document: Arc<ContractDocument>,
    pub router: Arc<OperationRouter>,
    pub validator: Arc<RequestValidator>,
    /// Service-wide validation strictness, applied to every request scope.
    pub validation_options: Arc<[ValidationOption]>,
    pub gate: DistroAccessGate,
    pub compose: Arc<dyn ComposeBackend>,
    pub metrics: Option<PrometheusHandle>,
    pub max_body_size: usize,
}

impl AppState {
    /// Derive routing and validation from `document` and `config`.
    ///
    /// Operations are served under `{prefix}/v{major}` and `{prefix}/v{version}`.
    pub fn assemble(
        document: ContractDocument,
        gate: DistroAccessGate,
        compose: Arc<dyn ComposeBackend>,
        config: &GatewayConfig,
        metrics: Option<PrometheusHandle>,
    ) -> Result<Self, DocumentError> {
        let options = config.validation.options();
        check_examples_and_defaults(&document, &ValidationOptions::from_options(&options))?;

        let prefix = config.routing.route_prefix();
        let base_paths = vec![
            format!("{prefix}/v{}", document.major_version()),
            format!("{prefix}/v{}", document.version()),
        ];
        let router = OperationRouter::new(&document, base_paths)?;
        let validator = RequestValidator::new(&document)?;

        tracing::info!(
            title = %document.title(),
            version = %document.version(),
            operations = router.route_count(),
            base_paths = ?router.base_paths(),
            "contract loaded"
        );

        Ok(Self {
            document: Arc::new(document),
            router: Arc::new(router),
            validator: Arc::new(validator),
            validation_options: options.into(),
            gate,
            compose,
            metrics,
            max_body_size: config.limits.max_body_size,
        })
    }
}

/// HTTP server for the image builder API.
pub struct GatewayServer {
    router: Router,
}

impl GatewayServer {
    pub fn new(state: AppState) -> Self {
        Self {
            router: Self::build_router(state),
        }
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(state: AppState) -> Router {
        let mut api = Router::new();
        for base in state.router.base_paths() {
            api = api.route(&format!("{base}/{{*path}}"), any(admission::api_handler));
        }
        let api = api
            .route_layer(middleware::from_fn(reject_associates))
            .route_layer(middleware::from_fn(extract_identity));

        Router::new()
            .route("/status", get(handlers::status))
            .route("/ready", get(handlers::ready))
            .route("/metrics", get(handlers::metrics))
            .merge(api)
            .fallback(handlers::not_found)
            .method_not_allowed_fallback(handlers::method_not_allowed)
            .with_state(state)
            .layer(middleware::from_fn(track_metrics))
            .layer(propagate_request_id_layer())
            .layer(TraceLayer::new_for_http().make_span_with(request_span))
            .layer(set_request_id_layer())
    }

    /// The router, for in-process use (tests, embedding).
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Serve on `listener` until `shutdown` resolves, then drain.
    pub async fn run<F>(self, listener: TcpListener, shutdown: F) -> Result<(), std::io::Error>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown)
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}
