//! HTTP webhook ingress.
//!
//! # Responsibilities
//! - Accept webhook messages on the configured path
//! - Validate envelopes before anything is routed
//! - Hand valid envelopes to the dispatcher and answer immediately
//! - Liveness (`/`) and readiness (`/readyz`) endpoints

use std::time::Duration;

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::{limit::RequestBodyLimitLayer, timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::ListenerConfig;
use crate::dispatch::Dispatcher;
use crate::ingress::envelope::{validate, RawMessage};
use crate::observability::metrics;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Dispatcher,
}

/// HTTP server that feeds inbound webhooks into the demux.
pub struct IngressServer {
    router: Router,
    config: ListenerConfig,
}

impl IngressServer {
    pub fn new(config: ListenerConfig, dispatcher: Dispatcher) -> Self {
        let router = Self::build_router(&config, AppState { dispatcher });
        Self { router, config }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    pub fn build_router(config: &ListenerConfig, state: AppState) -> Router {
        Router::new()
            .route(&config.webhook_path, post(webhook_handler))
            .route("/", get(liveness))
            .route("/readyz", get(readiness))
            .with_state(state)
            .layer(
                ServiceBuilder::new()
                    .layer(TraceLayer::new_for_http())
                    .layer(RequestBodyLimitLayer::new(config.max_body_bytes))
                    .layer(TimeoutLayer::new(Duration::from_secs(config.request_timeout_secs)))
                    .layer(DefaultBodyLimit::disable()),
            )
    }

    /// Run the server until the shutdown channel fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            path = %self.config.webhook_path,
            "Webhook ingress starting"
        );

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
            })
            .await?;

        tracing::info!("Webhook ingress stopped");
        Ok(())
    }
}

async fn webhook_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let mut message = RawMessage::new(body.to_vec());
    for (name, value) in headers.iter() {
        if let Ok(value) = value.to_str() {
            message.insert_header(name.as_str(), value);
        }
    }

    match validate(message) {
        Ok(envelope) => {
            tracing::debug!(
                event = %envelope.event_type(),
                token = %envelope.dedupe_token(),
                "Accepted webhook message"
            );
            state.dispatcher.spawn(envelope);
            StatusCode::ACCEPTED.into_response()
        }
        Err(e) => {
            tracing::warn!(reason = e.reason(), "Rejected webhook message: {}", e);
            metrics::record_envelope_rejected(e.reason());
            (StatusCode::BAD_REQUEST, e.to_string()).into_response()
        }
    }
}

/// Always OK while the process is serving.
async fn liveness() -> StatusCode {
    StatusCode::OK
}

/// OK once a routing table has been applied; includes the last reload error.
async fn readiness(State(state): State<AppState>) -> Response {
    let status = state.dispatcher.agent().status();
    let code = if status.version.is_some() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (code, Json(status)).into_response()
}
