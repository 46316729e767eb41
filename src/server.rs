//! HTTP surface: one build route plus a not-found fallback.
//!
//! The build route accepts every method so that checks happen in a fixed order:
//! path, method, then query parameters. Paths are compared percent-decoded. Builds run on
//! their own task and finish even if the client goes away. Internal failures are logged
//! here and collapse to a fixed body; no paths or tool output reach the client.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use percent_encoding::percent_decode_str;
use axum::{
    extract::{Query, State},
    http::{Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::config::ServerConfig;
use crate::pipeline::BuildPipeline;
use crate::request::{BuildRequest, ValidationError};

pub const OK_BODY: &str = "Ok.";
pub const METHOD_NOT_ALLOWED_BODY: &str = "Only POST is allowed at this endpoint.";
pub const INTERNAL_ERROR_BODY: &str = "Internal server error.";

#[derive(Clone)]
struct AppState {
    pipeline: Arc<BuildPipeline>,
    build_path: Arc<str>,
}

impl IntoResponse for ValidationError {
    fn into_response(self) -> Response {
        (StatusCode::BAD_REQUEST, self.to_string()).into_response()
    }
}

/// Router serving `POST <prefix>/<language>`; everything else is a 404.
pub fn router(config: &ServerConfig, pipeline: Arc<BuildPipeline>) -> Router {
    let build_path = config.build_path();
    Router::new()
        .route(&build_path, any(trigger_build))
        .fallback(not_found)
        .layer(TraceLayer::new_for_http())
        .with_state(AppState {
            pipeline,
            build_path: build_path.into(),
        })
}

async fn trigger_build(State(state): State<AppState>, method: Method, uri: Uri) -> Response {
    run_build(state, method, &uri).await
}

/// Decoded query pairs; a query that cannot be decoded counts as empty.
fn query_pairs(uri: &Uri) -> Vec<(String, String)> {
    match Query::<Vec<(String, String)>>::try_from_uri(uri) {
        Ok(Query(pairs)) => pairs,
        Err(e) => {
            info!(error = %e, "Ignoring undecodable query string");
            Vec::new()
        }
    }
}

async fn run_build(state: AppState, method: Method, uri: &Uri) -> Response {
    if method != Method::POST {
        info!(method = %method, "Rejecting non-POST build request");
        return (StatusCode::METHOD_NOT_ALLOWED, METHOD_NOT_ALLOWED_BODY).into_response();
    }

    let request = match BuildRequest::from_query(&query_pairs(uri)) {
        Ok(request) => request,
        Err(e) => {
            info!(reason = %e, "Rejecting invalid build request");
            return e.into_response();
        }
    };

    // Detached from the connection: a client disconnect does not cancel the build.
    let pipeline = state.pipeline.clone();
    let job = request.clone();
    let build = tokio::spawn(async move { pipeline.run(&job).await });

    match build.await {
        Ok(Ok(report)) => {
            info!(
                build_id = %report.build_id,
                branch = %report.branch,
                version = %report.version,
                "Build request completed"
            );
            (StatusCode::OK, OK_BODY).into_response()
        }
        Ok(Err(e)) => {
            error!(
                step = e.step(),
                error = ?e,
                branch = %request.branch,
                version = %request.version,
                "Build request failed"
            );
            (StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_ERROR_BODY).into_response()
        }
        Err(e) => {
            error!(
                error = ?e,
                branch = %request.branch,
                version = %request.version,
                "Build task did not complete"
            );
            (StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_ERROR_BODY).into_response()
        }
    }
}

/// Matches on the percent-decoded path, so `/%63pp` still reaches the build route.
async fn not_found(State(state): State<AppState>, method: Method, uri: Uri) -> Response {
    let path = percent_decode_str(uri.path()).decode_utf8_lossy().into_owned();
    if path == *state.build_path {
        return run_build(state, method, &uri).await;
    }
    info!(path = %path, "Replying not found");
    (StatusCode::NOT_FOUND, format!("Not found: {path}")).into_response()
}

/// Binds the configured port and serves until Ctrl-C or SIGTERM.
pub async fn serve(config: ServerConfig, pipeline: Arc<BuildPipeline>) -> Result<()> {
    let app = router(&config, pipeline);
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    info!(addr = %addr, build_path = %config.build_path(), "Build server started");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server terminated unexpectedly")?;
    info!("Build server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = ?e, "Failed to listen for Ctrl-C");
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
                warn!(error = ?e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received Ctrl-C, shutting down"),
        () = terminate => info!("Received SIGTERM, shutting down"),
    }
}
