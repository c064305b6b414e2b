// This file is part of plotsweep.
// SPDX-License-Identifier: Apache-2.0
//
// Axum-backed `Api` implementation (spec.md §4.1, §4.5, §4.6, §4.7; SPEC_FULL.md §4.13).
// Grounded on `spo-api/src/infra/api/mod.rs`'s `AppState`/`AxumApi`/`Config` shape: a
// state struct threaded via `axum::extract::State`, a router assembled once in `serve`,
// `RequestBodyLimitLayer` + `CorsLayer::permissive()`, and a `/ready` probe.

pub mod auth;
pub mod csv_dump;
pub mod hello;
pub mod ingest;
pub mod projections;
pub mod ws;

use crate::{application, domain::Api};
use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use dashmap::DashMap;
use log::{error, info, warn};
use plotsweep_common::{
    domain::{PubSub, Queue, Storage},
    infra::jwt,
};
use serde::{Deserialize, Serialize};
use std::{
    io,
    net::IpAddr,
    sync::{
        Arc,
        atomic::AtomicU64,
    },
};
use thiserror::Error;
use tokio::{
    signal::unix::{Signal, SignalKind, signal},
    sync::mpsc,
};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer};

/// Per-viewer outbound channel, fed by the broadcast listener and the per-connection
/// ping loop alike (`ws.rs`).
pub type ViewerSender = mpsc::UnboundedSender<axum::extract::ws::Message>;

/// Shared state threaded through every handler. Grounded on `wallet-indexer`'s
/// `DashMap`-keyed registry for the viewer list (spec.md §4.5, §5 "Viewer list").
pub struct AppState<S, Q, P> {
    pub storage: S,
    pub queue: Q,
    pub pub_sub: P,
    pub jwt_config: Arc<jwt::Config>,
    pub application_config: Arc<application::Config>,
    pub viewers: Arc<DashMap<u64, ViewerSender>>,
    pub next_viewer_id: Arc<AtomicU64>,
}

impl<S: Clone, Q: Clone, P: Clone> Clone for AppState<S, Q, P> {
    fn clone(&self) -> Self {
        Self {
            storage: self.storage.clone(),
            queue: self.queue.clone(),
            pub_sub: self.pub_sub.clone(),
            jwt_config: self.jwt_config.clone(),
            application_config: self.application_config.clone(),
            viewers: self.viewers.clone(),
            next_viewer_id: self.next_viewer_id.clone(),
        }
    }
}

pub struct AxumApi<S, Q, P> {
    config: Config,
    storage: S,
    queue: Q,
    pub_sub: P,
    jwt_config: jwt::Config,
}

impl<S, Q, P> AxumApi<S, Q, P> {
    pub fn new(config: Config, storage: S, queue: Q, pub_sub: P, jwt_config: jwt::Config) -> Self {
        Self { config, storage, queue, pub_sub, jwt_config }
    }
}

impl<S, Q, P> Api for AxumApi<S, Q, P>
where
    S: Storage,
    Q: Queue,
    P: PubSub,
{
    type Error = AxumApiError;

    async fn serve(self, application_config: application::Config) -> Result<(), Self::Error> {
        let Config { address, port, request_body_limit } = self.config;

        let state = AppState {
            storage: self.storage,
            queue: self.queue,
            pub_sub: self.pub_sub.clone(),
            jwt_config: Arc::new(self.jwt_config),
            application_config: Arc::new(application_config),
            viewers: Arc::new(DashMap::new()),
            next_viewer_id: Arc::new(AtomicU64::new(0)),
        };

        tokio::spawn(ws::broadcast_listener(self.pub_sub, state.viewers.clone()));

        let app = make_app(state.clone(), request_body_limit as usize);

        let listener = tokio::net::TcpListener::bind((address, port))
            .await
            .map_err(AxumApiError::Bind)?;
        info!(address:?, port; "listening to TCP connections");

        let sigterm = signal(SignalKind::terminate()).map_err(AxumApiError::Signal)?;

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal(sigterm, state.viewers))
            .await
            .map_err(AxumApiError::Serve)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub address: IpAddr,
    pub port: u16,
    #[serde(default = "default_request_body_limit")]
    pub request_body_limit: u64,
}

fn default_request_body_limit() -> u64 {
    2 * 1024 * 1024
}

#[derive(Debug, Error)]
pub enum AxumApiError {
    #[error("cannot bind tcp listener")]
    Bind(#[source] io::Error),

    #[error("cannot install SIGTERM handler")]
    Signal(#[source] io::Error),

    #[error("cannot serve API")]
    Serve(#[source] io::Error),
}

fn make_app<S, Q, P>(state: AppState<S, Q, P>, request_body_limit: usize) -> Router
where
    S: Storage,
    Q: Queue,
    P: PubSub,
{
    Router::new()
        .route("/hello", axum::routing::post(hello::hello))
        .route("/ingest", axum::routing::post(ingest::ingest))
        .route("/worlds", get(projections::list_worlds))
        .route("/worlds/{world_id}", get(projections::get_world))
        .route("/worlds/{world_id}/{district_id}", get(projections::get_district))
        .route("/ws", get(ws::ws_upgrade))
        .route("/csv/dump", get(csv_dump::dump))
        .route("/ready", get(ready::<S, Q, P>))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(RequestBodyLimitLayer::new(request_body_limit))
                .layer(CorsLayer::permissive()),
        )
}

/// Lightweight readiness probe: a transaction checkout, rolled back on drop, the
/// cheapest round-trip `Storage` exposes.
async fn ready<S, Q, P>(State(state): State<AppState<S, Q, P>>) -> impl IntoResponse
where
    S: Storage,
    Q: Queue,
    P: PubSub,
{
    match state.storage.create_tx().await {
        Ok(_tx) => StatusCode::OK.into_response(),
        Err(error) => {
            warn!(error:?; "readiness probe failed");
            (StatusCode::SERVICE_UNAVAILABLE, "database not ready").into_response()
        }
    }
}

/// spec.md §4.5 step 5: on process shutdown, close every attached viewer socket with a
/// service-restart close code.
async fn shutdown_signal(mut sigterm: Signal, viewers: Arc<DashMap<u64, ViewerSender>>) {
    sigterm.recv().await;
    warn!("SIGTERM received, closing viewer sockets");

    for viewer in viewers.iter() {
        let _ = viewer.value().send(axum::extract::ws::Message::Close(Some(
            axum::extract::ws::CloseFrame { code: 1012, reason: "service restart".into() },
        )));
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub message: String,
}

/// Local wrapper over the spec.md §7 error taxonomy so `IntoResponse` can be implemented
/// here without violating the orphan rule (`CoreError` lives in `plotsweep-common`,
/// `IntoResponse` in `axum`; neither is local to this crate).
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("input validation failed: {0}")]
    InputValidation(String),

    #[error("authentication failed")]
    AuthFailure,

    #[error("not found")]
    NotFound,

    #[error("store failure")]
    StoreFailure(#[source] anyhow::Error),
}

impl ApiError {
    pub fn store_failure(error: impl Into<anyhow::Error>) -> Self {
        Self::StoreFailure(error.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::InputValidation(message) => (StatusCode::BAD_REQUEST, message.clone()),
            ApiError::AuthFailure => (StatusCode::UNAUTHORIZED, "authentication failed".to_string()),
            ApiError::NotFound => (StatusCode::NOT_FOUND, "not found".to_string()),
            ApiError::StoreFailure(error) => {
                error!(error:%; "store failure handling request");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal error".to_string())
            }
        };

        (status, axum::Json(ErrorBody { message })).into_response()
    }
}
