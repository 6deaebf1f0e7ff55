mod types;

use crate::config::Config;
use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use mdns_sd::{ServiceDaemon, ServiceInfo};
use paperboy_core::{
    local_address, CallbackDescriptor, HttpPeerClient, PaperboyError, PeerClient, Result,
    TOKEN_HEADER,
};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use types::{ErrorResponse, PushResponse, SubscribeResponse};
use uuid::Uuid;

/// One fabric node: accepts pushes and subscription registrations from
/// connectors and forwards pushed messages to the topic's sole subscriber.
pub(crate) struct ServerState {
    pub(crate) config: Config,
    pub(crate) instance_id: String,
    pub(crate) subscribers: RwLock<HashMap<String, CallbackDescriptor>>,
    pub(crate) client: Arc<dyn PeerClient>,
}

pub(crate) fn response_error(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
        .into_response()
}

fn check_token(state: &ServerState, headers: &HeaderMap) -> std::result::Result<(), Response> {
    let provided = headers
        .get(TOKEN_HEADER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("");

    if provided != state.config.fabric.token {
        return Err(response_error(
            StatusCode::UNAUTHORIZED,
            "invalid or missing fabric token",
        ));
    }

    Ok(())
}

async fn push_message(
    State(state): State<Arc<ServerState>>,
    Path(topic): Path<String>,
    headers: HeaderMap,
    Json(message): Json<Value>,
) -> impl IntoResponse {
    if let Err(rejection) = check_token(&state, &headers) {
        return rejection;
    }

    let subscriber = state
        .subscribers
        .read()
        .expect("subscribers lock poisoned")
        .get(&topic)
        .cloned();

    let Some(callback) = subscriber else {
        // Topics with no subscriber swallow messages; a registration may
        // simply live on another node.
        tracing::debug!(topic = %topic, "no subscriber registered, dropping message");
        return (
            StatusCode::OK,
            Json(PushResponse {
                topic,
                delivered: false,
            }),
        )
            .into_response();
    };

    match state.client.deliver(&callback, &message).await {
        Ok(()) => (
            StatusCode::OK,
            Json(PushResponse {
                topic,
                delivered: true,
            }),
        )
            .into_response(),
        Err(error) => {
            tracing::warn!(
                topic = %topic,
                callback = %callback.url(),
                error = %error,
                "forwarding to subscriber failed"
            );
            response_error(StatusCode::BAD_GATEWAY, error.to_string())
        }
    }
}

async fn subscribe_topic(
    State(state): State<Arc<ServerState>>,
    Path(topic): Path<String>,
    headers: HeaderMap,
    Json(callback): Json<CallbackDescriptor>,
) -> impl IntoResponse {
    if let Err(rejection) = check_token(&state, &headers) {
        return rejection;
    }

    tracing::info!(topic = %topic, callback = %callback.url(), "subscriber registered");

    // Last writer wins: one subscriber per topic, newest registration
    // replaces any previous one.
    state
        .subscribers
        .write()
        .expect("subscribers lock poisoned")
        .insert(topic.clone(), callback);

    (
        StatusCode::OK,
        Json(SubscribeResponse {
            topic,
            subscribed: true,
        }),
    )
        .into_response()
}

async fn instance(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
) -> impl IntoResponse {
    if let Err(rejection) = check_token(&state, &headers) {
        return rejection;
    }

    (StatusCode::OK, state.instance_id.clone()).into_response()
}

pub(crate) fn build_router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route("/pushMessage/:topic", post(push_message))
        .route("/subscribeTopic/:topic", post(subscribe_topic))
        .route("/instance", get(instance))
        .with_state(state)
}

fn advertise(config: &Config, instance_id: &str) -> Result<ServiceDaemon> {
    let daemon = ServiceDaemon::new()
        .map_err(|error| PaperboyError::Discovery(format!("mdns daemon failed: {}", error)))?;

    let host = match &config.node.advertise_host {
        Some(host) => host.clone(),
        None => local_address()?.to_string(),
    };
    let port = config.node.port()?;

    let service = ServiceInfo::new(
        &config.fabric.service_type,
        instance_id,
        &format!("{}.local.", instance_id),
        host.as_str(),
        port,
        None::<HashMap<String, String>>,
    )
    .map_err(|error| PaperboyError::Discovery(format!("mdns service info failed: {}", error)))?;

    daemon
        .register(service)
        .map_err(|error| PaperboyError::Discovery(format!("mdns register failed: {}", error)))?;

    tracing::info!(host = %host, port = port, "advertising fabric node over mDNS");
    Ok(daemon)
}

pub async fn run_server(config: Config) -> Result<()> {
    // A fresh id per process; connectors detect restarts by probing it.
    let instance_id = Uuid::new_v4().to_string();

    let client = HttpPeerClient::new(
        config.fabric.token.clone(),
        Duration::from_secs(config.fabric.forward_timeout_secs),
    )?;

    let state = Arc::new(ServerState {
        instance_id: instance_id.clone(),
        subscribers: RwLock::new(HashMap::new()),
        client: Arc::new(client),
        config,
    });

    let daemon = advertise(&state.config, &instance_id)?;

    let listener = tokio::net::TcpListener::bind(&state.config.node.bind_addr).await?;
    tracing::info!(
        addr = %state.config.node.bind_addr,
        instance_id = %instance_id,
        "fabric node listening"
    );

    let app = build_router(Arc::clone(&state));
    axum::serve(listener, app).await?;

    let _ = daemon.shutdown();
    Ok(())
}
