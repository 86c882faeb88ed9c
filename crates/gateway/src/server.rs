use std::{future::Future, net::SocketAddr, sync::Arc};

use {
    anyhow::Context as _,
    axum::{
        Router,
        extract::{ConnectInfo, State, WebSocketUpgrade},
        response::{Html, IntoResponse, Json},
        routing::{get, post},
    },
    tower_http::{
        cors::{Any, CorsLayer},
        trace::TraceLayer,
    },
    tracing::info,
};

use crate::{routes, state::GatewayState, ws::handle_connection};

const INDEX_HTML: &str = include_str!("../assets/index.html");

// ── Server startup ───────────────────────────────────────────────────────────

/// Build the gateway router (shared between production startup and tests).
pub fn build_gateway_app(state: Arc<GatewayState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(index_handler))
        .route("/health", get(health_handler))
        .route("/ws", get(ws_upgrade_handler))
        .route("/send-message", post(routes::send_message))
        .route("/send-media", post(routes::send_media))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind `bind:port` and serve until `shutdown` resolves.
pub async fn start_gateway(
    bind: &str,
    port: u16,
    state: Arc<GatewayState>,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let app = build_gateway_app(state);
    let listener = tokio::net::TcpListener::bind((bind, port))
        .await
        .with_context(|| format!("failed to bind {bind}:{port}"))?;
    let addr = listener.local_addr()?;
    info!(%addr, "wagate gateway listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown)
    .await?;
    info!("wagate gateway stopped");
    Ok(())
}

// ── Handlers ─────────────────────────────────────────────────────────────────

async fn index_handler() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn health_handler(State(state): State<Arc<GatewayState>>) -> impl IntoResponse {
    let connection = state.connection().await;
    Json(serde_json::json!({
        "status": "ok",
        "version": state.version,
        "connection": connection.as_str(),
        "clients": state.ui_client_count(),
    }))
}

async fn ws_upgrade_handler(
    ws: WebSocketUpgrade,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    State(state): State<Arc<GatewayState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_connection(socket, state, addr))
}
