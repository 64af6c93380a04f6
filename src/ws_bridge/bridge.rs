use axum::extract::ws::Message;
use axum::{
    extract::{ws::{WebSocket, WebSocketUpgrade}, State},
    response::Response,
    routing::get,
    Json, Router,
};
use std::collections::BTreeMap;
use std::net::SocketAddr;
use tokio::sync::broadcast::error::RecvError;
use tower_http::cors::CorsLayer;

use super::events::{ClientRequest, ConnectionState, MonitorEvent};
use super::hub::MonitorHub;
use crate::error::Result;

pub const DEFAULT_WS_PORT: u16 = 3000;

pub fn router(hub: MonitorHub) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .route("/api/status", get(status_handler))
        .layer(CorsLayer::permissive())
        .with_state(hub)
}

pub async fn start_ws_server(hub: MonitorHub, port: u16) -> Result<()> {
    let app = router(hub);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("WebSocket server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn status_handler(State(hub): State<MonitorHub>) -> Json<BTreeMap<u16, ConnectionState>> {
    Json(hub.connection_states())
}

async fn ws_handler(ws: WebSocketUpgrade, State(hub): State<MonitorHub>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, hub))
}

async fn handle_socket(mut socket: WebSocket, hub: MonitorHub) {
    tracing::info!("New WebSocket connection");

    let mut rx = hub.subscribe();

    loop {
        tokio::select! {
            event = rx.recv() => {
                match event {
                    Ok(event) => {
                        if send_event(&mut socket, &event).await.is_err() {
                            tracing::info!("Client disconnected");
                            break;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "WebSocket client is lagging, dropped events");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
            result = socket.recv() => {
                match result {
                    Some(Ok(Message::Text(text))) => {
                        if ClientRequest::parse(&text) == Some(ClientRequest::ConnectionStatus) {
                            let states = MonitorEvent::AllConnectionStatus(hub.connection_states());
                            if send_event(&mut socket, &states).await.is_err() {
                                tracing::info!("Client disconnected");
                                break;
                            }
                        } else {
                            tracing::debug!("Ignoring WebSocket message: {}", text);
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        tracing::info!("WebSocket connection closed");
                        break;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::error!("WebSocket error: {}", e);
                        break;
                    }
                }
            }
        }
    }
}

async fn send_event(socket: &mut WebSocket, event: &MonitorEvent) -> std::result::Result<(), axum::Error> {
    match serde_json::to_string(event) {
        Ok(json) => socket.send(Message::Text(json)).await,
        Err(e) => {
            tracing::error!("Failed to encode event: {}", e);
            Ok(())
        }
    }
}
