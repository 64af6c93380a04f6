use futures_util::{SinkExt, StreamExt};
use opcua_sample::ws_bridge::{router, ConnectionState, ConnectionStatus, MonitorHub};
use serde_json::Value;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn serve(hub: MonitorHub) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router(hub)).await.unwrap();
    });
    addr
}

async fn connect(addr: SocketAddr) -> Socket {
    let (socket, _) = connect_async(format!("ws://{addr}/ws")).await.unwrap();
    socket
}

async fn next_event(socket: &mut Socket) -> Value {
    loop {
        let message = tokio::time::timeout(Duration::from_secs(5), socket.next())
            .await
            .expect("event within timeout")
            .expect("socket open")
            .unwrap();
        if let Message::Text(text) = message {
            return serde_json::from_str(&text).unwrap();
        }
    }
}

/// Round-trips a status request so the server side is known to be subscribed.
async fn request_states(socket: &mut Socket) -> Value {
    socket
        .send(Message::Text("request-connection-status".to_string()))
        .await
        .unwrap();
    let reply = next_event(socket).await;
    assert_eq!(reply["event"], "all-connection-status");
    reply["data"].clone()
}

#[tokio::test]
async fn replies_with_states_keyed_by_port() {
    let hub = MonitorHub::new(16);
    hub.publish_state(ConnectionState::new(4841, ConnectionStatus::Connected, "Connected to Server 2"));
    let addr = serve(hub.clone()).await;

    let mut socket = connect(addr).await;
    let states = request_states(&mut socket).await;

    assert_eq!(states["4841"]["status"], "connected");
    assert_eq!(states["4841"]["message"], "Connected to Server 2");
    assert_eq!(states["4841"]["port"], 4841);
}

#[tokio::test]
async fn forwards_published_states() {
    let hub = MonitorHub::new(16);
    let addr = serve(hub.clone()).await;

    let mut socket = connect(addr).await;
    request_states(&mut socket).await;

    hub.publish_state(ConnectionState::new(4840, ConnectionStatus::Error, "Failed to connect to Server 1"));

    let event = next_event(&mut socket).await;
    assert_eq!(event["event"], "server-connection-status");
    assert_eq!(event["data"]["status"], "error");
    assert_eq!(event["data"]["port"], 4840);
}

#[tokio::test]
async fn lagging_socket_keeps_receiving() {
    let hub = MonitorHub::new(1);
    let addr = serve(hub.clone()).await;

    let mut socket = connect(addr).await;
    request_states(&mut socket).await;

    // Current-thread runtime: the socket task cannot run until we yield, so it
    // falls behind by all but the last event.
    for i in 0..10u16 {
        hub.publish_state(ConnectionState::new(5000 + i, ConnectionStatus::Connecting, format!("state {i}")));
    }

    let event = next_event(&mut socket).await;
    assert_eq!(event["event"], "server-connection-status");
    assert_eq!(event["data"]["message"], "state 9");

    hub.publish_state(ConnectionState::new(4840, ConnectionStatus::Connected, "back"));
    let event = next_event(&mut socket).await;
    assert_eq!(event["data"]["message"], "back");
}
