use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use reqwest::Client;
use serde_json::{json, Value};
use server::app::{self, AppState};
use server::auth::jwt;
use server::config::Config;
use server::store::MemoryStore;
use tokio::net::TcpStream;
use tokio_tungstenite::{tungstenite::Message, MaybeTlsStream, WebSocketStream};

pub type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Server running in-process on an ephemeral port, backed by the memory store.
pub struct TestServer {
    pub addr: SocketAddr,
    pub config: Config,
    pub state: AppState,
}

pub async fn spawn_server() -> TestServer {
    let config = Config::local();
    let store = Arc::new(MemoryStore::new());
    let state = AppState::new(config.clone(), store.clone(), store, None);
    let app = app::router(&state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind test listener");
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestServer {
        addr,
        config,
        state,
    }
}

impl TestServer {
    /// Build a URL for an API endpoint.
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn token(&self, user_id: &str) -> String {
        jwt::create_token(user_id, &self.config.jwt_secret, 1).unwrap()
    }

    /// Create a game as `user_id` and return its public key.
    pub async fn create_game(&self, client: &Client, user_id: &str, creator_black: bool) -> String {
        let resp = client
            .post(self.url("/api/games"))
            .bearer_auth(self.token(user_id))
            .json(&json!({ "board_size": 19, "komi": 6.5, "is_creator_black": creator_black }))
            .send()
            .await
            .expect("Failed to send create request");
        assert_eq!(resp.status(), 200, "Create should succeed");
        let body: Value = resp.json().await.unwrap();
        body["public_key"].as_str().unwrap().to_string()
    }

    pub async fn join_game(&self, client: &Client, user_id: &str, public_key: &str) -> reqwest::Response {
        client
            .post(self.url("/api/games/join"))
            .bearer_auth(self.token(user_id))
            .json(&json!({ "public_key": public_key }))
            .send()
            .await
            .expect("Failed to send join request")
    }

    pub async fn leave_game(&self, client: &Client, user_id: &str, public_key: &str) -> reqwest::Response {
        client
            .post(self.url("/api/games/leave"))
            .bearer_auth(self.token(user_id))
            .json(&json!({ "public_key": public_key }))
            .send()
            .await
            .expect("Failed to send leave request")
    }

    /// Public view of a game.
    pub async fn lookup(&self, client: &Client, public_key: &str) -> Value {
        client
            .get(self.url(&format!("/api/games/{public_key}")))
            .send()
            .await
            .expect("Failed to send lookup request")
            .json()
            .await
            .unwrap()
    }

    pub async fn connect(&self, key: &str, user_id: &str) -> Result<Socket, tokio_tungstenite::tungstenite::Error> {
        let url = format!("ws://{}/ws/games/{}?token={}", self.addr, key, self.token(user_id));
        tokio_tungstenite::connect_async(url).await.map(|(socket, _)| socket)
    }

    /// Connect and wait until the seat is bound and the read loop is running.
    pub async fn connect_ready(&self, key: &str, user_id: &str) -> Socket {
        let mut socket = self.connect(key, user_id).await.expect("Failed to connect");
        ready(&mut socket).await;
        socket
    }
}

/// Build a reqwest client for tests.
pub fn client() -> Client {
    Client::new()
}

pub async fn send_move(socket: &mut Socket, color: &str, coordinates: &str) {
    let frame = json!({ "color": color, "coordinates": coordinates }).to_string();
    socket.send(Message::Text(frame.into())).await.unwrap();
}

/// Next text frame, or `None` when the socket closed first.
pub async fn next_text(socket: &mut Socket) -> Option<String> {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(5), socket.next())
            .await
            .expect("Timed out waiting for a frame");
        match msg {
            Some(Ok(Message::Text(text))) => return Some(text.as_str().to_string()),
            Some(Ok(Message::Close(_))) | Some(Err(_)) | None => return None,
            Some(Ok(_)) => continue,
        }
    }
}

/// Round-trip a malformed frame; the rejection proves the connection is live.
pub async fn ready(socket: &mut Socket) {
    socket.send(Message::Text("{}".into())).await.unwrap();
    let reply = next_text(socket).await.expect("Socket closed while waiting for readiness");
    assert!(reply.starts_with("move rejected"), "unexpected reply: {reply}");
}
