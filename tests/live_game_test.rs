//! End-to-end tests for the lobby and the live play socket.
//!
//! Each test boots its own in-process server on an ephemeral port.

mod common;

use common::{next_text, send_move, spawn_server};
use futures::SinkExt;
use serde_json::{json, Value};
use tokio_tungstenite::tungstenite::{self, Message};

fn upgrade_status(result: Result<common::Socket, tungstenite::Error>) -> u16 {
    match result {
        Err(tungstenite::Error::Http(resp)) => resp.status().as_u16(),
        Err(e) => panic!("unexpected error: {e}"),
        Ok(_) => panic!("upgrade should have been refused"),
    }
}

// ---------------------------------------------------------------------------
// Lobby
// ---------------------------------------------------------------------------

/// Create → join → lookup.
#[tokio::test]
async fn create_join_and_lookup() {
    let server = spawn_server().await;
    let client = common::client();

    let public_key = server.create_game(&client, "u-white", false).await;
    assert_eq!(public_key.len(), 5);

    // ── Join ────────────────────────────────────────────────────────
    let resp = server.join_game(&client, "u-black", &public_key).await;
    assert_eq!(resp.status(), 200, "Join should succeed");
    let body: Value = resp.json().await.unwrap();
    let text = body["text"].as_str().unwrap();
    assert!(text.starts_with("(;FF[4]GM[1]SZ[19]PB[u-black]PW[u-white]DT["));
    assert!(text.ends_with("RE[]KM[6.5]RU[Chinese]C[Game 1 x 1])"));

    // ── Lookup ──────────────────────────────────────────────────────
    let resp = client
        .get(server.url(&format!("/api/games/{public_key}")))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let view: Value = resp.json().await.unwrap();
    assert_eq!(view["status"], "in_progress");
    assert_eq!(view["black_id"], "u-black");
    assert_eq!(view["log"], text);
    assert!(view["result"].is_null());
    assert!(view.get("secret_key").is_none(), "Secret key must never leak");

    // A third player cannot take a seat.
    let resp = server.join_game(&client, "u-late", &public_key).await;
    assert_eq!(resp.status(), 409);
}

#[tokio::test]
async fn create_validation() {
    let server = spawn_server().await;
    let client = common::client();

    let resp = client
        .post(server.url("/api/games"))
        .bearer_auth(server.token("alice"))
        .json(&json!({ "board_size": 19, "is_creator_black": true }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400, "Missing komi should be rejected");

    let resp = client
        .post(server.url("/api/games"))
        .json(&json!({ "board_size": 19, "komi": 6.5 }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401, "Anonymous create should be rejected");

    server.create_game(&client, "alice", true).await;
    let resp = client
        .post(server.url("/api/games"))
        .bearer_auth(server.token("alice"))
        .json(&json!({ "board_size": 9, "komi": 7.5 }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 409, "One active game per user");
}

// ---------------------------------------------------------------------------
// Live play
// ---------------------------------------------------------------------------

#[tokio::test]
async fn moves_reach_the_opponent_in_order() {
    let server = spawn_server().await;
    let client = common::client();
    let key = server.create_game(&client, "alice", false).await;
    server.join_game(&client, "bob", &key).await;

    let mut white = server.connect_ready(&key, "alice").await;
    let mut black = server.connect_ready(&key, "bob").await;

    send_move(&mut black, "B", "dp").await;
    let frame: Value = serde_json::from_str(&next_text(&mut white).await.unwrap()).unwrap();
    assert_eq!(frame["move"], json!({ "color": "B", "coordinates": "dp" }));
    assert!(frame["log"].as_str().unwrap().ends_with(";B[dp])"));

    send_move(&mut white, "white", "pd").await;
    let frame: Value = serde_json::from_str(&next_text(&mut black).await.unwrap()).unwrap();
    assert_eq!(frame["move"]["coordinates"], "pd");

    send_move(&mut black, "b", "dd").await;
    let frame: Value = serde_json::from_str(&next_text(&mut white).await.unwrap()).unwrap();
    assert_eq!(frame["move"]["coordinates"], "dd");
    assert!(frame["log"].as_str().unwrap().ends_with(";B[dp];W[pd];B[dd])"));

    let view: Value = client
        .get(server.url(&format!("/api/games/{key}")))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(view["log"], frame["log"]);
}

#[tokio::test]
async fn mover_is_told_when_opponent_is_offline() {
    let server = spawn_server().await;
    let client = common::client();
    let key = server.create_game(&client, "alice", true).await;
    server.join_game(&client, "bob", &key).await;

    let mut black = server.connect_ready(&key, "alice").await;
    send_move(&mut black, "B", "qq").await;
    assert_eq!(next_text(&mut black).await.unwrap(), "opponent is not connected");

    // The move was still recorded.
    let view: Value = client
        .get(server.url(&format!("/api/games/{key}")))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(view["log"].as_str().unwrap().ends_with(";B[qq])"));
}

#[tokio::test]
async fn wrong_color_is_rejected_and_connection_stays_open() {
    let server = spawn_server().await;
    let client = common::client();
    let key = server.create_game(&client, "alice", true).await;
    server.join_game(&client, "bob", &key).await;

    let mut black = server.connect_ready(&key, "alice").await;
    send_move(&mut black, "W", "aa").await;
    assert!(next_text(&mut black).await.unwrap().starts_with("move rejected"));

    send_move(&mut black, "B", "aa").await;
    assert_eq!(next_text(&mut black).await.unwrap(), "opponent is not connected");
}

#[tokio::test]
async fn reconnect_displaces_previous_connection() {
    let server = spawn_server().await;
    let client = common::client();
    let key = server.create_game(&client, "alice", false).await;
    server.join_game(&client, "bob", &key).await;

    let mut first = server.connect_ready(&key, "bob").await;
    let mut second = server.connect_ready(&key, "bob").await;

    assert_eq!(
        next_text(&mut first).await.unwrap(),
        "you have been disconnected by a new connection"
    );
    assert!(next_text(&mut first).await.is_none(), "Displaced socket should close");

    // The displaced connection's cleanup must not unseat the new one.
    let mut white = server.connect_ready(&key, "alice").await;
    send_move(&mut white, "W", "cc").await;
    let frame: Value = serde_json::from_str(&next_text(&mut second).await.unwrap()).unwrap();
    assert_eq!(frame["move"]["coordinates"], "cc");
}

#[tokio::test]
async fn opponent_is_told_about_disconnect() {
    let server = spawn_server().await;
    let client = common::client();
    let key = server.create_game(&client, "alice", false).await;
    server.join_game(&client, "bob", &key).await;

    let mut white = server.connect_ready(&key, "alice").await;
    let mut black = server.connect_ready(&key, "bob").await;
    black.send(Message::Close(None)).await.unwrap();

    assert_eq!(next_text(&mut white).await.unwrap(), "opponent disconnected");
}

#[tokio::test]
async fn moves_wait_for_the_opponent_to_join() {
    let server = spawn_server().await;
    let client = common::client();
    let key = server.create_game(&client, "alice", true).await;

    let mut black = server.connect_ready(&key, "alice").await;
    send_move(&mut black, "B", "dp").await;
    assert_eq!(
        next_text(&mut black).await.unwrap(),
        "move rejected: game has not started yet"
    );

    let resp = server.join_game(&client, "bob", &key).await;
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    let initial = body["text"].as_str().unwrap().to_string();

    send_move(&mut black, "B", "dp").await;
    assert_eq!(next_text(&mut black).await.unwrap(), "opponent is not connected");

    let view = server.lookup(&client, &key).await;
    assert_eq!(
        view["log"].as_str().unwrap(),
        format!("{};B[dp])", initial.trim_end_matches(')'))
    );
}

#[tokio::test]
async fn leaving_a_started_game_ends_it() {
    let server = spawn_server().await;
    let client = common::client();
    let key = server.create_game(&client, "alice", true).await;
    server.join_game(&client, "bob", &key).await;

    let mut black = server.connect_ready(&key, "alice").await;
    send_move(&mut black, "B", "dp").await;
    assert_eq!(next_text(&mut black).await.unwrap(), "opponent is not connected");

    // ── Leave ───────────────────────────────────────────────────────
    let resp = server.leave_game(&client, "bob", &key).await;
    assert_eq!(resp.status(), 200, "Leave should succeed");
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "completed");
    assert_eq!(next_text(&mut black).await.unwrap(), "opponent left the game");

    send_move(&mut black, "B", "dd").await;
    assert_eq!(
        next_text(&mut black).await.unwrap(),
        "move rejected: game is already completed"
    );

    let view = server.lookup(&client, &key).await;
    assert_eq!(view["status"], "completed");
    assert_eq!(view["result"], "B+R");
    assert!(view["log"].as_str().unwrap().ends_with(";B[dp])"));

    // Nobody may sit down or leave again.
    assert_eq!(upgrade_status(server.connect(&key, "alice").await), 409);
    assert_eq!(server.leave_game(&client, "alice", &key).await.status(), 409);
}

#[tokio::test]
async fn leaving_while_waiting_frees_the_seat() {
    let server = spawn_server().await;
    let client = common::client();
    let key = server.create_game(&client, "alice", false).await;

    let resp = server.leave_game(&client, "alice", &key).await;
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "waiting_for_opponent");

    let view = server.lookup(&client, &key).await;
    assert!(view["white_id"].is_null());
    assert_eq!(server.leave_game(&client, "alice", &key).await.status(), 403);

    // Free to start something else.
    server.create_game(&client, "alice", true).await;
}

// ---------------------------------------------------------------------------
// Upgrade rejections
// ---------------------------------------------------------------------------

#[tokio::test]
async fn upgrade_is_refused_for_strangers_and_unknown_games() {
    let server = spawn_server().await;
    let client = common::client();
    let key = server.create_game(&client, "alice", true).await;
    server.join_game(&client, "bob", &key).await;

    assert_eq!(upgrade_status(server.connect(&key, "mallory").await), 403);
    assert_eq!(upgrade_status(server.connect("00000x", "alice").await), 404);

    let url = format!("ws://{}/ws/games/{}", server.addr, key);
    assert_eq!(
        upgrade_status(tokio_tungstenite::connect_async(url).await.map(|(s, _)| s)),
        401
    );

    // Only one live session exists for the game, whichever key was used.
    let _socket = server.connect_ready(&key, "alice").await;
    assert_eq!(server.state.registry.len(), 1);
}
