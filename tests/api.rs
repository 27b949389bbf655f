//! Integration tests against a live server.
//!
//! Spins up the HTTP server on an OS-assigned port with the built-in random
//! engine and drives whole games through the REST API.

use serde_json::{Value, json};
use tokio::net::TcpListener;

use chess_rules::api::router::create_router;
use chess_rules::api::state::AppState;
use chess_rules::config::AppConfig;

/// Helper: start the server on an OS-assigned port, return its base URL.
async fn start_server() -> String {
    let state = AppState::new(AppConfig::default());
    let app = create_router(state);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://127.0.0.1:{}", addr.port())
}

/// Helper: create a game via REST, return the response body.
async fn create_game(client: &reqwest::Client, base: &str, body: Value) -> Value {
    let resp = client
        .post(format!("{base}/api/games"))
        .json(&body)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);
    resp.json().await.unwrap()
}

async fn post_move(
    client: &reqwest::Client,
    base: &str,
    id: &str,
    body: Value,
) -> (u16, Value) {
    let resp = client
        .post(format!("{base}/api/games/{id}/moves"))
        .json(&body)
        .send()
        .await
        .unwrap();
    let status = resp.status().as_u16();
    (status, resp.json().await.unwrap())
}

#[tokio::test]
async fn health_endpoint() {
    let base = start_server().await;
    let body: Value = reqwest::get(format!("{base}/health"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["engine"], "RandomAi");
}

#[tokio::test]
async fn fools_mate_ends_the_game() {
    let base = start_server().await;
    let client = reqwest::Client::new();

    // Black to move, one move from mate: Qd8-h4.
    let game = create_game(
        &client,
        &base,
        json!({
            "playerColor": "black",
            "fen": "rnbqkbnr/pppp1ppp/8/4p3/6P1/5P2/PPPPP2P/RNBQKBNR b KQkq g3 0 2"
        }),
    )
    .await;
    assert!(game["events"].as_array().unwrap().is_empty());
    let id = game["id"].as_str().unwrap();

    let (status, body) = post_move(&client, &base, id, json!({"from": "d8", "to": "h4"})).await;
    assert_eq!(status, 200);
    let events = body["events"].as_array().unwrap();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0]["type"], "moveApplied");
    assert_eq!(events[1]["type"], "gameEnded");
    assert_eq!(events[1]["outcome"], "checkmate");
    assert_eq!(events[1]["loser"], "white");
    assert_eq!(body["game"]["status"], "checkmate");
    assert_eq!(body["game"]["check"], true);

    // Nothing more can be played.
    let (status, body) = post_move(&client, &base, id, json!({"from": "e8", "to": "e7"})).await;
    assert_eq!(status, 400);
    assert_eq!(body["error"]["code"], "GAME_OVER");
}

#[tokio::test]
async fn promotion_requires_a_piece() {
    let base = start_server().await;
    let client = reqwest::Client::new();
    let game = create_game(&client, &base, json!({"fen": "8/P6k/8/8/8/8/8/K7 w - - 0 1"})).await;
    let id = game["id"].as_str().unwrap();

    let (status, body) = post_move(&client, &base, id, json!({"from": "a7", "to": "a8"})).await;
    assert_eq!(status, 400);
    assert_eq!(body["error"]["code"], "INVALID_PROMOTION");

    let (status, body) = post_move(
        &client,
        &base,
        id,
        json!({"from": "a7", "to": "a8", "promotion": "knight"}),
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(body["events"][0]["promotion"], "knight");
    let board = &body["game"]["board"];
    assert_eq!(board[0][0], "N");
}

#[tokio::test]
async fn castling_moves_the_rook() {
    let base = start_server().await;
    let client = reqwest::Client::new();
    let game = create_game(
        &client,
        &base,
        json!({"fen": "r3k2r/pppppppp/8/8/8/8/PPPPPPPP/R3K2R w KQkq - 0 1"}),
    )
    .await;
    let id = game["id"].as_str().unwrap();

    let (status, body) = post_move(&client, &base, id, json!({"from": "e1", "to": "g1"})).await;
    assert_eq!(status, 200);
    let castle = &body["events"][0];
    assert_eq!(castle["castleRook"]["from"], "h1");
    assert_eq!(castle["castleRook"]["to"], "f1");
    let board = &body["game"]["board"];
    assert_eq!(board[7][6], "K");
    assert_eq!(board[7][5], "R");
    assert!(board[7][7].is_null());
}

#[tokio::test]
async fn random_games_stay_consistent() {
    let base = start_server().await;
    let client = reqwest::Client::new();
    let game = create_game(&client, &base, json!({"difficulty": 1})).await;
    let id = game["id"].as_str().unwrap();

    // Play whatever legal move comes first for a number of turns.
    for _ in 0..20 {
        let legal: Value = client
            .get(format!("{base}/api/games/{id}/legal-moves"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        let moves = legal["moves"].as_array().unwrap();
        if moves.is_empty() {
            break;
        }
        let mv = &moves[0];
        let mut body = json!({"from": mv["from"], "to": mv["to"]});
        if let Some(p) = mv.get("promotion") {
            body["promotion"] = p.clone();
        }
        let (status, resp) = post_move(&client, &base, id, body).await;
        assert_eq!(status, 200, "{resp}");
        if resp["game"]["status"] == "checkmate" || resp["game"]["status"] == "stalemate" {
            break;
        }
        assert_eq!(resp["game"]["currentPlayer"], "white");
    }

    let listed: Value = client
        .get(format!("{base}/api/games"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(listed["total"], 1);
}

#[tokio::test]
async fn get_move_endpoint() {
    let base = start_server().await;
    let client = reqwest::Client::new();
    let resp = client
        .post(format!("{base}/get_move/"))
        .json(&json!({
            "difficulty": 5,
            "fen": "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq e3 0 1"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    let nextmove = body["nextmove"].as_str().unwrap();
    // Black's reply starts on one of black's first two ranks.
    assert!(nextmove.ends_with('5') || nextmove.ends_with('6'), "{nextmove}");

    let resp = client
        .post(format!("{base}/get_move"))
        .json(&json!({"difficulty": 3, "fen": "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP w KQkq - 0 1"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
}
