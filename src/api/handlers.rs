use std::sync::Arc;

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::ai::AiEngine;
use crate::engine::board::Position;
use crate::engine::game::{Game, status_of};
use crate::engine::types::{ChessError, Color};

use super::errors::{ApiError, ErrorDetail};
use super::models::*;
use super::state::{GameHandle, SharedState};

async fn find_game(state: &SharedState, id: &str) -> Result<GameHandle, ApiError> {
    state
        .game(id)
        .await
        .ok_or_else(|| ApiError::GameNotFound(id.to_string()))
}

// =========================================================================
// Health
// =========================================================================

/// GET /health
pub async fn health(State(state): State<SharedState>) -> Json<HealthResponse> {
    let uptime = state.start_time.elapsed().as_secs();
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        engine: state.oracle.name().to_string(),
        games: state.games.read().await.len(),
        uptime,
    })
}

// =========================================================================
// Create Game
// =========================================================================

/// POST /api/games
///
/// When the player takes black the engine opens immediately. If that query
/// fails the game is still created and the error is reported alongside it.
pub async fn create_game(
    State(state): State<SharedState>,
    Json(input): Json<CreateGameRequest>,
) -> Result<(StatusCode, Json<CreateGameResponse>), ApiError> {
    let player_color = match input.player_color.as_deref() {
        Some(s) => parse_color(s)?,
        None => Color::White,
    };
    let difficulty = match &input.difficulty {
        Some(d) => d.resolve()?,
        None => state.config.default_difficulty,
    };

    let mut game = match input.fen.as_deref() {
        Some(fen) => Game::from_fen(fen, player_color, difficulty)?,
        None => Game::new(player_color, difficulty),
    };
    info!(game_id = %game.id, %player_color, %difficulty, "game created");

    let (events, engine_error) = match game.begin(&state.oracle).await {
        Ok(events) => (events, None),
        Err(e) => (Vec::new(), Some(ErrorDetail::from_chess(&e))),
    };

    let response = CreateGameResponse {
        game: game_to_response(&game),
        events: events_to_response(&events),
        engine_error,
    };
    let id = game.id.clone();
    state
        .games
        .write()
        .await
        .insert(id, Arc::new(Mutex::new(game)));

    Ok((StatusCode::CREATED, Json(response)))
}

// =========================================================================
// List Games
// =========================================================================

/// GET /api/games
pub async fn list_games(
    State(state): State<SharedState>,
    Query(query): Query<ListGamesQuery>,
) -> Json<ListGamesResponse> {
    let handles: Vec<GameHandle> = state.games.read().await.values().cloned().collect();

    let limit = query.limit.unwrap_or(10).min(100);
    let offset = query.offset.unwrap_or(0);
    let status_filter = query.status.map(|s| s.to_lowercase());

    let mut games = Vec::with_capacity(handles.len());
    for handle in handles {
        let game = handle.lock().await;
        if status_filter
            .as_deref()
            .is_none_or(|sf| game.status().as_str() == sf)
        {
            games.push(game_to_response(&game));
        }
    }

    let total = games.len();

    // Newest first for consistent ordering.
    games.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    let page = games.into_iter().skip(offset).take(limit).collect();

    Json(ListGamesResponse {
        games: page,
        total,
        limit,
        offset,
    })
}

// =========================================================================
// Get Game
// =========================================================================

/// GET /api/games/{id}
pub async fn get_game(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<GameResponse>, ApiError> {
    let handle = find_game(&state, &id).await?;
    let game = handle.lock().await;
    Ok(Json(game_to_response(&game)))
}

// =========================================================================
// Delete Game
// =========================================================================

/// DELETE /api/games/{id}
pub async fn delete_game(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<DeleteResponse>, ApiError> {
    state
        .games
        .write()
        .await
        .remove(&id)
        .ok_or_else(|| ApiError::GameNotFound(id.clone()))?;
    info!(game_id = %id, "game deleted");
    Ok(Json(DeleteResponse {
        success: true,
        message: "Game deleted".to_string(),
    }))
}

// =========================================================================
// Make Move
// =========================================================================

/// POST /api/games/{id}/moves
///
/// Plays the player's move and then the engine's reply. A rejected player
/// move is an error response; a failed engine reply is not, since the
/// player's move stands.
pub async fn make_move(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Json(input): Json<MoveRequest>,
) -> Result<Json<MoveResponse>, ApiError> {
    let from = parse_square(&input.from)?;
    let to = parse_square(&input.to)?;
    let promotion = input.promotion.as_deref().map(parse_promotion).transpose()?;

    let handle = find_game(&state, &id).await?;
    let mut game = handle.lock().await;
    let turn = game.play_turn(from, to, promotion, &state.oracle).await?;

    Ok(Json(MoveResponse {
        game: game_to_response(&game),
        events: events_to_response(&turn.events),
        engine_error: turn.engine_error.as_ref().map(ErrorDetail::from_chess),
    }))
}

// =========================================================================
// Engine Move
// =========================================================================

/// POST /api/games/{id}/engine-move
///
/// Retry the engine's turn, typically after a failed reply.
pub async fn engine_move(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<MoveResponse>, ApiError> {
    let handle = find_game(&state, &id).await?;
    let mut game = handle.lock().await;
    let events = game.engine_move(&state.oracle).await?;

    Ok(Json(MoveResponse {
        game: game_to_response(&game),
        events: events_to_response(&events),
        engine_error: None,
    }))
}

// =========================================================================
// Legal Moves
// =========================================================================

/// GET /api/games/{id}/legal-moves
pub async fn legal_moves(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Query(query): Query<LegalMovesQuery>,
) -> Result<Json<LegalMovesResponse>, ApiError> {
    let from = query.from.as_deref().map(parse_square).transpose()?;

    let handle = find_game(&state, &id).await?;
    let game = handle.lock().await;
    let moves = match from {
        Some(sq) => game.legal_moves_from(sq),
        None => game.legal_moves(),
    };

    let entries: Vec<LegalMoveEntry> = moves.iter().map(legal_move_entry).collect();
    Ok(Json(LegalMovesResponse {
        count: entries.len(),
        moves: entries,
    }))
}

// =========================================================================
// Stateless engine query
// =========================================================================

/// POST /get_move
///
/// Input `{"difficulty": 1-5, "fen": "<FEN>"}`, output `{"nextmove": "e2e4"}`.
/// The body is read as JSON whatever its content type, and the FEN is
/// checked before the engine sees it.
pub async fn get_move(
    State(state): State<SharedState>,
    body: Bytes,
) -> Result<Json<GetMoveResponse>, ApiError> {
    let input: GetMoveRequest = serde_json::from_slice(&body)
        .map_err(|e| ApiError::InvalidRequest(format!("failed to deserialize json: {e}")))?;
    let difficulty = input.difficulty.resolve()?;
    let pos = Position::from_fen(&input.fen)?;

    let status = status_of(&pos);
    if status.is_game_over() {
        return Err(ChessError::GameOver(status.to_string()).into());
    }

    let fen = pos.to_fen();
    let nextmove = state
        .oracle
        .best_move(difficulty, &fen)
        .await
        .inspect_err(|e| warn!(%fen, error = %e, "engine query failed"))?;
    info!(%fen, %difficulty, %nextmove, "engine move served");

    Ok(Json(GetMoveResponse {
        nextmove: nextmove.trim().to_string(),
    }))
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::ai::{Backend, Oracle, UciEngine, UciSettings};
    use crate::api::router::create_router;
    use crate::api::state::AppState;
    use crate::config::AppConfig;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    fn test_state() -> SharedState {
        AppState::new(AppConfig::default())
    }

    /// State whose engine cannot be started.
    fn broken_engine_state() -> SharedState {
        let engine = UciEngine::new(UciSettings {
            path: "/nonexistent/engine-binary".into(),
            args: Vec::new(),
            depth: 1,
            pool_size: 1,
        });
        AppState::with_oracle(
            AppConfig::default(),
            Oracle::new(Backend::Uci(engine), Duration::from_secs(2)),
        )
    }

    async fn body_json(response: axum::http::Response<Body>) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn post_json(uri: &str, body: &str) -> Request<Body> {
        Request::post(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn create(state: &SharedState, body: &str) -> serde_json::Value {
        let resp = create_router(state.clone())
            .oneshot(post_json("/api/games", body))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::CREATED);
        body_json(resp).await
    }

    // --- Health ---

    #[tokio::test]
    async fn health_returns_200() {
        let app = create_router(test_state());
        let resp = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp).await;
        assert_eq!(json["status"], "ok");
        assert_eq!(json["engine"], "RandomAi");
        assert_eq!(json["games"], 0);
    }

    #[tokio::test]
    async fn not_found_returns_404() {
        let app = create_router(test_state());
        let resp = app
            .oneshot(Request::get("/nonexistent").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn cors_preflight() {
        let app = create_router(test_state());
        let resp = app
            .oneshot(
                Request::builder()
                    .method("OPTIONS")
                    .uri("/health")
                    .header("Origin", "http://localhost:3001")
                    .header("Access-Control-Request-Method", "GET")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(resp.headers().get("access-control-allow-origin").is_some());
    }

    // --- Create Game ---

    #[tokio::test]
    async fn create_game_default() {
        let state = test_state();
        let json = create(&state, "{}").await;
        assert_eq!(
            json["fen"],
            "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1"
        );
        assert_eq!(json["playerColor"], "white");
        assert_eq!(json["difficulty"], 3);
        assert_eq!(json["status"], "active");
        assert!(json["events"].as_array().unwrap().is_empty());
        assert!(json.get("engineError").is_none());
        assert_eq!(state.games.read().await.len(), 1);
    }

    #[tokio::test]
    async fn create_game_as_black_engine_opens() {
        let state = test_state();
        let json = create(&state, r#"{"playerColor": "black", "difficulty": 1}"#).await;
        assert_eq!(json["currentPlayer"], "black");
        assert_eq!(json["difficulty"], 1);
        let events = json["events"].as_array().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0]["type"], "moveApplied");
        assert_eq!(events[0]["color"], "white");
    }

    #[tokio::test]
    async fn create_game_from_fen() {
        let state = test_state();
        let json = create(&state, r#"{"fen": "4k3/8/8/8/8/8/8/4K2R w K - 0 1"}"#).await;
        assert_eq!(json["fen"], "4k3/8/8/8/8/8/8/4K2R w K - 0 1");
    }

    #[tokio::test]
    async fn create_game_rejects_bad_input() {
        for body in [
            r#"{"fen": "not a fen"}"#,
            r#"{"fen": "4k2R/8/8/8/8/8/8/4K3 w - - 0 1"}"#,
            r#"{"difficulty": 7}"#,
            r#"{"playerColor": "green"}"#,
        ] {
            let resp = create_router(test_state())
                .oneshot(post_json("/api/games", body))
                .await
                .unwrap();
            assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "{body}");
        }
    }

    #[tokio::test]
    async fn create_game_reports_engine_failure() {
        let state = broken_engine_state();
        let json = create(&state, r#"{"playerColor": "black"}"#).await;
        assert_eq!(json["engineError"]["code"], "ENGINE_FAILURE");
        assert_eq!(json["currentPlayer"], "white");

        let id = json["id"].as_str().unwrap();
        let resp = create_router(state.clone())
            .oneshot(
                Request::post(format!("/api/games/{id}/engine-move"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
    }

    // --- Get / List / Delete ---

    #[tokio::test]
    async fn get_list_and_delete() {
        let state = test_state();
        let created = create(&state, "{}").await;
        let id = created["id"].as_str().unwrap().to_string();

        let resp = create_router(state.clone())
            .oneshot(Request::get(format!("/api/games/{id}")).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_json(resp).await["id"], id.as_str());

        let resp = create_router(state.clone())
            .oneshot(Request::get("/api/games?status=active").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let json = body_json(resp).await;
        assert_eq!(json["total"], 1);

        let resp = create_router(state.clone())
            .oneshot(
                Request::delete(format!("/api/games/{id}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let resp = create_router(state.clone())
            .oneshot(Request::get(format!("/api/games/{id}")).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(resp).await["error"]["code"], "GAME_NOT_FOUND");
    }

    // --- Moves ---

    #[tokio::test]
    async fn move_plays_player_and_engine() {
        let state = test_state();
        let created = create(&state, "{}").await;
        let id = created["id"].as_str().unwrap();

        let resp = create_router(state.clone())
            .oneshot(post_json(
                &format!("/api/games/{id}/moves"),
                r#"{"from": "e2", "to": "e4"}"#,
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp).await;
        let events = json["events"].as_array().unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0]["notation"], "e2e4");
        assert_eq!(events[1]["color"], "black");
        assert_eq!(json["game"]["currentPlayer"], "white");
    }

    #[tokio::test]
    async fn illegal_move_is_rejected_without_change() {
        let state = test_state();
        let created = create(&state, "{}").await;
        let id = created["id"].as_str().unwrap();

        let resp = create_router(state.clone())
            .oneshot(post_json(
                &format!("/api/games/{id}/moves"),
                r#"{"from": "e2", "to": "e5"}"#,
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(resp).await["error"]["code"], "ILLEGAL_MOVE");

        let game = state.game(id).await.unwrap();
        assert_eq!(game.lock().await.to_fen(), created["fen"].as_str().unwrap());
    }

    #[tokio::test]
    async fn bad_square_is_rejected() {
        let state = test_state();
        let created = create(&state, "{}").await;
        let id = created["id"].as_str().unwrap();
        let resp = create_router(state.clone())
            .oneshot(post_json(
                &format!("/api/games/{id}/moves"),
                r#"{"from": "z9", "to": "e4"}"#,
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(resp).await["error"]["code"], "INVALID_SQUARE");
    }

    #[tokio::test]
    async fn move_keeps_player_move_when_engine_fails() {
        let state = broken_engine_state();
        let created = create(&state, "{}").await;
        let id = created["id"].as_str().unwrap();

        let resp = create_router(state.clone())
            .oneshot(post_json(
                &format!("/api/games/{id}/moves"),
                r#"{"from": "g1", "to": "f3"}"#,
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp).await;
        assert_eq!(json["events"].as_array().unwrap().len(), 1);
        assert_eq!(json["engineError"]["code"], "ENGINE_FAILURE");
        assert_eq!(json["game"]["currentPlayer"], "black");
    }

    #[tokio::test]
    async fn engine_move_out_of_turn_is_rejected() {
        let state = test_state();
        let created = create(&state, "{}").await;
        let id = created["id"].as_str().unwrap();
        let resp = create_router(state.clone())
            .oneshot(
                Request::post(format!("/api/games/{id}/engine-move"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(resp).await["error"]["code"], "WRONG_SIDE");
    }

    // --- Legal moves ---

    #[tokio::test]
    async fn legal_moves_all_and_from_square() {
        let state = test_state();
        let created = create(&state, "{}").await;
        let id = created["id"].as_str().unwrap();

        let resp = create_router(state.clone())
            .oneshot(
                Request::get(format!("/api/games/{id}/legal-moves"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(body_json(resp).await["count"], 20);

        let resp = create_router(state.clone())
            .oneshot(
                Request::get(format!("/api/games/{id}/legal-moves?from=g1"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let json = body_json(resp).await;
        assert_eq!(json["count"], 2);
        assert_eq!(json["moves"][0]["from"], "g1");
    }

    // --- /get_move ---

    #[tokio::test]
    async fn get_move_answers_with_nextmove() {
        let resp = create_router(test_state())
            .oneshot(
                Request::post("/get_move")
                    .header("content-type", "text/json")
                    .body(Body::from(
                        r#"{"difficulty": "2", "fen": "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1"}"#,
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp).await;
        assert_eq!(json["nextmove"].as_str().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn get_move_rejects_bad_fen_and_json() {
        let resp = create_router(test_state())
            .oneshot(post_json("/get_move", r#"{"difficulty": 3, "fen": "8/8/8 w"}"#))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(resp).await["error"]["code"], "INVALID_FEN");

        let resp = create_router(test_state())
            .oneshot(post_json(
                "/get_move",
                r#"{"difficulty": 3, "fen": "4k2R/8/8/8/8/8/8/4K3 w - - 0 1"}"#,
            ))
            .await
            .unwrap();
        assert_eq!(body_json(resp).await["error"]["code"], "INVALID_FEN");

        let resp = create_router(test_state())
            .oneshot(post_json("/get_move", "{not json"))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(resp).await["error"]["code"], "INVALID_REQUEST");
    }

    #[tokio::test]
    async fn get_move_on_finished_position_is_game_over() {
        let resp = create_router(test_state())
            .oneshot(post_json(
                "/get_move",
                r#"{"difficulty": 3, "fen": "rnb1kbnr/pppp1ppp/8/4p3/6Pq/5P2/PPPPP2P/RNBQKBNR w KQkq - 1 3"}"#,
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(resp).await["error"]["code"], "GAME_OVER");
    }
}
