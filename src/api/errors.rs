use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::engine::ChessError;

/// Structured API error that serializes to JSON.
#[derive(Debug)]
pub enum ApiError {
    GameNotFound(String),
    InvalidRequest(String),
    Chess(ChessError),
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}

impl ErrorDetail {
    pub fn from_chess(err: &ChessError) -> Self {
        ErrorDetail {
            code: chess_error_code(err).to_string(),
            message: err.to_string(),
        }
    }
}

/// Stable machine-readable code for each domain error.
fn chess_error_code(err: &ChessError) -> &'static str {
    match err {
        ChessError::IllegalMove { .. } => "ILLEGAL_MOVE",
        ChessError::WrongSide { .. } => "WRONG_SIDE",
        ChessError::InvalidFen(_) => "INVALID_FEN",
        ChessError::InvalidSquare(_) => "INVALID_SQUARE",
        ChessError::InvalidPromotion(_) => "INVALID_PROMOTION",
        ChessError::InvalidDifficulty(_) => "INVALID_DIFFICULTY",
        ChessError::GameOver(_) => "GAME_OVER",
        ChessError::Protocol(_) => "ENGINE_PROTOCOL",
        ChessError::EngineFailure(_) => "ENGINE_FAILURE",
        ChessError::EngineTimeout(_) => "ENGINE_TIMEOUT",
    }
}

fn chess_error_status(err: &ChessError) -> StatusCode {
    match err {
        ChessError::Protocol(_) | ChessError::EngineFailure(_) => StatusCode::BAD_GATEWAY,
        ChessError::EngineTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
        _ => StatusCode::BAD_REQUEST,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = match self {
            ApiError::GameNotFound(id) => (
                StatusCode::NOT_FOUND,
                ErrorDetail {
                    code: "GAME_NOT_FOUND".to_string(),
                    message: format!("Game not found: {id}"),
                },
            ),
            ApiError::InvalidRequest(message) => (
                StatusCode::BAD_REQUEST,
                ErrorDetail {
                    code: "INVALID_REQUEST".to_string(),
                    message,
                },
            ),
            ApiError::Chess(err) => (chess_error_status(&err), ErrorDetail::from_chess(&err)),
        };

        (status, Json(ErrorResponse { error: detail })).into_response()
    }
}

impl From<ChessError> for ApiError {
    fn from(err: ChessError) -> Self {
        ApiError::Chess(err)
    }
}
