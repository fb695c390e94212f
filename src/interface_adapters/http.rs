// Plain-text status response for every request that is not a WebSocket upgrade.

use axum::{
    http::{StatusCode, header},
    response::IntoResponse,
};

pub const STATUS_TEXT: &str = "Game WebSocket Server Running\n";

pub fn status_response() -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain")],
        STATUS_TEXT,
    )
}
