//! Health check endpoint
//!
//! `GET /health` reports whether the store answers a trivial query.

use hyper::{Method, Response, StatusCode};
use serde::Serialize;
use tracing::error;

use super::response::{self, BoxBody};
use crate::server::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub ok: bool,
}

pub fn health_check(method: &Method, state: &AppState) -> Response<BoxBody> {
    if method != Method::GET {
        return response::method_not_allowed();
    }

    match state.db.ping() {
        Ok(()) => response::ok(&HealthResponse { ok: true }),
        Err(e) => {
            error!(error = %e, "Health check failed");
            response::json_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &HealthResponse { ok: false },
            )
        }
    }
}
