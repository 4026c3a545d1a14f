//! HTTP Routes for Authentication
//!
//! - POST /auth/register - Create an account and get a JWT
//! - POST /auth/login    - Authenticate and get a JWT

use hyper::body::Incoming;
use hyper::{Method, Request, Response};
use std::sync::Arc;

use super::response::{self, BoxBody, HandlerResult};
use crate::server::AppState;
use crate::types::requests::{LoginRequest, RegisterRequest};
use crate::types::NorthstarError;

/// POST /auth/register
///
/// Argon2 hashing is CPU bound, so it runs on the blocking pool.
async fn handle_register(req: Request<Incoming>, state: Arc<AppState>) -> HandlerResult {
    let body: RegisterRequest = response::parse_json_body(req, state.args.max_body_bytes).await?;

    let accounts = Arc::clone(&state.services.accounts);
    let registered = tokio::task::spawn_blocking(move || accounts.register(&body))
        .await
        .map_err(|e| NorthstarError::Internal(format!("Register task failed: {}", e)))??;

    Ok(response::ok(&registered))
}

/// POST /auth/login
async fn handle_login(req: Request<Incoming>, state: Arc<AppState>) -> HandlerResult {
    let body: LoginRequest = response::parse_json_body(req, state.args.max_body_bytes).await?;

    let accounts = Arc::clone(&state.services.accounts);
    let login = tokio::task::spawn_blocking(move || accounts.login(&body))
        .await
        .map_err(|e| NorthstarError::Internal(format!("Login task failed: {}", e)))??;

    Ok(response::ok(&login))
}

/// Dispatch `/auth/*`
pub async fn handle_auth_request(
    req: Request<Incoming>,
    state: Arc<AppState>,
    rest: &[&str],
) -> Response<BoxBody> {
    let method = req.method().clone();

    let result = match (&method, rest) {
        (&Method::POST, ["register"]) => handle_register(req, state).await,
        (&Method::POST, ["login"]) => handle_login(req, state).await,
        (_, ["register"]) | (_, ["login"]) => Ok(response::method_not_allowed()),
        _ => Ok(response::not_found(req.uri().path())),
    };

    response::respond(result)
}
