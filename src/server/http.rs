//! HTTP server implementation
//!
//! Uses hyper http1 with TokioIo for async handling. Routing is by first
//! path segment; each area module matches the remaining segments.

use hyper::body::Incoming;
use hyper::header::{
    HeaderValue, ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS,
    ACCESS_CONTROL_ALLOW_ORIGIN,
};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response};
use hyper_util::rt::TokioIo;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::auth::JwtValidator;
use crate::config::Args;
use crate::db::Database;
use crate::routes::{self, response, response::BoxBody};
use crate::services::Services;
use crate::types::{NorthstarError, Result};

const ALLOW_METHODS: &str = "GET, POST, PATCH, OPTIONS";
const ALLOW_HEADERS: &str = "Content-Type, Authorization";

/// Shared application state
pub struct AppState {
    pub args: Args,
    pub db: Arc<Database>,
    pub services: Services,
}

impl AppState {
    /// Wire services over an opened database.
    ///
    /// Outside dev mode a JWT secret is required.
    pub fn new(args: Args, db: Database) -> Result<Self> {
        let jwt = match (&args.jwt_secret, args.dev_mode) {
            (Some(secret), _) => JwtValidator::new(secret.clone(), args.jwt_expiry_seconds)?,
            (None, true) => JwtValidator::new_dev(args.jwt_expiry_seconds),
            (None, false) => {
                return Err(NorthstarError::Config(
                    "JWT_SECRET is required in production mode".into(),
                ))
            }
        };

        let db = Arc::new(db);
        let services = Services::new(Arc::clone(&db), jwt);
        Ok(Self { args, db, services })
    }
}

/// Bind the configured address and serve until the process exits
pub async fn run(state: Arc<AppState>) -> Result<()> {
    let listener = TcpListener::bind(state.args.listen).await?;

    info!("Northstar listening on {}", state.args.listen);

    if state.args.dev_mode {
        warn!("Development mode enabled - do not expose this instance");
    }

    serve(listener, state).await
}

/// Accept loop over an already bound listener
pub async fn serve(listener: TcpListener, state: Arc<AppState>) -> Result<()> {
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let state = Arc::clone(&state);
                tokio::spawn(async move {
                    let io = TokioIo::new(stream);

                    let service = service_fn(move |req| {
                        let state = Arc::clone(&state);
                        async move { handle_request(state, addr, req).await }
                    });

                    if let Err(err) = http1::Builder::new()
                        .serve_connection(io, service)
                        .await
                    {
                        error!("Error serving connection from {}: {:?}", addr, err);
                    }
                });
            }
            Err(e) => {
                error!("Error accepting connection: {:?}", e);
            }
        }
    }
}

/// Route incoming HTTP requests
async fn handle_request(
    state: Arc<AppState>,
    addr: SocketAddr,
    req: Request<Incoming>,
) -> std::result::Result<Response<BoxBody>, hyper::Error> {
    let started = Instant::now();
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    let mut response = dispatch(Arc::clone(&state), req, &method, &path).await;
    apply_cors(&mut response, &state.args.cors_origin);

    info!(
        peer = %addr,
        method = %method,
        path = %path,
        status = response.status().as_u16(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "request"
    );

    Ok(response)
}

async fn dispatch(
    state: Arc<AppState>,
    req: Request<Incoming>,
    method: &Method,
    path: &str,
) -> Response<BoxBody> {
    if method == Method::OPTIONS {
        return response::no_content();
    }

    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

    match segments.as_slice() {
        ["health"] => routes::health_check(method, &state),
        ["auth", rest @ ..] => routes::handle_auth_request(req, state, rest).await,
        [area @ ("vision" | "goals" | "summaries" | "letters"), rest @ ..] => {
            let user = match state.services.accounts.authenticate(response::auth_header(&req)) {
                Ok(user) => user,
                Err(e) => return response::error_response(&e),
            };
            match *area {
                "vision" => routes::handle_vision_request(req, &state, &user, rest).await,
                "goals" => routes::handle_goals_request(req, &state, &user, rest).await,
                "summaries" => routes::handle_summaries_request(req, &state, &user, rest).await,
                _ => routes::handle_letters_request(req, &state, &user, rest).await,
            }
        }
        _ => response::not_found(path),
    }
}

fn apply_cors(response: &mut Response<BoxBody>, origin: &str) {
    let headers = response.headers_mut();
    let origin = HeaderValue::from_str(origin).unwrap_or_else(|_| HeaderValue::from_static("*"));
    headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, origin);
    headers.insert(
        ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static(ALLOW_METHODS),
    );
    headers.insert(
        ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static(ALLOW_HEADERS),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn args(extra: &[&str]) -> Args {
        let mut argv = vec!["northstar"];
        argv.extend_from_slice(extra);
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_dev_mode_state_without_secret() {
        let db = Database::open_in_memory().unwrap();
        assert!(AppState::new(args(&["--dev-mode"]), db).is_ok());
    }

    #[test]
    fn test_production_state_requires_secret() {
        let mut args = args(&["--dev-mode"]);
        args.dev_mode = false;
        args.jwt_secret = None;
        let db = Database::open_in_memory().unwrap();
        assert!(matches!(
            AppState::new(args, db),
            Err(NorthstarError::Config(_))
        ));
    }

    #[test]
    fn test_cors_headers_applied() {
        let mut response = response::no_content();
        apply_cors(&mut response, "https://northstar.example");
        assert_eq!(
            response.headers().get(ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
            "https://northstar.example"
        );
        assert_eq!(
            response.headers().get(ACCESS_CONTROL_ALLOW_METHODS).unwrap(),
            ALLOW_METHODS
        );
    }
}
