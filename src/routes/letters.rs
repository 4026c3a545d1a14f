//! Future letter routes
//!
//! - POST /letters - Store a letter to be delivered later
//! - GET  /letters - All letters, latest delivery date first

use hyper::body::Incoming;
use hyper::{Method, Request, Response};

use super::response::{self, BoxBody, HandlerResult};
use crate::server::AppState;
use crate::services::AuthUser;
use crate::types::requests::CreateLetterRequest;

async fn route(
    req: Request<Incoming>,
    method: &Method,
    state: &AppState,
    uid: &str,
    rest: &[&str],
) -> HandlerResult {
    let journal = &state.services.journal;

    match (method, rest) {
        (&Method::POST, []) => {
            let request: CreateLetterRequest =
                response::parse_json_body(req, state.args.max_body_bytes).await?;
            Ok(response::ok(&journal.create_letter(uid, &request)?))
        }
        (&Method::GET, []) => Ok(response::ok(&journal.list_letters(uid)?)),
        (_, []) => Ok(response::method_not_allowed()),
        _ => Ok(response::not_found(req.uri().path())),
    }
}

pub async fn handle_letters_request(
    req: Request<Incoming>,
    state: &AppState,
    user: &AuthUser,
    rest: &[&str],
) -> Response<BoxBody> {
    let method = req.method().clone();
    response::respond(route(req, &method, state, &user.user_id, rest).await)
}
