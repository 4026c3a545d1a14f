//! Quarterly summary routes
//!
//! - POST /summaries                 - Upsert the summary for (year, quarter)
//! - GET  /summaries/:year/:quarter  - Stored summary or `null`

use hyper::body::Incoming;
use hyper::{Method, Request, Response};

use super::response::{self, BoxBody, HandlerResult};
use crate::server::AppState;
use crate::services::AuthUser;
use crate::types::requests::UpsertSummaryRequest;
use crate::types::FieldErrors;

/// Path segments must be plain integers
fn parse_period(year: &str, quarter: &str) -> Result<(i32, u8), FieldErrors> {
    let mut errors = FieldErrors::new();
    let year = year.parse::<i32>().map_err(|_| errors.add("year", "Year must be an integer"));
    let quarter = quarter
        .parse::<u8>()
        .map_err(|_| errors.add("quarter", "Quarter must be an integer"));
    match (year, quarter) {
        (Ok(y), Ok(q)) => Ok((y, q)),
        _ => Err(errors),
    }
}

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
            let request: UpsertSummaryRequest =
                response::parse_json_body(req, state.args.max_body_bytes).await?;
            Ok(response::ok(&journal.upsert_summary(uid, &request)?))
        }
        (&Method::GET, [year, quarter]) => {
            let (year, quarter) = parse_period(year, quarter)?;
            Ok(response::ok(&journal.get_summary(uid, year, quarter)?))
        }
        (_, []) | (_, [_, _]) => Ok(response::method_not_allowed()),
        _ => Ok(response::not_found(req.uri().path())),
    }
}

pub async fn handle_summaries_request(
    req: Request<Incoming>,
    state: &AppState,
    user: &AuthUser,
    rest: &[&str],
) -> Response<BoxBody> {
    let method = req.method().clone();
    response::respond(route(req, &method, state, &user.user_id, rest).await)
}
