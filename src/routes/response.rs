//! HTTP response building helpers
//!
//! Every handler answers through these so bodies, content types and error
//! formatting stay consistent.

use bytes::Bytes;
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::Incoming;
use hyper::header::{HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use hyper::{Request, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::error;

use crate::types::{NorthstarError, Result};

pub type BoxBody = http_body_util::combinators::BoxBody<Bytes, hyper::Error>;

/// Handler result; errors are rendered by `error_response`
pub type HandlerResult = Result<Response<BoxBody>>;

pub fn full_body(data: impl Into<Bytes>) -> BoxBody {
    Full::new(data.into())
        .map_err(|never| match never {})
        .boxed()
}

pub fn empty_body() -> BoxBody {
    full_body(Bytes::new())
}

/// Build a JSON response with the given status code
pub fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response<BoxBody> {
    let json = serde_json::to_vec(body).unwrap_or_else(|_| b"{}".to_vec());
    let mut response = Response::new(full_body(json));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}

/// 200 OK
pub fn ok<T: Serialize>(body: &T) -> Response<BoxBody> {
    json_response(StatusCode::OK, body)
}

pub fn no_content() -> Response<BoxBody> {
    let mut response = Response::new(empty_body());
    *response.status_mut() = StatusCode::NO_CONTENT;
    response
}

pub fn not_found(path: &str) -> Response<BoxBody> {
    json_response(
        StatusCode::NOT_FOUND,
        &serde_json::json!({ "error": "Not found", "code": "NOT_FOUND", "path": path }),
    )
}

pub fn method_not_allowed() -> Response<BoxBody> {
    json_response(
        StatusCode::METHOD_NOT_ALLOWED,
        &serde_json::json!({ "error": "Method not allowed", "code": "METHOD_NOT_ALLOWED" }),
    )
}

/// Convert an error to its HTTP response. Server-side failures are logged
/// here and answered with a generic message.
pub fn error_response(err: &NorthstarError) -> Response<BoxBody> {
    if err.is_server_error() {
        error!(error = %err, "Request failed");
    }
    json_response(err.status_code(), &err.to_body())
}

/// Collapse a handler result into a response
pub fn respond(result: HandlerResult) -> Response<BoxBody> {
    result.unwrap_or_else(|e| error_response(&e))
}

pub fn auth_header(req: &Request<Incoming>) -> Option<&str> {
    req.headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
}

/// Read and deserialize a JSON body of at most `max_bytes`
pub async fn parse_json_body<T: DeserializeOwned>(
    req: Request<Incoming>,
    max_bytes: usize,
) -> Result<T> {
    let bytes = Limited::new(req.into_body(), max_bytes)
        .collect()
        .await
        .map_err(|e| {
            if e.downcast_ref::<LengthLimitError>().is_some() {
                NorthstarError::BadRequest("Request body too large".into())
            } else {
                NorthstarError::BadRequest(format!("Failed to read body: {}", e))
            }
        })?
        .to_bytes();

    serde_json::from_slice(&bytes)
        .map_err(|e| NorthstarError::BadRequest(format!("Invalid JSON body: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_json(response: Response<BoxBody>) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_json_response_headers() {
        let response = ok(&serde_json::json!({"id": "g1"}));
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(CONTENT_TYPE).unwrap(),
            "application/json"
        );
        assert_eq!(body_json(response).await["id"], "g1");
    }

    #[tokio::test]
    async fn test_null_body_for_absent_value() {
        let absent: Option<String> = None;
        let response = ok(&absent);
        assert_eq!(body_json(response).await, serde_json::Value::Null);
    }

    #[tokio::test]
    async fn test_error_response_body() {
        let response = error_response(&NorthstarError::Unauthorized("Invalid token".into()));
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = body_json(response).await;
        assert_eq!(body["error"], "Invalid token");
        assert_eq!(body["code"], "UNAUTHORIZED");
    }
}
