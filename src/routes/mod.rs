//! HTTP route handlers
//!
//! One module per top-level path segment. Handlers receive the remaining
//! path segments and render their own errors through `response`.

pub mod auth_routes;
pub mod goals;
pub mod health;
pub mod letters;
pub mod response;
pub mod summaries;
pub mod vision;

pub use auth_routes::handle_auth_request;
pub use goals::handle_goals_request;
pub use health::health_check;
pub use letters::handle_letters_request;
pub use summaries::handle_summaries_request;
pub use vision::handle_vision_request;
