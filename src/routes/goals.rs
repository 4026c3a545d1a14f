//! Goal hierarchy routes
//!
//! - GET   /goals                          - Goals, newest first, fully nested
//! - POST  /goals                          - Create a goal with strategies/actions
//! - PATCH /goals/:id/status               - Set goal status
//! - POST  /goals/:goalId/strategies       - Add a strategy
//! - POST  /goals/strategies/:id/actions   - Add an action step
//! - PATCH /goals/strategies/:id/status    - Set strategy status
//! - PATCH /goals/actions/:id/status       - Set action status
//! - POST  /goals/:goalId/milestones       - Append a milestone
//! - PATCH /goals/:goalId/milestones       - Replace all milestones

use hyper::body::Incoming;
use hyper::{Method, Request, Response};
use serde::de::DeserializeOwned;

use super::response::{self, BoxBody, HandlerResult};
use crate::server::AppState;
use crate::services::AuthUser;
use crate::types::requests::{
    CreateActionRequest, CreateGoalRequest, CreateMilestoneRequest, CreateStrategyRequest,
    ReplaceMilestonesRequest, StatusUpdate,
};
use crate::types::Result;

async fn body<T: DeserializeOwned>(req: Request<Incoming>, state: &AppState) -> Result<T> {
    response::parse_json_body(req, state.args.max_body_bytes).await
}

async fn route(
    req: Request<Incoming>,
    method: &Method,
    state: &AppState,
    uid: &str,
    rest: &[&str],
) -> HandlerResult {
    let goals = &state.services.goals;

    match (method, rest) {
        (&Method::GET, []) => Ok(response::ok(&goals.list(uid)?)),

        (&Method::POST, []) => {
            let request: CreateGoalRequest = body(req, state).await?;
            Ok(response::ok(&goals.create(uid, &request)?))
        }

        (&Method::POST, ["strategies", strategy_id, "actions"]) => {
            let request: CreateActionRequest = body(req, state).await?;
            Ok(response::ok(&goals.add_action(uid, strategy_id, &request)?))
        }

        (&Method::PATCH, ["strategies", strategy_id, "status"]) => {
            let update: StatusUpdate = body(req, state).await?;
            Ok(response::ok(&goals.set_strategy_status(uid, strategy_id, &update)?))
        }

        (&Method::PATCH, ["actions", action_id, "status"]) => {
            let update: StatusUpdate = body(req, state).await?;
            Ok(response::ok(&goals.set_action_status(uid, action_id, &update)?))
        }

        (&Method::PATCH, [goal_id, "status"]) => {
            let update: StatusUpdate = body(req, state).await?;
            Ok(response::ok(&goals.set_status(uid, goal_id, &update)?))
        }

        (&Method::POST, [goal_id, "strategies"]) => {
            let request: CreateStrategyRequest = body(req, state).await?;
            Ok(response::ok(&goals.add_strategy(uid, goal_id, &request)?))
        }

        (&Method::POST, [goal_id, "milestones"]) => {
            let request: CreateMilestoneRequest = body(req, state).await?;
            Ok(response::ok(&goals.add_milestone(uid, goal_id, &request)?))
        }

        (&Method::PATCH, [goal_id, "milestones"]) => {
            let request: ReplaceMilestonesRequest = body(req, state).await?;
            Ok(response::ok(&goals.replace_milestones(uid, goal_id, &request)?))
        }

        (_, [])
        | (_, ["strategies", _, "actions"])
        | (_, ["strategies", _, "status"])
        | (_, ["actions", _, "status"])
        | (_, [_, "status"])
        | (_, [_, "strategies"])
        | (_, [_, "milestones"]) => Ok(response::method_not_allowed()),

        _ => Ok(response::not_found(req.uri().path())),
    }
}

/// Dispatch `/goals/*` for an authenticated user
pub async fn handle_goals_request(
    req: Request<Incoming>,
    state: &AppState,
    user: &AuthUser,
    rest: &[&str],
) -> Response<BoxBody> {
    let method = req.method().clone();
    response::respond(route(req, &method, state, &user.user_id, rest).await)
}
