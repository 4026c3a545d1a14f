//! End-to-end tests against a real server on a loopback port

use chrono::{DateTime, Datelike, Utc};
use clap::Parser;
use northstar::db::Database;
use northstar::offline::{HttpClient, RemoteApi};
use northstar::types::requests::{
    CreateGoalRequest, CreateLetterRequest, CreateVisionRequest, LoginRequest, MilestoneInput,
    RegisterRequest, UpsertSummaryRequest, VisionAnswers,
};
use northstar::types::{NorthstarError, Status};
use northstar::{serve, AppState, Args};
use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::TempDir;
use tokio::net::TcpListener;

const PASSWORD: &str = "correct horse battery";

/// Start a dev-mode server over a fresh database file
async fn start_server() -> (String, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("northstar.db");
    let args = Args::try_parse_from([
        "northstar",
        "--dev-mode",
        "--database-path",
        db_path.to_str().unwrap(),
    ])
    .unwrap();

    let db = Database::open(&args.database_path()).unwrap();
    let state = Arc::new(AppState::new(args, db).unwrap());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(serve(listener, state));

    (format!("http://{}", addr), temp_dir)
}

fn register_request(email: &str) -> RegisterRequest {
    RegisterRequest {
        email: Some(email.into()),
        password: Some(PASSWORD.into()),
        name: Some("Ana".into()),
    }
}

/// Registered client carrying its token
async fn signed_in(base_url: &str, email: &str) -> HttpClient {
    let client = HttpClient::new(base_url).unwrap();
    let user = client.register(&register_request(email)).await.unwrap();
    client.with_token(user.token)
}

fn goal_request(title: &str) -> CreateGoalRequest {
    CreateGoalRequest {
        title: Some(title.into()),
        expected_completion_date: Some("2030-12-31".into()),
        ..Default::default()
    }
}

fn remote_status(err: NorthstarError) -> u16 {
    match err {
        NorthstarError::Remote { status, .. } => status,
        other => panic!("expected remote error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_health() {
    let (base_url, _temp) = start_server().await;
    let client = HttpClient::new(&base_url).unwrap();
    assert!(client.health().await.unwrap());

    let response = reqwest::get(format!("{}/health", base_url)).await.unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(
        response.headers()["access-control-allow-origin"],
        "*"
    );
    let body: Value = response.json().await.unwrap();
    assert_eq!(body, json!({"ok": true}));
}

#[tokio::test]
async fn test_register_login_and_nested_goal() {
    let (base_url, _temp) = start_server().await;
    let http = reqwest::Client::new();

    let response = http
        .post(format!("{}/auth/register", base_url))
        .json(&json!({"email": "a@x.com", "password": "password1", "name": "Ana"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let user: Value = response.json().await.unwrap();
    assert_eq!(user["email"], "a@x.com");
    assert_eq!(user["name"], "Ana");
    assert!(user["token"].as_str().is_some_and(|t| !t.is_empty()));

    let client = HttpClient::new(&base_url).unwrap();

    // Duplicate email
    let err = client
        .register(&RegisterRequest {
            email: Some("a@x.com".into()),
            password: Some("password1".into()),
            name: None,
        })
        .await
        .unwrap_err();
    assert_eq!(remote_status(err), 409);

    // Wrong password
    let err = client
        .login(&LoginRequest {
            email: Some("a@x.com".into()),
            password: Some("password2".into()),
        })
        .await
        .unwrap_err();
    assert_eq!(remote_status(err), 401);

    let login = client
        .login(&LoginRequest {
            email: Some("a@x.com".into()),
            password: Some("password1".into()),
        })
        .await
        .unwrap();
    assert!(!login.token.is_empty());

    let response = http
        .post(format!("{}/goals", base_url))
        .header("Authorization", format!("Bearer {}", login.token))
        .json(&json!({
            "title": "Learn guitar",
            "expectedCompletionDate": "2025-12-31T00:00:00Z",
            "strategies": [
                {"title": "Practice chords", "actions": [{"description": "15 minutes daily"}]},
                {"title": "Learn songs", "actions": [{"description": "One song a week"}]}
            ]
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let created: Value = response.json().await.unwrap();

    let client = client.with_token(login.token);
    let goals = client.list_goals().await.unwrap();
    assert_eq!(goals.len(), 1);

    let goal = &goals[0];
    assert_eq!(goal.id, created["id"].as_str().unwrap());
    assert_eq!(goal.title, "Learn guitar");
    assert_eq!(goal.expected_completion_date.year(), 2025);
    assert_eq!(goal.status, Status::Unbegun);
    assert!(goal.start_date.is_none());

    let titles: Vec<&str> = goal.strategies.iter().map(|s| s.title.as_str()).collect();
    assert_eq!(titles, vec!["Practice chords", "Learn songs"]);
    for strategy in &goal.strategies {
        assert_eq!(strategy.status, Status::Unbegun);
        assert_eq!(strategy.actions.len(), 1);
        assert_eq!(strategy.actions[0].status, Status::Unbegun);
    }
    assert_eq!(goal.strategies[1].actions[0].description, "One song a week");
}

#[tokio::test]
async fn test_requests_without_token_rejected() {
    let (base_url, _temp) = start_server().await;
    let http = reqwest::Client::new();

    let response = http.get(format!("{}/goals", base_url)).send().await.unwrap();
    assert_eq!(response.status(), 401);

    let response = http
        .get(format!("{}/vision/latest", base_url))
        .header("Authorization", "Bearer not-a-token")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 401);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn test_validation_errors_have_fields() {
    let (base_url, _temp) = start_server().await;
    let http = reqwest::Client::new();

    let response = http
        .post(format!("{}/auth/register", base_url))
        .json(&json!({"email": "not-an-email", "password": "short"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "Validation failed");
    assert!(body["fields"]["email"].is_array());
    assert!(body["fields"]["password"].is_array());

    let response = http
        .post(format!("{}/auth/login", base_url))
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn test_goal_quota_released_by_completion() {
    let (base_url, _temp) = start_server().await;
    let client = signed_in(&base_url, "quota@example.com").await;

    let mut ids = vec![];
    for i in 0..5 {
        ids.push(client.create_goal(&goal_request(&format!("Goal {}", i))).await.unwrap().id);
    }

    let err = client.create_goal(&goal_request("Sixth")).await.unwrap_err();
    match err {
        NorthstarError::Remote { status, message } => {
            assert_eq!(status, 400);
            assert!(message.contains("5 active goals"));
        }
        other => panic!("unexpected error: {:?}", other),
    }

    // Pausing does not free a slot
    client.set_goal_status(&ids[0], Status::Paused).await.unwrap();
    assert!(client.create_goal(&goal_request("Sixth")).await.is_err());

    let done = client.set_goal_status(&ids[0], Status::Complete).await.unwrap();
    assert!(done.completed_at.is_some());

    let sixth = client.create_goal(&goal_request("Sixth")).await.unwrap();
    let goals = client.list_goals().await.unwrap();
    assert_eq!(goals.len(), 6);
    assert_eq!(goals[0].id, sixth.id);
}

#[tokio::test]
async fn test_status_stamps_on_nested_items() {
    let (base_url, _temp) = start_server().await;
    let client = signed_in(&base_url, "stamps@example.com").await;

    let goal = client.create_goal(&goal_request("Learn piano")).await.unwrap();
    let strategy = client.add_strategy(&goal.id, "Daily practice").await.unwrap();
    let action = client.add_action(&strategy.id, "Scales for 10 minutes").await.unwrap();

    let started = client.set_goal_status(&goal.id, Status::InProgress).await.unwrap();
    let first_start = started.start_date.unwrap();
    client.set_goal_status(&goal.id, Status::Paused).await.unwrap();
    let resumed = client.set_goal_status(&goal.id, Status::InProgress).await.unwrap();
    assert_eq!(resumed.start_date, Some(first_start));

    let strategy = client
        .set_strategy_status(&strategy.id, Status::InProgress)
        .await
        .unwrap();
    assert!(strategy.start_date.is_some());

    let action = client.set_action_status(&action.id, Status::Complete).await.unwrap();
    assert!(action.completed_at.is_some());
    assert!(action.start_date.is_none());

    let http = reqwest::Client::new();
    let response = http
        .patch(format!("{}/goals/{}/status", base_url, goal.id))
        .header("Authorization", format!("Bearer {}", client.token().unwrap()))
        .json(&json!({"status": "DONE"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn test_other_users_items_are_not_found() {
    let (base_url, _temp) = start_server().await;
    let owner = signed_in(&base_url, "owner@example.com").await;
    let intruder = signed_in(&base_url, "intruder@example.com").await;

    let goal = owner.create_goal(&goal_request("Private")).await.unwrap();
    let strategy = owner.add_strategy(&goal.id, "Secret plan").await.unwrap();

    let err = intruder
        .set_goal_status(&goal.id, Status::Complete)
        .await
        .unwrap_err();
    assert_eq!(remote_status(err), 404);

    let err = intruder.add_action(&strategy.id, "Meddle").await.unwrap_err();
    assert_eq!(remote_status(err), 404);

    let err = owner
        .set_goal_status("00000000-0000-0000-0000-000000000000", Status::Paused)
        .await
        .unwrap_err();
    assert_eq!(remote_status(err), 404);

    assert!(intruder.list_goals().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_milestone_replace_and_clear() {
    let (base_url, _temp) = start_server().await;
    let client = signed_in(&base_url, "milestones@example.com").await;
    let goal = client.create_goal(&goal_request("Write a book")).await.unwrap();

    let first = client.add_milestone(&goal.id, "Outline done").await.unwrap();
    assert_eq!(first.note, "Outline done");

    let reached: DateTime<Utc> = "2025-03-01T09:30:00.000Z".parse().unwrap();
    let replaced = client
        .replace_milestones(
            &goal.id,
            vec![
                MilestoneInput::new("Chapter one", reached),
                MilestoneInput::Legacy("Chapter two".into()),
            ],
        )
        .await
        .unwrap();
    assert_eq!(replaced.milestones.len(), 2);
    assert_eq!(replaced.milestones[0].note, "Chapter one");
    assert_eq!(replaced.milestones[0].reached_at, reached);
    assert_eq!(replaced.milestones[1].note, "Chapter two");

    let cleared = client.replace_milestones(&goal.id, vec![]).await.unwrap();
    assert!(cleared.milestones.is_empty());
    assert!(client.list_goals().await.unwrap()[0].milestones.is_empty());

    let err = client
        .replace_milestones(&goal.id, vec![MilestoneInput::Legacy("   ".into())])
        .await
        .unwrap_err();
    assert_eq!(remote_status(err), 400);
}

#[tokio::test]
async fn test_vision_snapshots_and_replay() {
    let (base_url, _temp) = start_server().await;
    let client = signed_in(&base_url, "vision@example.com").await;

    assert!(client.latest_vision().await.unwrap().is_none());

    let request = CreateVisionRequest {
        answers: VisionAnswers {
            learn: Some("Sailing".into()),
            one_day: Some("Cross the Atlantic".into()),
            ..Default::default()
        },
        client_key: Some("vision-key-1".into()),
    };
    let first = client.create_vision(&request).await.unwrap();
    let replay = client.create_vision(&request).await.unwrap();
    assert_eq!(first.id, replay.id);

    let latest = client.latest_vision().await.unwrap().unwrap();
    assert_eq!(latest.id, first.id);
    assert_eq!(latest.answers.one_day.as_deref(), Some("Cross the Atlantic"));

    // Replays answer 200 instead of 201
    let http = reqwest::Client::new();
    let response = http
        .post(format!("{}/vision", base_url))
        .header("Authorization", format!("Bearer {}", client.token().unwrap()))
        .json(&request)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
}

#[tokio::test]
async fn test_summaries_upsert() {
    let (base_url, _temp) = start_server().await;
    let client = signed_in(&base_url, "summary@example.com").await;

    assert!(client.get_summary(2025, 1).await.unwrap().is_none());

    client
        .upsert_summary(&UpsertSummaryRequest {
            year: Some(2025),
            quarter: Some(1),
            achievements: Some("Shipped the garden".into()),
            reflection: None,
        })
        .await
        .unwrap();
    let updated = client
        .upsert_summary(&UpsertSummaryRequest {
            year: Some(2025),
            quarter: Some(1),
            achievements: None,
            reflection: Some("Start earlier".into()),
        })
        .await
        .unwrap();
    assert_eq!(updated.achievements.as_deref(), Some("Shipped the garden"));
    assert_eq!(updated.reflection.as_deref(), Some("Start earlier"));

    let fetched = client.get_summary(2025, 1).await.unwrap().unwrap();
    assert_eq!(fetched, updated);

    let err = client.get_summary(2025, 5).await.unwrap_err();
    assert_eq!(remote_status(err), 400);
}

#[tokio::test]
async fn test_letters_latest_delivery_first() {
    let (base_url, _temp) = start_server().await;
    let client = signed_in(&base_url, "letters@example.com").await;

    for deliver_on in ["2027-01-01T00:00:00Z", "2030-01-01T00:00:00Z", "2028-06-15T12:00:00Z"] {
        client
            .create_letter(&CreateLetterRequest {
                content: Some(format!("Dear future me ({})", deliver_on)),
                deliver_on: Some(deliver_on.into()),
                delivery_email: None,
            })
            .await
            .unwrap();
    }

    let letters = client.list_letters().await.unwrap();
    let years: Vec<i32> = letters
        .iter()
        .map(|l| l.deliver_on.year())
        .collect();
    assert_eq!(years, vec![2030, 2028, 2027]);

    let err = client
        .create_letter(&CreateLetterRequest {
            content: Some("Hi".into()),
            deliver_on: Some("next year".into()),
            delivery_email: None,
        })
        .await
        .unwrap_err();
    assert_eq!(remote_status(err), 400);
}

#[tokio::test]
async fn test_routing_edges() {
    let (base_url, _temp) = start_server().await;
    let http = reqwest::Client::new();

    let response = http
        .request(reqwest::Method::OPTIONS, format!("{}/goals", base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 204);
    assert!(response.headers().contains_key("access-control-allow-methods"));

    let response = http.get(format!("{}/nowhere", base_url)).send().await.unwrap();
    assert_eq!(response.status(), 404);

    let response = http.get(format!("{}/auth/register", base_url)).send().await.unwrap();
    assert_eq!(response.status(), 405);
}
