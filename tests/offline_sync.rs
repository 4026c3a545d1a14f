//! Offline cache migration against a real server

use clap::Parser;
use northstar::db::Database;
use northstar::offline::{register_and_migrate, HttpClient, OfflineCache, Reconciler};
use northstar::types::requests::{
    ActionDraft, CreateGoalRequest, CreateVisionRequest, RegisterRequest, StrategyDraft,
    VisionAnswers,
};
use northstar::types::{Status, MAX_ACTIVE_GOALS};
use northstar::{serve, AppState, Args};
use std::sync::Arc;
use tempfile::TempDir;
use tokio::net::TcpListener;

async fn start_server(temp_dir: &TempDir) -> String {
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

    format!("http://{}", addr)
}

fn goal(title: &str) -> CreateGoalRequest {
    CreateGoalRequest {
        title: Some(title.into()),
        why: Some("Because".into()),
        expected_completion_date: Some("2030-12-31".into()),
        strategies: vec![StrategyDraft {
            title: Some("Weekly plan".into()),
            actions: vec![ActionDraft {
                description: Some("First step".into()),
            }],
        }],
        client_key: None,
    }
}

fn register(email: &str) -> RegisterRequest {
    RegisterRequest {
        email: Some(email.into()),
        password: Some("correct horse battery".into()),
        name: None,
    }
}

#[tokio::test]
async fn test_register_migrates_offline_work() {
    let temp_dir = TempDir::new().unwrap();
    let base_url = start_server(&temp_dir).await;
    let cache = OfflineCache::open(temp_dir.path().join("offline")).unwrap();

    cache
        .save_vision(VisionAnswers {
            see: Some("The northern lights".into()),
            ..Default::default()
        })
        .unwrap();
    let local = cache.add_goal(&goal("Learn to sail")).unwrap();
    cache.add_goal(&goal("Read 30 books")).unwrap();

    let action_key = local.strategies[0].actions[0].client_key.clone();
    cache.set_goal_status(&local.client_key, Status::InProgress).unwrap();
    cache
        .set_action_status(&local.client_key, &action_key, Status::Complete)
        .unwrap();
    cache.add_milestone(&local.client_key, "Passed the theory test").unwrap();

    let mut client = HttpClient::new(&base_url).unwrap();
    let outcome = register_and_migrate(&mut client, &cache, &register("sailor@example.com"))
        .await
        .unwrap();

    assert!(outcome.report.is_complete(), "{:?}", outcome.report);
    assert!(outcome.report.vision_synced);
    assert_eq!(outcome.report.goals_synced, 2);
    assert!(cache.is_empty().unwrap());
    assert_eq!(client.token(), Some(outcome.user.token.as_str()));

    let vision = client.latest_vision().await.unwrap().unwrap();
    assert_eq!(vision.answers.see.as_deref(), Some("The northern lights"));

    let goals = client.list_goals().await.unwrap();
    assert_eq!(goals.len(), 2);
    let sailing = goals.iter().find(|g| g.title == "Learn to sail").unwrap();
    assert_eq!(sailing.status, Status::InProgress);
    assert!(sailing.start_date.is_some());
    assert_eq!(sailing.strategies[0].actions[0].status, Status::Complete);
    assert_eq!(sailing.milestones.len(), 1);
    assert_eq!(sailing.milestones[0].note, "Passed the theory test");
}

#[tokio::test]
async fn test_sync_replay_does_not_duplicate() {
    let temp_dir = TempDir::new().unwrap();
    let base_url = start_server(&temp_dir).await;
    let cache = OfflineCache::open(temp_dir.path().join("offline")).unwrap();

    let mut client = HttpClient::new(&base_url).unwrap();
    register_and_migrate(&mut client, &cache, &register("replay@example.com"))
        .await
        .unwrap();

    // Simulate an upload whose acknowledgement was lost: push the same goal
    // twice before it leaves the cache.
    let local = cache.add_goal(&goal("Run a 10k")).unwrap();
    let mut request = goal("Run a 10k");
    request.client_key = Some(local.client_key.clone());
    northstar::offline::RemoteApi::create_goal(&client, &request)
        .await
        .unwrap();

    let report = Reconciler::new(&client, &cache).sync().await.unwrap();
    assert!(report.is_complete());
    assert_eq!(report.goals_synced, 1);

    let goals = client.list_goals().await.unwrap();
    assert_eq!(goals.len(), 1);
    assert_eq!(goals[0].client_key.as_deref(), Some(local.client_key.as_str()));
}

#[tokio::test]
async fn test_vision_edit_after_lost_ack_reaches_server() {
    let temp_dir = TempDir::new().unwrap();
    let base_url = start_server(&temp_dir).await;
    let cache = OfflineCache::open(temp_dir.path().join("offline")).unwrap();

    let mut client = HttpClient::new(&base_url).unwrap();
    register_and_migrate(&mut client, &cache, &register("linguist@example.com"))
        .await
        .unwrap();

    let first = cache
        .save_vision(VisionAnswers {
            learn: Some("Spanish".into()),
            ..Default::default()
        })
        .unwrap();
    // The server stored this snapshot but the client never heard back
    let request = CreateVisionRequest {
        answers: first.answers.clone(),
        client_key: Some(first.client_key.clone()),
    };
    northstar::offline::RemoteApi::create_vision(&client, &request)
        .await
        .unwrap();

    let edited = cache
        .save_vision(VisionAnswers {
            learn: Some("Portuguese".into()),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(edited.client_key, first.client_key);

    let report = Reconciler::new(&client, &cache).sync().await.unwrap();
    assert!(report.is_complete(), "{:?}", report);
    assert!(report.vision_synced);
    assert!(cache.vision().unwrap().is_none());

    let latest = client.latest_vision().await.unwrap().unwrap();
    assert_eq!(latest.answers.learn.as_deref(), Some("Portuguese"));
    assert_ne!(latest.client_key.as_deref(), Some(first.client_key.as_str()));

    // A second pass has nothing left to push
    let report = Reconciler::new(&client, &cache).sync().await.unwrap();
    assert!(!report.vision_synced);
}

#[tokio::test]
async fn test_failed_goals_stay_for_next_sync() {
    let temp_dir = TempDir::new().unwrap();
    let base_url = start_server(&temp_dir).await;
    let cache = OfflineCache::open(temp_dir.path().join("offline")).unwrap();

    let mut client = HttpClient::new(&base_url).unwrap();
    register_and_migrate(&mut client, &cache, &register("full@example.com"))
        .await
        .unwrap();

    // Fill the server-side quota so offline goals are refused
    for i in 0..MAX_ACTIVE_GOALS {
        northstar::offline::RemoteApi::create_goal(&client, &goal(&format!("Server {}", i)))
            .await
            .unwrap();
    }
    let local = cache.add_goal(&goal("Offline extra")).unwrap();

    let report = Reconciler::new(&client, &cache).sync().await.unwrap();
    assert!(!report.is_complete());
    assert_eq!(report.goals_synced, 0);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].client_key.as_deref(), Some(local.client_key.as_str()));
    assert_eq!(cache.goals().unwrap().len(), 1);

    // Free a slot and retry
    let first = client.list_goals().await.unwrap().pop().unwrap();
    northstar::offline::RemoteApi::set_goal_status(&client, &first.id, Status::Complete)
        .await
        .unwrap();

    let report = Reconciler::new(&client, &cache).sync().await.unwrap();
    assert!(report.is_complete());
    assert!(cache.goals().unwrap().is_empty());
}

#[tokio::test]
async fn test_registration_failure_keeps_cache() {
    let temp_dir = TempDir::new().unwrap();
    let base_url = start_server(&temp_dir).await;
    let cache = OfflineCache::open(temp_dir.path().join("offline")).unwrap();
    cache.add_goal(&goal("Keep me")).unwrap();

    let mut client = HttpClient::new(&base_url).unwrap();
    let bad = RegisterRequest {
        email: Some("nope".into()),
        password: Some("short".into()),
        name: None,
    };
    assert!(register_and_migrate(&mut client, &cache, &bad).await.is_err());
    assert!(client.token().is_none());
    assert_eq!(cache.goals().unwrap().len(), 1);
}
