//! Offline mirror and its reconciliation with the server
//!
//! Visitors keep their vision and goals in an `OfflineCache`. On
//! registration, `register_and_migrate` creates the account and pushes the
//! cache through a `Reconciler`.

pub mod cache;
pub mod client;
pub mod sync;

pub use cache::{
    OfflineAction, OfflineCache, OfflineGoal, OfflineMilestone, OfflineStrategy, OfflineVision,
    CACHE_VERSION,
};
pub use client::{HttpClient, RemoteApi};
pub use sync::{register_and_migrate, MigrationOutcome, Reconciler, SyncFailure, SyncReport};
