//! API module - HTTP handlers and routes

pub mod handlers;

use std::sync::Arc;

use axum::{
    routing::{get, post, put},
    Router,
};

use crate::accounts::AccountManager;

/// Shared state for HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub accounts: Arc<AccountManager>,
    pub start_time: std::time::Instant,
}

impl AppState {
    pub fn new(accounts: Arc<AccountManager>) -> Self {
        Self {
            accounts,
            start_time: std::time::Instant::now(),
        }
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

pub fn routes() -> Router<AppState> {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        .route("/api/health", get(handlers::health_check))
        // Accounts
        .route("/api/accounts", get(handlers::list_accounts))
        .route(
            "/api/accounts/:name",
            get(handlers::get_account).delete(handlers::remove_account),
        )
        .route("/api/accounts/:name/snapshot", get(handlers::get_snapshot))
        .route("/api/accounts/:name/readings", get(handlers::get_readings))
        .route("/api/accounts/:name/refresh", post(handlers::trigger_refresh))
        .route("/api/accounts/:name/interval", put(handlers::update_interval))
        .route("/api/accounts/:name/gaps", get(handlers::get_data_gaps))
        .route(
            "/api/accounts/:name/scenarios/:id/execute",
            post(handlers::execute_scenario),
        )
}
