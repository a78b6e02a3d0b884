// HTTP surface
//
// - /api/v1: metered translation and self-service reads for the caller
// - /admin/api/v1: account and credit administration, bearer token protected
// - /healthz: liveness

pub mod auth;
pub mod handlers;
pub mod models;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::ledger::CreditLedger;
use crate::workflow::Workflow;

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub workflow: Arc<Workflow>,
    pub ledger: Arc<dyn CreditLedger>,
    pub admin_token: Option<String>,
}

impl AppState {
    pub fn new(workflow: Arc<Workflow>, ledger: Arc<dyn CreditLedger>, admin_token: Option<String>) -> Self {
        Self {
            workflow,
            ledger,
            admin_token: admin_token.filter(|token| !token.trim().is_empty()),
        }
    }
}

pub fn build_router(state: AppState, max_upload_bytes: usize) -> Router {
    let api_routes = Router::new()
        .route("/translate", post(handlers::translate::translate_subtitles))
        .route("/me/balance", get(handlers::credits::get_balance))
        .route("/me/transactions", get(handlers::credits::list_transactions))
        .route("/me/jobs", get(handlers::credits::list_jobs));

    let admin_routes = Router::new()
        .route("/accounts", post(handlers::credits::create_account))
        .route("/accounts/{user_id}/credits", post(handlers::credits::adjust_credits))
        .route("/refunds/reconcile", post(handlers::credits::reconcile_refunds));

    Router::new()
        .route("/healthz", get(handlers::health))
        .nest("/api/v1", api_routes)
        .nest("/admin/api/v1", admin_routes)
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::ledger::MemoryLedger;
    use crate::pricing::Pricing;
    use crate::translate::TranslationProvider;
    use axum_test::TestServer;
    use rust_decimal::Decimal;
    use std::str::FromStr;

    pub const ADMIN_TOKEN: &str = "test-admin-token";

    pub fn credits(value: &str) -> Decimal {
        Decimal::from_str(value).unwrap()
    }

    pub async fn create_test_server(
        provider: Option<Arc<dyn TranslationProvider>>,
        accounts: &[(&str, &str)],
    ) -> (TestServer, Arc<MemoryLedger>) {
        let ledger = Arc::new(MemoryLedger::new());
        for (user_id, balance) in accounts {
            ledger.open_account(user_id, credits(balance)).await.unwrap();
        }

        let workflow = Arc::new(Workflow::new(ledger.clone(), provider, Pricing::default()));
        let state = AppState::new(workflow, ledger.clone(), Some(ADMIN_TOKEN.to_string()));
        let server = TestServer::new(build_router(state, 64 * 1024)).expect("Failed to create test server");

        (server, ledger)
    }
}
