use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use rust_decimal::Decimal;
use tracing::info;

use crate::{
    api::{
        auth::{AdminAccess, CurrentUser},
        models::credits::{
            AccountCreate, AccountResponse, AdjustmentType, BalanceResponse, CreditAdjustment,
            CreditTransactionResponse, ListQuery, ReconcileResponse, TranslationJobResponse,
        },
        AppState,
    },
    error::{Result, SubmeterError},
};

/// Current balance of the caller
pub async fn get_balance(
    State(state): State<AppState>,
    current_user: CurrentUser,
) -> Result<Json<BalanceResponse>> {
    let balance = state.ledger.balance(&current_user.user_id).await?;

    Ok(Json(BalanceResponse {
        user_id: current_user.user_id,
        balance,
    }))
}

/// The caller's credit transactions, newest first
pub async fn list_transactions(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<CreditTransactionResponse>>> {
    let transactions = state
        .ledger
        .transactions(&current_user.user_id, query.skip(), query.limit())
        .await?;

    Ok(Json(transactions.into_iter().map(CreditTransactionResponse::from).collect()))
}

/// The caller's completed translation jobs, newest first
pub async fn list_jobs(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<TranslationJobResponse>>> {
    let jobs = state.ledger.jobs(&current_user.user_id, query.skip(), query.limit()).await?;

    Ok(Json(jobs.into_iter().map(TranslationJobResponse::from).collect()))
}

/// Open a new account
pub async fn create_account(
    State(state): State<AppState>,
    _admin: AdminAccess,
    Json(data): Json<AccountCreate>,
) -> Result<(StatusCode, Json<AccountResponse>)> {
    let initial_credits = data.initial_credits.unwrap_or(Decimal::ZERO);
    let account = state.ledger.open_account(&data.user_id, initial_credits).await?;

    info!("Opened account {} with {} credits", account.user_id, account.balance);
    Ok((StatusCode::CREATED, Json(AccountResponse::from(account))))
}

/// Grant credits to, or remove credits from, an account
pub async fn adjust_credits(
    State(state): State<AppState>,
    _admin: AdminAccess,
    Path(user_id): Path<String>,
    Json(data): Json<CreditAdjustment>,
) -> Result<(StatusCode, Json<CreditTransactionResponse>)> {
    if data.amount <= Decimal::ZERO {
        return Err(SubmeterError::Validation("Amount must be greater than zero".to_string()));
    }

    let transaction = match data.transaction_type {
        AdjustmentType::Grant => {
            let reason = data.reason.as_deref().unwrap_or("Admin grant");
            state.ledger.credit(&user_id, data.amount, reason).await?
        }
        AdjustmentType::Removal => {
            let reason = data.reason.as_deref().unwrap_or("Admin removal");
            state.ledger.remove(&user_id, data.amount, reason).await?
        }
    };

    info!(
        "Admin {:?} of {} credits for {}, balance now {}",
        data.transaction_type, transaction.amount, user_id, transaction.balance_after
    );
    Ok((StatusCode::CREATED, Json(CreditTransactionResponse::from(transaction))))
}

/// Retry every pending refund
pub async fn reconcile_refunds(State(state): State<AppState>, _admin: AdminAccess) -> Result<Json<ReconcileResponse>> {
    let report = state.workflow.reconcile_refunds().await?;
    Ok(Json(ReconcileResponse::from(report)))
}
