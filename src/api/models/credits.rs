use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::ledger::{Account, CreditTransaction, JobStatus, TranslationJob, TransactionType, UserId};
use crate::workflow::ReconcileReport;

// Request models

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountCreate {
    pub user_id: UserId,
    /// Opening balance, zero when omitted
    #[serde(default)]
    pub initial_credits: Option<Decimal>,
}

/// Only grants and removals are allowed through the admin API
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AdjustmentType {
    Grant,
    Removal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreditAdjustment {
    pub transaction_type: AdjustmentType,
    /// Absolute amount of credits
    pub amount: Decimal,
    pub reason: Option<String>,
}

/// Query parameters for paginated listings
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListQuery {
    /// Number of items to skip
    pub skip: Option<usize>,
    /// Maximum number of items to return (default: 100, max: 1000)
    pub limit: Option<usize>,
}

impl ListQuery {
    pub fn skip(&self) -> usize {
        self.skip.unwrap_or(0)
    }

    pub fn limit(&self) -> usize {
        self.limit.unwrap_or(100).min(1000)
    }
}

// Response models

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceResponse {
    pub user_id: UserId,
    #[serde(with = "rust_decimal::serde::float")]
    pub balance: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountResponse {
    pub user_id: UserId,
    #[serde(with = "rust_decimal::serde::float")]
    pub balance: Decimal,
    pub created_at: DateTime<Utc>,
}

impl From<Account> for AccountResponse {
    fn from(account: Account) -> Self {
        Self {
            user_id: account.user_id,
            balance: account.balance,
            created_at: account.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreditTransactionResponse {
    pub id: Uuid,
    pub user_id: UserId,
    pub transaction_type: TransactionType,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub balance_after: Decimal,
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<CreditTransaction> for CreditTransactionResponse {
    fn from(tx: CreditTransaction) -> Self {
        Self {
            id: tx.id,
            user_id: tx.user_id,
            transaction_type: tx.transaction_type,
            amount: tx.amount,
            balance_after: tx.balance_after,
            reason: tx.reason,
            created_at: tx.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslationJobResponse {
    pub id: Uuid,
    pub file_name: String,
    pub translated_file_name: String,
    pub source_language: Option<String>,
    pub target_language: String,
    pub subtitle_count: usize,
    #[serde(with = "rust_decimal::serde::float")]
    pub credits_charged: Decimal,
    pub status: JobStatus,
    pub processing_time_ms: u64,
    pub created_at: DateTime<Utc>,
}

impl From<TranslationJob> for TranslationJobResponse {
    fn from(job: TranslationJob) -> Self {
        Self {
            id: job.id,
            file_name: job.file_name,
            translated_file_name: job.translated_file_name,
            source_language: job.source_language,
            target_language: job.target_language,
            subtitle_count: job.entry_count,
            credits_charged: job.credits_charged,
            status: job.status,
            processing_time_ms: job.processing_time_ms,
            created_at: job.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcileResponse {
    pub settled: usize,
    pub failed: usize,
}

impl From<ReconcileReport> for ReconcileResponse {
    fn from(report: ReconcileReport) -> Self {
        Self {
            settled: report.settled,
            failed: report.failed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_query_limit_is_capped() {
        assert_eq!(ListQuery::default().limit(), 100);
        assert_eq!(ListQuery { skip: None, limit: Some(5000) }.limit(), 1000);
        assert_eq!(ListQuery { skip: Some(3), limit: Some(10) }.skip(), 3);
    }

    #[test]
    fn test_adjustment_accepts_string_and_number_amounts() {
        let adjustment: CreditAdjustment =
            serde_json::from_str(r#"{"transactionType":"grant","amount":"12.5"}"#).unwrap();
        assert_eq!(adjustment.transaction_type, AdjustmentType::Grant);
        assert_eq!(adjustment.amount, Decimal::new(125, 1));

        let adjustment: CreditAdjustment =
            serde_json::from_str(r#"{"transactionType":"removal","amount":3,"reason":"chargeback"}"#).unwrap();
        assert_eq!(adjustment.transaction_type, AdjustmentType::Removal);
        assert_eq!(adjustment.reason.as_deref(), Some("chargeback"));
    }
}
