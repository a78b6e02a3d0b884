use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque identity handed to us by the upstream identity provider
pub type UserId = String;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Account {
    pub user_id: UserId,
    pub balance: Decimal,
    pub created_at: DateTime<Utc>,
}

/// Direction of a balance change
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    Debit,
    Credit,
    Refund,
}

impl TransactionType {
    pub fn is_debit(&self) -> bool {
        matches!(self, Self::Debit)
    }
}

/// Append-only record of one balance mutation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CreditTransaction {
    pub id: Uuid,
    pub user_id: UserId,
    pub transaction_type: TransactionType,
    /// Always positive; the direction comes from `transaction_type`
    pub amount: Decimal,
    pub balance_after: Decimal,
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Completed,
}

/// Record of a finished translation run
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TranslationJob {
    pub id: Uuid,
    pub user_id: UserId,
    pub file_name: String,
    pub translated_file_name: String,
    pub source_language: Option<String>,
    pub target_language: String,
    pub entry_count: usize,
    pub credits_charged: Decimal,
    pub status: JobStatus,
    pub processing_time_ms: u64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RefundStatus {
    Pending,
    Settled,
}

/// A refund that is owed to a user, written before the refund is attempted
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RefundIntent {
    pub id: Uuid,
    pub user_id: UserId,
    pub amount: Decimal,
    pub reason: String,
    pub debit_transaction_id: Uuid,
    pub status: RefundStatus,
    pub refund_transaction_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub settled_at: Option<DateTime<Utc>>,
}
