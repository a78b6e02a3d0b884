// Credit accounting
//
// Balances, the transaction log, job records and refund intents live behind
// the `CreditLedger` trait so the translation workflow does not care where
// they are stored.

pub mod memory;
pub mod models;

use async_trait::async_trait;
use rust_decimal::Decimal;
use uuid::Uuid;

pub use memory::MemoryLedger;
pub use models::*;

use crate::error::Result;

#[async_trait]
pub trait CreditLedger: Send + Sync {
    /// Create an account, optionally with an opening credit
    async fn open_account(&self, user_id: &str, initial_credits: Decimal) -> Result<Account>;

    /// Current balance of an existing account
    async fn balance(&self, user_id: &str) -> Result<Decimal>;

    /// Debit `amount` only if the balance covers it.
    ///
    /// The check and the debit happen as one serialized step, so two
    /// concurrent debits can never both pass against the same balance.
    async fn debit(&self, user_id: &str, amount: Decimal, reason: &str) -> Result<CreditTransaction>;

    /// Add credits to an account
    async fn credit(&self, user_id: &str, amount: Decimal, reason: &str) -> Result<CreditTransaction>;

    /// Admin removal; takes at most the current balance
    async fn remove(&self, user_id: &str, amount: Decimal, reason: &str) -> Result<CreditTransaction>;

    /// Transactions of one user, newest first
    async fn transactions(&self, user_id: &str, skip: usize, limit: usize) -> Result<Vec<CreditTransaction>>;

    /// Refund `debit` in full without a recorded intent
    async fn refund(&self, debit: &CreditTransaction, reason: &str) -> Result<CreditTransaction>;

    /// Persist the intent to refund `debit` before any refund is attempted
    async fn open_refund(&self, debit: &CreditTransaction, reason: &str) -> Result<RefundIntent>;

    /// Apply a pending refund and mark it settled in one step.
    /// Settling an already settled intent returns its refund transaction.
    async fn settle_refund(&self, intent_id: Uuid) -> Result<CreditTransaction>;

    async fn pending_refunds(&self) -> Result<Vec<RefundIntent>>;

    async fn record_job(&self, job: TranslationJob) -> Result<()>;

    /// Jobs of one user, newest first
    async fn jobs(&self, user_id: &str, skip: usize, limit: usize) -> Result<Vec<TranslationJob>>;
}
