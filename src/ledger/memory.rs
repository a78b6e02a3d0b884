use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, info, trace};
use uuid::Uuid;

use super::models::*;
use super::CreditLedger;
use crate::config::LedgerConfig;
use crate::error::{Result, SubmeterError};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct LedgerState {
    accounts: BTreeMap<UserId, Account>,
    transactions: Vec<CreditTransaction>,
    jobs: Vec<TranslationJob>,
    refunds: Vec<RefundIntent>,
}

impl LedgerState {
    fn account_mut(&mut self, user_id: &str) -> Result<&mut Account> {
        self.accounts
            .get_mut(user_id)
            .ok_or_else(|| SubmeterError::UserNotFound(user_id.to_string()))
    }

    fn append(
        &mut self,
        user_id: &str,
        transaction_type: TransactionType,
        amount: Decimal,
        reason: Option<&str>,
    ) -> Result<CreditTransaction> {
        let account = self.account_mut(user_id)?;

        let balance_after = if transaction_type.is_debit() {
            account.balance - amount
        } else {
            account.balance + amount
        };

        if balance_after < Decimal::ZERO {
            return Err(SubmeterError::InsufficientCredits {
                required: amount,
                available: account.balance,
            });
        }
        account.balance = balance_after;

        let transaction = CreditTransaction {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            transaction_type,
            amount,
            balance_after,
            reason: reason.map(str::to_string),
            created_at: Utc::now(),
        };
        self.transactions.push(transaction.clone());

        Ok(transaction)
    }
}

fn ensure_positive(amount: Decimal) -> Result<()> {
    if amount <= Decimal::ZERO {
        return Err(SubmeterError::Validation(
            "Amount must be greater than zero".to_string(),
        ));
    }
    Ok(())
}

fn ensure_debit(transaction: &CreditTransaction) -> Result<()> {
    if !transaction.transaction_type.is_debit() {
        return Err(SubmeterError::Validation(format!(
            "Transaction {} is not a debit",
            transaction.id
        )));
    }
    Ok(())
}

/// Ledger held in memory, optionally mirrored to a JSON snapshot file.
///
/// All mutations go through one async mutex. With a snapshot configured, each
/// mutation is applied to a copy of the state, written to the snapshot and
/// only then published, so a failed write leaves the ledger untouched.
pub struct MemoryLedger {
    state: Mutex<LedgerState>,
    snapshot_path: Option<PathBuf>,
}

impl Default for MemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryLedger {
    /// Ledger without persistence
    pub fn new() -> Self {
        Self {
            state: Mutex::new(LedgerState::default()),
            snapshot_path: None,
        }
    }

    /// Open a ledger backed by a snapshot file, loading it if it exists
    pub async fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let state = match tokio::fs::read(&path).await {
            Ok(bytes) => {
                let state: LedgerState = serde_json::from_slice(&bytes).map_err(|e| {
                    SubmeterError::Persistence(format!(
                        "Failed to parse ledger snapshot {}: {}",
                        path.display(),
                        e
                    ))
                })?;
                info!(
                    "Loaded ledger snapshot {} ({} accounts, {} transactions)",
                    path.display(),
                    state.accounts.len(),
                    state.transactions.len()
                );
                state
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("No ledger snapshot at {}, starting empty", path.display());
                LedgerState::default()
            }
            Err(e) => {
                return Err(SubmeterError::Persistence(format!(
                    "Failed to read ledger snapshot {}: {}",
                    path.display(),
                    e
                )));
            }
        };

        Ok(Self {
            state: Mutex::new(state),
            snapshot_path: Some(path),
        })
    }

    pub async fn from_config(config: &LedgerConfig) -> Result<Self> {
        match &config.path {
            Some(path) => Self::open(path).await,
            None => Ok(Self::new()),
        }
    }

    async fn read<T>(&self, f: impl FnOnce(&LedgerState) -> Result<T>) -> Result<T> {
        let state = self.state.lock().await;
        f(&state)
    }

    async fn mutate<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut LedgerState) -> Result<T>,
    {
        let mut state = self.state.lock().await;
        trace!("Acquired ledger lock");

        // Every mutation validates before it writes, so without a snapshot
        // the state can be changed in place
        let Some(path) = &self.snapshot_path else {
            return f(&mut state);
        };

        let mut next = state.clone();
        let value = f(&mut next)?;

        write_snapshot(path, &next).await?;

        *state = next;
        Ok(value)
    }
}

async fn write_snapshot(path: &Path, state: &LedgerState) -> Result<()> {
    let persistence = |e: std::io::Error| {
        SubmeterError::Persistence(format!("Failed to write ledger snapshot {}: {}", path.display(), e))
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(persistence)?;
    }

    let content = serde_json::to_vec_pretty(state)?;
    let tmp_path = path.with_extension("json.tmp");
    tokio::fs::write(&tmp_path, content).await.map_err(persistence)?;
    tokio::fs::rename(&tmp_path, path).await.map_err(persistence)?;

    debug!("Wrote ledger snapshot {}", path.display());
    Ok(())
}

#[async_trait]
impl CreditLedger for MemoryLedger {
    async fn open_account(&self, user_id: &str, initial_credits: Decimal) -> Result<Account> {
        if user_id.trim().is_empty() {
            return Err(SubmeterError::Validation("User id must not be empty".to_string()));
        }
        if initial_credits < Decimal::ZERO {
            return Err(SubmeterError::Validation(
                "Initial credits must not be negative".to_string(),
            ));
        }

        self.mutate(|state| {
            if state.accounts.contains_key(user_id) {
                return Err(SubmeterError::AccountExists(user_id.to_string()));
            }

            state.accounts.insert(
                user_id.to_string(),
                Account {
                    user_id: user_id.to_string(),
                    balance: Decimal::ZERO,
                    created_at: Utc::now(),
                },
            );

            if initial_credits > Decimal::ZERO {
                state.append(user_id, TransactionType::Credit, initial_credits, Some("Opening balance"))?;
            }

            state
                .accounts
                .get(user_id)
                .cloned()
                .ok_or_else(|| SubmeterError::UserNotFound(user_id.to_string()))
        })
        .await
    }

    async fn balance(&self, user_id: &str) -> Result<Decimal> {
        self.read(|state| {
            state
                .accounts
                .get(user_id)
                .map(|account| account.balance)
                .ok_or_else(|| SubmeterError::UserNotFound(user_id.to_string()))
        })
        .await
    }

    async fn debit(&self, user_id: &str, amount: Decimal, reason: &str) -> Result<CreditTransaction> {
        ensure_positive(amount)?;
        self.mutate(|state| state.append(user_id, TransactionType::Debit, amount, Some(reason)))
            .await
    }

    async fn credit(&self, user_id: &str, amount: Decimal, reason: &str) -> Result<CreditTransaction> {
        ensure_positive(amount)?;
        self.mutate(|state| state.append(user_id, TransactionType::Credit, amount, Some(reason)))
            .await
    }

    async fn remove(&self, user_id: &str, amount: Decimal, reason: &str) -> Result<CreditTransaction> {
        ensure_positive(amount)?;
        self.mutate(|state| {
            let available = state.account_mut(user_id)?.balance;
            if available <= Decimal::ZERO {
                return Err(SubmeterError::Validation(format!(
                    "Account {} has no credits to remove",
                    user_id
                )));
            }

            let clamped = amount.min(available);
            state.append(user_id, TransactionType::Debit, clamped, Some(reason))
        })
        .await
    }

    async fn transactions(&self, user_id: &str, skip: usize, limit: usize) -> Result<Vec<CreditTransaction>> {
        self.read(|state| {
            if !state.accounts.contains_key(user_id) {
                return Err(SubmeterError::UserNotFound(user_id.to_string()));
            }

            Ok(state
                .transactions
                .iter()
                .rev()
                .filter(|tx| tx.user_id == user_id)
                .skip(skip)
                .take(limit)
                .cloned()
                .collect())
        })
        .await
    }

    async fn refund(&self, debit: &CreditTransaction, reason: &str) -> Result<CreditTransaction> {
        ensure_debit(debit)?;
        self.mutate(|state| state.append(&debit.user_id, TransactionType::Refund, debit.amount, Some(reason)))
            .await
    }

    async fn open_refund(&self, debit: &CreditTransaction, reason: &str) -> Result<RefundIntent> {
        ensure_debit(debit)?;

        self.mutate(|state| {
            let intent = RefundIntent {
                id: Uuid::new_v4(),
                user_id: debit.user_id.clone(),
                amount: debit.amount,
                reason: reason.to_string(),
                debit_transaction_id: debit.id,
                status: RefundStatus::Pending,
                refund_transaction_id: None,
                created_at: Utc::now(),
                settled_at: None,
            };
            state.refunds.push(intent.clone());
            Ok(intent)
        })
        .await
    }

    async fn settle_refund(&self, intent_id: Uuid) -> Result<CreditTransaction> {
        self.mutate(|state| {
            let intent = state
                .refunds
                .iter()
                .find(|intent| intent.id == intent_id)
                .cloned()
                .ok_or_else(|| SubmeterError::NotFound {
                    resource: "Refund intent".to_string(),
                    id: intent_id.to_string(),
                })?;

            if let Some(refund_id) = intent.refund_transaction_id {
                return state
                    .transactions
                    .iter()
                    .find(|tx| tx.id == refund_id)
                    .cloned()
                    .ok_or_else(|| SubmeterError::NotFound {
                        resource: "Transaction".to_string(),
                        id: refund_id.to_string(),
                    });
            }

            let refund = state.append(
                &intent.user_id,
                TransactionType::Refund,
                intent.amount,
                Some(&intent.reason),
            )?;

            if let Some(stored) = state.refunds.iter_mut().find(|i| i.id == intent_id) {
                stored.status = RefundStatus::Settled;
                stored.refund_transaction_id = Some(refund.id);
                stored.settled_at = Some(refund.created_at);
            }

            Ok(refund)
        })
        .await
    }

    async fn pending_refunds(&self) -> Result<Vec<RefundIntent>> {
        self.read(|state| {
            Ok(state
                .refunds
                .iter()
                .filter(|intent| intent.status == RefundStatus::Pending)
                .cloned()
                .collect())
        })
        .await
    }

    async fn record_job(&self, job: TranslationJob) -> Result<()> {
        self.mutate(|state| {
            state.jobs.push(job);
            Ok(())
        })
        .await
    }

    async fn jobs(&self, user_id: &str, skip: usize, limit: usize) -> Result<Vec<TranslationJob>> {
        self.read(|state| {
            if !state.accounts.contains_key(user_id) {
                return Err(SubmeterError::UserNotFound(user_id.to_string()));
            }

            Ok(state
                .jobs
                .iter()
                .rev()
                .filter(|job| job.user_id == user_id)
                .skip(skip)
                .take(limit)
                .cloned()
                .collect())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use std::sync::Arc;

    fn credits(value: &str) -> Decimal {
        Decimal::from_str(value).unwrap()
    }

    async fn ledger_with_user(balance: &str) -> MemoryLedger {
        let ledger = MemoryLedger::new();
        ledger.open_account("user-1", credits(balance)).await.unwrap();
        ledger
    }

    #[tokio::test]
    async fn test_open_account_records_opening_balance() {
        let ledger = ledger_with_user("10").await;

        assert_eq!(ledger.balance("user-1").await.unwrap(), credits("10"));
        let transactions = ledger.transactions("user-1", 0, 10).await.unwrap();
        assert_eq!(transactions.len(), 1);
        assert_eq!(transactions[0].transaction_type, TransactionType::Credit);
        assert_eq!(transactions[0].balance_after, credits("10"));
    }

    #[tokio::test]
    async fn test_open_account_twice_conflicts() {
        let ledger = ledger_with_user("0").await;
        let result = ledger.open_account("user-1", Decimal::ZERO).await;
        assert!(matches!(result, Err(SubmeterError::AccountExists(_))));
    }

    #[tokio::test]
    async fn test_unknown_user_is_not_found() {
        let ledger = MemoryLedger::new();
        assert!(matches!(ledger.balance("ghost").await, Err(SubmeterError::UserNotFound(_))));
        assert!(matches!(
            ledger.debit("ghost", credits("1"), "test").await,
            Err(SubmeterError::UserNotFound(_))
        ));
        assert!(matches!(
            ledger.transactions("ghost", 0, 10).await,
            Err(SubmeterError::UserNotFound(_))
        ));
        assert!(matches!(ledger.jobs("ghost", 0, 10).await, Err(SubmeterError::UserNotFound(_))));
    }

    #[tokio::test]
    async fn test_failed_mutations_leave_memory_state_untouched() {
        let ledger = ledger_with_user("1").await;

        assert!(ledger.debit("user-1", credits("5"), "too much").await.is_err());
        assert!(ledger.open_account("user-1", credits("3")).await.is_err());
        assert!(ledger.settle_refund(Uuid::new_v4()).await.is_err());

        assert_eq!(ledger.balance("user-1").await.unwrap(), credits("1"));
        assert_eq!(ledger.transactions("user-1", 0, 10).await.unwrap().len(), 1);
        assert!(ledger.pending_refunds().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_debit_tracks_balance_after() {
        let ledger = ledger_with_user("5").await;

        let debit = ledger.debit("user-1", credits("2.1"), "translation").await.unwrap();
        assert_eq!(debit.transaction_type, TransactionType::Debit);
        assert_eq!(debit.amount, credits("2.1"));
        assert_eq!(debit.balance_after, credits("2.9"));
        assert_eq!(ledger.balance("user-1").await.unwrap(), credits("2.9"));
    }

    #[tokio::test]
    async fn test_insufficient_debit_leaves_balance_untouched() {
        let ledger = ledger_with_user("0.5").await;

        let result = ledger.debit("user-1", credits("0.7"), "translation").await;
        match result {
            Err(SubmeterError::InsufficientCredits { required, available }) => {
                assert_eq!(required, credits("0.7"));
                assert_eq!(available, credits("0.5"));
            }
            other => panic!("Expected InsufficientCredits, got {:?}", other),
        }

        assert_eq!(ledger.balance("user-1").await.unwrap(), credits("0.5"));
        assert_eq!(ledger.transactions("user-1", 0, 10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_non_positive_amounts_are_rejected() {
        let ledger = ledger_with_user("5").await;
        assert!(matches!(
            ledger.debit("user-1", Decimal::ZERO, "noop").await,
            Err(SubmeterError::Validation(_))
        ));
        assert!(matches!(
            ledger.credit("user-1", credits("-1"), "noop").await,
            Err(SubmeterError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_remove_clamps_to_zero() {
        let ledger = ledger_with_user("3").await;

        let removal = ledger.remove("user-1", credits("10"), "chargeback").await.unwrap();
        assert_eq!(removal.amount, credits("3"));
        assert_eq!(removal.balance_after, Decimal::ZERO);

        let again = ledger.remove("user-1", credits("1"), "chargeback").await;
        assert!(matches!(again, Err(SubmeterError::Validation(_))));
    }

    #[tokio::test]
    async fn test_concurrent_debits_never_overdraw() {
        let ledger = Arc::new(ledger_with_user("2.1").await);

        let mut handles = Vec::new();
        for _ in 0..10 {
            let ledger = ledger.clone();
            handles.push(tokio::spawn(async move {
                ledger.debit("user-1", credits("0.7"), "translation").await
            }));
        }

        let mut succeeded = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                succeeded += 1;
            }
        }

        assert_eq!(succeeded, 3);
        assert_eq!(ledger.balance("user-1").await.unwrap(), Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_refund_intent_settles_once() {
        let ledger = ledger_with_user("10").await;
        let debit = ledger.debit("user-1", credits("0.7"), "translation").await.unwrap();

        let intent = ledger.open_refund(&debit, "provider failed").await.unwrap();
        assert_eq!(intent.status, RefundStatus::Pending);
        assert_eq!(ledger.pending_refunds().await.unwrap().len(), 1);

        let refund = ledger.settle_refund(intent.id).await.unwrap();
        assert_eq!(refund.transaction_type, TransactionType::Refund);
        assert_eq!(refund.balance_after, credits("10"));
        assert!(ledger.pending_refunds().await.unwrap().is_empty());

        let again = ledger.settle_refund(intent.id).await.unwrap();
        assert_eq!(again.id, refund.id);
        assert_eq!(ledger.balance("user-1").await.unwrap(), credits("10"));
    }

    #[tokio::test]
    async fn test_open_refund_rejects_credit_transactions() {
        let ledger = ledger_with_user("10").await;
        let credit = ledger.credit("user-1", credits("1"), "bonus").await.unwrap();
        assert!(ledger.open_refund(&credit, "oops").await.is_err());
        assert!(ledger.refund(&credit, "oops").await.is_err());
    }

    #[tokio::test]
    async fn test_direct_refund_pairs_with_debit() {
        let ledger = ledger_with_user("10").await;
        let debit = ledger.debit("user-1", credits("0.7"), "translation").await.unwrap();

        let refund = ledger.refund(&debit, "translation failed").await.unwrap();
        assert_eq!(refund.transaction_type, TransactionType::Refund);
        assert_eq!(refund.amount, credits("0.7"));
        assert_eq!(refund.balance_after, credits("10"));

        let types: Vec<_> = ledger
            .transactions("user-1", 0, 10)
            .await
            .unwrap()
            .into_iter()
            .map(|tx| tx.transaction_type)
            .collect();
        assert_eq!(
            types,
            vec![TransactionType::Refund, TransactionType::Debit, TransactionType::Credit]
        );
        assert!(ledger.pending_refunds().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_listing_is_newest_first_with_pagination() {
        let ledger = ledger_with_user("10").await;
        for i in 1..=3 {
            ledger.debit("user-1", credits("1"), &format!("debit {}", i)).await.unwrap();
        }

        let page = ledger.transactions("user-1", 1, 2).await.unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].reason.as_deref(), Some("debit 2"));
        assert_eq!(page[1].reason.as_deref(), Some("debit 1"));
    }

    #[tokio::test]
    async fn test_snapshot_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.json");

        {
            let ledger = MemoryLedger::open(&path).await.unwrap();
            ledger.open_account("user-1", credits("5")).await.unwrap();
            ledger.debit("user-1", credits("2.1"), "translation").await.unwrap();
        }

        let reopened = MemoryLedger::open(&path).await.unwrap();
        assert_eq!(reopened.balance("user-1").await.unwrap(), credits("2.9"));
        assert_eq!(reopened.transactions("user-1", 0, 10).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_failed_snapshot_write_leaves_state_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let state_dir = dir.path().join("state");
        let path = state_dir.join("ledger.json");

        let ledger = MemoryLedger::open(&path).await.unwrap();
        ledger.open_account("user-1", credits("5")).await.unwrap();

        // Replace the snapshot directory with a plain file so writes fail
        std::fs::remove_dir_all(&state_dir).unwrap();
        std::fs::write(&state_dir, b"not a directory").unwrap();

        let result = ledger.debit("user-1", credits("1"), "translation").await;
        assert!(matches!(result, Err(SubmeterError::Persistence(_))));
        assert_eq!(ledger.balance("user-1").await.unwrap(), credits("5"));
    }
}
