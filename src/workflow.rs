use chrono::Utc;
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::error::{Result, SubmeterError};
use crate::ledger::{CreditLedger, CreditTransaction, JobStatus, TranslationJob};
use crate::pricing::Pricing;
use crate::subtitle::{parse_upload, translated_file_name};
use crate::translate::{build_provider, TranslationProvider, TranslationRequest};

/// Subtitle file as received from the client
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

/// Unvalidated input of a metered translation
#[derive(Debug, Clone, Default)]
pub struct TranslateUpload {
    pub user_id: Option<String>,
    pub file: Option<UploadedFile>,
    pub target_language: Option<String>,
    pub source_language: Option<String>,
}

#[derive(Debug, Clone)]
pub struct TranslationOutcome {
    pub job_id: Uuid,
    pub translated_content: String,
    pub translated_file_name: String,
    pub subtitle_count: usize,
    pub credits_used: Decimal,
    pub processing_time_ms: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub settled: usize,
    pub failed: usize,
}

/// Credit-metered translation: charge up front, translate, refund on failure
pub struct Workflow {
    ledger: Arc<dyn CreditLedger>,
    provider: Option<Arc<dyn TranslationProvider>>,
    pricing: Pricing,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl Workflow {
    pub fn new(
        ledger: Arc<dyn CreditLedger>,
        provider: Option<Arc<dyn TranslationProvider>>,
        pricing: Pricing,
    ) -> Self {
        Self {
            ledger,
            provider,
            pricing,
        }
    }

    /// Build from configuration. A provider that cannot be built is logged
    /// and reported to callers as a configuration error per request.
    pub fn from_config(config: &Config, ledger: Arc<dyn CreditLedger>) -> Self {
        let provider = match build_provider(&config.translate) {
            Ok(provider) => Some(provider),
            Err(e) => {
                warn!("Translation provider unavailable: {}", e);
                None
            }
        };

        Self::new(ledger, provider, Pricing::from_config(&config.billing))
    }

    /// Run one metered translation
    pub async fn translate_upload(&self, upload: TranslateUpload) -> Result<TranslationOutcome> {
        let started = Instant::now();

        let user_id = non_blank(upload.user_id).ok_or(SubmeterError::Unauthenticated)?;
        let file = upload
            .file
            .ok_or_else(|| SubmeterError::Validation("No file provided".to_string()))?;

        let (format, entries) = parse_upload(&file.name, &file.bytes)?;

        let target_language = non_blank(upload.target_language)
            .ok_or_else(|| SubmeterError::Validation("Target language is required".to_string()))?;
        let source_language = non_blank(upload.source_language);

        let provider = self.provider.clone().ok_or_else(|| {
            SubmeterError::Config("Translation provider is not configured".to_string())
        })?;

        let subtitle_count = entries.len();
        let cost = self.pricing.cost(subtitle_count);

        info!(
            "User {} translating {} ({} {} entries, {} batches) to {} for {} credits",
            user_id,
            file.name,
            subtitle_count,
            format,
            self.pricing.batches(subtitle_count),
            target_language,
            cost
        );

        let debit = self
            .ledger
            .debit(
                &user_id,
                cost,
                &format!("Translation of {} ({} entries) to {}", file.name, subtitle_count, target_language),
            )
            .await?;

        let request = TranslationRequest {
            entries,
            target_language: target_language.clone(),
            source_language: source_language.clone(),
        };

        let translated = match provider.translate(&request).await {
            Ok(translated) => translated,
            Err(e) => {
                warn!("Translation of {} for user {} failed: {}", file.name, user_id, e);
                self.refund(&debit, &format!("Refund: translation of {} failed", file.name))
                    .await;
                return Err(match e {
                    SubmeterError::Provider(_) => e,
                    other => SubmeterError::Provider(other.to_string()),
                });
            }
        };

        let translated_content = format.serialize(&translated);
        let translated_file_name = translated_file_name(&file.name, &target_language, format);
        let processing_time_ms = started.elapsed().as_millis() as u64;

        let job = TranslationJob {
            id: Uuid::new_v4(),
            user_id: user_id.clone(),
            file_name: file.name.clone(),
            translated_file_name: translated_file_name.clone(),
            source_language,
            target_language,
            entry_count: subtitle_count,
            credits_charged: cost,
            status: JobStatus::Completed,
            processing_time_ms,
            created_at: Utc::now(),
        };
        let job_id = job.id;

        // A lost job record does not undo a delivered translation
        if let Err(e) = self.ledger.record_job(job).await {
            error!("Failed to record translation job {} for user {}: {}", job_id, user_id, e);
        }

        info!(
            "Translated {} for user {} in {}ms, charged {} credits",
            file.name, user_id, processing_time_ms, cost
        );

        Ok(TranslationOutcome {
            job_id,
            translated_content,
            translated_file_name,
            subtitle_count,
            credits_used: cost,
            processing_time_ms,
        })
    }

    /// Compensate a debit. Failures are logged, never surfaced; a pending
    /// intent is left behind for reconciliation.
    async fn refund(&self, debit: &CreditTransaction, reason: &str) {
        let intent = match self.ledger.open_refund(debit, reason).await {
            Ok(intent) => intent,
            Err(e) => {
                error!(
                    "Failed to record refund intent for debit {} ({} credits, user {}): {}",
                    debit.id, debit.amount, debit.user_id, e
                );
                // Nothing to reconcile later without an intent
                match self.ledger.refund(debit, reason).await {
                    Ok(tx) => info!("Refunded {} credits to {} ({})", tx.amount, tx.user_id, tx.id),
                    Err(e) => error!(
                        "Refund of {} credits to {} was lost: {}",
                        debit.amount, debit.user_id, e
                    ),
                }
                return;
            }
        };

        match self.ledger.settle_refund(intent.id).await {
            Ok(tx) => info!("Refunded {} credits to {} ({})", tx.amount, tx.user_id, tx.id),
            Err(e) => error!(
                "Refund {} of {} credits to {} failed, left pending: {}",
                intent.id, intent.amount, intent.user_id, e
            ),
        }
    }

    /// Retry every pending refund intent
    pub async fn reconcile_refunds(&self) -> Result<ReconcileReport> {
        let pending = self.ledger.pending_refunds().await?;
        let mut report = ReconcileReport::default();

        if pending.is_empty() {
            return Ok(report);
        }
        info!("Reconciling {} pending refund(s)", pending.len());

        for intent in pending {
            match self.ledger.settle_refund(intent.id).await {
                Ok(tx) => {
                    info!("Settled refund {} ({} credits to {})", intent.id, tx.amount, tx.user_id);
                    report.settled += 1;
                }
                Err(e) => {
                    warn!("Refund {} still pending: {}", intent.id, e);
                    report.failed += 1;
                }
            }
        }

        Ok(report)
    }
}
