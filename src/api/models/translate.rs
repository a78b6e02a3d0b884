use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::workflow::TranslationOutcome;

/// Body of a successful translation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslateResponse {
    /// Always "success"
    pub status: String,
    pub job_id: Uuid,
    pub translated_content: String,
    pub translated_file_name: String,
    pub subtitle_count: usize,
    #[serde(with = "rust_decimal::serde::float")]
    pub credits_used: Decimal,
    pub processing_time_ms: u64,
}

impl From<TranslationOutcome> for TranslateResponse {
    fn from(outcome: TranslationOutcome) -> Self {
        Self {
            status: "success".to_string(),
            job_id: outcome.job_id,
            translated_content: outcome.translated_content,
            translated_file_name: outcome.translated_file_name,
            subtitle_count: outcome.subtitle_count,
            credits_used: outcome.credits_used,
            processing_time_ms: outcome.processing_time_ms,
        }
    }
}
