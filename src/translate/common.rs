use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info, warn};

use crate::error::{Result, SubmeterError};
use crate::subtitle::SubtitleEntry;
use super::{CompletionClient, TranslationProvider, TranslationRequest};

pub const SYSTEM_PROMPT: &str = "You are a professional subtitle translator. \
You always answer with a single JSON object and nothing else.";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchTranslation {
    pub translations: Vec<String>,
}

/// Provider that sends entries to an LLM in fixed-size chunks, one chunk at a time
pub struct LlmProvider<C> {
    client: C,
    chunk_size: usize,
}

impl<C: CompletionClient> LlmProvider<C> {
    pub fn new(client: C, chunk_size: usize) -> Self {
        Self {
            client,
            chunk_size: chunk_size.max(1),
        }
    }
}

#[async_trait]
impl<C: CompletionClient> TranslationProvider for LlmProvider<C> {
    async fn translate(&self, request: &TranslationRequest) -> Result<Vec<SubtitleEntry>> {
        let total_chunks = request.entries.len().div_ceil(self.chunk_size);
        info!(
            "Translating {} entries to {} in {} chunk(s)",
            request.entries.len(),
            request.target_language,
            total_chunks
        );

        let mut translated = Vec::with_capacity(request.entries.len());

        for (chunk_idx, chunk) in request.entries.chunks(self.chunk_size).enumerate() {
            let lines: Vec<&str> = chunk.iter().map(|entry| entry.text.as_str()).collect();
            let prompt = build_batch_prompt(
                &lines,
                &request.target_language,
                request.source_language.as_deref(),
            );

            debug!("Sending chunk {}/{} ({} lines)", chunk_idx + 1, total_chunks, lines.len());

            let raw_response = self.client.complete(SYSTEM_PROMPT, &prompt).await?;
            let translations = parse_batch_response(&raw_response, lines.len())?;

            translated.extend(chunk.iter().zip(translations).map(|(entry, text)| SubtitleEntry {
                text,
                ..entry.clone()
            }));
        }

        Ok(translated)
    }
}

/// Build the prompt for one chunk of subtitle lines
pub fn build_batch_prompt(lines: &[&str], target_language: &str, source_language: Option<&str>) -> String {
    let target_name = language_code_to_name(target_language);
    let source_clause = match source_language {
        Some(code) if !code.trim().is_empty() => {
            format!("from {} ", language_code_to_name(code))
        }
        _ => String::new(),
    };

    let payload = json!({ "lines": lines }).to_string();

    format!(
        "Translate each subtitle line {}to {} (language code: {}).\n\
         \n\
         RULES:\n\
         1. Return exactly {} translations, in the same order as the input lines.\n\
         2. Keep line breaks inside a line and any formatting tags such as <i>.\n\
         3. Do not merge, split, explain or skip lines.\n\
         \n\
         Return ONLY a JSON object in the form {{\"translations\": [\"...\"]}}.\n\
         \n\
         [Input]\n\
         {}\n",
        source_clause,
        target_name,
        target_language,
        lines.len(),
        payload
    )
}

/// Parse the model output for one chunk.
///
/// Accepts the bare JSON object, the object wrapped in markdown code fences,
/// or the object embedded in surrounding prose.
pub fn parse_batch_response(response: &str, expected: usize) -> Result<Vec<String>> {
    let parsed = try_flexible_json_parsing(response).ok_or_else(|| {
        warn!("Failed to parse provider response: {}", response);
        SubmeterError::Provider("Provider returned an unparseable response".to_string())
    })?;

    if parsed.translations.len() != expected {
        return Err(SubmeterError::Provider(format!(
            "Provider returned {} translations for {} lines",
            parsed.translations.len(),
            expected
        )));
    }

    Ok(parsed.translations)
}

fn try_flexible_json_parsing(text: &str) -> Option<BatchTranslation> {
    let text = text.trim();

    if let Ok(parsed) = serde_json::from_str::<BatchTranslation>(text) {
        return Some(parsed);
    }

    let cleaned = remove_markdown_code_blocks(text);
    if cleaned != text {
        if let Ok(parsed) = serde_json::from_str::<BatchTranslation>(&cleaned) {
            return Some(parsed);
        }
    }

    // Fall back to the outermost braces
    let start = cleaned.find('{')?;
    let end = cleaned.rfind('}')?;
    if start >= end {
        return None;
    }
    serde_json::from_str::<BatchTranslation>(&cleaned[start..=end]).ok()
}

fn remove_markdown_code_blocks(text: &str) -> String {
    let text = text.trim();

    if let Some(inner) = text.strip_prefix("```json").and_then(|t| t.strip_suffix("```")) {
        return inner.trim().to_string();
    }
    if let Some(inner) = text.strip_prefix("```").and_then(|t| t.strip_suffix("```")) {
        return inner.trim().to_string();
    }

    text.to_string()
}

/// Convert language code to full language name for clearer prompts
pub fn language_code_to_name(code: &str) -> String {
    let name = match code.trim().to_lowercase().as_str() {
        "en" => "English",
        "cs" => "Czech",
        "sk" => "Slovak",
        "pl" => "Polish",
        "de" => "German",
        "fr" => "French",
        "es" => "Spanish",
        "it" => "Italian",
        "pt" => "Portuguese",
        "nl" => "Dutch",
        "sv" => "Swedish",
        "da" => "Danish",
        "no" => "Norwegian",
        "fi" => "Finnish",
        "hu" => "Hungarian",
        "ro" => "Romanian",
        "bg" => "Bulgarian",
        "hr" => "Croatian",
        "sl" => "Slovenian",
        "el" => "Greek",
        "tr" => "Turkish",
        "ru" => "Russian",
        "uk" => "Ukrainian",
        "ar" => "Arabic",
        "he" => "Hebrew",
        "hi" => "Hindi",
        "th" => "Thai",
        "vi" => "Vietnamese",
        "id" => "Indonesian",
        "ja" => "Japanese",
        "ko" => "Korean",
        "zh" => "Chinese",
        _ => return code.to_string(),
    };
    name.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Completion client that uppercases every input line
    struct UppercaseClient {
        prompts: Mutex<Vec<String>>,
    }

    impl UppercaseClient {
        fn new() -> Self {
            Self {
                prompts: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl CompletionClient for UppercaseClient {
        async fn complete(&self, _system_prompt: &str, prompt: &str) -> Result<String> {
            self.prompts.lock().unwrap().push(prompt.to_string());

            let input = prompt.rsplit("[Input]\n").next().unwrap().trim();
            let value: serde_json::Value = serde_json::from_str(input).unwrap();
            let translations: Vec<String> = value["lines"]
                .as_array()
                .unwrap()
                .iter()
                .map(|line| line.as_str().unwrap().to_uppercase())
                .collect();

            Ok(format!("```json\n{}\n```", json!({ "translations": translations })))
        }
    }

    struct CannedClient(String);

    #[async_trait]
    impl CompletionClient for CannedClient {
        async fn complete(&self, _system_prompt: &str, _prompt: &str) -> Result<String> {
            Ok(self.0.clone())
        }
    }

    fn entries(count: usize) -> Vec<SubtitleEntry> {
        (1..=count)
            .map(|i| SubtitleEntry {
                index: i,
                start_time: i as u64 * 1_000,
                end_time: i as u64 * 1_000 + 900,
                text: format!("line {}", i),
            })
            .collect()
    }

    fn request(count: usize) -> TranslationRequest {
        TranslationRequest {
            entries: entries(count),
            target_language: "cs".to_string(),
            source_language: Some("en".to_string()),
        }
    }

    #[tokio::test]
    async fn test_translates_in_chunks_and_keeps_timings() {
        let provider = LlmProvider::new(UppercaseClient::new(), 20);
        let translated = provider.translate(&request(45)).await.unwrap();

        assert_eq!(provider.client.prompts.lock().unwrap().len(), 3);
        assert_eq!(translated.len(), 45);
        for (original, result) in entries(45).iter().zip(&translated) {
            assert_eq!(result.index, original.index);
            assert_eq!(result.start_time, original.start_time);
            assert_eq!(result.end_time, original.end_time);
            assert_eq!(result.text, original.text.to_uppercase());
        }
    }

    #[tokio::test]
    async fn test_count_mismatch_is_a_provider_error() {
        let provider = LlmProvider::new(CannedClient(r#"{"translations": ["only one"]}"#.to_string()), 20);
        let result = provider.translate(&request(2)).await;
        assert!(matches!(result, Err(SubmeterError::Provider(_))));
    }

    #[test]
    fn test_parse_response_embedded_in_prose() {
        let response = "Sure! Here you go:\n{\"translations\": [\"Ahoj\", \"Sbohem\"]}\nEnjoy.";
        let parsed = parse_batch_response(response, 2).unwrap();
        assert_eq!(parsed, vec!["Ahoj".to_string(), "Sbohem".to_string()]);
    }

    #[test]
    fn test_parse_response_rejects_garbage() {
        assert!(parse_batch_response("I cannot help with that", 1).is_err());
    }

    #[test]
    fn test_prompt_names_languages_and_count() {
        let prompt = build_batch_prompt(&["Hello", "Bye"], "cs", Some("en"));
        assert!(prompt.contains("from English to Czech"));
        assert!(prompt.contains("exactly 2 translations"));
        assert!(prompt.contains(r#"{"lines":["Hello","Bye"]}"#));

        let prompt = build_batch_prompt(&["Hello"], "xx", None);
        assert!(prompt.contains("line to xx"));
    }
}
