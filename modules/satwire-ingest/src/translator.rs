//! OpenAI-backed Korean translation provider.
//!
//! Requests go out as one JSON array per chunk, keyed by item id, and the
//! model answers with the same array shape. The response is validated per
//! item: a missing id or a title that contains no Hangul marks that item
//! failed, never the whole chunk. Transport errors mark the chunk failed
//! and the batch call still succeeds; the stage's per-item retry pass
//! decides what to do next.

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use satwire_common::{NewsItem, TranslationStatus};

use crate::traits::Translator;

const OPENAI_API_URL: &str = "https://api.openai.com/v1";
const MODEL: &str = "gpt-4o-mini";

/// Items per provider request. Larger chunks save round trips but raise
/// the odds of one malformed item poisoning the whole response.
pub const CHUNK_SIZE: usize = 15;

/// Translated summaries are display blurbs; cap them.
const SUMMARY_MAX_CHARS: usize = 200;

const SYSTEM_PROMPT: &str = "You are a professional translator specializing in \
cryptocurrency and Bitcoin news. Translate the given English news items into \
natural Korean. Keep proper nouns, ticker symbols and technical terms \
(Bitcoin, BTC, Lightning, UTXO, hashrate) as commonly written in Korean \
crypto media. Respond ONLY with a JSON array of objects with the same ids: \
[{\"id\": \"...\", \"title\": \"...\", \"summary\": \"...\"}]. No prose, no \
markdown fences.";

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Serialize)]
struct RequestEntry<'a> {
    id: &'a str,
    title: &'a str,
    summary: &'a str,
}

#[derive(Debug, Deserialize)]
struct TranslatedEntry {
    id: String,
    title: String,
    #[serde(default)]
    summary: Option<String>,
}

// ---------------------------------------------------------------------------
// Response parsing
// ---------------------------------------------------------------------------

/// Whether `text` contains at least one Hangul syllable or jamo. Used to
/// reject model responses that echoed the English back.
pub fn contains_korean(text: &str) -> bool {
    text.chars().any(|c| {
        matches!(c,
            '\u{AC00}'..='\u{D7AF}'   // syllables
            | '\u{1100}'..='\u{11FF}' // jamo
            | '\u{3130}'..='\u{318F}' // compatibility jamo
        )
    })
}

/// Strip markdown code fences the model sometimes wraps JSON in.
fn strip_code_fences(response: &str) -> &str {
    response
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim()
}

fn parse_entries(response: &str) -> Result<Vec<TranslatedEntry>> {
    let cleaned = strip_code_fences(response);
    serde_json::from_str(cleaned).map_err(|e| anyhow!("unparseable translation response: {e}"))
}

fn truncate_summary(summary: &str) -> String {
    if summary.chars().count() <= SUMMARY_MAX_CHARS {
        return summary.to_string();
    }
    summary.chars().take(SUMMARY_MAX_CHARS).collect()
}

/// Apply one chunk's parsed response to its items. Each item is matched by
/// id; a hit with a Hangul title becomes `Ok`, everything else `Failed`.
fn apply_entries(items: &mut [NewsItem], entries: Vec<TranslatedEntry>) {
    for item in items.iter_mut() {
        let entry = entries.iter().find(|e| e.id == item.id);
        match entry {
            Some(e) if contains_korean(&e.title) => {
                item.title = e.title.clone();
                if let Some(summary) = &e.summary {
                    if !summary.is_empty() {
                        item.summary = Some(truncate_summary(summary));
                    }
                }
                item.translation_status = Some(TranslationStatus::Ok);
            }
            Some(_) => {
                warn!(id = %item.id, "Translation response has no Korean title");
                item.translation_status = Some(TranslationStatus::Failed);
            }
            None => {
                warn!(id = %item.id, "Translation response missing item");
                item.translation_status = Some(TranslationStatus::Failed);
            }
        }
    }
}

fn mark_failed(items: &mut [NewsItem]) {
    for item in items.iter_mut() {
        item.translation_status = Some(TranslationStatus::Failed);
    }
}

// ---------------------------------------------------------------------------
// Provider client
// ---------------------------------------------------------------------------

pub struct OpenAiTranslator {
    api_key: Option<String>,
    http: reqwest::Client,
    base_url: String,
    model: String,
}

impl OpenAiTranslator {
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            api_key: api_key.filter(|k| !k.is_empty()),
            http: reqwest::Client::new(),
            base_url: OPENAI_API_URL.to_string(),
            model: MODEL.to_string(),
        }
    }

    pub fn with_base_url(mut self, url: &str) -> Self {
        self.base_url = url.to_string();
        self
    }

    fn headers(&self, api_key: &str) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {api_key}"))?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(headers)
    }

    async fn chat(&self, user_prompt: String) -> Result<String> {
        let Some(api_key) = &self.api_key else {
            bail!("no OpenAI API key configured");
        };
        let url = format!("{}/chat/completions", self.base_url);
        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: user_prompt,
                },
            ],
            temperature: 0.2,
        };

        debug!(model = %self.model, "Translation request");

        let response = self
            .http
            .post(&url)
            .headers(self.headers(api_key)?)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await?;
            return Err(anyhow!("OpenAI API error ({status}): {error_text}"));
        }

        let chat_response: ChatResponse = response.json().await?;
        chat_response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| anyhow!("empty translation response"))
    }

    fn chunk_prompt(items: &[NewsItem]) -> Result<String> {
        let entries: Vec<RequestEntry<'_>> = items
            .iter()
            .map(|i| RequestEntry {
                id: &i.id,
                title: &i.title,
                summary: i.summary.as_deref().unwrap_or(""),
            })
            .collect();
        Ok(serde_json::to_string(&entries)?)
    }
}

#[async_trait]
impl Translator for OpenAiTranslator {
    fn is_available(&self) -> bool {
        self.api_key.is_some()
    }

    async fn translate_batch(&self, items: &mut [NewsItem]) -> Result<()> {
        for chunk in items.chunks_mut(CHUNK_SIZE) {
            let prompt = Self::chunk_prompt(chunk)?;
            match self.chat(prompt).await {
                Ok(text) => match parse_entries(&text) {
                    Ok(entries) => apply_entries(chunk, entries),
                    Err(e) => {
                        warn!(error = %e, size = chunk.len(), "Chunk response unparseable");
                        mark_failed(chunk);
                    }
                },
                Err(e) => {
                    warn!(error = %e, size = chunk.len(), "Chunk translation failed");
                    mark_failed(chunk);
                }
            }
        }
        Ok(())
    }

    async fn translate_single(&self, item: &mut NewsItem) -> Result<()> {
        let prompt = Self::chunk_prompt(std::slice::from_ref(item))?;
        let text = self.chat(prompt).await?;
        match parse_entries(&text) {
            Ok(entries) => apply_entries(std::slice::from_mut(item), entries),
            Err(_) => item.translation_status = Some(TranslationStatus::Failed),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::item_with_title;

    fn response_for(id: &str, title: &str, summary: &str) -> String {
        format!(r#"[{{"id": "{id}", "title": "{title}", "summary": "{summary}"}}]"#)
    }

    #[test]
    fn detects_hangul() {
        assert!(contains_korean("비트코인 상승"));
        assert!(contains_korean("Bitcoin 급등 news"));
        assert!(!contains_korean("Bitcoin surges past $100k"));
        assert!(!contains_korean(""));
    }

    #[test]
    fn parses_plain_json_array() {
        let entries = parse_entries(r#"[{"id": "a", "title": "제목"}]"#).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].id, "a");
        assert!(entries[0].summary.is_none());
    }

    #[test]
    fn parses_fenced_json() {
        let entries =
            parse_entries("```json\n[{\"id\": \"a\", \"title\": \"제목\"}]\n```").unwrap();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn rejects_prose_response() {
        assert!(parse_entries("Sure! Here are the translations:").is_err());
    }

    #[test]
    fn applies_matching_entry() {
        let mut items = vec![item_with_title("coindesk", "Bitcoin surges")];
        let response = response_for(&items[0].id, "비트코인 급등", "요약 내용");
        let entries = parse_entries(&response).unwrap();

        apply_entries(&mut items, entries);

        assert_eq!(items[0].translation_status, Some(TranslationStatus::Ok));
        assert_eq!(items[0].title, "비트코인 급등");
        assert_eq!(items[0].summary.as_deref(), Some("요약 내용"));
    }

    #[test]
    fn missing_id_marks_item_failed() {
        let mut items = vec![
            item_with_title("coindesk", "Bitcoin surges"),
            item_with_title("coindesk", "Miners expand"),
        ];
        // Response only covers the first item.
        let response = response_for(&items[0].id, "비트코인 급등", "");
        let entries = parse_entries(&response).unwrap();

        apply_entries(&mut items, entries);

        assert_eq!(items[0].translation_status, Some(TranslationStatus::Ok));
        assert_eq!(items[1].translation_status, Some(TranslationStatus::Failed));
    }

    #[test]
    fn echoed_english_title_marks_item_failed() {
        let mut items = vec![item_with_title("coindesk", "Bitcoin surges")];
        let response = response_for(&items[0].id, "Bitcoin surges", "");
        let entries = parse_entries(&response).unwrap();

        apply_entries(&mut items, entries);

        assert_eq!(items[0].translation_status, Some(TranslationStatus::Failed));
    }

    #[test]
    fn long_summary_is_truncated() {
        let long = "가".repeat(500);
        let truncated = truncate_summary(&long);
        assert_eq!(truncated.chars().count(), SUMMARY_MAX_CHARS);
    }

    #[test]
    fn empty_summary_leaves_original() {
        let mut items = vec![item_with_title("coindesk", "Bitcoin surges")];
        items[0].summary = Some("original".to_string());
        let response = response_for(&items[0].id, "비트코인 급등", "");
        let entries = parse_entries(&response).unwrap();

        apply_entries(&mut items, entries);

        assert_eq!(items[0].summary.as_deref(), Some("original"));
    }

    #[test]
    fn missing_key_reports_unavailable() {
        assert!(!OpenAiTranslator::new(None).is_available());
        assert!(!OpenAiTranslator::new(Some(String::new())).is_available());
        assert!(OpenAiTranslator::new(Some("sk-test".to_string())).is_available());
    }
}
