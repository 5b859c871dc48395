use crate::configuration::Config;
use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use thiserror::Error;
use tracing::info;

pub mod llm_providers;
use llm_providers::gemini::Gemini;
use llm_providers::openai::OpenAi;
use llm_providers::LLM;

/// Upper bound on input characters included in an outbound prompt.
pub const MAX_INPUT_CHARS: usize = 600;

pub const SYSTEM_PROMPT: &str = "あなたは日本語の自由文からイベントの構造化情報を抽出するアシスタントです。\
日付や時間の相対表現（今日/明日/明後日/今週末/曜日）を、与えられた now_iso と tz を使ってISO8601に正規化して下さい。\
時間範囲が不明な場合は開始+2時間で end_iso を補完して下さい。\
出力は必ず厳密なJSONのみ（追加のテキストなし）で、以下のキーを含めてください:\
{what, where_text, start_iso, end_iso}。";

#[derive(Error, Debug)]
pub enum LLMError {
    #[error("no LLM api key configured (GEMINI_API_KEY or OPENAI_API_KEY)")]
    NoProviderConfigured,

    #[error("provider returned status {status}: {body}")]
    ProviderStatus { status: u16, body: String },

    #[error("invalid provider response envelope: {0}")]
    Envelope(String),

    #[error("non-JSON provider content: {0}")]
    NonJsonContent(String),

    #[error("provider request failed: {0}")]
    Transport(String),
}

/// Fields produced by one extraction call. Missing keys deserialize to
/// `None`; keys outside the instructed set are ignored.
#[derive(Debug, Default, Deserialize, PartialEq)]
pub struct ExtractedEvent {
    #[serde(default)]
    pub what: Option<String>,
    #[serde(default)]
    pub where_text: Option<String>,
    #[serde(default)]
    pub start_iso: Option<String>,
    #[serde(default)]
    pub end_iso: Option<String>,
}

#[async_trait]
pub trait LLMProvider {
    async fn extract(
        &self,
        text: &str,
        tz: &str,
        now_iso: &str,
    ) -> Result<ExtractedEvent, LLMError>;
}

/// User block shared by both providers. The input is trimmed and bounded to
/// MAX_INPUT_CHARS codepoints before it reaches any outbound payload.
pub(crate) fn build_user_prompt(text: &str, tz: &str, now_iso: &str) -> String {
    let snippet: String = text.trim().chars().take(MAX_INPUT_CHARS).collect();
    format!(
        "text: {snippet}\ntz: {tz}\nnow_iso: {now_iso}\n出力はJSONのみ。キーは what, where_text, start_iso, end_iso。"
    )
}

pub(crate) fn reference_time(now_iso: Option<&str>) -> String {
    match now_iso {
        Some(now) if !now.trim().is_empty() => now.to_string(),
        _ => Utc::now().to_rfc3339(),
    }
}

pub(crate) fn parse_event_content(content: &str) -> Result<ExtractedEvent, LLMError> {
    serde_json::from_str(content).map_err(|e| LLMError::NonJsonContent(e.to_string()))
}

/// Holds the one backend selected at startup from configured credentials:
/// Gemini when its key is present, OpenAI otherwise. Selection is stable for
/// the process lifetime.
pub struct LLMOrchestrator {
    provider: Option<LLM>,
}

impl LLMOrchestrator {
    pub fn new(config: &Config) -> Self {
        let provider = if let Some(key) = &config.gemini_api_key {
            info!(model = %config.gemini_model, "using Gemini for extraction");
            Some(LLM::Gemini(Gemini::new(key, &config.gemini_model)))
        } else if let Some(key) = &config.openai_api_key {
            info!(model = %config.openai_model, "using OpenAI for extraction");
            Some(LLM::OpenAi(OpenAi::new(key, &config.openai_model)))
        } else {
            None
        };
        Self { provider }
    }

    pub fn from_provider(provider: LLM) -> Self {
        Self {
            provider: Some(provider),
        }
    }

    pub fn provider_name(&self) -> Option<&'static str> {
        match &self.provider {
            Some(LLM::Gemini(_)) => Some("gemini"),
            Some(LLM::OpenAi(_)) => Some("openai"),
            None => None,
        }
    }

    pub async fn extract(
        &self,
        text: &str,
        tz: &str,
        now_iso: Option<&str>,
    ) -> Result<ExtractedEvent, LLMError> {
        let provider = self
            .provider
            .as_ref()
            .ok_or(LLMError::NoProviderConfigured)?;
        let now = reference_time(now_iso);
        provider.extract(text, tz, &now).await
    }
}
