use crate::llm::{
    build_user_prompt, parse_event_content, ExtractedEvent, LLMError, LLMProvider, SYSTEM_PROMPT,
};
use async_trait::async_trait;
use serde_json::json;
use std::time::Duration;
use tracing::info;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub struct OpenAi {
    api_key: String,
    model: String,
    base_url: String,
    client: reqwest::Client,
}

/// Schema enforced by the provider. what/start_iso are required so a model
/// cannot answer with prose-only output.
fn response_schema() -> serde_json::Value {
    json!({
        "type": "object",
        "properties": {
            "what": { "type": "string" },
            "where_text": { "type": "string" },
            "start_iso": { "type": "string" },
            "end_iso": { "type": "string" }
        },
        "required": ["what", "start_iso"],
        "additionalProperties": false
    })
}

impl OpenAi {
    pub fn new(api_key: &str, model: &str) -> Self {
        Self {
            api_key: api_key.to_string(),
            model: model.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            client: reqwest::Client::new(),
        }
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }
}

#[async_trait]
impl LLMProvider for OpenAi {
    async fn extract(
        &self,
        text: &str,
        tz: &str,
        now_iso: &str,
    ) -> Result<ExtractedEvent, LLMError> {
        info!(model = %self.model, "requesting event extraction from OpenAI");
        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .timeout(REQUEST_TIMEOUT)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&json!({
                "model": self.model,
                "messages": [
                    { "role": "system", "content": SYSTEM_PROMPT },
                    { "role": "user", "content": build_user_prompt(text, tz, now_iso) }
                ],
                "response_format": {
                    "type": "json_schema",
                    "json_schema": {
                        "name": "ai_fill_schema",
                        "schema": response_schema(),
                        "strict": true
                    }
                },
                "temperature": 0.2
            }))
            .send()
            .await
            .map_err(|e| LLMError::Transport(e.to_string()))?;

        let status = response.status();
        if status.as_u16() >= 400 {
            let body = response.text().await.unwrap_or_default();
            return Err(LLMError::ProviderStatus {
                status: status.as_u16(),
                body,
            });
        }

        let envelope: serde_json::Value = response
            .json()
            .await
            .map_err(|e| LLMError::Envelope(e.to_string()))?;
        let content = envelope["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| {
                LLMError::Envelope(format!("missing choices/message/content in: {envelope}"))
            })?;
        parse_event_content(content)
    }
}
