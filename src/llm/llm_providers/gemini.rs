use crate::llm::{
    build_user_prompt, parse_event_content, ExtractedEvent, LLMError, LLMProvider, SYSTEM_PROMPT,
};
use async_trait::async_trait;
use serde_json::json;
use std::time::Duration;
use tracing::info;

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub struct Gemini {
    api_key: String,
    model: String,
    base_url: String,
    client: reqwest::Client,
}

impl Gemini {
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

    /// One generateContent call. JSON output is requested via
    /// responseMimeType; the returned string is the concatenation of all
    /// text parts in the first candidate.
    pub async fn generate(&self, user_text: &str) -> Result<String, LLMError> {
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url, self.model, self.api_key
        );
        let response = self
            .client
            .post(&url)
            .timeout(REQUEST_TIMEOUT)
            .json(&json!({
                "contents": [
                    {
                        "role": "user",
                        "parts": [{ "text": user_text }]
                    }
                ],
                "generationConfig": {
                    "temperature": 0.2,
                    "responseMimeType": "application/json"
                }
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
        let parts = envelope["candidates"][0]["content"]["parts"]
            .as_array()
            .ok_or_else(|| {
                LLMError::Envelope(format!("missing candidates/content/parts in: {envelope}"))
            })?;
        let content: String = parts.iter().filter_map(|p| p["text"].as_str()).collect();
        Ok(content)
    }
}

#[async_trait]
impl LLMProvider for Gemini {
    async fn extract(
        &self,
        text: &str,
        tz: &str,
        now_iso: &str,
    ) -> Result<ExtractedEvent, LLMError> {
        info!(model = %self.model, "requesting event extraction from Gemini");
        let user_text = format!(
            "{SYSTEM_PROMPT}\n\n{}",
            build_user_prompt(text, tz, now_iso)
        );
        let content = self.generate(&user_text).await?;
        parse_event_content(&content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn gemini_for(server: &mockito::Server) -> Gemini {
        Gemini::new("test-key", "gemini-1.5-flash").with_base_url(&server.url())
    }

    #[tokio::test]
    async fn test_extract_parses_concatenated_parts() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/models/gemini-1.5-flash:generateContent")
            .match_query(Matcher::UrlEncoded("key".into(), "test-key".into()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{
                    "candidates": [{
                        "content": {
                            "parts": [
                                {"text": "{\"what\":\"Team lunch\",\"where_text\":\"Shibuya\","},
                                {"text": "\"start_iso\":\"2024-06-01T12:00:00+09:00\"}"}
                            ]
                        }
                    }]
                }"#,
            )
            .create_async()
            .await;

        let event = gemini_for(&server)
            .extract("明日渋谷でランチ", "Asia/Tokyo", "2024-05-31T00:00:00Z")
            .await
            .expect("extraction should succeed");

        assert_eq!(event.what.as_deref(), Some("Team lunch"));
        assert_eq!(event.where_text.as_deref(), Some("Shibuya"));
        assert_eq!(event.start_iso.as_deref(), Some("2024-06-01T12:00:00+09:00"));
        assert_eq!(event.end_iso, None);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_extract_passes_end_iso_through_unmodified() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/models/gemini-1.5-flash:generateContent")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(
                r#"{
                    "candidates": [{
                        "content": {
                            "parts": [{"text": "{\"what\":\"Team lunch\",\"start_iso\":\"2024-06-01T12:00:00+09:00\",\"end_iso\":\"2024-06-01T14:00:00+09:00\"}"}]
                        }
                    }]
                }"#,
            )
            .create_async()
            .await;

        let event = gemini_for(&server)
            .extract("ランチ", "Asia/Tokyo", "2024-05-31T00:00:00Z")
            .await
            .expect("extraction should succeed");
        assert_eq!(event.end_iso.as_deref(), Some("2024-06-01T14:00:00+09:00"));
    }

    #[tokio::test]
    async fn test_upstream_error_status_is_surfaced() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/models/gemini-1.5-flash:generateContent")
            .match_query(Matcher::Any)
            .with_status(500)
            .with_body("internal provider meltdown")
            .create_async()
            .await;

        let result = gemini_for(&server)
            .extract("ランチ", "Asia/Tokyo", "2024-05-31T00:00:00Z")
            .await;
        match result {
            Err(LLMError::ProviderStatus { status, body }) => {
                assert_eq!(status, 500);
                assert!(body.contains("meltdown"));
            }
            other => panic!("expected ProviderStatus, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_malformed_envelope_is_an_envelope_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/models/gemini-1.5-flash:generateContent")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"candidates": [{"content": {}}]}"#)
            .create_async()
            .await;

        let result = gemini_for(&server)
            .extract("ランチ", "Asia/Tokyo", "2024-05-31T00:00:00Z")
            .await;
        assert!(matches!(result, Err(LLMError::Envelope(_))));
    }

    #[tokio::test]
    async fn test_non_json_content_is_rejected() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/models/gemini-1.5-flash:generateContent")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(
                r#"{
                    "candidates": [{
                        "content": {"parts": [{"text": "ランチの予定ですね。JSONは以下の通りです"}]}
                    }]
                }"#,
            )
            .create_async()
            .await;

        let result = gemini_for(&server)
            .extract("ランチ", "Asia/Tokyo", "2024-05-31T00:00:00Z")
            .await;
        assert!(matches!(result, Err(LLMError::NonJsonContent(_))));
    }
}
