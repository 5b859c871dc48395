pub mod gemini;
pub mod openai;
use crate::llm::{ExtractedEvent, LLMError, LLMProvider};
use async_trait::async_trait;
pub use gemini::Gemini;
pub use openai::OpenAi;

pub enum LLM {
    Gemini(Gemini),
    OpenAi(OpenAi),
}

#[async_trait]
impl LLMProvider for LLM {
    async fn extract(
        &self,
        text: &str,
        tz: &str,
        now_iso: &str,
    ) -> Result<ExtractedEvent, LLMError> {
        match self {
            LLM::Gemini(gemini) => gemini.extract(text, tz, now_iso).await,
            LLM::OpenAi(openai) => openai.extract(text, tz, now_iso).await,
        }
    }
}
