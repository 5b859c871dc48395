use crate::configuration::Context;
use crate::geocoding::Geocoder;
use crate::llm::{LLMError, LLMOrchestrator};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

pub const DEFAULT_TIMEZONE: &str = "Asia/Tokyo";

#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("text is required")]
    InvalidInput,

    #[error(transparent)]
    Llm(#[from] LLMError),
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AiFillRequest {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub tz: Option<String>,
    #[serde(default)]
    pub now_iso: Option<String>,
    #[serde(default)]
    pub locale: Option<String>,
    #[serde(default)]
    pub hint_city: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct AiFillResponse {
    pub what: Option<String>,
    pub where_text: Option<String>,
    pub start_iso: Option<String>,
    pub end_iso: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

/// The whole request pipeline: validate, extract through the selected LLM
/// backend, then enrich the location best-effort. Holds no per-request state.
pub struct ExtractionService {
    orchestrator: LLMOrchestrator,
    geocoder: Geocoder,
}

impl ExtractionService {
    pub fn new(context: &Context) -> Self {
        Self {
            orchestrator: LLMOrchestrator::new(&context.config),
            geocoder: Geocoder::new(context.config.google_maps_key.clone()),
        }
    }

    pub fn from_parts(orchestrator: LLMOrchestrator, geocoder: Geocoder) -> Self {
        Self {
            orchestrator,
            geocoder,
        }
    }

    pub async fn fill(&self, request: &AiFillRequest) -> Result<AiFillResponse, ExtractionError> {
        let text = request.text.as_deref().unwrap_or("").trim();
        if text.is_empty() {
            return Err(ExtractionError::InvalidInput);
        }
        let tz = request
            .tz
            .as_deref()
            .filter(|tz| !tz.trim().is_empty())
            .unwrap_or(DEFAULT_TIMEZONE);

        let event = self
            .orchestrator
            .extract(text, tz, request.now_iso.as_deref())
            .await?;
        info!(what = ?event.what, where_text = ?event.where_text, "extraction complete");

        let mut response = AiFillResponse {
            what: event.what,
            where_text: event.where_text,
            start_iso: event.start_iso,
            end_iso: event.end_iso,
            latitude: None,
            longitude: None,
        };

        if let Some(address) = response.where_text.clone() {
            if let Some(resolved) = self.geocoder.resolve(&address).await {
                response.latitude = Some(resolved.latitude);
                response.longitude = Some(resolved.longitude);
                response.where_text = Some(resolved.formatted_address);
            }
        }
        Ok(response)
    }
}
