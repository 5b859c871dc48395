use std::time::Duration;
use tracing::{info, warn};

const DEFAULT_BASE_URL: &str = "https://maps.googleapis.com";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// First geocoding hit for a location string.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedLocation {
    pub latitude: f64,
    pub longitude: f64,
    pub formatted_address: String,
}

/// Best-effort resolver for extracted location text. Every failure mode
/// (missing key, transport error, non-OK status, empty results) resolves to
/// `None`; the caller keeps its original text and the request still succeeds.
pub struct Geocoder {
    api_key: Option<String>,
    base_url: String,
    client: reqwest::Client,
}

impl Geocoder {
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            client: reqwest::Client::new(),
        }
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub async fn resolve(&self, address: &str) -> Option<ResolvedLocation> {
        if address.trim().is_empty() {
            return None;
        }
        let key = self.api_key.as_deref()?;

        let url = format!("{}/maps/api/geocode/json", self.base_url);
        let response = match self
            .client
            .get(&url)
            .timeout(REQUEST_TIMEOUT)
            .query(&[
                ("address", address),
                ("language", "ja"),
                ("region", "JP"),
                ("key", key),
            ])
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                warn!("geocoding request failed: {e}");
                return None;
            }
        };

        let status = response.status();
        if status.as_u16() >= 400 {
            warn!(status = status.as_u16(), "geocoding returned error status");
            return None;
        }

        let body: serde_json::Value = match response.json().await {
            Ok(body) => body,
            Err(e) => {
                warn!("unreadable geocoding response: {e}");
                return None;
            }
        };

        let api_status = body["status"].as_str().unwrap_or("");
        if api_status != "OK" {
            info!(api_status, address, "geocoding found no match");
            return None;
        }

        let top = body["results"].get(0)?;
        let latitude = top["geometry"]["location"]["lat"].as_f64()?;
        let longitude = top["geometry"]["location"]["lng"].as_f64()?;
        let formatted_address = top["formatted_address"]
            .as_str()
            .unwrap_or(address)
            .to_string();
        Some(ResolvedLocation {
            latitude,
            longitude,
            formatted_address,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    #[tokio::test]
    async fn test_resolves_first_result() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/maps/api/geocode/json")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("address".into(), "Shibuya".into()),
                Matcher::UrlEncoded("language".into(), "ja".into()),
                Matcher::UrlEncoded("region".into(), "JP".into()),
                Matcher::UrlEncoded("key".into(), "maps-key".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{
                    "status": "OK",
                    "results": [
                        {
                            "formatted_address": "Shibuya, Tokyo, Japan",
                            "geometry": {"location": {"lat": 35.6598, "lng": 139.7006}}
                        },
                        {
                            "formatted_address": "Shibuya Station",
                            "geometry": {"location": {"lat": 35.658, "lng": 139.7016}}
                        }
                    ]
                }"#,
            )
            .create_async()
            .await;

        let geocoder =
            Geocoder::new(Some("maps-key".to_string())).with_base_url(&server.url());
        let resolved = geocoder
            .resolve("Shibuya")
            .await
            .expect("geocoding should resolve");

        assert_eq!(resolved.latitude, 35.6598);
        assert_eq!(resolved.longitude, 139.7006);
        assert_eq!(resolved.formatted_address, "Shibuya, Tokyo, Japan");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_non_ok_status_degrades() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/maps/api/geocode/json")
            .with_status(200)
            .with_body(r#"{"status": "ZERO_RESULTS", "results": []}"#)
            .create_async()
            .await;

        let geocoder =
            Geocoder::new(Some("maps-key".to_string())).with_base_url(&server.url());
        assert_eq!(geocoder.resolve("どこでもない場所").await, None);
    }

    #[tokio::test]
    async fn test_http_error_degrades() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/maps/api/geocode/json")
            .with_status(403)
            .with_body("forbidden")
            .create_async()
            .await;

        let geocoder =
            Geocoder::new(Some("maps-key".to_string())).with_base_url(&server.url());
        assert_eq!(geocoder.resolve("Shibuya").await, None);
    }

    #[tokio::test]
    async fn test_missing_key_skips_the_call() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/maps/api/geocode/json")
            .expect(0)
            .create_async()
            .await;

        let geocoder = Geocoder::new(None).with_base_url(&server.url());
        assert_eq!(geocoder.resolve("Shibuya").await, None);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_empty_address_skips_the_call() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/maps/api/geocode/json")
            .expect(0)
            .create_async()
            .await;

        let geocoder =
            Geocoder::new(Some("maps-key".to_string())).with_base_url(&server.url());
        assert_eq!(geocoder.resolve("   ").await, None);
        mock.assert_async().await;
    }
}
