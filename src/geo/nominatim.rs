//! Nominatim (OpenStreetMap) geocoder client

use async_trait::async_trait;
use serde::Deserialize;

use super::GeocodingGateway;
use crate::config::GeocoderConfig;
use crate::error::AppError;
use crate::metrics::GEOCODER_REQUESTS_TOTAL;

const GEOCODER_UNAVAILABLE: &str = "Geocoder currently not available. Try later.";

/// Nominatim search result (forward geocoding)
#[derive(Debug, Deserialize)]
struct SearchResult {
    lat: String,
    lon: String,
}

/// Nominatim reverse geocoding response
///
/// A miss comes back as `{"error": "Unable to geocode"}` with
/// status 200, so both fields are optional.
#[derive(Debug, Deserialize)]
struct ReverseResult {
    display_name: Option<String>,
    error: Option<String>,
}

/// Nominatim-backed geocoding gateway
pub struct NominatimGeocoder {
    client: reqwest::Client,
    base_url: String,
}

impl NominatimGeocoder {
    /// Create a new geocoder client
    ///
    /// Nominatim's usage policy requires an identifying User-Agent,
    /// so the client refuses to start without one.
    pub fn new(config: &GeocoderConfig) -> Result<Self, AppError> {
        if config.user_agent.trim().is_empty() {
            return Err(AppError::Config(
                "geocoder.user_agent must not be empty".to_string(),
            ));
        }

        let client = reqwest::Client::builder()
            .user_agent(&config.user_agent)
            .timeout(std::time::Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| AppError::Internal(e.into()))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn unavailable(operation: &str, error: impl std::fmt::Display) -> AppError {
        tracing::warn!(%error, operation, "Geocoder request failed");
        GEOCODER_REQUESTS_TOTAL
            .with_label_values(&[operation, "unavailable"])
            .inc();
        AppError::Unavailable(GEOCODER_UNAVAILABLE.to_string())
    }
}

#[async_trait]
impl GeocodingGateway for NominatimGeocoder {
    async fn forward(&self, address: &str) -> Result<Option<(f64, f64)>, AppError> {
        let url = format!(
            "{}/search?q={}&format=json&limit=1",
            self.base_url,
            urlencoding::encode(address)
        );

        let results: Vec<SearchResult> = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| Self::unavailable("forward", e))?
            .error_for_status()
            .map_err(|e| Self::unavailable("forward", e))?
            .json()
            .await
            .map_err(|e| Self::unavailable("forward", e))?;

        let Some(result) = results.first() else {
            GEOCODER_REQUESTS_TOTAL
                .with_label_values(&["forward", "empty"])
                .inc();
            return Ok(None);
        };

        let latitude: f64 = result
            .lat
            .parse()
            .map_err(|e| Self::unavailable("forward", e))?;
        let longitude: f64 = result
            .lon
            .parse()
            .map_err(|e| Self::unavailable("forward", e))?;

        GEOCODER_REQUESTS_TOTAL
            .with_label_values(&["forward", "ok"])
            .inc();
        Ok(Some((latitude, longitude)))
    }

    async fn reverse(&self, latitude: f64, longitude: f64) -> Result<Option<String>, AppError> {
        let url = format!(
            "{}/reverse?lat={}&lon={}&format=json",
            self.base_url, latitude, longitude
        );

        let result: ReverseResult = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| Self::unavailable("reverse", e))?
            .error_for_status()
            .map_err(|e| Self::unavailable("reverse", e))?
            .json()
            .await
            .map_err(|e| Self::unavailable("reverse", e))?;

        if result.error.is_some() {
            GEOCODER_REQUESTS_TOTAL
                .with_label_values(&["reverse", "empty"])
                .inc();
            return Ok(None);
        }

        let status = if result.display_name.is_some() {
            "ok"
        } else {
            "empty"
        };
        GEOCODER_REQUESTS_TOTAL
            .with_label_values(&["reverse", status])
            .inc();

        Ok(result.display_name)
    }
}
