//! Geocoding module
//!
//! Forward (address → coordinates) and reverse (coordinates →
//! address) geocoding behind the [`GeocodingGateway`] trait, with a
//! Nominatim (OpenStreetMap) implementation.

mod nominatim;

pub use nominatim::NominatimGeocoder;

use async_trait::async_trait;

use crate::error::AppError;

/// Geocoding gateway contract
///
/// A clean "no result" is `Ok(None)`; transient upstream failure is
/// an `AppError::Unavailable` and distinct from it.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GeocodingGateway: Send + Sync {
    /// Resolve an address to (latitude, longitude).
    async fn forward(&self, address: &str) -> Result<Option<(f64, f64)>, AppError>;

    /// Resolve coordinates to a display address.
    async fn reverse(&self, latitude: f64, longitude: f64) -> Result<Option<String>, AppError>;
}
