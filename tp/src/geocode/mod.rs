//! Geocoding collaborator
//!
//! Used only as a last resort for destinations the built-in gazetteer does not
//! know. Results are restricted to a single country.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

mod nominatim;

pub use nominatim::NominatimGeocoder;

/// A place the geocoder resolved
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeocodeMatch {
    pub matched_name: String,
    pub country_code: String,
}

/// Errors from a geocoding lookup
#[derive(Debug, Error)]
pub enum GeocodeError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Geocoder returned status {status}")]
    Status { status: u16 },

    #[error("Geocoder timed out after {0:?}")]
    Timeout(std::time::Duration),
}

#[async_trait]
pub trait Geocoder: Send + Sync {
    /// Resolve `place` restricted to `country_code`; `None` when nothing matches
    async fn geocode(&self, place: &str, country_code: &str) -> Result<Option<GeocodeMatch>, GeocodeError>;
}
