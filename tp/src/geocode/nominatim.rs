//! Nominatim (OpenStreetMap) search adapter

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use super::{GeocodeError, GeocodeMatch, Geocoder};
use crate::config::GeocoderConfig;

/// Nominatim search client
pub struct NominatimGeocoder {
    base_url: String,
    http: Client,
    timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct NominatimResult {
    #[serde(default)]
    name: Option<String>,
    display_name: String,
    #[serde(default)]
    address: Option<NominatimAddress>,
}

#[derive(Debug, Deserialize)]
struct NominatimAddress {
    #[serde(default)]
    country_code: Option<String>,
}

impl NominatimGeocoder {
    pub fn from_config(config: &GeocoderConfig, timeout: Duration) -> Result<Self, GeocodeError> {
        debug!(base_url = %config.base_url, "NominatimGeocoder::from_config: called");
        let http = Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(timeout)
            .build()?;
        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            http,
            timeout,
        })
    }

    fn search_url(&self) -> String {
        format!("{}/search", self.base_url)
    }
}

/// First result whose address lies in `country_code`
fn pick_match(results: Vec<NominatimResult>, country_code: &str) -> Option<GeocodeMatch> {
    results.into_iter().find_map(|r| {
        let cc = r.address.and_then(|a| a.country_code)?.to_lowercase();
        if cc != country_code {
            return None;
        }
        let matched_name = r
            .name
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| r.display_name.split(',').next().unwrap_or_default().trim().to_string());
        Some(GeocodeMatch {
            matched_name,
            country_code: cc,
        })
    })
}

#[async_trait]
impl Geocoder for NominatimGeocoder {
    async fn geocode(&self, place: &str, country_code: &str) -> Result<Option<GeocodeMatch>, GeocodeError> {
        debug!(%place, %country_code, "NominatimGeocoder::geocode: called");
        let request = self.http.get(self.search_url()).query(&[
            ("q", place),
            ("format", "json"),
            ("addressdetails", "1"),
            ("limit", "5"),
            ("countrycodes", country_code),
        ]);

        let response = match tokio::time::timeout(self.timeout, request.send()).await {
            Ok(result) => result?,
            Err(_) => return Err(GeocodeError::Timeout(self.timeout)),
        };

        let status = response.status();
        if !status.is_success() {
            return Err(GeocodeError::Status {
                status: status.as_u16(),
            });
        }

        let results: Vec<NominatimResult> = response.json().await?;
        debug!(count = results.len(), "NominatimGeocoder::geocode: results");
        Ok(pick_match(results, country_code))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn results(json: &str) -> Vec<NominatimResult> {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_pick_match_filters_country() {
        let r = results(
            r#"[
                {"display_name": "Kandy, Kerala, India", "address": {"country_code": "in"}},
                {"name": "Kandy", "display_name": "Kandy, Central Province, Sri Lanka", "address": {"country_code": "lk"}}
            ]"#,
        );
        let m = pick_match(r, "lk").unwrap();
        assert_eq!(m.matched_name, "Kandy");
        assert_eq!(m.country_code, "lk");
    }

    #[test]
    fn test_pick_match_uses_display_name() {
        let r = results(r#"[{"display_name": "Kitulgala, Sabaragamuwa, Sri Lanka", "address": {"country_code": "LK"}}]"#);
        assert_eq!(pick_match(r, "lk").unwrap().matched_name, "Kitulgala");
    }

    #[test]
    fn test_pick_match_none() {
        let r = results(r#"[{"display_name": "Paris, France", "address": {"country_code": "fr"}}, {"display_name": "x"}]"#);
        assert!(pick_match(r, "lk").is_none());
    }

    #[test]
    fn test_search_url() {
        let geocoder = NominatimGeocoder::from_config(
            &GeocoderConfig {
                base_url: "http://localhost:8080/".to_string(),
                ..Default::default()
            },
            Duration::from_secs(1),
        )
        .unwrap();
        assert_eq!(geocoder.search_url(), "http://localhost:8080/search");
    }
}
