//! Reverse Geocoding
//!
//! Resolves an alert's coordinates into a human-readable address for
//! notification text. Lookup failure is absorbed locally: callers fall back
//! to raw coordinates.

use lifeline_protocol::Location;
use serde::Deserialize;
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Deserialize)]
struct ReverseResponse {
    #[serde(default)]
    address: Option<AddressParts>,
}

#[derive(Debug, Default, Deserialize)]
struct AddressParts {
    #[serde(default)]
    road: Option<String>,
    #[serde(default)]
    city: Option<String>,
    #[serde(default)]
    town: Option<String>,
    #[serde(default)]
    village: Option<String>,
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    country: Option<String>,
}

fn compose_address(parts: &AddressParts) -> Option<String> {
    let locality = parts
        .city
        .as_deref()
        .or(parts.town.as_deref())
        .or(parts.village.as_deref());

    let components: Vec<&str> = [
        parts.road.as_deref(),
        locality,
        parts.state.as_deref(),
        parts.country.as_deref(),
    ]
    .into_iter()
    .flatten()
    .collect();

    if components.is_empty() {
        None
    } else {
        Some(components.join(", "))
    }
}

/// Nominatim-style reverse geocoder
#[derive(Debug, Clone)]
pub struct Geocoder {
    http: reqwest::Client,
    endpoint: String,
}

impl Geocoder {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            endpoint: endpoint.into(),
        })
    }

    /// Resolve coordinates to an address line
    ///
    /// Returns `None` on any failure; the caller renders coordinates
    /// instead.
    pub async fn reverse(&self, location: Location) -> Option<String> {
        let result = self
            .http
            .get(&self.endpoint)
            .query(&[
                ("format", "json".to_string()),
                ("lat", location.lat.to_string()),
                ("lon", location.lng.to_string()),
                ("zoom", "18".to_string()),
                ("addressdetails", "1".to_string()),
            ])
            .send()
            .await
            .and_then(|r| r.error_for_status());

        let response = match result {
            Ok(response) => response,
            Err(e) => {
                warn!("Reverse geocoding request failed: {}", e);
                return None;
            }
        };

        match response.json::<ReverseResponse>().await {
            Ok(reverse) => reverse.address.as_ref().and_then(compose_address),
            Err(e) => {
                warn!("Reverse geocoding response malformed: {}", e);
                None
            }
        }
    }
}

/// Fallback rendering when no address is available
pub fn coordinates_label(location: Location) -> String {
    format!("{:.5}, {:.5}", location.lat, location.lng)
}
