//! Geocoder client for free-text address lookup.
//!
//! Thin wrapper over the Nominatim search API: one request per call, first
//! candidate wins, no retry, no caching. Zero results is a distinct outcome
//! (`Ok(None)`), not an error.

use serde::Deserialize;

use crate::error::{Error, Result};

/// Public Nominatim instance used when no base URL is configured
pub const DEFAULT_BASE_URL: &str = "https://nominatim.openstreetmap.org";

const USER_AGENT: &str = concat!("pinmap/", env!("CARGO_PKG_VERSION"));

/// Coordinates and derived city for a resolved address
#[derive(Debug, Clone, PartialEq)]
pub struct GeocodedAddress {
    pub lat: f64,
    pub lon: f64,
    /// Text preceding the first comma of the provider's display name
    pub city: String,
}

/// HTTP client for the address lookup service
#[derive(Debug, Clone)]
pub struct GeocodeClient {
    base_url: String,
    client: reqwest::Client,
}

impl GeocodeClient {
    /// Build a client against the public lookup service
    pub fn new() -> Result<Self> {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    /// Build a client against an explicit base URL (tests, self-hosted instances)
    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self> {
        let base_url = normalize_base_url(base_url.into().as_str())?;
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|error| Error::Geocode(format!("failed to construct HTTP client: {error}")))?;
        Ok(Self { base_url, client })
    }

    /// Returns the base URL this client was configured with
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Resolve a free-text address to coordinates and a city name.
    ///
    /// Returns `Ok(None)` when the service finds no candidates. Each call is
    /// an independent request with no idempotency guarantee.
    pub async fn lookup(&self, address: &str) -> Result<Option<GeocodedAddress>> {
        let address = address.trim();
        if address.is_empty() {
            return Err(Error::InvalidInput("address must not be empty".to_string()));
        }

        let url = format!(
            "{}/search?format=json&q={}",
            self.base_url,
            urlencoding::encode(address)
        );

        let response = self
            .client
            .get(url)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|error| Error::Geocode(format!("lookup request failed: {error}")))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            return Err(Error::Geocode(format!(
                "lookup service returned HTTP {status}"
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|error| Error::Geocode(format!("failed to read lookup response: {error}")))?;

        parse_search_response(&body)
    }
}

/// Seam over the lookup service for callers that submit pins.
///
/// Implemented by [`GeocodeClient`]; test doubles implement it in memory.
#[allow(async_fn_in_trait)]
pub trait AddressResolver {
    /// Resolve a free-text address; `Ok(None)` means no candidates
    async fn resolve(&self, address: &str) -> Result<Option<GeocodedAddress>>;
}

impl AddressResolver for GeocodeClient {
    async fn resolve(&self, address: &str) -> Result<Option<GeocodedAddress>> {
        self.lookup(address).await
    }
}

/// Parse a search response payload into the first candidate, if any.
///
/// Public for testability; callers can exercise parsing without network
/// access. The service encodes coordinates as JSON strings.
pub fn parse_search_response(payload: &str) -> Result<Option<GeocodedAddress>> {
    let candidates: Vec<SearchResult> = serde_json::from_str(payload)
        .map_err(|error| Error::Geocode(format!("invalid lookup response JSON: {error}")))?;

    let Some(first) = candidates.into_iter().next() else {
        return Ok(None);
    };

    let lat = parse_coordinate(&first.lat, "lat")?;
    let lon = parse_coordinate(&first.lon, "lon")?;
    let city = derive_city(&first.display_name);

    Ok(Some(GeocodedAddress { lat, lon, city }))
}

#[derive(Debug, Deserialize)]
struct SearchResult {
    lat: String,
    lon: String,
    display_name: String,
}

fn parse_coordinate(raw: &str, field: &str) -> Result<f64> {
    raw.parse()
        .map_err(|_| Error::Geocode(format!("invalid {field} in lookup response: {raw}")))
}

fn derive_city(display_name: &str) -> String {
    display_name
        .split(',')
        .next()
        .unwrap_or(display_name)
        .trim()
        .to_string()
}

fn normalize_base_url(raw: &str) -> Result<String> {
    let base = raw.trim().trim_end_matches('/').to_string();
    if base.is_empty() {
        return Err(Error::InvalidInput(
            "lookup base URL must not be empty".to_string(),
        ));
    }
    if !(base.starts_with("https://") || base.starts_with("http://")) {
        return Err(Error::InvalidInput(
            "lookup base URL must include http:// or https://".to_string(),
        ));
    }
    Ok(base)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parse_takes_first_candidate() {
        let payload = r#"[
            {"lat": "52.2297", "lon": "21.0122", "display_name": "Warszawa, mazowieckie, Polska"},
            {"lat": "50.0614", "lon": "19.9366", "display_name": "Kraków, Polska"}
        ]"#;

        let resolved = parse_search_response(payload).unwrap().unwrap();
        assert_eq!(resolved.lat, 52.2297);
        assert_eq!(resolved.lon, 21.0122);
        assert_eq!(resolved.city, "Warszawa");
    }

    #[test]
    fn parse_empty_result_set_is_not_found() {
        assert_eq!(parse_search_response("[]").unwrap(), None);
    }

    #[test]
    fn parse_rejects_malformed_json() {
        let error = parse_search_response("{\"oops\": true}").unwrap_err();
        assert!(matches!(error, Error::Geocode(_)));
    }

    #[test]
    fn parse_rejects_unparseable_coordinates() {
        let payload = r#"[{"lat": "not-a-number", "lon": "21.0", "display_name": "X"}]"#;
        let error = parse_search_response(payload).unwrap_err();
        assert!(matches!(error, Error::Geocode(_)));
    }

    #[test]
    fn city_is_text_before_first_comma() {
        assert_eq!(derive_city("Bialystok, podlaskie, Polska"), "Bialystok");
        assert_eq!(derive_city("Zielonka"), "Zielonka");
    }

    #[test]
    fn base_url_normalization() {
        let client = GeocodeClient::with_base_url("https://geo.example.com/").unwrap();
        assert_eq!(client.base_url(), "https://geo.example.com");
        assert!(GeocodeClient::with_base_url("geo.example.com").is_err());
        assert!(GeocodeClient::with_base_url("  ").is_err());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn lookup_rejects_empty_address() {
        let client = GeocodeClient::with_base_url("http://127.0.0.1:1").unwrap();
        let error = client.lookup("   ").await.unwrap_err();
        assert!(matches!(error, Error::InvalidInput(_)));
    }
}
