use std::collections::HashMap;
use std::thread;
use std::time::Duration;

use anyhow::Result;
use reqwest::blocking::Client;
use serde::Deserialize;

use crate::config::ScrapeConfig;
use crate::error::GeocodeFailure;
use crate::models::{Coordinates, ListingRecord};
use crate::{debug_eprintln, debug_println};

const GEOCODE_ENDPOINT: &str = "https://maps.googleapis.com/maps/api/geocode/json";

/// Resolves one address string to coordinates.
pub trait GeocodeLookup {
    fn lookup(&mut self, address: &str) -> Result<Coordinates, GeocodeFailure>;
}

#[derive(Debug, Deserialize)]
struct GoogleResponse {
    status: String,
    #[serde(default)]
    results: Vec<GoogleResult>,
}

#[derive(Debug, Deserialize)]
struct GoogleResult {
    geometry: GoogleGeometry,
    #[serde(default)]
    formatted_address: String,
}

#[derive(Debug, Deserialize)]
struct GoogleGeometry {
    location: GoogleLocation,
}

#[derive(Debug, Deserialize)]
struct GoogleLocation {
    lat: f64,
    lng: f64,
}

/// Google Maps Geocoding API client.
pub struct GoogleGeocoder {
    client: Client,
    api_key: String,
}

impl GoogleGeocoder {
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .user_agent("SheriffSaleMap/0.1")
            .timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            client,
            api_key: api_key.into(),
        })
    }
}

impl GeocodeLookup for GoogleGeocoder {
    fn lookup(&mut self, address: &str) -> Result<Coordinates, GeocodeFailure> {
        let url = format!(
            "{}?address={}&key={}",
            GEOCODE_ENDPOINT,
            urlencoding::encode(address),
            urlencoding::encode(&self.api_key)
        );

        let response = self.client.get(&url).send()?;
        if !response.status().is_success() {
            return Err(GeocodeFailure::Status(format!("HTTP {}", response.status())));
        }

        let body: GoogleResponse = response.json()?;
        coordinates_from_response(body)
    }
}

fn coordinates_from_response(body: GoogleResponse) -> Result<Coordinates, GeocodeFailure> {
    if body.status != "OK" {
        return Err(GeocodeFailure::Status(body.status));
    }
    let first = body.results.into_iter().next().ok_or(GeocodeFailure::NoResults)?;
    Ok(Coordinates {
        lat: first.geometry.location.lat,
        lng: first.geometry.location.lng,
        formatted_address: first.formatted_address,
    })
}

/// Parses a raw Geocoding API body.
pub fn parse_geocode_body(body: &str) -> Result<Coordinates, GeocodeFailure> {
    let response: GoogleResponse =
        serde_json::from_str(body).map_err(|e| GeocodeFailure::Malformed(e.to_string()))?;
    coordinates_from_response(response)
}

/// Appends the state to addresses that don't already name it.
pub fn qualify_address(address: &str, token: &str, suffix: &str) -> String {
    let has_token = address
        .split(|c: char| !c.is_alphanumeric())
        .any(|word| word.eq_ignore_ascii_case(token));
    let has_suffix = address.to_lowercase().contains(&suffix.to_lowercase());

    if has_token || has_suffix {
        address.to_string()
    } else {
        format!("{}, {}", address, suffix)
    }
}

/// Adds coordinates to listings one at a time, pacing requests.
pub struct Geocoder<L: GeocodeLookup> {
    lookup: L,
    cache: HashMap<String, Option<Coordinates>>,
    request_count: usize,
    delay: Duration,
    jurisdiction_token: String,
    jurisdiction_suffix: String,
}

impl<L: GeocodeLookup> Geocoder<L> {
    pub fn new(lookup: L, config: &ScrapeConfig) -> Self {
        Self {
            lookup,
            cache: HashMap::new(),
            request_count: 0,
            delay: config.geocode_delay,
            jurisdiction_token: config.jurisdiction_token.clone(),
            jurisdiction_suffix: config.jurisdiction_suffix.clone(),
        }
    }

    fn rate_limit(&mut self) {
        if self.request_count > 0 && !self.delay.is_zero() {
            thread::sleep(self.delay);
        }
        self.request_count += 1;
    }

    /// Number of lookups actually sent (cache hits excluded).
    pub fn request_count(&self) -> usize {
        self.request_count
    }

    pub fn geocode_address(&mut self, address: &str) -> Option<Coordinates> {
        if address.trim().is_empty() {
            return None;
        }

        let cache_key = address.trim().to_lowercase();
        if let Some(cached) = self.cache.get(&cache_key) {
            debug_println!("Cache hit for address: {}", address);
            return cached.clone();
        }

        self.rate_limit();

        let query = qualify_address(address, &self.jurisdiction_token, &self.jurisdiction_suffix);
        debug_println!("Geocoding address: {} -> {}", address, query);

        let result = match self.lookup.lookup(&query) {
            Ok(coordinates) => Some(coordinates),
            Err(e) => {
                debug_eprintln!("Could not geocode {}: {}", address, e);
                None
            }
        };

        self.cache.insert(cache_key, result.clone());
        result
    }

    /// Returns the record with coordinates attached, or unchanged if the lookup failed.
    pub fn enrich(&mut self, mut record: ListingRecord) -> ListingRecord {
        if record.coordinates.is_some() {
            return record;
        }
        if let Some(coordinates) = self.geocode_address(&record.address) {
            record.coordinates = Some(coordinates);
        }
        record
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct ScriptedLookup {
        queries: Vec<String>,
        fail_on: Option<&'static str>,
    }

    impl GeocodeLookup for ScriptedLookup {
        fn lookup(&mut self, address: &str) -> Result<Coordinates, GeocodeFailure> {
            self.queries.push(address.to_string());
            if self.fail_on.is_some_and(|needle| address.contains(needle)) {
                return Err(GeocodeFailure::Status("ZERO_RESULTS".to_string()));
            }
            Ok(Coordinates {
                lat: 32.5,
                lng: -92.1,
                formatted_address: format!("{}, USA", address),
            })
        }
    }

    fn geocoder(fail_on: Option<&'static str>) -> Geocoder<ScriptedLookup> {
        Geocoder::new(
            ScriptedLookup {
                queries: Vec::new(),
                fail_on,
            },
            &ScrapeConfig::without_delays(),
        )
    }

    fn listing(address: &str) -> ListingRecord {
        ListingRecord {
            suit_number: "37-C-1".to_string(),
            plaintiff: "Bank".to_string(),
            defendant: "Smith".to_string(),
            address: address.to_string(),
            status: "PENDING".to_string(),
            starting_bid: "$1.00".to_string(),
            writ_amount: "$2.00".to_string(),
            sale_date: "Jan 5".to_string(),
            detail_url: None,
            coordinates: None,
        }
    }

    #[test]
    fn appends_state_only_when_missing() {
        assert_eq!(qualify_address("12 ELM ST, MONROE", "LA", "Louisiana"), "12 ELM ST, MONROE, Louisiana");
        assert_eq!(qualify_address("12 ELM ST, MONROE, LA 71201", "LA", "Louisiana"), "12 ELM ST, MONROE, LA 71201");
        assert_eq!(qualify_address("12 Elm St, Monroe, Louisiana", "LA", "Louisiana"), "12 Elm St, Monroe, Louisiana");
        // "LAKE" is not the state token.
        assert_eq!(qualify_address("4 LAKE DR, MONROE", "LA", "Louisiana"), "4 LAKE DR, MONROE, Louisiana");
    }

    #[test]
    fn enrich_adds_coordinates_without_touching_other_fields() {
        let mut geocoder = geocoder(None);
        let original = listing("123 MAIN ST, MONROE, LA 71201");
        let enriched = geocoder.enrich(original.clone());

        let coordinates = enriched.coordinates.clone().unwrap();
        assert_eq!(coordinates.lat, 32.5);
        assert_eq!(ListingRecord { coordinates: None, ..enriched }, original);
    }

    #[test]
    fn failed_lookup_leaves_record_unchanged() {
        let mut geocoder = geocoder(Some("NOWHERE"));
        let original = listing("1 NOWHERE RD");
        assert_eq!(geocoder.enrich(original.clone()), original);
    }

    #[test]
    fn repeated_addresses_hit_cache() {
        let mut geocoder = geocoder(None);
        geocoder.enrich(listing("123 MAIN ST, MONROE, LA 71201"));
        geocoder.enrich(listing("123 main st, monroe, la 71201 "));
        assert_eq!(geocoder.request_count(), 1);
        assert_eq!(geocoder.lookup.queries.len(), 1);
    }

    #[test]
    fn parses_ok_response() {
        let body = r#"{
            "status": "OK",
            "results": [{
                "formatted_address": "123 Main St, Monroe, LA 71201, USA",
                "geometry": { "location": { "lat": 32.509, "lng": -92.119 } }
            }]
        }"#;
        let coordinates = parse_geocode_body(body).unwrap();
        assert_eq!(coordinates.lat, 32.509);
        assert_eq!(coordinates.lng, -92.119);
        assert_eq!(coordinates.formatted_address, "123 Main St, Monroe, LA 71201, USA");
    }

    #[test]
    fn non_ok_status_and_empty_results_fail() {
        let denied = parse_geocode_body(r#"{"status": "REQUEST_DENIED", "results": []}"#);
        assert!(matches!(denied, Err(GeocodeFailure::Status(s)) if s == "REQUEST_DENIED"));

        let empty = parse_geocode_body(r#"{"status": "OK", "results": []}"#);
        assert!(matches!(empty, Err(GeocodeFailure::NoResults)));

        let garbage = parse_geocode_body("<html>");
        assert!(matches!(garbage, Err(GeocodeFailure::Malformed(_))));
    }
}
