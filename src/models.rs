use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Latitude/longitude resolved for a listing address.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
    pub formatted_address: String,
}

/// One auction listing as captured from the sale table.
///
/// Unknown text fields are empty strings, never missing. `coordinates` is only
/// ever added by geocoding; nothing else touches a record after aggregation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingRecord {
    pub suit_number: String,
    pub plaintiff: String,
    pub defendant: String,
    pub address: String,
    pub status: String,
    pub starting_bid: String,
    pub writ_amount: String,
    pub sale_date: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail_url: Option<String>,
    #[serde(default)]
    pub coordinates: Option<Coordinates>,
}

impl ListingRecord {
    pub fn is_geocoded(&self) -> bool {
        self.coordinates.is_some()
    }
}

/// An entry of the page's sale date dropdown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleDateOption {
    pub value: String,
    pub label: String,
}

impl SaleDateOption {
    pub fn new(value: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            label: label.into(),
        }
    }
}

/// Everything a single pipeline run produced.
#[derive(Debug, Clone)]
pub struct ScrapeResult {
    pub scraped_at: DateTime<Utc>,
    pub source: String,
    pub sale_dates: Vec<String>,
    pub listings: Vec<ListingRecord>,
}

impl ScrapeResult {
    pub fn count(&self) -> usize {
        self.listings.len()
    }

    pub fn geocoded_count(&self) -> usize {
        self.listings.iter().filter(|l| l.is_geocoded()).count()
    }
}

/// A listing in the shape the map front-end reads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishedListing {
    #[serde(flatten)]
    pub record: ListingRecord,
    pub formatted_address: String,
    pub url: String,
    pub street_view_url: Option<String>,
}

/// The persisted dataset document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dataset {
    pub scraped_at: DateTime<Utc>,
    pub source: String,
    pub sale_dates: Vec<String>,
    pub count: usize,
    pub listings: Vec<PublishedListing>,
}
