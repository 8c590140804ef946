use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_SOURCE_URL: &str =
    "https://sheriffsaleonline.azurewebsites.net/sheriffsaledates/ouachita";
pub const DEFAULT_OUTPUT: &str = "data/listings.json";
pub const API_KEY_ENV: &str = "GOOGLE_MAPS_API_KEY";

/// Tunables for one scrape run.
#[derive(Debug, Clone)]
pub struct ScrapeConfig {
    pub source_url: String,
    /// `id` of the sale date `<select>`.
    pub date_selector_id: String,
    /// `class` of the listings `<table>`.
    pub table_class: String,
    pub navigation_timeout: Duration,
    /// Pause after the first load before reading the dropdown.
    pub initial_settle: Duration,
    /// Upper bound on waiting for the table to stop changing after a selection.
    pub settle_budget: Duration,
    pub settle_poll_interval: Duration,
    /// Throttle between two date selections.
    pub date_delay: Duration,
    pub geocode_delay: Duration,
    /// Token that shows an address already names the state.
    pub jurisdiction_token: String,
    pub jurisdiction_suffix: String,
    pub output_path: PathBuf,
    pub api_key: Option<String>,
    pub headless: bool,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            source_url: DEFAULT_SOURCE_URL.to_string(),
            date_selector_id: "selDate".to_string(),
            table_class: "table".to_string(),
            navigation_timeout: Duration::from_secs(60),
            initial_settle: Duration::from_secs(3),
            settle_budget: Duration::from_millis(2000),
            settle_poll_interval: Duration::from_millis(250),
            date_delay: Duration::from_millis(500),
            geocode_delay: Duration::from_millis(250),
            jurisdiction_token: "LA".to_string(),
            jurisdiction_suffix: "Louisiana".to_string(),
            output_path: PathBuf::from(DEFAULT_OUTPUT),
            api_key: None,
            headless: true,
        }
    }
}

impl ScrapeConfig {
    /// Fills in the API key from the environment (and `.env`) when none was given.
    pub fn with_env_api_key(mut self) -> Self {
        if self.api_key.is_none() {
            let _ = dotenvy::dotenv();
            self.api_key = std::env::var(API_KEY_ENV)
                .ok()
                .filter(|key| !key.trim().is_empty());
        }
        self
    }

    /// Settings with every delay set to zero, for tests.
    pub fn without_delays() -> Self {
        Self {
            initial_settle: Duration::ZERO,
            settle_budget: Duration::ZERO,
            settle_poll_interval: Duration::ZERO,
            date_delay: Duration::ZERO,
            geocode_delay: Duration::ZERO,
            ..Self::default()
        }
    }
}
