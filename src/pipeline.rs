use anyhow::{Context, Result};
use chrono::Utc;

use crate::aggregator::{DuplicatePolicy, ListingStore};
use crate::browser::{PageDriver, PageSession, SettleOutcome};
use crate::config::ScrapeConfig;
use crate::dataset::DatasetWriter;
use crate::debug_eprintln;
use crate::error::NavigationError;
use crate::extractor::RecordExtractor;
use crate::geocoding::{GeocodeLookup, Geocoder};
use crate::models::{ListingRecord, SaleDateOption, ScrapeResult};
use crate::tui::{RunReporter, RunSummary};

/// Label used for listings when the page has no date dropdown.
pub const UNKNOWN_SALE_DATE: &str = "Unknown";

/// Deduplicated listings gathered from the page, before geocoding.
#[derive(Debug)]
pub struct CollectedListings {
    pub sale_dates: Vec<String>,
    pub listings: Vec<ListingRecord>,
    pub dates_failed: usize,
}

#[derive(Debug)]
pub struct RunOutput {
    pub result: ScrapeResult,
    pub summary: RunSummary,
}

/// Walks every sale date of the page and merges what each one lists.
///
/// Takes the session by value: it is dropped (and the browser closed) when this
/// returns, whether the walk succeeded or not.
pub fn collect_listings<S: PageSession>(
    session: S,
    config: &ScrapeConfig,
    policy: DuplicatePolicy,
    reporter: &mut RunReporter,
) -> Result<CollectedListings> {
    let extractor = RecordExtractor::new(&config.table_class, &config.jurisdiction_token)?;
    let mut driver = PageDriver::new(session, config.clone());
    let mut store = ListingStore::new(policy);
    let mut sale_dates = Vec::new();
    let mut dates_failed = 0;

    driver.open().context("Failed to load source page")?;

    let dates = match driver.discover_dates() {
        Ok(dates) => dates,
        Err(e) => {
            debug_eprintln!("Could not read sale dates: {}", e);
            Vec::new()
        }
    };

    if dates.is_empty() {
        reporter.single_page_mode();
        sale_dates.push(UNKNOWN_SALE_DATE.to_string());
        match driver.current_snapshot() {
            Ok(snapshot) => {
                let outcome = store.merge(extractor.extract(&snapshot, UNKNOWN_SALE_DATE));
                reporter.date_result(outcome.accepted, outcome.new_count);
            }
            Err(e) => {
                dates_failed += 1;
                reporter.date_failed(&e.to_string());
            }
        }
    } else {
        reporter.dates_found(&dates);
        for (i, option) in dates.iter().enumerate() {
            sale_dates.push(option.label.clone());
            reporter.date_started(i + 1, dates.len(), &option.label);

            match scrape_date(&mut driver, &extractor, option) {
                // The table may still belong to the previous date; under LatestWins
                // merging it would re-date those listings.
                Ok((_, SettleOutcome::TimedOut)) if policy == DuplicatePolicy::LatestWins => {
                    reporter.date_unsettled(&option.label);
                }
                Ok((records, _)) => {
                    let outcome = store.merge(records);
                    reporter.date_result(outcome.accepted, outcome.new_count);
                }
                Err(e) => {
                    dates_failed += 1;
                    reporter.date_failed(&e.to_string());
                }
            }

            driver.throttle();
        }
    }

    let listings = store.into_listings();
    reporter.totals(listings.len(), &sale_dates);

    Ok(CollectedListings {
        sale_dates,
        listings,
        dates_failed,
    })
}

fn scrape_date<S: PageSession>(
    driver: &mut PageDriver<S>,
    extractor: &RecordExtractor,
    option: &SaleDateOption,
) -> Result<(Vec<ListingRecord>, SettleOutcome), NavigationError> {
    let settled = driver.select_date(option)?;
    let snapshot = driver.current_snapshot()?;
    Ok((extractor.extract(&snapshot, &option.label), settled))
}

/// Geocodes each listing in order. Without a geocoder the listings pass through untouched.
pub fn enrich_listings<L: GeocodeLookup>(
    listings: Vec<ListingRecord>,
    geocoder: Option<&mut Geocoder<L>>,
    reporter: &mut RunReporter,
) -> Vec<ListingRecord> {
    let geocoder = match geocoder {
        Some(geocoder) => geocoder,
        None => {
            reporter.geocoding_skipped("no Google Maps API key configured");
            return listings;
        }
    };
    if listings.is_empty() {
        return listings;
    }

    reporter.start_geocoding(listings.len());
    let mut enriched = Vec::with_capacity(listings.len());
    for listing in listings {
        let listing = geocoder.enrich(listing);
        reporter.geocode_result(&listing.address, listing.coordinates.as_ref());
        enriched.push(listing);
    }
    enriched
}

/// Full run: collect, geocode, write. Only an unreachable page or a failed write is an error.
pub fn run_pipeline<S: PageSession, L: GeocodeLookup>(
    session: S,
    lookup: Option<L>,
    config: &ScrapeConfig,
    policy: DuplicatePolicy,
    reporter: &mut RunReporter,
) -> Result<RunOutput> {
    reporter.start(&config.source_url);

    let collected = collect_listings(session, config, policy, reporter)?;

    let mut geocoder = lookup.map(|lookup| Geocoder::new(lookup, config));
    let listings = enrich_listings(collected.listings, geocoder.as_mut(), reporter);

    let result = ScrapeResult {
        scraped_at: Utc::now(),
        source: config.source_url.clone(),
        sale_dates: collected.sale_dates,
        listings,
    };

    let writer = DatasetWriter::new(&config.output_path, config.api_key.as_deref());
    writer
        .write(&result)
        .with_context(|| format!("Failed to save dataset to {}", writer.path().display()))?;
    reporter.saved(result.count(), &writer.path().display().to_string());

    let summary = RunSummary {
        total_listings: result.count(),
        dates_processed: result.sale_dates.len(),
        dates_failed: collected.dates_failed,
        geocoded: result.geocoded_count(),
    };
    reporter.summary(&summary);

    Ok(RunOutput { result, summary })
}
