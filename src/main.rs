use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use sheriff_sale_map::aggregator::DuplicatePolicy;
use sheriff_sale_map::browser::ChromeSession;
use sheriff_sale_map::config::{ScrapeConfig, DEFAULT_OUTPUT, DEFAULT_SOURCE_URL};
use sheriff_sale_map::debug;
use sheriff_sale_map::geocoding::GoogleGeocoder;
use sheriff_sale_map::pipeline::run_pipeline;
use sheriff_sale_map::tui::RunReporter;

#[derive(Parser, Debug)]
#[clap(author, version, about = "Sheriff sale scraper - builds the map dataset")]
struct Args {
    /// Path to output JSON file
    #[clap(short, long, default_value = DEFAULT_OUTPUT)]
    output: PathBuf,

    /// Sheriff sale page to scrape
    #[clap(short, long, default_value = DEFAULT_SOURCE_URL)]
    url: String,

    /// Google Maps API key (falls back to GOOGLE_MAPS_API_KEY)
    #[clap(short = 'k', long)]
    api_key: Option<String>,

    /// Longest wait for the table to settle after picking a date, in milliseconds
    #[clap(long, default_value = "2000")]
    settle_ms: u64,

    /// Pause between geocoding requests, in milliseconds
    #[clap(long, default_value = "250")]
    geocode_delay_ms: u64,

    /// Keep later snapshots of a suit number instead of the first one seen
    #[clap(long)]
    latest_wins: bool,

    /// Write listings without coordinates
    #[clap(long)]
    skip_geocode: bool,

    /// Show the browser window
    #[clap(long)]
    headful: bool,

    /// Enable debug output
    #[clap(short, long)]
    debug: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    debug::init_from_env();
    if args.debug {
        debug::set_debug(true);
    }

    let config = ScrapeConfig {
        source_url: args.url,
        output_path: args.output,
        api_key: args.api_key,
        settle_budget: Duration::from_millis(args.settle_ms),
        geocode_delay: Duration::from_millis(args.geocode_delay_ms),
        headless: !args.headful,
        ..ScrapeConfig::default()
    }
    .with_env_api_key();

    let policy = if args.latest_wins {
        DuplicatePolicy::LatestWins
    } else {
        DuplicatePolicy::FirstSeenWins
    };

    let lookup = match (&config.api_key, args.skip_geocode) {
        (Some(key), false) => Some(GoogleGeocoder::new(key.as_str())?),
        _ => None,
    };

    let session = ChromeSession::launch(&config)?;
    let mut reporter = RunReporter::new();
    run_pipeline(session, lookup, &config, policy, &mut reporter)?;

    Ok(())
}
