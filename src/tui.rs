use crossterm::{
    execute,
    style::{Color, Print, ResetColor, SetForegroundColor},
};
use std::io::{self, Write};

use crate::debug_eprintln;
use crate::models::{Coordinates, SaleDateOption};

/// End-of-run numbers, shown whatever went wrong along the way.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub total_listings: usize,
    pub dates_processed: usize,
    pub dates_failed: usize,
    pub geocoded: usize,
}

/// Coloured console progress for a pipeline run.
///
/// Progress is best effort: a console that cannot be written to never fails the run.
pub struct RunReporter {
    out: Box<dyn Write>,
    geocode_total: usize,
    geocode_index: usize,
}

impl Default for RunReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl RunReporter {
    pub fn new() -> Self {
        Self::to_writer(io::stdout())
    }

    /// A reporter that prints nothing.
    pub fn quiet() -> Self {
        Self::to_writer(io::sink())
    }

    pub fn to_writer(out: impl Write + 'static) -> Self {
        Self {
            out: Box::new(out),
            geocode_total: 0,
            geocode_index: 0,
        }
    }

    fn line(&mut self, color: Color, text: String) {
        let written = execute!(
            self.out,
            SetForegroundColor(color),
            Print(&text),
            Print("\n"),
            ResetColor
        );
        if let Err(e) = written {
            debug_eprintln!("Progress output failed ({}): {}", e, text);
        }
    }

    pub fn start(&mut self, source: &str) {
        self.line(Color::White, "🔎 Starting scraper...".to_string());
        self.line(Color::DarkGrey, format!("Source: {}", source))
    }

    pub fn dates_found(&mut self, dates: &[SaleDateOption]) {
        let labels: Vec<&str> = dates.iter().map(|d| d.label.as_str()).collect();
        self.line(
            Color::White,
            format!("📅 Found {} sale dates: {}", dates.len(), labels.join(", ")),
        )
    }

    pub fn single_page_mode(&mut self) {
        self.line(
            Color::Yellow,
            "⚠ No date dropdown found, scraping current page...".to_string(),
        )
    }

    pub fn date_started(&mut self, index: usize, total: usize, label: &str) {
        self.line(Color::Blue, format!("[{}/{}] Scraping {}...", index, total, label))
    }

    pub fn date_result(&mut self, found: usize, new: usize) {
        self.line(
            Color::Green,
            format!("  Found {} listings ({} new)", found, new),
        )
    }

    pub fn date_failed(&mut self, error: &str) {
        self.line(Color::Red, format!("  Error: {}", error))
    }

    pub fn date_unsettled(&mut self, label: &str) {
        self.line(
            Color::Yellow,
            format!("  ⚠ Table did not change for {}, listings not merged", label),
        )
    }

    pub fn totals(&mut self, total: usize, sale_dates: &[String]) {
        self.line(Color::White, "========================================".to_string());
        self.line(Color::White, format!("Total unique listings: {}", total));
        self.line(Color::White, format!("Sale dates: {}", sale_dates.join(", ")));
        self.line(Color::White, "========================================".to_string())
    }

    pub fn start_geocoding(&mut self, total: usize) {
        self.geocode_total = total;
        self.geocode_index = 0;
        self.line(Color::White, format!("🗺️  Geocoding {} addresses...", total))
    }

    pub fn geocoding_skipped(&mut self, reason: &str) {
        self.line(Color::Yellow, format!("⚠ Geocoding skipped: {}", reason))
    }

    pub fn geocode_result(&mut self, address: &str, coordinates: Option<&Coordinates>) {
        self.geocode_index += 1;
        self.line(
            Color::DarkGrey,
            format!("[{}/{}] {}", self.geocode_index, self.geocode_total, address),
        );
        match coordinates {
            Some(c) => self.line(Color::Green, format!("  ✓ {:.4}, {:.4}", c.lat, c.lng)),
            None => self.line(Color::Yellow, "  ✗ Could not geocode".to_string()),
        }
    }

    pub fn saved(&mut self, count: usize, path: &str) {
        self.line(Color::Green, format!("💾 Saved {} listings to {}", count, path))
    }

    pub fn summary(&mut self, summary: &RunSummary) {
        self.line(
            Color::Green,
            format!(
                "✅ Done! {} properties from {} sale dates.",
                summary.total_listings, summary.dates_processed
            ),
        );
        if summary.dates_failed > 0 {
            self.line(
                Color::Yellow,
                format!("⚠ {} sale dates could not be scraped", summary.dates_failed),
            );
        }
        self.line(
            Color::Green,
            format!("✅ {} geocoded and ready for map.", summary.geocoded),
        )
    }
}
