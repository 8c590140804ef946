use std::sync::LazyLock;

use anyhow::{anyhow, Result};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::debug_println;
use crate::models::ListingRecord;

/// Rows shorter than this are headers or layout noise.
pub const MIN_ROW_CELLS: usize = 7;

static SUIT_LINE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{2}-[A-Z]-\d+)\s+(.+)").unwrap());
static CURRENCY_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\$[\d,]+\.\d{2}").unwrap());
static TITLE_VS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(.+?)\s+(?:vs|v\.)\s+(.+)").unwrap());
const STATUS_KEYWORDS: &str = "PENDING|ACTIVE|SOLD|CANCELL?ED|POSTPONED|WITHDRAWN";

// In a free-text line the defendant runs up to the status keyword or the street number.
static LINE_VS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?i)(.+?)\s+(?:vs|v\.)\s+(.+?)(?:\s+(?:{})\b|\s+\d+\s+[A-Z])",
        STATUS_KEYWORDS
    ))
    .unwrap()
});
static STATUS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!(r"(?i)\b({})\b", STATUS_KEYWORDS)).unwrap());
static EMPTY_FIELD_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r",\s*,").unwrap());

const STREET_TYPES: &str = "DRIVE|DR|ROAD|RD|STREET|ST|AVENUE|AVE|LANE|LN|COURT|CT|CIRCLE|CIR|BLVD|HWY|WAY|LOOP";

/// Rendered state of the sale page at one moment.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageSnapshot {
    pub url: String,
    pub html: String,
    /// The page's visible text (`innerText`), when the driver could read it.
    pub text: Option<String>,
}

impl PageSnapshot {
    pub fn from_html(url: impl Into<String>, html: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            html: html.into(),
            text: None,
        }
    }

    pub fn from_text(url: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            html: String::new(),
            text: Some(text.into()),
        }
    }
}

/// One `<tr>` of the sale table, reduced to its cell texts.
#[derive(Debug, Clone, Default)]
pub struct TableRow {
    pub cells: Vec<String>,
    /// `href` of the link inside the title cell.
    pub link: Option<String>,
    /// Text of that link, which is the case title when present.
    pub link_text: Option<String>,
}

impl TableRow {
    pub fn from_cells<S: AsRef<str>>(cells: &[S]) -> Self {
        Self {
            cells: cells.iter().map(|c| c.as_ref().to_string()).collect(),
            link: None,
            link_text: None,
        }
    }
}

/// How listings are pulled out of a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionStrategy {
    /// Read the rendered listings table row by row.
    Table,
    /// Pattern-match the page text line by line.
    Text,
}

pub struct RecordExtractor {
    rows: Selector,
    cells: Selector,
    link: Selector,
    address_re: Regex,
}

impl RecordExtractor {
    pub fn new(table_class: &str, jurisdiction_token: &str) -> Result<Self> {
        let rows = Selector::parse(&format!("table.{} tbody tr", table_class))
            .map_err(|e| anyhow!("Failed to parse row selector: {:?}", e))?;
        let cells = Selector::parse("td").map_err(|e| anyhow!("Failed to parse cell selector: {:?}", e))?;
        let link = Selector::parse("a").map_err(|e| anyhow!("Failed to parse link selector: {:?}", e))?;
        let address_re = Regex::new(&format!(
            r"(?i)(\d+\s+[A-Z][A-Z0-9\s\.]+(?:{})[A-Z0-9\s,\.]*{}[.\s]*\d{{5}})",
            STREET_TYPES,
            regex::escape(jurisdiction_token)
        ))?;

        Ok(Self {
            rows,
            cells,
            link,
            address_re,
        })
    }

    /// Picks the table reader when the page has any table rows, the text reader otherwise.
    pub fn strategy_for(&self, document: &Html) -> ExtractionStrategy {
        if document.select(&self.rows).next().is_some() {
            ExtractionStrategy::Table
        } else {
            ExtractionStrategy::Text
        }
    }

    pub fn extract(&self, snapshot: &PageSnapshot, sale_date: &str) -> Vec<ListingRecord> {
        let document = Html::parse_document(&snapshot.html);
        let strategy = self.strategy_for(&document);
        debug_println!("Extracting {} with {:?} strategy", sale_date, strategy);

        match strategy {
            ExtractionStrategy::Table => {
                let rows = self.table_rows(&document);
                extract_from_rows(&rows, &snapshot.url, sale_date)
            }
            ExtractionStrategy::Text => {
                let text = match &snapshot.text {
                    Some(text) => text.clone(),
                    None => document.root_element().text().collect::<Vec<_>>().join("\n"),
                };
                self.extract_from_text(&text, sale_date)
            }
        }
    }

    fn table_rows(&self, document: &Html) -> Vec<TableRow> {
        document
            .select(&self.rows)
            .map(|row| {
                let cells: Vec<ElementRef> = row.select(&self.cells).collect();
                let title_link = cells.get(2).and_then(|cell| cell.select(&self.link).next());
                TableRow {
                    cells: cells.iter().map(|cell| element_text(cell)).collect(),
                    link: title_link.and_then(|a| a.value().attr("href")).map(str::to_string),
                    link_text: title_link.map(|a| element_text(&a)),
                }
            })
            .collect()
    }

    /// Scans free text for lines carrying a suit number and a street address.
    pub fn extract_from_text(&self, text: &str, sale_date: &str) -> Vec<ListingRecord> {
        text.lines()
            .filter_map(|line| self.parse_text_line(line, sale_date))
            .collect()
    }

    fn parse_text_line(&self, line: &str, sale_date: &str) -> Option<ListingRecord> {
        let suit = SUIT_LINE_RE.captures(line)?;
        let suit_number = suit.get(1)?.as_str().to_string();
        let rest = suit.get(2)?.as_str();

        let address_match = self.address_re.captures(rest)?.get(1)?;
        let address = EMPTY_FIELD_RE
            .replace_all(&normalize_whitespace(address_match.as_str()), ",")
            .into_owned();

        let mut bids = CURRENCY_RE.find_iter(rest).map(|m| m.as_str().to_string());
        let starting_bid = bids.next().unwrap_or_default();
        let writ_amount = bids.next().unwrap_or_default();

        let (plaintiff, defendant, parties_end) = match LINE_VS_RE.captures(rest) {
            Some(caps) => (
                caps[1].trim().to_string(),
                caps[2].trim().to_string(),
                caps.get(2).map_or(0, |m| m.end()),
            ),
            None => (String::new(), String::new(), 0),
        };

        // Only the gap between the parties and the address can hold the status;
        // party names may contain the keywords themselves.
        let status_start = parties_end.min(address_match.start());
        let status = STATUS_RE
            .find(&rest[status_start..address_match.start()])
            .map(|m| m.as_str().to_uppercase())
            .unwrap_or_else(|| "PENDING".to_string());

        Some(ListingRecord {
            suit_number,
            plaintiff,
            defendant,
            address,
            status,
            starting_bid,
            writ_amount,
            sale_date: sale_date.to_string(),
            detail_url: None,
            coordinates: None,
        })
    }
}

/// Turns table rows into records, dropping short rows and rows without a suit number or address.
///
/// Cell order: unused, suit number, title, status, address, starting bid, writ amount.
pub fn extract_from_rows(rows: &[TableRow], page_url: &str, sale_date: &str) -> Vec<ListingRecord> {
    rows.iter()
        .filter_map(|row| parse_table_row(row, page_url, sale_date))
        .collect()
}

fn parse_table_row(row: &TableRow, page_url: &str, sale_date: &str) -> Option<ListingRecord> {
    if row.cells.len() < MIN_ROW_CELLS {
        return None;
    }

    let suit_number = row.cells[1].trim().to_string();
    let address = normalize_whitespace(&row.cells[4]);
    if suit_number.is_empty() || address.is_empty() {
        debug_println!("Skipping incomplete row: {:?}", row.cells);
        return None;
    }

    let title = row.link_text.as_deref().unwrap_or(&row.cells[2]);
    let (plaintiff, defendant) = split_title(title);

    Some(ListingRecord {
        suit_number,
        plaintiff,
        defendant,
        address,
        status: row.cells[3].trim().to_string(),
        starting_bid: row.cells[5].trim().to_string(),
        writ_amount: row.cells[6].trim().to_string(),
        sale_date: sale_date.to_string(),
        detail_url: row.link.as_deref().and_then(|href| resolve_link(page_url, href)),
        coordinates: None,
    })
}

/// Splits "Plaintiff vs Defendant"; both sides are empty when there is no separator.
pub fn split_title(title: &str) -> (String, String) {
    match TITLE_VS_RE.captures(title.trim()) {
        Some(caps) => (caps[1].trim().to_string(), caps[2].trim().to_string()),
        None => (String::new(), String::new()),
    }
}

pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn element_text(element: &ElementRef) -> String {
    normalize_whitespace(&element.text().collect::<String>())
}

fn resolve_link(page_url: &str, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() {
        return None;
    }
    Url::parse(page_url)
        .and_then(|base| base.join(href))
        .or_else(|_| Url::parse(href))
        .ok()
        .map(String::from)
}
