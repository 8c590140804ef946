use std::collections::hash_map::DefaultHasher;
use std::ffi::OsStr;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use headless_chrome::{Browser, LaunchOptions, Tab};
use serde::Deserialize;

use crate::config::ScrapeConfig;
use crate::error::NavigationError;
use crate::extractor::PageSnapshot;
use crate::models::SaleDateOption;
use crate::{debug_eprintln, debug_println};

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// A live page the pipeline can steer. One tab, used strictly sequentially.
pub trait PageSession {
    fn open(&mut self, url: &str) -> Result<(), NavigationError>;

    /// Options of the date dropdown, or `ControlMissing` if the page has none.
    fn sale_dates(&mut self) -> Result<Vec<SaleDateOption>, NavigationError>;

    fn select_date(&mut self, option: &SaleDateOption) -> Result<(), NavigationError>;

    fn snapshot(&mut self) -> Result<PageSnapshot, NavigationError>;
}

/// Headless Chrome session. The browser process lives exactly as long as this value.
pub struct ChromeSession {
    tab: Arc<Tab>,
    selector_id: String,
    current_url: String,
    // Dropped last; closing the browser kills the child process.
    _browser: Browser,
}

impl ChromeSession {
    pub fn launch(config: &ScrapeConfig) -> Result<Self, NavigationError> {
        let options = LaunchOptions::default_builder()
            .headless(config.headless)
            .sandbox(false)
            .window_size(Some((1920, 1080)))
            .idle_browser_timeout(config.navigation_timeout * 2)
            .args(vec![
                OsStr::new("--disable-dev-shm-usage"),
                OsStr::new("--disable-gpu"),
            ])
            .build()
            .map_err(|e| NavigationError::Browser(e.to_string()))?;

        let browser = Browser::new(options).map_err(|e| NavigationError::Browser(e.to_string()))?;
        let tab = browser
            .new_tab()
            .map_err(|e| NavigationError::Browser(format!("Failed to create tab: {}", e)))?;
        tab.set_default_timeout(config.navigation_timeout);
        tab.set_user_agent(USER_AGENT, None, None)
            .map_err(|e| NavigationError::Browser(e.to_string()))?;

        debug_println!("Launched headless browser");
        Ok(Self {
            tab,
            selector_id: config.date_selector_id.clone(),
            current_url: String::new(),
            _browser: browser,
        })
    }

    fn evaluate_string(&self, script: &str) -> Result<String, NavigationError> {
        let result = self
            .tab
            .evaluate(script, false)
            .map_err(|e| NavigationError::Browser(format!("Script evaluation failed: {}", e)))?;
        Ok(result
            .value
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_default())
    }
}

impl Drop for ChromeSession {
    fn drop(&mut self) {
        debug_println!("Closing browser");
    }
}

fn unreachable(url: &str, reason: impl std::fmt::Display) -> NavigationError {
    NavigationError::PageUnreachable {
        url: url.to_string(),
        reason: reason.to_string(),
    }
}

#[derive(Deserialize)]
struct RawOption {
    value: String,
    label: String,
}

impl PageSession for ChromeSession {
    fn open(&mut self, url: &str) -> Result<(), NavigationError> {
        self.tab.navigate_to(url).map_err(|e| unreachable(url, e))?;
        self.tab.wait_until_navigated().map_err(|e| unreachable(url, e))?;
        self.current_url = url.to_string();
        Ok(())
    }

    fn sale_dates(&mut self) -> Result<Vec<SaleDateOption>, NavigationError> {
        let script = format!(
            r#"(() => {{
                const select = document.getElementById({id});
                if (!select) return "null";
                return JSON.stringify(Array.from(select.options).map(o => ({{
                    value: o.value,
                    label: o.label || o.text
                }})));
            }})()"#,
            id = serde_json::to_string(&self.selector_id).unwrap_or_default()
        );
        let json = self.evaluate_string(&script)?;
        let raw: Option<Vec<RawOption>> = serde_json::from_str(&json)
            .map_err(|e| NavigationError::Browser(format!("Unreadable date options: {}", e)))?;

        match raw {
            Some(options) => Ok(options
                .into_iter()
                .map(|o| SaleDateOption::new(o.value, o.label.trim()))
                .collect()),
            None => Err(NavigationError::ControlMissing(self.selector_id.clone())),
        }
    }

    fn select_date(&mut self, option: &SaleDateOption) -> Result<(), NavigationError> {
        let script = format!(
            r#"(() => {{
                const select = document.getElementById({id});
                if (!select) return "missing";
                select.value = {value};
                if (select.value !== {value}) return "rejected";
                select.dispatchEvent(new Event("input", {{ bubbles: true }}));
                select.dispatchEvent(new Event("change", {{ bubbles: true }}));
                return "ok";
            }})()"#,
            id = serde_json::to_string(&self.selector_id).unwrap_or_default(),
            value = serde_json::to_string(&option.value).unwrap_or_default()
        );

        match self.evaluate_string(&script)?.as_str() {
            "ok" => Ok(()),
            other => Err(NavigationError::SelectionFailed {
                label: option.label.clone(),
                reason: format!("selector answered {:?}", other),
            }),
        }
    }

    fn snapshot(&mut self) -> Result<PageSnapshot, NavigationError> {
        let html = self
            .tab
            .get_content()
            .map_err(|e| NavigationError::Browser(format!("Failed to read page content: {}", e)))?;
        let text = self
            .evaluate_string("document.body ? document.body.innerText : ''")
            .map_err(|e| {
                debug_eprintln!("innerText unavailable: {}", e);
                e
            })
            .ok();

        Ok(PageSnapshot {
            url: self.current_url.clone(),
            html,
            text,
        })
    }
}

/// How a date selection ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettleOutcome {
    /// The page changed and then held still.
    Settled,
    /// The settle budget ran out first; the page may still show the previous date.
    TimedOut,
}

/// Steers a [`PageSession`] through the sale page: load, list dates, switch dates.
pub struct PageDriver<S: PageSession> {
    session: S,
    config: ScrapeConfig,
}

impl<S: PageSession> PageDriver<S> {
    pub fn new(session: S, config: ScrapeConfig) -> Self {
        Self { session, config }
    }

    /// Loads the source page. Failure here ends the run.
    pub fn open(&mut self) -> Result<(), NavigationError> {
        debug_println!("Loading {}", self.config.source_url);
        self.session.open(&self.config.source_url)?;
        pause(self.config.initial_settle);
        Ok(())
    }

    /// Dropdown options in page order. Empty when the page has no dropdown.
    pub fn discover_dates(&mut self) -> Result<Vec<SaleDateOption>, NavigationError> {
        match self.session.sale_dates() {
            Ok(options) => Ok(options),
            Err(NavigationError::ControlMissing(id)) => {
                debug_println!("No #{} dropdown on page, using single-page mode", id);
                Ok(Vec::new())
            }
            Err(e) => Err(e),
        }
    }

    /// Selects `option` and waits for the table to re-render.
    pub fn select_date(&mut self, option: &SaleDateOption) -> Result<SettleOutcome, NavigationError> {
        let before = fingerprint(&self.session.snapshot()?);
        self.session.select_date(option)?;
        let outcome = self.wait_for_settle(before)?;
        if outcome == SettleOutcome::TimedOut {
            debug_eprintln!(
                "Page did not change within {:?} after selecting {}",
                self.config.settle_budget,
                option.label
            );
        }
        Ok(outcome)
    }

    pub fn current_snapshot(&mut self) -> Result<PageSnapshot, NavigationError> {
        self.session.snapshot()
    }

    /// Waits until two consecutive samples match and differ from the pre-selection page,
    /// or until the settle budget runs out. At least one pair of samples is compared.
    fn wait_for_settle(&mut self, before: u64) -> Result<SettleOutcome, NavigationError> {
        let deadline = Instant::now() + self.config.settle_budget;
        let mut previous = fingerprint(&self.session.snapshot()?);
        let mut samples = 1;

        loop {
            pause(self.config.settle_poll_interval);
            let current = fingerprint(&self.session.snapshot()?);
            samples += 1;
            if current == previous && current != before {
                debug_println!("Page settled after {} samples", samples);
                return Ok(SettleOutcome::Settled);
            }
            previous = current;
            if Instant::now() >= deadline {
                debug_println!("Settle budget used up after {} samples", samples);
                return Ok(SettleOutcome::TimedOut);
            }
        }
    }

    pub fn throttle(&self) {
        pause(self.config.date_delay);
    }

    pub fn into_session(self) -> S {
        self.session
    }
}

fn fingerprint(snapshot: &PageSnapshot) -> u64 {
    let mut hasher = DefaultHasher::new();
    snapshot.html.hash(&mut hasher);
    snapshot.text.hash(&mut hasher);
    hasher.finish()
}

fn pause(duration: std::time::Duration) {
    if !duration.is_zero() {
        thread::sleep(duration);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    /// Page whose content flips to the selected date's html `lag` snapshots after selection.
    struct LaggingPage {
        dates: Option<Vec<SaleDateOption>>,
        shown: String,
        pending: Option<(String, usize)>,
        lag: usize,
        snapshots: usize,
    }

    impl LaggingPage {
        fn new(dates: Option<Vec<SaleDateOption>>) -> Self {
            Self {
                dates,
                shown: "initial".to_string(),
                pending: None,
                lag: 2,
                snapshots: 0,
            }
        }
    }

    impl PageSession for LaggingPage {
        fn open(&mut self, _url: &str) -> Result<(), NavigationError> {
            Ok(())
        }

        fn sale_dates(&mut self) -> Result<Vec<SaleDateOption>, NavigationError> {
            self.dates
                .clone()
                .ok_or_else(|| NavigationError::ControlMissing("selDate".to_string()))
        }

        fn select_date(&mut self, option: &SaleDateOption) -> Result<(), NavigationError> {
            self.pending = Some((option.value.clone(), self.lag));
            Ok(())
        }

        fn snapshot(&mut self) -> Result<PageSnapshot, NavigationError> {
            self.snapshots += 1;
            if let Some((html, lag)) = self.pending.take() {
                if lag == 0 {
                    self.shown = html;
                } else {
                    self.pending = Some((html, lag - 1));
                }
            }
            Ok(PageSnapshot::from_html("https://example.test", self.shown.clone()))
        }
    }

    fn config(budget_ms: u64) -> ScrapeConfig {
        ScrapeConfig {
            settle_budget: Duration::from_millis(budget_ms),
            settle_poll_interval: Duration::from_millis(1),
            ..ScrapeConfig::without_delays()
        }
    }

    #[test]
    fn missing_dropdown_means_single_page_mode() {
        let mut driver = PageDriver::new(LaggingPage::new(None), config(0));
        assert!(driver.discover_dates().unwrap().is_empty());
    }

    #[test]
    fn dates_keep_page_order() {
        let dates = vec![
            SaleDateOption::new("2", "Feb 2"),
            SaleDateOption::new("1", "Jan 5"),
        ];
        let mut driver = PageDriver::new(LaggingPage::new(Some(dates.clone())), config(0));
        assert_eq!(driver.discover_dates().unwrap(), dates);
    }

    #[test]
    fn selection_waits_for_rerender() {
        let mut driver = PageDriver::new(LaggingPage::new(None), config(5_000));
        let outcome = driver.select_date(&SaleDateOption::new("jan5", "Jan 5")).unwrap();
        assert_eq!(outcome, SettleOutcome::Settled);
        assert_eq!(driver.current_snapshot().unwrap().html, "jan5");
    }

    #[test]
    fn instant_rerender_settles_without_budget() {
        let mut page = LaggingPage::new(None);
        page.lag = 0;
        let mut driver = PageDriver::new(page, config(0));
        let outcome = driver.select_date(&SaleDateOption::new("jan5", "Jan 5")).unwrap();
        assert_eq!(outcome, SettleOutcome::Settled);
    }

    #[test]
    fn settle_gives_up_when_page_never_changes() {
        let mut driver = PageDriver::new(LaggingPage::new(None), config(20));
        let started = Instant::now();
        // Selecting the value already shown never changes the fingerprint.
        let outcome = driver.select_date(&SaleDateOption::new("initial", "Same")).unwrap();
        assert_eq!(outcome, SettleOutcome::TimedOut);
        assert!(started.elapsed() >= Duration::from_millis(20));
        assert!(driver.into_session().snapshots >= 3);
    }
}
