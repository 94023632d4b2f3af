//! One extraction run: open session → filter → harvest → release → fetch.
//!
//! The run owns the browser session outright. Navigator and harvester only
//! borrow the page, and the session is closed before any download starts,
//! on every path out of the browser phase.

use thiserror::Error;
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::fetcher::{FetchError, LinkReport, ReportFetcher};
use crate::harvester::{HarvestReport, LinkHarvester};
use crate::logger::DiagnosticsLog;
use crate::model::{EmptyReason, Extraction};
use crate::navigator::{FilterNavigator, NavigationOutcome};
use crate::period::Period;
use crate::session::{BrowserLauncher, BrowserSession, SessionError};

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("browser session could not be acquired: {0}")]
    SessionAcquisition(#[from] SessionError),

    #[error("browser task aborted: {0}")]
    BrowserTask(String),

    #[error("report downloader could not be created: {0}")]
    Downloader(#[from] FetchError),
}

/// Result of the browser phase.
#[derive(Debug, Clone, PartialEq)]
pub struct Discovery {
    pub navigation: NavigationOutcome,
    pub harvest: HarvestReport,
}

impl Discovery {
    /// Filters were committed yet the table offered nothing usable, which
    /// more likely means the page structure changed than an empty period.
    pub fn structural_drift(&self) -> bool {
        self.navigation.filters_applied() && self.harvest.links.is_empty()
    }
}

/// Everything a run learned, for display and inspection by the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub extraction: Extraction,
    pub discovery: Discovery,
    pub links: Vec<LinkReport>,
}

impl RunReport {
    pub fn structural_drift(&self) -> bool {
        self.discovery.structural_drift()
    }
}

/// Browser phase: acquire a session, apply filters, harvest links, close.
pub fn discover_links<L: BrowserLauncher>(
    launcher: &L,
    config: &AppConfig,
    period: &Period,
    log: &DiagnosticsLog,
) -> Result<Discovery, SessionError> {
    let session = BrowserSession::new(
        launcher,
        config.browser.max_attempts,
        config.browser.settle_after_load(),
    );
    let mut handle = session.acquire(&config.site.listing_url, log)?;

    let discovery = handle.page().map(|page| {
        let navigation = FilterNavigator::new(&config.site, &config.browser).apply(page, period, log);
        let harvest = LinkHarvester::new(&config.site, &config.browser).harvest(page, log);
        Discovery { navigation, harvest }
    });

    handle.close();
    log.debug("Browser session released");
    discovery
}

pub struct Pipeline<L> {
    config: AppConfig,
    launcher: L,
    log: DiagnosticsLog,
}

impl<L> Pipeline<L>
where
    L: BrowserLauncher + Clone + Send + 'static,
{
    pub fn new(config: AppConfig, launcher: L, log: DiagnosticsLog) -> Self {
        Self { config, launcher, log }
    }

    pub fn log(&self) -> &DiagnosticsLog {
        &self.log
    }

    /// Run one extraction for `period`.
    ///
    /// Only session acquisition failure is fatal. Navigation, page and
    /// per-file failures are contained and show up in the report.
    pub async fn run(&self, period: &Period) -> Result<RunReport, PipelineError> {
        let fetcher = ReportFetcher::new(&self.config.http, &self.config.workbook)?;

        info!("Starting extraction for {}", period);
        self.log.info(&format!("Starting extraction for {}", period));

        // headless_chrome operations are blocking, run in a blocking thread
        let launcher = self.launcher.clone();
        let config = self.config.clone();
        let task_period = period.clone();
        let task_log = self.log.clone();
        let discovery = tokio::task::spawn_blocking(move || {
            discover_links(&launcher, &config, &task_period, &task_log)
        })
        .await
        .map_err(|e| PipelineError::BrowserTask(e.to_string()))??;

        if discovery.harvest.links.is_empty() {
            if discovery.structural_drift() {
                warn!("Filters applied but no report links matched; selectors may no longer match the site");
                self.log.warn("Filters applied but no report links matched; selectors may no longer match the site");
            }
            self.log.error(&EmptyReason::NoLinksFound.to_string());
            return Ok(RunReport {
                extraction: Extraction::NothingExtracted(EmptyReason::NoLinksFound),
                discovery,
                links: Vec::new(),
            });
        }

        let fetched = fetcher.fetch_all(&discovery.harvest.links, &self.log).await;
        let parsed = fetched.parsed_links();
        let extraction = Extraction::from_records(fetched.records);

        match &extraction {
            Extraction::Data(dataset) => {
                info!("Extracted {} rows from {} file(s)", dataset.len(), parsed);
                self.log.info(&format!(
                    "Extracted {} rows ({} of {} files parsed)",
                    dataset.len(),
                    parsed,
                    fetched.links.len()
                ));
            }
            Extraction::NothingExtracted(reason) => self.log.error(&reason.to_string()),
        }

        Ok(RunReport {
            extraction,
            discovery,
            links: fetched.links,
        })
    }
}
