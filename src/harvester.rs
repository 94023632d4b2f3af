//! Walks the paginated results table and collects dated report links.

use chrono::NaiveDate;
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};
use url::Url;

use crate::config::{BrowserConfig, SiteConfig};
use crate::logger::DiagnosticsLog;
use crate::model::ReportLink;
use crate::page::{NextPage, PageDriver};

/// Recognized report file extensions (compared case-insensitively).
pub const REPORT_EXTENSIONS: [&str; 2] = [".xls", ".xlsx"];

/// Filename date prefix, e.g. `05.04.24` in `05.04.24_NLDC_PSP.xls`.
pub const FILENAME_DATE_FORMAT: &str = "%d.%m.%y";

/// Why an href was not kept. Expected noise, never an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LinkSkip {
    Empty,
    MissingMarker,
    UnsupportedExtension,
    InvalidUrl,
    UndatedFilename,
}

/// Validate one href and pull its publication date out of the filename.
pub fn parse_report_link(href: &str, marker: &str) -> Result<ReportLink, LinkSkip> {
    let href = href.trim();
    if href.is_empty() {
        return Err(LinkSkip::Empty);
    }
    if !href.contains(marker) {
        return Err(LinkSkip::MissingMarker);
    }
    let lower = href.to_ascii_lowercase();
    if !REPORT_EXTENSIONS.iter().any(|ext| lower.ends_with(ext)) {
        return Err(LinkSkip::UnsupportedExtension);
    }

    let url = Url::parse(href).map_err(|_| LinkSkip::InvalidUrl)?;
    let file_name = url
        .path_segments()
        .and_then(|segments| segments.last())
        .filter(|name| !name.is_empty())
        .ok_or(LinkSkip::InvalidUrl)?;

    let date_part = file_name.split('_').next().unwrap_or_default();
    let publication_date =
        NaiveDate::parse_from_str(date_part, FILENAME_DATE_FORMAT).map_err(|_| LinkSkip::UndatedFilename)?;

    Ok(ReportLink::new(publication_date, href))
}

/// Why pagination ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HarvestStop {
    /// The next-page control was present but disabled.
    LastPage,
    /// The next-page control could not be located.
    ControlMissing(String),
    /// Clicking the next-page control failed.
    TransitionFailed(String),
    /// The configured page limit was reached.
    PageLimit(u32),
}

/// A page whose table could not be read; it contributed no links.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageFailure {
    pub page: u32,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarvestReport {
    /// Unique by url, ascending by publication date.
    pub links: Vec<ReportLink>,
    pub pages_visited: u32,
    pub duplicates: usize,
    pub skipped: HashMap<LinkSkip, usize>,
    pub page_failures: Vec<PageFailure>,
    pub stop: HarvestStop,
}

impl HarvestReport {
    pub fn skipped_total(&self) -> usize {
        self.skipped.values().sum()
    }
}

pub struct LinkHarvester<'a> {
    site: &'a SiteConfig,
    timing: &'a BrowserConfig,
}

impl<'a> LinkHarvester<'a> {
    pub fn new(site: &'a SiteConfig, timing: &'a BrowserConfig) -> Self {
        Self { site, timing }
    }

    /// Collect every valid report link across all pages of the table.
    pub fn harvest<P: PageDriver + ?Sized>(&self, page: &P, log: &DiagnosticsLog) -> HarvestReport {
        let wait = self.timing.element_wait();
        let next_control = self.site.next_page_control();

        let mut links = Vec::new();
        let mut seen = HashSet::new();
        let mut duplicates = 0;
        let mut skipped: HashMap<LinkSkip, usize> = HashMap::new();
        let mut page_failures = Vec::new();
        let mut pages_visited = 0u32;

        let stop = loop {
            pages_visited += 1;

            match page.table_hrefs(wait) {
                Ok(hrefs) => {
                    let before = links.len();
                    for href in hrefs {
                        match parse_report_link(&href, &self.site.report_marker) {
                            Ok(link) => {
                                if seen.insert(link.url.clone()) {
                                    links.push(link);
                                } else {
                                    duplicates += 1;
                                }
                            }
                            Err(reason) => {
                                *skipped.entry(reason).or_default() += 1;
                            }
                        }
                    }
                    log.debug(&format!("Page {}: {} new report links", pages_visited, links.len() - before));
                }
                Err(e) => {
                    warn!("Link extraction error on page {}: {}", pages_visited, e);
                    log.warn(&format!("Link extraction error on page {}: {}", pages_visited, e));
                    page_failures.push(PageFailure {
                        page: pages_visited,
                        reason: e.to_string(),
                    });
                }
            }

            if pages_visited >= self.site.max_pages {
                log.warn(&format!("Stopping after {} pages (page limit)", pages_visited));
                break HarvestStop::PageLimit(pages_visited);
            }

            match page.next_page_state(&next_control, wait) {
                Ok(NextPage::Enabled) => {
                    if let Err(e) = page.advance(&next_control) {
                        debug!("Next page click failed: {}", e);
                        break HarvestStop::TransitionFailed(e.to_string());
                    }
                    page.settle(self.timing.settle_after_page_turn());
                }
                Ok(NextPage::Disabled) => break HarvestStop::LastPage,
                Err(e) => {
                    debug!("Next page control not found: {}", e);
                    break HarvestStop::ControlMissing(e.to_string());
                }
            }
        };

        // stable: same-date links keep discovery order
        links.sort_by_key(|link: &ReportLink| link.publication_date);

        log.info(&format!(
            "Harvested {} report links from {} page(s) ({} skipped, {} duplicate)",
            links.len(),
            pages_visited,
            skipped.values().sum::<usize>(),
            duplicates
        ));

        HarvestReport {
            links,
            pages_visited,
            duplicates,
            skipped,
            page_failures,
            stop,
        }
    }
}
