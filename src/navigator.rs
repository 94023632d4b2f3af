//! Drives the listing's period filters into the requested state.
//!
//! The filter UI is a small state machine: the month dropdown is only
//! populated once a year has been committed, so steps run strictly in
//! order and each one names the state it requires.

use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::config::{BrowserConfig, SiteConfig};
use crate::logger::DiagnosticsLog;
use crate::page::{PageDriver, PageError};
use crate::period::Period;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum FilterState {
    Unfiltered,
    YearSelected,
    MonthSelected,
    /// Filters committed and page size attempted; ready to harvest.
    Paginating,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterStep {
    OpenYearMenu,
    PickYear,
    OpenMonthMenu,
    PickMonth,
}

impl FilterStep {
    pub const SEQUENCE: [FilterStep; 4] = [
        FilterStep::OpenYearMenu,
        FilterStep::PickYear,
        FilterStep::OpenMonthMenu,
        FilterStep::PickMonth,
    ];

    /// State the page must be in before this step may run.
    pub fn requires(self) -> FilterState {
        match self {
            FilterStep::OpenYearMenu | FilterStep::PickYear => FilterState::Unfiltered,
            FilterStep::OpenMonthMenu | FilterStep::PickMonth => FilterState::YearSelected,
        }
    }

    /// State reached once this step succeeds.
    pub fn reaches(self) -> FilterState {
        match self {
            FilterStep::OpenYearMenu => FilterState::Unfiltered,
            FilterStep::PickYear | FilterStep::OpenMonthMenu => FilterState::YearSelected,
            FilterStep::PickMonth => FilterState::MonthSelected,
        }
    }
}

impl std::fmt::Display for FilterStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            FilterStep::OpenYearMenu => "open year selector",
            FilterStep::PickYear => "pick year",
            FilterStep::OpenMonthMenu => "open month selector",
            FilterStep::PickMonth => "pick month",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
#[error("filter step '{step}' failed in state {state:?}: {source}")]
pub struct NavigationError {
    pub step: FilterStep,
    pub state: FilterState,
    #[source]
    pub source: PageError,
}

/// Where navigation ended up. A failure here is reported, never fatal.
#[derive(Debug, Clone, PartialEq)]
pub struct NavigationOutcome {
    pub state: FilterState,
    pub failure: Option<NavigationError>,
    pub page_size_applied: bool,
}

impl NavigationOutcome {
    /// Both filters were committed.
    pub fn filters_applied(&self) -> bool {
        self.state >= FilterState::MonthSelected
    }
}

pub struct FilterNavigator<'a> {
    site: &'a SiteConfig,
    timing: &'a BrowserConfig,
}

impl<'a> FilterNavigator<'a> {
    pub fn new(site: &'a SiteConfig, timing: &'a BrowserConfig) -> Self {
        Self { site, timing }
    }

    /// Select `period` on the page, best-effort.
    ///
    /// Stops at the first step that fails and leaves the page as it is; the
    /// harvester then works on whatever the table shows.
    pub fn apply<P: PageDriver + ?Sized>(&self, page: &P, period: &Period, log: &DiagnosticsLog) -> NavigationOutcome {
        let mut state = FilterState::Unfiltered;
        let wait = self.timing.element_wait();

        for step in FilterStep::SEQUENCE {
            if let Err(source) = self.perform(page, step, state, period, wait) {
                let failure = NavigationError { step, state, source };
                log.error(&format!("Filter selection failed: {}", failure));
                return NavigationOutcome {
                    state,
                    failure: Some(failure),
                    page_size_applied: false,
                };
            }
            state = step.reaches();
            log.debug(&format!("Filter step '{}' done, now {:?}", step, state));
        }

        page.settle(self.timing.settle_after_filters());

        let page_size_applied = match page.select_option(&self.site.page_size_control(), &self.site.page_size, wait) {
            Ok(()) => {
                log.debug(&format!("Page size set to {}", self.site.page_size));
                true
            }
            Err(e) => {
                // only costs extra pagination rounds
                debug!("Page size control unavailable: {}", e);
                false
            }
        };
        page.settle(self.timing.settle_after_page_size());

        log.info(&format!("Filters applied for {}", period));
        NavigationOutcome {
            state: FilterState::Paginating,
            failure: None,
            page_size_applied,
        }
    }

    fn perform<P: PageDriver + ?Sized>(
        &self,
        page: &P,
        step: FilterStep,
        state: FilterState,
        period: &Period,
        wait: Duration,
    ) -> Result<(), PageError> {
        debug_assert_eq!(state, step.requires(), "filter steps must run in order");

        let target = match step {
            FilterStep::OpenYearMenu => self.site.year_control(),
            FilterStep::PickYear => self.site.option(&period.year_label()),
            FilterStep::OpenMonthMenu => self.site.month_control(),
            FilterStep::PickMonth => self.site.option(period.month_label()),
        };
        page.click_when_ready(&target, wait)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_steps_chain_states_in_order() {
        let mut state = FilterState::Unfiltered;
        for step in FilterStep::SEQUENCE {
            assert_eq!(step.requires(), state, "{} ran out of order", step);
            state = step.reaches();
        }
        assert_eq!(state, FilterState::MonthSelected);
    }

    #[test]
    fn test_month_steps_require_year() {
        assert_eq!(FilterStep::OpenMonthMenu.requires(), FilterState::YearSelected);
        assert_eq!(FilterStep::PickMonth.requires(), FilterState::YearSelected);
    }

    #[test]
    fn test_error_message_names_step() {
        let err = NavigationError {
            step: FilterStep::PickMonth,
            state: FilterState::YearSelected,
            source: PageError::NotFound("option".into()),
        };
        assert!(err.to_string().starts_with("filter step 'pick month' failed"));
    }
}
