//! The browser seam: everything the navigator and harvester need from a
//! rendered page, behind a trait so the flow can run against a real Chrome
//! tab or a scripted page in tests.

use std::time::Duration;
use thiserror::Error;

/// How an element on the page is found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Locator {
    Css(String),
    XPath(String),
}

impl Locator {
    pub fn css(selector: impl Into<String>) -> Self {
        Locator::Css(selector.into())
    }

    pub fn xpath(expression: impl Into<String>) -> Self {
        Locator::XPath(expression.into())
    }
}

impl std::fmt::Display for Locator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Locator::Css(s) => write!(f, "css `{}`", s),
            Locator::XPath(x) => write!(f, "xpath `{}`", x),
        }
    }
}

/// State of the "next page" control once it has been located.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextPage {
    Enabled,
    Disabled,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PageError {
    #[error("{target} not ready within {waited:?}")]
    Timeout { target: String, waited: Duration },

    #[error("{0} not found")]
    NotFound(String),

    #[error("script evaluation failed: {0}")]
    Script(String),

    #[error("browser error: {0}")]
    Browser(String),
}

impl PageError {
    pub fn timeout(target: &Locator, waited: Duration) -> Self {
        PageError::Timeout {
            target: target.to_string(),
            waited,
        }
    }
}

/// Operations on one rendered listing page.
///
/// Every wait is bounded: an element that is not present (and, where
/// relevant, clickable) within `timeout` yields `PageError::Timeout`.
pub trait PageDriver {
    /// Load `url` and wait for the navigation to finish.
    fn navigate(&self, url: &str) -> Result<(), PageError>;

    /// Wait until `target` is present, visible and enabled, then click it.
    fn click_when_ready(&self, target: &Locator, timeout: Duration) -> Result<(), PageError>;

    /// Wait for the `<select>` at `control`, then choose the option whose text is `visible_text`.
    fn select_option(&self, control: &Locator, visible_text: &str, timeout: Duration) -> Result<(), PageError>;

    /// Wait for the results table and return the href of every anchor in every row, in page order.
    fn table_hrefs(&self, timeout: Duration) -> Result<Vec<String>, PageError>;

    /// Wait for the pagination control and report whether it can be used.
    fn next_page_state(&self, control: &Locator, timeout: Duration) -> Result<NextPage, PageError>;

    /// Scroll the pagination control into view and click it.
    fn advance(&self, control: &Locator) -> Result<(), PageError>;

    /// Fixed wait for client-side rendering to catch up.
    fn settle(&self, interval: Duration) {
        if !interval.is_zero() {
            std::thread::sleep(interval);
        }
    }

    /// Tear down the underlying browser. Called at most once, by the session handle.
    fn shutdown(&mut self);
}
