//! Browser session acquisition with retries, and the owned handle that
//! guarantees the browser is torn down exactly once.

use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use crate::logger::DiagnosticsLog;
use crate::page::PageDriver;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SessionError {
    #[error("browser launch failed: {0}")]
    Launch(String),

    #[error("navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    #[error("could not open a browser session after {attempts} attempt(s); last error: {last}")]
    Exhausted { attempts: u32, last: String },

    #[error("browser session already closed")]
    Closed,
}

/// Something that can start a fresh browser and hand back its page.
pub trait BrowserLauncher {
    type Page: PageDriver;

    fn launch(&self) -> Result<Self::Page, SessionError>;
}

/// Exclusive ownership of one live browser page.
///
/// `close` is idempotent; dropping the handle closes it too, so every exit
/// path of the owner releases the browser.
pub struct SessionHandle<P: PageDriver> {
    page: Option<P>,
    target_url: String,
}

impl<P: PageDriver> SessionHandle<P> {
    pub fn page(&self) -> Result<&P, SessionError> {
        self.page.as_ref().ok_or(SessionError::Closed)
    }

    pub fn target_url(&self) -> &str {
        &self.target_url
    }

    pub fn is_open(&self) -> bool {
        self.page.is_some()
    }

    /// Shut the browser down. Returns false when it was already closed.
    pub fn close(&mut self) -> bool {
        match self.page.take() {
            Some(mut page) => {
                page.shutdown();
                debug!("Browser session for {} closed", self.target_url);
                true
            }
            None => false,
        }
    }
}

impl<P: PageDriver> Drop for SessionHandle<P> {
    fn drop(&mut self) {
        self.close();
    }
}

/// Opens the listing in a fresh browser, retrying launch or load failures.
pub struct BrowserSession<'a, L: BrowserLauncher> {
    launcher: &'a L,
    max_attempts: u32,
    settle: Duration,
}

impl<'a, L: BrowserLauncher> BrowserSession<'a, L> {
    pub fn new(launcher: &'a L, max_attempts: u32, settle: Duration) -> Self {
        Self {
            launcher,
            max_attempts: max_attempts.max(1),
            settle,
        }
    }

    /// Launch, navigate to `target_url` and wait the settle interval.
    ///
    /// A page that launched but failed to load is shut down before the next
    /// attempt, so failed attempts never leave a Chrome process behind.
    pub fn acquire(&self, target_url: &str, log: &DiagnosticsLog) -> Result<SessionHandle<L::Page>, SessionError> {
        let mut last = String::from("no attempt made");

        for attempt in 1..=self.max_attempts {
            log.debug(&format!("Launching browser (attempt {}/{})", attempt, self.max_attempts));

            let page = match self.launcher.launch() {
                Ok(page) => page,
                Err(e) => {
                    log.warn(&format!("Attempt {} failed: {}", attempt, e));
                    warn!("Browser launch attempt {} failed: {}", attempt, e);
                    last = e.to_string();
                    continue;
                }
            };

            // Owned by a handle from here so a failed load still shuts it down
            let mut handle = SessionHandle {
                page: Some(page),
                target_url: target_url.to_string(),
            };

            let loaded = handle.page().and_then(|p| {
                p.navigate(target_url).map_err(|e| SessionError::Navigation {
                    url: target_url.to_string(),
                    reason: e.to_string(),
                })
            });

            match loaded {
                Ok(()) => {
                    if let Ok(page) = handle.page() {
                        page.settle(self.settle);
                    }
                    log.info(&format!("Loaded {} (attempt {})", target_url, attempt));
                    return Ok(handle);
                }
                Err(e) => {
                    log.warn(&format!("Attempt {} failed: {}", attempt, e));
                    warn!("Browser navigation attempt {} failed: {}", attempt, e);
                    last = e.to_string();
                    handle.close();
                }
            }
        }

        log.error(&format!(
            "Could not open {} after {} attempt(s)",
            target_url, self.max_attempts
        ));
        Err(SessionError::Exhausted {
            attempts: self.max_attempts,
            last,
        })
    }
}
