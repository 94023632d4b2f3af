//! Headless Chrome launching for the report listing.
//!
//! Exactly one Chrome process may be live at a time; a process-wide gate
//! blocks a second launch until the first page is shut down.
//!
//! Uses std::sync primitives because headless_chrome is blocking and runs
//! inside spawn_blocking.

use std::ffi::OsStr;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use headless_chrome::util::{Timeout, Wait};
use headless_chrome::{Browser, Element, LaunchOptions, Tab};
use tracing::debug;

use crate::config::BrowserConfig;
use crate::page::{Locator, NextPage, PageDriver, PageError};
use crate::session::{BrowserLauncher, SessionError};

/// Flags beyond what LaunchOptions exposes directly.
const EXTRA_CHROME_ARGS: [&str; 4] = [
    "--disable-dev-shm-usage",
    "--disable-gpu",
    "--disable-blink-features=AutomationControlled",
    "--no-proxy-server",
];

/// Truthy when the element is rendered, visible and not disabled.
const CLICKABLE_JS: &str = r#"function() {
    const rect = this.getBoundingClientRect();
    const style = window.getComputedStyle(this);
    return !this.disabled
        && this.getAttribute('aria-disabled') !== 'true'
        && style.visibility !== 'hidden'
        && style.display !== 'none'
        && rect.width > 0 && rect.height > 0;
}"#;

/// Selects the option whose trimmed text equals the argument and fires `change`.
const SELECT_BY_TEXT_JS: &str = r#"function(text) {
    for (const option of this.options) {
        if (option.text.trim() === text) {
            this.value = option.value;
            this.dispatchEvent(new Event('change', { bubbles: true }));
            return true;
        }
    }
    return false;
}"#;

const ENABLED_JS: &str = r#"function() {
    return !(this.disabled || this.getAttribute('aria-disabled') === 'true');
}"#;

/// Absolute href of every anchor in every row of the first table, as a JSON string.
const TABLE_HREFS_JS: &str = r#"JSON.stringify(
    Array.from(document.querySelector('table').querySelectorAll('tr'))
        .flatMap(row => Array.from(row.querySelectorAll('a')).map(a => a.href || ''))
)"#;

/// Held by the live `ChromePage`; a second launch blocks until it is released.
static LIVE_SESSION: Mutex<()> = Mutex::new(());

fn claim_live_session() -> MutexGuard<'static, ()> {
    // the guarded value is (), so a poisoned lock is still usable
    LIVE_SESSION.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Launches headless Chrome configured for the listing site.
#[derive(Debug, Clone)]
pub struct ChromeLauncher {
    config: BrowserConfig,
}

impl ChromeLauncher {
    pub fn new(config: BrowserConfig) -> Self {
        Self { config }
    }

    /// Sandbox is disabled when configured or when running inside a container
    /// (detected via /.dockerenv or PSP_EXTRACTOR_CONTAINER env var).
    fn sandbox_enabled(&self) -> bool {
        let is_container = std::env::var("PSP_EXTRACTOR_CONTAINER").is_ok()
            || std::path::Path::new("/.dockerenv").exists();
        !(self.config.disable_sandbox || is_container)
    }

    /// `CHROME_PATH` first, then the configured path, else let headless_chrome search.
    fn chrome_path(&self) -> Option<PathBuf> {
        std::env::var("CHROME_PATH")
            .ok()
            .map(PathBuf::from)
            .or_else(|| self.config.chrome_path.clone())
    }
}

impl BrowserLauncher for ChromeLauncher {
    type Page = ChromePage;

    fn launch(&self) -> Result<ChromePage, SessionError> {
        let slot = claim_live_session();

        let args: Vec<&OsStr> = EXTRA_CHROME_ARGS.iter().map(OsStr::new).collect();
        let options = LaunchOptions::default_builder()
            .headless(true)
            .sandbox(self.sandbox_enabled())
            .window_size(Some((self.config.window_width, self.config.window_height)))
            .ignore_certificate_errors(true)
            .idle_browser_timeout(self.config.idle_timeout())
            .path(self.chrome_path())
            .args(args)
            .build()
            .map_err(|e| SessionError::Launch(format!("Failed to build Chrome launch options: {}", e)))?;

        let browser = Browser::new(options)
            .map_err(|e| SessionError::Launch(format!("Failed to launch headless Chrome: {}", e)))?;
        let tab = browser
            .new_tab()
            .map_err(|e| SessionError::Launch(format!("Failed to create browser tab: {}", e)))?;

        debug!("Launched headless Chrome (sandbox: {})", self.sandbox_enabled());

        Ok(ChromePage {
            browser: Some(browser),
            tab,
            _slot: Some(slot),
        })
    }
}

/// One Chrome process with the tab driving the listing.
/// Dropping it kills the process and frees the live-session slot.
pub struct ChromePage {
    browser: Option<Browser>,
    tab: Arc<Tab>,
    _slot: Option<MutexGuard<'static, ()>>,
}

fn browser_err(e: impl std::fmt::Display) -> PageError {
    PageError::Browser(e.to_string())
}

/// headless_chrome reports an expired wait as `util::Timeout`; anything else is a browser failure.
fn wait_err(locator: &Locator, timeout: Duration, e: anyhow::Error) -> PageError {
    if e.downcast_ref::<Timeout>().is_some() {
        PageError::timeout(locator, timeout)
    } else {
        browser_err(e)
    }
}

impl ChromePage {
    fn find(&self, locator: &Locator) -> anyhow::Result<Element<'_>> {
        match locator {
            Locator::Css(selector) => self.tab.find_element(selector),
            Locator::XPath(xpath) => self.tab.find_element_by_xpath(xpath),
        }
    }

    fn js_bool(element: &Element<'_>, function: &str, args: Vec<serde_json::Value>) -> Result<bool, PageError> {
        let result = element
            .call_js_fn(function, args, false)
            .map_err(|e| PageError::Script(e.to_string()))?;
        Ok(result.value.and_then(|v| v.as_bool()).unwrap_or(false))
    }

    fn is_clickable(&self, locator: &Locator) -> bool {
        self.find(locator)
            .ok()
            .and_then(|el| Self::js_bool(&el, CLICKABLE_JS, Vec::new()).ok())
            .unwrap_or(false)
    }

    fn wait_present(&self, locator: &Locator, timeout: Duration) -> Result<(), PageError> {
        let waited = match locator {
            Locator::Css(selector) => self.tab.wait_for_element_with_custom_timeout(selector, timeout),
            Locator::XPath(xpath) => self.tab.wait_for_xpath_with_custom_timeout(xpath, timeout),
        };
        waited.map(|_| ()).map_err(|e| wait_err(locator, timeout, e))
    }

    fn wait_clickable(&self, locator: &Locator, timeout: Duration) -> Result<(), PageError> {
        Wait::with_timeout(timeout)
            .until(|| self.is_clickable(locator).then_some(()))
            .map_err(|_| PageError::timeout(locator, timeout))
    }
}

impl PageDriver for ChromePage {
    fn navigate(&self, url: &str) -> Result<(), PageError> {
        self.tab.navigate_to(url).map_err(browser_err)?;
        self.tab.wait_until_navigated().map_err(browser_err)?;
        Ok(())
    }

    fn click_when_ready(&self, target: &Locator, timeout: Duration) -> Result<(), PageError> {
        self.wait_clickable(target, timeout)?;
        self.find(target).map_err(browser_err)?.click().map_err(browser_err)?;
        Ok(())
    }

    fn select_option(&self, control: &Locator, visible_text: &str, timeout: Duration) -> Result<(), PageError> {
        self.wait_clickable(control, timeout)?;
        let element = self.find(control).map_err(browser_err)?;
        if Self::js_bool(&element, SELECT_BY_TEXT_JS, vec![serde_json::json!(visible_text)])? {
            Ok(())
        } else {
            Err(PageError::NotFound(format!("option '{}' in {}", visible_text, control)))
        }
    }

    fn table_hrefs(&self, timeout: Duration) -> Result<Vec<String>, PageError> {
        self.wait_present(&Locator::css("table"), timeout)?;
        let result = self
            .tab
            .evaluate(TABLE_HREFS_JS, false)
            .map_err(|e| PageError::Script(e.to_string()))?;
        let json = result
            .value
            .and_then(|v| v.as_str().map(str::to_owned))
            .ok_or_else(|| PageError::Script("table href query returned no value".to_string()))?;
        serde_json::from_str(&json).map_err(|e| PageError::Script(e.to_string()))
    }

    fn next_page_state(&self, control: &Locator, timeout: Duration) -> Result<NextPage, PageError> {
        self.wait_present(control, timeout)?;
        let element = self.find(control).map_err(browser_err)?;
        if Self::js_bool(&element, ENABLED_JS, Vec::new())? {
            Ok(NextPage::Enabled)
        } else {
            Ok(NextPage::Disabled)
        }
    }

    fn advance(&self, control: &Locator) -> Result<(), PageError> {
        let element = self.find(control).map_err(browser_err)?;
        element.scroll_into_view().map_err(browser_err)?;
        element.click().map_err(browser_err)?;
        Ok(())
    }

    fn shutdown(&mut self) {
        if let Some(browser) = self.browser.take() {
            if let Err(e) = self.tab.close(false) {
                debug!("Tab close failed during shutdown: {}", e);
            }
            // Dropping the Browser kills the Chrome process
            drop(browser);
        }
        self._slot.take();
    }
}

impl Drop for ChromePage {
    fn drop(&mut self) {
        self.shutdown();
    }
}
