//! Scripted stand-in for a Chrome tab on the report listing.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use psp_extractor::page::{Locator, NextPage, PageDriver, PageError};
use psp_extractor::session::{BrowserLauncher, SessionError};

/// What the fake listing shows and where it breaks.
#[derive(Debug, Clone, Default)]
pub struct Script {
    /// Table contents per results page; an `Err` page fails to render.
    pub pages: Vec<Result<Vec<String>, PageError>>,
    /// Any click target whose description contains this text times out.
    pub failing_locator: Option<String>,
    pub page_size_missing: bool,
    pub next_control_missing: bool,
    /// Keep the next-page control enabled past the last scripted page.
    pub next_always_enabled: bool,
    pub advance_fails: bool,
    pub launch_failures: u32,
    pub navigation_failures: u32,
}

impl Script {
    pub fn with_pages(pages: Vec<Vec<String>>) -> Self {
        Self {
            pages: pages.into_iter().map(Ok).collect(),
            ..Default::default()
        }
    }
}

/// Everything the fake observed.
#[derive(Debug, Default)]
pub struct Journal {
    pub launches: u32,
    pub shutdowns: u32,
    pub navigations: Vec<String>,
    pub clicks: Vec<String>,
    pub selections: Vec<String>,
    pub table_reads: u32,
    pub advances: u32,
    pub current_page: usize,
    /// Every settle interval requested, in order.
    pub settles: Vec<Duration>,
}

#[derive(Clone)]
pub struct FakeLauncher {
    script: Arc<Script>,
    journal: Arc<Mutex<Journal>>,
}

impl FakeLauncher {
    pub fn new(script: Script) -> Self {
        Self {
            script: Arc::new(script),
            journal: Arc::new(Mutex::new(Journal::default())),
        }
    }

    pub fn journal(&self) -> MutexGuard<'_, Journal> {
        self.journal.lock().unwrap()
    }

    /// A page that skips launch, for driving navigator and harvester directly.
    pub fn page(&self) -> FakePage {
        FakePage {
            script: self.script.clone(),
            journal: self.journal.clone(),
            fail_navigation: false,
        }
    }
}

impl BrowserLauncher for FakeLauncher {
    type Page = FakePage;

    fn launch(&self) -> Result<FakePage, SessionError> {
        let mut journal = self.journal.lock().unwrap();
        journal.launches += 1;
        if journal.launches <= self.script.launch_failures {
            return Err(SessionError::Launch("Could not auto detect a chrome executable".into()));
        }
        Ok(FakePage {
            script: self.script.clone(),
            journal: self.journal.clone(),
            fail_navigation: journal.launches <= self.script.launch_failures + self.script.navigation_failures,
        })
    }
}

pub struct FakePage {
    script: Arc<Script>,
    journal: Arc<Mutex<Journal>>,
    fail_navigation: bool,
}

impl FakePage {
    fn journal(&self) -> MutexGuard<'_, Journal> {
        self.journal.lock().unwrap()
    }
}

impl PageDriver for FakePage {
    fn navigate(&self, url: &str) -> Result<(), PageError> {
        let mut journal = self.journal();
        journal.navigations.push(url.to_string());
        if self.fail_navigation {
            return Err(PageError::Browser("net::ERR_TIMED_OUT".into()));
        }
        journal.current_page = 0;
        Ok(())
    }

    fn click_when_ready(&self, target: &Locator, timeout: Duration) -> Result<(), PageError> {
        let description = target.to_string();
        if let Some(failing) = &self.script.failing_locator {
            if description.contains(failing.as_str()) {
                return Err(PageError::timeout(target, timeout));
            }
        }
        self.journal().clicks.push(description);
        Ok(())
    }

    fn select_option(&self, control: &Locator, visible_text: &str, timeout: Duration) -> Result<(), PageError> {
        if self.script.page_size_missing {
            return Err(PageError::timeout(control, timeout));
        }
        self.journal().selections.push(format!("{} = {}", control, visible_text));
        Ok(())
    }

    fn table_hrefs(&self, _timeout: Duration) -> Result<Vec<String>, PageError> {
        let mut journal = self.journal();
        journal.table_reads += 1;
        self.script
            .pages
            .get(journal.current_page)
            .cloned()
            .unwrap_or_else(|| Ok(Vec::new()))
    }

    fn next_page_state(&self, control: &Locator, _timeout: Duration) -> Result<NextPage, PageError> {
        if self.script.next_control_missing {
            return Err(PageError::NotFound(control.to_string()));
        }
        let journal = self.journal();
        if self.script.next_always_enabled || journal.current_page + 1 < self.script.pages.len() {
            Ok(NextPage::Enabled)
        } else {
            Ok(NextPage::Disabled)
        }
    }

    fn advance(&self, control: &Locator) -> Result<(), PageError> {
        if self.script.advance_fails {
            return Err(PageError::Browser(format!("{} detached from DOM", control)));
        }
        let mut journal = self.journal();
        journal.advances += 1;
        journal.current_page += 1;
        Ok(())
    }

    fn settle(&self, interval: Duration) {
        self.journal().settles.push(interval);
    }

    fn shutdown(&mut self) {
        self.journal().shutdowns += 1;
    }
}
