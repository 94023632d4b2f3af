//! Configuration management for psp-extractor
//!
//! All configuration is loaded from `./config/psp-extractor.toml`.
//! Defaults live only in the bundled config template.

use serde::Deserialize;
use std::fs;
use std::io::{self, IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::model::BLOCK_COLUMNS;
use crate::page::Locator;

/// Configuration file path relative to working directory
pub const CONFIG_PATH: &str = "./config/psp-extractor.toml";

/// Default configuration file content - this is the ONLY place defaults exist
pub const DEFAULT_CONFIG: &str = include_str!("../config/psp-extractor.toml");

/// Placeholder substituted into `site.option_xpath`
pub const OPTION_LABEL_PLACEHOLDER: &str = "{label}";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found at {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read configuration file: {0}")]
    IoError(#[from] io::Error),

    #[error("Failed to parse configuration file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Invalid URL in '{field}': {url}")]
    InvalidUrl { field: String, url: String },

    #[error("Configuration field '{field}' cannot be empty")]
    EmptyRequired { field: String },

    #[error("Configuration field '{field}' must contain the {placeholder} placeholder")]
    MissingPlaceholder { field: String, placeholder: String },

    #[error("Invalid sheet block: {0}")]
    InvalidBlock(String),
}

/// Root configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub site: SiteConfig,
    pub browser: BrowserConfig,
    pub http: HttpConfig,
    pub workbook: WorkbookConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// The report listing and its UI structure
#[derive(Debug, Clone, Deserialize)]
pub struct SiteConfig {
    pub listing_url: String,
    pub report_marker: String,
    pub year_control: String,
    pub month_control: String,
    pub option_xpath: String,
    pub page_size_control: String,
    pub page_size: String,
    pub next_page_control: String,
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,
}

fn default_max_pages() -> u32 {
    200
}

impl SiteConfig {
    pub fn year_control(&self) -> Locator {
        Locator::css(&self.year_control)
    }

    pub fn month_control(&self) -> Locator {
        Locator::css(&self.month_control)
    }

    /// Dropdown option whose visible text contains `label`.
    pub fn option(&self, label: &str) -> Locator {
        Locator::xpath(self.option_xpath.replace(OPTION_LABEL_PLACEHOLDER, label))
    }

    pub fn page_size_control(&self) -> Locator {
        Locator::css(&self.page_size_control)
    }

    pub fn next_page_control(&self) -> Locator {
        Locator::css(&self.next_page_control)
    }
}

/// Headless browser launch and timing
#[derive(Debug, Clone, Deserialize)]
pub struct BrowserConfig {
    pub max_attempts: u32,
    pub element_wait_secs: u64,
    pub settle_after_load_ms: u64,
    pub settle_after_filters_ms: u64,
    pub settle_after_page_size_ms: u64,
    pub settle_after_page_turn_ms: u64,
    pub window_width: u32,
    pub window_height: u32,
    #[serde(default)]
    pub disable_sandbox: bool,
    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,
    /// Explicit Chrome binary; `CHROME_PATH` takes precedence when set
    #[serde(default)]
    pub chrome_path: Option<PathBuf>,
}

fn default_idle_timeout_secs() -> u64 {
    300
}

impl BrowserConfig {
    pub fn element_wait(&self) -> Duration {
        Duration::from_secs(self.element_wait_secs)
    }

    pub fn settle_after_load(&self) -> Duration {
        Duration::from_millis(self.settle_after_load_ms)
    }

    pub fn settle_after_filters(&self) -> Duration {
        Duration::from_millis(self.settle_after_filters_ms)
    }

    pub fn settle_after_page_size(&self) -> Duration {
        Duration::from_millis(self.settle_after_page_size_ms)
    }

    pub fn settle_after_page_turn(&self) -> Duration {
        Duration::from_millis(self.settle_after_page_turn_ms)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }
}

/// HTTP client configuration for report downloads
#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    pub user_agent: String,
    pub request_timeout_secs: u64,
    #[serde(default)]
    pub accept_invalid_certs: bool,
}

impl HttpConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Location of the data block inside each report workbook (1-indexed, inclusive)
#[derive(Debug, Clone, Deserialize)]
pub struct WorkbookConfig {
    pub sheet_name: String,
    pub first_row: u32,
    pub last_row: u32,
    pub first_column: u32,
    pub last_column: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_output_file_name")]
    pub file_name: String,
}

fn default_output_file_name() -> String {
    "Grid_India_PSP_Report.xlsx".to_string()
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            file_name: default_output_file_name(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_path(Path::new(CONFIG_PATH))
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// The bundled defaults
    pub fn bundled() -> Result<Self, ConfigError> {
        Self::from_toml(DEFAULT_CONFIG)
    }

    /// Validate all configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        let site = &self.site;
        if !site.listing_url.starts_with("https://") && !site.listing_url.starts_with("http://") {
            return Err(ConfigError::InvalidUrl {
                field: "site.listing_url".to_string(),
                url: site.listing_url.clone(),
            });
        }

        for (field, value) in [
            ("site.report_marker", &site.report_marker),
            ("site.year_control", &site.year_control),
            ("site.month_control", &site.month_control),
            ("site.page_size_control", &site.page_size_control),
            ("site.next_page_control", &site.next_page_control),
            ("workbook.sheet_name", &self.workbook.sheet_name),
            ("http.user_agent", &self.http.user_agent),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::EmptyRequired {
                    field: field.to_string(),
                });
            }
        }

        if !site.option_xpath.contains(OPTION_LABEL_PLACEHOLDER) {
            return Err(ConfigError::MissingPlaceholder {
                field: "site.option_xpath".to_string(),
                placeholder: OPTION_LABEL_PLACEHOLDER.to_string(),
            });
        }

        if site.max_pages == 0 {
            return Err(ConfigError::EmptyRequired {
                field: "site.max_pages".to_string(),
            });
        }
        if self.browser.max_attempts == 0 {
            return Err(ConfigError::EmptyRequired {
                field: "browser.max_attempts".to_string(),
            });
        }
        if self.http.request_timeout_secs == 0 {
            return Err(ConfigError::EmptyRequired {
                field: "http.request_timeout_secs".to_string(),
            });
        }

        let wb = &self.workbook;
        if wb.first_row == 0 || wb.first_column == 0 {
            return Err(ConfigError::InvalidBlock(
                "rows and columns are 1-indexed".to_string(),
            ));
        }
        if wb.last_row < wb.first_row {
            return Err(ConfigError::InvalidBlock(format!(
                "last_row {} is before first_row {}",
                wb.last_row, wb.first_row
            )));
        }
        let width = wb.last_column.saturating_sub(wb.first_column) + 1;
        if wb.last_column < wb.first_column || width as usize != BLOCK_COLUMNS.len() {
            return Err(ConfigError::InvalidBlock(format!(
                "block must span exactly {} columns, got {}..={}",
                BLOCK_COLUMNS.len(),
                wb.first_column,
                wb.last_column
            )));
        }

        Ok(())
    }

    /// Create default configuration file at the standard location
    pub fn create_default_config() -> Result<PathBuf, ConfigError> {
        let path = Path::new(CONFIG_PATH);

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut file = fs::File::create(path)?;
        file.write_all(DEFAULT_CONFIG.as_bytes())?;

        Ok(path.to_path_buf())
    }

    /// Check if stdin is a TTY (interactive terminal)
    pub fn is_interactive() -> bool {
        io::stdin().is_terminal()
    }

    /// Prompt user to create default config (only in interactive mode)
    pub fn prompt_create_config() -> Result<Option<PathBuf>, ConfigError> {
        if !Self::is_interactive() {
            return Ok(None);
        }

        print!("Configuration file not found. Create default config? [Y/n] ");
        io::stdout().flush()?;

        let mut input = String::new();
        io::stdin().read_line(&mut input)?;
        let input = input.trim().to_lowercase();

        if input.is_empty() || input == "y" || input == "yes" {
            let path = Self::create_default_config()?;
            Ok(Some(path))
        } else {
            Ok(None)
        }
    }
}
