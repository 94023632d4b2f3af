pub mod browser_pool;
pub mod cli;
pub mod config;
pub mod export;
pub mod fetcher;
pub mod harvester;
pub mod logger;
pub mod model;
pub mod navigator;
pub mod page;
pub mod period;
pub mod pipeline;
pub mod session;

pub use browser_pool::ChromeLauncher;
pub use config::AppConfig;
pub use logger::{DiagnosticsLog, VerbosityLevel};
pub use model::{Dataset, EmptyReason, Extraction, ReportLink, ReportRecord};
pub use period::Period;
pub use pipeline::{Pipeline, PipelineError, RunReport};
