use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "psp-extractor")]
#[command(about = "Collects daily power supply position reports for a period into a single spreadsheet")]
#[command(version)]
pub struct Cli {
    /// Financial year as shown on the listing, e.g. 2024-25
    #[arg(short, long)]
    pub year: Option<String>,

    /// Month name (April..March) or ALL
    #[arg(short, long, default_value = "ALL")]
    pub month: String,

    /// Output format: 'xlsx' (default), 'csv' or 'json'
    #[arg(short = 'f', long, default_value = "xlsx")]
    pub format: String,

    /// Output file path (defaults to the configured file name, extension set by format)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Configuration file (defaults to ./config/psp-extractor.toml)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Create default configuration file at ./config/psp-extractor.toml
    #[arg(long)]
    pub init: bool,

    /// List selectable financial years and months, then exit
    #[arg(long)]
    pub list_periods: bool,

    /// Print the browser log after the run
    #[arg(long)]
    pub show_log: bool,

    /// Export the browser log to a file
    #[arg(long)]
    pub log_file: Option<String>,

    /// Verbose logging (use -v for per-page detail, -vv for every browser action)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    /// Output path. An explicit path with an extension is used as given;
    /// otherwise the extension follows the output format.
    pub fn output_path(&self, default_file_name: &str, extension: &str) -> PathBuf {
        match &self.output {
            Some(path) if path.extension().is_some() => path.clone(),
            Some(path) => path.with_extension(extension),
            None => PathBuf::from(default_file_name).with_extension(extension),
        }
    }
}
