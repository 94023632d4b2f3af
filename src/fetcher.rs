//! Downloads report workbooks and normalizes their fixed data block.

use std::io::{Cursor, Read, Seek};

use calamine::{Data, Range, Reader, Xls, Xlsx};
use chrono::NaiveDate;
use reqwest::StatusCode;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::{HttpConfig, WorkbookConfig};
use crate::logger::DiagnosticsLog;
use crate::model::{Cell, ReportLink, ReportRecord, BLOCK_COLUMNS};

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected status {status}")]
    HttpStatus { status: StatusCode },

    #[error("unsupported report format: {0}")]
    UnsupportedFormat(String),

    #[error("workbook could not be read: {0}")]
    Workbook(String),

    #[error("sheet '{0}' not found")]
    MissingSheet(String),

    #[error("sheet does not match the report layout: {0}")]
    Schema(String),
}

impl FetchError {
    /// Download problems, as opposed to content problems.
    pub fn is_transport(&self) -> bool {
        matches!(self, FetchError::Http(_) | FetchError::HttpStatus { .. })
    }
}

/// Workbook container format, chosen from the file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SheetFormat {
    /// Office Open XML (`.xlsx`)
    Xlsx,
    /// Legacy BIFF binary (`.xls`)
    Xls,
}

impl SheetFormat {
    pub fn classify(url: &str) -> Option<Self> {
        let extension = url.rsplit('.').next()?.to_ascii_lowercase();
        match extension.as_str() {
            "xlsx" => Some(SheetFormat::Xlsx),
            "xls" => Some(SheetFormat::Xls),
            _ => None,
        }
    }

    /// Decode `bytes` with this format's reader and return the named sheet.
    pub fn read_sheet(self, bytes: Vec<u8>, sheet: &str) -> Result<Range<Data>, FetchError> {
        let cursor = Cursor::new(bytes);
        match self {
            SheetFormat::Xlsx => {
                let workbook: Xlsx<_> = Xlsx::new(cursor).map_err(|e| FetchError::Workbook(e.to_string()))?;
                worksheet(workbook, sheet)
            }
            SheetFormat::Xls => {
                let workbook: Xls<_> = Xls::new(cursor).map_err(|e| FetchError::Workbook(e.to_string()))?;
                worksheet(workbook, sheet)
            }
        }
    }
}

fn worksheet<RS, R>(mut workbook: R, sheet: &str) -> Result<Range<Data>, FetchError>
where
    RS: Read + Seek,
    R: Reader<RS>,
    R::Error: std::fmt::Display,
{
    if !workbook.sheet_names().iter().any(|name| name == sheet) {
        return Err(FetchError::MissingSheet(sheet.to_string()));
    }
    workbook
        .worksheet_range(sheet)
        .map_err(|e| FetchError::Workbook(e.to_string()))
}

/// Zero-based, inclusive cell rectangle holding the report rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellBlock {
    pub first_row: u32,
    pub last_row: u32,
    pub first_col: u32,
}

impl CellBlock {
    pub fn from_config(workbook: &WorkbookConfig) -> Self {
        Self {
            first_row: workbook.first_row.saturating_sub(1),
            last_row: workbook.last_row.saturating_sub(1),
            first_col: workbook.first_column.saturating_sub(1),
        }
    }

    pub fn last_col(&self) -> u32 {
        self.first_col + BLOCK_COLUMNS.len() as u32 - 1
    }
}

fn to_cell(data: Option<&Data>) -> Cell {
    match data {
        None | Some(Data::Empty) => Cell::Empty,
        Some(Data::Int(i)) => Cell::Number(*i as f64),
        Some(Data::Float(f)) => Cell::Number(*f),
        Some(Data::String(s)) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                Cell::Empty
            } else {
                Cell::Text(trimmed.to_string())
            }
        }
        Some(other) => Cell::Text(other.to_string()),
    }
}

/// Cut the report block out of a sheet and label it.
///
/// The sheet must reach the block's last column. Rows past the end of the
/// sheet are dropped; a block with no rows at all is a layout mismatch.
pub fn extract_block(range: &Range<Data>, block: &CellBlock, report_date: NaiveDate) -> Result<Vec<ReportRecord>, FetchError> {
    let (end_row, end_col) = range
        .end()
        .ok_or_else(|| FetchError::Schema("sheet is empty".to_string()))?;

    if end_col < block.last_col() {
        return Err(FetchError::Schema(format!(
            "sheet has {} columns, report block needs {}",
            end_col + 1,
            block.last_col() + 1
        )));
    }
    if end_row < block.first_row {
        return Err(FetchError::Schema(format!(
            "sheet ends at row {}, report block starts at row {}",
            end_row + 1,
            block.first_row + 1
        )));
    }

    let last_row = block.last_row.min(end_row);
    let records = (block.first_row..=last_row)
        .map(|row| {
            let cells: [Cell; 8] = std::array::from_fn(|offset| {
                to_cell(range.get_value((row, block.first_col + offset as u32)))
            });
            ReportRecord::from_block_row(report_date, cells)
        })
        .collect();

    Ok(records)
}

/// Decode one downloaded workbook into records.
pub fn parse_report(
    bytes: Vec<u8>,
    format: SheetFormat,
    sheet: &str,
    block: &CellBlock,
    report_date: NaiveDate,
) -> Result<Vec<ReportRecord>, FetchError> {
    let range = format.read_sheet(bytes, sheet)?;
    extract_block(&range, block, report_date)
}

/// What one link contributed.
#[derive(Debug, Clone, PartialEq)]
pub enum LinkOutcome {
    Parsed { rows: usize },
    /// Download failed or returned a non-200 status.
    Skipped { reason: String },
    /// Downloaded but not readable as a report.
    Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct LinkReport {
    pub link: ReportLink,
    pub outcome: LinkOutcome,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FetchReport {
    /// All parsed rows, in link order.
    pub records: Vec<ReportRecord>,
    pub links: Vec<LinkReport>,
}

impl FetchReport {
    pub fn parsed_links(&self) -> usize {
        self.links
            .iter()
            .filter(|r| matches!(r.outcome, LinkOutcome::Parsed { .. }))
            .count()
    }

    pub fn unparsed_links(&self) -> usize {
        self.links.len() - self.parsed_links()
    }
}

pub struct ReportFetcher {
    http: reqwest::Client,
    sheet_name: String,
    block: CellBlock,
}

impl ReportFetcher {
    pub fn new(http: &HttpConfig, workbook: &WorkbookConfig) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .user_agent(http.user_agent.clone())
            .timeout(http.request_timeout())
            .danger_accept_invalid_certs(http.accept_invalid_certs)
            .build()?;
        Ok(Self {
            http: client,
            sheet_name: workbook.sheet_name.clone(),
            block: CellBlock::from_config(workbook),
        })
    }

    /// Download and parse one report.
    pub async fn fetch_one(&self, link: &ReportLink) -> Result<Vec<ReportRecord>, FetchError> {
        let format = SheetFormat::classify(&link.url)
            .ok_or_else(|| FetchError::UnsupportedFormat(link.file_name().to_string()))?;

        let response = self.http.get(&link.url).send().await?;
        let status = response.status();
        if status != StatusCode::OK {
            return Err(FetchError::HttpStatus { status });
        }
        let bytes = response.bytes().await?.to_vec();
        debug!("Downloaded {} ({} bytes, {:?})", link.file_name(), bytes.len(), format);

        parse_report(bytes, format, &self.sheet_name, &self.block, link.publication_date)
    }

    /// Fetch every link in order. A failing link is recorded and skipped;
    /// the rest still contribute.
    pub async fn fetch_all(&self, links: &[ReportLink], log: &DiagnosticsLog) -> FetchReport {
        let mut report = FetchReport::default();
        log.start_progress(links.len() as u64, "Downloading reports");

        for link in links {
            let outcome = match self.fetch_one(link).await {
                Ok(records) => {
                    log.debug(&format!("{}: {} rows", link.file_name(), records.len()));
                    let rows = records.len();
                    report.records.extend(records);
                    LinkOutcome::Parsed { rows }
                }
                Err(e) => {
                    warn!("Could not process {}: {}", link.url, e);
                    log.warn(&format!("Could not process {}: {}", link.url, e));
                    if e.is_transport() {
                        LinkOutcome::Skipped { reason: e.to_string() }
                    } else {
                        LinkOutcome::Failed { reason: e.to_string() }
                    }
                }
            };
            report.links.push(LinkReport {
                link: link.clone(),
                outcome,
            });
            log.advance_progress(link.file_name());
        }

        log.finish_progress();
        report
    }
}
