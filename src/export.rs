use crate::fetcher::LinkOutcome;
use crate::logger::DiagnosticsLog;
use crate::model::{Cell, Dataset, Extraction, DATASET_COLUMNS};
use crate::pipeline::RunReport;
use csv::Writer;
use rust_xlsxwriter::{Format, Workbook};
use std::fs::File;
use std::io::Write;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info};

/// Name of the single sheet in exported workbooks.
pub const EXPORT_SHEET_NAME: &str = "Sheet1";

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("xlsx error: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Xlsx,
    Csv,
    Json,
}

impl OutputFormat {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.to_ascii_lowercase().as_str() {
            "xlsx" | "excel" => Some(OutputFormat::Xlsx),
            "csv" => Some(OutputFormat::Csv),
            "json" => Some(OutputFormat::Json),
            _ => None,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Xlsx => "xlsx",
            OutputFormat::Csv => "csv",
            OutputFormat::Json => "json",
        }
    }
}

/// Render the dataset as an in-memory xlsx file: one header row, no index column.
pub fn dataset_to_xlsx_bytes(dataset: &Dataset) -> Result<Vec<u8>, ExportError> {
    let mut workbook = Workbook::new();
    let header = Format::new().set_bold();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name(EXPORT_SHEET_NAME)?;

    for (col, name) in DATASET_COLUMNS.iter().enumerate() {
        worksheet.write_string_with_format(0, col as u16, *name, &header)?;
    }

    for (idx, record) in dataset.records.iter().enumerate() {
        let row = idx as u32 + 1;
        worksheet.write_string(row, 0, record.date_label())?;
        for (offset, cell) in record.cells().into_iter().enumerate() {
            let col = offset as u16 + 1;
            match cell {
                Cell::Empty => {}
                Cell::Number(n) => {
                    worksheet.write_number(row, col, *n)?;
                }
                Cell::Text(s) => {
                    worksheet.write_string(row, col, s.as_str())?;
                }
            }
        }
    }

    Ok(workbook.save_to_buffer()?)
}

pub fn export_xlsx(dataset: &Dataset, output_path: &str) -> Result<(), ExportError> {
    debug!("Exporting {} rows to XLSX: {}", dataset.len(), output_path);

    let bytes = dataset_to_xlsx_bytes(dataset)?;
    let mut file = File::create(output_path)?;
    file.write_all(&bytes)?;

    info!("Successfully exported {} rows to XLSX: {}", dataset.len(), output_path);
    Ok(())
}

pub fn export_csv(dataset: &Dataset, output_path: &str) -> Result<(), ExportError> {
    debug!("Exporting {} rows to CSV: {}", dataset.len(), output_path);

    let file = File::create(output_path)?;
    let mut wtr = Writer::from_writer(file);
    wtr.write_record(DATASET_COLUMNS)?;

    for record in &dataset.records {
        let mut row = vec![record.date_label()];
        row.extend(record.cells().iter().map(|c| c.to_string()));
        wtr.write_record(&row)?;
    }

    wtr.flush()?;
    info!("Successfully exported {} rows to CSV: {}", dataset.len(), output_path);
    Ok(())
}

pub fn export_json(dataset: &Dataset, output_path: &str) -> Result<(), ExportError> {
    debug!("Exporting {} rows to JSON: {}", dataset.len(), output_path);

    let json_string = serde_json::to_string_pretty(&dataset.records)?;
    let mut file = File::create(output_path)?;
    file.write_all(json_string.as_bytes())?;

    info!("Successfully exported {} rows to JSON: {}", dataset.len(), output_path);
    Ok(())
}

pub fn export(dataset: &Dataset, format: OutputFormat, output_path: &Path) -> Result<(), ExportError> {
    let path = output_path.to_string_lossy();
    match format {
        OutputFormat::Xlsx => export_xlsx(dataset, &path),
        OutputFormat::Csv => export_csv(dataset, &path),
        OutputFormat::Json => export_json(dataset, &path),
    }
}

/// Write `dataset` and say where it went. The browser log is dumped to
/// `log_out` after a failed write, and after a successful one when `show_log`
/// is set. Returns whether the file was written.
pub fn save_dataset(
    dataset: &Dataset,
    format: OutputFormat,
    output_path: &Path,
    log: &DiagnosticsLog,
    show_log: bool,
    log_out: &mut impl Write,
) -> bool {
    let saved = match export(dataset, format, output_path) {
        Ok(()) => {
            println!("📥 Saved {} rows to {}", dataset.len(), output_path.display());
            true
        }
        Err(e) => {
            log.error(&format!("Failed to write {}: {}", output_path.display(), e));
            eprintln!("❌ Failed to write {}: {}", output_path.display(), e);
            false
        }
    };
    if !saved || show_log {
        if let Err(e) = log.print_to(log_out) {
            eprintln!("⚠️  Failed to print browser log: {}", e);
        }
    }
    saved
}

pub fn print_run_summary(report: &RunReport) {
    let harvest = &report.discovery.harvest;
    let navigation = &report.discovery.navigation;

    println!("\n=== Extraction Summary ===");
    println!("Filter state reached: {:?}", navigation.state);
    if let Some(failure) = &navigation.failure {
        println!("Filter failure: {}", failure);
    }
    println!("Page size applied: {}", if navigation.page_size_applied { "yes" } else { "no" });
    println!("Pages visited: {}", harvest.pages_visited);
    println!("Report links found: {}", harvest.links.len());
    if harvest.skipped_total() > 0 {
        println!("Links skipped: {}", harvest.skipped_total());
    }
    for failure in &harvest.page_failures {
        println!("Page {} unreadable: {}", failure.page, failure.reason);
    }

    let mut failed = 0;
    for link_report in &report.links {
        match &link_report.outcome {
            LinkOutcome::Parsed { .. } => {}
            LinkOutcome::Skipped { reason } | LinkOutcome::Failed { reason } => {
                failed += 1;
                println!("  ✗ {}: {}", link_report.link.file_name(), reason);
            }
        }
    }
    if !report.links.is_empty() {
        println!("Files parsed: {}/{}", report.links.len() - failed, report.links.len());
    }
    if report.structural_drift() {
        println!("⚠️  Filters applied but no links matched - the site layout may have changed");
    }
    println!("==========================\n");

    match &report.extraction {
        Extraction::Data(dataset) => println!("✅ Extracted {} rows.", dataset.len()),
        Extraction::NothingExtracted(reason) => println!("❌ {}.", reason),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ReportRecord;
    use calamine::{Data, Reader, Xlsx};
    use chrono::NaiveDate;
    use std::io::Cursor;

    fn dataset() -> Dataset {
        let date = NaiveDate::from_ymd_opt(2024, 4, 5).unwrap();
        let mut row: [Cell; 8] = Default::default();
        row[0] = Cell::Text("Demand Met during Evening Peak".into());
        row[1] = Cell::Number(61234.5);
        row[7] = Cell::Text("provisional".into());
        Dataset::new(vec![ReportRecord::from_block_row(date, row)])
    }

    #[test]
    fn test_output_format_parse() {
        assert_eq!(OutputFormat::parse("XLSX"), Some(OutputFormat::Xlsx));
        assert_eq!(OutputFormat::parse("csv"), Some(OutputFormat::Csv));
        assert_eq!(OutputFormat::parse("parquet"), None);
    }

    #[test]
    fn test_xlsx_has_header_and_typed_cells() {
        let bytes = dataset_to_xlsx_bytes(&dataset()).unwrap();
        let mut workbook: Xlsx<_> = Xlsx::new(Cursor::new(bytes)).unwrap();
        let range = workbook.worksheet_range(EXPORT_SHEET_NAME).unwrap();

        let header: Vec<String> = (0..9)
            .map(|c| range.get_value((0, c)).map(|d| d.to_string()).unwrap_or_default())
            .collect();
        assert_eq!(header, DATASET_COLUMNS);
        assert_eq!(range.get_value((1, 0)), Some(&Data::String("05-04-2024".into())));
        assert_eq!(range.get_value((1, 2)), Some(&Data::Float(61234.5)));
        assert_eq!(range.get_value((1, 8)), Some(&Data::String("provisional".into())));
    }

    #[test]
    fn test_csv_export() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("psp.csv");
        export_csv(&dataset(), &path.to_string_lossy()).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let mut lines = content.lines();
        assert_eq!(lines.next(), Some("Date,Region,NR,WR,SR,ER,NER,Total,Remarks"));
        assert_eq!(
            lines.next(),
            Some("05-04-2024,Demand Met during Evening Peak,61234.5,,,,,,provisional")
        );
    }

    #[test]
    fn test_json_export_uses_date_label() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("psp.json");
        export_json(&dataset(), &path.to_string_lossy()).unwrap();

        let value: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value[0]["report_date"], "05-04-2024");
        assert_eq!(value[0]["nr"], 61234.5);
    }

    #[test]
    fn test_failed_save_dumps_browser_log() {
        let dir = tempfile::tempdir().unwrap();
        let log = DiagnosticsLog::quiet();
        log.info("Filters applied for 2024-25 / April");
        let mut out = Vec::new();

        // a directory cannot be opened as the output file
        let saved = save_dataset(&dataset(), OutputFormat::Csv, dir.path(), &log, false, &mut out);

        assert!(!saved);
        let printed = String::from_utf8(out).unwrap();
        assert!(printed.contains("=== Browser Log ==="));
        assert!(printed.contains("Filters applied for 2024-25 / April"));
        assert!(printed.contains("Failed to write"));
    }

    #[test]
    fn test_successful_save_keeps_log_quiet_unless_asked() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("psp.csv");
        let log = DiagnosticsLog::quiet();
        let mut out = Vec::new();

        assert!(save_dataset(&dataset(), OutputFormat::Csv, &path, &log, false, &mut out));
        assert!(out.is_empty());

        assert!(save_dataset(&dataset(), OutputFormat::Csv, &path, &log, true, &mut out));
        assert!(String::from_utf8(out).unwrap().contains("=== Browser Log ==="));
    }
}
