use psp_extractor::config::AppConfig;
use rust_xlsxwriter::Workbook;
use std::path::PathBuf;

pub fn fixture_path(relative: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(relative)
}

pub fn load_fixture_bytes(relative: &str) -> Vec<u8> {
    std::fs::read(fixture_path(relative))
        .unwrap_or_else(|e| panic!("Failed to read fixture {}: {}", relative, e))
}

/// Legacy BIFF8 report for 05.04.24, same cells as `report_xlsx(1000.0)`.
pub const LEGACY_XLS_FIXTURE: &str = "05.04.24_NLDC_PSP.xls";

/// Row labels of the report block, top to bottom.
pub const REGION_ROWS: [&str; 8] = [
    "Demand Met during Evening Peak hrs(MW)",
    "Peak Shortage (MW)",
    "Energy Met (MU)",
    "Hydro Gen (MU)",
    "Wind Gen (MU)",
    "Solar Gen (MU)",
    "Energy Shortage (MU)",
    "Maximum Demand Met During the Day (MW)",
];

/// Bundled config with every wait and settle interval zeroed.
pub fn test_config() -> AppConfig {
    let mut config = AppConfig::bundled().expect("bundled config should load");
    config.browser.element_wait_secs = 0;
    config.browser.settle_after_load_ms = 0;
    config.browser.settle_after_filters_ms = 0;
    config.browser.settle_after_page_size_ms = 0;
    config.browser.settle_after_page_turn_ms = 0;
    config.http.request_timeout_secs = 5;
    config
}

/// A report workbook laid out like the published files: a title, a header
/// row at row 5 and eight data rows at rows 6-13 of sheet `MOP_E`.
///
/// `seed` offsets every number so files can be told apart.
pub fn report_xlsx(seed: f64) -> Vec<u8> {
    report_xlsx_with_sheet("MOP_E", seed)
}

pub fn report_xlsx_with_sheet(sheet_name: &str, seed: f64) -> Vec<u8> {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.set_name(sheet_name).unwrap();

    sheet.write_string(0, 0, "Power Supply Position in Indian Power System").unwrap();
    for (col, name) in ["", "NR", "WR", "SR", "ER", "NER", "Total", "Remarks"].iter().enumerate() {
        sheet.write_string(4, col as u16, *name).unwrap();
    }

    for (offset, region) in REGION_ROWS.iter().enumerate() {
        let row = 5 + offset as u32;
        sheet.write_string(row, 0, *region).unwrap();
        let mut total = 0.0;
        for col in 1..=5u16 {
            let value = seed + (offset as f64) * 10.0 + col as f64;
            total += value;
            sheet.write_number(row, col, value).unwrap();
        }
        sheet.write_number(row, 6, total).unwrap();
    }
    sheet.write_string(12, 7, "provisional").unwrap();
    // footnote below the block must not leak into the output
    sheet.write_string(14, 0, "* figures as reported by RLDCs").unwrap();

    workbook.save_to_buffer().unwrap()
}

/// Absolute link to a report file on `base`, named the way the listing names them.
pub fn report_href(base: &str, date_prefix: &str) -> String {
    report_href_with_extension(base, date_prefix, "xlsx")
}

pub fn report_href_with_extension(base: &str, date_prefix: &str, extension: &str) -> String {
    format!("{}/files/grdw/{}_NLDC_PSP.{}", base, date_prefix, extension)
}
