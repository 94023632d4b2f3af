//! Runs against the real listing. Needs Chrome and network access:
//! `cargo test --test live_site_tests -- --ignored`

use psp_extractor::config::AppConfig;
use psp_extractor::{ChromeLauncher, DiagnosticsLog, Extraction, Period, Pipeline};

#[tokio::test]
#[ignore = "requires Chrome and access to grid-india.in"]
async fn test_live_april_2024() {
    let config = AppConfig::bundled().unwrap();
    let launcher = ChromeLauncher::new(config.browser.clone());
    let log = DiagnosticsLog::quiet();
    let pipeline = Pipeline::new(config, launcher, log.clone());

    let report = pipeline
        .run(&Period::parse("2024-25", "April").unwrap())
        .await
        .expect("session should open");

    match &report.extraction {
        Extraction::Data(dataset) => {
            assert_eq!(dataset.len() % 8, 0, "every file contributes a full block");
            assert!(dataset.date_labels().iter().all(|d| d.ends_with("-2024")));
        }
        Extraction::NothingExtracted(reason) => {
            let mut out = Vec::new();
            log.print_to(&mut out).unwrap();
            panic!("{}\n{}", reason, String::from_utf8_lossy(&out));
        }
    }
}
