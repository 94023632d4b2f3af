use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Output column headers, in order.
pub const DATASET_COLUMNS: [&str; 9] = [
    "Date", "Region", "NR", "WR", "SR", "ER", "NER", "Total", "Remarks",
];

/// Labels applied to the eight columns of the fixed sheet block.
pub const BLOCK_COLUMNS: [&str; 8] = ["Region", "NR", "WR", "SR", "ER", "NER", "Total", "Remarks"];

/// Date format used for the Date column of the dataset.
pub const DATE_COLUMN_FORMAT: &str = "%d-%m-%Y";

/// A discovered report file paired with the publication date taken from its filename.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportLink {
    pub publication_date: NaiveDate,
    pub url: String,
}

impl ReportLink {
    pub fn new(publication_date: NaiveDate, url: impl Into<String>) -> Self {
        Self {
            publication_date,
            url: url.into(),
        }
    }

    /// Last path segment of the url, used in log lines.
    pub fn file_name(&self) -> &str {
        self.url.rsplit('/').next().unwrap_or(&self.url)
    }
}

/// A single spreadsheet cell value after normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(untagged)]
pub enum Cell {
    #[default]
    Empty,
    Number(f64),
    Text(String),
}

impl Cell {
    pub fn is_empty(&self) -> bool {
        matches!(self, Cell::Empty)
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Cell::Number(n) => Some(*n),
            _ => None,
        }
    }
}

impl std::fmt::Display for Cell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Cell::Empty => Ok(()),
            Cell::Number(n) => write!(f, "{}", n),
            Cell::Text(s) => write!(f, "{}", s),
        }
    }
}

/// One normalized row: Date, Region, six metric columns and Remarks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportRecord {
    #[serde(with = "date_column")]
    pub report_date: NaiveDate,
    pub region: Cell,
    pub nr: Cell,
    pub wr: Cell,
    pub sr: Cell,
    pub er: Cell,
    pub ner: Cell,
    pub total: Cell,
    pub remarks: Cell,
}

impl ReportRecord {
    /// Build a record from the eight block cells, in `BLOCK_COLUMNS` order.
    pub fn from_block_row(report_date: NaiveDate, row: [Cell; 8]) -> Self {
        let [region, nr, wr, sr, er, ner, total, remarks] = row;
        Self {
            report_date,
            region,
            nr,
            wr,
            sr,
            er,
            ner,
            total,
            remarks,
        }
    }

    pub fn date_label(&self) -> String {
        self.report_date.format(DATE_COLUMN_FORMAT).to_string()
    }

    /// The eight block cells, in `BLOCK_COLUMNS` order.
    pub fn cells(&self) -> [&Cell; 8] {
        [
            &self.region,
            &self.nr,
            &self.wr,
            &self.sr,
            &self.er,
            &self.ner,
            &self.total,
            &self.remarks,
        ]
    }
}

mod date_column {
    use super::DATE_COLUMN_FORMAT;
    use chrono::NaiveDate;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(date: &NaiveDate, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&date.format(DATE_COLUMN_FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDate, D::Error> {
        let raw = String::deserialize(deserializer)?;
        NaiveDate::parse_from_str(&raw, DATE_COLUMN_FORMAT).map_err(serde::de::Error::custom)
    }
}

/// The extracted rows of one run, in link order then sheet order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Dataset {
    pub records: Vec<ReportRecord>,
}

impl Dataset {
    pub fn new(records: Vec<ReportRecord>) -> Self {
        Self { records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn date_labels(&self) -> Vec<String> {
        self.records.iter().map(ReportRecord::date_label).collect()
    }
}

/// Why a run produced nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EmptyReason {
    /// Harvesting finished without a single valid report link.
    NoLinksFound,
    /// Links were found but none of the files yielded records.
    NoFileParsed,
}

impl std::fmt::Display for EmptyReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EmptyReason::NoLinksFound => write!(f, "No report links found"),
            EmptyReason::NoFileParsed => write!(f, "No valid Excel content"),
        }
    }
}

/// Outcome of a run: either rows, or the distinct "nothing extracted" signal.
#[derive(Debug, Clone, PartialEq)]
pub enum Extraction {
    Data(Dataset),
    NothingExtracted(EmptyReason),
}

impl Extraction {
    pub fn from_records(records: Vec<ReportRecord>) -> Self {
        if records.is_empty() {
            Extraction::NothingExtracted(EmptyReason::NoFileParsed)
        } else {
            Extraction::Data(Dataset::new(records))
        }
    }

    pub fn dataset(&self) -> Option<&Dataset> {
        match self {
            Extraction::Data(d) => Some(d),
            Extraction::NothingExtracted(_) => None,
        }
    }

    pub fn row_count(&self) -> usize {
        self.dataset().map(Dataset::len).unwrap_or(0)
    }
}
