use gap_core::{ScanError, StockCandidate};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::{debug, info};

/// Parsed input plus the number of rows that could not be used
#[derive(Debug, Clone, Default)]
pub struct LoadReport {
    pub candidates: Vec<StockCandidate>,
    pub dropped_rows: usize,
}

/// Load gapping stocks from a CSV file with a header row and
/// `ticker,gap_percent,opening_price` columns.
pub fn load_candidates(path: &Path) -> Result<LoadReport, ScanError> {
    let file = File::open(path)
        .map_err(|e| ScanError::Load(format!("cannot open {}: {}", path.display(), e)))?;

    let report = parse_candidates(file)?;
    info!(
        "Loaded {} candidates from {} ({} rows dropped)",
        report.candidates.len(),
        path.display(),
        report.dropped_rows
    );
    Ok(report)
}

/// Malformed rows are dropped and counted; only I/O failures abort.
pub fn parse_candidates<R: Read>(reader: R) -> Result<LoadReport, ScanError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut report = LoadReport::default();
    for (index, result) in reader.records().enumerate() {
        let record = match result {
            Ok(record) => record,
            Err(e) if matches!(e.kind(), csv::ErrorKind::Io(_)) => {
                return Err(ScanError::Load(e.to_string()));
            }
            Err(e) => {
                debug!("Dropping row {}: {}", index + 1, e);
                report.dropped_rows += 1;
                continue;
            }
        };

        match parse_row(&record) {
            Ok(candidate) => report.candidates.push(candidate),
            Err(e) => {
                debug!("Dropping row {}: {}", index + 1, e);
                report.dropped_rows += 1;
            }
        }
    }

    Ok(report)
}

fn parse_row(record: &csv::StringRecord) -> Result<StockCandidate, ScanError> {
    let ticker = record.get(0).unwrap_or("");
    let gap: f64 = record
        .get(1)
        .ok_or_else(|| ScanError::InvalidData("missing gap column".to_string()))?
        .parse()
        .map_err(|e| ScanError::InvalidData(format!("gap: {}", e)))?;
    let opening_price: f64 = record
        .get(2)
        .ok_or_else(|| ScanError::InvalidData("missing opening price column".to_string()))?
        .parse()
        .map_err(|e| ScanError::InvalidData(format!("opening price: {}", e)))?;

    StockCandidate::new(ticker, gap, opening_price)
}
