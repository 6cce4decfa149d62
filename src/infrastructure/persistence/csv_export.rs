//! Tabular export of the price history

use chrono::{DateTime, Local};
use csv::Writer;
use std::fs::{self, File};
use std::io::Write;
use std::path::PathBuf;
use tracing::{info, warn};

use crate::domain::price::PriceSample;
use crate::shared::errors::PersistenceError;
use crate::shared::utils::export_file_name;

const HEADER: [&str; 3] = ["timestamp", "price", "sma"];

/// Writes `<TICKER>_price_history_<stamp>.csv` files into a directory
#[derive(Debug, Clone)]
pub struct CsvExporter {
    dir: PathBuf,
}

impl CsvExporter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Export `samples` to a fresh file named after `at`.
    ///
    /// Returns `Ok(None)` without touching the filesystem when there is nothing to export.
    pub fn export(
        &self,
        ticker: &str,
        samples: &[PriceSample],
        at: DateTime<Local>,
    ) -> Result<Option<PathBuf>, PersistenceError> {
        if samples.is_empty() {
            warn!("No data to export");
            return Ok(None);
        }

        fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(export_file_name(ticker, at));
        let file = File::create(&path)?;
        write_csv(file, samples)?;

        info!("Data exported to {}", path.display());
        Ok(Some(path))
    }
}

/// One row per sample in history order; an absent SMA is an empty cell
pub fn write_csv<W: Write>(out: W, samples: &[PriceSample]) -> Result<(), PersistenceError> {
    let mut writer = Writer::from_writer(out);
    writer.write_record(HEADER)?;

    for sample in samples {
        writer.write_record(&[
            sample.timestamp.to_rfc3339(),
            sample.price.to_string(),
            sample.sma.map(|v| v.to_string()).unwrap_or_default(),
        ])?;
    }

    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use tempfile::TempDir;

    fn samples() -> Vec<PriceSample> {
        let t0 = Utc.with_ymd_and_hms(2024, 4, 2, 10, 0, 0).unwrap();
        vec![
            PriceSample::new(t0, 100.0, None),
            PriceSample::new(t0 + Duration::seconds(60), 102.5, Some(101.25)),
        ]
    }

    #[test]
    fn test_write_csv_layout() {
        let mut buf = Vec::new();
        write_csv(&mut buf, &samples()).unwrap();

        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "timestamp,price,sma");
        assert_eq!(lines[1], "2024-04-02T10:00:00+00:00,100,");
        assert_eq!(lines[2], "2024-04-02T10:01:00+00:00,102.5,101.25");
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn test_export_reads_back_every_row() {
        let dir = TempDir::new().unwrap();
        let exporter = CsvExporter::new(dir.path());
        let at = Local.with_ymd_and_hms(2024, 4, 2, 18, 5, 9).unwrap();

        let path = exporter.export("BTC-USD", &samples(), at).unwrap().unwrap();
        assert_eq!(
            path.file_name().unwrap().to_string_lossy(),
            "BTC-USD_price_history_20240402_180509.csv"
        );

        let mut reader = csv::Reader::from_path(&path).unwrap();
        let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 2);
        for (row, sample) in rows.iter().zip(samples()) {
            let ts = DateTime::parse_from_rfc3339(&row[0]).unwrap();
            assert_eq!(ts.with_timezone(&Utc), sample.timestamp);
            assert_eq!(row[1].parse::<f64>().unwrap(), sample.price);
            let sma = if row[2].is_empty() { None } else { Some(row[2].parse::<f64>().unwrap()) };
            assert_eq!(sma, sample.sma);
        }
    }

    #[test]
    fn test_empty_history_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let exporter = CsvExporter::new(dir.path().join("exports"));
        let at = Local.with_ymd_and_hms(2024, 4, 2, 18, 5, 9).unwrap();

        assert_eq!(exporter.export("BTC-USD", &[], at).unwrap(), None);
        assert!(!dir.path().join("exports").exists());
    }
}
