//! Session persistence for resuming after restarts.
//!
//! The session file is a flat JSON snapshot:
//!
//! ```json
//! {"ticker": "BTC-USD", "records": [{"timestamp": "...", "price": 1.0, "sma": null}]}
//! ```
//!
//! Saves go to a sibling temp file which is then renamed over the target, so a
//! failed write never clobbers the last good session.

use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::domain::price::PriceSample;
use crate::shared::errors::PersistenceError;

/// Ticker plus its full sample history
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub ticker: String,
    pub samples: Vec<PriceSample>,
}

#[derive(Debug, Serialize, Deserialize)]
struct SessionFile {
    #[serde(default)]
    ticker: String,
    #[serde(default)]
    records: Vec<SessionRecord>,
}

#[derive(Debug, Serialize, Deserialize)]
struct SessionRecord {
    #[serde(deserialize_with = "deserialize_timestamp")]
    timestamp: DateTime<Utc>,
    price: f64,
    sma: Option<f64>,
}

impl From<&PriceSample> for SessionRecord {
    fn from(sample: &PriceSample) -> Self {
        Self {
            timestamp: sample.timestamp,
            price: sample.price,
            sma: sample.sma,
        }
    }
}

impl From<SessionRecord> for PriceSample {
    fn from(record: SessionRecord) -> Self {
        PriceSample::new(record.timestamp, record.price, record.sma)
    }
}

/// RFC 3339, or a naive ISO-8601 local time as older sessions were written
fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_timestamp(&raw).ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {}", raw)))
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    let naive = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f").ok()?;
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|ts| ts.with_timezone(&Utc))
}

/// Reads and writes the session file
#[derive(Debug, Clone)]
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// `Ok(None)` when no session has been saved yet
    pub fn load(&self) -> Result<Option<SessionSnapshot>, PersistenceError> {
        if !self.path.exists() {
            info!(path = %self.path.display(), "No previous session found");
            return Ok(None);
        }

        let reader = BufReader::new(File::open(&self.path)?);
        let file: SessionFile = serde_json::from_reader(reader)?;

        Ok(Some(SessionSnapshot {
            ticker: file.ticker,
            samples: file.records.into_iter().map(PriceSample::from).collect(),
        }))
    }

    /// Load a session and check it belongs to `ticker`
    pub fn load_for(&self, ticker: &str) -> Result<Option<SessionSnapshot>, PersistenceError> {
        match self.load()? {
            Some(snapshot) if !snapshot.ticker.is_empty() && snapshot.ticker != ticker => {
                Err(PersistenceError::TickerMismatch {
                    expected: ticker.to_string(),
                    found: snapshot.ticker,
                })
            }
            other => Ok(other),
        }
    }

    pub fn save(&self, ticker: &str, samples: &[PriceSample]) -> Result<(), PersistenceError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }

        let file = SessionFile {
            ticker: ticker.to_string(),
            records: samples.iter().map(SessionRecord::from).collect(),
        };

        let tmp_path = self.temp_path();
        let result = (|| -> Result<(), PersistenceError> {
            let mut writer = BufWriter::new(File::create(&tmp_path)?);
            serde_json::to_writer(&mut writer, &file)?;
            writer.flush()?;
            writer.get_ref().sync_all()?;
            fs::rename(&tmp_path, &self.path)?;
            Ok(())
        })();

        if result.is_err() {
            let _ = fs::remove_file(&tmp_path);
        }
        result?;

        debug!("Session saved with {} records", samples.len());
        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "session.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}
