//! Record log persisted as a pretty-printed JSON document, mirrored to a
//! backup file after every append.

use crate::metadata::FieldValues;
use chrono::NaiveDateTime;
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{error, info};

const FORMAT_VERSION: &str = "1.0";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("i/o error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid record log {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl StoreError {
    fn io(path: &Path, source: io::Error) -> Self {
        StoreError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

// ===================================================================
// Document model
// ===================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LogMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<NaiveDateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cleared: Option<NaiveDateTime>,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub total_records: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<NaiveDateTime>,
}

fn default_version() -> String {
    FORMAT_VERSION.to_string()
}

/// One completed form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: String,
    pub timestamp: NaiveDateTime,
    pub data: FieldValues,
}

impl Record {
    /// Build a record with a timestamp-derived id (`YYYYMMDD_HHMMSS_mmm`).
    pub fn new(data: FieldValues, now: NaiveDateTime) -> Self {
        Self {
            id: now.format("%Y%m%d_%H%M%S_%3f").to_string(),
            timestamp: now,
            data,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecordLog {
    pub metadata: LogMetadata,
    #[serde(default)]
    pub records: Vec<Record>,
}

impl RecordLog {
    fn created(now: NaiveDateTime) -> Self {
        Self {
            metadata: LogMetadata {
                created: Some(now),
                version: default_version(),
                ..Default::default()
            },
            records: Vec::new(),
        }
    }

    fn cleared(now: NaiveDateTime) -> Self {
        Self {
            metadata: LogMetadata {
                cleared: Some(now),
                version: default_version(),
                ..Default::default()
            },
            records: Vec::new(),
        }
    }
}

/// Aggregate counters shown to the operator.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoreStats {
    pub total_records: usize,
    pub last_updated: Option<NaiveDateTime>,
    /// Size of the main log in KB, rounded to two decimals.
    pub file_size_kb: f64,
}

// ===================================================================
// Persistence contract
// ===================================================================

/// Durable storage for completed records.
///
/// Implementations must serialize concurrent `save_record` calls so that no
/// append is lost.
pub trait RecordStore {
    /// Create an empty store if none exists. Idempotent.
    fn initialize(&self, now: NaiveDateTime) -> Result<(), StoreError>;
    fn save_record(&self, data: &FieldValues, now: NaiveDateTime) -> Result<Record, StoreError>;
    fn stats(&self) -> Result<StoreStats, StoreError>;
    fn clear(&self, now: NaiveDateTime) -> Result<(), StoreError>;
    /// File holding the log, for download.
    fn data_path(&self) -> &Path;
}

// ===================================================================
// JSON file implementation
// ===================================================================

pub struct JsonRecordStore {
    main: PathBuf,
    backup: PathBuf,
    lock: PathBuf,
}

impl JsonRecordStore {
    pub fn new(main: PathBuf, backup: PathBuf) -> Self {
        let mut lock = main.clone().into_os_string();
        lock.push(".lock");
        Self {
            main,
            backup,
            lock: PathBuf::from(lock),
        }
    }

    /// Run `f` while holding an exclusive lock on the store's lock file.
    fn locked<T>(&self, f: impl FnOnce() -> Result<T, StoreError>) -> Result<T, StoreError> {
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&self.lock)
            .map_err(|e| StoreError::io(&self.lock, e))?;
        file.lock_exclusive()
            .map_err(|e| StoreError::io(&self.lock, e))?;
        let result = f();
        let _ = FileExt::unlock(&file);
        result
    }

    fn load(path: &Path) -> Result<Option<RecordLog>, StoreError> {
        match fs::read_to_string(path) {
            Ok(s) => serde_json::from_str(&s)
                .map(Some)
                .map_err(|source| StoreError::Json {
                    path: path.to_path_buf(),
                    source,
                }),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::io(path, e)),
        }
    }

    /// Write the document to a sibling temp file, then rename it over `path`.
    fn write_atomic(path: &Path, log: &RecordLog) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(log).map_err(|source| StoreError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| StoreError::io(path, e))?;
        tmp.write_all(json.as_bytes())
            .map_err(|e| StoreError::io(path, e))?;
        tmp.persist(path)
            .map_err(|e| StoreError::io(path, e.error))?;
        Ok(())
    }
}

impl RecordStore for JsonRecordStore {
    fn initialize(&self, now: NaiveDateTime) -> Result<(), StoreError> {
        self.locked(|| {
            for path in [&self.main, &self.backup] {
                if !path.exists() {
                    Self::write_atomic(path, &RecordLog::created(now))?;
                    info!(path = %path.display(), "created record log");
                }
            }
            Ok(())
        })
    }

    fn save_record(&self, data: &FieldValues, now: NaiveDateTime) -> Result<Record, StoreError> {
        self.locked(|| {
            let mut log = Self::load(&self.main)?.unwrap_or_else(|| RecordLog::created(now));
            let record = Record::new(data.clone(), now);
            log.records.push(record.clone());
            log.metadata.total_records = log.records.len();
            log.metadata.last_updated = Some(now);

            Self::write_atomic(&self.main, &log)?;
            if let Err(err) = Self::write_atomic(&self.backup, &log) {
                error!("backup write failed: {err}");
            }
            info!(
                id = %record.id,
                total = log.metadata.total_records,
                "record saved"
            );
            Ok(record)
        })
    }

    fn stats(&self) -> Result<StoreStats, StoreError> {
        let log = Self::load(&self.main)?.unwrap_or_default();
        let file_size_kb = match fs::metadata(&self.main) {
            Ok(m) => (m.len() as f64 / 1024.0 * 100.0).round() / 100.0,
            Err(e) if e.kind() == io::ErrorKind::NotFound => 0.0,
            Err(e) => return Err(StoreError::io(&self.main, e)),
        };
        Ok(StoreStats {
            total_records: log.metadata.total_records,
            last_updated: log.metadata.last_updated,
            file_size_kb,
        })
    }

    fn clear(&self, now: NaiveDateTime) -> Result<(), StoreError> {
        self.locked(|| {
            Self::write_atomic(&self.main, &RecordLog::cleared(now))?;
            info!("record log cleared");
            Ok(())
        })
    }

    fn data_path(&self) -> &Path {
        &self.main
    }
}
