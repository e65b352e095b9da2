use anyhow::{Context, Result};
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::Path;
use tracing::info;

const FILENAME: &str = "planilla.toml";

/// Longer TTLs are clamped to a century.
const MAX_TTL_MINUTES: u64 = 100 * 365 * 24 * 60;

/// Deployment preferences stored in `<data dir>/planilla.toml`.
#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub struct Preferences {
    /// Minutes of inactivity after which an unfinished form is discarded.
    /// `0` keeps forms forever.
    #[serde(default = "default_session_ttl_minutes")]
    pub session_ttl_minutes: u64,

    /// Record log, relative to the data directory.
    #[serde(default = "default_data_file")]
    pub data_file: String,

    /// Mirror of the record log, rewritten after every save.
    #[serde(default = "default_backup_file")]
    pub backup_file: String,
}

fn default_session_ttl_minutes() -> u64 {
    24 * 60
}

fn default_data_file() -> String {
    "registros_planilla.json".into()
}

fn default_backup_file() -> String {
    "registros_backup.json".into()
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            session_ttl_minutes: default_session_ttl_minutes(),
            data_file: default_data_file(),
            backup_file: default_backup_file(),
        }
    }
}

impl Preferences {
    /// Read `planilla.toml` from `dir`, writing one with default values on
    /// first run. Keys absent from the file take their defaults.
    pub fn load(dir: &Path) -> Result<Self> {
        let path = dir.join(FILENAME);
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Self::write_defaults(&path),
            Err(e) => return Err(e).with_context(|| format!("reading {}", path.display())),
        };
        toml::from_str(&raw).with_context(|| format!("parsing {}", path.display()))
    }

    fn write_defaults(path: &Path) -> Result<Self> {
        let prefs = Self::default();
        let body = toml::to_string_pretty(&prefs).context("encoding preferences")?;
        fs::write(path, body).with_context(|| format!("creating {}", path.display()))?;
        info!(path = %path.display(), "wrote default preferences");
        Ok(prefs)
    }

    pub fn session_ttl(&self) -> Duration {
        Duration::minutes(self.session_ttl_minutes.min(MAX_TTL_MINUTES) as i64)
    }
}
