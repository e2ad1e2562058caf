//! On-disk cache of discovered GraphQL endpoints.
//!
//! Storage location: `<user cache dir>/nqcli/appsync_cache.json`, or the
//! path named by `NQ_CACHE_FILE`. Entries never expire on their own; they
//! are replaced on the next cold discovery or removed explicitly.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Schema version written to and expected from the cache file.
pub const CACHE_VERSION: u32 = 1;

/// Environment variable overriding the cache file location.
pub const CACHE_FILE_ENV: &str = "NQ_CACHE_FILE";

const CACHE_DIR: &str = "nqcli";
const CACHE_FILE: &str = "appsync_cache.json";

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("could not persist cache file: {0}")]
    Persist(#[from] tempfile::PersistError),

    #[error("no user cache directory available; set NQ_CACHE_FILE")]
    NoCacheDir,
}

/// One remembered endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_id: Option<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub region: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub profile: String,
    pub fetched_at: DateTime<Utc>,
}

/// Cache file format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheFile {
    pub version: u32,
    #[serde(default, deserialize_with = "entries_skipping_invalid")]
    pub entries: BTreeMap<String, CacheEntry>,
}

/// A `null` or malformed entry is a miss for its own key only.
fn entries_skipping_invalid<'de, D>(deserializer: D) -> Result<BTreeMap<String, CacheEntry>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = BTreeMap::<String, serde_json::Value>::deserialize(deserializer)?;
    Ok(raw
        .into_iter()
        .filter_map(|(key, value)| match serde_json::from_value::<CacheEntry>(value) {
            Ok(entry) => Some((key, entry)),
            Err(e) => {
                log::debug!("dropping cache entry {}: {}", key, e);
                None
            }
        })
        .collect())
}

impl Default for CacheFile {
    fn default() -> Self {
        Self {
            version: CACHE_VERSION,
            entries: BTreeMap::new(),
        }
    }
}

/// Build the `profile|region` key. Blank parts become `default` and
/// `unknown`, so two unconfigured environments share one slot.
pub fn cache_key(profile: &str, region: &str) -> String {
    let profile = match profile.trim() {
        "" => "default",
        p => p,
    };
    let region = match region.trim() {
        "" => "unknown",
        r => r,
    };
    format!("{}|{}", profile, region)
}

/// Endpoint cache backed by a single JSON file.
#[derive(Debug, Clone)]
pub struct EndpointCache {
    file_path: PathBuf,
}

impl EndpointCache {
    /// Cache at the default location, honouring `NQ_CACHE_FILE`.
    pub fn from_environment() -> Result<Self, CacheError> {
        Ok(Self::with_path(default_cache_path()?))
    }

    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            file_path: path.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.file_path
    }

    /// Read the whole file. Missing, corrupt or foreign-version files read as empty.
    pub fn read(&self) -> CacheFile {
        let content = match fs::read_to_string(&self.file_path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return CacheFile::default(),
            Err(e) => {
                log::debug!("endpoint cache {} unreadable: {}", self.file_path.display(), e);
                return CacheFile::default();
            }
        };
        match serde_json::from_str::<CacheFile>(&content) {
            Ok(file) if file.version == CACHE_VERSION => file,
            Ok(file) => {
                log::debug!(
                    "endpoint cache {} has version {}, expected {}",
                    self.file_path.display(),
                    file.version,
                    CACHE_VERSION
                );
                CacheFile::default()
            }
            Err(e) => {
                log::debug!("endpoint cache {} is corrupt: {}", self.file_path.display(), e);
                CacheFile::default()
            }
        }
    }

    /// Cached URL for `key`; an entry with an empty URL is a miss.
    pub fn lookup(&self, key: &str) -> Option<String> {
        self.read()
            .entries
            .remove(key)
            .map(|entry| entry.url)
            .filter(|url| !url.trim().is_empty())
    }

    /// Insert or replace one entry, rewriting the file atomically.
    pub fn write(&self, key: &str, entry: CacheEntry) -> Result<(), CacheError> {
        let mut file = self.read();
        file.entries.insert(key.to_string(), entry);
        self.persist(&file)
    }

    /// Drop one entry. Returns whether it existed.
    pub fn invalidate(&self, key: &str) -> Result<bool, CacheError> {
        let mut file = self.read();
        if file.entries.remove(key).is_none() {
            return Ok(false);
        }
        self.persist(&file)?;
        Ok(true)
    }

    /// Delete the cache file.
    pub fn clear(&self) -> Result<(), CacheError> {
        match fs::remove_file(&self.file_path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn persist(&self, file: &CacheFile) -> Result<(), CacheError> {
        let dir = match self.file_path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        create_private_dir(&dir)?;

        let mut content = serde_json::to_string_pretty(file)?;
        content.push('\n');

        let mut tmp = tempfile::Builder::new()
            .prefix("appsync-cache-")
            .suffix(".json")
            .tempfile_in(&dir)?;
        tmp.write_all(content.as_bytes())?;
        tmp.flush()?;
        tmp.persist(&self.file_path)?;

        log::debug!("endpoint cache written to {}", self.file_path.display());
        Ok(())
    }
}

fn default_cache_path() -> Result<PathBuf, CacheError> {
    if let Some(path) = std::env::var_os(CACHE_FILE_ENV).filter(|p| !p.is_empty()) {
        return Ok(PathBuf::from(path));
    }
    dirs::cache_dir()
        .map(|dir| dir.join(CACHE_DIR).join(CACHE_FILE))
        .ok_or(CacheError::NoCacheDir)
}

fn create_private_dir(dir: &Path) -> io::Result<()> {
    if dir.is_dir() {
        return Ok(());
    }
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        fs::DirBuilder::new().recursive(true).mode(0o700).create(dir)
    }
    #[cfg(not(unix))]
    {
        fs::create_dir_all(dir)
    }
}
