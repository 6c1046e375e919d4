// ── Accessory cache ──
//
// JSON persistence for accessory records across restarts. Entries are
// validated one by one; a bad entry never poisons the rest of the file.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::error::CoreError;
use crate::model::{AccessoryRecord, RecordId};

pub const CACHE_VERSION: u32 = 1;

#[derive(Debug, Serialize)]
struct CacheDocument<'a> {
    version: u32,
    accessories: &'a [AccessoryRecord],
}

#[derive(Debug, Deserialize)]
struct RawDocument {
    #[serde(default)]
    version: Option<u32>,
    accessories: Vec<Value>,
}

/// A persisted entry that failed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MalformedEntry {
    pub index: usize,
    pub reason: String,
    /// Present when the entry still names a usable record id, so the
    /// bridge can be told to forget it.
    pub recoverable: Option<AccessoryRecord>,
}

#[derive(Debug, Clone, Default)]
pub struct LoadedCache {
    pub records: Vec<AccessoryRecord>,
    pub malformed: Vec<MalformedEntry>,
}

#[derive(Debug, Clone)]
pub struct AccessoryCache {
    path: PathBuf,
}

impl AccessoryCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load and validate. A missing file is an empty cache.
    pub fn load(&self) -> Result<LoadedCache, CoreError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no accessory cache yet");
                return Ok(LoadedCache::default());
            }
            Err(e) => return Err(CoreError::persistence(&self.path, e)),
        };

        let document: RawDocument =
            serde_json::from_str(&raw).map_err(|e| CoreError::persistence(&self.path, e))?;
        match document.version {
            Some(CACHE_VERSION) => {}
            Some(other) => warn!(
                path = %self.path.display(),
                version = other,
                expected = CACHE_VERSION,
                "unexpected accessory cache version; loading anyway"
            ),
            None => debug!(path = %self.path.display(), "accessory cache has no version"),
        }

        let mut loaded = LoadedCache::default();
        for (index, entry) in document.accessories.into_iter().enumerate() {
            match validate(index, &entry) {
                Ok(record) => loaded.records.push(record),
                Err(err) => {
                    let reason = match &err {
                        CoreError::MalformedRecord { reason, .. } => reason.clone(),
                        other => other.to_string(),
                    };
                    loaded.malformed.push(MalformedEntry {
                        index,
                        reason,
                        recoverable: recover(&entry),
                    });
                }
            }
        }
        Ok(loaded)
    }

    /// Write all records atomically: temp file in the same directory,
    /// then rename over the old cache.
    pub fn save(&self, records: &[AccessoryRecord]) -> Result<(), CoreError> {
        let dir = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir).map_err(|e| CoreError::persistence(&dir, e))?;

        let document = CacheDocument {
            version: CACHE_VERSION,
            accessories: records,
        };
        let json = serde_json::to_vec_pretty(&document)
            .map_err(|e| CoreError::persistence(&self.path, e))?;

        let mut tmp =
            NamedTempFile::new_in(&dir).map_err(|e| CoreError::persistence(&self.path, e))?;
        tmp.write_all(&json)
            .and_then(|()| tmp.as_file().sync_all())
            .map_err(|e| CoreError::persistence(&self.path, e))?;
        tmp.persist(&self.path)
            .map_err(|e| CoreError::persistence(&self.path, e.error))?;

        debug!(path = %self.path.display(), records = records.len(), "accessory cache saved");
        Ok(())
    }
}

fn malformed(index: usize, reason: impl Into<String>) -> CoreError {
    CoreError::MalformedRecord {
        index,
        reason: reason.into(),
    }
}

fn validate(index: usize, entry: &Value) -> Result<AccessoryRecord, CoreError> {
    let record = AccessoryRecord::deserialize(entry).map_err(|e| malformed(index, e.to_string()))?;
    if record.unique_id().is_empty() {
        return Err(malformed(index, "empty unique id"));
    }
    let expected = RecordId::for_device(record.unique_id());
    if record.record_id != expected {
        return Err(malformed(
            index,
            format!(
                "record id {} does not match unique id {} (expected {expected})",
                record.record_id,
                record.unique_id()
            ),
        ));
    }
    Ok(record)
}

/// Salvage enough of a bad entry to unregister it.
fn recover(entry: &Value) -> Option<AccessoryRecord> {
    let record_id = entry
        .get("record_id")
        .and_then(Value::as_str)
        .and_then(|s| s.parse::<RecordId>().ok())?;
    let display_name = entry
        .get("display_name")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_owned();
    Some(AccessoryRecord::placeholder(record_id, display_name))
}
