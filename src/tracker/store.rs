//! JSON file persistence for the active entry and the history log
//!
//! Both files are rewritten through a temp file + rename so readers never see
//! a half-written document. Older file layouts are migrated on load.

use super::entry::{format_percent, TokenEntry};
use crate::config::StorageConfig;
use crate::error::{BotError, Result};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, error, warn};

/// Storage for `token_results.json` and `token_history.json`
#[derive(Debug)]
pub struct EntryStore {
    current_path: PathBuf,
    history_path: PathBuf,
    /// Archived entries whose append has not reached disk yet
    pending_history: Vec<Value>,
}

impl EntryStore {
    pub fn new(current_path: impl Into<PathBuf>, history_path: impl Into<PathBuf>) -> Self {
        Self {
            current_path: current_path.into(),
            history_path: history_path.into(),
            pending_history: Vec::new(),
        }
    }

    pub fn from_config(config: &StorageConfig) -> Self {
        Self::new(config.current_path(), config.history_path())
    }

    pub fn current_path(&self) -> &Path {
        &self.current_path
    }

    pub fn history_path(&self) -> &Path {
        &self.history_path
    }

    /// Load and migrate the active entry. Unreadable files count as empty.
    pub fn load_current(&self) -> Option<TokenEntry> {
        let value = match read_json(&self.current_path) {
            Ok(Some(value)) => value,
            Ok(None) => return None,
            Err(e) => {
                warn!(path = %self.current_path.display(), "Ignoring unreadable current file: {}", e);
                return None;
            }
        };

        let entry = migrate_current(value);
        if entry.is_none() {
            warn!(path = %self.current_path.display(), "Current file has no recognizable entry");
        }
        entry
    }

    /// Replace the current file with `entry`
    pub fn save_current(&self, entry: &TokenEntry) -> Result<()> {
        let value = serde_json::to_value(entry)?;
        write_json_atomic(&self.current_path, &value)
    }

    /// History records as typed entries, oldest first
    pub fn load_history(&self) -> Result<Vec<TokenEntry>> {
        Ok(self
            .read_history_raw()?
            .into_iter()
            .filter_map(migrate_entry)
            .collect())
    }

    /// Append `entry` to the history log.
    ///
    /// Existing records are carried over untouched. On failure the record
    /// stays queued and is written ahead of the next append. A history file
    /// that no longer parses is moved aside and a fresh log is started.
    pub fn append_history(&mut self, entry: &TokenEntry) -> Result<()> {
        self.pending_history.push(serde_json::to_value(entry)?);

        let mut history = match self.read_history_raw() {
            Ok(history) => history,
            Err(BotError::Json(e)) => {
                let aside = self.quarantine_history()?;
                error!(
                    path = %self.history_path.display(),
                    moved_to = %aside.display(),
                    "History file is corrupt, starting a new one: {}",
                    e
                );
                Vec::new()
            }
            Err(e) => return Err(e),
        };
        history.extend(self.pending_history.iter().cloned());
        write_json_atomic(&self.history_path, &Value::Array(history))?;

        debug!(
            path = %self.history_path.display(),
            flushed = self.pending_history.len(),
            "History appended"
        );
        self.pending_history.clear();
        Ok(())
    }

    /// Archived entries not yet on disk
    pub fn pending_history(&self) -> usize {
        self.pending_history.len()
    }

    /// Rename the history file to `<name>.corrupt-<unix_ts>`
    fn quarantine_history(&self) -> Result<PathBuf> {
        let mut name = self.history_path.as_os_str().to_owned();
        name.push(format!(".corrupt-{}", Utc::now().timestamp()));
        let aside = PathBuf::from(name);
        std::fs::rename(&self.history_path, &aside)?;
        Ok(aside)
    }

    fn read_history_raw(&self) -> Result<Vec<Value>> {
        Ok(read_json(&self.history_path)?
            .map(flatten_history)
            .unwrap_or_default())
    }
}

/// `None` when the file does not exist
fn read_json(path: &Path) -> Result<Option<Value>> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    if raw.trim().is_empty() {
        return Ok(None);
    }
    Ok(Some(serde_json::from_str(&raw)?))
}

/// Pretty JSON (keys sorted) via temp file + rename in the same directory
fn write_json_atomic(path: &Path, value: &Value) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut tmp = NamedTempFile::new_in(dir)?;
    serde_json::to_writer_pretty(&mut tmp, value)?;
    tmp.write_all(b"\n")?;
    tmp.as_file().sync_all()?;
    tmp.persist(path)?;
    Ok(())
}

/// Any entry shape ever written to disk
#[derive(Debug, Deserialize)]
struct StoredEntry {
    token: String,
    time_posted: Option<DateTime<Utc>>,
    initial_market_cap: Option<f64>,
    highest_market_cap: Option<f64>,
    current_market_cap: Option<f64>,
    current_percentage: Option<String>,
    /// Pre-`current_percentage` name; number or preformatted string
    percent_increase: Option<Value>,
    highest_percent_increase: Option<f64>,
    reached_50: Option<bool>,
    last_checked: Option<DateTime<Utc>>,
    pair_url: Option<String>,
}

impl From<StoredEntry> for TokenEntry {
    fn from(stored: StoredEntry) -> Self {
        let legacy_percentage = match stored.percent_increase {
            Some(Value::Number(n)) => n.as_f64().map(format_percent),
            Some(Value::String(s)) => Some(s),
            _ => None,
        };

        TokenEntry {
            token: stored.token,
            time_posted: stored.time_posted.unwrap_or_else(Utc::now),
            initial_market_cap: stored.initial_market_cap,
            highest_market_cap: stored.highest_market_cap,
            current_market_cap: stored.current_market_cap,
            current_percentage: legacy_percentage
                .or(stored.current_percentage)
                .unwrap_or_else(|| format_percent(0.0)),
            highest_percent_increase: stored.highest_percent_increase.unwrap_or(0.0),
            reached_50: stored.reached_50.unwrap_or(false),
            last_checked: stored.last_checked,
            pair_url: stored.pair_url,
        }
    }
}

/// One stored record → typed entry. Price-based legacy fields are dropped.
pub fn migrate_entry(value: Value) -> Option<TokenEntry> {
    match serde_json::from_value::<StoredEntry>(value) {
        Ok(stored) => Some(stored.into()),
        Err(e) => {
            debug!("Skipping unrecognized entry record: {}", e);
            None
        }
    }
}

/// Current-file document → active entry.
///
/// Accepts the token-keyed layout (`{"items": {..}, "tokens": [..]}`, the
/// last listed token wins) and the single-entry layout.
pub fn migrate_current(value: Value) -> Option<TokenEntry> {
    let Value::Object(mut map) = value else {
        return None;
    };

    if matches!(map.get("items"), Some(Value::Object(_))) {
        let last_token = map_last_token(&map);
        let Some(Value::Object(mut items)) = map.remove("items") else {
            return None;
        };
        let raw = match last_token {
            Some(token) => items.remove(&token)?,
            None => items.into_iter().next().map(|(_, v)| v)?,
        };
        return migrate_entry(raw);
    }

    if map.contains_key("token") {
        return migrate_entry(Value::Object(map));
    }
    None
}

fn map_last_token(map: &Map<String, Value>) -> Option<String> {
    map.get("tokens")
        .and_then(Value::as_array)
        .and_then(|tokens| tokens.last())
        .and_then(Value::as_str)
        .map(str::to_string)
}

/// History document → flat list of records
fn flatten_history(value: Value) -> Vec<Value> {
    match value {
        Value::Array(records) => records,
        Value::Object(mut map) => {
            if matches!(map.get("items"), Some(Value::Object(_))) {
                if let Some(Value::Object(items)) = map.remove("items") {
                    return items.into_iter().map(|(_, v)| v).collect();
                }
            }
            if map.contains_key("token") {
                return vec![Value::Object(map)];
            }
            Vec::new()
        }
        _ => Vec::new(),
    }
}
