//! Settings and the config panel.
//!
//! [`SpyglassConfig`] is the plain runtime view read by every component.
//! [`ConfigStore`] holds the same settings as named elements so the config
//! panel can edit them through ordinary cache entries, and persists them as
//! JSON.

use std::fs;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::cache::{CacheCell, CacheEntry, EntryAction, EntryBinder, EntryKind, EntryOwner};
use crate::context::InspectContext;
use crate::errors::InspectError;
use crate::host::{HostError, Number, NumberKind, TypeRef, Value};
use crate::ivalue::EditorPool;
use crate::pool::{CellPool, RefreshMode};

/// Runtime configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpyglassConfig {
    /// Milliseconds between automatic re-evaluations of open inspectors
    pub auto_update_interval_ms: u64,
    /// Strings at least this long are offered for saving to a file
    pub string_overflow_threshold: usize,
    /// Directory suggested when saving values to disk
    pub default_output_path: String,
    /// `Type.member` names never enumerated
    pub member_blacklist: Vec<String>,
    /// Type names never treated as collections
    pub collection_exclusions: Vec<String>,
    /// Cells kept alive per list view
    pub viewport_rows: usize,
    /// Time budget of one autocomplete slice
    pub autocomplete_slice_ms: u64,
}

impl Default for SpyglassConfig {
    fn default() -> Self {
        Self {
            auto_update_interval_ms: 1000,
            string_overflow_threshold: 16000,
            default_output_path: "./spyglass-output".to_string(),
            member_blacklist: Vec::new(),
            collection_exclusions: vec!["Transform".to_string()],
            viewport_rows: 20,
            autocomplete_slice_ms: 10,
        }
    }
}

impl SpyglassConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(serde_json::from_str(&text)?)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let io = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io)?;
        }
        let text = serde_json::to_string_pretty(self)?;
        fs::write(path, text).map_err(io)?;
        info!("Saved settings to {}", path.display());
        Ok(())
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Could not access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid settings file: {0}")]
    Json(#[from] serde_json::Error),

    #[error("No setting named '{0}'")]
    UnknownKey(String),

    #[error("Setting '{key}' does not accept {value}")]
    InvalidValue { key: String, value: String },
}

/// One named setting
#[derive(Debug, Clone)]
pub struct ConfigElement {
    pub key: &'static str,
    pub description: &'static str,
    pub value_type: TypeRef,
    pub default: Value,
    pub value: Value,
    /// Bumped on every change
    pub revision: u64,
}

fn number(kind: NumberKind, value: u64) -> Value {
    let n = Number::U64(value);
    Value::Number(n.cast(kind).unwrap_or(n))
}

fn list_text(items: &[String]) -> Value {
    Value::Str(items.join(", "))
}

fn split_list(value: &Value) -> Vec<String> {
    value
        .as_str()
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn as_u64(value: &Value) -> Option<u64> {
    value.as_number()?.as_i128().and_then(|n| u64::try_from(n).ok())
}

/// Settings as editable elements, in display order
#[derive(Debug, Clone)]
pub struct ConfigStore {
    elements: IndexMap<&'static str, ConfigElement>,
    revision: u64,
}

impl Default for ConfigStore {
    fn default() -> Self {
        Self::from_config(&SpyglassConfig::default())
    }
}

impl ConfigStore {
    pub fn from_config(config: &SpyglassConfig) -> Self {
        let defaults = SpyglassConfig::default();
        let mut elements = IndexMap::new();
        let mut add = |key: &'static str, description: &'static str, value_type: TypeRef, default: Value, value: Value| {
            elements.insert(
                key,
                ConfigElement {
                    key,
                    description,
                    value_type,
                    default,
                    value,
                    revision: 0,
                },
            );
        };
        let u64_type = TypeRef::number(NumberKind::U64);
        add(
            "auto_update_interval_ms",
            "Milliseconds between automatic re-evaluations of open inspectors",
            u64_type.clone(),
            number(NumberKind::U64, defaults.auto_update_interval_ms),
            number(NumberKind::U64, config.auto_update_interval_ms),
        );
        add(
            "string_overflow_threshold",
            "Strings at least this long are offered for saving to a file",
            u64_type.clone(),
            number(NumberKind::U64, defaults.string_overflow_threshold as u64),
            number(NumberKind::U64, config.string_overflow_threshold as u64),
        );
        add(
            "default_output_path",
            "Directory suggested when saving values to disk",
            TypeRef::string(),
            Value::str(defaults.default_output_path.clone()),
            Value::str(config.default_output_path.clone()),
        );
        add(
            "member_blacklist",
            "Comma separated Type.member names that are never listed",
            TypeRef::string(),
            list_text(&defaults.member_blacklist),
            list_text(&config.member_blacklist),
        );
        add(
            "collection_exclusions",
            "Comma separated type names never treated as collections",
            TypeRef::string(),
            list_text(&defaults.collection_exclusions),
            list_text(&config.collection_exclusions),
        );
        add(
            "viewport_rows",
            "Cells kept alive per list view",
            u64_type.clone(),
            number(NumberKind::U64, defaults.viewport_rows as u64),
            number(NumberKind::U64, config.viewport_rows as u64),
        );
        add(
            "autocomplete_slice_ms",
            "Time budget of one autocomplete slice",
            u64_type,
            number(NumberKind::U64, defaults.autocomplete_slice_ms),
            number(NumberKind::U64, config.autocomplete_slice_ms),
        );
        Self { elements, revision: 0 }
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        Ok(Self::from_config(&SpyglassConfig::load(path)?))
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        self.to_config().save(path)
    }

    /// Sum of every change made so far
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn elements(&self) -> impl Iterator<Item = &ConfigElement> {
        self.elements.values()
    }

    pub fn element(&self, key: &str) -> Option<&ConfigElement> {
        self.elements.get(key)
    }

    pub fn get(&self, key: &str) -> Result<&Value, ConfigError> {
        self.element(key)
            .map(|e| &e.value)
            .ok_or_else(|| ConfigError::UnknownKey(key.to_string()))
    }

    /// Stores a new value. Setting the current value again is not a change.
    pub fn set(&mut self, key: &str, value: Value) -> Result<bool, ConfigError> {
        let element = self
            .elements
            .get_mut(key)
            .ok_or_else(|| ConfigError::UnknownKey(key.to_string()))?;
        let invalid = || ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        };
        let value = value.clone().coerce_to(&element.value_type).ok_or_else(invalid)?;
        if value.is_null() {
            return Err(invalid());
        }
        if element.value == value {
            return Ok(false);
        }
        debug!("Setting {key} = {value}");
        element.value = value;
        element.revision += 1;
        self.revision += 1;
        Ok(true)
    }

    pub fn reset(&mut self, key: &str) -> Result<bool, ConfigError> {
        let default = self
            .element(key)
            .map(|e| e.default.clone())
            .ok_or_else(|| ConfigError::UnknownKey(key.to_string()))?;
        self.set(key, default)
    }

    pub fn to_config(&self) -> SpyglassConfig {
        let defaults = SpyglassConfig::default();
        let u64_of = |key: &str, fallback: u64| {
            self.element(key)
                .and_then(|e| as_u64(&e.value))
                .unwrap_or(fallback)
        };
        let list_of = |key: &str| self.element(key).map(|e| split_list(&e.value)).unwrap_or_default();
        SpyglassConfig {
            auto_update_interval_ms: u64_of("auto_update_interval_ms", defaults.auto_update_interval_ms),
            string_overflow_threshold: u64_of(
                "string_overflow_threshold",
                defaults.string_overflow_threshold as u64,
            ) as usize,
            default_output_path: self
                .element("default_output_path")
                .and_then(|e| e.value.as_str().map(str::to_string))
                .unwrap_or(defaults.default_output_path),
            member_blacklist: list_of("member_blacklist"),
            collection_exclusions: list_of("collection_exclusions"),
            viewport_rows: (u64_of("viewport_rows", defaults.viewport_rows as u64) as usize).max(1),
            autocomplete_slice_ms: u64_of("autocomplete_slice_ms", defaults.autocomplete_slice_ms),
        }
    }
}

impl EntryOwner for ConfigStore {
    fn read(&mut self, _ctx: &InspectContext<'_>, kind: &EntryKind) -> Result<Value, InspectError> {
        match kind {
            EntryKind::Config { key } => self
                .get(key)
                .cloned()
                .map_err(|e| InspectError::evaluation(key, HostError::KeyNotFound(e.to_string()))),
            _ => Err(InspectError::unsupported("Only settings belong to the config panel")),
        }
    }

    fn write(&mut self, _ctx: &InspectContext<'_>, kind: &EntryKind, value: Value) -> Result<(), InspectError> {
        match kind {
            EntryKind::Config { key } => self
                .set(key, value)
                .map(|_| ())
                .map_err(|e| InspectError::write(key, HostError::custom(e.to_string()))),
            _ => Err(InspectError::unsupported("Only settings belong to the config panel")),
        }
    }
}

/// Config panel: one config-backed entry per setting
#[derive(Debug)]
pub struct ConfigInspector {
    entries: Vec<CacheEntry>,
    seen: Vec<u64>,
    pool: CellPool<CacheCell>,
}

impl ConfigInspector {
    pub fn new(store: &ConfigStore, rows: usize) -> Self {
        let entries: Vec<CacheEntry> = store
            .elements()
            .map(|e| {
                let mut entry = CacheEntry::config(e.key, e.value_type.clone());
                entry.filter_name = e.description.to_string();
                entry
            })
            .collect();
        let seen = vec![u64::MAX; entries.len()];
        Self {
            entries,
            seen,
            pool: CellPool::new(rows),
        }
    }

    pub fn entries(&self) -> &[CacheEntry] {
        &self.entries
    }

    pub fn pool(&self) -> &CellPool<CacheCell> {
        &self.pool
    }

    /// Re-reads every entry whose element changed since it was last shown
    pub fn refresh(&mut self, ctx: &mut InspectContext<'_>, store: &mut ConfigStore) {
        for (entry, seen) in self.entries.iter_mut().zip(self.seen.iter_mut()) {
            let EntryKind::Config { key } = &entry.kind else {
                continue;
            };
            let Some(revision) = store.element(key).map(|e| e.revision) else {
                continue;
            };
            if *seen != revision {
                *seen = revision;
                if let Err(e) = entry.evaluate(ctx, store) {
                    debug!("Could not read setting: {e}");
                }
            }
        }
        let mut binder = EntryBinder {
            ctx,
            entries: &mut self.entries,
            owner: store,
            order: None,
        };
        self.pool.refresh(&mut binder, RefreshMode::Hard { jump_to_top: false });
    }

    pub fn act(
        &mut self,
        ctx: &mut InspectContext<'_>,
        store: &mut ConfigStore,
        path: &[usize],
        action: EntryAction,
    ) -> Result<bool, InspectError> {
        let (&index, rest) = path
            .split_first()
            .ok_or_else(|| InspectError::NoSuchEntry(path.to_vec()))?;
        let entry = self
            .entries
            .get_mut(index)
            .ok_or_else(|| InspectError::NoSuchEntry(path.to_vec()))?;
        let wrote = entry.dispatch(ctx, store, rest, action)?;
        self.refresh(ctx, store);
        Ok(wrote)
    }

    pub fn close(&mut self, pool: &mut EditorPool) {
        for entry in &mut self.entries {
            entry.release(pool);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = SpyglassConfig::default();
        assert_eq!(config.auto_update_interval_ms, 1000);
        assert_eq!(config.string_overflow_threshold, 16000);
        assert_eq!(config.collection_exclusions, vec!["Transform".to_string()]);
    }

    #[test]
    fn test_partial_file_falls_back_to_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, r#"{ "viewport_rows": 5 }"#).unwrap();
        let config = SpyglassConfig::load(&path).unwrap();
        assert_eq!(config.viewport_rows, 5);
        assert_eq!(config.auto_update_interval_ms, 1000);
    }

    #[test]
    fn test_store_round_trips_lists_and_counts_revisions() {
        let mut store = ConfigStore::default();
        assert!(store
            .set("member_blacklist", Value::str("Hero.secret,  Hero.debug"))
            .unwrap());
        assert!(!store
            .set("member_blacklist", Value::str("Hero.secret,  Hero.debug"))
            .unwrap());
        assert_eq!(store.revision(), 1);
        assert_eq!(
            store.to_config().member_blacklist,
            vec!["Hero.secret".to_string(), "Hero.debug".to_string()]
        );

        assert!(matches!(
            store.set("viewport_rows", Value::str("many")),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(matches!(store.set("nope", Value::Bool(true)), Err(ConfigError::UnknownKey(_))));

        store.set("viewport_rows", Value::i32(8)).unwrap();
        assert_eq!(store.to_config().viewport_rows, 8);
        store.reset("viewport_rows").unwrap();
        assert_eq!(store.to_config().viewport_rows, 20);
    }
}
