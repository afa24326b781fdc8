//! Persistence layer for derived entity state
//!
//! Every managed entity publishes its derived state as key-value pairs
//! once per cycle. Writes for one entity happen as a single atomic
//! multi-key update so readers never observe a half-written cycle, and
//! the whole store is flushed to a JSON file so scalars (dates, last
//! period, flags, delivered hours) and the serialized rate tables survive
//! restarts.

use crate::error::Result;
use crate::logging::get_logger;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::Path;

/// Key-value store per managed entity.
pub trait StateStore {
    /// Read one key for an entity.
    fn get(&self, entity_id: &str, key: &str) -> Option<Value>;

    /// Apply a multi-key update for one entity atomically.
    fn set_all(&mut self, entity_id: &str, updates: Map<String, Value>) -> Result<()>;

    /// All keys currently stored for an entity.
    fn entity_state(&self, entity_id: &str) -> Option<&Map<String, Value>>;
}

/// Decode a stored value into a typed scalar.
pub fn decode<T: DeserializeOwned>(value: Option<Value>) -> Option<T> {
    value.and_then(|v| serde_json::from_value(v).ok())
}

/// JSON-file-backed state store.
pub struct JsonStateStore {
    file_path: String,
    state: HashMap<String, Map<String, Value>>,
    logger: crate::logging::StructuredLogger,
}

impl JsonStateStore {
    /// Create a new store persisting to the given path.
    pub fn new(file_path: &str) -> Self {
        Self {
            file_path: file_path.to_string(),
            state: HashMap::new(),
            logger: get_logger("persistence"),
        }
    }

    /// Load state from disk, keeping defaults if no file exists yet.
    pub fn load(&mut self) -> Result<()> {
        let path = Path::new(&self.file_path);

        if !path.exists() {
            self.logger
                .info("No persistent state file found, starting empty");
            return Ok(());
        }

        let contents = std::fs::read_to_string(path)?;
        self.state = serde_json::from_str(&contents)?;
        self.logger.info("Loaded persistent state from disk");

        Ok(())
    }

    /// Save the full store to disk.
    pub fn save(&self) -> Result<()> {
        let contents = serde_json::to_string_pretty(&self.state)?;
        std::fs::write(&self.file_path, contents)?;
        self.logger.debug("Saved persistent state to disk");

        Ok(())
    }

    /// Drop all state for an entity (teardown of an unmanaged unit).
    pub fn remove_entity(&mut self, entity_id: &str) -> Result<()> {
        if self.state.remove(entity_id).is_some() {
            self.save()?;
        }
        Ok(())
    }
}

impl StateStore for JsonStateStore {
    fn get(&self, entity_id: &str, key: &str) -> Option<Value> {
        self.state.get(entity_id).and_then(|m| m.get(key)).cloned()
    }

    fn set_all(&mut self, entity_id: &str, updates: Map<String, Value>) -> Result<()> {
        let entity = self.state.entry(entity_id.to_string()).or_default();
        for (key, value) in updates {
            entity.insert(key, value);
        }
        self.save()
    }

    fn entity_state(&self, entity_id: &str) -> Option<&Map<String, Value>> {
        self.state.get(entity_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn temp_store() -> (tempfile::NamedTempFile, JsonStateStore) {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        let store = JsonStateStore::new(&tmp.path().to_string_lossy());
        (tmp, store)
    }

    #[test]
    fn set_all_and_get() {
        let (_tmp, mut store) = temp_store();
        let mut updates = Map::new();
        updates.insert("current_rate".to_string(), json!(12.5));
        updates.insert("api_today".to_string(), json!("2021-01-15"));
        store.set_all("tariff_home", updates).unwrap();

        assert_eq!(store.get("tariff_home", "current_rate"), Some(json!(12.5)));
        assert_eq!(
            decode::<String>(store.get("tariff_home", "api_today")),
            Some("2021-01-15".to_string())
        );
        assert_eq!(store.get("tariff_home", "missing"), None);
        assert_eq!(store.get("other", "current_rate"), None);
    }

    #[test]
    fn load_save_roundtrip() {
        let (tmp, mut store) = temp_store();
        let mut updates = Map::new();
        updates.insert("delivered_hours".to_string(), json!(1.5));
        store.set_all("charger", updates).unwrap();

        let mut reloaded = JsonStateStore::new(&tmp.path().to_string_lossy());
        reloaded.load().unwrap();
        assert_eq!(
            decode::<f64>(reloaded.get("charger", "delivered_hours")),
            Some(1.5)
        );
    }

    #[test]
    fn updates_merge_per_entity() {
        let (_tmp, mut store) = temp_store();
        let mut first = Map::new();
        first.insert("a".to_string(), json!(1));
        first.insert("b".to_string(), json!(2));
        store.set_all("e", first).unwrap();

        let mut second = Map::new();
        second.insert("b".to_string(), json!(3));
        store.set_all("e", second).unwrap();

        assert_eq!(store.get("e", "a"), Some(json!(1)));
        assert_eq!(store.get("e", "b"), Some(json!(3)));
    }

    #[test]
    fn remove_entity_clears_state() {
        let (_tmp, mut store) = temp_store();
        let mut updates = Map::new();
        updates.insert("a".to_string(), json!(1));
        store.set_all("gone", updates).unwrap();
        store.remove_entity("gone").unwrap();
        assert_eq!(store.get("gone", "a"), None);
    }
}
