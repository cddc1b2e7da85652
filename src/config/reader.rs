//! Layered key/value configuration readers
//!
//! Keys are case-insensitive. Values are kept as [`toml::Value`] and converted
//! on access, so a block declaring `readpriority = "2"` and one declaring
//! `readpriority = 2` read the same.

use crate::config::error::{ConfigError, ConfigResult};
use std::sync::Arc;

/// Source of configuration values
pub trait ConfigReader: Send + Sync {
    /// Raw value of a key, `None` when this reader does not define it
    fn get_value(&self, key: &str) -> Option<toml::Value>;

    /// Get a string value; integers, floats and booleans are converted
    fn get_string(&self, key: &str) -> ConfigResult<String> {
        match self.get_value(key) {
            Some(toml::Value::String(value)) => Ok(value),
            Some(toml::Value::Integer(value)) => Ok(value.to_string()),
            Some(toml::Value::Float(value)) => Ok(value.to_string()),
            Some(toml::Value::Boolean(value)) => Ok(value.to_string()),
            Some(other) => Err(ConfigError::InvalidValue {
                key: key.to_string(),
                expected: "string",
                found: other.to_string(),
            }),
            None => Err(ConfigError::MissingKey {
                key: key.to_string(),
            }),
        }
    }

    /// Get an integer value; numeric strings are converted
    fn get_int(&self, key: &str) -> ConfigResult<i64> {
        match self.get_value(key) {
            Some(toml::Value::Integer(value)) => Ok(value),
            Some(toml::Value::String(value)) => {
                value
                    .trim()
                    .parse::<i64>()
                    .map_err(|_| ConfigError::InvalidValue {
                        key: key.to_string(),
                        expected: "integer",
                        found: value.clone(),
                    })
            }
            Some(other) => Err(ConfigError::InvalidValue {
                key: key.to_string(),
                expected: "integer",
                found: other.to_string(),
            }),
            None => Err(ConfigError::MissingKey {
                key: key.to_string(),
            }),
        }
    }

    /// Whether this reader defines the key
    fn contains(&self, key: &str) -> bool {
        self.get_value(key).is_some()
    }

    /// Nested blocks carried along with this reader, if any
    fn as_list_config_reader(self: Arc<Self>) -> Option<Arc<dyn ListConfigReader>> {
        None
    }
}

/// Source of lists of configuration blocks
pub trait ListConfigReader: Send + Sync {
    /// Configuration blocks registered under `key`
    fn configs(&self, key: &str) -> ConfigResult<Vec<Arc<dyn ConfigReader>>>;
}

/// Component accepting an external configuration layer
pub trait Configurable {
    fn set_config_reader(&mut self, reader: Arc<dyn ConfigReader>);
}

/// Component built from a list of configuration blocks
pub trait ListConfigurable {
    fn set_list_config_reader(&mut self, reader: Arc<dyn ListConfigReader>);
}

pub(crate) fn normalize_key(key: &str) -> String {
    key.trim().to_ascii_lowercase()
}

/// In-memory configuration layer
#[derive(Debug, Clone, Default)]
pub struct MemoryConfigReader {
    values: toml::Table,
}

impl MemoryConfigReader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a key, replacing any previous value
    pub fn add(&mut self, key: &str, value: impl Into<toml::Value>) {
        self.values.insert(normalize_key(key), value.into());
    }

    /// Builder variant of [`MemoryConfigReader::add`]
    pub fn with(mut self, key: &str, value: impl Into<toml::Value>) -> Self {
        self.add(key, value);
        self
    }

    pub fn remove(&mut self, key: &str) -> Option<toml::Value> {
        self.values.remove(&normalize_key(key))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.values.keys()
    }
}

impl ConfigReader for MemoryConfigReader {
    fn get_value(&self, key: &str) -> Option<toml::Value> {
        self.values.get(&normalize_key(key)).cloned()
    }
}

impl ConfigReader for toml::Table {
    fn get_value(&self, key: &str) -> Option<toml::Value> {
        let key = normalize_key(key);
        self.iter()
            .find(|(candidate, _)| normalize_key(candidate) == key)
            .map(|(_, value)| value.clone())
    }
}

/// Override chain of configuration layers: the first layer defining a key wins
#[derive(Clone, Default)]
pub struct MultiConfigReader {
    layers: Vec<Arc<dyn ConfigReader>>,
}

impl std::fmt::Debug for MultiConfigReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MultiConfigReader")
            .field("layers", &self.layers.len())
            .finish()
    }
}

impl MultiConfigReader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a layer with a lower precedence than the existing ones
    pub fn add(&mut self, layer: Arc<dyn ConfigReader>) {
        self.layers.push(layer);
    }

    pub fn with(mut self, layer: Arc<dyn ConfigReader>) -> Self {
        self.add(layer);
        self
    }

    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }
}

impl ConfigReader for MultiConfigReader {
    fn get_value(&self, key: &str) -> Option<toml::Value> {
        self.layers.iter().find_map(|layer| layer.get_value(key))
    }
}
