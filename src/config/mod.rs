//! Configuration readers and queue configuration files
//!
//! Sub-queue settings are resolved through an override chain of
//! [`ConfigReader`] layers: the sub-queue block itself, built-in defaults,
//! then process-wide settings. [`QueueConfiguration`] loads the blocks from
//! a TOML file.

mod error;
mod file;
mod reader;

pub use error::{ConfigError, ConfigResult};
pub use file::{
    default_config_dir, QueueConfiguration, CONF_FILENAME, CONF_OVERWRITE_FILENAME,
    DEFAULT_ROOT_QUEUE_TYPE, QUEUE_TYPE_KEY, SUB_QUEUE_LIST_KEY,
};
pub use reader::{
    ConfigReader, Configurable, ListConfigReader, ListConfigurable, MemoryConfigReader,
    MultiConfigReader,
};
