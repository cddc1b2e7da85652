//! Queue configuration files
//!
//! A queue configuration declares the root queue type, process-wide keys and
//! one block per sub-queue:
//!
//! ```toml
//! [queue]
//! type = "configurable"
//!
//! [queue.configuration]
//! maxsize = 10000
//!
//! [[queue.queues]]
//! type = "memory"
//! commandfilter = "MachineMode|MachineModuleActivity"
//! readpriority = 0
//!
//! [[queue.queues]]
//! type = "memory"
//! ```
//!
//! The `type` of a block is stored under the [`QUEUE_TYPE_KEY`] key. Any other
//! key of a block, or of its optional `configuration` sub-table, is handed
//! over to the backend. A block may hold its own `queues` list, read by a
//! sub-queue that is itself a router:
//!
//! ```toml
//! [[queue.queues]]
//! type = "configurable"
//! commandfilter = "CncValue"
//!
//! [[queue.queues.queues]]
//! type = "memory"
//! regexfieldfilter = "^Feed"
//! ```

use crate::config::error::{ConfigError, ConfigResult};
use crate::config::reader::{ConfigReader, ListConfigReader, ListConfigurable, MemoryConfigReader};
use crate::queue::configurable::{ConfigurableRouter, CONFIGURABLE_QUEUE_TYPE};
use crate::queue::error::QueueResult;
use crate::queue::registry::BackendRegistry;
use crate::queue::traits::{MachineIdentity, SubQueue};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Key holding the type name of a queue
pub const QUEUE_TYPE_KEY: &str = "QueueType";
/// Name of the list holding the sub-queue blocks
pub const SUB_QUEUE_LIST_KEY: &str = "queue";
/// Default configuration file name
pub const CONF_FILENAME: &str = "CncQueues.toml";
/// File taking precedence over [`CONF_FILENAME`] when present and valid
pub const CONF_OVERWRITE_FILENAME: &str = "CncQueues.overwrite.toml";
/// Queue type used when a configuration does not name one
pub const DEFAULT_ROOT_QUEUE_TYPE: &str = CONFIGURABLE_QUEUE_TYPE;

/// Queue settings and sub-queue blocks
///
/// The file root and every sub-queue block share this shape, so a block may
/// describe a router with its own sub-queues.
#[derive(Debug, Clone, Default)]
pub struct QueueConfiguration {
    root_type: Option<String>,
    configuration: MemoryConfigReader,
    sub_queues: Vec<Arc<QueueConfiguration>>,
}

impl QueueConfiguration {
    /// Empty configuration, without any sub-queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a configuration from TOML text
    pub fn from_toml_str(text: &str) -> ConfigResult<Self> {
        Self::parse(text, "<string>")
    }

    /// Load a configuration file
    pub fn load_file(path: &Path) -> ConfigResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let configuration = Self::parse(&text, &path.display().to_string())?;
        log::info!(
            "Loaded queue configuration {} ({} sub-queues)",
            path.display(),
            configuration.sub_queues.len()
        );
        Ok(configuration)
    }

    /// Load the configuration from a directory, or from the default one
    ///
    /// [`CONF_OVERWRITE_FILENAME`] is tried first and skipped if it cannot be
    /// loaded. [`CONF_FILENAME`] comes next: a file that exists but cannot be
    /// loaded is an error, a missing one yields an empty configuration.
    pub fn load_default(directory: Option<&Path>) -> ConfigResult<Self> {
        let directory = match directory.map(Path::to_path_buf).or_else(default_config_dir) {
            Some(directory) => directory,
            None => {
                log::error!("No queue configuration directory available, using an empty configuration");
                return Ok(Self::new());
            }
        };

        let overwrite_path = directory.join(CONF_OVERWRITE_FILENAME);
        if overwrite_path.exists() {
            match Self::load_file(&overwrite_path) {
                Ok(configuration) => return Ok(configuration),
                Err(e) => log::info!(
                    "Queue configuration {} found but couldn't be loaded: {}",
                    overwrite_path.display(),
                    e
                ),
            }
        }

        let path = directory.join(CONF_FILENAME);
        if path.exists() {
            Self::load_file(&path).inspect_err(|e| {
                log::error!(
                    "Queue configuration {} found but couldn't be loaded: {}",
                    path.display(),
                    e
                )
            })
        } else {
            log::warn!("Queue configuration {} does not exist", path.display());
            Ok(Self::new())
        }
    }

    /// Type of the root queue, if declared
    pub fn root_type(&self) -> Option<&str> {
        self.root_type.as_deref()
    }

    /// Process-wide keys
    pub fn configuration(&self) -> &MemoryConfigReader {
        &self.configuration
    }

    /// Sub-queue blocks in declaration order
    pub fn sub_queues(&self) -> &[Arc<QueueConfiguration>] {
        &self.sub_queues
    }

    /// Append a sub-queue block
    pub fn add_sub_queue(&mut self, block: impl Into<QueueConfiguration>) {
        self.sub_queues.push(Arc::new(block.into()));
    }

    /// Builder variant of [`QueueConfiguration::add_sub_queue`]
    pub fn with_sub_queue(mut self, block: impl Into<QueueConfiguration>) -> Self {
        self.add_sub_queue(block);
        self
    }

    /// Type name of the described queue
    ///
    /// The declared `type` wins, then the [`QUEUE_TYPE_KEY`] key, then
    /// [`DEFAULT_ROOT_QUEUE_TYPE`].
    pub fn queue_type(&self) -> String {
        self.root_type
            .clone()
            .or_else(|| self.configuration.get_string(QUEUE_TYPE_KEY).ok())
            .unwrap_or_else(|| DEFAULT_ROOT_QUEUE_TYPE.to_string())
    }

    /// Instantiate the described queue through the registry
    ///
    /// The queue receives the owner, then this configuration if it is
    /// [`Configurable`](crate::config::Configurable), then the sub-queue
    /// blocks if it is [`ListConfigurable`].
    pub fn create_queue(
        &self,
        owner: MachineIdentity,
        registry: &BackendRegistry,
    ) -> QueueResult<Box<dyn SubQueue>> {
        let queue_type = self.queue_type();
        let mut queue = registry.create(&queue_type).inspect_err(|e| {
            log::error!("Couldn't create a root queue of type {}: {}", queue_type, e)
        })?;

        let shared = Arc::new(self.clone());
        queue.set_owner(owner);
        if let Some(configurable) = queue.as_configurable() {
            configurable.set_config_reader(shared.clone());
        }
        if let Some(list_configurable) = queue.as_list_configurable() {
            list_configurable.set_list_config_reader(shared);
        }

        log::info!("Created root queue {} of type {}", queue.name(), queue_type);
        Ok(queue)
    }

    /// Set a process-wide key
    pub fn set(&mut self, key: &str, value: impl Into<toml::Value>) {
        self.configuration.add(key, value);
    }

    /// Build a configuration-driven router reading its sub-queues from here
    ///
    /// The process-wide keys of this configuration become the lowest
    /// precedence layer of every sub-queue block.
    pub fn create_router(
        &self,
        owner: MachineIdentity,
        registry: Arc<BackendRegistry>,
    ) -> ConfigurableRouter {
        let shared = Arc::new(self.clone());
        let mut router = ConfigurableRouter::new(owner, registry);
        router.set_list_config_reader(shared.clone());
        router.set_process_config_reader(shared);
        router
    }

    fn parse(text: &str, origin: &str) -> ConfigResult<Self> {
        let document = toml::from_str::<toml::Table>(text).map_err(|source| ConfigError::Parse {
            origin: origin.to_string(),
            source,
        })?;

        let mut configuration = Self::new();
        let root = match document.get("queue") {
            Some(toml::Value::Table(root)) => root,
            Some(_) => {
                return Err(ConfigError::Invalid {
                    origin: origin.to_string(),
                    message: "'queue' must be a table".to_string(),
                })
            }
            None => return Ok(configuration),
        };

        if let Some(root_type) = root.get("type") {
            let root_type = scalar_to_string(root_type).ok_or_else(|| ConfigError::Invalid {
                origin: origin.to_string(),
                message: "queue 'type' must be a string".to_string(),
            })?;
            configuration.root_type = Some(root_type);
        }

        if let Some(shared) = root.get("configuration") {
            let shared = shared.as_table().ok_or_else(|| ConfigError::Invalid {
                origin: origin.to_string(),
                message: "queue 'configuration' must be a table".to_string(),
            })?;
            copy_scalars(shared, &mut configuration.configuration, origin)?;
        }

        if let Some(blocks) = root.get("queues") {
            parse_blocks(blocks, &mut configuration, origin)?;
        }

        Ok(configuration)
    }
}

impl ConfigReader for QueueConfiguration {
    fn get_value(&self, key: &str) -> Option<toml::Value> {
        self.configuration.get_value(key)
    }

    fn as_list_config_reader(self: Arc<Self>) -> Option<Arc<dyn ListConfigReader>> {
        Some(self)
    }
}

impl From<MemoryConfigReader> for QueueConfiguration {
    fn from(block: MemoryConfigReader) -> Self {
        Self {
            root_type: block.get_string(QUEUE_TYPE_KEY).ok(),
            configuration: block,
            sub_queues: Vec::new(),
        }
    }
}

impl ListConfigReader for QueueConfiguration {
    fn configs(&self, key: &str) -> ConfigResult<Vec<Arc<dyn ConfigReader>>> {
        if !key.eq_ignore_ascii_case(SUB_QUEUE_LIST_KEY) {
            return Err(ConfigError::UnknownList {
                key: key.to_string(),
            });
        }
        Ok(self
            .sub_queues
            .iter()
            .map(|block| block.clone() as Arc<dyn ConfigReader>)
            .collect())
    }
}

/// Platform configuration directory for queue configurations
pub fn default_config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("cncqueue"))
}

fn parse_blocks(
    blocks: &toml::Value,
    parent: &mut QueueConfiguration,
    origin: &str,
) -> ConfigResult<()> {
    let blocks = blocks.as_array().ok_or_else(|| ConfigError::Invalid {
        origin: origin.to_string(),
        message: "'queues' must be an array of tables".to_string(),
    })?;
    for (index, block) in blocks.iter().enumerate() {
        let block = block.as_table().ok_or_else(|| ConfigError::Invalid {
            origin: origin.to_string(),
            message: format!("sub-queue #{} is not a table", index),
        })?;
        parent.add_sub_queue(parse_block(block, origin)?);
    }
    Ok(())
}

fn parse_block(block: &toml::Table, origin: &str) -> ConfigResult<QueueConfiguration> {
    let mut configuration = QueueConfiguration::new();
    for (key, value) in block {
        match key.as_str() {
            "type" => {
                let queue_type = scalar_to_string(value).ok_or_else(|| ConfigError::Invalid {
                    origin: origin.to_string(),
                    message: "sub-queue 'type' must be a string".to_string(),
                })?;
                configuration.configuration.add(QUEUE_TYPE_KEY, queue_type.clone());
                configuration.root_type = Some(queue_type);
            }
            "configuration" => {
                let nested = value.as_table().ok_or_else(|| ConfigError::Invalid {
                    origin: origin.to_string(),
                    message: "sub-queue 'configuration' must be a table".to_string(),
                })?;
                copy_scalars(nested, &mut configuration.configuration, origin)?;
            }
            "queues" => parse_blocks(value, &mut configuration, origin)?,
            _ => copy_scalar(key, value, &mut configuration.configuration, origin)?,
        }
    }
    Ok(configuration)
}

fn copy_scalars(
    table: &toml::Table,
    reader: &mut MemoryConfigReader,
    origin: &str,
) -> ConfigResult<()> {
    for (key, value) in table {
        copy_scalar(key, value, reader, origin)?;
    }
    Ok(())
}

fn copy_scalar(
    key: &str,
    value: &toml::Value,
    reader: &mut MemoryConfigReader,
    origin: &str,
) -> ConfigResult<()> {
    match value {
        toml::Value::String(_)
        | toml::Value::Integer(_)
        | toml::Value::Float(_)
        | toml::Value::Boolean(_) => {
            reader.add(key, value.clone());
            Ok(())
        }
        _ => Err(ConfigError::Invalid {
            origin: origin.to_string(),
            message: format!("key '{}' must hold a string, number or boolean", key),
        }),
    }
}

fn scalar_to_string(value: &toml::Value) -> Option<String> {
    value.as_str().map(str::to_string)
}
