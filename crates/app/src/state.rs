use std::{fs, path::PathBuf};

use serde::{Deserialize, Serialize};

use common::prelude::{EncryptionMode, StorageType};
use object_store::ObjectStoreConfig;

pub const APP_NAME: &str = "flatsync";
pub const CONFIG_FILE_NAME: &str = "config.toml";
pub const INDEX_FILE_NAME: &str = "index.sqlite";
pub const OBJECTS_DIR_NAME: &str = "objects";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    /// Default tracing level, overridden by RUST_LOG
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub datasources: Vec<DatasourceConfig>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            datasources: Vec::new(),
        }
    }
}

/// One datasource: the first segment of every path routed to it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DatasourceConfig {
    pub name: String,
    pub bucket: String,
    /// Key blobs by node uuid instead of by path
    #[serde(default = "default_flat")]
    pub flat: bool,
    #[serde(default)]
    pub encryption: EncryptionMode,
    #[serde(default)]
    pub storage_type: StorageType,
    /// Single-copy limit in bytes, 0 for none
    #[serde(default)]
    pub multipart_copy_threshold: i64,
    /// Where blobs go; defaults to a directory under the state directory
    #[serde(default)]
    pub storage: Option<ObjectStoreConfig>,
}

fn default_flat() -> bool {
    true
}

impl DatasourceConfig {
    pub fn new(name: impl Into<String>, bucket: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            bucket: bucket.into(),
            flat: default_flat(),
            encryption: EncryptionMode::default(),
            storage_type: StorageType::default(),
            multipart_copy_threshold: 0,
            storage: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppState {
    /// Path to the state directory (~/.flatsync)
    pub state_dir: PathBuf,
    /// Path to the SQLite node index
    pub index_path: PathBuf,
    /// Path to the object metadata and default blob storage
    pub objects_path: PathBuf,
    /// Path to the config file
    pub config_path: PathBuf,
    /// Loaded configuration
    pub config: AppConfig,
}

impl AppState {
    /// Get the state directory path (custom or default ~/.flatsync)
    pub fn state_dir(custom_path: Option<PathBuf>) -> Result<PathBuf, StateError> {
        if let Some(path) = custom_path {
            return Ok(path);
        }

        let home = dirs::home_dir().ok_or(StateError::NoHomeDirectory)?;
        Ok(home.join(format!(".{}", APP_NAME)))
    }

    /// Initialize a new state directory
    pub fn init(
        custom_path: Option<PathBuf>,
        config: Option<AppConfig>,
    ) -> Result<Self, StateError> {
        let state_dir = Self::state_dir(custom_path)?;

        if state_dir.join(CONFIG_FILE_NAME).exists() {
            return Err(StateError::AlreadyInitialized);
        }

        fs::create_dir_all(&state_dir)?;

        let objects_path = state_dir.join(OBJECTS_DIR_NAME);
        fs::create_dir_all(&objects_path)?;

        let config = config.unwrap_or_default();
        let config_path = state_dir.join(CONFIG_FILE_NAME);
        let config_toml = toml::to_string_pretty(&config)?;
        fs::write(&config_path, config_toml)?;

        // The index itself is created on first connection
        let index_path = state_dir.join(INDEX_FILE_NAME);

        Ok(Self {
            state_dir,
            index_path,
            objects_path,
            config_path,
            config,
        })
    }

    /// Load existing state from the state directory
    pub fn load(custom_path: Option<PathBuf>) -> Result<Self, StateError> {
        let state_dir = Self::state_dir(custom_path)?;

        if !state_dir.exists() {
            return Err(StateError::NotInitialized);
        }

        let index_path = state_dir.join(INDEX_FILE_NAME);
        let objects_path = state_dir.join(OBJECTS_DIR_NAME);
        let config_path = state_dir.join(CONFIG_FILE_NAME);

        if !objects_path.exists() {
            return Err(StateError::MissingFile(format!("{}/", OBJECTS_DIR_NAME)));
        }
        if !config_path.exists() {
            return Err(StateError::MissingFile(CONFIG_FILE_NAME.to_string()));
        }

        let config_toml = fs::read_to_string(&config_path)?;
        let config: AppConfig = toml::from_str(&config_toml)?;

        Ok(Self {
            state_dir,
            index_path,
            objects_path,
            config_path,
            config,
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("flatsync directory not initialized. Run 'flatsync init' first")]
    NotInitialized,

    #[error("flatsync directory already initialized")]
    AlreadyInitialized,

    #[error("no home directory found")]
    NoHomeDirectory,

    #[error("missing required file: {0}")]
    MissingFile(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML serialization error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("TOML deserialization error: {0}")]
    TomlDe(#[from] toml::de::Error),
}
