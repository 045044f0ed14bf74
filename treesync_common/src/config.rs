use crate::{AppConfig, TreeSyncError};
use directories::ProjectDirs;
use std::fs;
use std::path::{Path, PathBuf};

const CONFIG_FILE_NAME: &str = "treesync.toml";

#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: AppConfig,
    pub path: PathBuf,
    pub exists: bool,
}

/// Loads the configuration from `explicit` when given, otherwise from the
/// platform config directory. A missing file yields the defaults.
pub fn load_config(explicit: Option<&Path>) -> Result<LoadedConfig, TreeSyncError> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => default_config_path()?,
    };
    let exists = path.exists();

    let config = if exists {
        let data = fs::read_to_string(&path).map_err(|e| TreeSyncError::io(&path, e))?;
        toml::from_str(&data).map_err(|e| TreeSyncError::Serialization(e.to_string()))?
    } else {
        AppConfig::default()
    };

    Ok(LoadedConfig {
        config,
        path,
        exists,
    })
}

pub fn save_config(path: &Path, config: &AppConfig) -> Result<(), TreeSyncError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| TreeSyncError::io(parent, e))?;
    }

    let data = toml::to_string_pretty(config)
        .map_err(|e| TreeSyncError::Serialization(e.to_string()))?;
    fs::write(path, data).map_err(|e| TreeSyncError::io(path, e))?;
    Ok(())
}

pub fn default_config_path() -> Result<PathBuf, TreeSyncError> {
    let dirs = ProjectDirs::from("", "treesync", "treesync")
        .ok_or_else(|| TreeSyncError::Config("Unable to determine config directory".to_string()))?;
    Ok(dirs.config_dir().join(CONFIG_FILE_NAME))
}
