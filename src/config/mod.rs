pub mod path;


use std::{io, path::Path, time::Duration};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{constants::GAMEPAD_NAME, udev::device::USB_DEVNODE_ROOT};

/// Represents all possible errors loading a [Config]
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Could not read: {0}")]
    IoError(#[from] io::Error),
    #[error("Unable to deserialize: {0}")]
    DeserializeError(#[from] serde_yaml::Error),
}

/// Driver configuration, usually loaded from 'config.yaml'
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "snake_case", default)]
pub struct Config {
    /// Name of the virtual gamepad
    pub name: String,
    /// Advertise force feedback on the virtual gamepad
    pub rumble: bool,
    /// How long to wait for a pending rumble message when a gamepad is
    /// disconnected
    pub teardown_timeout_ms: u64,
    /// Root of the USB device nodes. Every bus directory below it is watched.
    pub watch_path: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            name: GAMEPAD_NAME.to_string(),
            rumble: true,
            teardown_timeout_ms: 200,
            watch_path: USB_DEVNODE_ROOT.to_string(),
        }
    }
}

impl Config {
    /// Load a [Config] from the given YAML string
    pub fn from_yaml(content: String) -> Result<Config, LoadError> {
        let config: Config = serde_yaml::from_str(content.as_str())?;
        Ok(config)
    }

    /// Load a [Config] from the given YAML file
    pub fn from_yaml_path(path: &Path) -> Result<Config, LoadError> {
        let file = std::fs::File::open(path)?;
        let config: Config = serde_yaml::from_reader(file)?;
        Ok(config)
    }

    /// Load the first config file found in the search paths. Falls back to
    /// the defaults if there is none.
    pub fn load() -> Result<Config, LoadError> {
        let Some(path) = path::get_config_path() else {
            log::debug!("No config file found, using defaults");
            return Ok(Config::default());
        };
        log::info!("Loading config from {path:?}");
        Config::from_yaml_path(&path)
    }

    pub fn teardown_timeout(&self) -> Duration {
        Duration::from_millis(self.teardown_timeout_ms)
    }
}
