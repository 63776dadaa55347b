//! Operator configuration and TOML persistence.

use std::path::{Path, PathBuf};
use std::{fs, io};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::serial::DEFAULT_BAUD;
use crate::time_sync::Clock;
use crate::{Error, Result};

/// File name looked up in the working directory.
const LOCAL_FILE: &str = "coop.toml";

/// Serial port selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialConfig {
    /// Device name to open.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<String>,
    /// Text matched against port descriptions when no port is named.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    /// Line speed.
    pub baud: u32,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: None,
            hint: None,
            baud: DEFAULT_BAUD,
        }
    }
}

/// Clock used for time synchronization.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClockConfig {
    /// Which wall clock is sent to the controller.
    pub base: Clock,
}

/// Persisted operator configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Serial port selection.
    pub serial: SerialConfig,
    /// Time synchronization clock.
    pub clock: ClockConfig,
}

impl Config {
    /// Loads configuration from a TOML file.
    ///
    /// A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let data = match fs::read_to_string(path) {
            Ok(data) => data,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no config file, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(e.into()),
        };
        let config = toml::from_str(&data).map_err(|source| Error::Config {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), "config loaded");
        Ok(config)
    }

    /// Writes configuration to a TOML file, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let data = toml::to_string_pretty(self).map_err(io::Error::other)?;
        fs::write(path, data)?;
        Ok(())
    }

    /// Default config file locations, most specific first.
    pub fn search_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from(LOCAL_FILE)];
        if let Some(dir) = dirs::config_dir() {
            paths.push(dir.join("coop").join("config.toml"));
        }
        paths
    }

    /// Loads `explicit` if given, else the first existing file of
    /// [`Config::search_paths`], else the defaults.
    pub fn discover(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        Self::search_paths()
            .into_iter()
            .find(|p| p.is_file())
            .map_or_else(|| Ok(Self::default()), |p| Self::load(&p))
    }
}
