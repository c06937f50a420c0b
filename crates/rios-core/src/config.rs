//! Configuration types for the RiOS worker

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::{NodeIdentity, RiosError, RiosResult};

/// Control plane used when neither the CLI nor the stored identity names one
pub const DEFAULT_API_ENDPOINT: &str = "http://localhost:3000";

/// Directory under the user's home holding all worker state
pub const STATE_DIR_NAME: &str = ".rios";

/// Resolve the current user's home directory
pub fn home_dir() -> RiosResult<PathBuf> {
    std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .filter(|h| !h.is_empty())
        .map(PathBuf::from)
        .ok_or_else(|| RiosError::Config("Could not determine home directory".to_string()))
}

/// Default location of the config file (`~/.rios/config.toml`)
pub fn default_config_path() -> RiosResult<PathBuf> {
    Ok(home_dir()?.join(STATE_DIR_NAME).join("config.toml"))
}

/// Default root for per-job working directories (`~/.rios/work`)
pub fn default_work_dir() -> RiosResult<PathBuf> {
    Ok(home_dir()?.join(STATE_DIR_NAME).join("work"))
}

/// Worker configuration file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Identity issued at registration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity: Option<NodeIdentity>,
    /// Worker loop and executor settings
    #[serde(default)]
    pub worker: WorkerSettings,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl WorkerConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> RiosResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| RiosError::Config(format!("Failed to read config file: {}", e)))?;
        toml::from_str(&content)
            .map_err(|e| RiosError::Config(format!("Failed to parse config: {}", e)))
    }

    /// Load configuration, falling back to defaults when the file does not exist
    pub fn load_or_default(path: &Path) -> RiosResult<Self> {
        if path.exists() {
            Self::from_file(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load a configuration that must carry an identity
    pub fn load_registered(path: &Path) -> RiosResult<Self> {
        if !path.exists() {
            return Err(RiosError::NotRegistered(format!(
                "no config file at {}",
                path.display()
            )));
        }
        let config = Self::from_file(path)?;
        config.identity()?;
        Ok(config)
    }

    /// The stored identity, or `NotRegistered` when there is none
    pub fn identity(&self) -> RiosResult<&NodeIdentity> {
        self.identity
            .as_ref()
            .ok_or_else(|| RiosError::NotRegistered("config has no identity".to_string()))
    }

    /// Replace the identity, keeping every other setting
    pub fn set_identity(&mut self, identity: NodeIdentity) {
        self.identity = Some(identity);
    }

    /// Write the configuration as TOML, creating parent directories.
    ///
    /// The file holds the node's auth token, so on unix it is only readable by
    /// the owner.
    pub fn save(&self, path: &Path) -> RiosResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        write_private(path, content.as_bytes())
    }
}

#[cfg(unix)]
fn write_private(path: &Path, content: &[u8]) -> RiosResult<()> {
    use std::io::Write;
    use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};

    let mut file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;
    // mode() only applies on creation
    file.set_permissions(std::fs::Permissions::from_mode(0o600))?;
    file.write_all(content)?;
    Ok(())
}

#[cfg(not(unix))]
fn write_private(path: &Path, content: &[u8]) -> RiosResult<()> {
    std::fs::write(path, content)?;
    Ok(())
}

/// Worker loop and executor settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerSettings {
    /// Seconds between polls while idle
    pub poll_interval_secs: u64,
    /// Back off exponentially after consecutive transport failures
    pub backoff_enabled: bool,
    /// Upper bound for the backoff delay in seconds
    pub max_backoff_secs: u64,
    /// Timeout for a single control plane request in seconds
    pub request_timeout_secs: u64,
    /// Root for per-job working directories (defaults to `~/.rios/work`)
    pub work_dir: Option<PathBuf>,
    /// Container runtime binary
    pub docker_binary: String,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            poll_interval_secs: 10,
            backoff_enabled: true,
            max_backoff_secs: 300,
            request_timeout_secs: 30,
            work_dir: None,
            docker_binary: "docker".to_string(),
        }
    }
}

impl WorkerSettings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_secs(self.max_backoff_secs).max(self.poll_interval())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// The configured work directory, or the default under the home directory
    pub fn resolved_work_dir(&self) -> RiosResult<PathBuf> {
        match &self.work_dir {
            Some(dir) => Ok(dir.clone()),
            None => default_work_dir(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}
