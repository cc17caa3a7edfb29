use std::path::PathBuf;
use std::time::Duration;

pub const ENV_COMMAND_TIMEOUT_MS: &str = "TOOL_WINDOWS_COMMAND_TIMEOUT_MS";
pub const ENV_CONTEXT_HANDOFF_TIMEOUT_MS: &str = "TOOL_WINDOWS_CONTEXT_HANDOFF_TIMEOUT_MS";
pub const ENV_LISTENER_INSTALL_ATTEMPTS: &str = "TOOL_WINDOWS_LISTENER_INSTALL_ATTEMPTS";
pub const ENV_CASCADE_OFFSET: &str = "TOOL_WINDOWS_CASCADE_OFFSET";
pub const ENV_HINT_STORE_PATH: &str = "TOOL_WINDOWS_HINT_STORE_PATH";

const DEFAULT_COMMAND_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_CONTEXT_HANDOFF_TIMEOUT_MS: u64 = 2_000;
const DEFAULT_LISTENER_INSTALL_ATTEMPTS: u8 = 2;
const DEFAULT_CASCADE_OFFSET: f64 = 24.0;
const HINT_FILE_NAME: &str = "tool-window-geometry.v1.json";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("{key} must be a positive integer, got {value:?}")]
    InvalidInteger { key: &'static str, value: String },
    #[error("{key} must be a non-negative number, got {value:?}")]
    InvalidNumber { key: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ToolWindowConfig {
    pub command_timeout_ms: u64,
    pub context_handoff_timeout_ms: u64,
    /// Listener installs attempted per session: the first at the first context
    /// switch, the rest at later context switches.
    pub listener_install_attempts: u8,
    /// Offset applied per already-floating window when no geometry hint exists.
    pub cascade_offset: f64,
    /// `None` disables geometry hint persistence.
    pub hint_store_path: Option<PathBuf>,
}

impl Default for ToolWindowConfig {
    fn default() -> Self {
        Self {
            command_timeout_ms: DEFAULT_COMMAND_TIMEOUT_MS,
            context_handoff_timeout_ms: DEFAULT_CONTEXT_HANDOFF_TIMEOUT_MS,
            listener_install_attempts: DEFAULT_LISTENER_INSTALL_ATTEMPTS,
            cascade_offset: DEFAULT_CASCADE_OFFSET,
            hint_store_path: Some(default_hint_store_path()),
        }
    }
}

impl ToolWindowConfig {
    /// In-memory only: no geometry hints on disk.
    #[must_use]
    pub fn ephemeral() -> Self {
        Self {
            hint_store_path: None,
            ..Self::default()
        }
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_source(|key| std::env::var(key).ok())
    }

    pub fn from_env_source<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let mut config = Self::default();
        if let Some(value) = non_empty(ENV_COMMAND_TIMEOUT_MS) {
            config.command_timeout_ms = parse_positive(ENV_COMMAND_TIMEOUT_MS, &value)?;
        }
        if let Some(value) = non_empty(ENV_CONTEXT_HANDOFF_TIMEOUT_MS) {
            config.context_handoff_timeout_ms =
                parse_positive(ENV_CONTEXT_HANDOFF_TIMEOUT_MS, &value)?;
        }
        if let Some(value) = non_empty(ENV_LISTENER_INSTALL_ATTEMPTS) {
            let attempts = parse_positive(ENV_LISTENER_INSTALL_ATTEMPTS, &value)?;
            config.listener_install_attempts =
                u8::try_from(attempts).map_err(|_| ConfigError::InvalidInteger {
                    key: ENV_LISTENER_INSTALL_ATTEMPTS,
                    value: value.clone(),
                })?;
        }
        if let Some(value) = non_empty(ENV_CASCADE_OFFSET) {
            config.cascade_offset = value
                .parse::<f64>()
                .ok()
                .filter(|offset| offset.is_finite() && *offset >= 0.0)
                .ok_or(ConfigError::InvalidNumber {
                    key: ENV_CASCADE_OFFSET,
                    value,
                })?;
        }
        if let Some(value) = non_empty(ENV_HINT_STORE_PATH) {
            config.hint_store_path = Some(PathBuf::from(value));
        }
        Ok(config)
    }

    #[must_use]
    pub fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms)
    }

    #[must_use]
    pub fn context_handoff_timeout(&self) -> Duration {
        Duration::from_millis(self.context_handoff_timeout_ms)
    }
}

fn parse_positive(key: &'static str, value: &str) -> Result<u64, ConfigError> {
    value
        .parse::<u64>()
        .ok()
        .filter(|parsed| *parsed > 0)
        .ok_or_else(|| ConfigError::InvalidInteger {
            key,
            value: value.to_string(),
        })
}

fn default_hint_store_path() -> PathBuf {
    if let Some(mut data_dir) = dirs::data_local_dir() {
        data_dir.push("tool-windows");
        data_dir.push(HINT_FILE_NAME);
        return data_dir;
    }

    if let Some(mut home_dir) = dirs::home_dir() {
        home_dir.push(".tool-windows");
        home_dir.push(HINT_FILE_NAME);
        return home_dir;
    }

    PathBuf::from(HINT_FILE_NAME)
}
