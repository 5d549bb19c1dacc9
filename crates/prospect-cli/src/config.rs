use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

const CONFIG_VERSION: u32 = 1;
pub const MIN_POLL_INTERVAL_MS: u64 = 500;

#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("home directory not found; set HOME")]
    HomeMissing,
    #[error("config io error: {0}")]
    Io(#[from] io::Error),
    #[error("config parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("config serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("config validation error: {0}")]
    Validation(String),
}

#[derive(Debug, Clone)]
pub struct ConfigPaths {
    pub base_dir: PathBuf,
    pub config_path: PathBuf,
    pub logs_dir: PathBuf,
}

impl ConfigPaths {
    pub fn from_home() -> Result<Self, ConfigError> {
        let home = std::env::var("HOME").map_err(|_| ConfigError::HomeMissing)?;
        Ok(Self::from_base(PathBuf::from(home).join(".prospect")))
    }

    pub fn from_base(base_dir: PathBuf) -> Self {
        let config_path = base_dir.join("config.toml");
        let logs_dir = base_dir.join("logs");
        Self {
            base_dir,
            config_path,
            logs_dir,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub version: u32,
    pub api: ApiConfig,
    pub poll: PollConfig,
    pub ui: UiConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            api: ApiConfig::default(),
            poll: PollConfig::default(),
            ui: UiConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    pub token: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            token: String::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollConfig {
    pub interval_ms: u64,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_ms: prospect_core::DEFAULT_POLL_INTERVAL.as_millis() as u64,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UiConfig {
    pub show_activity: bool,
    pub color_theme: String,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            show_activity: true,
            color_theme: "minimal".to_string(),
        }
    }
}

impl Config {
    pub fn load_or_create(paths: &ConfigPaths) -> Result<Self, ConfigError> {
        ensure_dirs(paths)?;
        if paths.config_path.exists() {
            let config = Self::load(paths)?;
            return Ok(config);
        }

        let config = Self::default();
        Self::write(paths, &config)?;
        Ok(config)
    }

    pub fn load(paths: &ConfigPaths) -> Result<Self, ConfigError> {
        ensure_dirs(paths)?;
        let content = fs::read_to_string(&paths.config_path)?;
        let raw: toml::Value = toml::from_str(&content)?;
        let file_version = raw
            .get("version")
            .and_then(|value| value.as_integer())
            .unwrap_or(0) as u32;

        let mut config: Config = toml::from_str(&content)?;
        let mut migrated = false;

        if file_version < CONFIG_VERSION {
            config.version = CONFIG_VERSION;
            migrated = true;
        } else if file_version > CONFIG_VERSION {
            eprintln!(
                "config version {file_version} is newer than supported {CONFIG_VERSION}; proceeding"
            );
        }

        warn_if_loose_permissions(&paths.config_path)?;

        if migrated {
            Self::write(paths, &config)?;
        }

        Ok(config)
    }

    pub fn write(paths: &ConfigPaths, config: &Config) -> Result<(), ConfigError> {
        ensure_dirs(paths)?;
        let content = toml::to_string_pretty(config)?;
        write_atomic(&paths.config_path, content.as_bytes())?;
        Ok(())
    }

    pub fn redacted(&self) -> Self {
        let mut redacted = self.clone();
        if !redacted.api.token.trim().is_empty() {
            redacted.api.token = "<redacted>".to_string();
        }
        redacted
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let base_url = self.api.base_url.trim();
        if base_url.is_empty() {
            return Err(ConfigError::Validation(
                "api.base_url must not be empty".into(),
            ));
        }
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(ConfigError::Validation(format!(
                "api.base_url must start with http:// or https:// (got {base_url})"
            )));
        }
        if self.poll.interval_ms < MIN_POLL_INTERVAL_MS {
            return Err(ConfigError::Validation(format!(
                "poll.interval_ms must be at least {MIN_POLL_INTERVAL_MS}"
            )));
        }
        match self.ui.color_theme.as_str() {
            "minimal" | "plain" => {}
            other => {
                return Err(ConfigError::Validation(format!(
                    "ui.color_theme must be minimal or plain (got {other})"
                )));
            }
        }
        Ok(())
    }
}

fn ensure_dirs(paths: &ConfigPaths) -> Result<(), ConfigError> {
    fs::create_dir_all(&paths.base_dir)?;
    fs::create_dir_all(&paths.logs_dir)?;
    Ok(())
}

fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), ConfigError> {
    let parent = path
        .parent()
        .ok_or_else(|| io::Error::other("config path missing parent directory"))?;
    let tmp_path = parent.join("config.toml.tmp");
    fs::write(&tmp_path, contents)?;
    set_strict_permissions(&tmp_path)?;
    fs::rename(&tmp_path, path)?;
    Ok(())
}

fn set_strict_permissions(path: &Path) -> Result<(), ConfigError> {
    #[cfg(unix)]
    {
        let perm = fs::Permissions::from_mode(0o600);
        fs::set_permissions(path, perm)?;
    }
    Ok(())
}

fn warn_if_loose_permissions(path: &Path) -> Result<(), ConfigError> {
    #[cfg(unix)]
    {
        let metadata = fs::metadata(path)?;
        let mode = metadata.permissions().mode() & 0o777;
        if mode & 0o077 != 0 {
            eprintln!(
                "config file {} is group/world readable and may hold an API token; set permissions to 0600",
                path.display()
            );
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{CONFIG_VERSION, Config, ConfigPaths};
    use std::fs;

    #[test]
    fn load_or_create_writes_defaults_and_dirs() {
        let temp = tempfile::tempdir().unwrap();
        let base = temp.path().join("prospect");
        let paths = ConfigPaths::from_base(base);
        let config = Config::load_or_create(&paths).unwrap();

        assert!(paths.config_path.exists());
        assert!(paths.logs_dir.is_dir());
        assert_eq!(config.version, CONFIG_VERSION);
        assert_eq!(config.poll.interval_ms, 5000);
        assert_eq!(config.api.base_url, "http://localhost:8000");

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(&paths.config_path)
                .unwrap()
                .permissions()
                .mode()
                & 0o777;
            assert_eq!(mode, 0o600);
        }
    }

    #[test]
    fn load_updates_version_and_defaults() {
        let temp = tempfile::tempdir().unwrap();
        let base = temp.path().join("prospect");
        let paths = ConfigPaths::from_base(base);
        fs::create_dir_all(&paths.base_dir).unwrap();
        let content = r#"[api]
base_url = "https://crm.example.com"
"#;
        fs::write(&paths.config_path, content).unwrap();

        let config = Config::load(&paths).unwrap();
        assert_eq!(config.version, CONFIG_VERSION);
        assert_eq!(config.api.base_url, "https://crm.example.com");
        assert_eq!(config.poll.interval_ms, 5000);
        assert_eq!(config.ui.color_theme, "minimal");

        let updated = fs::read_to_string(&paths.config_path).unwrap();
        assert!(updated.contains("version = 1"));
        assert!(updated.contains("[poll]"));
    }

    #[test]
    fn redacted_hides_token() {
        let mut config = Config::default();
        config.api.token = "secret".to_string();
        assert_eq!(config.redacted().api.token, "<redacted>");
        assert_eq!(Config::default().redacted().api.token, "");
    }

    #[test]
    fn validate_rejects_fast_polling_and_bad_url() {
        let mut config = Config::default();
        assert!(config.validate().is_ok());

        config.poll.interval_ms = 100;
        assert!(config.validate().is_err());

        config.poll.interval_ms = 5000;
        config.api.base_url = "localhost:8000".to_string();
        assert!(config.validate().is_err());
    }
}
