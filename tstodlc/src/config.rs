//! User configuration stored in an INI file.
//!
//! The file lives at `<config dir>/tstodlc/config.ini` unless the
//! `TSTODLC_CONFIG` environment variable names another path. Every key is
//! optional; command-line arguments override the file, which overrides the
//! built-in defaults.
//!
//! ```ini
//! [package]
//! platform = all
//! tier = all
//! language = all
//! min_version = 4.69.0
//! priority = 1
//!
//! [logging]
//! level = info
//! directory = /var/log/tstodlc
//! ```

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use ini::Ini;
use semver::Version;
use thiserror::Error;

/// Environment variable overriding the configuration file path.
pub const CONFIG_ENV: &str = "TSTODLC_CONFIG";

/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";

const PACKAGE_SECTION: &str = "package";
const LOGGING_SECTION: &str = "logging";

/// Errors while reading or writing the configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file exists but cannot be parsed.
    #[error("failed to parse {}: {message}", .path.display())]
    Parse { path: PathBuf, message: String },

    /// The file could not be written.
    #[error("failed to write {}: {source}", .path.display())]
    WriteFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A value is not acceptable for its key.
    #[error("invalid value '{value}' for {key}: {reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },

    /// The key is not known.
    #[error("unknown configuration key '{0}'")]
    UnknownKey(String),
}

/// Default record attributes for packaging runs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackageSettings {
    pub platform: Option<String>,
    pub tier: Option<String>,
    pub language: Option<String>,
    pub min_version: Option<String>,
    pub priority: Option<u16>,
}

/// Logging settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingSettings {
    /// Filter directive, e.g. `info` or `tstodlc=debug`.
    pub level: String,
    /// Directory for daily log files; console only when unset.
    pub directory: Option<PathBuf>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_LEVEL.to_string(),
            directory: None,
        }
    }
}

/// Contents of the configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigFile {
    pub package: PackageSettings,
    pub logging: LoggingSettings,
}

/// Check that `value` is a semantic version usable as `minVersion`.
pub fn validate_min_version(value: &str) -> Result<(), semver::Error> {
    Version::parse(value.trim()).map(|_| ())
}

/// Path of the configuration file.
pub fn config_file_path() -> PathBuf {
    if let Some(path) = std::env::var_os(CONFIG_ENV).filter(|p| !p.is_empty()) {
        return PathBuf::from(path);
    }
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("tstodlc")
        .join("config.ini")
}

impl ConfigFile {
    /// Load the configuration from [`config_file_path`].
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&config_file_path())
    }

    /// Load the configuration from `path`; defaults when it does not exist.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let ini = Ini::load_from_file(path).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        let mut config = Self::default();
        for key in ConfigKey::all() {
            let value = ini
                .section(Some(key.section()))
                .and_then(|s| s.get(key.key_name()))
                .map(str::trim)
                .filter(|v| !v.is_empty());
            if let Some(value) = value {
                key.set(&mut config, value)?;
            }
        }
        Ok(config)
    }

    /// Save to [`config_file_path`].
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&config_file_path())
    }

    /// Save to `path`, creating its directory. Unset keys are omitted.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let write_err = |e| ConfigError::WriteFailed {
            path: path.to_path_buf(),
            source: e,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(write_err)?;
        }

        let mut ini = Ini::new();
        for key in ConfigKey::all() {
            let value = key.get(self);
            if !value.is_empty() {
                ini.with_section(Some(key.section()))
                    .set(key.key_name(), value);
            }
        }
        ini.write_to_file(path).map_err(write_err)
    }
}

/// Every key of the configuration file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigKey {
    PackagePlatform,
    PackageTier,
    PackageLanguage,
    PackageMinVersion,
    PackagePriority,
    LoggingLevel,
    LoggingDirectory,
}

impl ConfigKey {
    /// All keys in file order.
    pub fn all() -> &'static [ConfigKey] {
        &[
            ConfigKey::PackagePlatform,
            ConfigKey::PackageTier,
            ConfigKey::PackageLanguage,
            ConfigKey::PackageMinVersion,
            ConfigKey::PackagePriority,
            ConfigKey::LoggingLevel,
            ConfigKey::LoggingDirectory,
        ]
    }

    /// INI section of the key.
    pub fn section(&self) -> &'static str {
        match self {
            ConfigKey::LoggingLevel | ConfigKey::LoggingDirectory => LOGGING_SECTION,
            _ => PACKAGE_SECTION,
        }
    }

    /// Key name inside its section.
    pub fn key_name(&self) -> &'static str {
        match self {
            ConfigKey::PackagePlatform => "platform",
            ConfigKey::PackageTier => "tier",
            ConfigKey::PackageLanguage => "language",
            ConfigKey::PackageMinVersion => "min_version",
            ConfigKey::PackagePriority => "priority",
            ConfigKey::LoggingLevel => "level",
            ConfigKey::LoggingDirectory => "directory",
        }
    }

    /// Full name in `section.key` form.
    pub fn name(&self) -> String {
        format!("{}.{}", self.section(), self.key_name())
    }

    /// Current value as text; empty when unset.
    pub fn get(&self, config: &ConfigFile) -> String {
        let pkg = &config.package;
        match self {
            ConfigKey::PackagePlatform => pkg.platform.clone().unwrap_or_default(),
            ConfigKey::PackageTier => pkg.tier.clone().unwrap_or_default(),
            ConfigKey::PackageLanguage => pkg.language.clone().unwrap_or_default(),
            ConfigKey::PackageMinVersion => pkg.min_version.clone().unwrap_or_default(),
            ConfigKey::PackagePriority => pkg.priority.map(|p| p.to_string()).unwrap_or_default(),
            ConfigKey::LoggingLevel => config.logging.level.clone(),
            ConfigKey::LoggingDirectory => config
                .logging
                .directory
                .as_ref()
                .map(|d| d.display().to_string())
                .unwrap_or_default(),
        }
    }

    /// Validate and store `value`.
    pub fn set(&self, config: &mut ConfigFile, value: &str) -> Result<(), ConfigError> {
        let value = value.trim();
        let invalid = |reason: String| ConfigError::InvalidValue {
            key: self.name(),
            value: value.to_string(),
            reason,
        };
        let text = || (!value.is_empty()).then(|| value.to_string());

        match self {
            ConfigKey::PackagePlatform => config.package.platform = text(),
            ConfigKey::PackageTier => config.package.tier = text(),
            ConfigKey::PackageLanguage => config.package.language = text(),
            ConfigKey::PackageMinVersion => {
                if !value.is_empty() {
                    validate_min_version(value).map_err(|e| invalid(e.to_string()))?;
                }
                config.package.min_version = text();
            }
            ConfigKey::PackagePriority => {
                config.package.priority = if value.is_empty() {
                    None
                } else {
                    Some(value.parse::<u16>().map_err(|e| invalid(e.to_string()))?)
                };
            }
            ConfigKey::LoggingLevel => {
                config.logging.level = text().unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string());
            }
            ConfigKey::LoggingDirectory => config.logging.directory = text().map(PathBuf::from),
        }
        Ok(())
    }
}

impl fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

impl FromStr for ConfigKey {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ConfigKey::all()
            .iter()
            .copied()
            .find(|k| k.name() == s)
            .ok_or_else(|| ConfigError::UnknownKey(s.to_string()))
    }
}
