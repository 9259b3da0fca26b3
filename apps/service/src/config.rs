use std::{env, fmt, fs, io, path};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to read config {}: {source}", path.display())]
    ReadFailed { path: path::PathBuf, source: io::Error },
    #[error("failed to write config {}: {source}", path.display())]
    WriteFailed { path: path::PathBuf, source: io::Error },
    #[error("failed to parse config: {0}")]
    ParseFailed(#[from] toml::de::Error),
    #[error("failed to serialize config: {0}")]
    SerializeFailed(#[from] toml::ser::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
    #[error("no config path: neither XDG_CONFIG_HOME nor a home directory is available")]
    ConfigPathUnavailable,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub worker: Worker,
    #[serde(default)]
    pub storage: Storage,
    /// SMS gateway credentials; alerts are only logged without them
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub twilio: Option<Twilio>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Worker {
    pub sweep_interval_seconds: u64,
    pub rotation_interval_seconds: u64,
    /// Upper bound on probes in flight; unbounded when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_concurrent_probes: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Storage {
    pub database_path: path::PathBuf,
    pub logs_dir: path::PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Twilio {
    pub account_sid: String,
    pub auth_token: String,
    pub from_phone: String,
    #[serde(default = "default_twilio_api_base")]
    pub api_base: String,
}

fn default_twilio_api_base() -> String {
    "https://api.twilio.com".into()
}

impl Default for Worker {
    fn default() -> Self {
        Self { sweep_interval_seconds: 60, rotation_interval_seconds: 60 * 60 * 24, max_concurrent_probes: None }
    }
}

impl Default for Storage {
    fn default() -> Self {
        Self { database_path: "uppe.db".into(), logs_dir: ".logs".into() }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self { worker: Worker::default(), storage: Storage::default(), twilio: None }
    }
}

/// Used to ensure we are actually reading a toml file
fn normalize_toml_path(path: &path::Path) -> path::PathBuf {
    let mut path = path.to_path_buf();
    if path.extension().map(|ext| ext != "toml").unwrap_or(true) {
        path.set_extension("toml");
    }
    path
}

/// Get default config path ($XDG_CONFIG_HOME/uppe/worker.toml or
/// $HOME/.config/...)
fn default_config_path() -> Result<path::PathBuf, Error> {
    let path = if let Ok(config_home) = env::var("XDG_CONFIG_HOME") {
        path::PathBuf::from(config_home)
    } else if let Some(home_dir) = env::home_dir() {
        home_dir.join(".config")
    } else {
        return Err(Error::ConfigPathUnavailable);
    };

    Ok(path.join("uppe/worker.toml"))
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let write_indented = |level: usize| {
            move |f: &mut fmt::Formatter<'_>, label: &str, value: &dyn fmt::Display| {
                writeln!(f, "  {:indent$}{}: {}", "", label, value, indent = level * 2)
            }
        };
        let write_title_indented = |level: usize| {
            move |f: &mut fmt::Formatter<'_>, label: &str| {
                writeln!(f, "{:indent$}{}", "", label, indent = level * 2)
            }
        };

        let write_title_1 = write_title_indented(1);
        let write_1 = write_indented(1);

        writeln!(f, "Current Worker Configuration:")?;
        write_title_1(f, "Worker")?;
        write_1(f, "Sweep Interval (s)", &self.worker.sweep_interval_seconds)?;
        write_1(f, "Rotation Interval (s)", &self.worker.rotation_interval_seconds)?;
        match self.worker.max_concurrent_probes {
            Some(limit) => write_1(f, "Max Concurrent Probes", &limit)?,
            None => write_1(f, "Max Concurrent Probes", &"unbounded")?,
        }
        write_title_1(f, "Storage")?;
        write_1(f, "Database", &self.storage.database_path.display())?;
        write_1(f, "Logs Directory", &self.storage.logs_dir.display())?;
        write_title_1(f, "Alerts")?;
        match &self.twilio {
            // auth_token is never printed
            Some(twilio) => {
                write_1(f, "Gateway", &"twilio")?;
                write_1(f, "Account SID", &twilio.account_sid)?;
                write_1(f, "From", &twilio.from_phone)?;
                write_1(f, "API Base", &twilio.api_base)?;
            }
            None => write_1(f, "Gateway", &"log only")?,
        }

        Ok(())
    }
}

impl Config {
    /// Generate Config structure from file
    ///
    /// Creates a default config in ~/.config/uppe/worker.toml
    ///  or the specified path if one does not exist
    ///
    /// ```rust,ignore
    /// let cfg = config::Config::from_config(None::<&path::Path>)?;
    /// println!("{}", cfg);
    /// ```
    pub fn from_config(optional_path: Option<impl AsRef<path::Path>>) -> Result<Self, Error> {
        let config_path: path::PathBuf = if let Some(path) = optional_path {
            normalize_toml_path(path.as_ref())
        } else {
            default_config_path()?
        };

        let config = if config_path.exists() {
            let raw_string = fs::read_to_string(&config_path)
                .map_err(|source| Error::ReadFailed { path: config_path.clone(), source })?;
            Self::from_toml(&raw_string)?
        } else {
            let config = Self::default();
            config.write_config(&config_path)?;
            config
        };

        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(raw: &str) -> Result<Self, Error> {
        Ok(toml::from_str(raw)?)
    }

    /// Reject settings the scheduler cannot run with
    pub fn validate(&self) -> Result<(), Error> {
        if self.worker.sweep_interval_seconds == 0 {
            return Err(Error::Invalid("worker.sweep_interval_seconds must be at least 1".into()));
        }
        if self.worker.rotation_interval_seconds == 0 {
            return Err(Error::Invalid("worker.rotation_interval_seconds must be at least 1".into()));
        }
        if self.worker.max_concurrent_probes == Some(0) {
            return Err(Error::Invalid("worker.max_concurrent_probes must be at least 1".into()));
        }
        if let Some(twilio) = &self.twilio {
            if twilio.account_sid.is_empty() || twilio.auth_token.is_empty() || twilio.from_phone.is_empty() {
                return Err(Error::Invalid(
                    "twilio.account_sid, twilio.auth_token and twilio.from_phone are all required".into(),
                ));
            }
        }
        Ok(())
    }

    /// Serialize and write a config to a file
    pub fn write_config(&self, path: &path::Path) -> Result<(), Error> {
        let config_str: String = toml::to_string_pretty(self)?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|source| Error::WriteFailed { path: parent.to_path_buf(), source })?;
        }

        fs::write(path, config_str).map_err(|source| Error::WriteFailed { path: path.to_path_buf(), source })
    }
}
