use std::path::PathBuf;
use std::time::Duration;

use ::config::{Config as ConfigBuilder, Environment, File, Source};
use anyhow::{bail, Context, Error, Result};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    #[serde(default)]
    pub filter: Filter,
    #[serde(default)]
    pub runtime: Runtime,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(default = "default_activity_log", alias = "activity_log")]
    pub activity_log: PathBuf,
    #[serde(default = "default_false", alias = "skip_runtime_check")]
    pub skip_runtime_check: bool,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct Filter {
    /// CSV file read at startup and on `SIGHUP`. A missing file leaves the
    /// service unfiltered.
    #[serde(default = "default_filter_csv")]
    pub csv: Option<PathBuf>,
    /// Forces the column taken from the filter file. When unset, a
    /// `container_name` or `container_id` header is looked for, falling back
    /// to the first column of a headerless file.
    #[serde(default)]
    pub column: Option<String>,
    #[serde(default = "default_upload_column", alias = "upload_column")]
    pub upload_column: String,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct Runtime {
    /// Docker daemon socket. Local defaults are used when unset.
    #[serde(default)]
    pub socket: Option<String>,
    /// Seconds allowed for every single call to the daemon.
    #[serde(default = "default_timeout")]
    pub timeout: f64,
    /// Seconds a container gets to exit on stop/restart before it is killed.
    #[serde(default, alias = "stop_grace")]
    pub stop_grace: Option<i64>,
}

impl Config {
    /// Reads `Dockhand.{toml,yaml}` when present, then `DOCKHAND_*` variables.
    /// Nested keys use `__`, as in `DOCKHAND_RUNTIME__TIMEOUT`.
    ///
    /// # Errors
    ///
    /// - When a source can't be read or a value is invalid.
    pub fn load() -> Result<Self> {
        Config::from_sources(File::with_name("Dockhand").required(false), environment())
    }

    fn from_sources(file: impl Source + Send + Sync + 'static, env: Environment) -> Result<Self> {
        let config: Config = ConfigBuilder::builder()
            .add_source(file)
            .add_source(env)
            .build()
            .context("couldn't read config")?
            .try_deserialize()
            .context("couldn't deserialize config")?;

        config.runtime.validate()?;

        Ok(config)
    }

    /// Converts the config into a JSON string.
    ///
    /// # Errors
    ///
    /// - When the conversion fails.
    #[inline]
    pub fn stringify(&self) -> Result<String> {
        serde_json::to_string(self).map_err(Error::msg)
    }

    #[inline]
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port.unwrap_or(3000))
    }
}

impl Runtime {
    /// The per-call timeout. Values that aren't a positive number of seconds
    /// fall back to the default.
    pub fn timeout(&self) -> Duration {
        Duration::try_from_secs_f64(self.timeout)
            .ok()
            .filter(|timeout| !timeout.is_zero())
            .unwrap_or_else(|| Duration::from_secs_f64(default_timeout()))
    }

    fn validate(&self) -> Result<()> {
        if !self.timeout.is_finite() || self.timeout <= 0.0 {
            bail!("runtime.timeout must be a positive number of seconds, got {}", self.timeout);
        }

        if Duration::try_from_secs_f64(self.timeout).is_err() {
            bail!("runtime.timeout of {} seconds is too large", self.timeout);
        }

        Ok(())
    }
}

fn environment() -> Environment {
    Environment::with_prefix("DOCKHAND").prefix_separator("_").separator("__")
}

impl Default for Config {
    fn default() -> Self {
        Config {
            filter: Filter::default(),
            runtime: Runtime::default(),
            host: default_host(),
            port: None,
            activity_log: default_activity_log(),
            skip_runtime_check: false,
        }
    }
}

impl Default for Filter {
    fn default() -> Self {
        Filter {
            csv: default_filter_csv(),
            column: None,
            upload_column: default_upload_column(),
        }
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Runtime {
            socket: None,
            timeout: default_timeout(),
            stop_grace: None,
        }
    }
}

fn default_host() -> String {
    String::from("127.0.0.1")
}

fn default_activity_log() -> PathBuf {
    PathBuf::from("logs/activity.log")
}

#[allow(clippy::unnecessary_wraps)]
fn default_filter_csv() -> Option<PathBuf> {
    Some(PathBuf::from("containers.csv"))
}

fn default_upload_column() -> String {
    String::from("container_id")
}

const fn default_timeout() -> f64 {
    30.0
}

const fn default_false() -> bool {
    false
}
