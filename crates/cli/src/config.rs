//! Configuration for the stackwatch CLI.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use control_plane::{ControlPlaneConfig, StorageConfig};
use figment::providers::{Env, Format, Toml};
use figment::Figment;
use monitor::StackParameters;
use packaging::PackageConfig;
use serde::Deserialize;

/// File read when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "stackwatch.toml";

/// Prefix of environment variables overriding file settings.
pub const ENV_PREFIX: &str = "STACKWATCH_";

/// Variables consulted, in order, when no domain is configured.
pub const DOMAIN_VARIABLES: [&str; 3] = ["HEFOKI_DOMAIN", "CLOUDFRONT_ALTERNATIVE_DOMAIN", "DOMAIN"];

pub const DEFAULT_DOMAIN: &str = "hefoki.today";

/// Top-level configuration.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct StackwatchConfig {
    #[serde(default)]
    pub control_plane: ControlPlaneConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub monitor: MonitorSettings,

    #[serde(default)]
    pub stack: StackSettings,

    #[serde(default)]
    pub function: FunctionSettings,

    #[serde(default)]
    pub package: PackageConfig,

    #[serde(default)]
    pub telemetry: TelemetryConfig,

    /// Alias domain used to find the content distribution. See
    /// [`StackwatchConfig::resolve_domain`].
    #[serde(default)]
    pub domain: Option<String>,
}

impl StackwatchConfig {
    /// Load configuration.
    ///
    /// Sources, later overriding earlier:
    /// 1. Default values
    /// 2. `path`, or `stackwatch.toml` in the current directory (if present)
    /// 3. Environment variables with the `STACKWATCH_` prefix, nested with `__`
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let file = path.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_FILE));
        if path.is_some() && !file.exists() {
            anyhow::bail!("configuration file {} not found", file.display());
        }

        Figment::new()
            .merge(Toml::file(file))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .with_context(|| format!("invalid configuration in {}", file.display()))
    }

    /// Fill in `domain` from the first set variable in [`DOMAIN_VARIABLES`],
    /// falling back to [`DEFAULT_DOMAIN`]. An explicitly configured domain is
    /// kept.
    pub fn resolve_domain(&mut self, lookup: impl Fn(&str) -> Option<String>) -> &str {
        let domain = self.domain.take().filter(|d| !d.is_empty()).unwrap_or_else(|| {
            DOMAIN_VARIABLES
                .iter()
                .find_map(|name| lookup(name).filter(|v| !v.is_empty()))
                .unwrap_or_else(|| DEFAULT_DOMAIN.to_owned())
        });
        self.domain.insert(domain)
    }
}

/// Poll loop settings.
#[derive(Debug, Clone, Deserialize)]
pub struct MonitorSettings {
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Longest tolerated gap between events. Unset waits indefinitely.
    #[serde(default)]
    pub idle_timeout_secs: Option<u64>,

    /// Additional attempts for a retryable event fetch failure.
    #[serde(default = "default_fetch_retries")]
    pub fetch_retries: u32,

    #[serde(default = "default_fetch_retry_delay_ms")]
    pub fetch_retry_delay_ms: u64,
}

const fn default_poll_interval_ms() -> u64 {
    500
}

const fn default_fetch_retries() -> u32 {
    3
}

const fn default_fetch_retry_delay_ms() -> u64 {
    1000
}

impl MonitorSettings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn idle_timeout(&self) -> Option<Duration> {
        self.idle_timeout_secs.map(Duration::from_secs)
    }

    pub fn fetch_retry_delay(&self) -> Duration {
        Duration::from_millis(self.fetch_retry_delay_ms)
    }
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            idle_timeout_secs: None,
            fetch_retries: default_fetch_retries(),
            fetch_retry_delay_ms: default_fetch_retry_delay_ms(),
        }
    }
}

/// The managed stack.
#[derive(Debug, Clone, Deserialize)]
pub struct StackSettings {
    #[serde(default = "default_stack_name")]
    pub name: String,

    /// Template submitted on create and update.
    #[serde(default = "default_template_path")]
    pub template_path: PathBuf,

    /// Template parameters. Empty values are left to the template default.
    #[serde(default)]
    pub parameters: StackParameters,
}

fn default_stack_name() -> String {
    "HefokiUpdater".to_owned()
}

fn default_template_path() -> PathBuf {
    PathBuf::from("./updater.cf.yaml")
}

impl Default for StackSettings {
    fn default() -> Self {
        Self {
            name: default_stack_name(),
            template_path: default_template_path(),
            parameters: StackParameters::default(),
        }
    }
}

/// The deployed function.
#[derive(Debug, Clone, Deserialize)]
pub struct FunctionSettings {
    #[serde(default = "default_function_name")]
    pub name: String,

    /// File receiving the payload of the last invocation.
    #[serde(default = "default_invoke_output")]
    pub invoke_output: PathBuf,
}

fn default_function_name() -> String {
    "hefoki-updater".to_owned()
}

fn default_invoke_output() -> PathBuf {
    PathBuf::from("file.json")
}

impl Default for FunctionSettings {
    fn default() -> Self {
        Self {
            name: default_function_name(),
            invoke_output: default_invoke_output(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Log output and trace export.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TelemetryConfig {
    #[serde(default)]
    pub log_format: LogFormat,

    /// OTLP/gRPC collector endpoint. Span export is disabled when unset.
    #[serde(default)]
    pub otlp_endpoint: Option<String>,
}
