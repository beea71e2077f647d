//! Configuration management for Kiln
//!
//! Settings are process-wide and read-only from the bridge's point of view.
//! Sources, lowest precedence first:
//! - Hardcoded defaults
//! - /etc/kiln/kiln.{toml,yaml,json}
//! - ./config/kiln.{toml,yaml,json}
//! - File named by the KILN_CONFIG env var
//! - KILN_* environment variables, e.g. `KILN_NATIVE__BATCH_SIZE=8192` or
//!   `KILN_NATIVE__LOCAL_DIRS=/data1,/data2`

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Root configuration structure for Kiln
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct KilnConfig {
    #[serde(default)]
    pub native: NativeConfig,
}

impl KilnConfig {
    /// Load configuration from all sources and validate it.
    pub fn load() -> Result<Self, ConfigError> {
        let mut builder = Self::set_defaults(Config::builder())?;

        builder = builder
            .add_source(File::with_name("/etc/kiln/kiln").required(false))
            .add_source(File::with_name("./config/kiln").required(false));

        if let Ok(config_path) = std::env::var("KILN_CONFIG") {
            builder = builder.add_source(File::with_name(&config_path).required(false));
        }

        builder = builder.add_source(Self::environment());

        let config: KilnConfig = builder.build()?.try_deserialize()?;
        config.validate()?;

        Ok(config)
    }

    fn set_defaults(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<config::ConfigBuilder<config::builder::DefaultState>, ConfigError> {
        builder
            .set_default("native.dump_plan_before_execute", false)?
            .set_default("native.memory_fraction", DEFAULT_MEMORY_FRACTION)?
            .set_default("native.batch_size", DEFAULT_BATCH_SIZE as u64)?
            .set_default("native.worker_pool_size", DEFAULT_WORKER_POOL_SIZE as u64)?
            .set_default("native.invocation_failure", "empty_result")
    }

    /// Environment source: `KILN_` prefix, `__` between nested keys.
    fn environment() -> Environment {
        Environment::with_prefix("KILN")
            .prefix_separator("_")
            .separator("__")
            .list_separator(",")
            .with_list_parse_key("native.local_dirs")
            .try_parsing(true)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        let native = &self.native;

        if !(native.memory_fraction > 0.0 && native.memory_fraction <= 1.0) {
            return Err(ConfigError::Message(format!(
                "native.memory_fraction must be in (0, 1], got {}",
                native.memory_fraction
            )));
        }

        if native.batch_size == 0 {
            return Err(ConfigError::Message(
                "native.batch_size must be > 0".to_string(),
            ));
        }

        if native.worker_pool_size == 0 {
            return Err(ConfigError::Message(
                "native.worker_pool_size must be > 0".to_string(),
            ));
        }

        if native.local_dirs.is_empty() {
            return Err(ConfigError::Message(
                "native.local_dirs must list at least one directory".to_string(),
            ));
        }

        Ok(())
    }

    /// Load configuration from a specific file path
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config: KilnConfig = Self::set_defaults(Config::builder())?
            .add_source(File::from(path.as_ref()))
            .build()?
            .try_deserialize()?;
        config.validate()?;

        Ok(config)
    }
}

pub const DEFAULT_MEMORY_FRACTION: f64 = 0.75;
pub const DEFAULT_BATCH_SIZE: usize = 16384;
pub const DEFAULT_WORKER_POOL_SIZE: usize = 10;

/// What to do when the native engine hands back a negative stream handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum InvocationFailurePolicy {
    /// Log a warning and yield no rows.
    #[default]
    EmptyResult,
    /// Fail the task with `KilnError::NativeInvocation`.
    Fail,
}

/// Settings consumed by the native invocation protocol
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NativeConfig {
    /// Log the full task description before handing it to the engine
    #[serde(default)]
    pub dump_plan_before_execute: bool,

    /// Executor memory overhead in MiB; unset means no native memory limit
    #[serde(default)]
    pub executor_memory_overhead_mb: Option<u64>,

    /// Share of the native memory limit the engine may use
    pub memory_fraction: f64,

    /// Rows per batch transferred from native to host
    pub batch_size: usize,

    /// Native-side worker threads per task
    pub worker_pool_size: usize,

    /// Block storage local directories used for native spill files
    #[serde(default = "default_local_dirs")]
    pub local_dirs: Vec<PathBuf>,

    #[serde(default)]
    pub invocation_failure: InvocationFailurePolicy,
}

fn default_local_dirs() -> Vec<PathBuf> {
    vec![std::env::temp_dir()]
}

impl Default for NativeConfig {
    fn default() -> Self {
        Self {
            dump_plan_before_execute: false,
            executor_memory_overhead_mb: None,
            memory_fraction: DEFAULT_MEMORY_FRACTION,
            batch_size: DEFAULT_BATCH_SIZE,
            worker_pool_size: DEFAULT_WORKER_POOL_SIZE,
            local_dirs: default_local_dirs(),
            invocation_failure: InvocationFailurePolicy::default(),
        }
    }
}
