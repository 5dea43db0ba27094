//! Engine configuration
//!
//! Loaded from an optional TOML file, then overridden by `HOOKWATCH_*`
//! environment variables. The CLI applies its own flags on top.

use std::path::Path;

use anyhow::{Context, Result};
use hookwatch_shared::utils::is_env_entry;
use hookwatch_shared::CategoryMask;
use serde::{Deserialize, Serialize};

/// Prefix of environment overrides, e.g. `HOOKWATCH_RESTART_ENABLED=true`
pub const ENV_PREFIX: &str = "HOOKWATCH";

pub const DEFAULT_RECOVERY_PATH: &str = "/firmadyne/console";
pub const DEFAULT_INIT_PATH: &str = "/sbin/init";
pub const DEFAULT_EXECUTE_THRESHOLD: u32 = 5;
pub const DEFAULT_MAX_ARG_STRINGS: usize = 1024;

fn default_spawn_env() -> Vec<String> {
    ["HOME=/", "TERM=linux", "LD_PRELOAD=/firmadyne/libnvram.so"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Enabled event categories
    #[serde(with = "mask_repr")]
    pub mask: CategoryMask,

    /// Drop CAP_SYS_BOOT and restart init when the target reboots
    pub restart_enabled: bool,

    /// Start with the execute counter armed
    pub execute_armed: bool,

    /// `do_execve` entries counted before the recovery console is spawned
    pub execute_threshold: u32,

    /// Number of concurrently pending bind calls tracked
    pub correlation_capacity: usize,

    /// Upper bound on argv/envp strings written per event
    pub max_arg_strings: usize,

    pub recovery_path: String,
    pub init_path: String,

    /// Environment handed to spawned helpers, as `KEY=VALUE`
    pub spawn_env: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mask: CategoryMask::ALL,
            restart_enabled: false,
            execute_armed: false,
            execute_threshold: DEFAULT_EXECUTE_THRESHOLD,
            correlation_capacity: 2 * num_cpus::get(),
            max_arg_strings: DEFAULT_MAX_ARG_STRINGS,
            recovery_path: DEFAULT_RECOVERY_PATH.to_string(),
            init_path: DEFAULT_INIT_PATH.to_string(),
            spawn_env: default_spawn_env(),
        }
    }
}

impl Config {
    /// Load from `path` (if any) and the process environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with_env(
            path,
            config::Environment::with_prefix(ENV_PREFIX).try_parsing(true),
        )
    }

    fn load_with_env(path: Option<&Path>, env: config::Environment) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(
                config::File::from(path.to_path_buf())
                    .format(config::FileFormat::Toml)
                    .required(true),
            );
        }

        let config: Config = builder
            .add_source(env)
            .build()
            .context("Failed to read configuration")?
            .try_deserialize()
            .context("Invalid configuration")?;

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.correlation_capacity == 0 {
            anyhow::bail!("correlation_capacity must be greater than 0");
        }

        if self.max_arg_strings == 0 {
            anyhow::bail!("max_arg_strings must be greater than 0");
        }

        for (name, path) in [
            ("recovery_path", &self.recovery_path),
            ("init_path", &self.init_path),
        ] {
            if path.is_empty() {
                anyhow::bail!("{} must not be empty", name);
            }
            if !Path::new(path).is_absolute() {
                anyhow::bail!("{} must be an absolute path: {}", name, path);
            }
        }

        if let Some(bad) = self.spawn_env.iter().find(|e| !is_env_entry(e)) {
            anyhow::bail!("Invalid spawn_env entry (expected KEY=VALUE): {}", bad);
        }

        Ok(())
    }

    /// Render as TOML
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize configuration")
    }
}

/// Masks are written as category lists but also accepted as raw bits
mod mask_repr {
    use hookwatch_shared::CategoryMask;
    use serde::{de, Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Bits(u32),
        Text(String),
    }

    pub fn serialize<S: Serializer>(mask: &CategoryMask, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(mask)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<CategoryMask, D::Error> {
        match Raw::deserialize(d)? {
            Raw::Bits(bits) => Ok(CategoryMask::from_bits(bits)),
            Raw::Text(text) => text.parse().map_err(de::Error::custom),
        }
    }
}
