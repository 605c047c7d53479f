use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::compiler::CompilerOptions;

const DEFAULT_COMPACTION_INTERVAL: u64 = 100;
const DEFAULT_MAX_CALL_DEPTH: usize = 256;

/// Compiled-unit cache configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Every n-th registration sweeps entries whose unit has been dropped
    pub compaction_interval: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            compaction_interval: DEFAULT_COMPACTION_INTERVAL,
        }
    }
}

impl CacheConfig {
    pub fn new(compaction_interval: u64) -> Self {
        Self {
            compaction_interval: compaction_interval.max(1),
        }
    }

    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("RAPTOR_CACHE_COMPACTION_INTERVAL") {
            config.compaction_interval = val
                .parse()
                .unwrap_or(DEFAULT_COMPACTION_INTERVAL)
                .max(1);
        }

        config
    }

    /// Interval with zero clamped to one, for configs built by deserialization.
    pub fn effective_interval(&self) -> u64 {
        self.compaction_interval.max(1)
    }
}

/// Interpreter configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Calls nested deeper than this fail with a RangeError
    pub max_call_depth: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
        }
    }
}

impl RuntimeConfig {
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("RAPTOR_MAX_CALL_DEPTH") {
            config.max_call_depth = val.parse().unwrap_or(DEFAULT_MAX_CALL_DEPTH);
        }

        config
    }
}

/// Complete engine configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub compiler: CompilerOptions,
    pub cache: CacheConfig,
    pub runtime: RuntimeConfig,
}

impl EngineConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self {
            compiler: CompilerOptions::from_env(),
            cache: CacheConfig::from_env(),
            runtime: RuntimeConfig::from_env(),
        }
    }

    /// Load configuration from TOML file
    #[cfg(feature = "toml-config")]
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        use anyhow::Context;

        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let config: EngineConfig = toml::from_str(&contents)
            .with_context(|| format!("failed to parse config {}", path.display()))?;
        Ok(config)
    }

    /// Load configuration from TOML file (stub when toml feature is disabled)
    #[cfg(not(feature = "toml-config"))]
    pub fn from_file(_path: &Path) -> anyhow::Result<Self> {
        anyhow::bail!("TOML support not enabled. Enable the 'toml-config' feature.")
    }

    /// Save configuration to TOML file
    #[cfg(feature = "toml-config")]
    pub fn save_to_file(&self, path: &Path) -> anyhow::Result<()> {
        let contents = toml::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Save configuration to TOML file (stub when toml feature is disabled)
    #[cfg(not(feature = "toml-config"))]
    pub fn save_to_file(&self, _path: &Path) -> anyhow::Result<()> {
        anyhow::bail!("TOML support not enabled. Enable the 'toml-config' feature.")
    }

    /// Merge with environment variables (env vars take precedence)
    pub fn merge_with_env(mut self) -> Self {
        let env_config = Self::from_env();

        if std::env::var("RAPTOR_STRICT").is_ok() {
            self.compiler.force_strict_mode = env_config.compiler.force_strict_mode;
        }
        if std::env::var("RAPTOR_DEBUG").is_ok() {
            self.compiler.enable_debugging = env_config.compiler.enable_debugging;
        }
        if std::env::var("RAPTOR_DISASSEMBLE").is_ok() {
            self.compiler.enable_disassembly = env_config.compiler.enable_disassembly;
        }
        if std::env::var("RAPTOR_CACHE_COMPACTION_INTERVAL").is_ok() {
            self.cache = env_config.cache;
        }
        if std::env::var("RAPTOR_MAX_CALL_DEPTH").is_ok() {
            self.runtime = env_config.runtime;
        }

        self
    }

    /// Convenience for turning on debugging without touching the rest.
    pub fn with_debugging(mut self, enabled: bool) -> Self {
        self.compiler.enable_debugging = enabled;
        self
    }

    pub fn with_disassembly(mut self, enabled: bool) -> Self {
        self.compiler.enable_disassembly = enabled;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.cache.compaction_interval, 100);
        assert_eq!(config.runtime.max_call_depth, 256);
        assert!(!config.compiler.enable_debugging);
    }

    #[test]
    fn test_zero_interval_is_clamped() {
        assert_eq!(CacheConfig::new(0).compaction_interval, 1);
        let config = CacheConfig {
            compaction_interval: 0,
        };
        assert_eq!(config.effective_interval(), 1);
    }

    #[test]
    #[cfg(feature = "toml-config")]
    fn test_config_file_round_trip() {
        let dir = std::env::temp_dir().join(format!("raptor-config-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("raptor.toml");

        let config = EngineConfig::default().with_debugging(true);
        config.save_to_file(&path).unwrap();
        let loaded = EngineConfig::from_file(&path).unwrap();
        assert_eq!(config, loaded);

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    #[cfg(not(feature = "toml-config"))]
    fn test_config_file_requires_feature() {
        let err = EngineConfig::from_file(Path::new("raptor.toml")).unwrap_err();
        assert!(err.to_string().contains("toml-config"));
    }
}
