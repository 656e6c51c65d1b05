use cairn_blocks::RegistryError;
use cairn_world::WorldGenError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config toml: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config value `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
    #[error(transparent)]
    WorldGen(#[from] WorldGenError),
}

/// Failures while assembling a [`crate::WorldContext`].
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    WorldGen(#[from] WorldGenError),
    #[error("failed to start {pool} worker pool: {source}")]
    Pool {
        pool: &'static str,
        #[source]
        source: rayon::ThreadPoolBuildError,
    },
}
