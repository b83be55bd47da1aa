use std::path::PathBuf;

use thiserror::Error;

use paperz_conductor::ConductorError;
use paperz_core::config::ConfigError;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Conductor(#[from] ConductorError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("app {0} is not installed")]
    AppNotInstalled(String),

    #[error("app {0} has no cells")]
    NoCells(String),

    #[error("read {path}: {source}")]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
