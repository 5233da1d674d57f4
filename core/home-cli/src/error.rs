use std::path::PathBuf;

use home_core::HomeError;

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error(transparent)]
    Home(#[from] HomeError),

    #[error("Vault directory not found: {}", .0.display())]
    VaultNotFound(PathBuf),

    #[error("Home path must not be empty")]
    EmptyHome,

    #[error("Failed to read layout file: {source}")]
    LayoutRead {
        #[source]
        source: std::io::Error,
    },

    #[error("Layout file malformed: {}: {source}", .path.display())]
    LayoutMalformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to write output: {0}")]
    Output(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, CliError>;
