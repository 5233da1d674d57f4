//! Error types for home-core operations.
//! Reconciliation results are `Outcome` values; these enums cover everything else.

use std::path::PathBuf;

use crate::layout::TabId;

// ═══════════════════════════════════════════════════════════════════════════════
// Host Tab Errors
// ═══════════════════════════════════════════════════════════════════════════════

/// Failures reported by the host while manipulating the tab layout.
///
/// All of these are recoverable from the engine's point of view: the attempt
/// that hit one cleans up after itself and reports `Outcome::Failed`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TabError {
    #[error("Tab {0} no longer exists")]
    TabGone(TabId),

    #[error("Host rejected tab operation: {operation}: {details}")]
    Rejected { operation: String, details: String },

    #[error("Command not found: {0}")]
    CommandNotFound(String),
}

impl TabError {
    pub fn rejected(operation: &str, details: impl Into<String>) -> Self {
        TabError::Rejected {
            operation: operation.to_string(),
            details: details.into(),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Provider Errors
// ═══════════════════════════════════════════════════════════════════════════════

/// Failures from external periodic-note, journal and layout providers.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("Provider is not enabled: {0}")]
    Disabled(String),

    #[error("Unknown {kind}: {name}")]
    NotFound { kind: &'static str, name: String },

    #[error("Provider I/O error: {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

// ═══════════════════════════════════════════════════════════════════════════════
// Engine Errors
// ═══════════════════════════════════════════════════════════════════════════════

/// All errors that can occur in home-core operations outside of reconciliation.
#[derive(Debug, thiserror::Error)]
pub enum HomeError {
    // ─────────────────────────────────────────────────────────────────────
    // Configuration Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("Could not determine a settings directory")]
    SettingsDirNotFound,

    #[error("Settings file malformed: {path}: {source}")]
    SettingsMalformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("I/O error: {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON serialization error: {context}: {source}")]
    Json {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    // ─────────────────────────────────────────────────────────────────────
    // Command Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("No focused resource to use as home")]
    NoFocusedResource,

    #[error("Unsupported resource kind: {0}")]
    UnsupportedResource(String),

    #[error(transparent)]
    Tab(#[from] TabError),
}

/// Convenience type alias for Results using HomeError.
pub type Result<T> = std::result::Result<T, HomeError>;
