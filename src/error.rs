//! Error types for macro resolution
//!
//! Missing data is never an error: an unresolvable macro becomes
//! [`UNRESOLVED_MACRO_STRING`](monitor_types::UNRESOLVED_MACRO_STRING). The
//! variants here cover caller mistakes and failures of the backing store.

use thiserror::Error;

use crate::registry::{Handler, MacroFamily};

/// Main error type for resolve calls
#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("Unknown scenario '{0}'")]
    UnknownScenario(String),

    #[error("Scenario '{scenario}' enables family '{family}' which handler '{handler}' cannot resolve")]
    UnsupportedFamily {
        scenario: String,
        family: MacroFamily,
        handler: Handler,
    },

    #[error("Scenario '{0}' declares no source field")]
    MissingSource(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Failures reported by store collaborators
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Backend unavailable: {0}")]
    Unavailable(String),

    #[error("Invalid row: {0}")]
    InvalidRow(String),

    #[cfg(feature = "database")]
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type Result<T> = std::result::Result<T, ResolveError>;
