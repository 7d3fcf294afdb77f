//! Error types for anycalc
//!
//! Nothing in the query path surfaces these to the end user; they are
//! reported by lifecycle, configuration and definition loading code.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur in anycalc
#[derive(Debug, Error)]
pub enum CalcError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// A unit or currency definition table could not be parsed
    #[error("Definition error in {path}:{line}: {message}")]
    Definition {
        path: PathBuf,
        line: usize,
        message: String,
    },

    /// The units service was used in a state that does not allow it
    #[error("Lifecycle error: {0}")]
    Lifecycle(String),

    /// Currency rate provider errors
    #[error("Provider error: {0}")]
    Provider(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing errors
    #[error("Config parse error: {0}")]
    TomlParse(#[from] toml::de::Error),
}

/// Result type alias for anycalc operations
pub type CalcResult<T> = Result<T, CalcError>;
