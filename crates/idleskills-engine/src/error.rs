//! Error types for the engine binary.
//!
//! [`EngineError`] is the top-level error type that wraps all possible
//! failure modes during startup and the autoplay run.

/// Top-level error for the engine binary.
///
/// Each variant wraps a specific subsystem error, providing a single
/// error type that `main` can propagate with `?`.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: idleskills_core::config::ConfigError,
    },

    /// The prestige gate could not be initialized.
    #[error("prestige error: {source}")]
    Prestige {
        /// The underlying prestige error.
        #[from]
        source: idleskills_core::prestige::PrestigeError,
    },

    /// A facade command failed.
    #[error("facade error: {source}")]
    Facade {
        /// The underlying facade error.
        #[from]
        source: idleskills_core::facade::FacadeError,
    },

    /// Waiting for the interrupt signal failed.
    #[error("signal error: {source}")]
    Signal {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },
}
