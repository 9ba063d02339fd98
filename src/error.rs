use thiserror::Error;

/// Result alias for `vosnet`.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by network construction and the clustering/layout drivers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// A network integrity check failed at construction.
    #[error("invalid network: {0}")]
    InvalidNetwork(String),

    /// A configuration value is outside its admissible range.
    #[error("invalid parameter `{name}`: {message}")]
    InvalidParameter {
        /// Parameter name.
        name: &'static str,
        /// What went wrong.
        message: &'static str,
    },

    /// A driver was run before a network was provided.
    #[error("no network has been provided")]
    Uninitialized,
}
