//! Error types for coop operations.

use std::path::PathBuf;

use crate::time_sync::TimeError;

/// Alias for `Result<T, coop::Error>`.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by link, session and configuration operations.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// The channel failed to read or write. Fatal to the current link.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// A command could not be turned into a frame. Nothing was written.
    #[error(transparent)]
    Protocol(#[from] coop_proto::ProtocolError),

    /// Listing or opening a serial port failed.
    #[error("serial port: {0}")]
    Serial(#[from] serialport::Error),

    /// A timestamp field was rejected.
    #[error(transparent)]
    Time(#[from] TimeError),

    /// The configuration file could not be parsed.
    #[error("{}: {source}", path.display())]
    Config {
        /// Path of the offending file.
        path: PathBuf,
        /// Parser diagnostics.
        source: toml::de::Error,
    },

    /// The receive thread panicked instead of returning.
    #[error("receive thread panicked")]
    ReceiverPanicked,
}
