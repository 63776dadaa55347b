//! Protocol error types.

use thiserror::Error;

/// Errors that can occur when building a frame.
///
/// Decoding never fails: lines that do not validate are returned as
/// [`Reply::Malformed`](crate::Reply::Malformed) or
/// [`Reply::Unrecognized`](crate::Reply::Unrecognized).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ProtocolError {
    /// A command field cannot be represented on the wire.
    #[error("command cannot be encoded: {reason}")]
    EncodingNotApplicable {
        /// What made the command unencodable.
        reason: String,
    },
}
