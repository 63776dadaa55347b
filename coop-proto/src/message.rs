//! Protocol message types for host↔controller communication.

use chrono::NaiveDateTime;
use serde::{Serialize, Serializer};

/// Control mode of the door controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    /// The operator drives the motor directly.
    Manual,
    /// The controller opens and closes the door on its own schedule.
    Normal,
}

/// Safety level used for a motor action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Protection {
    /// The controller consults the door position switches.
    Protected,
    /// The controller drives the motor regardless of door position.
    Force,
}

/// Motor action requested from the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MotorAction {
    /// Open the door.
    Open,
    /// Close the door.
    Close,
    /// Stop the motor.
    Stop,
}

/// Command sent from host to controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Liveness check; the controller answers with [`Reply::PingAck`].
    Ping,
    /// Switch the controller's control mode.
    SetMode {
        /// Target mode.
        mode: Mode,
    },
    /// Drive the door motor. Only honored by the controller in manual mode.
    MotorControl {
        /// Safety level.
        protection: Protection,
        /// Requested action.
        action: MotorAction,
    },
    /// Set the controller's real-time clock.
    SetTime {
        /// Wall-clock time to set. Sub-second precision is dropped.
        timestamp: NaiveDateTime,
    },
    /// Ask the controller for its current clock reading.
    RequestTime,
}

/// Reply sent from controller to host, decoded from one line.
///
/// Every byte sequence maps to exactly one variant, see [`crate::decode`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Reply {
    /// Answer to [`Command::Ping`].
    PingAck,
    /// Answer to [`Command::RequestTime`].
    TimeReport {
        /// Timestamp text exactly as the controller sent it.
        text: String,
    },
    /// Starts with the sync marker but has no known type.
    Unrecognized {
        /// The whole line, terminator stripped.
        #[serde(serialize_with = "lossy")]
        raw: Vec<u8>,
    },
    /// Does not start with the sync marker, or is longer than
    /// [`MAX_LINE_LEN`](crate::MAX_LINE_LEN).
    Malformed {
        /// The line, terminator stripped. Overlong lines keep their prefix.
        #[serde(serialize_with = "lossy")]
        raw: Vec<u8>,
    },
}

impl Reply {
    /// Whether the line failed frame validation or classification.
    pub const fn is_mismatch(&self) -> bool {
        matches!(self, Self::Unrecognized { .. } | Self::Malformed { .. })
    }
}

/// Serializes raw line bytes as text, replacing invalid UTF-8.
fn lossy<T: AsRef<[u8]>, S: Serializer>(raw: &T, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&String::from_utf8_lossy(raw.as_ref()))
}
