//! Wire protocol for the coop door controller.
//!
//! Frames are newline-terminated ASCII lines starting with the sync marker
//! `CC`, suitable for any ordered byte stream (UART, USB CDC, TCP bridge).
//!
//! ```text
//! +----+------+-----------------+----+
//! | CC | type | payload         | \n |
//! +----+------+-----------------+----+
//! ```
//!
//! Commands flow host → controller and replies flow controller → host; the
//! two directions use different shapes, so a command never decodes back
//! into itself.

mod codec;
mod error;
mod line;
mod message;

pub use codec::{
    ACTION_CLOSE, ACTION_OPEN, ACTION_STOP, MODE_MANUAL, MODE_NORMAL, PROTECTION_FORCE,
    PROTECTION_PROTECTED, SUBTYPE_TIME, SYNC, TERMINATOR, TIME_FORMAT, TYPE_MODE, TYPE_MOTOR,
    TYPE_REQUEST, TYPE_TIME, decode, encode,
};
pub use error::ProtocolError;
pub use line::{Line, LineBuffer, MAX_LINE_LEN};
pub use message::{Command, Mode, MotorAction, Protection, Reply};
