//! Frame encoding for commands and frame classification for replies.
//!
//! ```text
//! Ping         CC\n
//! SetMode      CC C {M|N} \n
//! MotorControl CC M {P|F} {O|C|S} \n
//! SetTime      CC T YYYY-MM-DDTHH:MM:SSZ \n
//! RequestTime  CC R T \n
//! ```

use bytes::BufMut;
use chrono::{Datelike, NaiveDateTime};

use crate::error::ProtocolError;
use crate::message::{Command, Mode, MotorAction, Protection, Reply};

/// Sync marker that starts every frame.
pub const SYNC: &[u8; 2] = b"CC";
/// Frame terminator.
pub const TERMINATOR: u8 = b'\n';

/// Type byte of a mode switch.
pub const TYPE_MODE: u8 = b'C';
/// Type byte of a motor control frame.
pub const TYPE_MOTOR: u8 = b'M';
/// Type byte of a time-set frame.
pub const TYPE_TIME: u8 = b'T';
/// Type byte of a request frame (and of the reply answering it).
pub const TYPE_REQUEST: u8 = b'R';
/// Request sub-type for the real-time clock.
pub const SUBTYPE_TIME: u8 = b'T';

/// Mode payload: manual control.
pub const MODE_MANUAL: u8 = b'M';
/// Mode payload: normal control.
pub const MODE_NORMAL: u8 = b'N';

/// Motor payload: protected actuation.
pub const PROTECTION_PROTECTED: u8 = b'P';
/// Motor payload: forced actuation.
pub const PROTECTION_FORCE: u8 = b'F';

/// Motor payload: open.
pub const ACTION_OPEN: u8 = b'O';
/// Motor payload: close.
pub const ACTION_CLOSE: u8 = b'C';
/// Motor payload: stop.
pub const ACTION_STOP: u8 = b'S';

/// CCSDS ASCII Time Code A without fractional seconds.
pub const TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Length of a rendered [`TIME_FORMAT`] timestamp.
const TIME_LEN: usize = 20;

/// Encodes `cmd` into a complete frame, terminator included.
///
/// Fails only for a [`Command::SetTime`] whose year does not fit the
/// four-digit time code.
pub fn encode(cmd: &Command) -> Result<Vec<u8>, ProtocolError> {
    let mut buf = Vec::with_capacity(SYNC.len() + 2 + TIME_LEN + 1);
    buf.put_slice(SYNC);
    match cmd {
        Command::Ping => {}
        Command::SetMode { mode } => {
            buf.put_u8(TYPE_MODE);
            buf.put_u8(mode_byte(*mode));
        }
        Command::MotorControl { protection, action } => {
            buf.put_u8(TYPE_MOTOR);
            buf.put_u8(protection_byte(*protection));
            buf.put_u8(action_byte(*action));
        }
        Command::SetTime { timestamp } => {
            if !(0..=9999).contains(&timestamp.year()) {
                return Err(ProtocolError::EncodingNotApplicable {
                    reason: format!("year {} does not fit the time code", timestamp.year()),
                });
            }
            buf.put_u8(TYPE_TIME);
            buf.put_slice(format_time(timestamp).as_bytes());
        }
        Command::RequestTime => {
            buf.put_u8(TYPE_REQUEST);
            buf.put_u8(SUBTYPE_TIME);
        }
    }
    buf.put_u8(TERMINATOR);
    Ok(buf)
}

/// Classifies one reply line. The terminator must already be stripped.
///
/// Total: truncated or binary input never fails, it maps to
/// [`Reply::Malformed`] or [`Reply::Unrecognized`].
pub fn decode(line: &[u8]) -> Reply {
    let Some(rest) = line.strip_prefix(SYNC.as_slice()) else {
        return Reply::Malformed { raw: line.to_vec() };
    };
    match rest {
        [] => Reply::PingAck,
        [TYPE_REQUEST, SUBTYPE_TIME, text @ ..] => Reply::TimeReport {
            text: String::from_utf8_lossy(text).into_owned(),
        },
        _ => Reply::Unrecognized { raw: line.to_vec() },
    }
}

/// Renders a timestamp as the wire time code.
fn format_time(timestamp: &NaiveDateTime) -> String {
    timestamp.format(TIME_FORMAT).to_string()
}

const fn mode_byte(mode: Mode) -> u8 {
    match mode {
        Mode::Manual => MODE_MANUAL,
        Mode::Normal => MODE_NORMAL,
    }
}

const fn protection_byte(protection: Protection) -> u8 {
    match protection {
        Protection::Protected => PROTECTION_PROTECTED,
        Protection::Force => PROTECTION_FORCE,
    }
}

const fn action_byte(action: MotorAction) -> u8 {
    match action {
        MotorAction::Open => ACTION_OPEN,
        MotorAction::Close => ACTION_CLOSE,
        MotorAction::Stop => ACTION_STOP,
    }
}
