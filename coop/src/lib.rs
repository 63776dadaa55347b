//! Host-side link to the coop door controller.
//!
//! `coop` drives a chicken-coop door controller over a serial line (or a
//! serial-over-TCP bridge). Commands are fire-and-forget; replies arrive on
//! a background receive thread and are handed to a [`ReplySink`].
//!
//! # Quick start
//!
//! ```no_run
//! use coop::{Clock, Intent, Link, Session};
//!
//! let port = coop::open_serial("/dev/ttyUSB0", coop::DEFAULT_BAUD)?;
//! let mut link = Link::start(port, |reply: coop::Reply| println!("{reply:?}"))?;
//!
//! let mut session = Session::new(Clock::Utc);
//! link.send(&session.dispatch(Intent::Ping))?;
//! link.send(&session.dispatch(Intent::SyncTime))?;
//! # Ok::<(), coop::Error>(())
//! ```

mod catalog;
mod config;
mod error;
mod link;
mod serial;
mod session;
mod time_sync;

pub use catalog::{CommandInfo, CommandKind};
pub use config::{ClockConfig, Config, SerialConfig};
pub use coop_proto::{Command, Mode, MotorAction, Protection, Reply};
pub use error::{Error, Result};
pub use link::{ByteChannel, ExitCause, Link, ReceiveExit, ReplySink, receive_loop};
pub use serial::{DEFAULT_BAUD, PortEntry, connect_tcp, find_by_hint, list_ports, open_serial};
pub use session::{Intent, Session, status_line};
pub use time_sync::{
    Clock, Field, PartialTimestamp, TimeError, build_timestamp, parse_field, parse_timestamp,
    set_time, sync_now,
};
