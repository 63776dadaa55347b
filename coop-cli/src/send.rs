//! One-shot `send` and `listen` subcommands.

use std::thread;
use std::time::Duration;

use anyhow::{Result, bail};
use chrono::NaiveDateTime;
use clap::{Args, Subcommand};
use coop::{ExitCause, Intent, Link, Mode, MotorAction, Protection, Reply, Session};
use tracing::warn;

use crate::channel::Channel;
use crate::display::{self, OutputFormat};

#[derive(Args)]
pub(crate) struct SendArgs {
    #[command(subcommand)]
    what: SendCommand,

    /// Seconds to keep printing replies after sending.
    #[arg(long, global = true, default_value_t = 2, value_name = "SECS")]
    wait: u64,
}

#[derive(Subcommand)]
enum SendCommand {
    /// Check that the controller answers.
    Ping,
    /// Switch to manual control mode.
    Manual,
    /// Switch to normal control mode.
    Normal,
    /// Set the controller clock from the host clock.
    SyncTime,
    /// Set the controller clock to a given time.
    SetTime {
        /// Time to set, `YYYY-MM-DDTHH:MM:SS`.
        #[arg(long, value_parser = parse_at)]
        at: NaiveDateTime,
    },
    /// Open the door. Only works in manual mode.
    Open {
        /// Ignore the end switches.
        #[arg(long)]
        force: bool,
    },
    /// Close the door. Only works in manual mode.
    Close {
        /// Ignore the end switches.
        #[arg(long)]
        force: bool,
    },
    /// Stop the motor.
    Stop,
    /// Ask the controller for its clock reading.
    Time,
}

fn parse_at(input: &str) -> Result<NaiveDateTime, coop::TimeError> {
    coop::parse_timestamp(input)
}

const fn protection(force: bool) -> Protection {
    if force {
        Protection::Force
    } else {
        Protection::Protected
    }
}

impl SendCommand {
    const fn intent(&self) -> Intent {
        match *self {
            Self::Ping => Intent::Ping,
            Self::Manual => Intent::SwitchMode(Mode::Manual),
            Self::Normal => Intent::SwitchMode(Mode::Normal),
            Self::SyncTime => Intent::SyncTime,
            Self::SetTime { at } => Intent::SetTime(at),
            Self::Open { force } => Intent::Motor {
                protection: protection(force),
                action: MotorAction::Open,
            },
            Self::Close { force } => Intent::Motor {
                protection: protection(force),
                action: MotorAction::Close,
            },
            Self::Stop => Intent::Motor {
                protection: Protection::Force,
                action: MotorAction::Stop,
            },
            Self::Time => Intent::RequestTime,
        }
    }
}

/// Sends one command, then prints replies for `--wait` seconds.
pub(crate) fn send(args: &SendArgs, channel: Channel, mut session: Session) -> Result<()> {
    let mut link = Link::start(channel, |reply: Reply| println!("{}", display::describe(&reply)))?;

    let cmd = session.dispatch(args.what.intent());
    println!("{}", coop::status_line(&cmd));
    if let Some(caveat) = session.caveat(&cmd) {
        eprintln!("note: {caveat}");
    }
    link.send(&cmd)?;

    thread::sleep(Duration::from_secs(args.wait));
    Ok(())
}

/// Prints replies until the channel closes.
pub(crate) fn listen(channel: Channel, format: OutputFormat) -> Result<()> {
    let link = Link::start(channel, move |reply: Reply| {
        match display::render(&reply, format) {
            Ok(line) => println!("{line}"),
            Err(e) => warn!(error = %e, "failed to render reply"),
        }
    })?;

    let exit = link.join()?;
    match exit.cause {
        ExitCause::Failed(e) => bail!("channel failed after {} replies: {e}", exit.delivered),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    #[derive(Parser)]
    struct Harness {
        #[command(subcommand)]
        what: SendCommand,
    }

    fn intent(args: &[&str]) -> Intent {
        let argv = std::iter::once("send").chain(args.iter().copied());
        Harness::try_parse_from(argv).unwrap().what.intent()
    }

    #[test]
    fn maps_subcommands_to_intents() {
        assert_eq!(intent(&["ping"]), Intent::Ping);
        assert_eq!(intent(&["manual"]), Intent::SwitchMode(Mode::Manual));
        assert_eq!(intent(&["time"]), Intent::RequestTime);
        assert_eq!(
            intent(&["open"]),
            Intent::Motor {
                protection: Protection::Protected,
                action: MotorAction::Open,
            }
        );
        assert_eq!(
            intent(&["close", "--force"]),
            Intent::Motor {
                protection: Protection::Force,
                action: MotorAction::Close,
            }
        );
        assert_eq!(
            intent(&["stop"]),
            Intent::Motor {
                protection: Protection::Force,
                action: MotorAction::Stop,
            }
        );
    }

    #[test]
    fn set_time_parses_timestamp() {
        let Intent::SetTime(ts) = intent(&["set-time", "--at", "2024-06-01T05:30:00Z"]) else {
            panic!("expected a set-time intent");
        };
        assert_eq!(ts.to_string(), "2024-06-01 05:30:00");
    }

    #[test]
    fn set_time_rejects_garbage() {
        let argv = ["send", "set-time", "--at", "tomorrow"];
        assert!(Harness::try_parse_from(argv).is_err());
    }
}
