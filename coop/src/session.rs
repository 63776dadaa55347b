//! Host-side command state.
//!
//! The controller is the source of truth for its control mode and silently
//! ignores commands that do not apply to it. The host only keeps a belief
//! about the mode so it can warn the operator; it never blocks a command.

use chrono::NaiveDateTime;
use coop_proto::{Command, Mode, MotorAction, Protection};

use crate::time_sync::{self, Clock};

/// Something the operator wants the controller to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    /// Check that the controller answers.
    Ping,
    /// Switch the control mode.
    SwitchMode(Mode),
    /// Drive the door motor.
    Motor {
        /// Safety level.
        protection: Protection,
        /// Requested action.
        action: MotorAction,
    },
    /// Set the controller clock from the session clock.
    SyncTime,
    /// Set the controller clock to the given time.
    SetTime(NaiveDateTime),
    /// Read the controller clock.
    RequestTime,
}

/// Command state owned by the operator loop.
#[derive(Debug, Default)]
pub struct Session {
    /// Believed control mode, `None` until a mode switch is dispatched.
    mode: Option<Mode>,
    /// Clock read by [`Intent::SyncTime`].
    clock: Clock,
}

impl Session {
    /// Creates a session with an unknown mode.
    pub fn new(clock: Clock) -> Self {
        Self { mode: None, clock }
    }

    /// Believed control mode of the controller.
    pub const fn mode(&self) -> Option<Mode> {
        self.mode
    }

    /// Clock used for time synchronization.
    pub const fn clock(&self) -> &Clock {
        &self.clock
    }

    /// Translates `intent` into a command.
    ///
    /// A mode switch updates the believed mode right away; nothing is
    /// rejected because of the believed mode.
    pub fn dispatch(&mut self, intent: Intent) -> Command {
        match intent {
            Intent::Ping => Command::Ping,
            Intent::SwitchMode(mode) => {
                self.mode = Some(mode);
                Command::SetMode { mode }
            }
            Intent::Motor { protection, action } => Command::MotorControl { protection, action },
            Intent::SyncTime => time_sync::sync_now(&self.clock),
            Intent::SetTime(timestamp) => time_sync::set_time(timestamp),
            Intent::RequestTime => Command::RequestTime,
        }
    }

    /// Advisory text for a command that may not apply in the believed mode.
    pub fn caveat(&self, cmd: &Command) -> Option<&'static str> {
        match (cmd, self.mode) {
            (Command::MotorControl { .. }, Some(Mode::Manual)) => None,
            (Command::MotorControl { .. }, Some(Mode::Normal)) => {
                Some("the controller is in normal mode, motor control only works in manual mode")
            }
            (Command::MotorControl { .. }, None) => Some("motor control only works in manual mode"),
            _ => None,
        }
    }

    /// Short name of the believed mode.
    pub const fn mode_label(&self) -> &'static str {
        match self.mode {
            Some(Mode::Manual) => "manual",
            Some(Mode::Normal) => "normal",
            None => "unknown",
        }
    }
}

/// Operator status line announcing `cmd`.
pub fn status_line(cmd: &Command) -> String {
    let protection = |p: &Protection| match p {
        Protection::Protected => "protected",
        Protection::Force => "forced",
    };
    match cmd {
        Command::Ping => "Sending ping to controller".into(),
        Command::SetMode { mode: Mode::Manual } => {
            "Sending command to switch to manual motor control".into()
        }
        Command::SetMode { mode: Mode::Normal } => {
            "Sending command to switch to normal motor control".into()
        }
        Command::MotorControl {
            action: MotorAction::Stop,
            ..
        } => "Stopping motor".into(),
        Command::MotorControl {
            protection: p,
            action: MotorAction::Open,
        } => format!("Opening door in {} mode", protection(p)),
        Command::MotorControl {
            protection: p,
            action: MotorAction::Close,
        } => format!("Closing door in {} mode", protection(p)),
        Command::SetTime { timestamp } => {
            format!("Setting time in controller: {}", timestamp.format("%Y-%m-%d %H:%M:%S"))
        }
        Command::RequestTime => "Requesting current time".into(),
    }
}
