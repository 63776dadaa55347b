//! Operator-facing command catalog.
//!
//! Every entry of the numbered menu is a [`CommandKind`] with a stable code
//! and a menu label. The status line printed when a command goes out comes
//! from [`status_line`](crate::status_line).

use chrono::NaiveDateTime;
use coop_proto::{Mode, MotorAction, Protection};

use crate::session::Intent;

/// Menu text attached to a [`CommandKind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandInfo {
    /// Stable menu code typed by the operator.
    pub code: u8,
    /// Menu line describing the command.
    pub label: &'static str,
}

/// A command the operator can pick from the menu.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    /// Ping the controller.
    Ping,
    /// Switch to manual control.
    ManualMode,
    /// Switch to normal control.
    NormalMode,
    /// Set the controller clock from the host clock.
    SyncTime,
    /// Stop the motor.
    StopMotor,
    /// Open the door, protected.
    OpenProtected,
    /// Close the door, protected.
    CloseProtected,
    /// Open the door, forced.
    OpenForce,
    /// Close the door, forced.
    CloseForce,
    /// Ask the controller for its clock reading.
    RequestTime,
    /// Set the controller clock to an operator-entered time.
    SetManualTime,
}

impl CommandKind {
    /// Every kind, ordered by menu code.
    pub const ALL: [Self; 11] = [
        Self::Ping,
        Self::ManualMode,
        Self::NormalMode,
        Self::SyncTime,
        Self::StopMotor,
        Self::OpenProtected,
        Self::CloseProtected,
        Self::OpenForce,
        Self::CloseForce,
        Self::RequestTime,
        Self::SetManualTime,
    ];

    /// Menu text for this kind.
    pub const fn info(self) -> CommandInfo {
        let (code, label) = match self {
            Self::Ping => (1, "Send ping to controller"),
            Self::ManualMode => (2, "Switch to manual control mode"),
            Self::NormalMode => (3, "Switch to normal control mode"),
            Self::SyncTime => (4, "Update the controller time with the current time"),
            Self::StopMotor => (5, "Stop the motor"),
            Self::OpenProtected => (
                6,
                "Motor control open in protected mode. Only works in manual mode",
            ),
            Self::CloseProtected => (
                7,
                "Motor control close in protected mode. Only works in manual mode",
            ),
            Self::OpenForce => (
                8,
                "Motor control open in forced mode. Only works in manual mode",
            ),
            Self::CloseForce => (
                9,
                "Motor control close in forced mode. Only works in manual mode",
            ),
            Self::RequestTime => (12, "Print current RTC time"),
            Self::SetManualTime => (31, "Set the controller time manually"),
        };
        CommandInfo { code, label }
    }

    /// Stable menu code.
    pub const fn code(self) -> u8 {
        self.info().code
    }

    /// Looks up a kind by menu code.
    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.code() == code)
    }

    /// Whether the kind needs an operator-supplied timestamp.
    pub const fn needs_time(self) -> bool {
        matches!(self, Self::SetManualTime)
    }

    /// Builds the intent for this kind.
    ///
    /// Returns `None` for [`CommandKind::SetManualTime`] without a timestamp.
    pub fn intent(self, manual_time: Option<NaiveDateTime>) -> Option<Intent> {
        let motor = |protection, action| Intent::Motor { protection, action };
        Some(match self {
            Self::Ping => Intent::Ping,
            Self::ManualMode => Intent::SwitchMode(Mode::Manual),
            Self::NormalMode => Intent::SwitchMode(Mode::Normal),
            Self::SyncTime => Intent::SyncTime,
            Self::StopMotor => motor(Protection::Force, MotorAction::Stop),
            Self::OpenProtected => motor(Protection::Protected, MotorAction::Open),
            Self::CloseProtected => motor(Protection::Protected, MotorAction::Close),
            Self::OpenForce => motor(Protection::Force, MotorAction::Open),
            Self::CloseForce => motor(Protection::Force, MotorAction::Close),
            Self::RequestTime => Intent::RequestTime,
            Self::SetManualTime => match manual_time {
                Some(timestamp) => Intent::SetTime(timestamp),
                None => return None,
            },
        })
    }
}
