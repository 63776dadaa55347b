//! Interactive numbered-menu shell.

use std::io::{self, BufRead, Write};

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use coop::{Command, CommandKind, Field, PartialTimestamp, Session};

use crate::channel::read_line;

/// Prompt printed before every selection, and redrawn after each reply.
pub(crate) const PROMPT: &str = "Please specify a command. 'x' to exit, 'h' to display commands: ";

/// What the operator typed at the prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Selection {
    Exit,
    Help,
    Run(CommandKind),
    Invalid,
}

pub(crate) fn parse_selection(input: &str) -> Selection {
    match input.trim() {
        "x" => Selection::Exit,
        "h" => Selection::Help,
        code => code
            .parse::<u8>()
            .ok()
            .and_then(CommandKind::from_code)
            .map_or(Selection::Invalid, Selection::Run),
    }
}

pub(crate) fn write_menu(out: &mut impl Write) -> io::Result<()> {
    writeln!(out, "{}", "-".repeat(40))?;
    writeln!(out, "Commands:")?;
    for kind in CommandKind::ALL {
        let info = kind.info();
        writeln!(out, "{}: {}", info.code, info.label)?;
    }
    Ok(())
}

/// Prompts for each timestamp field; empty input keeps the field of `now`.
///
/// Returns `None` at end of input or when the fields form no valid date.
pub(crate) fn prompt_timestamp(
    input: &mut impl BufRead,
    out: &mut impl Write,
    now: NaiveDateTime,
) -> Result<Option<NaiveDateTime>> {
    let mut parts = PartialTimestamp::default();
    for field in Field::ALL {
        loop {
            write!(out, "Enter {field} [nothing for current {field}]: ")?;
            out.flush()?;
            let Some(line) = read_line(input)? else {
                return Ok(None);
            };
            match coop::parse_field(field, &line) {
                Ok(value) => {
                    parts.set(field, value);
                    break;
                }
                Err(e) => writeln!(out, "{e}")?,
            }
        }
    }
    match coop::build_timestamp(&parts, now) {
        Ok(ts) => Ok(Some(ts)),
        Err(e) => {
            writeln!(out, "{e}")?;
            Ok(None)
        }
    }
}

/// The interactive operator loop.
pub(crate) struct Shell<R, W> {
    input: R,
    out: W,
    session: Session,
}

impl<R: BufRead, W: Write> Shell<R, W> {
    pub(crate) const fn new(input: R, out: W, session: Session) -> Self {
        Self {
            input,
            out,
            session,
        }
    }

    /// Runs until `x` or end of input.
    ///
    /// Encoding errors are reported and the loop continues; channel errors
    /// end it.
    pub(crate) fn run(&mut self, mut send: impl FnMut(&Command) -> coop::Result<()>) -> Result<()> {
        write_menu(&mut self.out)?;
        loop {
            write!(self.out, "{PROMPT}")?;
            self.out.flush()?;
            let Some(line) = read_line(&mut self.input)? else {
                writeln!(self.out)?;
                break;
            };
            match parse_selection(&line) {
                Selection::Exit => break,
                Selection::Help => write_menu(&mut self.out)?,
                Selection::Invalid => writeln!(self.out, "Invalid command")?,
                Selection::Run(kind) => self.execute(kind, &mut send)?,
            }
        }
        writeln!(self.out, "Closing coop door client")?;
        Ok(())
    }

    fn execute(
        &mut self,
        kind: CommandKind,
        send: &mut impl FnMut(&Command) -> coop::Result<()>,
    ) -> Result<()> {
        let manual_time = if kind.needs_time() {
            let now = self.session.clock().now();
            match prompt_timestamp(&mut self.input, &mut self.out, now)? {
                Some(ts) => Some(ts),
                None => return Ok(()),
            }
        } else {
            None
        };
        let Some(intent) = kind.intent(manual_time) else {
            return Ok(());
        };

        let cmd = self.session.dispatch(intent);
        writeln!(self.out, "{}", coop::status_line(&cmd))?;
        if let Some(caveat) = self.session.caveat(&cmd) {
            writeln!(self.out, "Note: {caveat}")?;
        }

        match send(&cmd) {
            Ok(()) => Ok(()),
            Err(coop::Error::Protocol(e)) => {
                writeln!(self.out, "{e}")?;
                Ok(())
            }
            Err(e) => Err(e).context("failed to send command"),
        }
    }

    #[cfg(test)]
    fn into_output(self) -> W {
        self.out
    }
}
