//! Port resolution and the CLI's byte channel.

use std::io::{self, BufRead, IsTerminal, Read, Write};
use std::net::TcpStream;

use anyhow::{Context, Result, bail};
use coop::{ByteChannel, Config, PortEntry};
use serialport::SerialPort;
use tracing::info;

use crate::Globals;

/// An opened link to the controller.
pub(crate) enum Channel {
    /// Local serial device.
    Serial(Box<dyn SerialPort>),
    /// Serial-over-TCP bridge.
    Tcp(TcpStream),
}

impl Write for Channel {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Self::Serial(port) => port.write(buf),
            Self::Tcp(stream) => stream.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::Serial(port) => port.flush(),
            Self::Tcp(stream) => stream.flush(),
        }
    }
}

impl ByteChannel for Channel {
    type Reader = Box<dyn Read + Send>;

    fn try_clone_reader(&self) -> io::Result<Self::Reader> {
        Ok(match self {
            Self::Serial(port) => Box::new(port.try_clone_reader()?),
            Self::Tcp(stream) => Box::new(stream.try_clone()?),
        })
    }
}

/// Where the channel was resolved from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Target {
    /// Serial device by name.
    Serial(String),
    /// TCP bridge address.
    Tcp(String),
}

/// Picks the target from flags and config, without prompting.
///
/// Order: `--tcp`, `--port`, config port, then the hint (flag before
/// config) matched against `ports`.
pub(crate) fn resolve(globals: &Globals, config: &Config, ports: &[PortEntry]) -> Option<Target> {
    if let Some(addr) = &globals.tcp {
        return Some(Target::Tcp(addr.clone()));
    }
    if let Some(port) = globals.port.as_ref().or(config.serial.port.as_ref()) {
        return Some(Target::Serial(port.clone()));
    }
    let hint = globals.hint.as_deref().or(config.serial.hint.as_deref())?;
    match coop::find_by_hint(ports, hint) {
        Some(entry) => Some(Target::Serial(entry.name.clone())),
        None => {
            eprintln!("No serial port found for hint {hint}");
            None
        }
    }
}

/// Resolves and opens the channel, prompting for a port on a terminal.
pub(crate) fn open(globals: &Globals, config: &Config) -> Result<Channel> {
    let needs_ports = globals.tcp.is_none() && globals.port.is_none() && config.serial.port.is_none();
    let ports = if needs_ports {
        coop::list_ports().context("failed to list serial ports")?
    } else {
        Vec::new()
    };

    let target = match resolve(globals, config, &ports) {
        Some(target) => target,
        None if io::stdin().is_terminal() => {
            let stdin = io::stdin();
            let name = prompt_port(&mut stdin.lock(), &mut io::stdout(), &ports)?;
            Target::Serial(name)
        }
        None => bail!("no serial port configured; pass --port, --hint or --tcp"),
    };

    let baud = globals.baud.unwrap_or(config.serial.baud);
    match target {
        Target::Tcp(addr) => {
            let stream = coop::connect_tcp(addr.as_str())
                .with_context(|| format!("failed to connect to {addr}"))?;
            Ok(Channel::Tcp(stream))
        }
        Target::Serial(name) => {
            info!(port = %name, baud, "opening serial port");
            let port =
                coop::open_serial(&name, baud).with_context(|| format!("failed to open {name}"))?;
            Ok(Channel::Serial(port))
        }
    }
}

/// Prints `ports` one per line.
pub(crate) fn print_ports(out: &mut impl Write, ports: &[PortEntry]) -> io::Result<()> {
    for port in ports {
        if port.description.is_empty() {
            writeln!(out, "{}", port.name)?;
        } else {
            writeln!(out, "{}: {}", port.name, port.description)?;
        }
    }
    Ok(())
}

/// Asks for a port name until a listed one is given or the operator gives up.
pub(crate) fn prompt_port(
    input: &mut impl BufRead,
    out: &mut impl Write,
    ports: &[PortEntry],
) -> Result<String> {
    loop {
        write!(
            out,
            "Configuring serial port. Please enter a port (h to list ports): "
        )?;
        out.flush()?;
        let Some(line) = read_line(input)? else {
            bail!("no serial port given");
        };
        if line == "h" {
            print_ports(out, ports)?;
            continue;
        }
        if ports.iter().any(|p| p.name == line) {
            return Ok(line);
        }
        writeln!(out, "Serial port not in list of available serial ports. Try again? ([Y]/n)")?;
        out.flush()?;
        let answer = read_line(input)?.unwrap_or_default().to_lowercase();
        if !matches!(answer.as_str(), "" | "y" | "yes") {
            return Ok(line);
        }
    }
}

/// Reads one line without its terminator; `None` at end of input.
pub(crate) fn read_line(input: &mut impl BufRead) -> io::Result<Option<String>> {
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim_end_matches(['\r', '\n']).to_owned()))
}
