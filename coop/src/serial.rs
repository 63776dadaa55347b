//! Channel acquisition: serial ports and serial-over-TCP bridges.

use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use serialport::{DataBits, FlowControl, Parity, SerialPort, SerialPortType, StopBits};
use tracing::{debug, info};

use crate::Result;

/// Default line speed of the controller.
pub const DEFAULT_BAUD: u32 = 115_200;

/// Read poll interval of an opened serial port.
const POLL_TIMEOUT: Duration = Duration::from_secs(1);

/// A serial port found on the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortEntry {
    /// Device name, e.g. `/dev/ttyUSB0` or `COM3`.
    pub name: String,
    /// Human-readable description, empty when the driver reports none.
    pub description: String,
}

impl PortEntry {
    /// Creates an entry.
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
        }
    }
}

/// Builds a description from what the driver reports about the port.
fn describe(kind: &SerialPortType) -> String {
    match kind {
        SerialPortType::UsbPort(usb) => {
            let mut parts = Vec::new();
            parts.extend(usb.manufacturer.as_deref());
            parts.extend(usb.product.as_deref());
            if parts.is_empty() {
                format!("USB {:04x}:{:04x}", usb.vid, usb.pid)
            } else {
                parts.join(" ")
            }
        }
        SerialPortType::PciPort => "PCI serial port".into(),
        SerialPortType::BluetoothPort => "Bluetooth serial port".into(),
        SerialPortType::Unknown => String::new(),
    }
}

/// Lists serial ports present on the host, sorted by name.
pub fn list_ports() -> Result<Vec<PortEntry>> {
    let mut ports: Vec<PortEntry> = serialport::available_ports()?
        .into_iter()
        .map(|info| PortEntry::new(info.port_name, describe(&info.port_type)))
        .collect();
    ports.sort_by(|a, b| a.name.cmp(&b.name));
    debug!(count = ports.len(), "serial ports listed");
    Ok(ports)
}

/// Returns the first port whose description contains `hint`.
///
/// An empty hint matches nothing.
pub fn find_by_hint<'a>(ports: &'a [PortEntry], hint: &str) -> Option<&'a PortEntry> {
    if hint.is_empty() {
        return None;
    }
    ports.iter().find(|p| p.description.contains(hint))
}

/// Opens a serial port at `baud`, 8N1 without flow control.
///
/// The poll timeout applies to reads and writes alike. A read that times
/// out just polls again; [`Link::send`](crate::Link::send) resumes a write
/// that times out.
pub fn open_serial(name: &str, baud: u32) -> Result<Box<dyn SerialPort>> {
    let port = serialport::new(name, baud)
        .data_bits(DataBits::Eight)
        .parity(Parity::None)
        .stop_bits(StopBits::One)
        .flow_control(FlowControl::None)
        .timeout(POLL_TIMEOUT)
        .open()?;
    info!(port = name, baud, "serial port opened");
    Ok(port)
}

/// Connects to a serial-over-TCP bridge.
pub fn connect_tcp(addr: impl ToSocketAddrs) -> Result<TcpStream> {
    let stream = TcpStream::connect(addr)?;
    stream.set_nodelay(true)?;
    info!(peer = ?stream.peer_addr().ok(), "tcp bridge connected");
    Ok(stream)
}
