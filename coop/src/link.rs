//! Host side of the controller link.
//!
//! A [`Link`] owns the byte channel to the controller. The write half stays
//! with the caller, who sends commands through [`Link::send`]; a cloned read
//! half moves into a dedicated receive thread that decodes replies line by
//! line and hands them to a [`ReplySink`] in arrival order.
//!
//! The receive thread lives as long as the channel delivers bytes. There is
//! no cancellation: closing the channel (or ending the process) stops it,
//! and a stopped link is replaced, not restarted.

use std::fmt;
use std::io::{self, Read, Write};
use std::net::TcpStream;
use std::thread::{self, JoinHandle};

use coop_proto::{Command, Line, LineBuffer, Reply};
use serialport::SerialPort;
use tracing::{debug, info, trace, warn};

use crate::{Error, Result};

/// Size of a single read from the channel.
const READ_CHUNK: usize = 256;

/// Name of the receive thread.
const RECEIVER_NAME: &str = "coop-rx";

/// A duplex byte stream that can hand out an independent read half.
pub trait ByteChannel: Write + Send {
    /// Read half moved into the receive thread.
    type Reader: Read + Send + 'static;

    /// Clones the read side of the channel.
    fn try_clone_reader(&self) -> io::Result<Self::Reader>;
}

impl ByteChannel for Box<dyn SerialPort> {
    type Reader = Self;

    fn try_clone_reader(&self) -> io::Result<Self::Reader> {
        self.try_clone().map_err(io::Error::from)
    }
}

impl ByteChannel for TcpStream {
    type Reader = Self;

    fn try_clone_reader(&self) -> io::Result<Self::Reader> {
        self.try_clone()
    }
}

/// Receives decoded replies on the receive thread.
pub trait ReplySink: Send + 'static {
    /// Handles one reply. Called in the order replies arrived.
    fn deliver(&mut self, reply: Reply);
}

impl<F> ReplySink for F
where
    F: FnMut(Reply) + Send + 'static,
{
    fn deliver(&mut self, reply: Reply) {
        self(reply);
    }
}

/// Why a receive loop ended.
#[derive(Debug)]
#[non_exhaustive]
pub enum ExitCause {
    /// The channel reported end of stream.
    Closed,
    /// A read failed. The error is not retried.
    Failed(io::Error),
}

/// Outcome of a finished receive loop.
#[derive(Debug)]
pub struct ReceiveExit {
    /// Number of replies handed to the sink.
    pub delivered: usize,
    /// Why the loop ended.
    pub cause: ExitCause,
}

/// Reads `reader` until it closes or fails, delivering one reply per line.
///
/// Lines that fail validation are delivered as [`Reply::Malformed`] or
/// [`Reply::Unrecognized`]; lines longer than [`coop_proto::MAX_LINE_LEN`]
/// are always `Malformed`. `Interrupted` and `TimedOut` reads are retried:
/// the latter is the serial driver's poll interval expiring, not a fault.
/// A partial line pending at close is dropped.
pub fn receive_loop<R: Read, S: ReplySink>(mut reader: R, mut sink: S) -> ReceiveExit {
    let mut lines = LineBuffer::new();
    let mut chunk = [0u8; READ_CHUNK];
    let mut delivered = 0;

    loop {
        let n = match reader.read(&mut chunk) {
            Ok(0) => {
                if lines.buffered_len() > 0 {
                    debug!(
                        pending = lines.buffered_len(),
                        "dropping partial line at close"
                    );
                }
                info!(delivered, "channel closed");
                return ReceiveExit {
                    delivered,
                    cause: ExitCause::Closed,
                };
            }
            Ok(n) => n,
            Err(e) if is_transient(&e) => continue,
            Err(e) => {
                warn!(error = %e, delivered, "receive loop stopped");
                return ReceiveExit {
                    delivered,
                    cause: ExitCause::Failed(e),
                };
            }
        };

        lines.push(&chunk[..n]);
        while let Some(line) = lines.next_line() {
            if let Line::Overlong { dropped, .. } = &line {
                debug!(dropped, "overlong line truncated");
            }
            let reply = line.into_reply();
            trace!(?reply, "reply received");
            sink.deliver(reply);
            delivered += 1;
        }
    }
}

/// Whether a failed read or write should simply be retried.
fn is_transient(e: &io::Error) -> bool {
    matches!(e.kind(), io::ErrorKind::Interrupted | io::ErrorKind::TimedOut)
}

/// Writes all of `frame` and flushes, resuming after timeouts.
///
/// The serial driver applies its poll timeout to writes as well; a slow
/// line must not abort a frame midway.
fn write_frame<W: Write>(channel: &mut W, frame: &[u8]) -> io::Result<()> {
    let mut rest = frame;
    while !rest.is_empty() {
        match channel.write(rest) {
            Ok(0) => return Err(io::ErrorKind::WriteZero.into()),
            Ok(n) => rest = &rest[n..],
            Err(e) if is_transient(&e) => {
                trace!(remaining = rest.len(), "write timed out, resuming");
            }
            Err(e) => return Err(e),
        }
    }
    loop {
        match channel.flush() {
            Err(e) if is_transient(&e) => {}
            other => return other,
        }
    }
}

/// A running link to the controller.
pub struct Link<C> {
    /// Write half of the channel.
    channel: C,
    /// The receive thread.
    receiver: JoinHandle<ReceiveExit>,
}

impl<C: ByteChannel> Link<C> {
    /// Takes ownership of `channel` and starts the receive thread.
    pub fn start<S: ReplySink>(channel: C, sink: S) -> Result<Self> {
        let reader = channel.try_clone_reader()?;
        let receiver = thread::Builder::new()
            .name(RECEIVER_NAME.into())
            .spawn(move || receive_loop(reader, sink))?;
        debug!("receive thread started");
        Ok(Self { channel, receiver })
    }

    /// Encodes `cmd` and writes the frame in one piece.
    ///
    /// Nothing is written when the command cannot be encoded. A write that
    /// times out is resumed, so a frame is never left half written. Taking
    /// `&mut self` keeps a single writer on the channel.
    pub fn send(&mut self, cmd: &Command) -> Result<()> {
        let frame = coop_proto::encode(cmd)?;
        write_frame(&mut self.channel, &frame)?;
        debug!(
            frame = %String::from_utf8_lossy(frame.trim_ascii_end()),
            "command sent"
        );
        Ok(())
    }

    /// Whether the receive thread is still running.
    pub fn is_receiving(&self) -> bool {
        !self.receiver.is_finished()
    }

    /// Waits for the receive loop to end and returns its outcome.
    ///
    /// Blocks until the controller side closes the channel or a read fails.
    pub fn join(self) -> Result<ReceiveExit> {
        self.receiver.join().map_err(|_| Error::ReceiverPanicked)
    }
}

impl<C> fmt::Debug for Link<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Link")
            .field("receiving", &!self.receiver.is_finished())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::net::TcpListener;
    use std::sync::mpsc::{self, Receiver, Sender};
    use std::sync::{Arc, Mutex};

    use chrono::NaiveDate;
    use coop_proto::{Mode, MotorAction, Protection};

    use super::*;

    /// Reader that returns one scripted chunk per call, then end of stream.
    struct Script(VecDeque<io::Result<Vec<u8>>>);

    impl Script {
        fn new(steps: Vec<io::Result<Vec<u8>>>) -> Self {
            Self(steps.into())
        }
    }

    fn chunk(bytes: &[u8]) -> io::Result<Vec<u8>> {
        Ok(bytes.to_vec())
    }

    impl Read for Script {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.0.pop_front() {
                None => Ok(0),
                Some(Err(e)) => Err(e),
                Some(Ok(chunk)) => {
                    buf[..chunk.len()].copy_from_slice(&chunk);
                    Ok(chunk.len())
                }
            }
        }
    }

    /// Runs a receive loop to completion and collects what reached the sink.
    fn drain(reader: impl Read) -> (ReceiveExit, Vec<Reply>) {
        let (tx, rx) = mpsc::channel();
        let exit = receive_loop(reader, move |reply: Reply| {
            tx.send(reply).unwrap();
        });
        (exit, rx.iter().collect())
    }

    #[test]
    fn delivers_split_lines_in_order() {
        let script = Script::new(vec![
            chunk(b"C"),
            chunk(b"C\nCC"),
            chunk(b"X\nCCRT"),
            chunk(b"foo\n"),
        ]);
        let (exit, replies) = drain(script);

        assert_eq!(
            replies,
            vec![
                Reply::PingAck,
                Reply::Unrecognized {
                    raw: b"CCX".to_vec()
                },
                Reply::TimeReport { text: "foo".into() },
            ]
        );
        assert_eq!(exit.delivered, 3);
        assert!(matches!(exit.cause, ExitCause::Closed));
    }

    #[test]
    fn read_failure_stops_after_delivered_replies() {
        let script = Script::new(vec![
            chunk(b"CC\n"),
            chunk(b"CCRT2024-01-01T00:00:00Z\nCC"),
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "unplugged")),
            chunk(b"\nCC\n"),
        ]);
        let (exit, replies) = drain(script);

        assert_eq!(replies.len(), 2);
        assert_eq!(exit.delivered, 2);
        match exit.cause {
            ExitCause::Failed(e) => assert_eq!(e.kind(), io::ErrorKind::BrokenPipe),
            ExitCause::Closed => panic!("expected a read failure"),
        }
    }

    #[test]
    fn timeouts_and_interrupts_are_retried() {
        let script = Script::new(vec![
            Err(io::ErrorKind::TimedOut.into()),
            chunk(b"CC"),
            Err(io::ErrorKind::Interrupted.into()),
            chunk(b"\n"),
        ]);
        let (exit, replies) = drain(script);

        assert_eq!(replies, vec![Reply::PingAck]);
        assert!(matches!(exit.cause, ExitCause::Closed));
    }

    #[test]
    fn garbage_is_delivered_not_fatal() {
        let script = Script::new(vec![chunk(b"\x00\xffjunk\n\nCC\n")]);
        let (exit, replies) = drain(script);

        assert_eq!(exit.delivered, 3);
        assert!(replies[0].is_mismatch());
        assert_eq!(replies[1], Reply::Malformed { raw: vec![] });
        assert_eq!(replies[2], Reply::PingAck);
    }

    #[test]
    fn partial_line_at_close_is_dropped() {
        let (exit, replies) = drain(Script::new(vec![chunk(b"CC\nCCRT12:")]));
        assert_eq!(replies, vec![Reply::PingAck]);
        assert_eq!(exit.delivered, 1);
    }

    #[test]
    fn long_reply_decodes_the_same_for_any_chunking() {
        let mut stream = b"CCRT".to_vec();
        stream.extend(std::iter::repeat_n(b'7', 296));
        stream.push(b'\n');
        assert_eq!(stream.len(), 301);

        let (_, whole) = drain(Script::new(vec![
            chunk(&stream[..256]),
            chunk(&stream[256..]),
        ]));
        let (_, split) = drain(Script::new(vec![
            chunk(&stream[..200]),
            chunk(&stream[200..280]),
            chunk(&stream[280..]),
        ]));

        assert_eq!(whole, split);
        assert_eq!(whole.len(), 1);
        assert!(matches!(&whole[0], Reply::Malformed { .. }));
    }

    /// Reader fed from the test thread; blocks until bytes arrive.
    struct Pipe {
        rx: Receiver<Vec<u8>>,
    }

    impl Read for Pipe {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.rx.recv() {
                Ok(chunk) => {
                    buf[..chunk.len()].copy_from_slice(&chunk);
                    Ok(chunk.len())
                }
                Err(_) => Ok(0),
            }
        }
    }

    /// Channel that records every `write` call as one entry.
    struct Recorder {
        writes: Arc<Mutex<Vec<Vec<u8>>>>,
        reader: Mutex<Option<Pipe>>,
        fail_writes: bool,
        /// Writes that time out before any is accepted.
        stalls: usize,
        /// Largest number of bytes accepted per write.
        max_write: usize,
    }

    impl Recorder {
        fn new() -> (Self, Sender<Vec<u8>>, Arc<Mutex<Vec<Vec<u8>>>>) {
            let (tx, rx) = mpsc::channel();
            let writes = Arc::new(Mutex::new(Vec::new()));
            let channel = Self {
                writes: Arc::clone(&writes),
                reader: Mutex::new(Some(Pipe { rx })),
                fail_writes: false,
                stalls: 0,
                max_write: usize::MAX,
            };
            (channel, tx, writes)
        }
    }

    impl Write for Recorder {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if self.fail_writes {
                return Err(io::ErrorKind::BrokenPipe.into());
            }
            if self.stalls > 0 {
                self.stalls -= 1;
                return Err(io::ErrorKind::TimedOut.into());
            }
            let n = buf.len().min(self.max_write);
            self.writes.lock().unwrap().push(buf[..n].to_vec());
            Ok(n)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl ByteChannel for Recorder {
        type Reader = Pipe;

        fn try_clone_reader(&self) -> io::Result<Pipe> {
            self.reader
                .lock()
                .unwrap()
                .take()
                .ok_or_else(|| io::Error::other("reader already taken"))
        }
    }

    #[test]
    fn each_send_is_one_write_while_receiver_blocks() {
        let (channel, feed, writes) = Recorder::new();
        let (tx, rx) = mpsc::channel();
        let mut link = Link::start(channel, move |reply: Reply| {
            tx.send(reply).unwrap();
        })
        .unwrap();

        // Leave the receive thread blocked in the middle of a line.
        feed.send(b"CCR".to_vec()).unwrap();

        let commands = [
            Command::SetMode { mode: Mode::Manual },
            Command::MotorControl {
                protection: Protection::Protected,
                action: MotorAction::Open,
            },
            Command::RequestTime,
        ];
        for cmd in &commands {
            link.send(cmd).unwrap();
        }
        assert!(link.is_receiving());

        feed.send(b"T06:00\n".to_vec()).unwrap();
        drop(feed);
        let exit = link.join().unwrap();

        assert_eq!(exit.delivered, 1);
        assert_eq!(
            rx.iter().collect::<Vec<_>>(),
            vec![Reply::TimeReport {
                text: "06:00".into()
            }]
        );
        assert_eq!(
            *writes.lock().unwrap(),
            vec![b"CCCM\n".to_vec(), b"CCMPO\n".to_vec(), b"CCRT\n".to_vec()]
        );
    }

    #[test]
    fn unencodable_command_writes_nothing() {
        let (channel, feed, writes) = Recorder::new();
        let mut link = Link::start(channel, |_: Reply| {}).unwrap();

        let far_future = NaiveDate::from_ymd_opt(12_000, 1, 1)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .unwrap();
        let err = link
            .send(&Command::SetTime {
                timestamp: far_future,
            })
            .unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));
        assert!(writes.lock().unwrap().is_empty());

        drop(feed);
        link.join().unwrap();
    }

    #[test]
    fn timed_out_writes_resume_without_losing_bytes() {
        let (mut channel, feed, writes) = Recorder::new();
        channel.stalls = 2;
        channel.max_write = 4;
        let mut link = Link::start(channel, |_: Reply| {}).unwrap();

        link.send(&Command::RequestTime).unwrap();

        let written: Vec<u8> = writes.lock().unwrap().concat();
        assert_eq!(written, b"CCRT\n");

        drop(feed);
        link.join().unwrap();
    }

    #[test]
    fn write_failure_surfaces_as_io_error() {
        let (mut channel, feed, _writes) = Recorder::new();
        channel.fail_writes = true;
        let mut link = Link::start(channel, |_: Reply| {}).unwrap();

        let err = link.send(&Command::Ping).unwrap_err();
        assert!(matches!(err, Error::Io(_)));

        drop(feed);
        link.join().unwrap();
    }

    #[test]
    fn runs_over_tcp() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let controller = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut frame = [0u8; 3];
            stream.read_exact(&mut frame).unwrap();
            stream.write_all(b"CC\nCCRT2024-06-01T12:00:00Z\n").unwrap();
            frame
        });

        let (tx, rx) = mpsc::channel();
        let mut link = Link::start(TcpStream::connect(addr).unwrap(), move |reply: Reply| {
            tx.send(reply).unwrap();
        })
        .unwrap();
        link.send(&Command::Ping).unwrap();

        assert_eq!(&controller.join().unwrap(), b"CC\n");
        let exit = link.join().unwrap();
        assert_eq!(exit.delivered, 2);
        assert_eq!(
            rx.iter().collect::<Vec<_>>(),
            vec![
                Reply::PingAck,
                Reply::TimeReport {
                    text: "2024-06-01T12:00:00Z".into()
                },
            ]
        );
    }
}
