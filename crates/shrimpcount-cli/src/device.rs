//! Single-byte command channel to the conveyor controller.
//!
//! The port is opened raw at 8N1 with the requested baud rate. A background
//! thread splits incoming bytes into lines so acknowledgements can be awaited
//! with a deadline.

use std::io::{BufRead, BufReader, ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::time::{Duration, Instant};

use serialport::{DataBits, FlowControl, Parity, SerialPort, StopBits};
use thiserror::Error;

pub const SUPPORTED_BAUDS: [u32; 5] = [9600, 19200, 38400, 57600, 115200];
pub const DEFAULT_BAUD: u32 = 115200;
pub const DEFAULT_DEVICE: &str = "/dev/ttyUSB0";
pub const DEFAULT_ACK_TIMEOUT: Duration = Duration::from_secs(10);

const INIT_MARKER: u8 = 0xFF;
/// Read timeout of the port itself; the reader thread retries after it.
const PORT_POLL: Duration = Duration::from_millis(100);

#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("unsupported baud rate {0} (supported: 9600, 19200, 38400, 57600, 115200)")]
    UnsupportedBaud(u32),

    #[error("cannot open {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: serialport::Error,
    },

    #[error("device i/o failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("device closed the line")]
    Disconnected,

    #[error("invalid settings file: {0}")]
    Settings(#[from] serde_json::Error),
}

/// Controller commands and their wire codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Command {
    Direction1,
    Direction2,
    Direction3,
    LedOn,
    LedOff,
    SendStatus,
    StopSystem,
}

impl Command {
    pub const ALL: [Command; 7] = [
        Command::Direction1,
        Command::Direction2,
        Command::Direction3,
        Command::LedOn,
        Command::LedOff,
        Command::SendStatus,
        Command::StopSystem,
    ];

    pub fn code(self) -> u8 {
        match self {
            Command::Direction1 => 0xA1,
            Command::Direction2 => 0xA2,
            Command::Direction3 => 0xA3,
            Command::LedOn => 0xA4,
            Command::LedOff => 0xA5,
            Command::SendStatus => 0xA6,
            Command::StopSystem => 0xA7,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.code() == code)
    }

    /// Whether the controller answers this command with an acknowledgement line.
    pub fn awaits_ack(self) -> bool {
        matches!(
            self,
            Command::Direction1 | Command::Direction2 | Command::Direction3 | Command::SendStatus
        )
    }
}

/// Five-byte init frame: marker then the baud rate, little endian.
pub fn init_frame(baud: u32) -> [u8; 5] {
    let b = baud.to_le_bytes();
    [INIT_MARKER, b[0], b[1], b[2], b[3]]
}

pub fn check_baud(baud: u32) -> Result<u32, DeviceError> {
    if SUPPORTED_BAUDS.contains(&baud) {
        Ok(baud)
    } else {
        Err(DeviceError::UnsupportedBaud(baud))
    }
}

/// Controller verdict on a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ack {
    Accepted(String),
    Rejected(String),
    TimedOut,
}

/// Classify one received line; `None` for chatter.
pub fn classify_line(line: &str) -> Option<Ack> {
    let line = line.trim();
    match line {
        "OK" | "DONE" | "SUCCESS" => Some(Ack::Accepted(line.to_string())),
        _ if line.to_ascii_uppercase().contains("ERROR") => Some(Ack::Rejected(line.to_string())),
        _ => None,
    }
}

/// Result of sending one command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub command: Command,
    /// `None` for commands that are not acknowledged.
    pub ack: Option<Ack>,
    /// Lines received while waiting that were not an acknowledgement.
    pub transcript: Vec<String>,
}

pub struct DeviceChannel<W> {
    writer: W,
    lines: Receiver<String>,
    ack_timeout: Duration,
}

impl DeviceChannel<Box<dyn SerialPort>> {
    /// Open a serial port raw at 8N1 and `baud`.
    pub fn open(path: &Path, baud: u32, ack_timeout: Duration) -> Result<Self, DeviceError> {
        let baud = check_baud(baud)?;
        let open_err = |source| DeviceError::Open {
            path: path.to_path_buf(),
            source,
        };
        let port = serialport::new(path.to_string_lossy(), baud)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(PORT_POLL)
            .open()
            .map_err(open_err)?;
        let reader = port.try_clone().map_err(open_err)?;
        Ok(Self::from_parts(port, reader, ack_timeout))
    }
}

/// Forward complete lines from `reader` until end of stream or a hard error.
///
/// Read timeouts are retried; a partial line survives them.
fn pump_lines<R: Read>(reader: R, tx: mpsc::Sender<String>) {
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    loop {
        match reader.read_until(b'\n', &mut buf) {
            Ok(0) => break,
            Ok(_) => {
                let text = String::from_utf8_lossy(&buf);
                let line = text.trim_end_matches(['\r', '\n']).to_string();
                buf.clear();
                if tx.send(line).is_err() {
                    break;
                }
            }
            Err(e) if matches!(e.kind(), ErrorKind::TimedOut | ErrorKind::Interrupted) => {}
            Err(e) => {
                tracing::debug!("device reader stopped: {}", e);
                break;
            }
        }
    }
}

impl<W: Write> DeviceChannel<W> {
    pub fn from_parts<R>(writer: W, reader: R, ack_timeout: Duration) -> Self
    where
        R: Read + Send + 'static,
    {
        let (tx, rx) = mpsc::channel();
        std::thread::spawn(move || pump_lines(reader, tx));
        Self {
            writer,
            lines: rx,
            ack_timeout,
        }
    }

    /// Announce the line speed to the controller.
    pub fn init(&mut self, baud: u32) -> Result<(), DeviceError> {
        let baud = check_baud(baud)?;
        self.writer.write_all(&init_frame(baud))?;
        self.writer.flush()?;
        tracing::info!("device initialised at {} baud", baud);
        Ok(())
    }

    pub fn send(&mut self, command: Command) -> Result<Outcome, DeviceError> {
        self.writer.write_all(&[command.code()])?;
        self.writer.flush()?;
        tracing::info!("sent {:?} (0x{:02X})", command, command.code());

        let mut outcome = Outcome {
            command,
            ack: None,
            transcript: Vec::new(),
        };
        if !command.awaits_ack() {
            return Ok(outcome);
        }

        let deadline = Instant::now() + self.ack_timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                outcome.ack = Some(Ack::TimedOut);
                break;
            }
            match self.lines.recv_timeout(remaining) {
                Ok(line) => match classify_line(&line) {
                    Some(ack) => {
                        outcome.ack = Some(ack);
                        break;
                    }
                    None => {
                        tracing::debug!("device: {}", line);
                        outcome.transcript.push(line);
                    }
                },
                Err(RecvTimeoutError::Timeout) => {
                    outcome.ack = Some(Ack::TimedOut);
                    break;
                }
                Err(RecvTimeoutError::Disconnected) => return Err(DeviceError::Disconnected),
            }
        }
        match &outcome.ack {
            Some(Ack::Accepted(l)) => tracing::info!("{:?} accepted ({})", command, l),
            Some(Ack::Rejected(l)) => tracing::warn!("{:?} rejected: {}", command, l),
            _ => tracing::warn!("{:?}: no acknowledgement in {:?}", command, self.ack_timeout),
        }
        Ok(outcome)
    }
}

/// Last used device and baud rate.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct DeviceSettings {
    pub device: PathBuf,
    pub baud: u32,
}

impl Default for DeviceSettings {
    fn default() -> Self {
        Self {
            device: PathBuf::from(DEFAULT_DEVICE),
            baud: DEFAULT_BAUD,
        }
    }
}

impl DeviceSettings {
    /// Load settings; a missing file gives the defaults.
    pub fn load(path: &Path) -> Result<Self, DeviceError> {
        match std::fs::read_to_string(path) {
            Ok(text) => Ok(serde_json::from_str(&text)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), DeviceError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().expect("lock").extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    /// Reader that stays silent for a while, then hits end of stream.
    struct Stall(Duration);

    impl Read for Stall {
        fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
            std::thread::sleep(self.0);
            Ok(0)
        }
    }

    fn channel(input: &str) -> (DeviceChannel<SharedBuf>, SharedBuf) {
        let out = SharedBuf::default();
        let ch = DeviceChannel::from_parts(
            out.clone(),
            Cursor::new(input.as_bytes().to_vec()),
            Duration::from_secs(2),
        );
        (ch, out)
    }

    #[test]
    fn codes_round_trip() {
        for c in Command::ALL {
            assert_eq!(Command::from_code(c.code()), Some(c));
        }
        assert_eq!(Command::LedOn.code(), 0xA4);
        assert_eq!(Command::from_code(0x10), None);
    }

    #[test]
    fn init_frame_is_marker_plus_le_baud() {
        assert_eq!(init_frame(115200), [0xFF, 0x00, 0xC2, 0x01, 0x00]);
        assert_eq!(init_frame(9600), [0xFF, 0x80, 0x25, 0x00, 0x00]);
        assert!(matches!(check_baud(12345), Err(DeviceError::UnsupportedBaud(12345))));
    }

    #[test]
    fn line_classification() {
        assert_eq!(classify_line("OK\r"), Some(Ack::Accepted("OK".into())));
        assert_eq!(classify_line("DONE"), Some(Ack::Accepted("DONE".into())));
        assert_eq!(
            classify_line("motor error 3"),
            Some(Ack::Rejected("motor error 3".into()))
        );
        assert_eq!(classify_line("ok then"), None);
        assert_eq!(classify_line("temp=27.1"), None);
    }

    #[test]
    fn acknowledged_command_collects_transcript() {
        let (mut ch, out) = channel("booting\ntemp=27.1\nSUCCESS\nlater\n");
        let outcome = ch.send(Command::Direction2).expect("send");
        assert_eq!(outcome.ack, Some(Ack::Accepted("SUCCESS".into())));
        assert_eq!(outcome.transcript, vec!["booting", "temp=27.1"]);
        assert_eq!(*out.0.lock().expect("lock"), vec![0xA2]);
    }

    #[test]
    fn unacknowledged_command_returns_immediately() {
        let (mut ch, out) = channel("");
        ch.init(57600).expect("init");
        let outcome = ch.send(Command::LedOff).expect("send");
        assert_eq!(outcome.ack, None);
        let bytes = out.0.lock().expect("lock").clone();
        assert_eq!(bytes[0], 0xFF);
        assert_eq!(bytes[5], 0xA5);
        assert_eq!(bytes.len(), 6);
    }

    #[test]
    fn rejection_is_reported() {
        let (mut ch, _) = channel("Error: jammed\n");
        let outcome = ch.send(Command::SendStatus).expect("send");
        assert_eq!(outcome.ack, Some(Ack::Rejected("Error: jammed".into())));
    }

    #[test]
    fn silence_times_out() {
        let mut ch = DeviceChannel::from_parts(
            SharedBuf::default(),
            Stall(Duration::from_millis(500)),
            Duration::from_millis(50),
        );
        let outcome = ch.send(Command::Direction1).expect("send");
        assert_eq!(outcome.ack, Some(Ack::TimedOut));
    }

    /// Reader that times out between chunks, like a serial port with a short poll.
    /// An empty chunk stands for one timed-out poll.
    struct Choppy(Vec<&'static str>);

    impl Read for Choppy {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.0.is_empty() {
                return Ok(0);
            }
            let chunk = self.0.remove(0).as_bytes();
            if chunk.is_empty() {
                return Err(std::io::Error::new(ErrorKind::TimedOut, "poll"));
            }
            assert!(chunk.len() <= buf.len());
            buf[..chunk.len()].copy_from_slice(chunk);
            Ok(chunk.len())
        }
    }

    #[test]
    fn port_timeouts_do_not_drop_partial_lines() {
        let reader = Choppy(vec!["", "tem", "", "p=2\r\nD", "", "ONE\r\n"]);
        let mut ch =
            DeviceChannel::from_parts(SharedBuf::default(), reader, Duration::from_secs(2));
        let outcome = ch.send(Command::Direction1).expect("send");
        assert_eq!(outcome.transcript, vec!["temp=2"]);
        assert_eq!(outcome.ack, Some(Ack::Accepted("DONE".into())));
    }

    #[test]
    fn open_rejects_unsupported_baud_before_touching_the_port() {
        let err = DeviceChannel::open(Path::new("/dev/null"), 1234, DEFAULT_ACK_TIMEOUT)
            .err()
            .expect("unsupported baud");
        assert!(matches!(err, DeviceError::UnsupportedBaud(1234)));
    }

    #[test]
    fn closed_line_is_an_error() {
        let (mut ch, _) = channel("noise\n");
        assert!(matches!(
            ch.send(Command::Direction3),
            Err(DeviceError::Disconnected)
        ));
    }

    #[test]
    fn settings_persist() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested/device.json");
        assert_eq!(DeviceSettings::load(&path).expect("defaults"), DeviceSettings::default());

        let s = DeviceSettings {
            device: PathBuf::from("/dev/ttyACM1"),
            baud: 38400,
        };
        s.save(&path).expect("save");
        assert_eq!(DeviceSettings::load(&path).expect("load"), s);
    }
}
