//! Byte-level transport to the emulator.
//!
//! [`Console`] is the seam between the protocol state machine and whatever
//! carries the bytes. [`ProcessConsole`] runs the real emulator with piped
//! stdio; tests substitute a scripted fake.

use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use crate::config::{Apple2Config, Machine};
use crate::error::Result;

/// Outcome of waiting for console output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Received {
    Data(Vec<u8>),
    /// Nothing arrived within the timeout.
    Idle,
    /// The emulator closed its output; no more data will come.
    Closed,
}

/// A bidirectional byte stream to a running emulator.
pub trait Console: Send {
    fn send(&mut self, bytes: &[u8]) -> io::Result<()>;
    fn recv(&mut self, timeout: Duration) -> Received;
    fn is_alive(&mut self) -> bool;
    fn kill(&mut self);
}

/// Starts consoles. A session reboots through its launcher.
pub trait Launcher: Send {
    type Console: Console;

    fn launch(&mut self) -> Result<Self::Console>;

    fn machine(&self) -> Machine;

    /// Change what the next launch starts.
    fn select(&mut self, _machine: Machine, _disk: Option<PathBuf>) {}
}

/// Emulator subprocess with stdout and stderr merged into one stream.
pub struct ProcessConsole {
    child: Child,
    stdin: Option<ChildStdin>,
    rx: Receiver<Vec<u8>>,
}

impl ProcessConsole {
    pub fn spawn(mut command: Command) -> io::Result<Self> {
        command
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        let mut child = command.spawn()?;
        let stdin = child.stdin.take();
        let (tx, rx) = mpsc::channel();
        if let Some(stdout) = child.stdout.take() {
            let tx = tx.clone();
            thread::spawn(move || pump(stdout, &tx));
        }
        if let Some(stderr) = child.stderr.take() {
            thread::spawn(move || pump(stderr, &tx));
        }
        log::info!("spawned emulator pid {}", child.id());
        Ok(Self { child, stdin, rx })
    }
}

/// Forward everything from `source` until EOF.
fn pump(mut source: impl Read, tx: &mpsc::Sender<Vec<u8>>) {
    let mut buf = [0u8; 4096];
    loop {
        match source.read(&mut buf) {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                if tx.send(buf[..n].to_vec()).is_err() {
                    break;
                }
            }
        }
    }
}

impl Console for ProcessConsole {
    fn send(&mut self, bytes: &[u8]) -> io::Result<()> {
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::BrokenPipe, "stdin closed"))?;
        log::trace!("send {bytes:02X?}");
        stdin.write_all(bytes)?;
        stdin.flush()
    }

    fn recv(&mut self, timeout: Duration) -> Received {
        match self.rx.recv_timeout(timeout) {
            Ok(mut data) => {
                // Coalesce whatever else is already queued.
                while let Ok(more) = self.rx.try_recv() {
                    data.extend(more);
                }
                log::trace!("recv {:?}", String::from_utf8_lossy(&data));
                Received::Data(data)
            }
            Err(RecvTimeoutError::Timeout) => Received::Idle,
            Err(RecvTimeoutError::Disconnected) => Received::Closed,
        }
    }

    fn is_alive(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }

    fn kill(&mut self) {
        self.stdin = None;
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

impl Drop for ProcessConsole {
    fn drop(&mut self) {
        if self.is_alive() {
            self.kill();
        }
    }
}

/// Launches the configured emulator binary.
pub struct ProcessLauncher {
    config: Apple2Config,
}

impl ProcessLauncher {
    #[must_use]
    pub fn new(config: Apple2Config) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn config(&self) -> &Apple2Config {
        &self.config
    }
}

impl Launcher for ProcessLauncher {
    type Console = ProcessConsole;

    fn launch(&mut self) -> Result<ProcessConsole> {
        let mut command = Command::new(&self.config.emulator);
        command.args(self.config.emulator_args());
        log::info!(
            "launching {} {}",
            self.config.emulator.display(),
            self.config.emulator_args().join(" ")
        );
        Ok(ProcessConsole::spawn(command)?)
    }

    fn machine(&self) -> Machine {
        self.config.machine
    }

    fn select(&mut self, machine: Machine, disk: Option<PathBuf>) {
        self.config.machine = machine;
        self.config.disk = disk;
    }
}

/// Shared flag that aborts the command in flight.
///
/// Cancelling kills the emulator; the session then needs a reboot.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub(crate) fn clear(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}
