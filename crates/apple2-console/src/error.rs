//! Error type shared by every console operation.

use std::time::Duration;

use apple2_memory::AddressError;
use format_applesoft::ProgramError;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{0}")]
    InvalidAddress(AddressError),
    #[error("row {row} out of range (0-{})", rows.saturating_sub(1))]
    InvalidRow { row: usize, rows: usize },
    #[error("timed out after {elapsed:?} waiting for {waiting_for:?} (command {command:?})")]
    Timeout {
        command: String,
        waiting_for: String,
        elapsed: Duration,
    },
    #[error("emulator exited during {command:?}")]
    ProcessExited { command: String },
    #[error("unexpected response to {command:?}: {detail}")]
    ProtocolDesync { command: String, detail: String },
    #[error("write verification failed at ${address:04X}: wrote ${expected:02X}, read back ${actual:02X}")]
    WriteVerificationFailed { address: u16, expected: u8, actual: u8 },
    #[error("session is busy with another command")]
    SessionBusy,
    #[error("session crashed; boot again or restore a snapshot")]
    SessionCrashed,
    #[error("malformed program: {0}")]
    MalformedProgram(#[from] ProgramError),
    #[error("program ${start:04X}-${end:04X} runs past ${ceiling:04X}")]
    AddressOutOfRange { start: u16, end: u32, ceiling: u16 },
    #[error("{operation} is not possible while {state}")]
    NotReady {
        operation: &'static str,
        state: String,
    },
    #[error("cancelled")]
    Cancelled,
    #[error("tokenizer: {0}")]
    Tokenizer(String),
    #[error("invalid prompt pattern: {0}")]
    Prompt(#[from] regex::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialize error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("snapshot error: {0}")]
    Snapshot(String),
}

impl From<AddressError> for Error {
    fn from(e: AddressError) -> Self {
        match e {
            AddressError::InvalidRow { row, rows } => Error::InvalidRow { row, rows },
            other => Error::InvalidAddress(other),
        }
    }
}

impl Error {
    /// Whether the session can keep serving commands after this error.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::ProcessExited { .. } | Error::SessionCrashed | Error::Cancelled
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
