//! Emulator selection, timings and prompt patterns.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use apple2_memory::constants::DEFAULT_HIMEM;

/// Apple II model passed to the emulator's `-m` flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Machine {
    /// Original Apple II, Integer BASIC.
    Original,
    /// Apple II plus, Applesoft in ROM.
    Plus,
    /// Enhanced Apple IIe with 128K.
    #[default]
    Enhanced,
    /// Unenhanced Apple IIe.
    Twoey,
}

impl Machine {
    #[must_use]
    pub const fn as_arg(self) -> &'static str {
        match self {
            Machine::Original => "original",
            Machine::Plus => "plus",
            Machine::Enhanced => "enhanced",
            Machine::Twoey => "twoey",
        }
    }

    /// Whether the model has the IIe auxiliary 64K and soft-switch status.
    #[must_use]
    pub const fn has_aux(self) -> bool {
        matches!(self, Machine::Enhanced | Machine::Twoey)
    }
}

impl fmt::Display for Machine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_arg())
    }
}

impl FromStr for Machine {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "original" | "ii" => Ok(Machine::Original),
            "plus" | "ii+" => Ok(Machine::Plus),
            "enhanced" | "iie" | "//e" => Ok(Machine::Enhanced),
            "twoey" => Ok(Machine::Twoey),
            other => Err(format!("unknown machine: {other}")),
        }
    }
}

/// Regular expressions recognising the emulator's prompts.
#[derive(Debug, Clone)]
pub struct PromptSet {
    /// Applesoft `]` at the start of a line. A bare `]` also appears in
    /// the emulator banner, so the newline is part of the pattern.
    pub basic: String,
    pub debugger: String,
    /// Printed when the debugger hands control back to the machine.
    pub resumed: String,
    /// Harmless debugger command that only reprints the prompt. An empty
    /// line would single-step the CPU.
    pub debugger_reprompt: String,
    /// Text that makes the BASIC interpreter print a fresh prompt.
    pub basic_reprompt: String,
}

impl Default for PromptSet {
    fn default() -> Self {
        Self {
            basic: r"\n\]".to_string(),
            debugger: r"BOBBIN> ".to_string(),
            resumed: r"Continuing\.\.\.".to_string(),
            debugger_reprompt: "help".to_string(),
            basic_reprompt: "\r".to_string(),
        }
    }
}

/// Timeouts and protocol tuning for one emulator session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub boot_timeout: Duration,
    pub command_timeout: Duration,
    /// Wait for the debugger prompt after each Ctrl-C pair.
    pub debugger_timeout: Duration,
    /// Pause between the two Ctrl-C bytes.
    pub ctrl_c_gap: Duration,
    pub debugger_attempts: u32,
    /// Silence that counts as "no more stale output".
    pub quiet: Duration,
    /// Wait for a typed BASIC line, including `RUN`, to come back to `]`.
    pub run_timeout: Duration,
    /// Bytes per debugger write command.
    pub write_chunk: usize,
    /// Bytes per debugger read command.
    pub read_chunk: usize,
    /// Terminator for debugger command lines.
    pub newline: String,
    /// Terminator for lines typed at the Apple II keyboard.
    pub key_return: String,
    pub prompts: PromptSet,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            boot_timeout: Duration::from_secs(60),
            command_timeout: Duration::from_secs(3),
            debugger_timeout: Duration::from_secs(2),
            ctrl_c_gap: Duration::from_millis(150),
            debugger_attempts: 3,
            quiet: Duration::from_millis(50),
            run_timeout: Duration::from_secs(30),
            write_chunk: 32,
            read_chunk: 0x800,
            newline: "\n".to_string(),
            key_return: "\r".to_string(),
            prompts: PromptSet::default(),
        }
    }
}

/// Everything needed to launch and drive one emulator.
#[derive(Debug, Clone)]
pub struct Apple2Config {
    pub emulator: PathBuf,
    pub machine: Machine,
    pub disk: Option<PathBuf>,
    pub session: SessionConfig,
    /// Highest address an injected program may reach without an explicit
    /// overflow acknowledgement.
    pub ceiling: u16,
    pub snapshot_dir: PathBuf,
}

impl Default for Apple2Config {
    fn default() -> Self {
        Self {
            emulator: find_emulator(),
            machine: Machine::default(),
            disk: None,
            session: SessionConfig::default(),
            ceiling: DEFAULT_HIMEM,
            snapshot_dir: PathBuf::from("snapshots"),
        }
    }
}

impl Apple2Config {
    /// Command-line arguments for an interactive session.
    #[must_use]
    pub fn emulator_args(&self) -> Vec<String> {
        let mut args = vec![
            "--simple".to_string(),
            "--remain".to_string(),
            "-m".to_string(),
            self.machine.as_arg().to_string(),
        ];
        if let Some(disk) = &self.disk {
            args.push("--disk".to_string());
            args.push(disk.display().to_string());
        }
        args
    }
}

/// Locate the emulator binary.
///
/// Walks up from the running executable looking for `bobbin` or a
/// `bobbin/src/bobbin` build tree, then tries the usual install locations.
/// Falls back to plain `bobbin`, resolved through `PATH` at spawn time.
#[must_use]
pub fn find_emulator() -> PathBuf {
    if let Ok(exe) = std::env::current_exe() {
        let mut dir = exe.parent().map(Path::to_path_buf);
        for _ in 0..5 {
            if let Some(ref d) = dir {
                for candidate in [d.join("bobbin"), d.join("bobbin").join("src").join("bobbin")] {
                    if candidate.is_file() {
                        return candidate;
                    }
                }
                dir = d.parent().map(Path::to_path_buf);
            }
        }
    }
    for candidate in ["/usr/local/bin/bobbin", "/opt/homebrew/bin/bobbin"] {
        let path = PathBuf::from(candidate);
        if path.is_file() {
            return path;
        }
    }
    PathBuf::from("bobbin")
}
