//! Protocol state machine for one emulator console.
//!
//! ```text
//! Uninitialized --boot--> Booting --"\n]"--> AtCommandPrompt
//! AtCommandPrompt --^C ^C, "BOBBIN> "--> AtDebugger
//! AtDebugger --"c", "Continuing..."--> AtCommandPrompt
//! AtCommandPrompt | AtDebugger --pause--> Paused --resume--> prior state
//! any live state --"r" / "rr"--> Booting --"\n]"--> AtCommandPrompt
//! any --timeout without resync, process exit, cancel--> Crashed
//! any --shutdown--> Uninitialized
//! ```
//!
//! Every command goes through [`Session::send_command`]: stale output is
//! drained, the line is written, and output accumulates until the expected
//! prompt matches. A timeout or an unparseable reply gets one
//! flush-and-reprompt attempt; if the prompt does not come back the process
//! is killed and the session is `Crashed` until the next boot.

use std::fmt;
use std::sync::LazyLock;
use std::thread;
use std::time::{Duration, Instant};

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::config::SessionConfig;
use crate::console::{CancelToken, Console, Received};
use crate::error::{Error, Result};

/// Granularity of waits, so cancellation is noticed promptly.
const POLL: Duration = Duration::from_millis(20);
/// Upper bound on reads while draining stale output.
const DRAIN_ROUNDS: usize = 20;
const QUIT_TIMEOUT: Duration = Duration::from_secs(2);

/// State a paused session returns to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriorState {
    CommandPrompt,
    Debugger,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Uninitialized,
    Booting,
    /// The machine is running and stdin feeds its keyboard.
    AtCommandPrompt,
    /// The CPU is halted at the debugger prompt.
    AtDebugger,
    /// Halted at the debugger on behalf of the caller.
    Paused { prior: PriorState },
    Crashed,
}

impl SessionState {
    /// Whether the debugger prompt is what the emulator is showing.
    #[must_use]
    pub const fn at_debugger(self) -> bool {
        matches!(self, SessionState::AtDebugger | SessionState::Paused { .. })
    }

    #[must_use]
    pub const fn is_live(self) -> bool {
        matches!(
            self,
            SessionState::AtCommandPrompt | SessionState::AtDebugger | SessionState::Paused { .. }
        )
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Uninitialized => f.write_str("not booted"),
            SessionState::Booting => f.write_str("booting"),
            SessionState::AtCommandPrompt => f.write_str("at the command prompt"),
            SessionState::AtDebugger => f.write_str("in the debugger"),
            SessionState::Paused { .. } => f.write_str("paused"),
            SessionState::Crashed => f.write_str("crashed"),
        }
    }
}

/// Which prompt ends a command's output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Prompt {
    Basic,
    Debugger,
    /// The debugger's acknowledgement of `c`.
    Resumed,
}

/// 6502 registers as shown when the debugger is entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Registers {
    pub a: u8,
    pub x: u8,
    pub y: u8,
    pub sp: u8,
    pub pc: u16,
    pub n: bool,
    pub v: bool,
    pub b: bool,
    pub d: bool,
    pub i: bool,
    pub z: bool,
    pub c: bool,
}

static ACC: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"ACC:\s*([0-9A-Fa-f]{2})").expect("valid regex"));
static REG_X: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\bX:\s*([0-9A-Fa-f]{2})").expect("valid regex"));
static REG_Y: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\bY:\s*([0-9A-Fa-f]{2})").expect("valid regex"));
static REG_SP: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\bSP:\s*([0-9A-Fa-f]{2})").expect("valid regex"));
static PC_LINE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?m)^\s*([0-9A-Fa-f]{4}):").expect("valid regex"));
static DUMP_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*([0-9A-Fa-f]{4})[:\-]((?:\s+[0-9A-Fa-f]{2}\b)+)").expect("valid regex")
});

impl Registers {
    /// Parse the register line of a debugger banner, e.g.
    /// `ACC: A0  X: 00  Y: 05  SP: F4   [N] V [U] [B] D I Z C` followed by
    /// a `0300:   B1 28   LDA (28),Y` disassembly line. Bracketed flags are
    /// set.
    #[must_use]
    pub fn parse(banner: &str) -> Option<Self> {
        let hex8 = |re: &Regex| {
            re.captures(banner)
                .and_then(|c| u8::from_str_radix(&c[1], 16).ok())
        };
        let a = hex8(&ACC)?;
        let flag = |name: char| banner.contains(&format!("[{name}]"));
        Some(Self {
            a,
            x: hex8(&REG_X).unwrap_or(0),
            y: hex8(&REG_Y).unwrap_or(0),
            sp: hex8(&REG_SP).unwrap_or(0),
            pc: PC_LINE
                .captures(banner)
                .and_then(|c| u16::from_str_radix(&c[1], 16).ok())
                .unwrap_or(0),
            n: flag('N'),
            v: flag('V'),
            b: flag('B'),
            d: flag('D'),
            i: flag('I'),
            z: flag('Z'),
            c: flag('C'),
        })
    }

    /// Processor status byte, with the unused bit set.
    #[must_use]
    pub fn status(&self) -> u8 {
        let bit = |set: bool, mask: u8| if set { mask } else { 0 };
        0x20 | bit(self.n, 0x80)
            | bit(self.v, 0x40)
            | bit(self.b, 0x10)
            | bit(self.d, 0x08)
            | bit(self.i, 0x04)
            | bit(self.z, 0x02)
            | bit(self.c, 0x01)
    }
}

/// Decode a memory dump, requiring `len` contiguous bytes from `start`.
pub(crate) fn parse_dump(lines: &[String], start: u16, len: usize) -> std::result::Result<Vec<u8>, String> {
    let mut bytes = Vec::with_capacity(len);
    let mut expected = u32::from(start);
    for line in lines {
        let Some(caps) = DUMP_LINE.captures(line) else {
            continue;
        };
        let address = u32::from_str_radix(&caps[1], 16).map_err(|e| e.to_string())?;
        if address != expected {
            return Err(format!("line at ${address:04X}, expected ${expected:04X}"));
        }
        for token in caps[2].split_whitespace() {
            bytes.push(u8::from_str_radix(token, 16).map_err(|e| e.to_string())?);
            expected += 1;
        }
    }
    match bytes.len().cmp(&len) {
        std::cmp::Ordering::Equal => Ok(bytes),
        std::cmp::Ordering::Less => Err(format!("got {} of {len} bytes", bytes.len())),
        std::cmp::Ordering::Greater => Err(format!("got {} bytes, asked for {len}", bytes.len())),
    }
}

/// Split command output into lines, dropping blanks and the echoed command.
fn response_lines(output: &str, command: &str) -> Vec<String> {
    let mut lines: Vec<String> = output
        .split('\n')
        .map(|l| l.trim_end().trim_start_matches('\r').to_string())
        .filter(|l| !l.is_empty())
        .collect();
    let command = command.trim();
    if !command.is_empty() && lines.first().is_some_and(|l| l.trim().ends_with(command)) {
        lines.remove(0);
    }
    lines
}

struct Patterns {
    basic: Regex,
    debugger: Regex,
    resumed: Regex,
}

/// One emulator process and the state of its console.
pub struct Session<C: Console> {
    console: Option<C>,
    state: SessionState,
    config: SessionConfig,
    patterns: Patterns,
    buffer: String,
    banner: String,
    cancel: CancelToken,
    generation: u64,
    verify_failures: u32,
}

impl<C: Console> Session<C> {
    pub fn new(config: SessionConfig) -> Result<Self> {
        let patterns = Patterns {
            basic: Regex::new(&config.prompts.basic)?,
            debugger: Regex::new(&config.prompts.debugger)?,
            resumed: Regex::new(&config.prompts.resumed)?,
        };
        Ok(Self {
            console: None,
            state: SessionState::Uninitialized,
            config,
            patterns,
            buffer: String::new(),
            banner: String::new(),
            cancel: CancelToken::new(),
            generation: 0,
            verify_failures: 0,
        })
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    #[must_use]
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Incremented on every boot and reset; cached machine state from an
    /// older generation is stale.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    #[must_use]
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Output that preceded the last debugger prompt on entry.
    #[must_use]
    pub fn debugger_banner(&self) -> &str {
        &self.banner
    }

    fn set_state(&mut self, state: SessionState) {
        if self.state != state {
            log::info!("session: {} -> {}", self.state, state);
            self.state = state;
        }
    }

    fn crash(&mut self) {
        if let Some(mut console) = self.console.take() {
            console.kill();
        }
        self.buffer.clear();
        self.set_state(SessionState::Crashed);
    }

    fn guard(&self, operation: &'static str) -> Result<()> {
        match self.state {
            SessionState::Crashed => Err(Error::SessionCrashed),
            s if s.is_live() => Ok(()),
            s => Err(Error::NotReady {
                operation,
                state: s.to_string(),
            }),
        }
    }

    fn pattern(&self, prompt: Prompt) -> &Regex {
        match prompt {
            Prompt::Basic => &self.patterns.basic,
            Prompt::Debugger => &self.patterns.debugger,
            Prompt::Resumed => &self.patterns.resumed,
        }
    }

    fn send_raw(&mut self, bytes: &[u8], command: &str) -> Result<()> {
        let Some(console) = self.console.as_mut() else {
            return Err(Error::SessionCrashed);
        };
        if let Err(e) = console.send(bytes) {
            if e.kind() == std::io::ErrorKind::BrokenPipe {
                self.crash();
                return Err(Error::ProcessExited {
                    command: command.to_string(),
                });
            }
            return Err(e.into());
        }
        Ok(())
    }

    /// Receive once. Returns whether any data arrived.
    fn pump(&mut self, timeout: Duration, command: &str) -> Result<bool> {
        if self.cancel.is_cancelled() {
            log::warn!("cancelled during {command:?}");
            self.crash();
            return Err(Error::Cancelled);
        }
        let Some(console) = self.console.as_mut() else {
            return Err(Error::SessionCrashed);
        };
        match console.recv(timeout) {
            Received::Data(bytes) => {
                // Latin-1: every byte is one char, high-bit text included.
                self.buffer.extend(bytes.iter().map(|&b| char::from(b)));
                Ok(true)
            }
            Received::Idle => Ok(false),
            Received::Closed => {
                log::warn!("emulator closed its console during {command:?}");
                self.crash();
                Err(Error::ProcessExited {
                    command: command.to_string(),
                })
            }
        }
    }

    /// Accumulate output until `prompt` matches; return what preceded it.
    fn wait_for(&mut self, prompt: Prompt, timeout: Duration, command: &str) -> Result<String> {
        let started = Instant::now();
        loop {
            let found = self
                .pattern(prompt)
                .find(&self.buffer)
                .map(|m| (m.start(), m.end()));
            if let Some((start, end)) = found {
                let before = self.buffer[..start].to_string();
                self.buffer.drain(..end);
                return Ok(before);
            }
            let elapsed = started.elapsed();
            if elapsed >= timeout {
                return Err(Error::Timeout {
                    command: command.to_string(),
                    waiting_for: self.pattern(prompt).as_str().to_string(),
                    elapsed,
                });
            }
            self.pump((timeout - elapsed).min(POLL), command)?;
        }
    }

    /// Discard output until the console goes quiet.
    fn drain(&mut self, command: &str) -> Result<()> {
        let quiet = self.config.quiet;
        for _ in 0..DRAIN_ROUNDS {
            if !self.pump(quiet, command)? {
                break;
            }
        }
        if !self.buffer.is_empty() {
            log::trace!("discarding stale output {:?}", self.buffer);
            self.buffer.clear();
        }
        Ok(())
    }

    /// One flush-and-reprompt attempt. Crashes the session if it fails.
    fn resync(&mut self, prompt: Prompt, command: &str) -> bool {
        if !self.state.is_live() {
            return false;
        }
        log::warn!("resynchronising after {command:?}");
        self.buffer.clear();
        let (reprompt, target) = match prompt {
            Prompt::Debugger | Prompt::Resumed => (
                format!("{}{}", self.config.prompts.debugger_reprompt, self.config.newline),
                Prompt::Debugger,
            ),
            Prompt::Basic => (self.config.prompts.basic_reprompt.clone(), Prompt::Basic),
        };
        if self.send_raw(reprompt.as_bytes(), "resync").is_err() {
            self.crash();
            return false;
        }
        let timeout = self.config.command_timeout;
        match self.wait_for(target, timeout, "resync").and_then(|_| self.drain("resync")) {
            Ok(()) => {
                log::info!("resynchronised after {command:?}");
                true
            }
            Err(e) => {
                log::error!("resync after {command:?} failed: {e}");
                self.crash();
                false
            }
        }
    }

    /// Start a session on a freshly launched console and wait for BASIC.
    pub fn boot(&mut self, console: C) -> Result<String> {
        if self.console.is_some() {
            self.shutdown();
        }
        self.cancel.clear();
        self.console = Some(console);
        self.buffer.clear();
        self.banner.clear();
        self.set_state(SessionState::Booting);
        self.await_basic("boot")
    }

    fn await_basic(&mut self, command: &str) -> Result<String> {
        let timeout = self.config.boot_timeout;
        let result = self
            .wait_for(Prompt::Basic, timeout, command)
            .and_then(|text| self.drain(command).map(|()| text));
        match result {
            Ok(text) => {
                self.generation += 1;
                self.verify_failures = 0;
                self.set_state(SessionState::AtCommandPrompt);
                Ok(text)
            }
            Err(e) => {
                log::error!("{command} did not reach the BASIC prompt: {e}");
                self.crash();
                Err(e)
            }
        }
    }

    /// Write `text` and collect output up to `prompt`.
    ///
    /// Lines go to the debugger with the configured newline and to the
    /// keyboard with the configured return key, depending on which prompt
    /// the emulator is showing.
    pub fn send_command(&mut self, text: &str, prompt: Prompt, timeout: Duration) -> Result<Vec<String>> {
        self.guard("command")?;
        self.drain(text)?;
        let terminator = if self.state.at_debugger() {
            &self.config.newline
        } else {
            &self.config.key_return
        };
        let line = format!("{text}{terminator}");
        log::debug!("> {text}");
        self.send_raw(line.as_bytes(), text)?;
        match self.wait_for(prompt, timeout, text) {
            Ok(output) => Ok(response_lines(&output, text)),
            Err(e @ Error::Timeout { .. }) => {
                log::warn!("{e}");
                self.resync(prompt, text);
                Err(e)
            }
            Err(e) => Err(e),
        }
    }

    /// Halt the CPU at the debugger prompt with two Ctrl-C bytes.
    pub fn enter_debugger(&mut self) -> Result<()> {
        self.guard("enter the debugger")?;
        if self.state.at_debugger() {
            return Ok(());
        }
        let attempts = self.config.debugger_attempts.max(1);
        let gap = self.config.ctrl_c_gap;
        let timeout = self.config.debugger_timeout;
        let mut last = Error::SessionCrashed;
        for attempt in 1..=attempts {
            self.drain("^C^C")?;
            self.send_raw(&[0x03], "^C")?;
            thread::sleep(gap);
            self.send_raw(&[0x03], "^C")?;
            match self.wait_for(Prompt::Debugger, timeout, "^C^C") {
                Ok(banner) => {
                    self.banner = banner;
                    self.set_state(SessionState::AtDebugger);
                    return Ok(());
                }
                Err(e @ Error::Timeout { .. }) => {
                    log::warn!("debugger did not answer (attempt {attempt}/{attempts})");
                    last = e;
                }
                Err(e) => return Err(e),
            }
        }
        self.crash();
        Err(last)
    }

    /// Let the CPU run again.
    pub fn exit_debugger(&mut self) -> Result<()> {
        self.guard("leave the debugger")?;
        match self.state {
            SessionState::AtDebugger => {}
            SessionState::AtCommandPrompt => return Ok(()),
            s => {
                return Err(Error::NotReady {
                    operation: "leave the debugger",
                    state: s.to_string(),
                });
            }
        }
        let timeout = self.config.command_timeout;
        self.send_command("c", Prompt::Resumed, timeout)?;
        self.drain("c")?;
        self.set_state(SessionState::AtCommandPrompt);
        Ok(())
    }

    /// Run one debugger command. The session must be at the debugger.
    pub fn debugger_command(&mut self, text: &str) -> Result<Vec<String>> {
        let timeout = self.config.command_timeout;
        self.debugger_command_with_timeout(text, timeout)
    }

    pub fn debugger_command_with_timeout(&mut self, text: &str, timeout: Duration) -> Result<Vec<String>> {
        self.guard("debugger command")?;
        if !self.state.at_debugger() {
            return Err(Error::NotReady {
                operation: "debugger command",
                state: self.state.to_string(),
            });
        }
        self.send_command(text, Prompt::Debugger, timeout)
    }

    /// Read `count` bytes as the CPU currently sees them.
    pub fn read_memory(&mut self, address: u16, count: usize) -> Result<Vec<u8>> {
        if count == 0 {
            return Ok(Vec::new());
        }
        let last = u32::from(address) + count as u32 - 1;
        if last > 0xFFFF {
            return Err(Error::InvalidAddress(apple2_memory::AddressError::InvalidAddress {
                address: last,
                region: None,
            }));
        }
        let chunk = self.config.read_chunk.max(1) as u32;
        let mut out = Vec::with_capacity(count);
        let mut next = u32::from(address);
        while next <= last {
            let end = (next + chunk - 1).min(last);
            let len = (end - next + 1) as usize;
            let command = if end == next {
                format!("{next:04X}")
            } else {
                format!("{next:04X}.{end:04X}")
            };
            let timeout = self.config.command_timeout + Duration::from_millis(len as u64 / 64);
            let lines = self.debugger_command_with_timeout(&command, timeout)?;
            match parse_dump(&lines, next as u16, len) {
                Ok(bytes) => out.extend(bytes),
                Err(detail) => {
                    log::warn!("bad dump for {command}: {detail}");
                    self.resync(Prompt::Debugger, &command);
                    return Err(Error::ProtocolDesync { command, detail });
                }
            }
            next = end + 1;
        }
        Ok(out)
    }

    /// Write bytes as the CPU currently sees memory.
    ///
    /// With `verify`, the first and last byte are read back. The first
    /// mismatch is reported and the session stays usable; a second
    /// mismatch in a row crashes the session.
    pub fn write_memory(&mut self, address: u16, bytes: &[u8], verify: bool) -> Result<()> {
        if bytes.is_empty() {
            return Ok(());
        }
        let last = u32::from(address) + bytes.len() as u32 - 1;
        if last > 0xFFFF {
            return Err(Error::InvalidAddress(apple2_memory::AddressError::InvalidAddress {
                address: last,
                region: None,
            }));
        }
        let chunk = self.config.write_chunk.max(1);
        for (i, part) in bytes.chunks(chunk).enumerate() {
            let at = u32::from(address) + (i * chunk) as u32;
            let hex: Vec<String> = part.iter().map(|b| format!("{b:02X}")).collect();
            self.debugger_command(&format!("{at:04X}: {}", hex.join(" ")))?;
        }
        if verify {
            self.verify_write(address, bytes)?;
        }
        Ok(())
    }

    fn verify_write(&mut self, address: u16, bytes: &[u8]) -> Result<()> {
        let last_offset = bytes.len() - 1;
        let mut checks = vec![(address, bytes[0])];
        if last_offset > 0 {
            checks.push((address + last_offset as u16, bytes[last_offset]));
        }
        for (at, expected) in checks {
            let read = self.read_memory(at, 1)?;
            let actual = read.first().copied().unwrap_or(!expected);
            if actual != expected {
                self.verify_failures += 1;
                if self.verify_failures >= 2 {
                    log::error!("second consecutive verification failure at ${at:04X}");
                    self.crash();
                    return Err(Error::SessionCrashed);
                }
                log::warn!("verification failed at ${at:04X}: wrote {expected:02X}, read {actual:02X}");
                return Err(Error::WriteVerificationFailed {
                    address: at,
                    expected,
                    actual,
                });
            }
        }
        self.verify_failures = 0;
        Ok(())
    }

    /// Type a line at the BASIC prompt and wait up to `timeout` for the
    /// prompt to return.
    pub fn type_line_within(&mut self, text: &str, timeout: Duration) -> Result<Vec<String>> {
        self.require_prompt("type a line")?;
        self.send_command(text, Prompt::Basic, timeout)
    }

    /// Put raw bytes on the keyboard and collect whatever the machine
    /// prints within `settle`. No prompt is awaited, so keys can answer a
    /// `GET` or stop a running program.
    pub fn send_keys(&mut self, bytes: &[u8], settle: Duration) -> Result<Vec<String>> {
        self.require_prompt("send keys")?;
        let command = bytes.escape_ascii().to_string();
        self.drain(&command)?;
        log::debug!("keys {command}");
        self.send_raw(bytes, &command)?;
        let started = Instant::now();
        loop {
            let elapsed = started.elapsed();
            if elapsed >= settle {
                break;
            }
            self.pump((settle - elapsed).min(POLL), &command)?;
        }
        let output = std::mem::take(&mut self.buffer);
        Ok(output
            .lines()
            .map(|l| l.trim_end().to_string())
            .filter(|l| !l.is_empty())
            .collect())
    }

    fn require_prompt(&self, operation: &'static str) -> Result<()> {
        self.guard(operation)?;
        if self.state != SessionState::AtCommandPrompt {
            return Err(Error::NotReady {
                operation,
                state: self.state.to_string(),
            });
        }
        Ok(())
    }

    /// Registers as of the current debugger entry.
    pub fn registers(&mut self) -> Result<Registers> {
        self.guard("read registers")?;
        let entered = !self.state.at_debugger();
        if entered {
            self.enter_debugger()?;
        }
        let registers = Registers::parse(&self.banner).ok_or_else(|| Error::ProtocolDesync {
            command: "^C^C".to_string(),
            detail: "no register line in the debugger banner".to_string(),
        });
        if entered {
            self.exit_debugger()?;
        }
        registers
    }

    /// Warm (`r`) or cold (`rr`) reset, back to the BASIC prompt.
    pub fn reset(&mut self, cold: bool) -> Result<String> {
        self.guard("reset")?;
        if self.state == SessionState::AtCommandPrompt {
            self.enter_debugger()?;
        }
        let command = if cold { "rr" } else { "r" };
        self.drain(command)?;
        let line = format!("{command}{}", self.config.newline);
        log::debug!("> {command}");
        self.send_raw(line.as_bytes(), command)?;
        self.set_state(SessionState::Booting);
        self.await_basic(command)
    }

    /// Halt the machine until [`Session::resume`].
    pub fn pause(&mut self) -> Result<()> {
        self.guard("pause")?;
        let prior = match self.state {
            SessionState::AtCommandPrompt => {
                self.enter_debugger()?;
                PriorState::CommandPrompt
            }
            SessionState::AtDebugger => PriorState::Debugger,
            _ => return Ok(()),
        };
        self.set_state(SessionState::Paused { prior });
        Ok(())
    }

    pub fn resume(&mut self) -> Result<()> {
        self.guard("resume")?;
        match self.state {
            SessionState::Paused {
                prior: PriorState::CommandPrompt,
            } => {
                self.set_state(SessionState::AtDebugger);
                self.exit_debugger()
            }
            SessionState::Paused {
                prior: PriorState::Debugger,
            } => {
                self.set_state(SessionState::AtDebugger);
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// Dump all RAM to `path` with the debugger's `save-ram`.
    pub fn save_ram(&mut self, path: &std::path::Path) -> Result<()> {
        self.debugger_command(&format!("save-ram {}", path.display()))?;
        if path.exists() {
            Ok(())
        } else {
            Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("save-ram did not create {}", path.display()),
            )))
        }
    }

    /// Quit the emulator. Always ends `Uninitialized`.
    pub fn shutdown(&mut self) {
        if self.state == SessionState::AtCommandPrompt
            && let Err(e) = self.enter_debugger()
        {
            log::warn!("could not reach the debugger to quit: {e}");
        }
        if self.state.at_debugger() {
            let quit = format!("q{}", self.config.newline);
            if self.send_raw(quit.as_bytes(), "q").is_ok() {
                let deadline = Instant::now() + QUIT_TIMEOUT;
                while let Some(console) = self.console.as_mut() {
                    if Instant::now() >= deadline || console.recv(POLL) == Received::Closed {
                        break;
                    }
                }
            }
        }
        if let Some(mut console) = self.console.take() {
            console.kill();
        }
        self.buffer.clear();
        self.set_state(SessionState::Uninitialized);
    }
}

impl<C: Console> Drop for Session<C> {
    fn drop(&mut self) {
        if let Some(mut console) = self.console.take() {
            console.kill();
        }
    }
}
