//! Scripted stand-in for the Bobbin console.
//!
//! `FakeBobbin` speaks the same byte protocol as `bobbin --simple`: a BASIC
//! prompt fed by `\r`-terminated lines, a debugger entered with two Ctrl-C
//! bytes and driven by `\n`-terminated commands. Memory is a full IIe with
//! aux RAM, language card and soft switches, routed with the same tables
//! the client uses. Typed program lines are crunched and stored at `$0801`
//! the way the interpreter stores them.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock, Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use apple2_console::config::{Apple2Config, Machine, SessionConfig};
use apple2_console::console::{Console, Launcher, Received};
use apple2_console::{Apple2, Error, Result};
use apple2_memory::constants::{ARYTAB, CH, CV, DEFAULT_HIMEM, FRETOP, MEMSIZE, PRGEND, STREND, TXTTAB, VARTAB};
use apple2_memory::layout::{TEXT_COLUMNS, TEXT_ROWS};
use apple2_memory::{Access, Bank, LcBank, Page, SoftSwitches, SwitchAccess, text_row_address, translate_any};
use format_applesoft::tokens::{FIRST_TOKEN, LAST_TOKEN, TOKEN_DATA, TOKEN_REM, keyword};
use regex::Regex;

const PROGRAM_START: u16 = 0x0801;
const BOOT_BANNER: &str = "Bobbin (fake) - Apple //e emulator\n";

static WRITE_COMMAND: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([0-9A-F]{4}):((?:\s+[0-9A-F]{2})+)$").expect("valid regex"));
static READ_COMMAND: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([0-9A-F]{4})(?:\.([0-9A-F]{4}))?$").expect("valid regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Basic,
    Debugger,
    Closed,
}

/// Everything the fake emulator knows. Tests reach it through [`Fake`].
pub struct FakeState {
    mode: Mode,
    output: Vec<u8>,
    line: Vec<u8>,
    ctrl_c: u8,
    main: Vec<u8>,
    aux: Vec<u8>,
    /// `[main, aux]` x `[bank 1, bank 2, high]`.
    lc: [[Vec<u8>; 3]; 2],
    rom: Vec<u8>,
    pub switches: SoftSwitches,
    last_read: Option<u16>,
    screen: Vec<String>,
    /// Crunched bodies to use instead of the built-in cruncher, keyed by
    /// the typed text after the line number.
    pub crunch_overrides: HashMap<String, Vec<u8>>,
    pub registers_line: String,
    pub pc_line: String,
    /// Stop producing any output.
    pub hang: bool,
    /// Ignore debugger writes to RAM.
    pub drop_writes: bool,
    /// Addresses that ignore writes while everything around them works.
    pub stuck: HashSet<u16>,
    /// Leave the last byte off every dump.
    pub short_reads: bool,
    /// Make the next launch fail.
    pub fail_launch: bool,
    /// Debugger command lines, in order.
    pub commands: Vec<String>,
    /// Lines typed at the BASIC prompt, in order.
    pub typed: Vec<String>,
    /// Every byte the keyboard received while BASIC was running.
    pub keys: Vec<u8>,
    pub launches: usize,
    pub machine: Option<Machine>,
}

impl Default for FakeState {
    fn default() -> Self {
        Self {
            mode: Mode::Closed,
            output: Vec::new(),
            line: Vec::new(),
            ctrl_c: 0,
            main: vec![0; 0x1_0000],
            aux: vec![0; 0x1_0000],
            lc: [
                [vec![0; 0x1000], vec![0; 0x1000], vec![0; 0x2000]],
                [vec![0; 0x1000], vec![0; 0x1000], vec![0; 0x2000]],
            ],
            rom: vec![0x60; 0x1_0000],
            switches: SoftSwitches::default(),
            last_read: None,
            screen: Vec::new(),
            crunch_overrides: HashMap::new(),
            registers_line: "ACC: A0  X: 01  Y: 05  SP: F4   [N] V [U] [B] D I [Z] C".to_string(),
            pc_line: "FD1B:   10 FB       BPL   $FD18".to_string(),
            hang: false,
            drop_writes: false,
            stuck: HashSet::new(),
            short_reads: false,
            fail_launch: false,
            commands: Vec::new(),
            typed: Vec::new(),
            keys: Vec::new(),
            launches: 0,
            machine: None,
        }
    }
}

/// Switches as the ROM leaves them at the `]` prompt.
fn boot_switches() -> SoftSwitches {
    SoftSwitches {
        text: true,
        ..SoftSwitches::default()
    }
}

impl FakeState {
    fn emit(&mut self, text: &str) {
        if !self.hang {
            self.output.extend(text.bytes());
        }
    }

    fn power_on(&mut self, machine: Machine) {
        let knobs = (
            std::mem::take(&mut self.crunch_overrides),
            self.hang,
            self.drop_writes,
            self.short_reads,
            self.launches,
        );
        let commands = std::mem::take(&mut self.commands);
        let typed = std::mem::take(&mut self.typed);
        *self = FakeState::default();
        (self.crunch_overrides, self.hang, self.drop_writes, self.short_reads, self.launches) = knobs;
        self.commands = commands;
        self.typed = typed;
        self.launches += 1;
        self.machine = Some(machine);
        self.cold_start();
        self.emit(BOOT_BANNER);
        self.emit("]");
    }

    fn cold_start(&mut self) {
        self.switches = boot_switches();
        self.main[..0xC000].fill(0);
        self.aux[..0xC000].fill(0);
        self.store_program(&[]);
        self.screen = vec!["APPLE //E".to_string(), String::new(), "]".to_string()];
        self.render_screen();
        self.mode = Mode::Basic;
    }

    // === Memory ===

    fn status(&self, address: u16) -> u8 {
        let s = &self.switches;
        let on = match address {
            0xC011 => s.lc_bank2,
            0xC012 => s.lc_read,
            0xC013 => s.aux_read,
            0xC014 => s.aux_write,
            0xC016 => s.alt_zero_page,
            0xC018 => s.store80,
            0xC01A => s.text,
            0xC01B => s.mixed,
            0xC01C => s.page2,
            0xC01D => s.hires,
            0xC01E => s.alt_charset,
            0xC01F => s.col80,
            0xC07F => s.double_hires,
            _ => false,
        };
        if on { 0x80 } else { 0x00 }
    }

    fn cell(&mut self, bank: Bank, address: u16) -> Option<&mut u8> {
        let a = usize::from(address);
        match bank {
            Bank::Main => self.main.get_mut(a),
            Bank::Aux => self.aux.get_mut(a),
            Bank::Rom => self.rom.get_mut(a),
            Bank::Io => None,
            Bank::LanguageCard { aux, bank } => {
                let side = usize::from(aux);
                match bank {
                    LcBank::One => self.lc[side][0].get_mut(a - 0xD000),
                    LcBank::Two => self.lc[side][1].get_mut(a - 0xD000),
                    LcBank::High => self.lc[side][2].get_mut(a - 0xE000),
                }
            }
        }
    }

    /// A CPU read, with soft-switch side effects.
    pub fn read(&mut self, address: u16) -> u8 {
        let repeat = if self.last_read == Some(address) { 2 } else { 1 };
        self.last_read = Some(address);
        match address {
            0xC011..=0xC01F | 0xC07F => self.status(address),
            0xC000..=0xC0FF => {
                self.switches.apply(SwitchAccess::read(address, repeat));
                0
            }
            _ => {
                let Ok(physical) = translate_any(address, &self.switches, Access::Read) else {
                    return 0;
                };
                self.cell(physical.bank, address).map_or(0, |b| *b)
            }
        }
    }

    /// A CPU write, with soft-switch side effects.
    pub fn write(&mut self, address: u16, value: u8) {
        self.last_read = None;
        if (0xC000..=0xC0FF).contains(&address) {
            self.switches.apply(SwitchAccess::write(address));
            return;
        }
        if self.drop_writes || self.stuck.contains(&address) {
            return;
        }
        let Ok(physical) = translate_any(address, &self.switches, Access::Write) else {
            return;
        };
        if physical.bank == Bank::Rom {
            return;
        }
        if let Some(cell) = self.cell(physical.bank, address) {
            *cell = value;
        }
    }

    /// Byte in a specific bank, bypassing the switches.
    pub fn bank_byte(&mut self, bank: Bank, address: u16) -> u8 {
        self.cell(bank, address).map_or(0, |b| *b)
    }

    pub fn set_bank_byte(&mut self, bank: Bank, address: u16, value: u8) {
        if let Some(cell) = self.cell(bank, address) {
            *cell = value;
        }
    }

    pub fn main_word(&self, address: u16) -> u16 {
        let a = usize::from(address);
        u16::from_le_bytes([self.main[a], self.main[a + 1]])
    }

    fn set_main_word(&mut self, address: u16, value: u16) {
        let a = usize::from(address);
        self.main[a..a + 2].copy_from_slice(&value.to_le_bytes());
    }

    // === Screen ===

    fn render_screen(&mut self) {
        while self.screen.len() > TEXT_ROWS {
            self.screen.remove(0);
        }
        for row in 0..TEXT_ROWS {
            let Ok(base) = text_row_address(Page::One, row) else {
                continue;
            };
            let text = self.screen.get(row).cloned().unwrap_or_default();
            let mut chars = text.bytes();
            for column in 0..TEXT_COLUMNS {
                let c = chars.next().unwrap_or(b' ');
                self.main[usize::from(base) + column] = c.to_ascii_uppercase() | 0x80;
            }
        }
        let row = self.screen.len().saturating_sub(1);
        self.main[usize::from(CV)] = row as u8;
        self.main[usize::from(CH)] = self.screen.last().map_or(0, String::len) as u8;
    }

    fn show(&mut self, line: &str) {
        self.screen.push(line.to_string());
    }

    // === Applesoft ===

    /// Program lines as stored from `TXTTAB`.
    pub fn stored_program(&self) -> Vec<(u16, Vec<u8>)> {
        let mut lines = Vec::new();
        let mut at = usize::from(self.main_word(TXTTAB));
        while at + 4 < 0xC000 && lines.len() < 1000 {
            let link = usize::from(u16::from_le_bytes([self.main[at], self.main[at + 1]]));
            if link == 0 {
                break;
            }
            let number = u16::from_le_bytes([self.main[at + 2], self.main[at + 3]]);
            let body_start = at + 4;
            let body_end = (body_start..0xC000).find(|&i| self.main[i] == 0).unwrap_or(0xC000);
            lines.push((number, self.main[body_start..body_end].to_vec()));
            if link <= at {
                break;
            }
            at = link;
        }
        lines
    }

    /// Write `lines` at `$0801` and point the interpreter at them.
    fn store_program(&mut self, lines: &[(u16, Vec<u8>)]) {
        let mut bytes = Vec::new();
        let mut at = usize::from(PROGRAM_START);
        for (number, body) in lines {
            let next = at + 4 + body.len() + 1;
            bytes.extend((next as u16).to_le_bytes());
            bytes.extend(number.to_le_bytes());
            bytes.extend(body);
            bytes.push(0);
            at = next;
        }
        bytes.extend([0, 0]);
        let start = usize::from(PROGRAM_START);
        self.main[start..start + bytes.len()].copy_from_slice(&bytes);
        let end = PROGRAM_START + bytes.len() as u16;
        self.set_main_word(TXTTAB, PROGRAM_START);
        for pointer in [VARTAB, ARYTAB, STREND, PRGEND] {
            self.set_main_word(pointer, end);
        }
        self.set_main_word(FRETOP, DEFAULT_HIMEM);
        self.set_main_word(MEMSIZE, DEFAULT_HIMEM);
    }

    fn enter_line(&mut self, number: u16, text: &str) {
        let mut lines: Vec<(u16, Vec<u8>)> = self
            .stored_program()
            .into_iter()
            .filter(|(n, _)| *n != number)
            .collect();
        if !text.is_empty() {
            let body = self
                .crunch_overrides
                .get(text)
                .cloned()
                .unwrap_or_else(|| crunch(text));
            lines.push((number, body));
            lines.sort_by_key(|(n, _)| *n);
        }
        self.store_program(&lines);
    }

    /// Output of a crunched statement; only `PRINT "..."` and `END` mean
    /// anything here.
    fn execute(body: &[u8], output: &mut Vec<String>) -> bool {
        match body {
            [0xBA, b'"', rest @ ..] => {
                let text: String = rest.iter().take_while(|&&b| b != b'"').map(|&b| char::from(b)).collect();
                output.push(text);
                true
            }
            [0xBA] => {
                output.push(String::new());
                true
            }
            [0x80, ..] => false,
            _ => true,
        }
    }

    fn basic_line(&mut self, line: &str) {
        self.typed.push(line.to_string());
        let mut out = vec![];
        let text = line.trim();
        let digits: String = text.chars().take_while(char::is_ascii_digit).collect();
        if !digits.is_empty() {
            match digits.parse::<u16>() {
                Ok(number) if number <= 63999 => {
                    self.enter_line(number, text[digits.len()..].trim_start());
                }
                _ => out.push("?SYNTAX ERROR".to_string()),
            }
        } else if text == "NEW" {
            self.store_program(&[]);
        } else if text == "RUN" {
            for (_, body) in self.stored_program() {
                if !Self::execute(&body, &mut out) {
                    break;
                }
            }
        } else if text.starts_with("PRINT") {
            Self::execute(&crunch(text), &mut out);
        } else if !text.is_empty() {
            out.push("?SYNTAX ERROR".to_string());
        }

        let mut reply = format!("{line}\n");
        self.show(&format!("]{line}"));
        for l in &out {
            reply.push_str(l);
            reply.push('\n');
            self.show(l);
        }
        reply.push(']');
        self.show("]");
        self.render_screen();
        self.emit(&reply);
    }

    // === Debugger ===

    fn banner(&self) -> String {
        format!("\n{}\n{}\n", self.registers_line, self.pc_line)
    }

    fn dump(&mut self, start: u16, end: u16) -> String {
        let mut bytes: Vec<(u16, u8)> = (start..=end).map(|a| (a, self.read(a))).collect();
        if self.short_reads {
            bytes.pop();
        }
        let mut text = String::new();
        for chunk in bytes.chunks(8) {
            let hex: Vec<String> = chunk.iter().map(|(_, b)| format!("{b:02X}")).collect();
            text.push_str(&format!("{:04X}: {}\n", chunk[0].0, hex.join(" ")));
        }
        text
    }

    fn debugger_line(&mut self, line: &str) {
        let line = line.trim().to_string();
        self.commands.push(line.clone());
        if let Some(caps) = WRITE_COMMAND.captures(&line) {
            let start = u16::from_str_radix(&caps[1], 16).expect("hex");
            for (i, token) in caps[2].split_whitespace().enumerate() {
                let value = u8::from_str_radix(token, 16).expect("hex");
                self.write(start.wrapping_add(i as u16), value);
            }
            self.emit("BOBBIN> ");
            return;
        }
        if let Some(caps) = READ_COMMAND.captures(&line) {
            let start = u16::from_str_radix(&caps[1], 16).expect("hex");
            let end = caps.get(2).map_or(start, |m| u16::from_str_radix(m.as_str(), 16).expect("hex"));
            let text = self.dump(start, end.max(start));
            self.emit(&text);
            self.emit("BOBBIN> ");
            return;
        }
        match line.as_str() {
            "help" => self.emit("Commands: c r rr q save-ram <file> XXXX XXXX.YYYY XXXX: NN\nBOBBIN> "),
            "c" => {
                self.emit("Continuing...\n");
                self.mode = Mode::Basic;
            }
            "r" | "rr" => {
                self.switches = boot_switches();
                if line == "rr" {
                    self.cold_start();
                }
                self.mode = Mode::Basic;
                self.emit("\n]");
            }
            "q" => {
                self.mode = Mode::Closed;
            }
            other if other.starts_with("save-ram ") => {
                let path = other.trim_start_matches("save-ram ").trim();
                let ok = std::fs::write(path, &self.main).is_ok();
                self.emit(if ok { "Saved.\n" } else { "Could not save.\n" });
                self.emit("BOBBIN> ");
            }
            _ => self.emit("Unknown command.\nBOBBIN> "),
        }
    }

    fn receive(&mut self, byte: u8) {
        if self.mode == Mode::Basic {
            self.keys.push(byte);
        }
        match self.mode {
            Mode::Closed => {}
            Mode::Basic => match byte {
                0x03 => {
                    self.ctrl_c += 1;
                    if self.ctrl_c >= 2 {
                        self.ctrl_c = 0;
                        self.mode = Mode::Debugger;
                        let banner = self.banner();
                        self.emit(&banner);
                        self.emit("BOBBIN> ");
                    }
                }
                b'\r' => {
                    self.ctrl_c = 0;
                    let line = String::from_utf8_lossy(&std::mem::take(&mut self.line)).into_owned();
                    self.basic_line(&line);
                }
                b'\n' => {}
                // GETLN ignores ESC; nothing reaches the line.
                0x1B => self.ctrl_c = 0,
                _ => {
                    self.ctrl_c = 0;
                    self.line.push(byte);
                }
            },
            Mode::Debugger => match byte {
                b'\n' => {
                    let line = String::from_utf8_lossy(&std::mem::take(&mut self.line)).into_owned();
                    self.debugger_line(&line);
                }
                b'\r' | 0x03 => {}
                _ => self.line.push(byte),
            },
        }
    }
}

/// Applesoft's cruncher, for the lines the fake understands: spaces
/// dropped outside strings, keywords replaced by tokens in table order,
/// `REM` and `DATA` bodies kept verbatim.
pub fn crunch(text: &str) -> Vec<u8> {
    let bytes = text.as_bytes();
    let mut out = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        let c = bytes[i];
        if c == b' ' {
            i += 1;
            continue;
        }
        if c == b'"' {
            out.push(c);
            i += 1;
            while i < bytes.len() {
                out.push(bytes[i]);
                i += 1;
                if bytes[i - 1] == b'"' {
                    break;
                }
            }
            continue;
        }
        if let Some((token, used)) = match_keyword(&bytes[i..]) {
            out.push(token);
            i += used;
            if token == TOKEN_REM {
                out.extend(&bytes[i..]);
                break;
            }
            if token == TOKEN_DATA {
                let mut quoted = false;
                while i < bytes.len() && (quoted || bytes[i] != b':') {
                    quoted ^= bytes[i] == b'"';
                    out.push(bytes[i]);
                    i += 1;
                }
            }
            continue;
        }
        out.push(c);
        i += 1;
    }
    out
}

fn match_keyword(rest: &[u8]) -> Option<(u8, usize)> {
    for token in FIRST_TOKEN..=LAST_TOKEN {
        let word = keyword(token)?.as_bytes();
        let mut used = 0;
        let mut matched = 0;
        while matched < word.len() && used < rest.len() {
            if rest[used] == b' ' {
                used += 1;
                continue;
            }
            if rest[used] != word[matched] {
                break;
            }
            used += 1;
            matched += 1;
        }
        if matched < word.len() {
            continue;
        }
        // "AT" followed by "N" is ATN.
        if word == b"AT" && rest[used..].iter().find(|&&b| b != b' ') == Some(&b'N') {
            continue;
        }
        return Some((token, used));
    }
    None
}

/// Handle on the fake shared by the console, the launcher and the test.
#[derive(Clone, Default)]
pub struct Fake(Arc<Mutex<FakeState>>);

impl Fake {
    pub fn state(&self) -> MutexGuard<'_, FakeState> {
        self.0.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Make the emulator exit as if it crashed.
    pub fn exit(&self) {
        self.state().mode = Mode::Closed;
    }

    pub fn in_debugger(&self) -> bool {
        self.state().mode == Mode::Debugger
    }
}

pub struct FakeConsole {
    fake: Fake,
}

impl Console for FakeConsole {
    fn send(&mut self, bytes: &[u8]) -> io::Result<()> {
        let mut state = self.fake.state();
        if state.mode == Mode::Closed {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "emulator exited"));
        }
        for &b in bytes {
            state.receive(b);
        }
        Ok(())
    }

    fn recv(&mut self, timeout: Duration) -> Received {
        {
            let mut state = self.fake.state();
            if !state.output.is_empty() {
                return Received::Data(std::mem::take(&mut state.output));
            }
            if state.mode == Mode::Closed {
                return Received::Closed;
            }
        }
        thread::sleep(timeout.min(Duration::from_millis(2)));
        Received::Idle
    }

    fn is_alive(&mut self) -> bool {
        self.fake.state().mode != Mode::Closed
    }

    fn kill(&mut self) {
        let mut state = self.fake.state();
        state.mode = Mode::Closed;
        state.output.clear();
    }
}

pub struct FakeLauncher {
    fake: Fake,
    machine: Machine,
}

impl FakeLauncher {
    pub fn new(fake: Fake, machine: Machine) -> Self {
        Self { fake, machine }
    }
}

impl Launcher for FakeLauncher {
    type Console = FakeConsole;

    fn launch(&mut self) -> Result<FakeConsole> {
        let mut state = self.fake.state();
        if state.fail_launch {
            state.fail_launch = false;
            return Err(Error::Io(io::Error::new(io::ErrorKind::NotFound, "no emulator")));
        }
        state.power_on(self.machine);
        Ok(FakeConsole {
            fake: self.fake.clone(),
        })
    }

    fn machine(&self) -> Machine {
        self.machine
    }

    fn select(&mut self, machine: Machine, _disk: Option<PathBuf>) {
        self.machine = machine;
    }
}

pub fn fast_session() -> SessionConfig {
    SessionConfig {
        boot_timeout: Duration::from_secs(2),
        command_timeout: Duration::from_millis(300),
        debugger_timeout: Duration::from_millis(200),
        ctrl_c_gap: Duration::ZERO,
        debugger_attempts: 2,
        quiet: Duration::from_millis(1),
        run_timeout: Duration::from_secs(1),
        write_chunk: 16,
        read_chunk: 0x400,
        ..SessionConfig::default()
    }
}

/// A fresh directory under the system temp dir.
pub fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("apple2-console-{name}-{}", std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    dir
}

pub fn config(snapshot_dir: &Path) -> Apple2Config {
    Apple2Config {
        emulator: PathBuf::from("/nonexistent/bobbin"),
        machine: Machine::Enhanced,
        disk: None,
        session: fast_session(),
        ceiling: DEFAULT_HIMEM,
        snapshot_dir: snapshot_dir.to_path_buf(),
    }
}

pub fn machine_from(config: &Apple2Config) -> (Apple2<FakeLauncher>, Fake) {
    let fake = Fake::default();
    let launcher = FakeLauncher::new(fake.clone(), config.machine);
    let apple2 = Apple2::new(launcher, config).expect("valid prompts");
    (apple2, fake)
}

pub fn machine_in(model: Machine, snapshot_dir: &Path) -> (Apple2<FakeLauncher>, Fake) {
    let mut config = config(snapshot_dir);
    config.machine = model;
    machine_from(&config)
}

pub fn machine_with(model: Machine) -> (Apple2<FakeLauncher>, Fake) {
    machine_in(model, &std::env::temp_dir().join("apple2-console-snapshots"))
}

/// An enhanced IIe at the `]` prompt.
pub fn booted() -> (Apple2<FakeLauncher>, Fake) {
    let (mut apple2, fake) = machine_with(Machine::Enhanced);
    apple2.boot().expect("fake boots");
    (apple2, fake)
}
