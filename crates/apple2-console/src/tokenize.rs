//! Applesoft tokenization with the emulator as the authority.
//!
//! Live mode types the program at the BASIC prompt and reads back what the
//! interpreter stored. Process mode pipes the source through the
//! emulator's `--tokenize` mode without touching a session.

use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};

use apple2_memory::Bank;
use apple2_memory::constants::DEFAULT_PROGRAM_START;
use format_applesoft::{ProgramImage, ProgramLine, TokenDiff, compare};

use crate::console::Launcher;
use crate::error::{Error, Result};
use crate::machine::Apple2;

/// A tokenized program and its decoded lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tokenized {
    pub source: String,
    pub image: ProgramImage,
    pub lines: Vec<ProgramLine>,
}

impl Tokenized {
    fn new(source: &str, image: ProgramImage) -> Result<Self> {
        let lines = image.lines()?;
        Ok(Self {
            source: source.to_string(),
            image,
            lines,
        })
    }

    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        self.image.bytes()
    }

    #[must_use]
    pub fn hex(&self) -> String {
        let hex: Vec<String> = self.bytes().iter().map(|b| format!("{b:02X}")).collect();
        hex.join(" ")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TokenizeMode {
    #[default]
    Live,
    Process,
}

/// Uppercase outside string literals, as the keyboard would need to.
fn keyboard_case(line: &str) -> String {
    let mut quoted = false;
    line.chars()
        .map(|c| {
            if c == '"' {
                quoted = !quoted;
            }
            if quoted { c } else { c.to_ascii_uppercase() }
        })
        .collect()
}

/// Non-blank source lines, each required to start with a line number.
fn program_lines(source: &str) -> Result<Vec<String>> {
    let lines: Vec<String> = source
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(keyboard_case)
        .collect();
    if lines.is_empty() {
        return Err(Error::Tokenizer("no program lines".to_string()));
    }
    if let Some(bad) = lines.iter().find(|l| !l.starts_with(|c: char| c.is_ascii_digit())) {
        return Err(Error::Tokenizer(format!("line without a line number: {bad}")));
    }
    Ok(lines)
}

/// Runs `<emulator> --tokenize` as a filter.
#[derive(Debug, Clone)]
pub struct ProcessTokenizer {
    emulator: PathBuf,
}

impl ProcessTokenizer {
    #[must_use]
    pub fn new(emulator: impl Into<PathBuf>) -> Self {
        Self {
            emulator: emulator.into(),
        }
    }

    pub fn tokenize(&self, source: &str) -> Result<Tokenized> {
        program_lines(source)?;
        let mut child = Command::new(&self.emulator)
            .arg("--tokenize")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;
        if let Some(mut stdin) = child.stdin.take() {
            let mut text = source.to_string();
            if !text.ends_with('\n') {
                text.push('\n');
            }
            // A tokenizer that exits early is reported by its status below.
            if let Err(e) = stdin.write_all(text.as_bytes()) {
                if e.kind() != std::io::ErrorKind::BrokenPipe {
                    return Err(e.into());
                }
            }
        }
        let output = child.wait_with_output()?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::Tokenizer(format!(
                "{} --tokenize failed ({}): {}",
                self.emulator.display(),
                output.status,
                stderr.trim()
            )));
        }
        log::debug!("--tokenize produced {} bytes", output.stdout.len());
        let image = ProgramImage::parse(DEFAULT_PROGRAM_START, output.stdout)?;
        Tokenized::new(source, image)
    }
}

impl<L: Launcher> Apple2<L> {
    /// Type `source` into a cleared interpreter and read back the stored
    /// program. Destroys any program in memory.
    pub fn tokenize(&mut self, source: &str) -> Result<Tokenized> {
        let lines = program_lines(source)?;
        self.require_live("tokenize")?;
        self.type_line("NEW")?;
        for line in &lines {
            let output = self.type_line(line)?;
            if let Some(error) = output.iter().find(|l| l.starts_with('?')) {
                return Err(Error::Tokenizer(format!("{line}: {error}")));
            }
        }
        let pointers = self.basic_pointers()?;
        let len = pointers.vartab.saturating_sub(pointers.txttab);
        if len < 3 {
            return Err(Error::Tokenizer(format!(
                "interpreter stored no program (TXTTAB ${:04X}, VARTAB ${:04X})",
                pointers.txttab, pointers.vartab
            )));
        }
        let bytes = self.read_bank(Bank::Main, pointers.txttab, usize::from(len))?;
        let image = ProgramImage::parse(pointers.txttab, bytes)?;
        log::info!("tokenized {} lines into {} bytes", lines.len(), image.len());
        Tokenized::new(source, image)
    }

    pub fn tokenize_with(&mut self, source: &str, mode: TokenizeMode, emulator: &std::path::Path) -> Result<Tokenized> {
        match mode {
            TokenizeMode::Live => self.tokenize(source),
            TokenizeMode::Process => ProcessTokenizer::new(emulator).tokenize(source),
        }
    }

    /// Compare `candidate` bytes with the emulator's tokenization of
    /// `source`.
    pub fn compare_tokenization(&mut self, source: &str, candidate: &[u8]) -> Result<TokenDiff> {
        let truth = self.tokenize(source)?;
        let diff = compare(source, truth.bytes(), candidate);
        if !diff.is_match() {
            log::debug!("tokenization differs: {}", diff.explanation);
        }
        Ok(diff)
    }
}
