//! Applesoft BASIC tokenized programs.
//!
//! This crate understands the bytes Applesoft keeps in memory: the line
//! record grammar, the keyword table, the zero-page pointers that make a
//! program live, and how two tokenizations of the same source differ. It
//! does not tokenize source text; the interpreter is the authority on that.

use std::fmt;

pub mod diff;
pub mod listing;
pub mod pointers;
pub mod program;
pub mod tokens;

pub use diff::{Ambiguity, TokenDiff, compare};
pub use listing::{annotate, list};
pub use pointers::PointerBlock;
pub use program::{ByteContext, ProgramImage, ProgramLine, Token};
pub use tokens::keyword;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgramError {
    /// The image does not end with `00 00 00`.
    MissingSentinel { len: usize },
    /// A line record runs off the end of the image.
    Truncated { offset: usize },
    /// A next-line link does not point past its own line.
    BadLink { offset: usize, link: u16, expected: u32 },
    /// Line numbers must strictly ascend and stay within 0-63999.
    LineOrder { previous: Option<u16>, line: u16 },
    /// A line body contains the `00` terminator.
    EmbeddedZero { line: u16, offset: usize },
    /// The image does not fit below `$10000` at its load address.
    AddressOverflow { start: u16, len: usize },
}

impl fmt::Display for ProgramError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingSentinel { len } => {
                write!(f, "program of {len} bytes does not end with the 00 00 00 sentinel")
            }
            Self::Truncated { offset } => write!(f, "line record at offset {offset} is truncated"),
            Self::BadLink {
                offset,
                link,
                expected,
            } => write!(
                f,
                "line at offset {offset} links to ${link:04X}, expected ${expected:04X}"
            ),
            Self::LineOrder {
                previous: Some(previous),
                line,
            } => write!(f, "line {line} follows line {previous}"),
            Self::LineOrder {
                previous: None,
                line,
            } => write!(f, "line number {line} out of range"),
            Self::EmbeddedZero { line, offset } => {
                write!(f, "line {line} contains a zero byte at offset {offset}")
            }
            Self::AddressOverflow { start, len } => {
                write!(f, "{len} bytes at ${start:04X} run past $FFFF")
            }
        }
    }
}

impl std::error::Error for ProgramError {}
