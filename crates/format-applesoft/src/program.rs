//! Tokenized program images.
//!
//! Memory layout of a program:
//!
//! ```text
//! [link lo][link hi][line lo][line hi][body ...][00]   one per line
//! [00][00]                                             end link
//! ```
//!
//! `link` is the absolute address of the next line's link field. The last
//! line's `00` terminator followed by the zero end link is the three-zero
//! sentinel that marks the end of the program.

use crate::ProgramError;
use crate::tokens::{TOKEN_DATA, TOKEN_REM};

/// Size of the link and line-number header.
pub const LINE_HEADER: usize = 4;
/// Largest line number Applesoft accepts.
pub const MAX_LINE_NUMBER: u16 = 63999;

/// One element of a tokenized line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token {
    NextLinePointer(u16),
    LineNumber(u16),
    Keyword(u8),
    Ascii(u8),
}

/// How a body byte is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ByteContext {
    /// Link or line-number field.
    Header,
    /// Ordinary statement text: bytes `>= $80` are keywords.
    Code,
    /// Between quotes, including the quotes themselves.
    String,
    /// After `REM`, to the end of the line.
    Remark,
    /// After `DATA`, up to the next unquoted `:`.
    Data,
    /// The `00` ending a line, or the end link.
    Terminator,
}

impl ByteContext {
    /// Whether bytes `>= $80` here are literal rather than keywords.
    #[must_use]
    pub const fn is_literal(self) -> bool {
        matches!(self, ByteContext::String | ByteContext::Remark | ByteContext::Data)
    }
}

/// Classify every byte of a line body.
#[must_use]
pub fn body_contexts(body: &[u8]) -> Vec<ByteContext> {
    let mut out = Vec::with_capacity(body.len());
    let mut in_string = false;
    let mut in_data = false;
    let mut in_remark = false;
    for &b in body {
        let ctx = if in_remark {
            ByteContext::Remark
        } else if in_string || b == b'"' {
            if b == b'"' {
                in_string = !in_string;
            }
            ByteContext::String
        } else if in_data {
            if b == b':' {
                in_data = false;
                ByteContext::Code
            } else {
                ByteContext::Data
            }
        } else {
            in_remark = b == TOKEN_REM;
            in_data = b == TOKEN_DATA;
            ByteContext::Code
        };
        out.push(ctx);
    }
    out
}

/// Classify every byte of a whole tokenized stream.
///
/// Bytes past a malformed point are reported as [`ByteContext::Code`].
#[must_use]
pub fn stream_contexts(bytes: &[u8]) -> Vec<ByteContext> {
    let mut out = Vec::with_capacity(bytes.len());
    let mut offset = 0;
    while offset < bytes.len() {
        if bytes.len() - offset >= 2 && bytes[offset] == 0 && bytes[offset + 1] == 0 {
            out.extend([ByteContext::Terminator; 2]);
            offset += 2;
            continue;
        }
        let header = LINE_HEADER.min(bytes.len() - offset);
        out.extend(std::iter::repeat_n(ByteContext::Header, header));
        offset += header;
        let end = bytes[offset..]
            .iter()
            .position(|&b| b == 0)
            .map_or(bytes.len(), |p| offset + p);
        out.extend(body_contexts(&bytes[offset..end]));
        if end < bytes.len() {
            out.push(ByteContext::Terminator);
        }
        offset = end + 1;
    }
    out.truncate(bytes.len());
    out
}

/// A decoded program line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramLine {
    /// Offset of the link field within the image.
    pub offset: usize,
    pub next_line: u16,
    pub number: u16,
    /// Body bytes, without the terminating `00`.
    pub body: Vec<u8>,
}

impl ProgramLine {
    /// The line as a token sequence, header fields first.
    #[must_use]
    pub fn tokens(&self) -> Vec<Token> {
        let mut tokens = vec![
            Token::NextLinePointer(self.next_line),
            Token::LineNumber(self.number),
        ];
        let contexts = body_contexts(&self.body);
        tokens.extend(self.body.iter().zip(contexts).map(|(&b, ctx)| {
            if b >= 0x80 && !ctx.is_literal() {
                Token::Keyword(b)
            } else {
                Token::Ascii(b)
            }
        }));
        tokens
    }

    /// Encoded length including header and terminator.
    #[must_use]
    pub fn encoded_len(&self) -> usize {
        LINE_HEADER + self.body.len() + 1
    }
}

/// A tokenized program and the address it is laid out for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramImage {
    start: u16,
    bytes: Vec<u8>,
}

impl ProgramImage {
    /// Wrap raw bytes after checking the three-zero sentinel.
    pub fn new(start: u16, bytes: Vec<u8>) -> Result<Self, ProgramError> {
        if bytes.len() < 3 || bytes[bytes.len() - 3..] != [0, 0, 0] {
            return Err(ProgramError::MissingSentinel { len: bytes.len() });
        }
        if u32::from(start) + bytes.len() as u32 > 0x1_0000 {
            return Err(ProgramError::AddressOverflow {
                start,
                len: bytes.len(),
            });
        }
        Ok(Self { start, bytes })
    }

    /// Wrap and fully parse, rejecting broken links and misordered lines.
    pub fn parse(start: u16, bytes: Vec<u8>) -> Result<Self, ProgramError> {
        let image = Self::new(start, bytes)?;
        image.lines()?;
        Ok(image)
    }

    /// Build an image at `start` from (line number, body) pairs.
    pub fn from_lines(start: u16, lines: &[(u16, Vec<u8>)]) -> Result<Self, ProgramError> {
        let mut bytes = Vec::new();
        let mut previous: Option<u16> = None;
        for (number, body) in lines {
            if *number > MAX_LINE_NUMBER || previous.is_some_and(|p| p >= *number) {
                return Err(ProgramError::LineOrder {
                    previous,
                    line: *number,
                });
            }
            if let Some(offset) = body.iter().position(|&b| b == 0) {
                return Err(ProgramError::EmbeddedZero {
                    line: *number,
                    offset,
                });
            }
            previous = Some(*number);
            let next = u32::from(start) + (bytes.len() + LINE_HEADER + body.len() + 1) as u32;
            let next = u16::try_from(next).map_err(|_| ProgramError::AddressOverflow {
                start,
                len: bytes.len(),
            })?;
            bytes.extend(next.to_le_bytes());
            bytes.extend(number.to_le_bytes());
            bytes.extend(body);
            bytes.push(0);
        }
        bytes.extend([0, 0]);
        if lines.is_empty() {
            bytes.insert(0, 0);
        }
        Self::new(start, bytes)
    }

    #[must_use]
    pub fn start_address(&self) -> u16 {
        self.start
    }

    /// First address past the image.
    #[must_use]
    pub fn end_address(&self) -> u16 {
        // Bounded by the check in `new`; a full-memory image wraps to 0.
        self.start.wrapping_add(self.bytes.len() as u16)
    }

    /// Where Applesoft starts simple variables for this image.
    #[must_use]
    pub fn variables_start(&self) -> u16 {
        self.end_address()
    }

    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Walk the link chain.
    pub fn lines(&self) -> Result<Vec<ProgramLine>, ProgramError> {
        let bytes = &self.bytes;
        let mut lines = Vec::new();
        let mut offset = 0usize;
        while offset + 1 < bytes.len() {
            let next_line = u16::from_le_bytes([bytes[offset], bytes[offset + 1]]);
            if next_line == 0 {
                return Ok(lines);
            }
            if offset + LINE_HEADER > bytes.len() {
                return Err(ProgramError::Truncated { offset });
            }
            let number = u16::from_le_bytes([bytes[offset + 2], bytes[offset + 3]]);
            if let Some(previous) = lines.last().map(|l: &ProgramLine| l.number) {
                if number <= previous {
                    return Err(ProgramError::LineOrder {
                        previous: Some(previous),
                        line: number,
                    });
                }
            }
            let body_start = offset + LINE_HEADER;
            let Some(len) = bytes[body_start..].iter().position(|&b| b == 0) else {
                return Err(ProgramError::Truncated { offset });
            };
            let following = body_start + len + 1;
            let expected = u32::from(self.start) + following as u32;
            if u32::from(next_line) != expected {
                return Err(ProgramError::BadLink {
                    offset,
                    link: next_line,
                    expected,
                });
            }
            lines.push(ProgramLine {
                offset,
                next_line,
                number,
                body: bytes[body_start..body_start + len].to_vec(),
            });
            offset = following;
        }
        Err(ProgramError::Truncated { offset })
    }

    /// Rewrite every link for a new load address.
    pub fn relocate(&self, start: u16) -> Result<Self, ProgramError> {
        let lines = self.lines()?;
        let mut bytes = self.bytes.clone();
        for line in &lines {
            let link = u32::from(start) + (line.offset + line.encoded_len()) as u32;
            let link = u16::try_from(link).map_err(|_| ProgramError::AddressOverflow {
                start,
                len: bytes.len(),
            })?;
            bytes[line.offset..line.offset + 2].copy_from_slice(&link.to_le_bytes());
        }
        Self::new(start, bytes)
    }
}
