//! Human-readable views of tokenized bytes.

use std::fmt::Write;

use crate::ProgramError;
use crate::program::{ByteContext, LINE_HEADER, ProgramImage, body_contexts};
use crate::tokens::keyword;

/// Byte-by-byte annotation of a tokenized stream.
///
/// Each line record is broken out into its link, line number, body and
/// terminator, with offsets relative to the start of `bytes`. Works on
/// partial or malformed data and stops where the grammar breaks.
#[must_use]
pub fn annotate(bytes: &[u8]) -> String {
    let mut out = String::new();
    if bytes.len() < LINE_HEADER {
        out.push_str("too short to be a tokenized program");
        return out;
    }
    let mut offset = 0;
    while offset + 1 < bytes.len() {
        let word = u16::from_le_bytes([bytes[offset], bytes[offset + 1]]);
        if word == 0 {
            let _ = writeln!(out, "{offset:5}: 00 00       end of program");
            break;
        }
        let _ = writeln!(
            out,
            "{offset:5}: {:02X} {:02X}       next line at ${word:04X}",
            bytes[offset],
            bytes[offset + 1]
        );
        offset += 2;
        if offset + 1 >= bytes.len() {
            break;
        }
        let number = u16::from_le_bytes([bytes[offset], bytes[offset + 1]]);
        let _ = writeln!(
            out,
            "{offset:5}: {:02X} {:02X}       line {number}",
            bytes[offset],
            bytes[offset + 1]
        );
        offset += 2;

        let end = bytes[offset..]
            .iter()
            .position(|&b| b == 0)
            .map_or(bytes.len(), |p| offset + p);
        let body = &bytes[offset..end];
        let parts: Vec<String> = body
            .iter()
            .zip(body_contexts(body))
            .map(|(&b, ctx)| match keyword(b) {
                Some(k) if !ctx.is_literal() => format!("{b:02X}={k}"),
                _ if (0x20..0x7F).contains(&b) => format!("{b:02X}='{}'", char::from(b)),
                _ => format!("{b:02X}"),
            })
            .collect();
        let _ = writeln!(out, "{offset:5}: {}", parts.join(" "));
        offset = end;
        if offset < bytes.len() {
            let _ = writeln!(out, "{offset:5}: 00          end of line");
            offset += 1;
        }
    }
    out
}

/// Detokenized listing, one line per program line.
pub fn list(image: &ProgramImage) -> Result<String, ProgramError> {
    let mut out = String::new();
    for line in image.lines()? {
        let mut text = String::new();
        for (&b, ctx) in line.body.iter().zip(body_contexts(&line.body)) {
            match keyword(b) {
                Some(k) if !ctx.is_literal() => {
                    if !text.is_empty() && !text.ends_with(' ') {
                        text.push(' ');
                    }
                    text.push_str(k);
                    text.push(' ');
                }
                _ if ctx == ByteContext::Code && b == b' ' && text.ends_with(' ') => {}
                _ => text.push(char::from(b & 0x7F)),
            }
        }
        let _ = writeln!(out, "{} {}", line.number, text.trim_end());
    }
    Ok(out)
}
