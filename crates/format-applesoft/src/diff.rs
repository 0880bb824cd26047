//! Byte-level comparison of a candidate tokenization against ground truth.

use std::fmt;

use crate::program::{ByteContext, stream_contexts};
use crate::tokens::{keyword, keywords_within};

/// Known reasons two tokenizations of one line disagree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Ambiguity {
    /// A keyword was (or was not) crunched out of a variable name.
    KeywordInIdentifier,
    /// Inside quotes, where nothing is crunched.
    InsideString,
    /// After `REM`, where nothing is crunched.
    InsideRemark,
    /// After `DATA`, where nothing is crunched up to the next `:`.
    InsideData,
    /// The candidate stops early.
    Truncated,
    /// The candidate has trailing bytes.
    Extra,
    Other,
}

impl fmt::Display for Ambiguity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Ambiguity::KeywordInIdentifier => "keyword inside identifier",
            Ambiguity::InsideString => "inside string",
            Ambiguity::InsideRemark => "inside REM",
            Ambiguity::InsideData => "inside DATA",
            Ambiguity::Truncated => "candidate truncated",
            Ambiguity::Extra => "candidate has extra bytes",
            Ambiguity::Other => "other",
        };
        f.write_str(name)
    }
}

/// Result of comparing two tokenized streams.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenDiff {
    /// First offset where the streams differ, or `None` when identical.
    pub first_divergence: Option<usize>,
    /// Every offset that differs, including length overhang.
    pub differences: Vec<usize>,
    pub kind: Option<Ambiguity>,
    pub explanation: String,
}

impl TokenDiff {
    #[must_use]
    pub fn is_match(&self) -> bool {
        self.first_divergence.is_none()
    }
}

/// Compare `candidate` against the authoritative `truth`.
///
/// `source` is the line as typed and only feeds the explanation.
#[must_use]
pub fn compare(source: &str, truth: &[u8], candidate: &[u8]) -> TokenDiff {
    let longest = truth.len().max(candidate.len());
    let differences: Vec<usize> = (0..longest)
        .filter(|&i| truth.get(i) != candidate.get(i))
        .collect();
    let Some(&first) = differences.first() else {
        return TokenDiff {
            first_divergence: None,
            differences,
            kind: None,
            explanation: "tokenizations match".to_string(),
        };
    };

    // A length change inside a line shifts every later link, so explain the
    // first divergence outside the header fields.
    let contexts = stream_contexts(truth);
    let focus = differences
        .iter()
        .copied()
        .find(|&i| contexts.get(i).is_none_or(|c| *c != ByteContext::Header))
        .unwrap_or(first);
    let context = contexts.get(focus).copied().unwrap_or(ByteContext::Code);
    let (kind, explanation) = classify(source, truth, candidate, focus, context);
    TokenDiff {
        first_divergence: Some(first),
        differences,
        kind: Some(kind),
        explanation,
    }
}

fn describe(byte: Option<u8>) -> String {
    match byte {
        None => "end of data".to_string(),
        Some(b) => match keyword(b) {
            Some(k) => format!("${b:02X} ({k})"),
            None if (0x20..0x7F).contains(&b) => format!("${b:02X} ('{}')", char::from(b)),
            None => format!("${b:02X}"),
        },
    }
}

fn classify(
    source: &str,
    truth: &[u8],
    candidate: &[u8],
    at: usize,
    context: ByteContext,
) -> (Ambiguity, String) {
    let expected = truth.get(at).copied();
    let found = candidate.get(at).copied();
    let prefix = format!(
        "offset {at}: expected {}, found {}",
        describe(expected),
        describe(found)
    );

    let (Some(expected), Some(found)) = (expected, found) else {
        return if found.is_none() {
            (Ambiguity::Truncated, format!("{prefix}; candidate ends early"))
        } else {
            (Ambiguity::Extra, format!("{prefix}; candidate continues past the program end"))
        };
    };

    match context {
        ByteContext::String => {
            return (
                Ambiguity::InsideString,
                format!("{prefix}; text inside quotes is stored as typed, never as keywords"),
            );
        }
        ByteContext::Remark => {
            return (
                Ambiguity::InsideRemark,
                format!("{prefix}; everything after REM is stored as typed"),
            );
        }
        ByteContext::Data => {
            return (
                Ambiguity::InsideData,
                format!("{prefix}; DATA items are stored as typed up to the next ':'"),
            );
        }
        _ => {}
    }

    let letter = |b: u8| b.is_ascii_alphabetic();
    let crunched = match (keyword(expected), keyword(found)) {
        (Some(k), None) if letter(found) => Some(k),
        (None, Some(k)) if letter(expected) => Some(k),
        _ => None,
    };
    if let Some(word) = crunched {
        let hidden = identifier_hints(source);
        let hint = if hidden.is_empty() {
            String::new()
        } else {
            format!(" (source contains {})", hidden.join(", "))
        };
        return (
            Ambiguity::KeywordInIdentifier,
            format!(
                "{prefix}; Applesoft crunches {word} wherever it appears outside quotes, \
                 even inside a variable name{hint}"
            ),
        );
    }

    (Ambiguity::Other, prefix)
}

/// Keywords hidden in the alphabetic words of `source`.
fn identifier_hints(source: &str) -> Vec<String> {
    source
        .split(|c: char| !c.is_ascii_alphabetic())
        .filter(|w| w.len() > 2)
        .filter_map(|w| {
            let inner = keywords_within(w);
            let first = inner.first()?;
            if inner.len() == 1 && first.len() == w.len() {
                return None;
            }
            Some(format!("{first} in {w}"))
        })
        .collect()
}
