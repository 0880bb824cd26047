//! Applesoft keyword tokens `$80-$EA`.

pub const FIRST_TOKEN: u8 = 0x80;
pub const LAST_TOKEN: u8 = 0xEA;

pub const TOKEN_DATA: u8 = 0x83;
pub const TOKEN_REM: u8 = 0xB2;

const KEYWORDS: [&str; (LAST_TOKEN - FIRST_TOKEN + 1) as usize] = [
    "END", "FOR", "NEXT", "DATA", "INPUT", "DEL", "DIM", "READ", // $80
    "GR", "TEXT", "PR#", "IN#", "CALL", "PLOT", "HLIN", "VLIN", // $88
    "HGR2", "HGR", "HCOLOR=", "HPLOT", "DRAW", "XDRAW", "HTAB", "HOME", // $90
    "ROT=", "SCALE=", "SHLOAD", "TRACE", "NOTRACE", "NORMAL", "INVERSE", "FLASH", // $98
    "COLOR=", "POP", "VTAB", "HIMEM:", "LOMEM:", "ONERR", "RESUME", "RECALL", // $A0
    "STORE", "SPEED=", "LET", "GOTO", "RUN", "IF", "RESTORE", "&", // $A8
    "GOSUB", "RETURN", "REM", "STOP", "ON", "WAIT", "LOAD", "SAVE", // $B0
    "DEF", "POKE", "PRINT", "CONT", "LIST", "CLEAR", "GET", "NEW", // $B8
    "TAB(", "TO", "FN", "SPC(", "THEN", "AT", "NOT", "STEP", // $C0
    "+", "-", "*", "/", "^", "AND", "OR", ">", // $C8
    "=", "<", "SGN", "INT", "ABS", "USR", "FRE", "SCRN(", // $D0
    "PDL", "POS", "SQR", "RND", "LOG", "EXP", "COS", "SIN", // $D8
    "TAN", "ATN", "PEEK", "LEN", "STR$", "VAL", "ASC", "CHR$", // $E0
    "LEFT$", "RIGHT$", "MID$", // $E8
];

/// Keyword text for a token byte.
#[must_use]
pub fn keyword(token: u8) -> Option<&'static str> {
    if token < FIRST_TOKEN {
        return None;
    }
    KEYWORDS.get(usize::from(token - FIRST_TOKEN)).copied()
}

/// Keywords that occur as a substring of `identifier`, longest first.
///
/// Applesoft crunches keywords even inside variable names, so `TOTAL`
/// contains `TO` and `SCALE` contains `AT`. Only alphabetic keywords are considered.
#[must_use]
pub fn keywords_within(identifier: &str) -> Vec<&'static str> {
    let upper = identifier.to_ascii_uppercase();
    let mut found: Vec<&'static str> = KEYWORDS
        .iter()
        .copied()
        .filter(|k| k.chars().next().is_some_and(|c| c.is_ascii_alphabetic()))
        .filter(|k| upper.contains(k))
        .collect();
    found.sort_by_key(|k| std::cmp::Reverse(k.len()));
    found
}
