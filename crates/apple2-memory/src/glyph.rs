//! Text screen codes.
//!
//! | Codes       | Primary set              | Alternate set (ALTCHARSET) |
//! |-------------|--------------------------|----------------------------|
//! | `$00-$1F`   | inverse `@A-Z[\]^_`      | same                       |
//! | `$20-$3F`   | inverse `!"#..9:;<=>?`   | same                       |
//! | `$40-$5F`   | flashing `@A-Z[\]^_`     | MouseText                  |
//! | `$60-$7F`   | flashing space..`?`      | inverse lowercase          |
//! | `$80-$9F`   | normal `@A-Z[\]^_`       | same                       |
//! | `$A0-$BF`   | normal space..`?`        | same                       |
//! | `$C0-$DF`   | normal `@A-Z[\]^_`       | same                       |
//! | `$E0-$FF`   | normal lowercase         | same                       |

/// Rendering attribute of a screen code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum GlyphStyle {
    Normal,
    Inverse,
    Flashing,
    /// MouseText symbol, only with ALTCHARSET on.
    MouseText,
}

/// Character used for MouseText cells, which have no ASCII equivalent.
pub const MOUSETEXT_PLACEHOLDER: char = '\u{2592}';

/// Decode a screen code.
#[must_use]
pub const fn glyph(code: u8, alt_charset: bool) -> (char, GlyphStyle) {
    match code {
        0x00..=0x1F => ((code + 0x40) as char, GlyphStyle::Inverse),
        0x20..=0x3F => (code as char, GlyphStyle::Inverse),
        0x40..=0x5F if alt_charset => (MOUSETEXT_PLACEHOLDER, GlyphStyle::MouseText),
        0x40..=0x5F => (code as char, GlyphStyle::Flashing),
        0x60..=0x7F if alt_charset => (code as char, GlyphStyle::Inverse),
        0x60..=0x7F => ((code - 0x40) as char, GlyphStyle::Flashing),
        0x80..=0x9F => ((code - 0x40) as char, GlyphStyle::Normal),
        0xA0..=0xFF => ((code - 0x80) as char, GlyphStyle::Normal),
    }
}

/// Character shown for a screen code, ignoring style.
#[must_use]
pub const fn screen_char(code: u8) -> char {
    glyph(code, false).0
}

/// Screen code that displays `c` in `style`.
///
/// Lowercase letters are folded to uppercase for inverse and flashing,
/// which have no lowercase glyphs in the primary set. Returns `None` for
/// characters the text screen cannot show.
#[must_use]
pub fn encode_char(c: char, style: GlyphStyle) -> Option<u8> {
    let c = u8::try_from(u32::from(c)).ok().filter(|c| (0x20..0x80).contains(c))?;
    match style {
        GlyphStyle::Normal => Some(c | 0x80),
        GlyphStyle::Inverse | GlyphStyle::Flashing => {
            let c = c.to_ascii_uppercase();
            let base = if style == GlyphStyle::Inverse { 0x00 } else { 0x40 };
            match c {
                0x40..=0x5F => Some(base + (c - 0x40)),
                0x20..=0x3F => Some(base + c),
                _ => None,
            }
        }
        GlyphStyle::MouseText => None,
    }
}

/// Decode a run of screen codes to text.
#[must_use]
pub fn screen_text(codes: &[u8]) -> String {
    codes.iter().map(|&b| screen_char(b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normal_range() {
        assert_eq!(glyph(0xC1, false), ('A', GlyphStyle::Normal));
        assert_eq!(glyph(0xA0, false), (' ', GlyphStyle::Normal));
        assert_eq!(glyph(0xDD, false), (']', GlyphStyle::Normal));
        assert_eq!(glyph(0xE1, false), ('a', GlyphStyle::Normal));
        assert_eq!(glyph(0x81, false), ('A', GlyphStyle::Normal));
    }

    #[test]
    fn inverse_and_flashing() {
        assert_eq!(glyph(0x01, false), ('A', GlyphStyle::Inverse));
        assert_eq!(glyph(0x20, false), (' ', GlyphStyle::Inverse));
        assert_eq!(glyph(0x41, false), ('A', GlyphStyle::Flashing));
        assert_eq!(glyph(0x60, false), (' ', GlyphStyle::Flashing));
    }

    #[test]
    fn alternate_set() {
        assert_eq!(glyph(0x41, true).1, GlyphStyle::MouseText);
        assert_eq!(glyph(0x61, true), ('a', GlyphStyle::Inverse));
        assert_eq!(glyph(0xC1, true), ('A', GlyphStyle::Normal));
    }

    #[test]
    fn encode_inverts_glyph() {
        for style in [GlyphStyle::Normal, GlyphStyle::Inverse, GlyphStyle::Flashing] {
            for c in (0x20u8..0x60).map(char::from) {
                let code = encode_char(c, style).unwrap();
                assert_eq!(glyph(code, false), (c, style), "{c:?} {style:?}");
            }
        }
        assert_eq!(encode_char('a', GlyphStyle::Inverse), Some(0x01));
        assert_eq!(encode_char('\u{e9}', GlyphStyle::Normal), None);
    }

    #[test]
    fn prompt_line() {
        assert_eq!(screen_text(&[0xDD, 0xD2, 0xD5, 0xCE]), "]RUN");
    }
}
