//! Apple II colour tables.
//!
//! All colours are ARGB32. Lo-res and double hi-res share the same sixteen
//! colours and the same 4-bit index; hi-res produces six artifact colours.

/// Lo-res palette, indexed by the nibble stored in text memory.
pub const LORES_PALETTE: [u32; 16] = [
    0xFF00_0000, // 0: Black
    0xFFDD_0033, // 1: Magenta
    0xFF00_0099, // 2: Dark Blue
    0xFFDD_22DD, // 3: Purple
    0xFF00_7722, // 4: Dark Green
    0xFF55_5555, // 5: Grey 1
    0xFF22_22FF, // 6: Medium Blue
    0xFF66_AAFF, // 7: Light Blue
    0xFF88_5500, // 8: Brown
    0xFFFF_6600, // 9: Orange
    0xFFAA_AAAA, // 10: Grey 2
    0xFFFF_9988, // 11: Pink
    0xFF11_DD00, // 12: Green
    0xFFFF_FF00, // 13: Yellow
    0xFF44_FF99, // 14: Aqua
    0xFFFF_FFFF, // 15: White
];

pub const LORES_NAMES: [&str; 16] = [
    "black",
    "magenta",
    "dark blue",
    "purple",
    "dark green",
    "grey 1",
    "medium blue",
    "light blue",
    "brown",
    "orange",
    "grey 2",
    "pink",
    "green",
    "yellow",
    "aqua",
    "white",
];

/// Double hi-res uses the lo-res colours.
pub const DOUBLE_HIRES_PALETTE: [u32; 16] = LORES_PALETTE;
pub const DOUBLE_HIRES_NAMES: [&str; 16] = LORES_NAMES;

pub const HIRES_BLACK: u8 = 0;
pub const HIRES_GREEN: u8 = 1;
pub const HIRES_VIOLET: u8 = 2;
pub const HIRES_WHITE: u8 = 3;
pub const HIRES_ORANGE: u8 = 4;
pub const HIRES_BLUE: u8 = 5;

/// Hi-res artifact colours.
pub const HIRES_PALETTE: [u32; 6] = [
    0xFF00_0000, // 0: Black
    0xFF11_DD00, // 1: Green
    0xFFDD_22DD, // 2: Violet
    0xFFFF_FFFF, // 3: White
    0xFFFF_6600, // 4: Orange
    0xFF22_22FF, // 5: Blue
];

pub const HIRES_NAMES: [&str; 6] = ["black", "green", "violet", "white", "orange", "blue"];

/// Artifact colour of a lit hi-res pixel with no lit neighbour.
///
/// Even columns show violet (or blue with the palette bit set), odd columns
/// green (or orange).
#[must_use]
pub const fn hires_artifact(column: usize, palette_bit: bool) -> u8 {
    match (column % 2 == 0, palette_bit) {
        (true, false) => HIRES_VIOLET,
        (false, false) => HIRES_GREEN,
        (true, true) => HIRES_BLUE,
        (false, true) => HIRES_ORANGE,
    }
}
