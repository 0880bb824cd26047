//! Display buffer layouts.
//!
//! Text and lo-res share the 1K text pages. Rows are interleaved in three
//! groups of eight: row `r` starts at `(r % 8) * 0x80 + (r / 8) * 0x28`
//! from the page base, leaving an 8-byte hole at the end of every 128-byte
//! stripe. Hi-res adds a second level of interleave: each scan line within
//! a text row is `0x400` further on.
//!
//! 80-column text and double graphics take the even columns from aux memory
//! and the odd columns from main, at the same address.

use crate::region::{AddressError, Bank};

pub const TEXT_PAGE1: u16 = 0x0400;
pub const TEXT_PAGE2: u16 = 0x0800;
pub const TEXT_PAGE_LEN: usize = 0x400;
pub const HIRES_PAGE1: u16 = 0x2000;
pub const HIRES_PAGE2: u16 = 0x4000;
pub const HIRES_PAGE_LEN: usize = 0x2000;

pub const TEXT_COLUMNS: usize = 40;
pub const TEXT_ROWS: usize = 24;
pub const LORES_ROWS: usize = 48;
pub const HIRES_ROWS: usize = 192;
/// Bytes per hi-res scan line.
pub const HIRES_ROW_BYTES: usize = 40;
/// Bytes per double hi-res scan line, aux and main combined.
pub const DOUBLE_HIRES_ROW_BYTES: usize = 80;

/// Offset of each text row from its page base.
pub const TEXT_ROW_OFFSETS: [u16; TEXT_ROWS] = [
    0x000, 0x080, 0x100, 0x180, 0x200, 0x280, 0x300, 0x380, // rows 0-7
    0x028, 0x0A8, 0x128, 0x1A8, 0x228, 0x2A8, 0x328, 0x3A8, // rows 8-15
    0x050, 0x0D0, 0x150, 0x1D0, 0x250, 0x2D0, 0x350, 0x3D0, // rows 16-23
];

/// Display page selected by PAGE2.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Page {
    #[default]
    One,
    Two,
}

impl Page {
    #[must_use]
    pub const fn text_base(self) -> u16 {
        match self {
            Page::One => TEXT_PAGE1,
            Page::Two => TEXT_PAGE2,
        }
    }

    #[must_use]
    pub const fn hires_base(self) -> u16 {
        match self {
            Page::One => HIRES_PAGE1,
            Page::Two => HIRES_PAGE2,
        }
    }
}

pub fn text_row_offset(row: usize) -> Result<u16, AddressError> {
    TEXT_ROW_OFFSETS
        .get(row)
        .copied()
        .ok_or(AddressError::InvalidRow {
            row,
            rows: TEXT_ROWS,
        })
}

pub fn text_row_address(page: Page, row: usize) -> Result<u16, AddressError> {
    Ok(page.text_base() + text_row_offset(row)?)
}

/// Text row and nibble holding lo-res row `row` (0-47).
///
/// Returns the text row and `true` when the block is in the high nibble.
pub fn lores_cell(row: usize) -> Result<(usize, bool), AddressError> {
    if row >= LORES_ROWS {
        return Err(AddressError::InvalidRow {
            row,
            rows: LORES_ROWS,
        });
    }
    Ok((row / 2, row % 2 == 1))
}

/// Start of hi-res scan line `row` on page 1.
pub fn hires_row_address(row: usize) -> Result<u16, AddressError> {
    hires_row_address_on(Page::One, row)
}

pub fn hires_row_address_on(page: Page, row: usize) -> Result<u16, AddressError> {
    if row >= HIRES_ROWS {
        return Err(AddressError::InvalidRow {
            row,
            rows: HIRES_ROWS,
        });
    }
    let row = row as u16;
    Ok(page.hires_base() + (row & 7) * 0x400 + ((row >> 3) & 7) * 0x80 + (row >> 6) * 0x28)
}

/// Byte order of one double hi-res scan line.
///
/// Entry `i` holds screen bytes `i`: even entries come from aux, odd from
/// main, both at `row base + i / 2`. Only the low 7 bits of each byte are
/// displayed.
pub fn double_hires_byte_layout(row: usize) -> Result<[(Bank, u16); DOUBLE_HIRES_ROW_BYTES], AddressError> {
    double_hires_byte_layout_on(Page::One, row)
}

pub fn double_hires_byte_layout_on(
    page: Page,
    row: usize,
) -> Result<[(Bank, u16); DOUBLE_HIRES_ROW_BYTES], AddressError> {
    let base = hires_row_address_on(page, row)?;
    let mut layout = [(Bank::Main, 0); DOUBLE_HIRES_ROW_BYTES];
    for (i, slot) in layout.iter_mut().enumerate() {
        let bank = if i % 2 == 0 { Bank::Aux } else { Bank::Main };
        *slot = (bank, base + (i / 2) as u16);
    }
    Ok(layout)
}
