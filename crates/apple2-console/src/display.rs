//! Screen capture and decoding.
//!
//! Capture reads whole display pages with bank-targeted reads; decoding is
//! pure and works on the raw page bytes.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use apple2_memory::layout::{
    DOUBLE_HIRES_ROW_BYTES, HIRES_PAGE_LEN, HIRES_ROW_BYTES, HIRES_ROWS, LORES_ROWS, TEXT_COLUMNS,
    TEXT_PAGE_LEN, TEXT_ROW_OFFSETS, TEXT_ROWS,
};
use apple2_memory::palette::{
    HIRES_BLACK, HIRES_NAMES, HIRES_PALETTE, HIRES_WHITE, LORES_NAMES, LORES_PALETTE,
    hires_artifact,
};
use apple2_memory::{
    Bank, Page, SoftSwitches, double_hires_byte_layout_on, glyph, hires_row_address_on, lores_cell,
    text_row_address,
};

use crate::console::Launcher;
use crate::error::{Error, Result};
use crate::machine::Apple2;

/// Text rows above the four that mixed mode keeps for text.
const MIXED_GRAPHICS_TEXT_ROWS: usize = 20;

/// Art characters for the hi-res palette, by index.
const HIRES_ART: [char; 6] = ['.', 'g', 'v', '#', 'o', 'b'];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayMode {
    Text40,
    Text80,
    #[serde(rename = "lores")]
    LoRes,
    #[serde(rename = "double_lores")]
    DoubleLoRes,
    #[serde(rename = "hires")]
    HiRes,
    #[serde(rename = "double_hires")]
    DoubleHiRes,
}

impl DisplayMode {
    /// (width, height) in cells.
    #[must_use]
    pub const fn dimensions(self) -> (usize, usize) {
        match self {
            DisplayMode::Text40 => (TEXT_COLUMNS, TEXT_ROWS),
            DisplayMode::Text80 => (TEXT_COLUMNS * 2, TEXT_ROWS),
            DisplayMode::LoRes => (TEXT_COLUMNS, LORES_ROWS),
            DisplayMode::DoubleLoRes => (TEXT_COLUMNS * 2, LORES_ROWS),
            DisplayMode::HiRes => (HIRES_ROW_BYTES * 7, HIRES_ROWS),
            DisplayMode::DoubleHiRes => (DOUBLE_HIRES_ROW_BYTES * 7, HIRES_ROWS),
        }
    }

    #[must_use]
    pub const fn is_text(self) -> bool {
        matches!(self, DisplayMode::Text40 | DisplayMode::Text80)
    }

    /// Whether the mode interleaves aux and main memory.
    #[must_use]
    pub const fn needs_aux(self) -> bool {
        matches!(
            self,
            DisplayMode::Text80 | DisplayMode::DoubleLoRes | DisplayMode::DoubleHiRes
        )
    }

    /// The mode the switches select for the full screen.
    #[must_use]
    pub fn from_switches(s: &SoftSwitches) -> Self {
        match (s.text, s.hires, s.double_hires && s.col80) {
            (true, _, _) if s.col80 => DisplayMode::Text80,
            (true, _, _) => DisplayMode::Text40,
            (false, true, true) => DisplayMode::DoubleHiRes,
            (false, true, false) => DisplayMode::HiRes,
            (false, false, true) => DisplayMode::DoubleLoRes,
            (false, false, false) => DisplayMode::LoRes,
        }
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            DisplayMode::Text40 => "text40",
            DisplayMode::Text80 => "text80",
            DisplayMode::LoRes => "lores",
            DisplayMode::DoubleLoRes => "double_lores",
            DisplayMode::HiRes => "hires",
            DisplayMode::DoubleHiRes => "double_hires",
        }
    }
}

impl fmt::Display for DisplayMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DisplayMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text40" | "text" => Ok(DisplayMode::Text40),
            "text80" => Ok(DisplayMode::Text80),
            "lores" | "gr" => Ok(DisplayMode::LoRes),
            "double_lores" | "dgr" => Ok(DisplayMode::DoubleLoRes),
            "hires" | "hgr" => Ok(DisplayMode::HiRes),
            "double_hires" | "dhgr" => Ok(DisplayMode::DoubleHiRes),
            other => Err(format!("unknown display mode: {other}")),
        }
    }
}

/// One captured screen.
///
/// Text modes hold screen codes; graphics modes hold colour indices into
/// [`ScreenFrame::palette`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScreenFrame {
    pub mode: DisplayMode,
    pub page: Page,
    pub width: usize,
    pub height: usize,
    pub alt_charset: bool,
    cells: Vec<u8>,
}

impl ScreenFrame {
    fn new(mode: DisplayMode, page: Page, alt_charset: bool, cells: Vec<u8>) -> Self {
        let (width, height) = mode.dimensions();
        debug_assert_eq!(cells.len(), width * height);
        Self {
            mode,
            page,
            width,
            height,
            alt_charset,
            cells,
        }
    }

    #[must_use]
    pub fn cells(&self) -> &[u8] {
        &self.cells
    }

    #[must_use]
    pub fn cell(&self, x: usize, y: usize) -> Option<u8> {
        if x >= self.width {
            return None;
        }
        self.cells.get(y * self.width + x).copied()
    }

    #[must_use]
    pub fn row(&self, y: usize) -> Option<&[u8]> {
        self.cells.get(y * self.width..(y + 1) * self.width)
    }

    /// Colours the cells index, with their names. Empty for text.
    #[must_use]
    pub fn palette(&self) -> (&'static [u32], &'static [&'static str]) {
        match self.mode {
            DisplayMode::Text40 | DisplayMode::Text80 => (&[], &[]),
            DisplayMode::HiRes => (HIRES_PALETTE.as_slice(), HIRES_NAMES.as_slice()),
            DisplayMode::LoRes | DisplayMode::DoubleLoRes | DisplayMode::DoubleHiRes => {
                (LORES_PALETTE.as_slice(), LORES_NAMES.as_slice())
            }
        }
    }

    /// ARGB colour of a graphics cell.
    #[must_use]
    pub fn argb(&self, x: usize, y: usize) -> Option<u32> {
        let (palette, _) = self.palette();
        palette.get(usize::from(self.cell(x, y)?)).copied()
    }

    /// Rows of a text frame as strings, trailing blanks trimmed.
    #[must_use]
    pub fn text_lines(&self) -> Option<Vec<String>> {
        if !self.mode.is_text() {
            return None;
        }
        Some(
            self.cells
                .chunks(self.width)
                .map(|row| {
                    let line: String = row.iter().map(|&c| glyph(c, self.alt_charset).0).collect();
                    line.trim_end().to_string()
                })
                .collect(),
        )
    }

    /// One character per cell, one string per row. Text frames give their
    /// lines; lo-res and the double modes give a hex digit per colour;
    /// hi-res gives `.` for black, `#` for white and the initial of the
    /// colour otherwise.
    #[must_use]
    pub fn ascii_art(&self) -> Vec<String> {
        if let Some(lines) = self.text_lines() {
            return lines;
        }
        let art = |c: u8| match self.mode {
            DisplayMode::HiRes => HIRES_ART.get(usize::from(c)).copied().unwrap_or('?'),
            _ => char::from_digit(u32::from(c), 16).map_or('?', |d| d.to_ascii_uppercase()),
        };
        self.cells
            .chunks(self.width)
            .map(|row| row.iter().map(|&c| art(c)).collect())
            .collect()
    }

    /// Every (column, row) where `needle` starts on a text frame.
    #[must_use]
    pub fn find_text(&self, needle: &str) -> Vec<(usize, usize)> {
        if needle.is_empty() {
            return Vec::new();
        }
        let Some(lines) = self.text_lines() else {
            return Vec::new();
        };
        let mut hits = Vec::new();
        for (y, line) in lines.iter().enumerate() {
            let chars: Vec<char> = line.chars().collect();
            let wanted: Vec<char> = needle.chars().collect();
            for x in 0..chars.len() {
                if chars[x..].starts_with(&wanted) {
                    hits.push((x, y));
                }
            }
        }
        hits
    }
}

pub fn decode_text40(page: &[u8; TEXT_PAGE_LEN]) -> Vec<u8> {
    let mut cells = Vec::with_capacity(TEXT_COLUMNS * TEXT_ROWS);
    for offset in TEXT_ROW_OFFSETS {
        let start = usize::from(offset);
        cells.extend_from_slice(&page[start..start + TEXT_COLUMNS]);
    }
    cells
}

/// Aux holds the even columns, main the odd.
pub fn decode_text80(aux: &[u8; TEXT_PAGE_LEN], main: &[u8; TEXT_PAGE_LEN]) -> Vec<u8> {
    let mut cells = Vec::with_capacity(TEXT_COLUMNS * 2 * TEXT_ROWS);
    for offset in TEXT_ROW_OFFSETS {
        let start = usize::from(offset);
        for i in start..start + TEXT_COLUMNS {
            cells.push(aux[i]);
            cells.push(main[i]);
        }
    }
    cells
}

/// Each text byte is two blocks: low nibble on top.
pub fn decode_lores(page: &[u8; TEXT_PAGE_LEN]) -> Vec<u8> {
    let mut cells = Vec::with_capacity(TEXT_COLUMNS * LORES_ROWS);
    for row in 0..LORES_ROWS {
        let Ok((text_row, high)) = lores_cell(row) else {
            break;
        };
        let start = usize::from(TEXT_ROW_OFFSETS[text_row]);
        let shift = if high { 4 } else { 0 };
        cells.extend(page[start..start + TEXT_COLUMNS].iter().map(|b| (b >> shift) & 0x0F));
    }
    cells
}

/// Aux colours are stored rotated left one bit.
const fn aux_colour(nibble: u8) -> u8 {
    ((nibble >> 1) | (nibble << 3)) & 0x0F
}

pub fn decode_double_lores(aux: &[u8; TEXT_PAGE_LEN], main: &[u8; TEXT_PAGE_LEN]) -> Vec<u8> {
    let mut cells = Vec::with_capacity(TEXT_COLUMNS * 2 * LORES_ROWS);
    for row in 0..LORES_ROWS {
        let Ok((text_row, high)) = lores_cell(row) else {
            break;
        };
        let start = usize::from(TEXT_ROW_OFFSETS[text_row]);
        let shift = if high { 4 } else { 0 };
        for i in start..start + TEXT_COLUMNS {
            cells.push(aux_colour((aux[i] >> shift) & 0x0F));
            cells.push((main[i] >> shift) & 0x0F);
        }
    }
    cells
}

/// Hi-res colour by neighbour rule: adjacent lit pixels are white, an
/// isolated lit pixel takes its column's artifact colour.
pub fn decode_hires(page: &[u8; HIRES_PAGE_LEN]) -> Vec<u8> {
    let width = HIRES_ROW_BYTES * 7;
    let mut cells = Vec::with_capacity(width * HIRES_ROWS);
    let mut lit = vec![false; width];
    let mut palette_bit = vec![false; width];
    for row in 0..HIRES_ROWS {
        let Ok(address) = hires_row_address_on(Page::One, row) else {
            break;
        };
        let start = usize::from(address - Page::One.hires_base());
        for (column, &byte) in page[start..start + HIRES_ROW_BYTES].iter().enumerate() {
            for bit in 0..7 {
                let x = column * 7 + bit;
                lit[x] = byte & (1 << bit) != 0;
                palette_bit[x] = byte & 0x80 != 0;
            }
        }
        for x in 0..width {
            let colour = if !lit[x] {
                HIRES_BLACK
            } else if (x > 0 && lit[x - 1]) || (x + 1 < width && lit[x + 1]) {
                HIRES_WHITE
            } else {
                hires_artifact(x, palette_bit[x])
            };
            cells.push(colour);
        }
    }
    cells
}

/// Decode double hi-res rows, each 80 bytes already interleaved aux/main.
///
/// The low 7 bits of each byte are pixels, least significant first; every
/// run of four pixels is one colour index, first pixel in bit 0.
pub fn decode_double_hires(rows: &[[u8; DOUBLE_HIRES_ROW_BYTES]]) -> Vec<u8> {
    let width = DOUBLE_HIRES_ROW_BYTES * 7;
    let mut cells = Vec::with_capacity(width * rows.len());
    for row in rows {
        let bits: Vec<u8> = row
            .iter()
            .flat_map(|&byte| (0..7).map(move |bit| (byte >> bit) & 1))
            .collect();
        for group in bits.chunks(4) {
            let colour = group
                .iter()
                .enumerate()
                .fold(0u8, |acc, (i, &b)| acc | (b << i));
            cells.extend(std::iter::repeat_n(colour, group.len()));
        }
    }
    cells
}

fn page_array<const N: usize>(bytes: Vec<u8>, what: &str) -> Result<[u8; N]> {
    let len = bytes.len();
    bytes.try_into().map_err(|_| Error::ProtocolDesync {
        command: what.to_string(),
        detail: format!("read {len} bytes, expected {N}"),
    })
}

impl<L: Launcher> Apple2<L> {
    /// Capture one display page in `mode`.
    pub fn capture_frame(&mut self, mode: DisplayMode, page: Page) -> Result<ScreenFrame> {
        self.require_live("capture the screen")?;
        if mode.needs_aux() && !self.machine().has_aux() {
            return Err(Error::NotReady {
                operation: "double-width capture",
                state: format!("running a {} without auxiliary memory", self.machine()),
            });
        }
        self.in_debugger(|m| {
            let alt_charset = m.soft_switches()?.alt_charset;
            let text_base = page.text_base();
            let cells = match mode {
                DisplayMode::Text40 | DisplayMode::LoRes => {
                    let main = m.read_bank(Bank::Main, text_base, TEXT_PAGE_LEN)?;
                    let main = page_array::<TEXT_PAGE_LEN>(main, "text page")?;
                    if mode == DisplayMode::Text40 {
                        decode_text40(&main)
                    } else {
                        decode_lores(&main)
                    }
                }
                DisplayMode::Text80 | DisplayMode::DoubleLoRes => {
                    let aux = m.read_bank(Bank::Aux, text_base, TEXT_PAGE_LEN)?;
                    let aux = page_array::<TEXT_PAGE_LEN>(aux, "aux text page")?;
                    let main = m.read_bank(Bank::Main, text_base, TEXT_PAGE_LEN)?;
                    let main = page_array::<TEXT_PAGE_LEN>(main, "text page")?;
                    if mode == DisplayMode::Text80 {
                        decode_text80(&aux, &main)
                    } else {
                        decode_double_lores(&aux, &main)
                    }
                }
                DisplayMode::HiRes => {
                    let bytes = m.read_bank(Bank::Main, page.hires_base(), HIRES_PAGE_LEN)?;
                    decode_hires(&page_array::<HIRES_PAGE_LEN>(bytes, "hi-res page")?)
                }
                DisplayMode::DoubleHiRes => decode_double_hires(&m.double_hires_rows(page)?),
            };
            Ok(ScreenFrame::new(mode, page, alt_charset, cells))
        })
    }

    /// Two reads per scan line: every aux row, then every main row, each
    /// byte placed where the double hi-res layout puts it.
    fn double_hires_rows(&mut self, page: Page) -> Result<Vec<[u8; DOUBLE_HIRES_ROW_BYTES]>> {
        let mut rows = vec![[0u8; DOUBLE_HIRES_ROW_BYTES]; HIRES_ROWS];
        self.with_restored_switches(|m| {
            for bank in [Bank::Aux, Bank::Main] {
                for (row, out) in rows.iter_mut().enumerate() {
                    let base = hires_row_address_on(page, row)?;
                    let layout = double_hires_byte_layout_on(page, row)?;
                    m.route_to(base, bank, apple2_memory::Access::Read)?;
                    let bytes = m.session.read_memory(base, HIRES_ROW_BYTES)?;
                    for (slot, &(from, address)) in out.iter_mut().zip(layout.iter()) {
                        if from == bank
                            && let Some(&byte) = bytes.get(usize::from(address - base))
                        {
                            *slot = byte;
                        }
                    }
                }
            }
            Ok(())
        })?;
        Ok(rows)
    }

    /// The displayed text screen as lines, 40 or 80 columns as the
    /// switches select.
    pub fn get_screen_text(&mut self) -> Result<Vec<String>> {
        let switches = self.soft_switches()?;
        let page = if switches.page2 && !switches.store80 {
            Page::Two
        } else {
            Page::One
        };
        let mode = if switches.col80 && self.machine().has_aux() {
            DisplayMode::Text80
        } else {
            DisplayMode::Text40
        };
        let frame = self.capture_frame(mode, page)?;
        Ok(frame.text_lines().unwrap_or_default())
    }

    /// Fill the graphics rows of lo-res page 1 with `colour` (low nibble)
    /// and show them mixed with four lines of text, as `GR` does.
    pub fn clear_lores(&mut self, colour: u8) -> Result<()> {
        self.require_live("clear the lo-res screen")?;
        let nibble = colour & 0x0F;
        let fill = [nibble | (nibble << 4); TEXT_COLUMNS];
        self.in_debugger(|m| {
            for row in 0..MIXED_GRAPHICS_TEXT_ROWS {
                m.write_bank(Bank::Main, text_row_address(Page::One, row)?, &fill)?;
            }
            let target = SoftSwitches {
                text: false,
                mixed: true,
                hires: false,
                page2: false,
                ..m.soft_switches()?
            };
            m.apply_switches(&target)
        })?;
        log::info!("lo-res cleared to colour {nibble}");
        Ok(())
    }

    /// Zero a hi-res page and show it: page 1 mixed with text as `HGR`
    /// does, page 2 full screen as `HGR2` does.
    pub fn clear_hires(&mut self, page: Page) -> Result<()> {
        self.require_live("clear the hi-res screen")?;
        self.in_debugger(|m| {
            m.write_bank(Bank::Main, page.hires_base(), &[0; HIRES_PAGE_LEN])?;
            let target = SoftSwitches {
                text: false,
                hires: true,
                mixed: page == Page::One,
                page2: page == Page::Two,
                ..m.soft_switches()?
            };
            m.apply_switches(&target)
        })?;
        log::info!("hi-res {page:?} cleared");
        Ok(())
    }

    /// Type `command`, wait up to `timeout` for the prompt, then capture
    /// page 1 in `mode`. The program has to end for the capture to happen.
    pub fn run_and_capture(
        &mut self,
        command: &str,
        timeout: Duration,
        mode: DisplayMode,
    ) -> Result<(Vec<String>, ScreenFrame)> {
        let output = self.type_line_within(command, timeout)?;
        let frame = self.capture_frame(mode, Page::One)?;
        Ok((output, frame))
    }

    /// Send `keys` to a waiting program, let it run for `settle`, then
    /// capture page 1 in `mode`.
    pub fn send_keys_and_capture(
        &mut self,
        keys: &str,
        settle: Duration,
        mode: DisplayMode,
    ) -> Result<(Vec<String>, ScreenFrame)> {
        let output = self.send_keys(keys, settle)?;
        let frame = self.capture_frame(mode, Page::One)?;
        Ok((output, frame))
    }

    /// Capture whatever the switches currently display.
    pub fn capture_current(&mut self) -> Result<ScreenFrame> {
        let switches = self.soft_switches()?;
        let mut mode = DisplayMode::from_switches(&switches);
        if mode.needs_aux() && !self.machine().has_aux() {
            mode = match mode {
                DisplayMode::Text80 => DisplayMode::Text40,
                DisplayMode::DoubleLoRes => DisplayMode::LoRes,
                _ => DisplayMode::HiRes,
            };
        }
        let page = if switches.page2 && !switches.store80 {
            Page::Two
        } else {
            Page::One
        };
        self.capture_frame(mode, page)
    }
}
