//! Apple IIe address model.
//!
//! Pure functions describing where bytes live: soft-switch state, logical
//! regions and their bank translation, display buffer interleave, and the
//! glyph and colour tables used to decode what is on screen. Nothing here
//! talks to an emulator.

pub mod constants;
pub mod glyph;
pub mod layout;
pub mod palette;
pub mod region;
pub mod switches;

pub use glyph::{GlyphStyle, encode_char, glyph, screen_char, screen_text};
pub use layout::{
    Page, double_hires_byte_layout, double_hires_byte_layout_on, hires_row_address,
    hires_row_address_on, lores_cell, text_row_address, text_row_offset,
};
pub use region::{
    Access, AddressError, Bank, LcBank, MemoryRegion, PhysicalAddress, plan_route, translate,
    translate_any,
};
pub use switches::{AccessKind, SoftSwitches, SwitchAccess};
