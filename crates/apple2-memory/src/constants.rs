//! Zero-page pointers and ROM entry points used by Applesoft and the monitor.

/// Start of program text.
pub const TXTTAB: u16 = 0x67;
/// Start of simple variables (end of program).
pub const VARTAB: u16 = 0x69;
/// Start of array storage.
pub const ARYTAB: u16 = 0x6B;
/// End of array storage.
pub const STREND: u16 = 0x6D;
/// Bottom of string storage, growing down from HIMEM.
pub const FRETOP: u16 = 0x6F;
/// HIMEM.
pub const MEMSIZE: u16 = 0x73;
/// End of program as seen by the editor.
pub const PRGEND: u16 = 0xAF;
/// Cursor column.
pub const CH: u16 = 0x24;
/// Cursor row.
pub const CV: u16 = 0x25;

pub const COUT: u16 = 0xFDED;
pub const RDKEY: u16 = 0xFD0C;
pub const GETLN: u16 = 0xFD6A;
pub const HOME: u16 = 0xFC58;
pub const APPLESOFT_RUN: u16 = 0xD566;
pub const WARM_START_VECTOR: u16 = 0x03D0;

/// Where Applesoft loads programs on a 64K machine with DOS.
pub const DEFAULT_PROGRAM_START: u16 = 0x0801;
/// HIMEM under DOS 3.3.
pub const DEFAULT_HIMEM: u16 = 0x9600;
