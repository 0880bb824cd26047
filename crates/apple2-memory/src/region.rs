//! Logical regions and bank translation.
//!
//! The 64K CPU address space is split into named regions. Some overlap:
//! the program area starts at `$0800` and so contains text page 2 and both
//! hi-res pages. Translation always applies the rule of the most specific
//! region containing the address, whichever region the caller named; the
//! named region only bounds what the caller is allowed to ask for.
//!
//! Physical offsets are the logical address itself: every bank is viewed as
//! a sparse 64K space, so two logical addresses share a physical location
//! only when they are the same address in the same bank.

use std::fmt;

use crate::switches::SoftSwitches;

/// Named ranges of the CPU address space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemoryRegion {
    ZeroPage,
    Stack,
    /// `$0200-$03FF`: GETLN input buffer and the page-3 vectors.
    InputBuffer,
    TextPage1,
    TextPage2,
    /// `$0800-$BFFF`: Applesoft program, variables and strings.
    ProgramArea,
    HiresPage1,
    HiresPage2,
    IoSoftSwitches,
    SlotRom,
    RomOrLanguageCard,
}

impl MemoryRegion {
    pub const ALL: [MemoryRegion; 11] = [
        MemoryRegion::ZeroPage,
        MemoryRegion::Stack,
        MemoryRegion::InputBuffer,
        MemoryRegion::TextPage1,
        MemoryRegion::TextPage2,
        MemoryRegion::ProgramArea,
        MemoryRegion::HiresPage1,
        MemoryRegion::HiresPage2,
        MemoryRegion::IoSoftSwitches,
        MemoryRegion::SlotRom,
        MemoryRegion::RomOrLanguageCard,
    ];

    /// Inclusive address bounds.
    #[must_use]
    pub const fn bounds(self) -> (u16, u16) {
        match self {
            MemoryRegion::ZeroPage => (0x0000, 0x00FF),
            MemoryRegion::Stack => (0x0100, 0x01FF),
            MemoryRegion::InputBuffer => (0x0200, 0x03FF),
            MemoryRegion::TextPage1 => (0x0400, 0x07FF),
            MemoryRegion::TextPage2 => (0x0800, 0x0BFF),
            MemoryRegion::ProgramArea => (0x0800, 0xBFFF),
            MemoryRegion::HiresPage1 => (0x2000, 0x3FFF),
            MemoryRegion::HiresPage2 => (0x4000, 0x5FFF),
            MemoryRegion::IoSoftSwitches => (0xC000, 0xC0FF),
            MemoryRegion::SlotRom => (0xC100, 0xCFFF),
            MemoryRegion::RomOrLanguageCard => (0xD000, 0xFFFF),
        }
    }

    #[must_use]
    pub const fn contains(self, address: u16) -> bool {
        let (start, end) = self.bounds();
        address >= start && address <= end
    }

    /// The most specific region containing `address`.
    #[must_use]
    pub const fn classify(address: u16) -> MemoryRegion {
        match address {
            0x0000..=0x00FF => MemoryRegion::ZeroPage,
            0x0100..=0x01FF => MemoryRegion::Stack,
            0x0200..=0x03FF => MemoryRegion::InputBuffer,
            0x0400..=0x07FF => MemoryRegion::TextPage1,
            0x0800..=0x0BFF => MemoryRegion::TextPage2,
            0x2000..=0x3FFF => MemoryRegion::HiresPage1,
            0x4000..=0x5FFF => MemoryRegion::HiresPage2,
            0x0C00..=0xBFFF => MemoryRegion::ProgramArea,
            0xC000..=0xC0FF => MemoryRegion::IoSoftSwitches,
            0xC100..=0xCFFF => MemoryRegion::SlotRom,
            _ => MemoryRegion::RomOrLanguageCard,
        }
    }

    /// Whether any soft switch can change where this region's bytes live.
    #[must_use]
    pub const fn is_bank_switchable(self) -> bool {
        !matches!(self, MemoryRegion::IoSoftSwitches | MemoryRegion::SlotRom)
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            MemoryRegion::ZeroPage => "zero page",
            MemoryRegion::Stack => "stack",
            MemoryRegion::InputBuffer => "input buffer",
            MemoryRegion::TextPage1 => "text page 1",
            MemoryRegion::TextPage2 => "text page 2",
            MemoryRegion::ProgramArea => "program area",
            MemoryRegion::HiresPage1 => "hi-res page 1",
            MemoryRegion::HiresPage2 => "hi-res page 2",
            MemoryRegion::IoSoftSwitches => "I/O soft switches",
            MemoryRegion::SlotRom => "slot ROM",
            MemoryRegion::RomOrLanguageCard => "ROM / language card",
        }
    }
}

impl fmt::Display for MemoryRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Language card RAM bank behind `$D000-$FFFF`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum LcBank {
    /// `$D000-$DFFF`, bank 1.
    One,
    /// `$D000-$DFFF`, bank 2.
    Two,
    /// `$E000-$FFFF`, shared by both banks.
    High,
}

/// Physical storage behind a logical address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Bank {
    Main,
    Aux,
    Io,
    Rom,
    LanguageCard { aux: bool, bank: LcBank },
}

impl fmt::Display for Bank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Bank::Main => f.write_str("main"),
            Bank::Aux => f.write_str("aux"),
            Bank::Io => f.write_str("I/O"),
            Bank::Rom => f.write_str("ROM"),
            Bank::LanguageCard { aux, bank } => {
                let side = if *aux { "aux" } else { "main" };
                match bank {
                    LcBank::One => write!(f, "{side} LC bank 1"),
                    LcBank::Two => write!(f, "{side} LC bank 2"),
                    LcBank::High => write!(f, "{side} LC high"),
                }
            }
        }
    }
}

/// A resolved (bank, offset) location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PhysicalAddress {
    pub bank: Bank,
    pub offset: u16,
}

/// Direction of a memory access being translated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Access {
    Read,
    Write,
    /// Reads and writes must both land in the same bank.
    ReadWrite,
}

/// Address-model failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddressError {
    /// Address outside the named region, or past the top of memory.
    InvalidAddress {
        address: u32,
        region: Option<MemoryRegion>,
    },
    /// Display row outside the mode's row range.
    InvalidRow { row: usize, rows: usize },
    /// No switch setting makes `address` resolve to `bank`.
    Unroutable { address: u16, bank: Bank },
    /// Reads and writes of `address` resolve to different banks.
    SplitRouting { address: u16 },
}

impl fmt::Display for AddressError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidAddress {
                address,
                region: Some(region),
            } => write!(f, "address ${address:04X} is outside the {region}"),
            Self::InvalidAddress {
                address,
                region: None,
            } => write!(f, "address ${address:04X} is outside the 64K address space"),
            Self::InvalidRow { row, rows } => {
                write!(f, "row {row} out of range (0-{})", rows - 1)
            }
            Self::Unroutable { address, bank } => {
                write!(f, "address ${address:04X} cannot be routed to {bank}")
            }
            Self::SplitRouting { address } => {
                write!(f, "reads and writes of ${address:04X} target different banks")
            }
        }
    }
}

impl std::error::Error for AddressError {}

/// Translate a logical address within `region` under `switches`.
pub fn translate(
    address: u16,
    region: MemoryRegion,
    switches: &SoftSwitches,
    access: Access,
) -> Result<PhysicalAddress, AddressError> {
    if !region.contains(address) {
        return Err(AddressError::InvalidAddress {
            address: u32::from(address),
            region: Some(region),
        });
    }
    let bank = match access {
        Access::Read => resolve(address, switches, false),
        Access::Write => resolve(address, switches, true),
        Access::ReadWrite => {
            let read = resolve(address, switches, false);
            if read != resolve(address, switches, true) {
                return Err(AddressError::SplitRouting { address });
            }
            read
        }
    };
    Ok(PhysicalAddress {
        bank,
        offset: address,
    })
}

/// Translate using the most specific region for `address`.
pub fn translate_any(
    address: u16,
    switches: &SoftSwitches,
    access: Access,
) -> Result<PhysicalAddress, AddressError> {
    translate(address, MemoryRegion::classify(address), switches, access)
}

fn aux_if(aux: bool) -> Bank {
    if aux { Bank::Aux } else { Bank::Main }
}

/// The hardware decision table.
fn resolve(address: u16, s: &SoftSwitches, write: bool) -> Bank {
    let ram_flag = if write { s.aux_write } else { s.aux_read };
    match MemoryRegion::classify(address) {
        MemoryRegion::ZeroPage | MemoryRegion::Stack => aux_if(s.alt_zero_page),
        MemoryRegion::TextPage1 if s.store80 => aux_if(s.page2),
        MemoryRegion::HiresPage1 if s.store80 && s.hires => aux_if(s.page2),
        MemoryRegion::InputBuffer
        | MemoryRegion::TextPage1
        | MemoryRegion::TextPage2
        | MemoryRegion::ProgramArea
        | MemoryRegion::HiresPage1
        | MemoryRegion::HiresPage2 => aux_if(ram_flag),
        MemoryRegion::IoSoftSwitches => Bank::Io,
        MemoryRegion::SlotRom => Bank::Rom,
        MemoryRegion::RomOrLanguageCard => {
            let enabled = if write { s.lc_write } else { s.lc_read };
            if !enabled {
                return Bank::Rom;
            }
            let bank = if address >= 0xE000 {
                LcBank::High
            } else if s.lc_bank2 {
                LcBank::Two
            } else {
                LcBank::One
            };
            Bank::LanguageCard {
                aux: s.alt_zero_page,
                bank,
            }
        }
    }
}

/// Smallest change to `current` under which `address` resolves to `bank`.
///
/// Display-page addresses under 80STORE are routed with PAGE2, the rest of
/// RAM with RAMRD/RAMWRT, zero page and stack with ALTZP, and the top 12K
/// with the language-card switches.
pub fn plan_route(
    current: &SoftSwitches,
    address: u16,
    bank: Bank,
    access: Access,
) -> Result<SoftSwitches, AddressError> {
    let unroutable = AddressError::Unroutable { address, bank };
    let lands = |candidate: &SoftSwitches| {
        translate_any(address, candidate, access).is_ok_and(|p| p.bank == bank)
    };
    if lands(current) {
        return Ok(*current);
    }

    let mut next = *current;
    match (MemoryRegion::classify(address), bank) {
        (MemoryRegion::ZeroPage | MemoryRegion::Stack, Bank::Main | Bank::Aux) => {
            next.alt_zero_page = bank == Bank::Aux;
        }
        (MemoryRegion::TextPage1, Bank::Main | Bank::Aux) if next.store80 => {
            next.page2 = bank == Bank::Aux;
        }
        (MemoryRegion::HiresPage1, Bank::Main | Bank::Aux) if next.store80 && next.hires => {
            next.page2 = bank == Bank::Aux;
        }
        (
            MemoryRegion::InputBuffer
            | MemoryRegion::TextPage1
            | MemoryRegion::TextPage2
            | MemoryRegion::ProgramArea
            | MemoryRegion::HiresPage1
            | MemoryRegion::HiresPage2,
            Bank::Main | Bank::Aux,
        ) => {
            let aux = bank == Bank::Aux;
            match access {
                Access::Read => next.aux_read = aux,
                Access::Write => next.aux_write = aux,
                Access::ReadWrite => {
                    next.aux_read = aux;
                    next.aux_write = aux;
                }
            }
        }
        (MemoryRegion::RomOrLanguageCard, Bank::LanguageCard { aux, bank: lc }) => {
            match (address >= 0xE000, lc) {
                (true, LcBank::High) => {}
                (false, LcBank::One) => next.lc_bank2 = false,
                (false, LcBank::Two) => next.lc_bank2 = true,
                _ => return Err(unroutable),
            }
            next.alt_zero_page = aux;
            match access {
                Access::Read => next.lc_read = true,
                Access::Write => next.lc_write = true,
                Access::ReadWrite => {
                    next.lc_read = true;
                    next.lc_write = true;
                }
            }
        }
        (MemoryRegion::RomOrLanguageCard, Bank::Rom) => match access {
            Access::Read => next.lc_read = false,
            Access::Write | Access::ReadWrite => return Err(unroutable),
        },
        _ => return Err(unroutable),
    }

    if lands(&next) { Ok(next) } else { Err(unroutable) }
}
