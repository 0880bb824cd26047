//! Bank-aware memory access.
//!
//! `peek` and `poke` address memory the way the CPU currently sees it:
//! each byte is translated under the live soft switches and the range is
//! split into runs wherever the region or bank changes. `read_bank` and
//! `write_bank` go further and flip the switches so a specific bank is
//! reached, restoring them afterwards.

use serde::Serialize;

use apple2_memory::constants::{CH, MEMSIZE, PRGEND, TXTTAB};
use apple2_memory::switches::{DHIRES_STATUS, STATUS_FIRST, STATUS_LAST, STATUS_LEN};
use apple2_memory::{
    Access, AccessKind, AddressError, Bank, MemoryRegion, SoftSwitches, SwitchAccess, plan_route,
    translate_any,
};
use format_applesoft::PointerBlock;

use crate::console::Launcher;
use crate::error::{Error, Result};
use crate::machine::Apple2;

/// Bytes per verified block in [`Apple2::load_block`].
const BLOCK: usize = 0x100;

/// Last known switch state.
///
/// `stale` means an access with unknown effect happened since the status
/// registers were read; the flags are still the best guess for the
/// language-card write enable, which no register reports.
#[derive(Debug, Clone, Copy)]
pub(crate) struct SwitchCache {
    generation: u64,
    switches: SoftSwitches,
    stale: bool,
}

/// A stretch of addresses that share a region and a bank.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Run {
    start: u16,
    len: usize,
    bank: Bank,
}

/// Applesoft's zero-page program pointers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BasicPointers {
    pub txttab: u16,
    pub vartab: u16,
    pub arytab: u16,
    pub strend: u16,
    pub fretop: u16,
    pub memsize: u16,
    pub prgend: u16,
}

impl BasicPointers {
    #[must_use]
    pub fn block(&self) -> PointerBlock {
        PointerBlock {
            txttab: self.txttab,
            vartab: self.vartab,
            arytab: self.arytab,
            strend: self.strend,
            prgend: self.prgend,
        }
    }
}

/// `address + count - 1`, rejected if past `$FFFF`.
pub(crate) fn last_address(address: u16, count: usize) -> Result<u16> {
    let last = u32::from(address) + count as u32 - 1;
    u16::try_from(last).map_err(|_| {
        Error::InvalidAddress(AddressError::InvalidAddress {
            address: last,
            region: None,
        })
    })
}

/// Split `[address, address + count)` by bank under `switches`.
fn runs(address: u16, count: usize, switches: &SoftSwitches, access: Access) -> Result<Vec<Run>> {
    let mut runs: Vec<Run> = Vec::new();
    let mut region = None;
    for offset in 0..count {
        let at = address + offset as u16;
        let bank = translate_any(at, switches, access)?.bank;
        let here = MemoryRegion::classify(at);
        match runs.last_mut() {
            Some(run) if run.bank == bank && region == Some(here) => run.len += 1,
            _ => runs.push(Run {
                start: at,
                len: 1,
                bank,
            }),
        }
        region = Some(here);
    }
    Ok(runs)
}

/// Split `[address, address + count)` where the routing rule can change:
/// at region boundaries and between `$D000-$DFFF` and `$E000-$FFFF`.
fn segments(address: u16, count: usize) -> Vec<(u16, usize)> {
    let mut segments: Vec<(u16, usize)> = Vec::new();
    let mut previous = None;
    for offset in 0..count {
        let at = address + offset as u16;
        let key = (MemoryRegion::classify(at), at >= 0xE000);
        match segments.last_mut() {
            Some((_, len)) if previous == Some(key) => *len += 1,
            _ => segments.push((at, 1)),
        }
        previous = Some(key);
    }
    segments
}

impl<L: Launcher> Apple2<L> {
    /// Current soft switches, read from the status registers once per
    /// boot or reset and then tracked.
    pub fn soft_switches(&mut self) -> Result<SoftSwitches> {
        self.require_live("read soft switches")?;
        let generation = self.session.generation();
        let previous = match self.switches {
            Some(cache) if cache.generation == generation && !cache.stale => return Ok(cache.switches),
            Some(cache) if cache.generation == generation => cache.switches,
            _ => SoftSwitches::default(),
        };
        if !self.machine().has_aux() {
            // No status registers before the IIe; tracking is all there is.
            self.store_switches(previous);
            return Ok(previous);
        }
        let switches = self.in_debugger(|m| {
            let status = m.session.read_memory(STATUS_FIRST, STATUS_LEN)?;
            let dhires = m.session.read_memory(DHIRES_STATUS, 1)?;
            let status: [u8; STATUS_LEN] = status.try_into().map_err(|_| Error::ProtocolDesync {
                command: format!("{STATUS_FIRST:04X}.{STATUS_LAST:04X}"),
                detail: "short status block".to_string(),
            })?;
            Ok(SoftSwitches::from_status(
                &status,
                dhires.first().copied().unwrap_or(0),
                &previous,
            ))
        })?;
        log::debug!("soft switches: {switches:?}");
        self.store_switches(switches);
        Ok(switches)
    }

    /// Forget the cached switches so the next query re-reads them.
    pub fn mark_switches_stale(&mut self) {
        if let Some(cache) = self.switches.as_mut() {
            cache.stale = true;
        }
    }

    fn store_switches(&mut self, switches: SoftSwitches) {
        self.switches = Some(SwitchCache {
            generation: self.session.generation(),
            switches,
            stale: false,
        });
    }

    /// Tracked state without touching the emulator.
    fn tracked_switches(&self) -> SoftSwitches {
        match self.switches {
            Some(cache) if cache.generation == self.session.generation() => cache.switches,
            _ => SoftSwitches::default(),
        }
    }

    fn track(&mut self, access: SwitchAccess) {
        let mut switches = self.tracked_switches();
        switches.apply(access);
        let stale = self.switches.is_some_and(|c| c.stale);
        self.switches = Some(SwitchCache {
            generation: self.session.generation(),
            switches,
            stale,
        });
    }

    /// Touch one soft switch through the debugger.
    fn perform(&mut self, access: SwitchAccess) -> Result<()> {
        log::debug!("switch {:?} ${:04X} x{}", access.kind, access.address, access.repeat);
        match access.kind {
            AccessKind::Write => self.session.write_memory(access.address, &[0], false)?,
            AccessKind::Read => {
                for _ in 0..access.repeat.max(1) {
                    self.session.read_memory(access.address, 1)?;
                }
            }
        }
        self.track(access);
        Ok(())
    }

    fn transition(&mut self, from: SoftSwitches, to: &SoftSwitches) -> Result<()> {
        for access in from.transition_to(to) {
            self.perform(access)?;
        }
        Ok(())
    }

    /// Drive the switches to `target`.
    pub fn apply_switches(&mut self, target: &SoftSwitches) -> Result<()> {
        self.in_debugger(|m| {
            let current = m.soft_switches()?;
            m.transition(current, target)
        })
    }

    /// Run `f` in the debugger and put the switches back afterwards.
    pub(crate) fn with_restored_switches<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        self.in_debugger(|m| {
            let original = m.soft_switches()?;
            let result = f(m);
            let now = m.tracked_switches();
            let restored = if now == original {
                Ok(())
            } else {
                m.transition(now, &original)
            };
            let value = result?;
            restored?;
            Ok(value)
        })
    }

    pub(crate) fn route_to(&mut self, address: u16, bank: Bank, access: Access) -> Result<()> {
        let current = self.tracked_switches();
        let target = plan_route(&current, address, bank, access)?;
        if target != current {
            self.transition(current, &target)?;
        }
        Ok(())
    }

    /// Read `count` bytes as the CPU sees them now.
    pub fn peek(&mut self, address: u16, count: usize) -> Result<Vec<u8>> {
        if count == 0 {
            return Ok(Vec::new());
        }
        last_address(address, count)?;
        self.require_live("peek")?;
        self.in_debugger(|m| {
            let switches = m.soft_switches()?;
            let mut out = Vec::with_capacity(count);
            for run in runs(address, count, &switches, Access::Read)? {
                if run.bank == Bank::Io {
                    log::warn!(
                        "reading ${:04X}-${:04X} may toggle soft switches",
                        run.start,
                        u32::from(run.start) + run.len as u32 - 1
                    );
                    m.mark_switches_stale();
                }
                out.extend(m.session.read_memory(run.start, run.len)?);
            }
            Ok(out)
        })
    }

    /// Write bytes as the CPU sees memory now, verifying each run.
    ///
    /// Bytes in `$C000-$C0FF` are switch accesses: written one at a time,
    /// unverified, and tracked. Runs that would land in ROM are rejected
    /// before anything is written.
    pub fn poke(&mut self, address: u16, bytes: &[u8]) -> Result<()> {
        if bytes.is_empty() {
            return Ok(());
        }
        last_address(address, bytes.len())?;
        self.require_live("poke")?;
        self.in_debugger(|m| {
            let switches = m.soft_switches()?;
            let plan = runs(address, bytes.len(), &switches, Access::Write)?;
            if let Some(rom) = plan.iter().find(|r| r.bank == Bank::Rom) {
                return Err(AddressError::Unroutable {
                    address: rom.start,
                    bank: Bank::Rom,
                }
                .into());
            }
            for run in plan {
                let from = (run.start - address) as usize;
                let part = &bytes[from..from + run.len];
                if run.bank == Bank::Io {
                    for (i, &byte) in part.iter().enumerate() {
                        let at = run.start + i as u16;
                        m.session.write_memory(at, &[byte], false)?;
                        m.track(SwitchAccess::write(at));
                    }
                    continue;
                }
                let reads_back = translate_any(run.start, &switches, Access::Read)?.bank == run.bank;
                if reads_back {
                    m.session.write_memory(run.start, part, true)?;
                } else {
                    m.write_bank(run.bank, run.start, part)?;
                }
            }
            Ok(())
        })
    }

    /// Poke a large block in page-sized pieces, each verified.
    pub fn load_block(&mut self, address: u16, bytes: &[u8]) -> Result<()> {
        if bytes.is_empty() {
            return Ok(());
        }
        last_address(address, bytes.len())?;
        self.require_live("load block")?;
        self.in_debugger(|m| {
            for (i, part) in bytes.chunks(BLOCK).enumerate() {
                m.poke(address + (i * BLOCK) as u16, part)?;
            }
            Ok(())
        })
    }

    /// Read from a specific bank regardless of the current switches.
    pub fn read_bank(&mut self, bank: Bank, address: u16, count: usize) -> Result<Vec<u8>> {
        if count == 0 {
            return Ok(Vec::new());
        }
        last_address(address, count)?;
        self.require_live("read bank")?;
        self.with_restored_switches(|m| {
            let mut out = Vec::with_capacity(count);
            for (start, len) in segments(address, count) {
                m.route_to(start, bank, Access::Read)?;
                out.extend(m.session.read_memory(start, len)?);
            }
            Ok(out)
        })
    }

    /// Write to a specific bank, verified, regardless of the current
    /// switches. Reads are routed to the same bank for the read-back.
    pub fn write_bank(&mut self, bank: Bank, address: u16, bytes: &[u8]) -> Result<()> {
        if bytes.is_empty() {
            return Ok(());
        }
        last_address(address, bytes.len())?;
        self.require_live("write bank")?;
        self.with_restored_switches(|m| {
            let mut written = 0;
            for (start, len) in segments(address, bytes.len()) {
                m.route_to(start, bank, Access::ReadWrite)?;
                m.session.write_memory(start, &bytes[written..written + len], true)?;
                written += len;
            }
            Ok(())
        })
    }

    /// Applesoft's program pointers from main memory.
    pub fn basic_pointers(&mut self) -> Result<BasicPointers> {
        let span = (MEMSIZE + 2 - TXTTAB) as usize;
        let (low, prgend) = self.in_debugger(|m| {
            let low = m.read_bank(Bank::Main, TXTTAB, span)?;
            let prgend = m.read_bank(Bank::Main, PRGEND, 2)?;
            Ok((low, prgend))
        })?;
        let word = |address: u16| {
            let i = (address - TXTTAB) as usize;
            u16::from_le_bytes([low[i], low[i + 1]])
        };
        Ok(BasicPointers {
            txttab: word(TXTTAB),
            vartab: word(apple2_memory::constants::VARTAB),
            arytab: word(apple2_memory::constants::ARYTAB),
            strend: word(apple2_memory::constants::STREND),
            fretop: word(apple2_memory::constants::FRETOP),
            memsize: word(MEMSIZE),
            prgend: u16::from_le_bytes([prgend[0], prgend[1]]),
        })
    }

    /// Text cursor as (column, row).
    pub fn cursor(&mut self) -> Result<(u8, u8)> {
        let bytes = self.read_bank(Bank::Main, CH, 2)?;
        Ok((bytes[0], bytes[1]))
    }
}
