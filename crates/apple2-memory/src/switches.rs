//! Apple IIe soft switches.
//!
//! The switches live in `$C000-$C0FF`. Three kinds of trigger exist:
//!
//! | Switches                         | Off     | On      | Trigger        |
//! |----------------------------------|---------|---------|----------------|
//! | 80STORE                          | `$C000` | `$C001` | write          |
//! | RAMRD (aux read)                 | `$C002` | `$C003` | write          |
//! | RAMWRT (aux write)               | `$C004` | `$C005` | write          |
//! | ALTZP                            | `$C008` | `$C009` | write          |
//! | 80COL                            | `$C00C` | `$C00D` | write          |
//! | ALTCHARSET                       | `$C00E` | `$C00F` | write          |
//! | TEXT / MIXED / PAGE2 / HIRES     | `$C050+`| `$C051+`| read or write  |
//! | DHIRES                           | `$C05F` | `$C05E` | read or write  |
//! | Language card                    | `$C080-$C08F`     | read           |
//!
//! Status is readable at `$C011-$C01F` (bit 7) plus `$C07F` for DHIRES.
//! The language-card write enable has no status bit, so it is carried
//! forward from the last known access.

/// First soft-switch status register (`BSRBANK2`).
pub const STATUS_FIRST: u16 = 0xC011;
/// Last soft-switch status register (`RD80COL`).
pub const STATUS_LAST: u16 = 0xC01F;
/// Number of status registers in `$C011-$C01F`.
pub const STATUS_LEN: usize = (STATUS_LAST - STATUS_FIRST + 1) as usize;
/// Double hi-res status register (`RDDHIRES`).
pub const DHIRES_STATUS: u16 = 0xC07F;

/// Bus access direction for a soft-switch touch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccessKind {
    Read,
    Write,
}

/// One access to a soft-switch address.
///
/// `repeat` is the number of back-to-back accesses; the language card needs
/// two consecutive reads of an odd address before it enables writing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SwitchAccess {
    pub address: u16,
    pub kind: AccessKind,
    pub repeat: u8,
}

impl SwitchAccess {
    #[must_use]
    pub const fn write(address: u16) -> Self {
        Self {
            address,
            kind: AccessKind::Write,
            repeat: 1,
        }
    }

    #[must_use]
    pub const fn read(address: u16, repeat: u8) -> Self {
        Self {
            address,
            kind: AccessKind::Read,
            repeat,
        }
    }
}

/// Snapshot of every soft switch that affects addressing or display.
///
/// `Default` is the all-off state the machine reports right after a reset,
/// before the ROM has touched anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SoftSwitches {
    /// 80STORE: PAGE2 selects main/aux for the display pages.
    pub store80: bool,
    /// RAMRD: reads of `$0200-$BFFF` come from aux.
    pub aux_read: bool,
    /// RAMWRT: writes to `$0200-$BFFF` go to aux.
    pub aux_write: bool,
    /// ALTZP: zero page, stack and language card come from aux.
    pub alt_zero_page: bool,
    pub col80: bool,
    pub alt_charset: bool,
    pub text: bool,
    pub mixed: bool,
    pub page2: bool,
    pub hires: bool,
    pub double_hires: bool,
    /// Language card RAM visible for reads at `$D000-$FFFF`.
    pub lc_read: bool,
    /// Language card RAM receives writes at `$D000-$FFFF`.
    pub lc_write: bool,
    /// `$D000-$DFFF` uses bank 2 (otherwise bank 1).
    pub lc_bank2: bool,
}

impl SoftSwitches {
    /// Decode the `$C011-$C01F` status block and the `$C07F` DHIRES status.
    ///
    /// Only bit 7 of each register is meaningful. `previous` supplies the
    /// language-card write enable, which the hardware does not report.
    #[must_use]
    pub fn from_status(status: &[u8; STATUS_LEN], dhires: u8, previous: &SoftSwitches) -> Self {
        let on = |addr: u16| status[(addr - STATUS_FIRST) as usize] & 0x80 != 0;
        Self {
            lc_bank2: on(0xC011),
            lc_read: on(0xC012),
            aux_read: on(0xC013),
            aux_write: on(0xC014),
            alt_zero_page: on(0xC016),
            store80: on(0xC018),
            text: on(0xC01A),
            mixed: on(0xC01B),
            page2: on(0xC01C),
            hires: on(0xC01D),
            alt_charset: on(0xC01E),
            col80: on(0xC01F),
            double_hires: dhires & 0x80 != 0,
            lc_write: previous.lc_write,
        }
    }

    /// Track the effect of an access to `$C000-$C0FF`.
    ///
    /// Returns `true` if the address is a recognised switch.
    pub fn apply(&mut self, access: SwitchAccess) -> bool {
        let address = access.address;
        let write = access.kind == AccessKind::Write;
        match address {
            0xC000..=0xC00F if !write => false,
            0xC000 | 0xC001 => {
                self.store80 = address & 1 == 1;
                true
            }
            0xC002 | 0xC003 => {
                self.aux_read = address & 1 == 1;
                true
            }
            0xC004 | 0xC005 => {
                self.aux_write = address & 1 == 1;
                true
            }
            0xC008 | 0xC009 => {
                self.alt_zero_page = address & 1 == 1;
                true
            }
            0xC00C | 0xC00D => {
                self.col80 = address & 1 == 1;
                true
            }
            0xC00E | 0xC00F => {
                self.alt_charset = address & 1 == 1;
                true
            }
            0xC050 | 0xC051 => {
                self.text = address & 1 == 1;
                true
            }
            0xC052 | 0xC053 => {
                self.mixed = address & 1 == 1;
                true
            }
            0xC054 | 0xC055 => {
                self.page2 = address & 1 == 1;
                true
            }
            0xC056 | 0xC057 => {
                self.hires = address & 1 == 1;
                true
            }
            0xC05E | 0xC05F => {
                self.double_hires = address == 0xC05E;
                true
            }
            0xC080..=0xC08F => {
                let mode = address & 0x03;
                self.lc_bank2 = address & 0x08 == 0;
                self.lc_read = mode == 0 || mode == 3;
                if mode & 1 == 0 {
                    self.lc_write = false;
                } else if !write && access.repeat >= 2 {
                    self.lc_write = true;
                }
                true
            }
            _ => false,
        }
    }

    /// Accesses that move the machine from `self` to `target`.
    ///
    /// Applying the returned accesses to `self` in order yields `target`.
    #[must_use]
    pub fn transition_to(&self, target: &SoftSwitches) -> Vec<SwitchAccess> {
        let mut plan = Vec::new();
        let mut pair = |current: bool, wanted: bool, off: u16, on: u16| {
            if current != wanted {
                plan.push(SwitchAccess::write(if wanted { on } else { off }));
            }
        };

        pair(self.store80, target.store80, 0xC000, 0xC001);
        pair(self.aux_read, target.aux_read, 0xC002, 0xC003);
        pair(self.aux_write, target.aux_write, 0xC004, 0xC005);
        pair(self.alt_zero_page, target.alt_zero_page, 0xC008, 0xC009);
        pair(self.col80, target.col80, 0xC00C, 0xC00D);
        pair(self.alt_charset, target.alt_charset, 0xC00E, 0xC00F);
        pair(self.text, target.text, 0xC050, 0xC051);
        pair(self.mixed, target.mixed, 0xC052, 0xC053);
        pair(self.page2, target.page2, 0xC054, 0xC055);
        pair(self.hires, target.hires, 0xC056, 0xC057);
        pair(self.double_hires, target.double_hires, 0xC05F, 0xC05E);

        if self.lc_read != target.lc_read
            || self.lc_write != target.lc_write
            || self.lc_bank2 != target.lc_bank2
        {
            plan.push(language_card_access(target));
        }
        plan
    }
}

/// The single `$C08x` access that establishes the target's language-card state.
fn language_card_access(target: &SoftSwitches) -> SwitchAccess {
    let base = if target.lc_bank2 { 0xC080 } else { 0xC088 };
    let mode = match (target.lc_read, target.lc_write) {
        (true, false) => 0,
        (false, true) => 1,
        (false, false) => 2,
        (true, true) => 3,
    };
    let repeat = if target.lc_write { 2 } else { 1 };
    SwitchAccess::read(base + mode, repeat)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn replay(start: SoftSwitches, plan: &[SwitchAccess]) -> SoftSwitches {
        let mut state = start;
        for &access in plan {
            assert!(state.apply(access), "unrecognised ${:04X}", access.address);
        }
        state
    }

    #[test]
    fn default_is_all_off() {
        let s = SoftSwitches::default();
        assert!(!s.aux_read && !s.aux_write && !s.store80 && !s.page2 && !s.lc_read);
    }

    #[test]
    fn write_pairs_toggle_memory_switches() {
        let mut s = SoftSwitches::default();
        s.apply(SwitchAccess::write(0xC005));
        assert!(s.aux_write);
        assert!(!s.aux_read);
        s.apply(SwitchAccess::write(0xC003));
        assert!(s.aux_read);
        s.apply(SwitchAccess::write(0xC004));
        assert!(!s.aux_write);
    }

    #[test]
    fn reads_do_not_trigger_write_only_switches() {
        let mut s = SoftSwitches::default();
        assert!(!s.apply(SwitchAccess::read(0xC003, 1)));
        assert!(!s.aux_read);
    }

    #[test]
    fn display_switches_respond_to_reads() {
        let mut s = SoftSwitches::default();
        s.apply(SwitchAccess::read(0xC055, 1));
        s.apply(SwitchAccess::read(0xC057, 1));
        assert!(s.page2);
        assert!(s.hires);
        s.apply(SwitchAccess::read(0xC05E, 1));
        assert!(s.double_hires);
    }

    #[test]
    fn language_card_needs_two_reads_to_write_enable() {
        let mut s = SoftSwitches::default();
        s.apply(SwitchAccess::read(0xC083, 1));
        assert!(s.lc_read);
        assert!(s.lc_bank2);
        assert!(!s.lc_write);
        s.apply(SwitchAccess::read(0xC08B, 2));
        assert!(s.lc_read);
        assert!(!s.lc_bank2);
        assert!(s.lc_write);
        s.apply(SwitchAccess::read(0xC082, 1));
        assert!(!s.lc_read);
        assert!(!s.lc_write);
    }

    #[test]
    fn status_block_decodes_bit_seven() {
        let mut status = [0u8; STATUS_LEN];
        status[(0xC013 - STATUS_FIRST) as usize] = 0x80;
        status[(0xC018 - STATUS_FIRST) as usize] = 0xFF;
        status[(0xC01C - STATUS_FIRST) as usize] = 0x7F;
        let previous = SoftSwitches {
            lc_write: true,
            ..SoftSwitches::default()
        };
        let s = SoftSwitches::from_status(&status, 0x80, &previous);
        assert!(s.aux_read);
        assert!(s.store80);
        assert!(!s.page2, "bit 7 clear means off");
        assert!(s.double_hires);
        assert!(s.lc_write, "write enable carried from tracking");
    }

    #[test]
    fn transition_reaches_target() {
        let start = SoftSwitches {
            page2: true,
            lc_read: true,
            lc_bank2: true,
            ..SoftSwitches::default()
        };
        let target = SoftSwitches {
            aux_read: true,
            aux_write: true,
            store80: true,
            lc_write: true,
            lc_bank2: false,
            double_hires: true,
            ..SoftSwitches::default()
        };
        let plan = start.transition_to(&target);
        assert_eq!(replay(start, &plan), target);
        assert_eq!(replay(target, &target.transition_to(&start)), start);
    }

    #[test]
    fn transition_to_self_is_empty() {
        let s = SoftSwitches {
            hires: true,
            lc_read: true,
            ..SoftSwitches::default()
        };
        assert!(s.transition_to(&s).is_empty());
    }
}
