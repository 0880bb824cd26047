//! The zero-page pointer block that makes a program live.

use apple2_memory::constants::{PRGEND, TXTTAB};

use crate::program::ProgramImage;

/// Program pointers as they stand right after a program is loaded.
///
/// With no variables, arrays or strings allocated yet, VARTAB, ARYTAB and
/// STREND are equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PointerBlock {
    pub txttab: u16,
    pub vartab: u16,
    pub arytab: u16,
    pub strend: u16,
    pub prgend: u16,
}

impl PointerBlock {
    #[must_use]
    pub fn for_image(image: &ProgramImage) -> Self {
        let end = image.variables_start();
        Self {
            txttab: image.start_address(),
            vartab: end,
            arytab: end,
            strend: end,
            prgend: end,
        }
    }

    /// Contiguous runs to write: `$67-$6E` and `$AF-$B0`.
    #[must_use]
    pub fn encode(&self) -> [(u16, Vec<u8>); 2] {
        let mut low = Vec::with_capacity(8);
        for word in [self.txttab, self.vartab, self.arytab, self.strend] {
            low.extend(word.to_le_bytes());
        }
        [(TXTTAB, low), (PRGEND, self.prgend.to_le_bytes().to_vec())]
    }

    /// VARTAB, ARYTAB and STREND agree and sit past the program start.
    #[must_use]
    pub fn is_fresh(&self) -> bool {
        self.vartab == self.arytab && self.arytab == self.strend && self.vartab > self.txttab
    }
}
