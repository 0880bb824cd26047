//! Loading tokenized programs straight into memory.

use serde::Serialize;

use apple2_memory::Bank;
use format_applesoft::{PointerBlock, ProgramImage};

use crate::console::Launcher;
use crate::error::{Error, Result};
use crate::machine::Apple2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InjectOptions {
    /// Where to load; defaults to the image's own start.
    pub load_address: Option<u16>,
    pub update_pointers: bool,
    pub auto_run: bool,
    /// Allow the program to run past the ceiling.
    pub allow_overflow: bool,
    /// Overrides the machine's configured ceiling.
    pub ceiling: Option<u16>,
}

impl Default for InjectOptions {
    fn default() -> Self {
        Self {
            load_address: None,
            update_pointers: true,
            auto_run: false,
            allow_overflow: false,
            ceiling: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InjectReport {
    pub load_address: u16,
    /// First address after the program.
    pub end_address: u16,
    pub bytes_written: usize,
    /// Pointers as read back after writing, if they were updated.
    pub pointers: Option<[u16; 5]>,
    /// Output of `RUN`, if the program was started.
    pub run_output: Option<Vec<String>>,
}

/// First zero-page byte where `read` differs from `wrote`, as
/// (address, wrote, read).
fn first_mismatch(wrote: &PointerBlock, read: &PointerBlock) -> Option<(u16, u8, u8)> {
    wrote
        .encode()
        .into_iter()
        .zip(read.encode())
        .flat_map(|((address, expected), (_, actual))| {
            expected
                .into_iter()
                .zip(actual)
                .enumerate()
                .map(move |(i, (e, a))| (address + i as u16, e, a))
        })
        .find(|(_, e, a)| e != a)
}

impl<L: Launcher> Apple2<L> {
    /// Write a program image and the pointers that make it the current
    /// program.
    pub fn inject(&mut self, image: &ProgramImage, options: &InjectOptions) -> Result<InjectReport> {
        self.require_live("inject a program")?;
        image.lines()?;
        let image = match options.load_address {
            Some(start) if start != image.start_address() => {
                log::debug!("relinking program from ${:04X} to ${start:04X}", image.start_address());
                image.relocate(start)?
            }
            _ => image.clone(),
        };
        let start = image.start_address();
        let end = u32::from(start) + image.len() as u32;
        let ceiling = options.ceiling.unwrap_or(self.ceiling());
        if end > u32::from(ceiling) && !options.allow_overflow {
            return Err(Error::AddressOutOfRange { start, end, ceiling });
        }

        self.in_debugger(|m| {
            if let Err(e) = m.write_bank(Bank::Main, start, image.bytes()) {
                if !matches!(e, Error::WriteVerificationFailed { .. }) {
                    return Err(e);
                }
                log::warn!("retrying program write after: {e}");
                m.write_bank(Bank::Main, start, image.bytes())?;
            }
            Ok(())
        })?;
        log::info!("injected {} bytes at ${start:04X}", image.len());

        let pointers = if options.update_pointers {
            let block = PointerBlock::for_image(&image);
            self.in_debugger(|m| {
                for (address, bytes) in block.encode() {
                    m.write_bank(Bank::Main, address, &bytes)?;
                }
                Ok(())
            })?;
            let read = self.basic_pointers()?.block();
            if let Some((address, expected, actual)) = first_mismatch(&block, &read) {
                log::warn!("pointer read-back differs: wrote {block:?}, read {read:?}");
                return Err(Error::WriteVerificationFailed {
                    address,
                    expected,
                    actual,
                });
            }
            Some([read.txttab, read.vartab, read.arytab, read.strend, read.prgend])
        } else {
            None
        };

        let run_output = if options.auto_run {
            Some(self.type_line("RUN")?)
        } else {
            None
        };

        Ok(InjectReport {
            load_address: start,
            end_address: image.variables_start(),
            bytes_written: image.len(),
            pointers,
            run_output,
        })
    }
}
