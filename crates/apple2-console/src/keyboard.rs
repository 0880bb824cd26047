//! Keys sent straight to the emulated keyboard.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::console::Launcher;
use crate::error::Result;
use crate::machine::Apple2;

/// How long to listen after a key when the caller does not say.
pub const DEFAULT_SETTLE: Duration = Duration::from_millis(100);

const ESCAPE: u8 = 0x1B;
const CTRL_C: u8 = 0x03;

/// Special keys that have no printable form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    Return,
    Escape,
    /// A single Ctrl-C: breaks a running program. Two in a row enter
    /// the debugger instead.
    CtrlC,
    /// Warm reset, back to the `]` prompt.
    CtrlReset,
}

impl Key {
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Key::Return => "RETURN",
            Key::Escape => "ESCAPE",
            Key::CtrlC => "CTRL-C",
            Key::CtrlReset => "CTRL-RESET",
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Key {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().replace('+', "-").as_str() {
            "RETURN" | "ENTER" | "CR" => Ok(Key::Return),
            "ESCAPE" | "ESC" => Ok(Key::Escape),
            "CTRL-C" | "^C" => Ok(Key::CtrlC),
            "CTRL-RESET" | "RESET" => Ok(Key::CtrlReset),
            other => Err(format!("unknown key: {other} (RETURN, ESCAPE, CTRL-C or CTRL-RESET)")),
        }
    }
}

impl<L: Launcher> Apple2<L> {
    /// Press one special key and return what the machine printed within
    /// `settle`.
    pub fn send_key(&mut self, key: Key, settle: Duration) -> Result<Vec<String>> {
        log::info!("key {key}");
        let bytes = match key {
            Key::Return => self.session.config().key_return.clone().into_bytes(),
            Key::Escape => vec![ESCAPE],
            Key::CtrlC => vec![CTRL_C],
            Key::CtrlReset => {
                self.reset(false)?;
                return Ok(Vec::new());
            }
        };
        self.at_keyboard(|session| session.send_keys(&bytes, settle))
    }

    /// Type `keys` without a return, uppercased the way the keyboard
    /// sends them, and return what the machine printed within `settle`.
    pub fn send_keys(&mut self, keys: &str, settle: Duration) -> Result<Vec<String>> {
        let bytes = keys.to_ascii_uppercase().into_bytes();
        self.at_keyboard(|session| session.send_keys(&bytes, settle))
    }
}
