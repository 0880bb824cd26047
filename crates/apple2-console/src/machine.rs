//! The Apple II as a whole: launcher, session and cached switch state.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::config::{Apple2Config, Machine};
use crate::console::{CancelToken, Launcher, ProcessLauncher};
use crate::error::{Error, Result};
use crate::memory::SwitchCache;
use crate::session::{Registers, Session, SessionState};

/// A bootable Apple II reached through an emulator console.
///
/// Memory, display, tokenizer and injector operations are implemented on
/// this type in their own modules.
pub struct Apple2<L: Launcher> {
    pub(crate) launcher: L,
    pub(crate) session: Session<L::Console>,
    ceiling: u16,
    snapshot_dir: PathBuf,
    pub(crate) switches: Option<SwitchCache>,
}

impl Apple2<ProcessLauncher> {
    /// An Apple II backed by the configured emulator binary.
    pub fn open(config: Apple2Config) -> Result<Self> {
        let session = Session::new(config.session.clone())?;
        Ok(Self {
            ceiling: config.ceiling,
            snapshot_dir: config.snapshot_dir.clone(),
            launcher: ProcessLauncher::new(config),
            session,
            switches: None,
        })
    }
}

impl<L: Launcher> Apple2<L> {
    pub fn new(launcher: L, config: &Apple2Config) -> Result<Self> {
        Ok(Self {
            launcher,
            session: Session::new(config.session.clone())?,
            ceiling: config.ceiling,
            snapshot_dir: config.snapshot_dir.clone(),
            switches: None,
        })
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        self.session.state()
    }

    #[must_use]
    pub fn session(&self) -> &Session<L::Console> {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut Session<L::Console> {
        &mut self.session
    }

    #[must_use]
    pub fn machine(&self) -> Machine {
        self.launcher.machine()
    }

    /// Highest address an injected program may reach by default.
    #[must_use]
    pub fn ceiling(&self) -> u16 {
        self.ceiling
    }

    pub fn set_ceiling(&mut self, ceiling: u16) {
        self.ceiling = ceiling;
    }

    #[must_use]
    pub fn snapshot_dir(&self) -> &Path {
        &self.snapshot_dir
    }

    #[must_use]
    pub fn cancel_token(&self) -> CancelToken {
        self.session.cancel_token()
    }

    /// Launch the emulator and wait for the BASIC prompt. A running session
    /// is shut down first.
    pub fn boot(&mut self) -> Result<String> {
        if self.session.state() != SessionState::Uninitialized {
            self.session.shutdown();
        }
        self.switches = None;
        let console = self.launcher.launch()?;
        let text = self.session.boot(console)?;
        log::info!("booted {} (generation {})", self.machine(), self.session.generation());
        Ok(text)
    }

    /// Boot a different model or disk.
    pub fn boot_with(&mut self, machine: Machine, disk: Option<PathBuf>) -> Result<String> {
        self.launcher.select(machine, disk);
        self.boot()
    }

    pub fn shutdown(&mut self) {
        self.session.shutdown();
        self.switches = None;
    }

    pub fn reset(&mut self, cold: bool) -> Result<String> {
        self.switches = None;
        self.session.reset(cold)
    }

    pub fn pause(&mut self) -> Result<()> {
        self.session.pause()
    }

    pub fn resume(&mut self) -> Result<()> {
        self.session.resume()
    }

    pub fn registers(&mut self) -> Result<Registers> {
        self.session.registers()
    }

    /// Type a line at the BASIC prompt, leaving the debugger if needed.
    pub fn type_line(&mut self, text: &str) -> Result<Vec<String>> {
        let timeout = self.session.config().run_timeout;
        self.type_line_within(text, timeout)
    }

    /// [`Apple2::type_line`] for a command that may run up to `timeout`.
    pub fn type_line_within(&mut self, text: &str, timeout: Duration) -> Result<Vec<String>> {
        self.at_keyboard(|session| session.type_line_within(text, timeout))
    }

    /// Run `f` with the machine taking keyboard input. Whatever it runs
    /// may flip soft switches, so the cached state is marked stale.
    pub(crate) fn at_keyboard<T>(
        &mut self,
        f: impl FnOnce(&mut Session<L::Console>) -> Result<T>,
    ) -> Result<T> {
        if self.session.state() == SessionState::AtDebugger {
            self.session.exit_debugger()?;
        }
        let result = f(&mut self.session);
        self.mark_switches_stale();
        result
    }

    /// Fail unless a session is up.
    pub(crate) fn require_live(&self, operation: &'static str) -> Result<()> {
        match self.session.state() {
            SessionState::Crashed => Err(Error::SessionCrashed),
            s if s.is_live() => Ok(()),
            s => Err(Error::NotReady {
                operation,
                state: s.to_string(),
            }),
        }
    }

    /// Run `f` with the CPU halted, returning to the prompt the machine
    /// was at before.
    pub(crate) fn in_debugger<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        let was_running = self.session.state() == SessionState::AtCommandPrompt;
        if was_running {
            self.session.enter_debugger()?;
        }
        let result = f(self);
        if was_running && self.session.state() == SessionState::AtDebugger {
            let exited = self.session.exit_debugger();
            if result.is_ok() {
                exited?;
            }
        }
        result
    }
}
