//! Console bridge to the Bobbin Apple II emulator.
//!
//! The emulator runs as a child process in its simple console mode. A
//! [`Session`] drives its BASIC prompt and built-in debugger; [`Apple2`]
//! layers bank-aware memory access, screen capture, Applesoft tokenization
//! and program injection on top. [`mcp::McpServer`] exposes all of it as
//! JSON-RPC tools.

pub mod config;
pub mod console;
pub mod display;
pub mod error;
pub mod inject;
pub mod keyboard;
mod machine;
pub mod mcp;
pub mod memory;
pub mod session;
pub mod shared;
pub mod snapshot;
pub mod tokenize;

pub use config::{Apple2Config, Machine, PromptSet, SessionConfig};
pub use console::{CancelToken, Console, Launcher, ProcessConsole, ProcessLauncher, Received};
pub use display::{DisplayMode, ScreenFrame};
pub use error::{Error, Result};
pub use inject::{InjectOptions, InjectReport};
pub use keyboard::Key;
pub use machine::Apple2;
pub use memory::BasicPointers;
pub use session::{Prompt, Registers, Session, SessionState};
pub use shared::Apple2Handle;
pub use snapshot::Snapshot;
pub use tokenize::{ProcessTokenizer, TokenizeMode, Tokenized};
