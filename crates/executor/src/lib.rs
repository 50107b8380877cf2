//! The single-threaded swap-core command loop: request extraction,
//! lock acquisition, swap-intention decisions, and folding completed
//! I/O back into RAM, wired together around one [`Executor`] per
//! logical database.

mod config;
mod database;
mod error;
mod executor;
mod extract;

pub use config::SwapConfig;
pub use error::{ExecError, ExecResult};
pub use executor::{Executor, Output};
pub use extract::Command;
