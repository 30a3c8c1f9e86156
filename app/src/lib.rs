//! # CMOD App
//!
//! The `cmodfix` tool: reads a model in either CMOD encoding, optionally
//! repairs and conditions it, and writes it back out.
//!
//! - [`FixOptions`] - What to do, parsed from the command line
//! - [`process`] - Apply the selected operations to a loaded model
//! - [`convert`] - Stream to stream conversion
//! - [`run`] - Entry point used by the binary
//!
//! ## Example
//!
//! ```ignore
//! use cmod_app::{convert, FixOptions};
//!
//! let options = FixOptions { uniquify: true, condition: true, ..Default::default() };
//! convert(std::io::stdin(), std::io::stdout(), &options)?;
//! ```

mod app;
mod args;

pub use app::{convert, process, run, FixError};
pub use args::FixOptions;

/// App library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
