//! Report generation for gate results
//!
//! Two generators are provided, each accessed through a `generate` function:
//! - **Console**: one line per check with its status, the examined values of checks that
//!   did not pass, and the overall verdict
//! - **JSON**: the complete `GateReport`, with check results in their wire format
//!
//! Both write into a `core::fmt::Write` so callers decide where the text goes.

mod console;
mod json;

pub use console::generate as generate_console;
pub use json::generate as generate_json;
