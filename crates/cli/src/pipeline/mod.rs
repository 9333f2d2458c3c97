//! Reader orchestration module.

mod orchestrator;
mod table;

pub use orchestrator::{Reader, ReaderConfig};
pub use table::{render_json, render_table};
