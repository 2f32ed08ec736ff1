//! Durable storage and tabular export of sealed IAT sessions.

pub mod export;
pub mod json;
pub mod memory;

pub use export::{CSV_COLUMNS, export_csv_file, to_csv_string, write_csv};
pub use json::JsonDirStore;
pub use memory::MemoryStore;
