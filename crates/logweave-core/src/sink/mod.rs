//! Output sinks: rotating files per channel and the console.

pub mod console;
pub mod file;

pub use console::{ConsoleLine, ConsoleSink, SharedBuffer, StyleTable, DEFAULT_TEMPLATE};
pub use file::{FileSink, FileSinkConfig, DEFAULT_MAX_SIZE, ERROR_CHANNEL, INFO_CHANNEL};
