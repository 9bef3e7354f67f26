pub mod data;
pub mod defaults;
pub mod io;
pub mod printing;

pub use data::{path_display, ApiMode, MemoryWindow, Settings};
pub use io::ConfigError;

#[cfg(test)]
pub mod tests;
