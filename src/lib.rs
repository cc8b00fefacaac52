pub mod config;
pub mod net;
pub mod processing;
pub mod resolve;
pub mod scanner;
pub mod terminal_colors;
pub mod tracing;
