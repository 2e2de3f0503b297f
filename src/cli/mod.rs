pub mod commands;
pub mod output;

// Re-export for clean API
pub use commands::Cli;
pub use output::Output;
