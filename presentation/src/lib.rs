//! Presentation layer for tradehub
//!
//! This crate contains CLI definitions, the feed renderer and the
//! interactive terminal view.

pub mod cli;
pub mod config;
pub mod output;
pub mod view;

// Re-export commonly used types
pub use cli::commands::Cli;
pub use config::ViewConfig;
pub use output::renderer::{FeedRenderer, Frame, StatusLine};
pub use view::{Command, FeedView, TerminalEmailPrompt, TerminalInput};
