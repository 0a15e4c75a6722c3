//! Interactive terminal view

pub mod command;
pub mod feed_view;
pub mod input;

pub use command::Command;
pub use feed_view::FeedView;
pub use input::{TerminalEmailPrompt, TerminalInput};
