//! Console output for the feed view

pub mod renderer;
