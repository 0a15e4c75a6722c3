//! Presentation-level configuration

/// Settings for the terminal feed view
#[derive(Debug, Clone)]
pub struct ViewConfig {
    /// Clear the terminal before each render
    pub clear_screen: bool,
    /// `chrono` format string for post timestamps, in local time
    pub timestamp_format: String,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            clear_screen: true,
            timestamp_format: "%Y-%m-%d %H:%M".to_string(),
        }
    }
}
