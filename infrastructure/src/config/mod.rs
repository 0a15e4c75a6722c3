//! Configuration file loading for tradehub
//!
//! This module handles file I/O and merging of configuration from multiple sources.
//! The priority order (highest to lowest):
//!
//! 1. Environment: `TRADEHUB_*` (sections separated by `__`)
//! 2. `--config <path>` specified file
//! 3. Project root: `./tradehub.toml` or `./.tradehub.toml`
//! 4. XDG config: `$XDG_CONFIG_HOME/tradehub/config.toml`
//! 5. Default values

mod file_config;
mod loader;

pub use file_config::{
    BackendKind, ConfigValidationError, FileAuthConfig, FileBackendConfig, FileConfig,
    FileOutputConfig, FileRealtimeConfig,
};
pub use loader::ConfigLoader;
