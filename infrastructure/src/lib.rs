//! Infrastructure layer for tradehub
//!
//! This crate contains adapters that implement the ports defined
//! in the application layer, plus configuration file loading.

pub mod config;
pub mod error;
pub mod hosted;
pub mod memory;
pub mod session_store;

// Re-export commonly used types
pub use config::{
    BackendKind, ConfigLoader, ConfigValidationError, FileAuthConfig, FileBackendConfig,
    FileConfig, FileOutputConfig, FileRealtimeConfig,
};
pub use error::{BackendError, Result};
pub use hosted::{HostedBackend, HostedSettings};
pub use memory::InMemoryBackend;
pub use session_store::FileSessionStore;
