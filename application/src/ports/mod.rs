//! Port definitions (interfaces for external adapters)
//!
//! Ports define the contracts that infrastructure and presentation
//! adapters must implement.

pub mod email_prompt;
pub mod identity_provider;
pub mod notification_channel;
pub mod remote_store;
