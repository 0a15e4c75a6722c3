//! Core domain concepts shared across all subdomains.
//!
//! - [`error::DomainError`] — domain-level validation errors

pub mod error;
