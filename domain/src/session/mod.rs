//! Session domain.
//!
//! - [`entities::Session`] — an authenticated identity with its tokens
//! - [`entities::UserId`] — identifier issued by the identity provider

pub mod entities;
