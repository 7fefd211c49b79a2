//! Business logic services for the storefront.
//!
//! # Services
//!
//! - `auth` - Session lifecycle on top of the external auth provider

pub mod auth;
