//! Luxury Jewelry Core - Shared domain types.
//!
//! This crate provides the types shared by every Luxury Jewelry component:
//! - `storefront` - Public-facing shop served over HTTP
//! - `cli` - Command-line tools for seeding and inspecting the catalog
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no HTTP
//! clients. Products and cart lines live in the hosted data service; the
//! values here are transient projections of those records.
//!
//! # Modules
//!
//! - [`types`] - Typed IDs, prices with locale formatting, stock and
//!   quantity bounds, and cart subtotals

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
