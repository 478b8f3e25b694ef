//! Prosper Investor API Client Library
//!
//! This library provides an async client for the Prosper lending platform's
//! investor REST API together with a small analysis helper built on top of it.
//!
//! # Modules
//!
//! - `analysis`: Monthly payment totals.
//! - `client`: Authenticated API client and paginated resource streams.
//! - `config`: Configuration management.
//! - `errors`: Error handling types.
//! - `models`: Page envelope and resource records.

pub mod analysis;
pub mod client;
pub mod config;
pub mod errors;
pub mod models;

pub use client::ProsperClient;
pub use errors::{ProsperError, Result};
