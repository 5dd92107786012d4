//! Catalog Sync
//!
//! Imports a semicolon-delimited product export into a remote e-commerce
//! catalog through its admin API, spreading calls over several credentials
//! and keeping each one under its own sliding-window rate limit.

pub mod config;
pub mod domain;
pub mod providers;
pub mod sync;

#[cfg(test)]
mod test_support;
