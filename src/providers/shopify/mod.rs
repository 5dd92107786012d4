//! Shopify Provider Module
//!
//! Admin REST API for products, variants, metafields and inventory, plus the
//! GraphQL `productCreate` mutation.
//!
//! API Documentation: https://shopify.dev/docs/api/admin-rest

mod client;
mod models;
mod mapper;

pub use client::ShopifyProvider;
pub use mapper::ShopifyMapper;
pub use models::ProductInput;
