//! Provider trait definitions for catalog platform integrations
//!
//! The sync pipeline talks to the remote platform only through
//! [`CatalogProvider`], so the orchestrator can run against the live API or
//! an in-memory stand-in.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::catalog::{
    CreatedProduct, Metafield, ProductPayload, RemoteCollection, RemoteMetafield, RemoteProduct,
    RemoteVariant,
};
use crate::providers::credentials::ConfigurationError;
use crate::providers::pagination::PagedResult;

// ============================================================================
// Error Types
// ============================================================================

/// Provider error types
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Remote rejection: {status} - {body}")]
    RemoteRejection { status: u16, body: String },

    #[error("Unexpected response shape: {0}")]
    UnexpectedShape(String),

    #[error("GraphQL error: {0}")]
    GraphQl(String),

    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("Cancelled")]
    Cancelled,
}

impl ProviderError {
    /// Failures worth retrying: connection/timeouts, 429 and 5xx
    pub fn is_transient(&self) -> bool {
        match self {
            ProviderError::Transport(e) => e.is_connect() || e.is_timeout(),
            ProviderError::RemoteRejection { status, .. } => is_transient_status(*status),
            _ => false,
        }
    }
}

/// 429 and 5xx statuses are retried
pub fn is_transient_status(status: u16) -> bool {
    status == 429 || (500..600).contains(&status)
}

/// Result type for provider operations
pub type ProviderResult<T> = Result<T, ProviderError>;

// ============================================================================
// Provider Trait
// ============================================================================

/// Catalog operations the importer needs from the remote platform.
///
/// Every method takes the credential index used to pick the account (and
/// therefore the rate limiter) the call is charged to.
#[async_trait]
pub trait CatalogProvider: Send + Sync {
    /// Provider code (e.g., "shopify")
    fn code(&self) -> &'static str;

    /// Create a product from a REST payload
    async fn create_product(
        &self,
        credential_index: usize,
        payload: &ProductPayload,
    ) -> ProviderResult<CreatedProduct>;

    /// Create a product through the structured-query endpoint
    async fn create_product_graphql(
        &self,
        credential_index: usize,
        payload: &ProductPayload,
    ) -> ProviderResult<CreatedProduct>;

    /// Update an existing product with a partial body
    async fn update_product(
        &self,
        credential_index: usize,
        product_id: i64,
        body: &serde_json::Value,
    ) -> ProviderResult<CreatedProduct>;

    /// Delete a product
    async fn delete_product(&self, credential_index: usize, product_id: i64) -> ProviderResult<()>;

    /// List every product, following pagination
    async fn list_products(&self, credential_index: usize) -> PagedResult<RemoteProduct>;

    /// List every variant, following pagination
    async fn list_variants(&self, credential_index: usize) -> PagedResult<RemoteVariant>;

    /// Attach a metafield to a product
    async fn create_metafield(
        &self,
        credential_index: usize,
        product_id: i64,
        metafield: &Metafield,
    ) -> ProviderResult<RemoteMetafield>;

    /// Metafields of one variant
    async fn variant_metafields(
        &self,
        credential_index: usize,
        variant_id: i64,
    ) -> ProviderResult<Vec<RemoteMetafield>>;

    /// Set the available quantity of an inventory item at the configured location
    async fn set_inventory_level(
        &self,
        credential_index: usize,
        inventory_item_id: i64,
        available: i64,
    ) -> ProviderResult<serde_json::Value>;

    /// List every smart collection, following pagination
    async fn list_smart_collections(&self, credential_index: usize) -> PagedResult<RemoteCollection>;

    /// Create a smart collection gathering the products tagged `Collection: {title}`
    async fn create_smart_collection(
        &self,
        credential_index: usize,
        title: &str,
    ) -> ProviderResult<RemoteCollection>;

    /// Rename a smart collection and point its rule at the new title's tag
    async fn update_smart_collection(
        &self,
        credential_index: usize,
        collection_id: i64,
        title: &str,
    ) -> ProviderResult<RemoteCollection>;
}
