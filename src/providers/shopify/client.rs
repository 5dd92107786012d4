//! Shopify Admin API Client Implementation
//!
//! Implements [`CatalogProvider`] over the shared [`ClientContext`]: every
//! call is charged to the credential picked by index and goes through that
//! credential's rate limiter.

use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tracing::{debug, info, instrument};

use crate::config::Settings;
use crate::domain::catalog::{
    CreatedProduct, Metafield, ProductPayload, RemoteCollection, RemoteMetafield, RemoteProduct,
    RemoteVariant,
};
use crate::providers::credentials::ConfigurationError;
use crate::providers::http_client::{ensure_success, read_json, ClientContext};
use crate::providers::pagination::{PagedFetcher, PagedResult};
use crate::providers::traits::{CatalogProvider, ProviderResult};
use super::mapper::ShopifyMapper;
use super::models::*;

/// Shopify Admin API client
pub struct ShopifyProvider {
    /// Shared session, pool and limiters
    context: Arc<ClientContext>,

    /// Hard cap on pages followed by list operations
    max_pages: usize,

    /// `limit` query parameter of list operations
    page_size: u32,

    /// Location used for inventory updates
    location_id: Option<i64>,
}

impl ShopifyProvider {
    pub fn new(context: Arc<ClientContext>, settings: &Settings) -> Self {
        ShopifyProvider {
            context,
            max_pages: settings.sync.max_pages,
            page_size: settings.sync.page_size.clamp(1, 250),
            location_id: settings.shop.location_id,
        }
    }

    pub fn context(&self) -> &ClientContext {
        &self.context
    }

    async fn post_json<B, T>(&self, credential_index: usize, path: &str, body: &B) -> ProviderResult<T>
    where
        B: serde::Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        let url = self.context.endpoint(path)?;
        debug!(url = %url, "Shopify POST");
        let response = self
            .context
            .post(url, credential_index)?
            .json(body)
            .send_with_retry()
            .await?;
        read_json(response).await
    }
}

#[async_trait]
impl CatalogProvider for ShopifyProvider {
    fn code(&self) -> &'static str {
        "shopify"
    }

    #[instrument(skip(self, payload), fields(title = %payload.product.title))]
    async fn create_product(
        &self,
        credential_index: usize,
        payload: &ProductPayload,
    ) -> ProviderResult<CreatedProduct> {
        let envelope: ProductEnvelope = self
            .post_json(credential_index, "products.json", payload)
            .await?;
        info!(product_id = envelope.product.id, "Product created");
        Ok(envelope.product.into())
    }

    #[instrument(skip(self, payload), fields(title = %payload.product.title))]
    async fn create_product_graphql(
        &self,
        credential_index: usize,
        payload: &ProductPayload,
    ) -> ProviderResult<CreatedProduct> {
        let request = GraphQlRequest {
            query: PRODUCT_CREATE_MUTATION,
            variables: ProductCreateVariables {
                input: ShopifyMapper::product_input(&payload.product),
            },
        };
        let response: GraphQlResponse<ProductCreateData> = self
            .post_json(credential_index, "graphql.json", &request)
            .await?;
        let created = ShopifyMapper::created_product(response)?;
        info!(product_id = %created.id, "Product created");
        Ok(created)
    }

    #[instrument(skip(self, body))]
    async fn update_product(
        &self,
        credential_index: usize,
        product_id: i64,
        body: &serde_json::Value,
    ) -> ProviderResult<CreatedProduct> {
        let url = self.context.endpoint(&format!("products/{}.json", product_id))?;
        let response = self
            .context
            .put(url, credential_index)?
            .json(body)
            .send_with_retry()
            .await?;
        let envelope: ProductEnvelope = read_json(response).await?;
        Ok(envelope.product.into())
    }

    #[instrument(skip(self))]
    async fn delete_product(&self, credential_index: usize, product_id: i64) -> ProviderResult<()> {
        let url = self.context.endpoint(&format!("products/{}.json", product_id))?;
        let response = self.context.delete(url, credential_index)?.send_with_retry().await?;
        ensure_success(response).await?;
        info!(product_id, "Product deleted");
        Ok(())
    }

    async fn list_products(&self, credential_index: usize) -> PagedResult<RemoteProduct> {
        PagedFetcher::new(&self.context, self.max_pages)
            .fetch_all(
                &format!("products.json?limit={}", self.page_size),
                "products",
                credential_index,
            )
            .await
    }

    async fn list_variants(&self, credential_index: usize) -> PagedResult<RemoteVariant> {
        PagedFetcher::new(&self.context, self.max_pages)
            .fetch_all(
                &format!("variants.json?limit={}", self.page_size),
                "variants",
                credential_index,
            )
            .await
    }

    #[instrument(skip(self, metafield), fields(key = %metafield.key))]
    async fn create_metafield(
        &self,
        credential_index: usize,
        product_id: i64,
        metafield: &Metafield,
    ) -> ProviderResult<RemoteMetafield> {
        let envelope: MetafieldEnvelope = self
            .post_json(
                credential_index,
                &format!("products/{}/metafields.json", product_id),
                &MetafieldRequest { metafield },
            )
            .await?;
        Ok(envelope.metafield)
    }

    async fn variant_metafields(
        &self,
        credential_index: usize,
        variant_id: i64,
    ) -> ProviderResult<Vec<RemoteMetafield>> {
        let url = self
            .context
            .endpoint(&format!("variants/{}/metafields.json", variant_id))?;
        let response = self.context.get(url, credential_index)?.send_with_retry().await?;
        let envelope: MetafieldsEnvelope = read_json(response).await?;
        Ok(envelope.metafields)
    }

    #[instrument(skip(self))]
    async fn set_inventory_level(
        &self,
        credential_index: usize,
        inventory_item_id: i64,
        available: i64,
    ) -> ProviderResult<serde_json::Value> {
        let location_id = self
            .location_id
            .ok_or(ConfigurationError::MissingSetting("shop.location_id"))?;

        self.post_json(
            credential_index,
            "inventory_levels/set.json",
            &InventoryLevelRequest {
                location_id,
                inventory_item_id,
                available,
            },
        )
        .await
    }

    async fn list_smart_collections(&self, credential_index: usize) -> PagedResult<RemoteCollection> {
        PagedFetcher::new(&self.context, self.max_pages)
            .fetch_all(
                &format!("smart_collections.json?limit={}", self.page_size),
                "smart_collections",
                credential_index,
            )
            .await
    }

    #[instrument(skip(self))]
    async fn create_smart_collection(
        &self,
        credential_index: usize,
        title: &str,
    ) -> ProviderResult<RemoteCollection> {
        let envelope: SmartCollectionEnvelope = self
            .post_json(
                credential_index,
                "smart_collections.json",
                &SmartCollectionRequest::new(None, title),
            )
            .await?;
        info!(collection_id = envelope.smart_collection.id, "Smart collection created");
        Ok(envelope.smart_collection)
    }

    #[instrument(skip(self))]
    async fn update_smart_collection(
        &self,
        credential_index: usize,
        collection_id: i64,
        title: &str,
    ) -> ProviderResult<RemoteCollection> {
        let url = self
            .context
            .endpoint(&format!("smart_collections/{}.json", collection_id))?;
        let response = self
            .context
            .put(url, credential_index)?
            .json(&SmartCollectionRequest::new(Some(collection_id), title))
            .send_with_retry()
            .await?;
        let envelope: SmartCollectionEnvelope = read_json(response).await?;
        Ok(envelope.smart_collection)
    }
}
