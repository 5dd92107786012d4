//! Shopify Admin API Request/Response Models
//!
//! Envelopes around the domain types, plus the GraphQL `productCreate`
//! shapes. GraphQL results are mapped to domain types in the mapper module.

use serde::{Deserialize, Serialize};

use crate::domain::catalog::{
    CollectionRule, Metafield, RemoteCollection, RemoteMetafield, RemoteProduct,
};

// ============================================================================
// REST Envelopes
// ============================================================================

/// `{"product": {...}}`
#[derive(Debug, Deserialize)]
pub struct ProductEnvelope {
    pub product: RemoteProduct,
}

/// `{"metafield": {...}}` request body
#[derive(Debug, Serialize)]
pub struct MetafieldRequest<'a> {
    pub metafield: &'a Metafield,
}

/// `{"metafield": {...}}` response body
#[derive(Debug, Deserialize)]
pub struct MetafieldEnvelope {
    pub metafield: RemoteMetafield,
}

/// `{"metafields": [...]}`
#[derive(Debug, Deserialize)]
pub struct MetafieldsEnvelope {
    #[serde(default)]
    pub metafields: Vec<RemoteMetafield>,
}

/// `{"smart_collection": {...}}` request body
#[derive(Debug, Serialize)]
pub struct SmartCollectionRequest<'a> {
    pub smart_collection: SmartCollectionBody<'a>,
}

#[derive(Debug, Serialize)]
pub struct SmartCollectionBody<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub title: &'a str,
    pub rules: Vec<CollectionRule>,
}

impl<'a> SmartCollectionRequest<'a> {
    /// Collection titled `title` with the single tag rule derived from it
    pub fn new(id: Option<i64>, title: &'a str) -> Self {
        SmartCollectionRequest {
            smart_collection: SmartCollectionBody {
                id,
                title,
                rules: vec![CollectionRule::for_collection(title)],
            },
        }
    }
}

/// `{"smart_collection": {...}}` response body
#[derive(Debug, Deserialize)]
pub struct SmartCollectionEnvelope {
    pub smart_collection: RemoteCollection,
}

/// Body of `inventory_levels/set.json`
#[derive(Debug, Serialize)]
pub struct InventoryLevelRequest {
    pub location_id: i64,
    pub inventory_item_id: i64,
    pub available: i64,
}

// ============================================================================
// GraphQL
// ============================================================================

pub const PRODUCT_CREATE_MUTATION: &str = r#"
mutation productCreate($input: ProductInput!) {
  productCreate(input: $input) {
    product {
      id
      title
    }
    userErrors {
      field
      message
    }
  }
}
"#;

/// `{"query": ..., "variables": ...}`
#[derive(Debug, Serialize)]
pub struct GraphQlRequest<'a, V> {
    pub query: &'a str,
    pub variables: V,
}

/// Variables of the `productCreate` mutation
#[derive(Debug, Serialize)]
pub struct ProductCreateVariables {
    pub input: ProductInput,
}

/// `ProductInput` subset sent on creation
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductInput {
    pub title: String,
    pub description_html: String,
    pub vendor: String,
    pub product_type: String,
    pub published: bool,
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub metafields: Vec<Metafield>,
}

/// Top-level GraphQL response
#[derive(Debug, Deserialize)]
pub struct GraphQlResponse<T> {
    pub data: Option<T>,
    #[serde(default)]
    pub errors: Vec<GraphQlError>,
}

#[derive(Debug, Deserialize)]
pub struct GraphQlError {
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct ProductCreateData {
    #[serde(rename = "productCreate")]
    pub product_create: Option<ProductCreatePayload>,
}

#[derive(Debug, Deserialize)]
pub struct ProductCreatePayload {
    pub product: Option<GraphQlProduct>,
    #[serde(rename = "userErrors", default)]
    pub user_errors: Vec<UserError>,
}

#[derive(Debug, Deserialize)]
pub struct GraphQlProduct {
    pub id: String,
    pub title: Option<String>,
}

/// Validation error reported inside a 200 response
#[derive(Debug, Deserialize)]
pub struct UserError {
    #[serde(default)]
    pub field: Option<Vec<String>>,
    pub message: String,
}

impl UserError {
    pub fn describe(&self) -> String {
        match &self.field {
            Some(path) if !path.is_empty() => format!("{}: {}", path.join("."), self.message),
            _ => self.message.clone(),
        }
    }
}
