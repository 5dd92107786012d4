//! Catalog entity <-> Shopify GraphQL mapping

use crate::domain::catalog::{CatalogEntity, CreatedProduct};
use crate::providers::traits::{ProviderError, ProviderResult};
use super::models::*;

/// Mapper between domain entities and GraphQL shapes
pub struct ShopifyMapper;

impl ShopifyMapper {
    /// REST-shaped entity to `ProductInput`.
    ///
    /// `status` becomes `published`; variants are not part of this mutation.
    pub fn product_input(entity: &CatalogEntity) -> ProductInput {
        ProductInput {
            title: entity.title.clone(),
            description_html: entity.body_html.clone(),
            vendor: entity.vendor.clone(),
            product_type: entity.product_type.clone(),
            published: entity.status.is_active(),
            tags: entity.tags.as_slice().to_vec(),
            metafields: entity.metafields.clone(),
        }
    }

    /// Unwrap a `productCreate` response into the created product
    pub fn created_product(response: GraphQlResponse<ProductCreateData>) -> ProviderResult<CreatedProduct> {
        if !response.errors.is_empty() {
            let messages: Vec<_> = response.errors.into_iter().map(|e| e.message).collect();
            return Err(ProviderError::GraphQl(messages.join("; ")));
        }

        let payload = response
            .data
            .and_then(|data| data.product_create)
            .ok_or_else(|| ProviderError::UnexpectedShape("missing data.productCreate".to_string()))?;

        if !payload.user_errors.is_empty() {
            let messages: Vec<_> = payload.user_errors.iter().map(UserError::describe).collect();
            return Err(ProviderError::GraphQl(messages.join("; ")));
        }

        let product = payload
            .product
            .ok_or_else(|| ProviderError::UnexpectedShape("productCreate returned no product".to_string()))?;

        Ok(CreatedProduct {
            id: product.id,
            title: product.title,
            variants: Vec::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::catalog::{MetafieldType, ProductStatus};

    fn parse(raw: &str) -> GraphQlResponse<ProductCreateData> {
        serde_json::from_str(raw).unwrap()
    }

    #[test]
    fn test_product_input_mapping() {
        let mut entity = CatalogEntity::new("Nappe", "<p>Lin</p>", "Atelier", "Linge", ProductStatus::Draft);
        entity.tags.add("lin, brodé");
        entity.add_metafield("custom", "features", "100% lin", MetafieldType::MultiLineText);

        let input = ShopifyMapper::product_input(&entity);
        let json = serde_json::to_value(&input).unwrap();

        assert_eq!(json["descriptionHtml"], "<p>Lin</p>");
        assert_eq!(json["productType"], "Linge");
        assert_eq!(json["published"], false);
        assert_eq!(json["tags"], serde_json::json!(["lin", "brodé"]));
        assert_eq!(json["metafields"][0]["type"], "multi_line_text_field");
        assert!(json.get("variants").is_none());
        assert!(json.get("status").is_none());
    }

    #[test]
    fn test_created_product_success() {
        let created = ShopifyMapper::created_product(parse(
            r#"{"data":{"productCreate":{"product":{"id":"gid://shopify/Product/9","title":"Nappe"},"userErrors":[]}}}"#,
        ))
        .unwrap();
        assert_eq!(created.id, "gid://shopify/Product/9");
        assert_eq!(created.numeric_id(), Some(9));
    }

    #[test]
    fn test_user_errors_are_rejections() {
        let err = ShopifyMapper::created_product(parse(
            r#"{"data":{"productCreate":{"product":null,"userErrors":[{"field":["title"],"message":"Title can't be blank"}]}}}"#,
        ))
        .unwrap_err();
        match err {
            ProviderError::GraphQl(msg) => assert_eq!(msg, "title: Title can't be blank"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_top_level_errors() {
        let err = ShopifyMapper::created_product(parse(
            r#"{"errors":[{"message":"Throttled"},{"message":"Access denied"}]}"#,
        ))
        .unwrap_err();
        assert!(matches!(err, ProviderError::GraphQl(msg) if msg == "Throttled; Access denied"));
    }

    #[test]
    fn test_missing_payload_is_unexpected_shape() {
        let err = ShopifyMapper::created_product(parse(r#"{"data":{}}"#)).unwrap_err();
        assert!(matches!(err, ProviderError::UnexpectedShape(_)));
    }
}
