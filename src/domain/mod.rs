//! Domain types and field cleaning rules

pub mod catalog;
pub mod cleaning;

pub use catalog::{
    numeric_id, CatalogEntity, CatalogError, CollectionRule, CreatedProduct, Image, ImageSet, Metafield, MetafieldType,
    ProductOption, ProductPayload, ProductStatus, RemoteCollection, RemoteMetafield, RemoteProduct, RemoteVariant,
    TagSet, Variant,
};
