//! Catalog Domain Models
//!
//! Typed representation of one catalog entity (product) as assembled from an
//! import row, plus the remote views returned once the platform has stored it.
//! Entities are built in memory, serialized to the outbound payload at the
//! HTTP boundary and then discarded.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised by entity mutation
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CatalogError {
    #[error("Variant index {index} out of range ({len} variants)")]
    VariantIndexOutOfRange { index: usize, len: usize },
}

// ============================================================================
// Status & Metafield Types
// ============================================================================

/// Publication status of a product
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductStatus {
    Active,
    Draft,
}

impl ProductStatus {
    /// `affiché` (displayed) maps to active, anything else to draft
    pub fn from_display_state(state: &str) -> Self {
        if state.trim().to_lowercase() == "affiché" {
            ProductStatus::Active
        } else {
            ProductStatus::Draft
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, ProductStatus::Active)
    }
}

impl std::fmt::Display for ProductStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProductStatus::Active => write!(f, "active"),
            ProductStatus::Draft => write!(f, "draft"),
        }
    }
}

/// Metafield value types, dictated by the field's role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MetafieldType {
    #[serde(rename = "single_line_text_field")]
    SingleLineText,
    #[serde(rename = "multi_line_text_field")]
    MultiLineText,
    #[serde(rename = "number_decimal")]
    NumberDecimal,
    #[serde(rename = "number_integer")]
    NumberInteger,
    #[serde(rename = "boolean")]
    Boolean,
    #[serde(rename = "json")]
    Json,
    #[serde(rename = "list.product_reference")]
    ProductReferenceList,
}

impl MetafieldType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetafieldType::SingleLineText => "single_line_text_field",
            MetafieldType::MultiLineText => "multi_line_text_field",
            MetafieldType::NumberDecimal => "number_decimal",
            MetafieldType::NumberInteger => "number_integer",
            MetafieldType::Boolean => "boolean",
            MetafieldType::Json => "json",
            MetafieldType::ProductReferenceList => "list.product_reference",
        }
    }
}

impl std::fmt::Display for MetafieldType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Namespaced, typed key/value attached to a product or variant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metafield {
    pub namespace: String,
    pub key: String,
    pub value: String,
    #[serde(rename = "type")]
    pub kind: MetafieldType,
}

impl Metafield {
    pub fn new(namespace: &str, key: &str, value: impl Into<String>, kind: MetafieldType) -> Self {
        Metafield {
            namespace: namespace.to_string(),
            key: key.to_string(),
            value: value.into(),
            kind,
        }
    }
}

// ============================================================================
// Variant
// ============================================================================

/// Sellable variant of a product
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variant {
    pub sku: String,

    pub option1: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub option2: Option<String>,

    /// Fixed-point price with two fraction digits
    pub price: String,

    pub inventory_policy: String,
    pub inventory_management: String,
    pub inventory_quantity: i64,
    pub requires_shipping: bool,
    pub fulfillment_service: String,
    pub taxable: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub barcode: Option<String>,

    /// Purchase cost, same format as `price`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub weight_unit: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub grams: Option<i64>,

    #[serde(default)]
    pub metafields: Vec<Metafield>,
}

impl Variant {
    /// Single default variant with stock tracked by the platform
    pub fn new(sku: &str, option1: &str, price: String) -> Self {
        Variant {
            sku: sku.to_string(),
            option1: option1.to_string(),
            option2: None,
            price,
            inventory_policy: "deny".to_string(),
            inventory_management: "shopify".to_string(),
            inventory_quantity: 0,
            requires_shipping: true,
            fulfillment_service: "manual".to_string(),
            taxable: true,
            barcode: None,
            cost: None,
            weight: None,
            weight_unit: None,
            grams: None,
            metafields: Vec::new(),
        }
    }

    /// Set the weight in grams, along with its unit and rounded gram count
    pub fn with_weight_grams(mut self, grams: f64) -> Self {
        self.weight = Some(grams);
        self.weight_unit = Some("g".to_string());
        self.grams = Some(grams.round() as i64);
        self
    }

    fn same_options(&self, other: &Variant) -> bool {
        self.option1 == other.option1 && self.option2 == other.option2
    }
}

// ============================================================================
// Tags & Images
// ============================================================================

/// Case-sensitive unique tags, in insertion order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TagSet(Vec<String>);

impl TagSet {
    pub fn new() -> Self {
        TagSet(Vec::new())
    }

    /// Add a tag; comma-separated input is exploded into several tags
    pub fn add(&mut self, tag: &str) {
        for part in tag.split(',') {
            let part = part.trim();
            if !part.is_empty() && !self.contains(part) {
                self.0.push(part.to_string());
            }
        }
    }

    pub fn extend<I, S>(&mut self, tags: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for tag in tags {
            self.add(tag.as_ref());
        }
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.0.iter().any(|t| t == tag)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn joined(&self) -> String {
        self.0.join(", ")
    }
}

/// Product image, optionally bound to the variants it illustrates
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Image {
    pub src: String,
    pub sku: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant_ids: Option<Vec<i64>>,
}

/// Ordered image list
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImageSet(Vec<Image>);

impl ImageSet {
    pub fn new() -> Self {
        ImageSet(Vec::new())
    }

    pub fn add(&mut self, src: &str, sku: &str) {
        self.0.push(Image {
            src: src.to_string(),
            sku: sku.to_string(),
            variant_ids: None,
        });
    }

    /// Attach a platform-assigned variant id to every image with this SKU
    pub fn add_variant_id(&mut self, variant_id: i64, sku: &str) -> usize {
        let mut touched = 0;
        for image in self.0.iter_mut().filter(|image| image.sku == sku) {
            image.variant_ids.get_or_insert_with(Vec::new).push(variant_id);
            touched += 1;
        }
        touched
    }

    pub fn as_slice(&self) -> &[Image] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

// ============================================================================
// Catalog Entity
// ============================================================================

/// Product option group (e.g. "Title", "Size")
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductOption {
    pub name: String,
}

/// One product as sent to the platform
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntity {
    pub title: String,

    pub body_html: String,

    pub vendor: String,

    pub status: ProductStatus,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<ProductOption>,

    pub variants: Vec<Variant>,

    pub product_type: String,

    pub metafields: Vec<Metafield>,

    pub tags: TagSet,

    #[serde(default, skip_serializing_if = "ImageSet::is_empty")]
    pub images: ImageSet,

    #[serde(rename = "metafields_global_title_tag", skip_serializing_if = "Option::is_none")]
    pub seo_title: Option<String>,

    #[serde(rename = "metafields_global_description_tag", skip_serializing_if = "Option::is_none")]
    pub seo_description: Option<String>,

    pub handle: String,
}

impl CatalogEntity {
    pub fn new(
        title: &str,
        body_html: &str,
        vendor: &str,
        product_type: &str,
        status: ProductStatus,
    ) -> Self {
        CatalogEntity {
            title: title.to_string(),
            body_html: body_html.to_string(),
            vendor: vendor.to_string(),
            status,
            options: Vec::new(),
            variants: Vec::new(),
            product_type: product_type.to_string(),
            metafields: Vec::new(),
            tags: TagSet::new(),
            images: ImageSet::new(),
            seo_title: None,
            seo_description: None,
            handle: String::new(),
        }
    }

    /// Add an option group unless one with the same name exists
    pub fn add_option(&mut self, name: &str) {
        if !self.options.iter().any(|o| o.name == name) {
            self.options.push(ProductOption { name: name.to_string() });
        }
    }

    /// Add a variant; a later variant with the same (option1, option2) is dropped
    pub fn add_variant(&mut self, variant: Variant) -> bool {
        if self.variants.iter().any(|v| v.same_options(&variant)) {
            return false;
        }
        self.variants.push(variant);
        true
    }

    /// Insert a metafield, or overwrite value and type of the existing
    /// (namespace, key) pair in place
    pub fn add_metafield(&mut self, namespace: &str, key: &str, value: impl Into<String>, kind: MetafieldType) {
        let value = value.into();
        match self
            .metafields
            .iter_mut()
            .find(|m| m.namespace == namespace && m.key == key)
        {
            Some(existing) => {
                existing.value = value;
                existing.kind = kind;
            }
            None => self.metafields.push(Metafield::new(namespace, key, value, kind)),
        }
    }

    /// Append a metafield to one variant
    pub fn add_variant_metafield(
        &mut self,
        variant_index: usize,
        metafield: Metafield,
    ) -> Result<(), CatalogError> {
        let len = self.variants.len();
        let variant = self
            .variants
            .get_mut(variant_index)
            .ok_or(CatalogError::VariantIndexOutOfRange { index: variant_index, len })?;
        variant.metafields.push(metafield);
        Ok(())
    }

    /// Drop option groups with an empty name
    pub fn prune_empty_options(&mut self) {
        self.options.retain(|o| !o.name.trim().is_empty());
    }

    /// Bind images to the variants the platform created, matching on SKU
    pub fn assign_variant_ids(&mut self, variants: &[RemoteVariant]) -> usize {
        variants
            .iter()
            .filter_map(|v| v.sku.as_deref().map(|sku| (v.id, sku)))
            .filter(|(_, sku)| !sku.is_empty())
            .map(|(id, sku)| self.images.add_variant_id(id, sku))
            .sum()
    }
}

/// Wire envelope: `{"product": {...}}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductPayload {
    pub product: CatalogEntity,
}

impl ProductPayload {
    pub fn new(product: CatalogEntity) -> Self {
        ProductPayload { product }
    }

    /// Payload re-sending only the images, used after variant ids are known
    pub fn images_update(&self, product_id: i64) -> serde_json::Value {
        serde_json::json!({
            "product": {
                "id": product_id,
                "images": self.product.images,
            }
        })
    }
}

// ============================================================================
// Smart Collections
// ============================================================================

/// Rule selecting the products of a smart collection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionRule {
    pub column: String,
    pub relation: String,
    pub condition: String,
}

impl CollectionRule {
    /// Products carrying exactly `tag`
    pub fn tag_equals(tag: impl Into<String>) -> Self {
        CollectionRule {
            column: "tag".to_string(),
            relation: "equals".to_string(),
            condition: tag.into(),
        }
    }

    /// The single rule of the collection titled `title`: products tagged
    /// `Collection: {title}`
    pub fn for_collection(title: &str) -> Self {
        Self::tag_equals(format!("Collection: {}", title))
    }
}

// ============================================================================
// Remote Views
// ============================================================================

/// Numeric tail of a REST id or a `gid://` id
pub fn numeric_id(id: &str) -> Option<i64> {
    id.rsplit('/').next().and_then(|tail| tail.parse().ok())
}

/// Variant as stored by the platform
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteVariant {
    pub id: i64,
    #[serde(default)]
    pub product_id: Option<i64>,
    #[serde(default)]
    pub sku: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub inventory_item_id: Option<i64>,
}

/// Product as stored by the platform
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteProduct {
    pub id: i64,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub handle: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub variants: Vec<RemoteVariant>,
}

/// Metafield as stored by the platform
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteMetafield {
    pub id: i64,
    pub namespace: String,
    pub key: String,
    pub value: serde_json::Value,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
}

/// Smart collection as stored by the platform
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteCollection {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub handle: Option<String>,
    #[serde(default)]
    pub rules: Vec<CollectionRule>,
}

/// Identifier and summary of a freshly created (or updated) product
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedProduct {
    /// Numeric id for REST, `gid://` id for GraphQL
    pub id: String,
    pub title: Option<String>,
    pub variants: Vec<RemoteVariant>,
}

impl CreatedProduct {
    /// Numeric id, when the platform returned one
    pub fn numeric_id(&self) -> Option<i64> {
        numeric_id(&self.id)
    }
}

impl From<RemoteProduct> for CreatedProduct {
    fn from(product: RemoteProduct) -> Self {
        CreatedProduct {
            id: product.id.to_string(),
            title: product.title,
            variants: product.variants,
        }
    }
}
