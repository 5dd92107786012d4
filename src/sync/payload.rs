//! Row-to-product payload assembly
//!
//! Pure transformation of one export row into a [`ProductPayload`]. A row
//! never fails to build: missing or malformed optional fields are omitted.

use std::collections::HashMap;

use crate::domain::catalog::{CatalogEntity, MetafieldType, ProductPayload, ProductStatus, Variant};
use crate::domain::cleaning::{
    clean_decimal, clean_int, clean_weight_grams, normalize_whitespace, sanitize_identifier,
    sanitize_tag_value, slugify, split_to_list,
};

/// One export row, keyed by column header
pub type RawRow = HashMap<String, String>;

/// Column headers of the product export
pub mod columns {
    pub const PRODUCT_ID: &str = "ID produit";
    pub const SKU: &str = "Référence du produit";
    pub const VENDOR: &str = "Nom du fournisseur";
    pub const EAN13: &str = "EAN 13";
    pub const TITLE: &str = "Nom du produit";
    pub const LONG_DESCRIPTION: &str = "Description longue";
    pub const SHORT_DESCRIPTION: &str = "Description courte";
    pub const KEYWORDS: &str = "Mots clés";
    pub const FEATURES: &str = "Caractéristiques";
    pub const WEIGHT: &str = "Poids";
    pub const QUANTITY: &str = "Quantité";
    pub const STOCK: &str = "Nombre de produits en stock";
    pub const PRICE: &str = "Prix du produit (TTC hors remise)";
    pub const PURCHASE_PRICE: &str = "Prix d'achat HT du produit";
    pub const VAT_RATE: &str = "Taux de tva";
    pub const SUBCATEGORY: &str = "Sous-catégorie principale";
    pub const CATEGORY: &str = "Catégorie";
    pub const PARENT_CATEGORY: &str = "Catégorie principale parente";
    pub const BRAND: &str = "Nom Marque";
    pub const PAGE_TITLE: &str = "Titre de la page";
    pub const META_DESCRIPTION: &str = "Méta description";
    pub const DISPLAY_STATE: &str = "Etat";

    /// `Photo 1` .. `Photo 5`
    pub fn photo(index: usize) -> String {
        format!("Photo {}", index)
    }
}

/// Maximum number of photo columns read per row
pub const MAX_PHOTOS: usize = 5;

const DEFAULT_OPTION: &str = "Title";
const DEFAULT_OPTION_VALUE: &str = "Default Title";
const DEFAULT_PRODUCT_TYPE: &str = "Divers";
/// Price is the one numeric field that falls back instead of being omitted
const FALLBACK_PRICE: &str = "0.00";

/// Builds product payloads from export rows
#[derive(Debug, Default, Clone, Copy)]
pub struct PayloadBuilder;

impl PayloadBuilder {
    pub fn new() -> Self {
        PayloadBuilder
    }

    /// Build the payload and the label used to report on this row.
    ///
    /// The label falls back through title, SKU and product id; it is empty
    /// when the row carries none of them.
    pub fn build(&self, row: &RawRow) -> (ProductPayload, String) {
        let field = |name: &str| row.get(name).map(String::as_str).unwrap_or("");

        let product_id = sanitize_identifier(field(columns::PRODUCT_ID));
        let sku = field(columns::SKU).trim();
        let vendor = field(columns::VENDOR).trim();
        let ean13 = field(columns::EAN13).trim();
        let title = normalize_whitespace(field(columns::TITLE));
        let long_description = field(columns::LONG_DESCRIPTION).trim();
        let short_description = field(columns::SHORT_DESCRIPTION).trim();
        let keywords = split_to_list(field(columns::KEYWORDS));
        let features = field(columns::FEATURES).trim();
        let weight = clean_weight_grams(field(columns::WEIGHT));
        // A zero quantity falls through to the stock column
        let quantity = clean_int(field(columns::QUANTITY))
            .filter(|q| *q != 0)
            .or_else(|| clean_int(field(columns::STOCK)).filter(|q| *q != 0))
            .unwrap_or(0);
        let price = clean_decimal(field(columns::PRICE)).unwrap_or_else(|| FALLBACK_PRICE.to_string());
        let purchase_price = clean_decimal(field(columns::PURCHASE_PRICE));
        let vat_rate = field(columns::VAT_RATE).trim();
        let subcategory = field(columns::SUBCATEGORY).trim();
        // A whitespace-only category counts as missing
        let category = match field(columns::CATEGORY).trim() {
            "" => field(columns::PARENT_CATEGORY).trim(),
            value => value,
        };
        let parent_category = field(columns::PARENT_CATEGORY).trim();
        let brand = field(columns::BRAND).trim();
        let page_title = field(columns::PAGE_TITLE).trim();
        let meta_description = field(columns::META_DESCRIPTION).trim();

        let status = ProductStatus::from_display_state(field(columns::DISPLAY_STATE));
        let product_type = [subcategory, parent_category]
            .into_iter()
            .find(|value| !value.is_empty())
            .unwrap_or(DEFAULT_PRODUCT_TYPE);
        let effective_vendor = if vendor.is_empty() { brand } else { vendor };

        let mut product = CatalogEntity::new(
            &title,
            long_description,
            effective_vendor,
            product_type,
            status,
        );

        product.add_option(DEFAULT_OPTION);

        let mut variant = Variant::new(sku, DEFAULT_OPTION_VALUE, price);
        variant.inventory_quantity = quantity;
        variant.taxable = vat_rate != "0";
        if !ean13.is_empty() {
            variant.barcode = Some(ean13.to_string());
        }
        variant.cost = purchase_price.clone();
        if let Some(grams) = weight {
            variant = variant.with_weight_grams(grams);
        }
        product.add_variant(variant);

        if !product_id.is_empty() {
            product.add_metafield(
                "custom",
                "product_id",
                format!("product_id : {}", product_id),
                MetafieldType::SingleLineText,
            );
        }
        if !short_description.is_empty() {
            product.add_metafield("custom", "short_description", short_description, MetafieldType::MultiLineText);
        }
        if !keywords.is_empty() {
            product.add_metafield("custom", "keywords", keywords.join("\n"), MetafieldType::MultiLineText);
        }
        if !features.is_empty() {
            product.add_metafield("custom", "features", features, MetafieldType::MultiLineText);
        }
        if !meta_description.is_empty() {
            product.add_metafield("custom", "meta_description", meta_description, MetafieldType::MultiLineText);
        }
        if let Some(cost) = &purchase_price {
            product.add_metafield("custom", "purchase_price_ht", cost.as_str(), MetafieldType::NumberDecimal);
        }
        if !page_title.is_empty() {
            product.add_metafield("seo", "title", page_title, MetafieldType::SingleLineText);
        }

        product.tags.extend(&keywords);
        if !product_id.is_empty() {
            product.tags.add(&format!("product_id:{}", product_id));
        }
        if !subcategory.is_empty() {
            product.tags.add(&format!("Sous_Categorie_{}", sanitize_tag_value(subcategory)));
        }
        if !category.is_empty() {
            product.tags.add(&format!("Categorie : {}", category));
        }
        if !parent_category.is_empty() {
            product.tags.add(&format!("Categorie_principale : {}", parent_category));
        }
        if !vendor.is_empty() {
            product.tags.add(&format!("Fournisseur : {}", vendor));
        }
        if !brand.is_empty() {
            product.tags.add(&format!("Marque : {}", brand));
        }

        for index in 1..=MAX_PHOTOS {
            let url = field(&columns::photo(index)).trim();
            if !url.is_empty() {
                product.images.add(url, sku);
            }
        }

        product.prune_empty_options();
        if !page_title.is_empty() {
            product.seo_title = Some(page_title.to_string());
        }
        if !meta_description.is_empty() {
            product.seo_description = Some(meta_description.to_string());
        }
        product.handle = slugify(&title);

        let label = [title.as_str(), sku, product_id.as_str()]
            .into_iter()
            .find(|value| !value.is_empty())
            .unwrap_or("")
            .to_string();

        (ProductPayload::new(product), label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(cells: &[(&str, &str)]) -> RawRow {
        cells
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_end_to_end_minimal_row() {
        let (payload, label) = PayloadBuilder::new().build(&row(&[
            (columns::PRODUCT_ID, "7"),
            (columns::SKU, "X1"),
            (columns::TITLE, "Echarpe"),
            (columns::PRICE, "19,90"),
            (columns::DISPLAY_STATE, "affiché"),
        ]));
        let product = &payload.product;

        assert_eq!(label, "Echarpe");
        assert_eq!(product.status, ProductStatus::Active);
        assert_eq!(product.variants[0].price, "19.90");
        assert_eq!(product.handle, "echarpe");
        assert_eq!(product.product_type, "Divers");
        let id = &product.metafields[0];
        assert_eq!((id.namespace.as_str(), id.key.as_str()), ("custom", "product_id"));
        assert_eq!(id.value, "product_id : 7");

        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["product"]["status"], "active");
        assert_eq!(json["product"]["options"], serde_json::json!([{"name": "Title"}]));
    }

    #[test]
    fn test_two_photos_become_two_images() {
        let (payload, _) = PayloadBuilder::new().build(&row(&[
            (columns::SKU, "X1"),
            ("Photo 1", "https://cdn.example/1.jpg"),
            ("Photo 2", "  "),
            ("Photo 3", "https://cdn.example/3.jpg"),
            ("Photo 4", ""),
            ("Photo 5", ""),
        ]));
        let images = payload.product.images.as_slice();

        assert_eq!(images.len(), 2);
        assert!(images.iter().all(|image| image.sku == "X1"));
        assert_eq!(images[1].src, "https://cdn.example/3.jpg");
    }

    #[test]
    fn test_unparsable_price_falls_back_but_cost_is_omitted() {
        let (payload, _) = PayloadBuilder::new().build(&row(&[
            (columns::PRICE, "sur devis"),
            (columns::PURCHASE_PRICE, "??"),
            (columns::WEIGHT, "n/a"),
        ]));
        let variant = &payload.product.variants[0];

        assert_eq!(variant.price, "0.00");
        assert_eq!(variant.cost, None);
        assert_eq!(variant.weight, None);
        assert!(payload.product.metafields.iter().all(|m| m.key != "purchase_price_ht"));
    }

    #[test]
    fn test_full_row_metafields_and_tags_order() {
        let (payload, _) = PayloadBuilder::new().build(&row(&[
            (columns::PRODUCT_ID, "#12"),
            (columns::SKU, "NAP-01"),
            (columns::VENDOR, "Atelier Lin"),
            (columns::EAN13, "3760000000017"),
            (columns::TITLE, "Nappe  brodée"),
            (columns::SHORT_DESCRIPTION, "Nappe en lin"),
            (columns::KEYWORDS, "lin; brodé main"),
            (columns::FEATURES, " 100% lin "),
            (columns::WEIGHT, "450,4"),
            (columns::QUANTITY, "0"),
            (columns::STOCK, "8,0"),
            (columns::PURCHASE_PRICE, "12,5"),
            (columns::VAT_RATE, "20"),
            (columns::SUBCATEGORY, "Linge de table"),
            (columns::PARENT_CATEGORY, "Maison"),
            (columns::BRAND, "Brodlin"),
            (columns::PAGE_TITLE, "Nappe brodée en lin"),
            (columns::META_DESCRIPTION, "Une nappe"),
        ]));
        let product = &payload.product;
        let variant = &product.variants[0];

        assert_eq!(product.title, "Nappe brodée");
        assert_eq!(product.handle, "nappe-brodee");
        assert_eq!(product.vendor, "Atelier Lin");
        assert_eq!(product.product_type, "Linge de table");
        assert_eq!(product.status, ProductStatus::Draft);
        assert_eq!(variant.inventory_quantity, 8);
        assert_eq!(variant.barcode.as_deref(), Some("3760000000017"));
        assert_eq!(variant.cost.as_deref(), Some("12.50"));
        assert_eq!(variant.grams, Some(450));
        assert_eq!(variant.weight_unit.as_deref(), Some("g"));
        assert!(variant.taxable);

        let keys: Vec<_> = product
            .metafields
            .iter()
            .map(|m| format!("{}.{}", m.namespace, m.key))
            .collect();
        assert_eq!(
            keys,
            vec![
                "custom.product_id",
                "custom.short_description",
                "custom.keywords",
                "custom.features",
                "custom.meta_description",
                "custom.purchase_price_ht",
                "seo.title",
            ]
        );
        assert_eq!(product.metafields[2].value, "lin\nbrodé main");
        assert_eq!(product.metafields[3].value, "100% lin");

        assert_eq!(
            product.tags.as_slice(),
            &[
                "lin",
                "brodé main",
                "product_id:12",
                "Sous_Categorie_Linge_de_table",
                "Categorie : Maison",
                "Categorie_principale : Maison",
                "Fournisseur : Atelier Lin",
                "Marque : Brodlin",
            ]
        );
        assert_eq!(product.seo_title.as_deref(), Some("Nappe brodée en lin"));
        assert_eq!(product.seo_description.as_deref(), Some("Une nappe"));
    }

    #[test]
    fn test_vendor_falls_back_to_brand_and_zero_vat_untaxed() {
        let (payload, _) = PayloadBuilder::new().build(&row(&[
            (columns::BRAND, "Brodlin"),
            (columns::VAT_RATE, "0"),
        ]));
        assert_eq!(payload.product.vendor, "Brodlin");
        assert!(!payload.product.variants[0].taxable);
        assert!(!payload.product.tags.contains("Fournisseur : Brodlin"));
    }

    #[test]
    fn test_blank_category_falls_back_to_parent() {
        let (payload, _) = PayloadBuilder::new().build(&row(&[
            (columns::CATEGORY, "   "),
            (columns::PARENT_CATEGORY, "Maison"),
        ]));
        let tags = &payload.product.tags;
        assert!(tags.contains("Categorie : Maison"));
        assert!(tags.contains("Categorie_principale : Maison"));
        assert!(!tags.contains("Categorie : "));
    }

    #[test]
    fn test_label_fallbacks() {
        let builder = PayloadBuilder::new();
        let (_, by_sku) = builder.build(&row(&[(columns::SKU, "X9"), (columns::PRODUCT_ID, "3")]));
        let (_, by_id) = builder.build(&row(&[(columns::PRODUCT_ID, "#3")]));
        let (empty, none) = builder.build(&RawRow::new());

        assert_eq!(by_sku, "X9");
        assert_eq!(by_id, "3");
        assert_eq!(none, "");
        assert_eq!(empty.product.handle, "");
        assert_eq!(empty.product.variants.len(), 1);
    }

    #[test]
    fn test_build_is_deterministic() {
        let input = row(&[(columns::TITLE, "Écharpe Brodée!"), (columns::KEYWORDS, "a;b")]);
        let builder = PayloadBuilder::new();
        assert_eq!(builder.build(&input), builder.build(&input));
    }
}
