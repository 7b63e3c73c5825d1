//! In-memory view of the rows a query touches.
//!
//! The query service loads every in-scope item together with its variants, specs and
//! the reference tables they point at; the filter compiler, facet aggregator and
//! listing assembler all work over this structure.

use std::collections::{HashMap, HashSet};

use crate::catalog::attribute_value::AttributeValue;
use crate::catalog::pricing::PriceFields;
use crate::entities::{
    attribute, attribute_choice_value, brand, category, category_attribute, color, item,
    item_image, item_variant,
};

/// One typed attribute value attached to an item or a variant.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredValue {
    pub attribute_id: i64,
    pub value: AttributeValue,
}

#[derive(Debug, Clone)]
pub struct VariantRecord {
    pub variant: item_variant::Model,
    pub price: PriceFields,
    pub specs: Vec<StoredValue>,
}

impl VariantRecord {
    pub fn new(variant: item_variant::Model, specs: Vec<StoredValue>) -> Self {
        Self {
            price: PriceFields::from(&variant),
            variant,
            specs,
        }
    }

    pub fn values_of(&self, attribute_id: i64) -> impl Iterator<Item = &AttributeValue> {
        self.specs
            .iter()
            .filter(move |s| s.attribute_id == attribute_id)
            .map(|s| &s.value)
    }
}

#[derive(Debug, Clone)]
pub struct ItemRecord {
    pub item: item::Model,
    pub variants: Vec<VariantRecord>,
    pub specs: Vec<StoredValue>,
    pub images: Vec<item_image::Model>,
}

impl ItemRecord {
    pub fn values_of(&self, attribute_id: i64) -> impl Iterator<Item = &AttributeValue> {
        self.specs
            .iter()
            .filter(move |s| s.attribute_id == attribute_id)
            .map(|s| &s.value)
    }

    pub fn prices(&self) -> impl Iterator<Item = &PriceFields> {
        self.variants.iter().map(|v| &v.price)
    }

    /// The primary image, else the one with the lowest position.
    pub fn primary_image(&self) -> Option<&item_image::Model> {
        self.images
            .iter()
            .find(|img| img.is_primary)
            .or_else(|| self.images.iter().min_by_key(|img| (img.position, img.id)))
    }
}

/// Rows loaded for one request.
#[derive(Debug, Clone, Default)]
pub struct CatalogSnapshot {
    pub categories: Vec<category::Model>,
    pub items: Vec<ItemRecord>,
    pub brands: HashMap<i64, brand::Model>,
    pub colors: HashMap<i64, color::Model>,
    /// Globally active colors; the color facet falls back to these.
    pub active_colors: Vec<color::Model>,
    pub attributes: HashMap<i64, attribute::Model>,
    pub choices: HashMap<i64, attribute_choice_value::Model>,
    /// Bindings of the in-scope categories.
    pub bindings: Vec<category_attribute::Model>,
}

impl CatalogSnapshot {
    pub fn category(&self, id: i64) -> Option<&category::Model> {
        self.categories.iter().find(|c| c.id == id)
    }

    pub fn brand_of(&self, item: &item::Model) -> Option<&brand::Model> {
        item.brand_id.and_then(|id| self.brands.get(&id))
    }

    pub fn color_of(&self, variant: &item_variant::Model) -> Option<&color::Model> {
        variant.color_id.and_then(|id| self.colors.get(&id))
    }

    /// Active attribute with this code, case-insensitively.
    pub fn active_attribute(&self, code: &str) -> Option<&attribute::Model> {
        self.attributes
            .values()
            .find(|a| a.is_active && a.code.eq_ignore_ascii_case(code))
    }

    /// Choice ids of `attribute_id` whose slug is in `slugs`.
    pub fn choice_ids_for_slugs(&self, attribute_id: i64, slugs: &[String]) -> HashSet<i64> {
        self.choices
            .values()
            .filter(|c| {
                c.attribute_id == attribute_id
                    && slugs.iter().any(|s| s.eq_ignore_ascii_case(&c.slug))
            })
            .map(|c| c.id)
            .collect()
    }

    /// Brand ids whose slug is in `slugs`.
    pub fn brand_ids_for_slugs(&self, slugs: &[String]) -> HashSet<i64> {
        self.brands
            .values()
            .filter(|b| slugs.iter().any(|s| s.eq_ignore_ascii_case(&b.slug)))
            .map(|b| b.id)
            .collect()
    }

    /// Color ids whose slug is in `slugs`.
    pub fn color_ids_for_slugs(&self, slugs: &[String]) -> HashSet<i64> {
        self.colors
            .values()
            .chain(self.active_colors.iter())
            .filter(|c| slugs.iter().any(|s| s.eq_ignore_ascii_case(&c.slug)))
            .map(|c| c.id)
            .collect()
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;
    use crate::entities::AttributeType;
    use rust_decimal_macros::dec;

    #[test]
    fn primary_image_falls_back_to_lowest_position() {
        let image = |id: i64, position: i32, primary: bool| item_image::Model {
            id,
            item_id: 1,
            url: format!("img/{id}.jpg"),
            alt_text: None,
            position,
            is_primary: primary,
        };
        let mut record = ItemRecord {
            item: item(1, 1, None),
            variants: vec![],
            specs: vec![],
            images: vec![image(1, 3, false), image(2, 1, false)],
        };
        assert_eq!(record.primary_image().map(|i| i.id), Some(2));

        record.images.push(image(3, 9, true));
        assert_eq!(record.primary_image().map(|i| i.id), Some(3));
    }

    #[test]
    fn slug_lookups_are_case_insensitive() {
        let mut snapshot = CatalogSnapshot::default();
        snapshot.attributes.insert(1, attr(1, "cpu", AttributeType::Choice));
        snapshot.choices.insert(10, choice(10, 1, "Intel"));
        snapshot.choices.insert(11, choice(11, 1, "AMD"));
        snapshot.brands.insert(5, brand(5, "Acme"));

        assert!(snapshot.active_attribute("CPU").is_some());
        assert_eq!(
            snapshot.choice_ids_for_slugs(1, &["INTEL".to_string()]),
            HashSet::from([10])
        );
        assert_eq!(snapshot.brand_ids_for_slugs(&["acme".into()]), HashSet::from([5]));

        let v = VariantRecord::new(variant(1, 1, dec!(10), None), vec![]);
        assert_eq!(v.price.base_price, dec!(10));
    }
}
