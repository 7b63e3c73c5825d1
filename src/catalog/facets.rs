//! Facet option aggregation.
//!
//! Every facet is computed over the in-scope items that pass all *other* active
//! filter clauses, so a facet never hides its own alternatives.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::catalog::filter::{CompiledFilter, FacetKey};
use crate::catalog::scope::Scope;
use crate::catalog::snapshot::{CatalogSnapshot, ItemRecord};
use crate::entities::{attribute, AttributeType, ItemState};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct CategoryHeader {
    pub name: String,
    pub slug: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct BrandOption {
    pub name: String,
    pub slug: String,
    pub logo_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ColorOption {
    pub name: String,
    pub slug: String,
    pub hex: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PriceRange {
    #[schema(value_type = Option<String>)]
    pub min: Option<Decimal>,
    #[schema(value_type = Option<String>)]
    pub max: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct StateOption {
    pub code: ItemState,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ChoiceOption {
    pub value: String,
    pub slug: String,
}

/// Options of one attribute facet; the shape depends on the attribute type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(untagged)]
pub enum AttributeOptions {
    Choices(Vec<ChoiceOption>),
    #[schema(value_type = Vec<String>)]
    Numbers(Vec<Decimal>),
    Texts(Vec<String>),
}

impl AttributeOptions {
    pub fn len(&self) -> usize {
        match self {
            AttributeOptions::Choices(c) => c.len(),
            AttributeOptions::Numbers(n) => n.len(),
            AttributeOptions::Texts(t) => t.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct AttributeFacet {
    pub code: String,
    pub label: String,
    #[serde(rename = "type")]
    pub attribute_type: AttributeType,
    pub unit: Option<String>,
    pub options: AttributeOptions,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct FacetOptions {
    pub category: Option<CategoryHeader>,
    pub brands: Vec<BrandOption>,
    pub colors: Vec<ColorOption>,
    pub price: PriceRange,
    pub states: Vec<StateOption>,
    pub attributes_for_item: Vec<AttributeFacet>,
    pub attributes_for_variant: Vec<AttributeFacet>,
}

/// Which level an attribute's values are shown at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ownership {
    Item,
    Variant,
}

pub struct Aggregator<'a> {
    snapshot: &'a CatalogSnapshot,
    scope: &'a Scope,
    filter: &'a CompiledFilter,
    color_attribute_code: &'a str,
}

impl<'a> Aggregator<'a> {
    pub fn new(
        snapshot: &'a CatalogSnapshot,
        scope: &'a Scope,
        filter: &'a CompiledFilter,
        color_attribute_code: &'a str,
    ) -> Self {
        Self {
            snapshot,
            scope,
            filter,
            color_attribute_code,
        }
    }

    fn in_scope(&self) -> impl Iterator<Item = &'a ItemRecord> + '_ {
        self.snapshot.items.iter().filter(|r| {
            r.item.is_active && r.item.is_visible && self.scope.contains(r.item.category_id)
        })
    }

    /// In-scope items passing every clause except `key`.
    fn candidates(&self, key: FacetKey) -> impl Iterator<Item = &'a ItemRecord> + '_ {
        self.in_scope()
            .filter(move |r| self.filter.matches_except(r, Some(key)))
    }

    pub fn aggregate(&self) -> FacetOptions {
        let (attributes_for_item, attributes_for_variant) = self.attributes();
        FacetOptions {
            category: self.scope.root.as_ref().map(|c| CategoryHeader {
                name: c.name.clone(),
                slug: c.slug.clone(),
            }),
            brands: self.brands(),
            colors: self.colors(),
            price: self.price(),
            states: self.states(),
            attributes_for_item,
            attributes_for_variant,
        }
    }

    pub fn brands(&self) -> Vec<BrandOption> {
        let mut seen = HashSet::new();
        let mut brands: Vec<_> = self
            .candidates(FacetKey::Brand)
            .filter_map(|r| self.snapshot.brand_of(&r.item))
            .filter(|b| seen.insert(b.id))
            .collect();
        brands.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.slug.cmp(&b.slug)));
        brands
            .into_iter()
            .map(|b| BrandOption {
                name: b.name.clone(),
                slug: b.slug.clone(),
                logo_url: b.logo_url.clone(),
            })
            .collect()
    }

    /// Colors used by in-scope variants; all globally active colors when none are.
    pub fn colors(&self) -> Vec<ColorOption> {
        let mut seen = HashSet::new();
        let mut colors: Vec<_> = self
            .candidates(FacetKey::Color)
            .flat_map(|r| r.variants.iter())
            .filter_map(|v| self.snapshot.color_of(&v.variant))
            .filter(|c| seen.insert(c.id))
            .collect();
        if colors.is_empty() {
            colors = self.snapshot.active_colors.iter().filter(|c| c.is_active).collect();
        }
        colors.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.slug.cmp(&b.slug)));
        colors
            .into_iter()
            .map(|c| ColorOption {
                name: c.name.clone(),
                slug: c.slug.clone(),
                hex: c.hex_code.clone(),
            })
            .collect()
    }

    pub fn price(&self) -> PriceRange {
        let mut range = PriceRange::default();
        for price in self
            .candidates(FacetKey::Price)
            .flat_map(|r| r.prices())
            .map(|p| p.display_floor())
        {
            range.min = Some(range.min.map_or(price, |m| m.min(price)));
            range.max = Some(range.max.map_or(price, |m| m.max(price)));
        }
        range
    }

    pub fn states(&self) -> Vec<StateOption> {
        let states: BTreeSet<ItemState> = self
            .candidates(FacetKey::State)
            .filter_map(|r| r.item.state)
            .collect();
        states
            .into_iter()
            .map(|s| StateOption {
                code: s,
                label: s.label().to_string(),
            })
            .collect()
    }

    /// Attributes bound to any in-scope category, in binding display order, each once.
    fn bound_attributes(&self) -> Vec<&'a attribute::Model> {
        let mut bindings: Vec<_> = self
            .snapshot
            .bindings
            .iter()
            .filter(|b| self.scope.contains(b.category_id))
            .collect();
        bindings.sort_by_key(|b| (b.display_order, b.attribute_id));

        let mut seen = HashSet::new();
        bindings
            .into_iter()
            .filter(|b| seen.insert(b.attribute_id))
            .filter_map(|b| self.snapshot.attributes.get(&b.attribute_id))
            .filter(|a| a.is_active)
            .collect()
    }

    pub fn ownership(&self, attr: &attribute::Model) -> Ownership {
        if attr.code.eq_ignore_ascii_case(self.color_attribute_code) {
            return Ownership::Variant;
        }
        let on_item = self
            .in_scope()
            .any(|r| r.values_of(attr.id).next().is_some());
        let on_variant = self
            .in_scope()
            .flat_map(|r| r.variants.iter())
            .any(|v| v.values_of(attr.id).next().is_some());
        if on_variant && !on_item {
            Ownership::Variant
        } else {
            Ownership::Item
        }
    }

    fn attributes(&self) -> (Vec<AttributeFacet>, Vec<AttributeFacet>) {
        let mut for_item = Vec::new();
        let mut for_variant = Vec::new();

        for attr in self.bound_attributes() {
            let facet = AttributeFacet {
                code: attr.code.clone(),
                label: attr.label.clone(),
                attribute_type: attr.attribute_type,
                unit: attr.unit.clone(),
                options: self.attribute_options(attr),
            };
            match self.ownership(attr) {
                Ownership::Item => for_item.push(facet),
                Ownership::Variant => for_variant.push(facet),
            }
        }

        (for_item, for_variant)
    }

    fn attribute_options(&self, attr: &attribute::Model) -> AttributeOptions {
        let values: Vec<_> = self
            .candidates(FacetKey::Attribute(attr.id))
            .flat_map(|r| {
                r.values_of(attr.id)
                    .chain(r.variants.iter().flat_map(|v| v.values_of(attr.id)))
            })
            .collect();

        match attr.attribute_type {
            AttributeType::Choice => {
                let ids: BTreeSet<i64> = values.iter().filter_map(|v| v.choice_id()).collect();
                let mut by_slug: BTreeMap<String, ChoiceOption> = BTreeMap::new();
                for id in ids {
                    if let Some(choice) = self.snapshot.choices.get(&id) {
                        by_slug.entry(choice.slug.clone()).or_insert_with(|| ChoiceOption {
                            value: choice.value.clone(),
                            slug: choice.slug.clone(),
                        });
                    }
                }
                let mut choices: Vec<_> = by_slug.into_values().collect();
                choices.sort_by(|a, b| a.value.cmp(&b.value).then_with(|| a.slug.cmp(&b.slug)));
                AttributeOptions::Choices(choices)
            }
            AttributeType::Int | AttributeType::Decimal => {
                let numbers: BTreeSet<Decimal> = values.iter().filter_map(|v| v.numeric()).collect();
                AttributeOptions::Numbers(numbers.into_iter().collect())
            }
            AttributeType::Text | AttributeType::Boolean => {
                let texts: BTreeSet<String> = values
                    .iter()
                    .filter_map(|v| v.match_text())
                    .map(|t| t.trim().to_string())
                    .filter(|t| !t.is_empty())
                    .collect();
                AttributeOptions::Texts(texts.into_iter().collect())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::attribute_value::AttributeValue;
    use crate::catalog::filter::{compile, CompileOptions, FilterTerms};
    use crate::catalog::scope::{self, tests::cat};
    use crate::catalog::snapshot::fixtures::*;
    use crate::catalog::snapshot::VariantRecord;
    use crate::config::{PriceFilterMode, VariantMatchMode};
    use rust_decimal_macros::dec;

    const RAM: i64 = 1;
    const CPU: i64 = 2;
    const COLOR: i64 = 3;
    const STORAGE: i64 = 4;

    fn snapshot() -> CatalogSnapshot {
        let mut s = CatalogSnapshot {
            categories: vec![
                cat(1, None, "computers", true),
                cat(2, Some(1), "laptops", true),
                cat(3, Some(1), "desktops", true),
            ],
            ..Default::default()
        };
        for a in [
            attr(RAM, "ram", AttributeType::Int),
            attr(CPU, "cpu", AttributeType::Choice),
            attr(COLOR, "color", AttributeType::Text),
            attr(STORAGE, "storage", AttributeType::Int),
        ] {
            s.attributes.insert(a.id, a);
        }
        for c in [choice(10, CPU, "Intel"), choice(11, CPU, "AMD")] {
            s.choices.insert(c.id, c);
        }
        s.brands.insert(1, brand(1, "Zeta"));
        s.brands.insert(2, brand(2, "Acme"));
        s.colors.insert(1, color(1, "Black", true));
        s.active_colors = vec![color(1, "Black", true), color(2, "Anthracite", true)];

        // RAM bound to both categories: must appear once
        s.bindings = vec![
            binding(2, RAM, true, 1),
            binding(3, RAM, false, 1),
            binding(2, CPU, false, 2),
            binding(2, COLOR, false, 3),
            binding(2, STORAGE, false, 4),
        ];

        let mut promo = variant(12, 1, dec!(900), Some(1));
        promo.promo_price = Some(dec!(799));
        s.items.push(ItemRecord {
            item: item(1, 2, Some(1)),
            variants: vec![
                VariantRecord::new(variant(11, 1, dec!(1000), Some(1)), vec![spec(STORAGE, AttributeValue::Int(512))]),
                VariantRecord::new(promo, vec![spec(STORAGE, AttributeValue::Int(256))]),
            ],
            specs: vec![spec(RAM, AttributeValue::Int(16)), spec(CPU, AttributeValue::Choice(11))],
            images: vec![],
        });
        s.items.push(ItemRecord {
            item: item(2, 3, Some(2)),
            variants: vec![VariantRecord::new(variant(21, 2, dec!(500), None), vec![])],
            specs: vec![spec(RAM, AttributeValue::Int(8)), spec(CPU, AttributeValue::Choice(10))],
            images: vec![],
        });
        s
    }

    fn facets(pairs: &[(&str, &str)]) -> FacetOptions {
        let s = snapshot();
        let scope = scope::resolve(&s.categories, Some("computers"), None).unwrap();
        let filter = compile(
            &FilterTerms::from_pairs(pairs.iter().copied()),
            &s,
            CompileOptions {
                variant_match: VariantMatchMode::Independent,
                price_filter: PriceFilterMode::AnyPriceField,
                now: ts(20),
            },
        );
        Aggregator::new(&s, &scope, &filter, "color").aggregate()
    }

    #[test]
    fn aggregates_every_facet() {
        let f = facets(&[]);
        assert_eq!(f.category.as_ref().map(|c| c.slug.as_str()), Some("computers"));
        assert_eq!(
            f.brands.iter().map(|b| b.slug.as_str()).collect::<Vec<_>>(),
            vec!["acme", "zeta"]
        );
        assert_eq!(f.price, PriceRange { min: Some(dec!(500)), max: Some(dec!(1000)) });
        assert_eq!(f.states.len(), 1);
        assert_eq!(f.states[0].label, "New");
    }

    #[test]
    fn attributes_are_deduplicated_and_split_by_owner() {
        let f = facets(&[]);
        let item_codes: Vec<_> = f.attributes_for_item.iter().map(|a| a.code.as_str()).collect();
        let variant_codes: Vec<_> = f.attributes_for_variant.iter().map(|a| a.code.as_str()).collect();
        assert_eq!(item_codes, vec!["ram", "cpu"]);
        // color is variant-level by name even with no values; storage only on variants
        assert_eq!(variant_codes, vec!["color", "storage"]);

        assert_eq!(
            f.attributes_for_item[0].options,
            AttributeOptions::Numbers(vec![dec!(8), dec!(16)])
        );
        assert_eq!(
            f.attributes_for_item[1].options,
            AttributeOptions::Choices(vec![
                ChoiceOption { value: "AMD".into(), slug: "amd".into() },
                ChoiceOption { value: "Intel".into(), slug: "intel".into() },
            ])
        );
    }

    #[test]
    fn facet_is_not_narrowed_by_its_own_filter() {
        let f = facets(&[("brand", "acme")]);
        assert_eq!(f.brands.len(), 2);
        // Other facets only see the Acme item.
        assert_eq!(f.price, PriceRange { min: Some(dec!(500)), max: Some(dec!(500)) });
        assert_eq!(
            f.attributes_for_item[0].options,
            AttributeOptions::Numbers(vec![dec!(8)])
        );
    }

    #[test]
    fn colors_fall_back_to_active_colors() {
        let f = facets(&[("brand", "acme")]);
        // Acme's only variant has no color.
        assert_eq!(
            f.colors.iter().map(|c| c.slug.as_str()).collect::<Vec<_>>(),
            vec!["anthracite", "black"]
        );

        let f = facets(&[]);
        assert_eq!(f.colors.len(), 1);
    }
}
