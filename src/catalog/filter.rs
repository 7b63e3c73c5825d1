//! Facet filter compiler.
//!
//! Query terms are parsed into [`FilterTerms`], then compiled against a snapshot into a
//! [`CompiledFilter`]: one clause per active facet, ANDed together, values within a
//! facet ORed. Unknown attribute codes and malformed numbers are dropped rather than
//! reported.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use regex::{Regex, RegexBuilder};
use rust_decimal::Decimal;

use crate::catalog::attribute_value::{parse_decimal, AttributeValue};
use crate::catalog::snapshot::{CatalogSnapshot, ItemRecord, VariantRecord};
use crate::config::{PriceFilterMode, VariantMatchMode};
use crate::entities::{AttributeType, ItemState};

/// Query keys that are never filter terms.
pub const RESERVED_KEYS: [&str; 6] = ["category", "subcategory", "sort", "page", "page_size", "lang"];

const ATTR_PREFIX: &str = "attr_";

/// Splits a comma-separated term, trimming and dropping blanks.
pub fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Raw filter terms of a request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterTerms {
    pub brand: Vec<String>,
    pub color: Vec<String>,
    pub state: Vec<String>,
    pub price_min: Option<Decimal>,
    pub price_max: Option<Decimal>,
    /// `attr_<key>` entries keyed by the lowercased text after the prefix. Whether a
    /// key is a code or a `_min`/`_max` bound is decided at compile time.
    pub attributes: BTreeMap<String, Vec<String>>,
}

impl FilterTerms {
    /// Collects terms from query pairs. Repeated keys are merged; reserved and
    /// unrecognised keys are ignored.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut terms = FilterTerms::default();
        for (key, value) in pairs {
            let key = key.as_ref().trim().to_lowercase();
            let value = value.as_ref();
            if RESERVED_KEYS.contains(&key.as_str()) {
                continue;
            }
            match key.as_str() {
                "brand" => terms.brand.extend(split_list(value)),
                "color" => terms.color.extend(split_list(value)),
                "state" => terms.state.extend(split_list(value)),
                "price_min" => terms.price_min = parse_decimal(value).or(terms.price_min),
                "price_max" => terms.price_max = parse_decimal(value).or(terms.price_max),
                _ => {
                    if let Some(rest) = key.strip_prefix(ATTR_PREFIX) {
                        let values = split_list(value);
                        if !rest.is_empty() && !values.is_empty() {
                            terms
                                .attributes
                                .entry(rest.to_string())
                                .or_default()
                                .extend(values);
                        }
                    }
                }
            }
        }
        terms
    }

    pub fn is_empty(&self) -> bool {
        self.brand.is_empty()
            && self.color.is_empty()
            && self.state.is_empty()
            && self.price_min.is_none()
            && self.price_max.is_none()
            && self.attributes.is_empty()
    }

    /// Canonical, order-independent rendering used in cache keys.
    pub fn fingerprint(&self) -> String {
        fn sorted(values: &[String]) -> String {
            let set: BTreeSet<String> = values.iter().map(|v| v.to_lowercase()).collect();
            set.into_iter().collect::<Vec<_>>().join(",")
        }

        let mut parts = Vec::new();
        if !self.brand.is_empty() {
            parts.push(format!("brand={}", sorted(&self.brand)));
        }
        if !self.color.is_empty() {
            parts.push(format!("color={}", sorted(&self.color)));
        }
        if !self.state.is_empty() {
            parts.push(format!("state={}", sorted(&self.state)));
        }
        if let Some(min) = self.price_min {
            parts.push(format!("price_min={}", min.normalize()));
        }
        if let Some(max) = self.price_max {
            parts.push(format!("price_max={}", max.normalize()));
        }
        for (key, values) in &self.attributes {
            parts.push(format!("attr_{key}={}", sorted(values)));
        }

        if parts.is_empty() {
            "-".to_string()
        } else {
            parts.join("&")
        }
    }
}

/// Identifies the facet a clause belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FacetKey {
    Brand,
    Color,
    Price,
    State,
    Attribute(i64),
}

/// Test applied to a single stored attribute value.
#[derive(Debug, Clone)]
pub enum ValueMatcher {
    Choices(HashSet<i64>),
    /// Case-insensitive alternation of the escaped values
    Text(Regex),
    /// Set membership (when a set was given) AND inclusive bounds
    Numeric {
        set: Option<BTreeSet<Decimal>>,
        min: Option<Decimal>,
        max: Option<Decimal>,
    },
}

impl ValueMatcher {
    pub fn matches(&self, value: &AttributeValue) -> bool {
        match self {
            ValueMatcher::Choices(ids) => value.choice_id().is_some_and(|id| ids.contains(&id)),
            ValueMatcher::Text(re) => value.match_text().is_some_and(|t| re.is_match(&t)),
            ValueMatcher::Numeric { set, min, max } => match value.numeric() {
                Some(n) => {
                    set.as_ref().map_or(true, |s| s.contains(&n))
                        && min.map_or(true, |m| n >= m)
                        && max.map_or(true, |m| n <= m)
                }
                None => false,
            },
        }
    }
}

#[derive(Debug, Clone)]
pub enum Predicate {
    Brand(HashSet<i64>),
    State(HashSet<ItemState>),
    Color(HashSet<i64>),
    Price {
        min: Option<Decimal>,
        max: Option<Decimal>,
        mode: PriceFilterMode,
    },
    /// Holds on item-level values OR on the variant's values.
    Spec {
        attribute_id: i64,
        matcher: ValueMatcher,
    },
}

impl Predicate {
    fn is_item_level(&self) -> bool {
        matches!(self, Predicate::Brand(_) | Predicate::State(_))
    }

    /// Evaluates against the item and, for variant-scoped predicates, one variant.
    /// `variant == None` means "no variant": variant-only predicates fail and spec
    /// predicates fall back to item-level values.
    fn holds(&self, record: &ItemRecord, variant: Option<&VariantRecord>, now: DateTime<Utc>) -> bool {
        match self {
            Predicate::Brand(ids) => record.item.brand_id.is_some_and(|id| ids.contains(&id)),
            Predicate::State(states) => record.item.state.is_some_and(|s| states.contains(&s)),
            Predicate::Color(ids) => variant
                .and_then(|v| v.variant.color_id)
                .is_some_and(|id| ids.contains(&id)),
            Predicate::Price { min, max, mode } => variant.is_some_and(|v| {
                let in_range = |p: Decimal| min.map_or(true, |m| p >= m) && max.map_or(true, |m| p <= m);
                match mode {
                    PriceFilterMode::AnyPriceField => {
                        v.price.promo_price.is_some_and(in_range) || in_range(v.price.base_price)
                    }
                    PriceFilterMode::Effective => in_range(v.price.effective_price(now)),
                }
            }),
            Predicate::Spec {
                attribute_id,
                matcher,
            } => {
                record.values_of(*attribute_id).any(|val| matcher.matches(val))
                    || variant.is_some_and(|v| v.values_of(*attribute_id).any(|val| matcher.matches(val)))
            }
        }
    }

    /// Independent evaluation: "exists a variant" per clause.
    fn holds_any(&self, record: &ItemRecord, now: DateTime<Utc>) -> bool {
        if self.is_item_level() {
            return self.holds(record, None, now);
        }
        if record.variants.is_empty() {
            return self.holds(record, None, now);
        }
        record.variants.iter().any(|v| self.holds(record, Some(v), now))
    }
}

#[derive(Debug, Clone)]
pub struct Clause {
    pub key: FacetKey,
    pub predicate: Predicate,
}

#[derive(Debug, Clone, Copy)]
pub struct CompileOptions {
    pub variant_match: VariantMatchMode,
    pub price_filter: PriceFilterMode,
    pub now: DateTime<Utc>,
}

/// The compound predicate of a request.
#[derive(Debug, Clone)]
pub struct CompiledFilter {
    pub clauses: Vec<Clause>,
    pub variant_match: VariantMatchMode,
    pub now: DateTime<Utc>,
}

impl CompiledFilter {
    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = FacetKey> + '_ {
        self.clauses.iter().map(|c| c.key)
    }

    pub fn matches(&self, record: &ItemRecord) -> bool {
        self.matches_except(record, None)
    }

    /// Evaluates every clause but the one for `skip`. Facet options use this so a
    /// facet never eliminates its own alternatives.
    pub fn matches_except(&self, record: &ItemRecord, skip: Option<FacetKey>) -> bool {
        let active = || self.clauses.iter().filter(move |c| Some(c.key) != skip);

        match self.variant_match {
            VariantMatchMode::Independent => active().all(|c| c.predicate.holds_any(record, self.now)),
            VariantMatchMode::SameVariant => {
                let item_level_ok = active()
                    .filter(|c| c.predicate.is_item_level())
                    .all(|c| c.predicate.holds(record, None, self.now));
                if !item_level_ok {
                    return false;
                }

                let scoped: Vec<&Clause> = active().filter(|c| !c.predicate.is_item_level()).collect();
                if scoped.is_empty() {
                    return true;
                }
                if record.variants.is_empty() {
                    return scoped.iter().all(|c| c.predicate.holds(record, None, self.now));
                }
                record.variants.iter().any(|v| {
                    scoped
                        .iter()
                        .all(|c| c.predicate.holds(record, Some(v), self.now))
                })
            }
        }
    }
}

/// Numeric term for one attribute before it becomes a matcher.
#[derive(Default)]
struct NumericTerm {
    values: Vec<String>,
    min: Option<Decimal>,
    max: Option<Decimal>,
}

/// Compiles request terms against the rows of a snapshot.
pub fn compile(terms: &FilterTerms, snapshot: &CatalogSnapshot, options: CompileOptions) -> CompiledFilter {
    let mut clauses = Vec::new();

    if !terms.brand.is_empty() {
        clauses.push(Clause {
            key: FacetKey::Brand,
            predicate: Predicate::Brand(snapshot.brand_ids_for_slugs(&terms.brand)),
        });
    }

    if !terms.color.is_empty() {
        clauses.push(Clause {
            key: FacetKey::Color,
            predicate: Predicate::Color(snapshot.color_ids_for_slugs(&terms.color)),
        });
    }

    if !terms.state.is_empty() {
        let states = terms
            .state
            .iter()
            .filter_map(|s| ItemState::from_str(s).ok())
            .collect();
        clauses.push(Clause {
            key: FacetKey::State,
            predicate: Predicate::State(states),
        });
    }

    if terms.price_min.is_some() || terms.price_max.is_some() {
        clauses.push(Clause {
            key: FacetKey::Price,
            predicate: Predicate::Price {
                min: terms.price_min,
                max: terms.price_max,
                mode: options.price_filter,
            },
        });
    }

    clauses.extend(compile_attributes(terms, snapshot));

    CompiledFilter {
        clauses,
        variant_match: options.variant_match,
        now: options.now,
    }
}

fn compile_attributes(terms: &FilterTerms, snapshot: &CatalogSnapshot) -> Vec<Clause> {
    let mut lists: BTreeMap<i64, Vec<String>> = BTreeMap::new();
    let mut numeric: BTreeMap<i64, NumericTerm> = BTreeMap::new();

    for (key, values) in &terms.attributes {
        if let Some(attr) = snapshot.active_attribute(key) {
            if attr.attribute_type.is_numeric() {
                numeric.entry(attr.id).or_default().values.extend(values.iter().cloned());
            } else {
                lists.entry(attr.id).or_default().extend(values.iter().cloned());
            }
            continue;
        }

        let bound = key
            .strip_suffix("_min")
            .map(|stem| (stem, true))
            .or_else(|| key.strip_suffix("_max").map(|stem| (stem, false)));
        let Some((stem, is_min)) = bound else {
            continue;
        };
        let Some(attr) = snapshot
            .active_attribute(stem)
            .filter(|a| a.attribute_type.is_numeric())
        else {
            continue;
        };
        let Some(limit) = values.iter().find_map(|v| parse_decimal(v)) else {
            continue;
        };
        let term = numeric.entry(attr.id).or_default();
        if is_min {
            term.min = Some(limit);
        } else {
            term.max = Some(limit);
        }
    }

    let mut clauses = Vec::new();

    for (attribute_id, values) in lists {
        let Some(attr) = snapshot.attributes.get(&attribute_id) else {
            continue;
        };
        let matcher = match attr.attribute_type {
            AttributeType::Choice => {
                ValueMatcher::Choices(snapshot.choice_ids_for_slugs(attribute_id, &values))
            }
            AttributeType::Text | AttributeType::Boolean => match text_matcher(&values) {
                Some(re) => ValueMatcher::Text(re),
                None => continue,
            },
            AttributeType::Int | AttributeType::Decimal => continue,
        };
        clauses.push(Clause {
            key: FacetKey::Attribute(attribute_id),
            predicate: Predicate::Spec {
                attribute_id,
                matcher,
            },
        });
    }

    for (attribute_id, term) in numeric {
        let set: BTreeSet<Decimal> = term
            .values
            .iter()
            .filter_map(|v| parse_decimal(v))
            .map(|d| d.normalize())
            .collect();
        if set.is_empty() && term.min.is_none() && term.max.is_none() {
            continue;
        }
        clauses.push(Clause {
            key: FacetKey::Attribute(attribute_id),
            predicate: Predicate::Spec {
                attribute_id,
                matcher: ValueMatcher::Numeric {
                    set: (!set.is_empty()).then_some(set),
                    min: term.min,
                    max: term.max,
                },
            },
        });
    }

    clauses
}

fn text_matcher(values: &[String]) -> Option<Regex> {
    let alternation = values
        .iter()
        .map(|v| regex::escape(v))
        .collect::<Vec<_>>()
        .join("|");
    if alternation.is_empty() {
        return None;
    }
    RegexBuilder::new(&alternation)
        .case_insensitive(true)
        .build()
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::snapshot::fixtures::*;
    use crate::catalog::snapshot::{ItemRecord, VariantRecord};
    use crate::entities::AttributeType;
    use rust_decimal_macros::dec;

    const RAM: i64 = 1;
    const CPU: i64 = 2;
    const SCREEN: i64 = 3;
    const WIFI: i64 = 4;

    fn options(variant_match: VariantMatchMode) -> CompileOptions {
        CompileOptions {
            variant_match,
            price_filter: PriceFilterMode::AnyPriceField,
            now: ts(15),
        }
    }

    fn snapshot() -> CatalogSnapshot {
        let mut s = CatalogSnapshot::default();
        for a in [
            attr(RAM, "ram", AttributeType::Int),
            attr(CPU, "cpu", AttributeType::Choice),
            attr(SCREEN, "screen_size", AttributeType::Decimal),
            attr(WIFI, "wifi", AttributeType::Boolean),
        ] {
            s.attributes.insert(a.id, a);
        }
        for c in [choice(10, CPU, "Intel"), choice(11, CPU, "AMD")] {
            s.choices.insert(c.id, c);
        }
        s.brands.insert(1, brand(1, "Acme"));
        s.brands.insert(2, brand(2, "Globex"));
        s.colors.insert(1, color(1, "Black", true));
        s.colors.insert(2, color(2, "White", true));

        // Item 1: Acme, ram 16 item-level, black 1000 / white 1200
        s.items.push(ItemRecord {
            item: item(1, 1, Some(1)),
            variants: vec![
                VariantRecord::new(variant(11, 1, dec!(1000), Some(1)), vec![spec(CPU, AttributeValue::Choice(10))]),
                VariantRecord::new(variant(12, 1, dec!(1200), Some(2)), vec![spec(CPU, AttributeValue::Choice(11))]),
            ],
            specs: vec![
                spec(RAM, AttributeValue::Int(16)),
                spec(SCREEN, AttributeValue::Decimal(dec!(15.6))),
                spec(WIFI, AttributeValue::Bool(true)),
            ],
            images: vec![],
        });
        // Item 2: Globex, ram 8, single white variant 600 with promo 450
        let mut promo = variant(21, 2, dec!(600), Some(2));
        promo.promo_price = Some(dec!(450));
        promo.promo_active = true;
        s.items.push(ItemRecord {
            item: item(2, 1, Some(2)),
            variants: vec![VariantRecord::new(promo, vec![spec(CPU, AttributeValue::Choice(10))])],
            specs: vec![spec(RAM, AttributeValue::Int(8))],
            images: vec![],
        });
        s
    }

    fn run(pairs: &[(&str, &str)], mode: VariantMatchMode) -> Vec<i64> {
        let s = snapshot();
        let filter = compile(&FilterTerms::from_pairs(pairs.iter().copied()), &s, options(mode));
        s.items
            .iter()
            .filter(|r| filter.matches(r))
            .map(|r| r.item.id)
            .collect()
    }

    #[test]
    fn parses_terms_and_skips_reserved_keys() {
        let terms = FilterTerms::from_pairs([
            ("category", "laptops"),
            ("brand", " acme, ,globex "),
            ("price_min", "abc"),
            ("price_max", "900"),
            ("attr_RAM", "8,16"),
            ("attr_ram", "32"),
            ("attr_cpu", " , "),
        ]);
        assert_eq!(terms.brand, vec!["acme", "globex"]);
        assert_eq!(terms.price_min, None);
        assert_eq!(terms.price_max, Some(dec!(900)));
        assert_eq!(terms.attributes.get("ram").unwrap(), &vec!["8", "16", "32"]);
        assert!(!terms.attributes.contains_key("cpu"));
    }

    #[test]
    fn fingerprint_is_order_independent() {
        let a = FilterTerms::from_pairs([("brand", "b,a"), ("attr_ram", "16")]);
        let b = FilterTerms::from_pairs([("attr_ram", "16"), ("brand", "A,B")]);
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_eq!(FilterTerms::default().fingerprint(), "-");
    }

    #[test]
    fn brand_and_unknown_brand() {
        assert_eq!(run(&[("brand", "acme")], VariantMatchMode::Independent), vec![1]);
        assert!(run(&[("brand", "nobody")], VariantMatchMode::Independent).is_empty());
    }

    #[test]
    fn price_min_matches_any_price_field() {
        // 450 promo is below 500 but 600 base is above: item 2 passes
        assert_eq!(run(&[("price_min", "500")], VariantMatchMode::Independent), vec![1, 2]);
        assert_eq!(run(&[("price_max", "500")], VariantMatchMode::Independent), vec![2]);
    }

    #[test]
    fn variant_level_choice_is_ored_across_variants() {
        assert_eq!(run(&[("attr_cpu", "amd")], VariantMatchMode::Independent), vec![1]);
        assert_eq!(run(&[("attr_cpu", "intel,amd")], VariantMatchMode::Independent), vec![1, 2]);
    }

    #[test]
    fn numeric_set_and_bounds() {
        assert_eq!(run(&[("attr_ram", "16")], VariantMatchMode::Independent), vec![1]);
        assert_eq!(run(&[("attr_ram_min", "10")], VariantMatchMode::Independent), vec![1]);
        assert_eq!(
            run(&[("attr_ram", "8,16"), ("attr_ram_max", "12")], VariantMatchMode::Independent),
            vec![2]
        );
        assert_eq!(run(&[("attr_screen_size", "15.60")], VariantMatchMode::Independent), vec![1]);
    }

    #[test]
    fn malformed_and_unknown_terms_are_dropped() {
        assert_eq!(run(&[("attr_ram", "lots")], VariantMatchMode::Independent), vec![1, 2]);
        assert_eq!(run(&[("attr_nope", "x")], VariantMatchMode::Independent), vec![1, 2]);
        assert_eq!(run(&[("attr_cpu_min", "3")], VariantMatchMode::Independent), vec![1, 2]);
    }

    #[test]
    fn boolean_uses_text_path() {
        assert_eq!(run(&[("attr_wifi", "true")], VariantMatchMode::Independent), vec![1]);
        assert!(run(&[("attr_wifi", "false")], VariantMatchMode::Independent).is_empty());
    }

    #[test]
    fn unknown_states_match_nothing() {
        assert_eq!(run(&[("state", "NEW")], VariantMatchMode::Independent), vec![1, 2]);
        assert!(run(&[("state", "broken")], VariantMatchMode::Independent).is_empty());
    }

    #[test]
    fn same_variant_mode_binds_clauses_to_one_variant() {
        // Black variant runs Intel, white runs AMD.
        let pairs = [("color", "black"), ("attr_cpu", "amd")];
        assert_eq!(run(&pairs, VariantMatchMode::Independent), vec![1]);
        assert!(run(&pairs, VariantMatchMode::SameVariant).is_empty());

        let pairs = [("color", "white"), ("attr_cpu", "amd"), ("attr_ram", "16")];
        assert_eq!(run(&pairs, VariantMatchMode::SameVariant), vec![1]);
    }

    #[test]
    fn matches_except_skips_one_facet() {
        let s = snapshot();
        let filter = compile(
            &FilterTerms::from_pairs([("brand", "globex"), ("attr_ram", "16")]),
            &s,
            options(VariantMatchMode::Independent),
        );
        let passing = |skip| {
            s.items
                .iter()
                .filter(|r| filter.matches_except(r, skip))
                .map(|r| r.item.id)
                .collect::<Vec<_>>()
        };
        assert!(passing(None).is_empty());
        assert_eq!(passing(Some(FacetKey::Brand)), vec![1]);
        assert_eq!(passing(Some(FacetKey::Attribute(RAM))), vec![2]);
    }
}
