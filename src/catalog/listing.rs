//! Listing assembly: scope, filter, sort, paginate, resolve prices.

use std::cmp::Ordering;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::catalog::filter::CompiledFilter;
use crate::catalog::pricing::{promo_end_for, sort_price};
use crate::catalog::scope::Scope;
use crate::catalog::snapshot::{CatalogSnapshot, ItemRecord};

#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    ToSchema,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum SortOrder {
    PriceAsc,
    PriceDesc,
    New,
    /// Newest id first
    #[default]
    Default,
}

impl SortOrder {
    /// Unknown or missing values fall back to the default order.
    pub fn parse(raw: Option<&str>) -> Self {
        raw.and_then(|s| SortOrder::from_str(s.trim()).ok())
            .unwrap_or_default()
    }
}

/// A clamped page request; pages start at 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u64,
    pub page_size: u64,
}

impl PageRequest {
    pub fn new(page: Option<u64>, page_size: Option<u64>, default_size: u64, max_size: u64) -> Self {
        let max_size = max_size.max(1);
        Self {
            page: page.unwrap_or(1).max(1),
            page_size: page_size
                .filter(|s| *s > 0)
                .unwrap_or(default_size)
                .clamp(1, max_size),
        }
    }

    pub fn offset(&self) -> usize {
        ((self.page - 1).saturating_mul(self.page_size)) as usize
    }
}

/// An item selected for the page, with its resolved display prices.
#[derive(Debug, Clone)]
pub struct ListingEntry<'a> {
    pub record: &'a ItemRecord,
    /// Lowest effective price over the variants
    pub price_from: Option<Decimal>,
    /// Effective old price of the variant that gave `price_from`
    pub old_price: Option<Decimal>,
    pub promo_active: bool,
    pub promo_ends_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct Listing<'a> {
    pub entries: Vec<ListingEntry<'a>>,
    pub total: u64,
    pub page: PageRequest,
}

impl Listing<'_> {
    pub fn total_pages(&self) -> u64 {
        self.total.div_ceil(self.page.page_size)
    }
}

/// Missing sort keys go last regardless of direction.
fn cmp_price(a: Option<Decimal>, b: Option<Decimal>, descending: bool) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) if descending => b.cmp(&a),
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

pub fn resolve_entry(record: &ItemRecord, now: DateTime<Utc>) -> ListingEntry<'_> {
    let cheapest = record
        .variants
        .iter()
        .min_by(|a, b| {
            a.price
                .effective_price(now)
                .cmp(&b.price.effective_price(now))
                .then_with(|| a.variant.id.cmp(&b.variant.id))
        });

    ListingEntry {
        record,
        price_from: cheapest.map(|v| v.price.effective_price(now)),
        old_price: cheapest.and_then(|v| v.price.effective_old_price(now)),
        promo_active: record.prices().any(|p| p.promo_in_effect(now)),
        promo_ends_at: promo_end_for(record.prices(), now),
    }
}

/// Runs a browse request over the snapshot.
pub fn assemble<'a>(
    snapshot: &'a CatalogSnapshot,
    scope: &Scope,
    filter: &CompiledFilter,
    sort: SortOrder,
    page: PageRequest,
    now: DateTime<Utc>,
) -> Listing<'a> {
    let mut matching: Vec<(&ItemRecord, Option<Decimal>)> = snapshot
        .items
        .iter()
        .filter(|r| r.item.is_active && r.item.is_visible && scope.contains(r.item.category_id))
        .filter(|r| filter.matches(r))
        .map(|r| (r, sort_price(r.prices())))
        .collect();

    match sort {
        SortOrder::PriceAsc => matching.sort_by(|(a, pa), (b, pb)| {
            cmp_price(*pa, *pb, false).then_with(|| a.item.id.cmp(&b.item.id))
        }),
        SortOrder::PriceDesc => matching.sort_by(|(a, pa), (b, pb)| {
            cmp_price(*pa, *pb, true).then_with(|| b.item.id.cmp(&a.item.id))
        }),
        SortOrder::New => matching.sort_by(|(a, _), (b, _)| {
            b.item
                .created_at
                .cmp(&a.item.created_at)
                .then_with(|| b.item.id.cmp(&a.item.id))
        }),
        SortOrder::Default => matching.sort_by(|(a, _), (b, _)| b.item.id.cmp(&a.item.id)),
    }

    let total = matching.len() as u64;
    let entries = matching
        .into_iter()
        .skip(page.offset())
        .take(page.page_size as usize)
        .map(|(r, _)| resolve_entry(r, now))
        .collect();

    Listing {
        entries,
        total,
        page,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::filter::{compile, CompileOptions, FilterTerms};
    use crate::catalog::scope::{self, tests::cat};
    use crate::catalog::snapshot::fixtures::*;
    use crate::catalog::snapshot::VariantRecord;
    use crate::config::{PriceFilterMode, VariantMatchMode};
    use rstest::rstest;
    use rust_decimal_macros::dec;

    fn snapshot() -> CatalogSnapshot {
        let mut s = CatalogSnapshot {
            categories: vec![cat(1, None, "phones", true)],
            ..Default::default()
        };
        let mut on_sale = variant(21, 2, dec!(300), None);
        on_sale.promo_price = Some(dec!(150));
        on_sale.promo_active = true;
        on_sale.promo_end = Some(ts(25));

        s.items = vec![
            ItemRecord {
                item: item(1, 1, None),
                variants: vec![VariantRecord::new(variant(11, 1, dec!(200), None), vec![])],
                specs: vec![],
                images: vec![],
            },
            ItemRecord {
                item: item(2, 1, None),
                variants: vec![
                    VariantRecord::new(on_sale, vec![]),
                    VariantRecord::new(variant(22, 2, dec!(180), None), vec![]),
                ],
                specs: vec![],
                images: vec![],
            },
            ItemRecord {
                item: item(3, 1, None),
                variants: vec![],
                specs: vec![],
                images: vec![],
            },
            ItemRecord {
                item: item(4, 1, None),
                variants: vec![VariantRecord::new(variant(41, 4, dec!(200), None), vec![])],
                specs: vec![],
                images: vec![],
            },
        ];
        let mut hidden = item(5, 1, None);
        hidden.is_visible = false;
        s.items.push(ItemRecord {
            item: hidden,
            variants: vec![],
            specs: vec![],
            images: vec![],
        });
        s
    }

    fn ids(sort: SortOrder, page: PageRequest) -> (Vec<i64>, u64) {
        let s = snapshot();
        let scope = scope::resolve(&s.categories, None, None).unwrap();
        let filter = compile(
            &FilterTerms::default(),
            &s,
            CompileOptions {
                variant_match: VariantMatchMode::Independent,
                price_filter: PriceFilterMode::AnyPriceField,
                now: ts(20),
            },
        );
        let listing = assemble(&s, &scope, &filter, sort, page, ts(20));
        (
            listing.entries.iter().map(|e| e.record.item.id).collect(),
            listing.total,
        )
    }

    fn all() -> PageRequest {
        PageRequest::new(None, None, 24, 100)
    }

    #[rstest]
    #[case(SortOrder::PriceAsc, vec![2, 1, 4, 3])]
    #[case(SortOrder::PriceDesc, vec![4, 1, 2, 3])]
    #[case(SortOrder::New, vec![4, 3, 2, 1])]
    #[case(SortOrder::Default, vec![4, 3, 2, 1])]
    fn sorts(#[case] sort: SortOrder, #[case] expected: Vec<i64>) {
        assert_eq!(ids(sort, all()).0, expected);
    }

    #[test]
    fn paginates_with_true_total() {
        let (page2, total) = ids(SortOrder::Default, PageRequest::new(Some(2), Some(3), 24, 100));
        assert_eq!(page2, vec![1]);
        assert_eq!(total, 4);

        let (beyond, total) = ids(SortOrder::Default, PageRequest::new(Some(9), Some(3), 24, 100));
        assert!(beyond.is_empty());
        assert_eq!(total, 4);
    }

    #[test]
    fn page_request_clamps() {
        assert_eq!(
            PageRequest::new(Some(0), Some(500), 24, 100),
            PageRequest { page: 1, page_size: 100 }
        );
        assert_eq!(PageRequest::new(None, Some(0), 24, 100).page_size, 24);
    }

    #[test]
    fn entry_resolves_display_prices() {
        let s = snapshot();
        let entry = resolve_entry(&s.items[1], ts(20));
        assert_eq!(entry.price_from, Some(dec!(150)));
        assert_eq!(entry.old_price, Some(dec!(300)));
        assert!(entry.promo_active);
        assert_eq!(entry.promo_ends_at, Some(ts(25)));

        let after = resolve_entry(&s.items[1], ts(26));
        assert_eq!(after.price_from, Some(dec!(180)));
        assert_eq!(after.old_price, None);
        assert!(!after.promo_active);
    }

    #[test]
    fn unknown_sort_is_default() {
        assert_eq!(SortOrder::parse(Some("PRICE_ASC")), SortOrder::PriceAsc);
        assert_eq!(SortOrder::parse(Some("cheapest")), SortOrder::Default);
        assert_eq!(SortOrder::parse(None), SortOrder::Default);
    }
}
