//! Effective price resolution for variants.
//!
//! A promotion applies when it is flagged active, has a price, and `now` falls inside
//! its window. Both window bounds are inclusive and either may be open.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::entities::item_variant;

/// The pricing columns of a variant, decoupled from the entity for reuse in tests
/// and the write path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceFields {
    pub base_price: Decimal,
    pub promo_price: Option<Decimal>,
    pub promo_active: bool,
    pub promo_start: Option<DateTime<Utc>>,
    pub promo_end: Option<DateTime<Utc>>,
}

impl From<&item_variant::Model> for PriceFields {
    fn from(v: &item_variant::Model) -> Self {
        Self {
            base_price: v.base_price,
            promo_price: v.promo_price,
            promo_active: v.promo_active,
            promo_start: v.promo_start,
            promo_end: v.promo_end,
        }
    }
}

impl PriceFields {
    pub fn promo_in_effect(&self, now: DateTime<Utc>) -> bool {
        self.promo_active
            && self.promo_price.is_some()
            && self.promo_start.map_or(true, |start| start <= now)
            && self.promo_end.map_or(true, |end| now <= end)
    }

    pub fn effective_price(&self, now: DateTime<Utc>) -> Decimal {
        match self.promo_price {
            Some(promo) if self.promo_in_effect(now) => promo,
            _ => self.base_price,
        }
    }

    /// The struck-through price: the base price while a promotion is in effect.
    pub fn effective_old_price(&self, now: DateTime<Utc>) -> Option<Decimal> {
        self.promo_in_effect(now).then_some(self.base_price)
    }

    /// `coalesce(promo_price, base_price)`, independent of the window. Used by the
    /// price facet range and the sort key.
    pub fn display_floor(&self) -> Decimal {
        self.promo_price.unwrap_or(self.base_price)
    }
}

/// Latest end among variants whose promotion is in effect at `now`.
pub fn promo_end_for<'a, I>(variants: I, now: DateTime<Utc>) -> Option<DateTime<Utc>>
where
    I: IntoIterator<Item = &'a PriceFields>,
{
    variants
        .into_iter()
        .filter(|v| v.promo_in_effect(now))
        .filter_map(|v| v.promo_end)
        .max()
}

/// Per-item sort key: `coalesce(min(promo_price), min(base_price))`. `None` for items
/// without variants.
pub fn sort_price<'a, I>(variants: I) -> Option<Decimal>
where
    I: IntoIterator<Item = &'a PriceFields>,
{
    let mut min_promo: Option<Decimal> = None;
    let mut min_base: Option<Decimal> = None;
    for v in variants {
        if let Some(p) = v.promo_price {
            min_promo = Some(min_promo.map_or(p, |m| m.min(p)));
        }
        min_base = Some(min_base.map_or(v.base_price, |m| m.min(v.base_price)));
    }
    min_promo.or(min_base)
}

/// Problems with a promotion configuration, reported at write time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromoViolation {
    NegativePrice(&'static str),
    PromoNotBelowBase,
    EndBeforeStart,
}

impl PromoViolation {
    pub fn field(&self) -> &'static str {
        match self {
            PromoViolation::NegativePrice(field) => field,
            PromoViolation::PromoNotBelowBase => "promo_price",
            PromoViolation::EndBeforeStart => "promo_end",
        }
    }
}

impl std::fmt::Display for PromoViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PromoViolation::NegativePrice(_) => write!(f, "price must not be negative"),
            PromoViolation::PromoNotBelowBase => {
                write!(f, "promotional price must be lower than the base price")
            }
            PromoViolation::EndBeforeStart => {
                write!(f, "promotion end must not be before its start")
            }
        }
    }
}

impl PriceFields {
    pub fn validate(&self) -> Result<(), PromoViolation> {
        if self.base_price.is_sign_negative() && !self.base_price.is_zero() {
            return Err(PromoViolation::NegativePrice("base_price"));
        }
        if let Some(promo) = self.promo_price {
            if promo.is_sign_negative() && !promo.is_zero() {
                return Err(PromoViolation::NegativePrice("promo_price"));
            }
            if self.promo_active && promo >= self.base_price {
                return Err(PromoViolation::PromoNotBelowBase);
            }
        }
        if let (Some(start), Some(end)) = (self.promo_start, self.promo_end) {
            if end < start {
                return Err(PromoViolation::EndBeforeStart);
            }
        }
        Ok(())
    }

    /// A promotion switched on with a price but no start begins now.
    pub fn stamp_start(&mut self, now: DateTime<Utc>) {
        if self.promo_active && self.promo_price.is_some() && self.promo_start.is_none() {
            self.promo_start = Some(now);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rstest::rstest;
    use rust_decimal_macros::dec;

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, day, 12, 0, 0).unwrap()
    }

    fn promo(start: Option<u32>, end: Option<u32>) -> PriceFields {
        PriceFields {
            base_price: dec!(100),
            promo_price: Some(dec!(80)),
            promo_active: true,
            promo_start: start.map(at),
            promo_end: end.map(at),
        }
    }

    #[rstest]
    #[case(promo(Some(1), Some(10)), 5, dec!(80))]
    #[case(promo(Some(1), Some(10)), 11, dec!(100))]
    #[case(promo(Some(6), None), 5, dec!(100))]
    #[case(promo(None, None), 5, dec!(80))]
    #[case(promo(Some(5), Some(5)), 5, dec!(80))]
    fn effective_price_honours_window(
        #[case] fields: PriceFields,
        #[case] day: u32,
        #[case] expected: Decimal,
    ) {
        assert_eq!(fields.effective_price(at(day)), expected);
    }

    #[test]
    fn inactive_promo_never_applies() {
        let mut fields = promo(None, None);
        fields.promo_active = false;
        assert_eq!(fields.effective_price(at(5)), dec!(100));
        assert_eq!(fields.effective_old_price(at(5)), None);
    }

    #[test]
    fn old_price_only_during_promo() {
        let fields = promo(Some(1), Some(10));
        assert_eq!(fields.effective_old_price(at(5)), Some(dec!(100)));
        assert_eq!(fields.effective_old_price(at(20)), None);
    }

    #[test]
    fn promo_end_picks_latest_active_window() {
        let a = promo(Some(1), Some(8));
        let b = promo(Some(1), Some(9));
        let expired = promo(Some(1), Some(3));
        let open_ended = promo(Some(1), None);
        assert_eq!(promo_end_for([&a, &b, &expired, &open_ended], at(5)), Some(at(9)));
        assert_eq!(promo_end_for([&open_ended], at(5)), None);
    }

    #[test]
    fn sort_price_prefers_lowest_promo() {
        let cheap_base = PriceFields {
            base_price: dec!(50),
            promo_price: None,
            promo_active: false,
            promo_start: None,
            promo_end: None,
        };
        let promoted = promo(None, None);
        assert_eq!(sort_price([&cheap_base, &promoted]), Some(dec!(80)));
        assert_eq!(sort_price([&cheap_base]), Some(dec!(50)));
        assert_eq!(sort_price(std::iter::empty()), None);
    }

    #[test]
    fn validation_rejects_bad_promotions() {
        let mut fields = promo(Some(2), Some(1));
        assert_eq!(fields.validate(), Err(PromoViolation::EndBeforeStart));

        fields = promo(None, None);
        fields.promo_price = Some(dec!(100));
        assert_eq!(fields.validate(), Err(PromoViolation::PromoNotBelowBase));

        // Equal prices are fine while the promotion is switched off.
        fields.promo_active = false;
        assert_eq!(fields.validate(), Ok(()));
    }

    #[test]
    fn stamping_sets_missing_start_only() {
        let now = at(3);
        let mut fields = promo(None, None);
        fields.stamp_start(now);
        assert_eq!(fields.promo_start, Some(now));

        let mut later = promo(Some(7), None);
        later.stamp_start(now);
        assert_eq!(later.promo_start, Some(at(7)));
    }
}
