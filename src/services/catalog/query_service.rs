use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{DatabaseConnection, EntityTrait};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};
use utoipa::ToSchema;

use super::snapshot_loader::{load_categories, load_snapshot, ItemSelector};
use crate::cache::{facet_cache_key, get_json, set_json, CacheBackend};
use crate::catalog::facets::{AttributeFacet, AttributeOptions, FacetOptions};
use crate::catalog::listing::{assemble, resolve_entry, ListingEntry, PageRequest, SortOrder};
use crate::catalog::{
    compile, scope, Aggregator, AttributeValue, CatalogSnapshot, CompileOptions, FilterTerms,
    PriceFields, Scope, StoredValue,
};
use crate::config::CatalogConfig;
use crate::entities::{category, ItemState, ItemVariant};
use crate::errors::ServiceError;
use crate::services::i18n::Localizer;
use crate::services::media::MediaResolver;

/// A browse or facet request: scope, filter terms and presentation options.
#[derive(Debug, Clone, Default)]
pub struct BrowseRequest {
    pub category: Option<String>,
    pub subcategory: Option<String>,
    pub sort: SortOrder,
    pub page: Option<u64>,
    pub page_size: Option<u64>,
    pub lang: Option<String>,
    pub terms: FilterTerms,
}

impl BrowseRequest {
    /// Splits raw query pairs into the reserved parameters and the filter terms.
    pub fn from_pairs(pairs: &[(String, String)]) -> Self {
        let reserved = |name: &str| {
            pairs
                .iter()
                .rev()
                .find(|(k, v)| k.trim().eq_ignore_ascii_case(name) && !v.trim().is_empty())
                .map(|(_, v)| v.trim().to_string())
        };

        Self {
            category: reserved("category"),
            subcategory: reserved("subcategory"),
            sort: SortOrder::parse(reserved("sort").as_deref()),
            page: reserved("page").and_then(|p| p.parse().ok()),
            page_size: reserved("page_size").and_then(|p| p.parse().ok()),
            lang: reserved("lang"),
            terms: FilterTerms::from_pairs(pairs.iter().map(|(k, v)| (k.as_str(), v.as_str()))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct BrandSummary {
    pub name: String,
    pub slug: String,
    pub logo_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct CategorySummary {
    pub name: String,
    pub slug: String,
    pub parent_slug: Option<String>,
}

/// One item of a listing page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ItemCard {
    pub id: i64,
    pub slug: String,
    pub name: String,
    pub short_description: Option<String>,
    pub state: Option<ItemState>,
    pub brand: Option<BrandSummary>,
    pub category: Option<CategorySummary>,
    pub image_url: Option<String>,
    #[schema(value_type = Option<String>)]
    pub price_from: Option<Decimal>,
    #[schema(value_type = Option<String>)]
    pub old_price: Option<Decimal>,
    pub promo_active: bool,
    pub promo_ends_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ItemPage {
    pub items: Vec<ItemCard>,
    pub total_count: u64,
    pub page: u64,
    pub page_size: u64,
    pub total_pages: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PriceQuote {
    pub variant_id: i64,
    #[schema(value_type = String)]
    pub price: Decimal,
    #[schema(value_type = Option<String>)]
    pub old_price: Option<Decimal>,
    pub promo_active: bool,
    pub promo_ends_at: Option<DateTime<Utc>>,
    pub at: DateTime<Utc>,
}

/// A rendered attribute value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct SpecView {
    pub code: String,
    pub label: String,
    pub unit: Option<String>,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ColorView {
    pub name: String,
    pub slug: String,
    pub hex: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct VariantView {
    pub id: i64,
    pub sku: String,
    pub name: Option<String>,
    #[schema(value_type = String)]
    pub price: Decimal,
    #[schema(value_type = Option<String>)]
    pub old_price: Option<Decimal>,
    pub promo_active: bool,
    pub promo_ends_at: Option<DateTime<Utc>>,
    pub color: Option<ColorView>,
    pub stock_quantity: i32,
    pub specs: Vec<SpecView>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ImageView {
    pub url: String,
    pub alt_text: Option<String>,
    pub is_primary: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ItemDetail {
    pub id: i64,
    pub slug: String,
    pub name: String,
    pub short_description: Option<String>,
    pub long_description: Option<String>,
    pub state: Option<ItemState>,
    pub brand: Option<BrandSummary>,
    pub category: Option<CategorySummary>,
    pub images: Vec<ImageView>,
    #[schema(value_type = Option<String>)]
    pub price_from: Option<Decimal>,
    #[schema(value_type = Option<String>)]
    pub old_price: Option<Decimal>,
    pub promo_active: bool,
    pub promo_ends_at: Option<DateTime<Utc>>,
    pub specs: Vec<SpecView>,
    pub variants: Vec<VariantView>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct CategoryView {
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub parent_id: Option<i64>,
    pub image_url: Option<String>,
    pub position: i32,
}

/// Read side of the catalog: listings, facets, prices, item detail and categories.
#[derive(Clone)]
pub struct CatalogQueryService {
    db: Arc<DatabaseConnection>,
    cache: Arc<dyn CacheBackend>,
    localizer: Arc<Localizer>,
    media: Arc<dyn MediaResolver>,
    config: CatalogConfig,
}

impl CatalogQueryService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        cache: Arc<dyn CacheBackend>,
        localizer: Arc<Localizer>,
        media: Arc<dyn MediaResolver>,
        config: CatalogConfig,
    ) -> Self {
        Self {
            db,
            cache,
            localizer,
            media,
            config,
        }
    }

    fn compile_options(&self, now: DateTime<Utc>) -> CompileOptions {
        CompileOptions {
            variant_match: self.config.variant_match,
            price_filter: self.config.price_filter,
            now,
        }
    }

    async fn scoped_snapshot(
        &self,
        request: &BrowseRequest,
    ) -> Result<(Scope, CatalogSnapshot), ServiceError> {
        let categories = load_categories(&*self.db).await?;
        let scope = scope::resolve(
            &categories,
            request.category.as_deref(),
            request.subcategory.as_deref(),
        )?;
        let ids = scope.category_ids.clone();
        let snapshot = load_snapshot(
            &*self.db,
            categories,
            ItemSelector::InCategories(&ids),
            &ids,
            self.config.snapshot_id_chunk,
        )
        .await?;
        Ok((scope, snapshot))
    }

    /// Filtered, sorted, paginated listing for a scope.
    #[instrument(skip(self))]
    pub async fn list_items(&self, request: BrowseRequest) -> Result<ItemPage, ServiceError> {
        metrics::counter!("catalog.queries.list_items", 1);
        let now = Utc::now();
        let lang = self.localizer.normalize(request.lang.as_deref());
        let (scope, snapshot) = self.scoped_snapshot(&request).await?;

        let filter = compile(&request.terms, &snapshot, self.compile_options(now));
        let page = PageRequest::new(
            request.page,
            request.page_size,
            self.config.default_page_size,
            self.config.max_page_size,
        );
        let listing = assemble(&snapshot, &scope, &filter, request.sort, page, now);

        let mut items = Vec::with_capacity(listing.entries.len());
        for entry in &listing.entries {
            items.push(self.card(&snapshot, entry, &lang).await);
        }

        debug!(
            scope = %scope.key(),
            total = listing.total,
            clauses = filter.clauses.len(),
            "Listed catalog items"
        );
        Ok(ItemPage {
            items,
            total_count: listing.total,
            page: listing.page.page,
            page_size: listing.page.page_size,
            total_pages: listing.total_pages(),
        })
    }

    /// Facet option sets for a scope, each computed against the other active filters.
    #[instrument(skip(self))]
    pub async fn get_facet_options(&self, request: BrowseRequest) -> Result<FacetOptions, ServiceError> {
        metrics::counter!("catalog.queries.facets", 1);
        let lang = self.localizer.normalize(request.lang.as_deref());
        let ttl = self.config.facet_cache_ttl();

        // Scope resolution runs before the cache so unknown slugs stay NotFound.
        let categories = load_categories(&*self.db).await?;
        let scope = scope::resolve(
            &categories,
            request.category.as_deref(),
            request.subcategory.as_deref(),
        )?;
        let key = facet_cache_key(&scope.key(), &lang, &request.terms.fingerprint());

        if ttl.is_some() {
            match get_json::<FacetOptions>(self.cache.as_ref(), &key).await {
                Ok(Some(hit)) => {
                    metrics::counter!("catalog.facets.cache_hit", 1);
                    return Ok(hit);
                }
                Ok(None) => metrics::counter!("catalog.facets.cache_miss", 1),
                Err(e) => warn!(key = %key, error = %e, "Facet cache read failed"),
            }
        }

        let ids = scope.category_ids.clone();
        let snapshot = load_snapshot(
            &*self.db,
            categories,
            ItemSelector::InCategories(&ids),
            &ids,
            self.config.snapshot_id_chunk,
        )
        .await?;
        let filter = compile(&request.terms, &snapshot, self.compile_options(Utc::now()));
        let options = Aggregator::new(&snapshot, &scope, &filter, &self.config.color_attribute_code)
            .aggregate();
        let options = self.present_facets(options, &lang).await;

        if ttl.is_some() {
            if let Err(e) = set_json(self.cache.as_ref(), &key, &options, ttl).await {
                warn!(key = %key, error = %e, "Facet cache write failed");
            }
        }
        Ok(options)
    }

    /// Price of a variant at `at` (now when absent).
    #[instrument(skip(self))]
    pub async fn get_effective_price(
        &self,
        variant_id: i64,
        at: Option<DateTime<Utc>>,
    ) -> Result<PriceQuote, ServiceError> {
        let variant = ItemVariant::find_by_id(variant_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Variant {} not found", variant_id)))?;
        let at = at.unwrap_or_else(Utc::now);
        let price = PriceFields::from(&variant);
        let promo_active = price.promo_in_effect(at);
        Ok(PriceQuote {
            variant_id,
            price: price.effective_price(at),
            old_price: price.effective_old_price(at),
            promo_active,
            promo_ends_at: if promo_active { price.promo_end } else { None },
            at,
        })
    }

    /// Full item view by slug. Inactive or hidden items are not found.
    #[instrument(skip(self))]
    pub async fn get_item_detail(
        &self,
        slug: &str,
        lang: Option<&str>,
    ) -> Result<ItemDetail, ServiceError> {
        let lang = self.localizer.normalize(lang);
        let categories = load_categories(&*self.db).await?;
        let snapshot = load_snapshot(
            &*self.db,
            categories,
            ItemSelector::BySlug(slug.trim()),
            &BTreeSet::new(),
            self.config.snapshot_id_chunk,
        )
        .await?;

        let record = snapshot
            .items
            .iter()
            .find(|r| r.item.is_active && r.item.is_visible)
            .ok_or_else(|| ServiceError::NotFound(format!("Item '{}' not found", slug)))?;

        let now = Utc::now();
        let entry = resolve_entry(record, now);

        let mut images: Vec<_> = record.images.iter().collect();
        images.sort_by_key(|i| (!i.is_primary, i.position, i.id));
        let images = images
            .into_iter()
            .map(|i| ImageView {
                url: self.media.resolve_url(&i.url),
                alt_text: i.alt_text.clone(),
                is_primary: i.is_primary,
            })
            .collect();

        let mut variants = Vec::with_capacity(record.variants.len());
        for v in &record.variants {
            let color = match snapshot.color_of(&v.variant) {
                Some(c) => Some(ColorView {
                    name: self.localizer.text(&c.name, &lang).await,
                    slug: c.slug.clone(),
                    hex: c.hex_code.clone(),
                }),
                None => None,
            };
            let promo_active = v.price.promo_in_effect(now);
            variants.push(VariantView {
                id: v.variant.id,
                sku: v.variant.sku.clone(),
                name: self.localizer.opt_text(v.variant.name.as_deref(), &lang).await,
                price: v.price.effective_price(now),
                old_price: v.price.effective_old_price(now),
                promo_active,
                promo_ends_at: if promo_active { v.price.promo_end } else { None },
                color,
                stock_quantity: v.variant.stock_quantity,
                specs: self.render_specs(&snapshot, &v.specs, &lang).await,
            });
        }

        let item = &record.item;
        Ok(ItemDetail {
            id: item.id,
            slug: item.slug.clone(),
            name: self.localizer.text(&item.name, &lang).await,
            short_description: self
                .localizer
                .opt_text(item.short_description.as_deref(), &lang)
                .await,
            long_description: self
                .localizer
                .opt_text(item.long_description.as_deref(), &lang)
                .await,
            state: item.state,
            brand: self.brand_summary(&snapshot, item, &lang).await,
            category: self.category_summary(&snapshot, item.category_id, &lang).await,
            images,
            price_from: entry.price_from,
            old_price: entry.old_price,
            promo_active: entry.promo_active,
            promo_ends_at: entry.promo_ends_at,
            specs: self.render_specs(&snapshot, &record.specs, &lang).await,
            variants,
        })
    }

    /// Active categories sorted by name. Level 1 (or no level) lists the roots only.
    #[instrument(skip(self))]
    pub async fn list_categories(
        &self,
        level: Option<u32>,
        lang: Option<&str>,
    ) -> Result<Vec<CategoryView>, ServiceError> {
        let lang = self.localizer.normalize(lang);
        let roots_only = level.map_or(true, |l| l <= 1);

        let mut rows: Vec<category::Model> = load_categories(&*self.db)
            .await?
            .into_iter()
            .filter(|c| c.is_active && (!roots_only || c.parent_id.is_none()))
            .collect();
        rows.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));

        let mut views = Vec::with_capacity(rows.len());
        for c in rows {
            views.push(CategoryView {
                id: c.id,
                name: self.localizer.text(&c.name, &lang).await,
                slug: c.slug,
                parent_id: c.parent_id,
                image_url: self.media.resolve_opt(c.image_url.as_deref()),
                position: c.position,
            });
        }
        Ok(views)
    }

    async fn card(&self, snapshot: &CatalogSnapshot, entry: &ListingEntry<'_>, lang: &str) -> ItemCard {
        let item = &entry.record.item;
        ItemCard {
            id: item.id,
            slug: item.slug.clone(),
            name: self.localizer.text(&item.name, lang).await,
            short_description: self
                .localizer
                .opt_text(item.short_description.as_deref(), lang)
                .await,
            state: item.state,
            brand: self.brand_summary(snapshot, item, lang).await,
            category: self.category_summary(snapshot, item.category_id, lang).await,
            image_url: entry
                .record
                .primary_image()
                .and_then(|i| self.media.resolve_opt(Some(&i.url))),
            price_from: entry.price_from,
            old_price: entry.old_price,
            promo_active: entry.promo_active,
            promo_ends_at: entry.promo_ends_at,
        }
    }

    async fn brand_summary(
        &self,
        snapshot: &CatalogSnapshot,
        item: &crate::entities::item::Model,
        lang: &str,
    ) -> Option<BrandSummary> {
        let brand = snapshot.brand_of(item)?;
        Some(BrandSummary {
            name: self.localizer.text(&brand.name, lang).await,
            slug: brand.slug.clone(),
            logo_url: self.media.resolve_opt(brand.logo_url.as_deref()),
        })
    }

    async fn category_summary(
        &self,
        snapshot: &CatalogSnapshot,
        category_id: i64,
        lang: &str,
    ) -> Option<CategorySummary> {
        let category = snapshot.category(category_id)?;
        Some(CategorySummary {
            name: self.localizer.text(&category.name, lang).await,
            slug: category.slug.clone(),
            parent_slug: category
                .parent_id
                .and_then(|id| snapshot.category(id))
                .map(|p| p.slug.clone()),
        })
    }

    async fn render_specs(&self, snapshot: &CatalogSnapshot, specs: &[StoredValue], lang: &str) -> Vec<SpecView> {
        let mut visible: Vec<_> = specs
            .iter()
            .filter_map(|s| {
                snapshot
                    .attributes
                    .get(&s.attribute_id)
                    .filter(|a| a.is_active)
                    .map(|a| (a, &s.value))
            })
            .collect();
        visible.sort_by(|(a, _), (b, _)| {
            a.display_order
                .cmp(&b.display_order)
                .then_with(|| a.code.cmp(&b.code))
        });

        let mut rendered = Vec::with_capacity(visible.len());
        for (attr, value) in visible {
            let text = match value {
                AttributeValue::Text(t) => self.localizer.text(t, lang).await,
                AttributeValue::Int(n) => n.to_string(),
                AttributeValue::Decimal(d) => d.normalize().to_string(),
                AttributeValue::Bool(b) => {
                    self.localizer.text(if *b { "Yes" } else { "No" }, lang).await
                }
                AttributeValue::Choice(id) => match snapshot.choices.get(id) {
                    Some(choice) => self.localizer.text(&choice.value, lang).await,
                    None => continue,
                },
            };
            rendered.push(SpecView {
                code: attr.code.clone(),
                label: self.localizer.text(&attr.label, lang).await,
                unit: attr.unit.clone(),
                value: text,
            });
        }
        rendered
    }

    /// Localizes display names and resolves media. Slugs and codes are untouched.
    async fn present_facets(&self, mut options: FacetOptions, lang: &str) -> FacetOptions {
        if let Some(header) = options.category.as_mut() {
            header.name = self.localizer.text(&header.name, lang).await;
        }
        for brand in &mut options.brands {
            brand.name = self.localizer.text(&brand.name, lang).await;
            brand.logo_url = self.media.resolve_opt(brand.logo_url.as_deref());
        }
        for color in &mut options.colors {
            color.name = self.localizer.text(&color.name, lang).await;
        }
        for state in &mut options.states {
            state.label = self.localizer.text(&state.label, lang).await;
        }
        for facet in options
            .attributes_for_item
            .iter_mut()
            .chain(options.attributes_for_variant.iter_mut())
        {
            self.present_attribute(facet, lang).await;
        }
        options
    }

    async fn present_attribute(&self, facet: &mut AttributeFacet, lang: &str) {
        facet.label = self.localizer.text(&facet.label, lang).await;
        if let AttributeOptions::Choices(choices) = &mut facet.options {
            for choice in choices {
                choice.value = self.localizer.text(&choice.value, lang).await;
            }
        }
    }
}
