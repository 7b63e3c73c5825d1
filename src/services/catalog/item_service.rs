use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DatabaseTransaction,
    EntityTrait, QueryFilter, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument};
use utoipa::ToSchema;
use validator::Validate;

use super::attribute_service::{is_unique_violation, normalize_code};
use crate::catalog::attribute_value::{parse_input, slugify, AttributeValue, ChoiceRef, ParsedInput, ValueSlots};
use crate::catalog::pricing::{PriceFields, PromoViolation};
use crate::catalog::scope;
use crate::entities::{
    attribute, attribute_choice_value, category_attribute, item, item_attribute_value,
    item_variant, variant_attribute_value, Attribute, AttributeChoiceValue, Brand, Category,
    CategoryAttribute, Color, Item, ItemAttributeValue, ItemState, ItemVariant,
    VariantAttributeValue,
};
use crate::errors::ServiceError;
use crate::events::{outbox, Event};

/// Attribute values keyed by attribute code (`ram` or `attr_ram`).
pub type AttributeInput = BTreeMap<String, Value>;

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate, ToSchema)]
pub struct CreateItemInput {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    /// Derived from the name when absent
    pub slug: Option<String>,
    pub category_id: i64,
    pub brand_id: Option<i64>,
    pub short_description: Option<String>,
    pub long_description: Option<String>,
    pub state: Option<ItemState>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default = "default_true")]
    pub is_visible: bool,
    #[serde(default)]
    #[schema(value_type = Object)]
    pub attributes: AttributeInput,
    #[serde(default)]
    #[validate]
    pub variants: Vec<CreateVariantInput>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate, ToSchema)]
pub struct CreateVariantInput {
    #[validate(length(min = 1, max = 64))]
    pub sku: String,
    pub name: Option<String>,
    #[schema(value_type = String)]
    pub base_price: Decimal,
    #[schema(value_type = Option<String>)]
    pub promo_price: Option<Decimal>,
    #[serde(default)]
    pub promo_active: bool,
    pub promo_start: Option<DateTime<Utc>>,
    pub promo_end: Option<DateTime<Utc>>,
    pub color_id: Option<i64>,
    #[serde(default)]
    pub stock_quantity: i32,
    #[serde(default)]
    #[schema(value_type = Object)]
    pub attributes: AttributeInput,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, ToSchema)]
pub struct UpdatePromotionInput {
    #[schema(value_type = Option<String>)]
    pub base_price: Option<Decimal>,
    #[schema(value_type = Option<String>)]
    pub promo_price: Option<Decimal>,
    pub promo_active: bool,
    pub promo_start: Option<DateTime<Utc>>,
    pub promo_end: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatedItem {
    pub item: item::Model,
    pub variants: Vec<item_variant::Model>,
}

/// Result of an attribute write call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct AttributeWriteOutcome {
    /// Codes whose stored value changed
    pub written: Vec<String>,
    /// Codes left untouched because no usable value was supplied
    pub skipped: Vec<String>,
    /// Codes whose supplied value equals the stored one
    pub unchanged: Vec<String>,
}

#[derive(Debug, Clone, Copy)]
enum Owner {
    Item(i64),
    Variant(i64),
}

struct PlannedWrite {
    attribute: attribute::Model,
    input: ParsedInput,
}

struct WritePlan {
    writes: Vec<PlannedWrite>,
    skipped: Vec<String>,
}

fn promo_error(violation: PromoViolation, sku: &str) -> ServiceError {
    ServiceError::invalid_field(violation.field(), format!("{} (variant {})", violation, sku))
}

/// Writes items, variants and their attribute values.
///
/// Writes touching one item are serialized through a per-item lock and run in one
/// transaction; the outbox rows for the change commit with it.
#[derive(Clone)]
pub struct ItemService {
    db: Arc<DatabaseConnection>,
    owner_locks: Arc<DashMap<i64, Arc<Mutex<()>>>>,
}

impl ItemService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self {
            db,
            owner_locks: Arc::new(DashMap::new()),
        }
    }

    fn owner_lock(&self, item_id: i64) -> Arc<Mutex<()>> {
        self.owner_locks
            .entry(item_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Creates an item with its variants and attribute values.
    #[instrument(skip(self, input), fields(name = %input.name, category_id = input.category_id))]
    pub async fn create_item(&self, input: CreateItemInput) -> Result<CreatedItem, ServiceError> {
        input.validate()?;
        let now = Utc::now();

        let categories = Category::find().all(&*self.db).await?;
        if !categories.iter().any(|c| c.id == input.category_id) {
            return Err(ServiceError::NotFound(format!(
                "Category {} not found",
                input.category_id
            )));
        }
        if let Some(brand_id) = input.brand_id {
            if Brand::find_by_id(brand_id).one(&*self.db).await?.is_none() {
                return Err(ServiceError::NotFound(format!("Brand {} not found", brand_id)));
            }
        }

        let slug = input
            .slug
            .as_deref()
            .map(slugify)
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| slugify(&input.name));
        if slug.is_empty() {
            return Err(ServiceError::invalid_field("slug", "must contain letters or digits"));
        }
        if Item::find()
            .filter(item::Column::Slug.eq(slug.as_str()))
            .one(&*self.db)
            .await?
            .is_some()
        {
            return Err(ServiceError::Conflict(format!("Item slug '{}' already exists", slug)));
        }

        let mut seen_skus = HashSet::new();
        let mut prices = Vec::with_capacity(input.variants.len());
        for variant in &input.variants {
            if !seen_skus.insert(variant.sku.trim().to_string()) {
                return Err(ServiceError::invalid_field("sku", format!("duplicate sku '{}'", variant.sku)));
            }
            let mut fields = PriceFields {
                base_price: variant.base_price,
                promo_price: variant.promo_price,
                promo_active: variant.promo_active,
                promo_start: variant.promo_start,
                promo_end: variant.promo_end,
            };
            fields
                .validate()
                .map_err(|v| promo_error(v, &variant.sku))?;
            fields.stamp_start(now);
            prices.push(fields);
        }
        let skus: Vec<String> = seen_skus.into_iter().collect();
        if !skus.is_empty() {
            if let Some(taken) = ItemVariant::find()
                .filter(item_variant::Column::Sku.is_in(skus))
                .one(&*self.db)
                .await?
            {
                return Err(ServiceError::Conflict(format!("Variant sku '{}' already exists", taken.sku)));
            }
        }
        for color_id in input.variants.iter().filter_map(|v| v.color_id).collect::<BTreeSet<_>>() {
            if Color::find_by_id(color_id).one(&*self.db).await?.is_none() {
                return Err(ServiceError::NotFound(format!("Color {} not found", color_id)));
            }
        }

        let attributes = self.attributes_by_code().await?;
        let bound = self.bound_attribute_ids(&categories, input.category_id).await?;

        let item_plan = plan_writes(&input.attributes, &attributes, &bound)?;
        let mut variant_plans = Vec::with_capacity(input.variants.len());
        for variant in &input.variants {
            variant_plans.push(plan_writes(&variant.attributes, &attributes, &bound)?);
        }

        let supplied: HashSet<&str> = item_plan
            .writes
            .iter()
            .chain(variant_plans.iter().flat_map(|p| p.writes.iter()))
            .map(|w| w.attribute.code.as_str())
            .collect();
        let mut missing: Vec<String> = attributes
            .values()
            .filter(|a| a.is_active && bound.get(&a.id).copied().unwrap_or(false))
            .map(|a| a.code.clone())
            .filter(|code| !supplied.contains(code.as_str()))
            .collect();
        missing.sort();
        if !missing.is_empty() {
            return Err(ServiceError::ValidationError(format!(
                "Missing required attributes: {}",
                missing.join(", ")
            )));
        }

        let txn = self.db.begin().await?;
        let created = item::ActiveModel {
            category_id: Set(input.category_id),
            brand_id: Set(input.brand_id),
            name: Set(input.name.trim().to_string()),
            slug: Set(slug),
            short_description: Set(input.short_description.clone()),
            long_description: Set(input.long_description.clone()),
            state: Set(input.state),
            is_active: Set(input.is_active),
            is_visible: Set(input.is_visible),
            created_at: Set(now),
            updated_at: Set(None),
            ..Default::default()
        }
        .insert(&txn)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                ServiceError::Conflict("Item slug already exists".to_string())
            } else {
                ServiceError::DatabaseError(e)
            }
        })?;

        let mut events = vec![Event::ItemCreated(created.id)];
        apply_plan(&txn, created.id, Owner::Item(created.id), item_plan.writes, &mut events).await?;

        let mut variants = Vec::with_capacity(input.variants.len());
        for ((variant, fields), plan) in input.variants.iter().zip(prices).zip(variant_plans) {
            let row = item_variant::ActiveModel {
                item_id: Set(created.id),
                sku: Set(variant.sku.trim().to_string()),
                name: Set(variant.name.clone()),
                base_price: Set(fields.base_price),
                promo_price: Set(fields.promo_price),
                promo_active: Set(fields.promo_active),
                promo_start: Set(fields.promo_start),
                promo_end: Set(fields.promo_end),
                color_id: Set(variant.color_id),
                stock_quantity: Set(variant.stock_quantity),
                created_at: Set(now),
                updated_at: Set(None),
                ..Default::default()
            }
            .insert(&txn)
            .await?;
            apply_plan(&txn, created.id, Owner::Variant(row.id), plan.writes, &mut events).await?;
            variants.push(row);
        }

        // Creation announces itself once; per-field change events are for edits.
        events.retain(|e| !matches!(e, Event::ItemAttributeChanged { .. }));
        for event in &events {
            outbox::enqueue(&txn, event).await?;
        }
        txn.commit().await?;

        metrics::counter!("catalog.items.created", 1);
        info!(item_id = created.id, variants = variants.len(), "Created item");
        Ok(CreatedItem {
            item: created,
            variants,
        })
    }

    /// Upserts item-level attribute values. Keys without a usable value are skipped
    /// and keep their stored value.
    #[instrument(skip(self, values))]
    pub async fn set_item_attributes(
        &self,
        item_id: i64,
        values: AttributeInput,
    ) -> Result<AttributeWriteOutcome, ServiceError> {
        let lock = self.owner_lock(item_id);
        let _guard = lock.lock().await;

        let item = Item::find_by_id(item_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Item {} not found", item_id)))?;
        self.write_values(item.id, item.category_id, Owner::Item(item.id), values)
            .await
    }

    /// Upserts variant-level attribute values, with the same skip rules as items.
    #[instrument(skip(self, values))]
    pub async fn set_variant_attributes(
        &self,
        variant_id: i64,
        values: AttributeInput,
    ) -> Result<AttributeWriteOutcome, ServiceError> {
        let (variant, item) = self.variant_with_item(variant_id).await?;
        let lock = self.owner_lock(item.id);
        let _guard = lock.lock().await;

        self.write_values(item.id, item.category_id, Owner::Variant(variant.id), values)
            .await
    }

    /// Replaces the promotion of a variant (and optionally its base price).
    #[instrument(skip(self))]
    pub async fn update_variant_promotion(
        &self,
        variant_id: i64,
        input: UpdatePromotionInput,
    ) -> Result<item_variant::Model, ServiceError> {
        let (variant, item) = self.variant_with_item(variant_id).await?;
        let lock = self.owner_lock(item.id);
        let _guard = lock.lock().await;

        let mut fields = PriceFields {
            base_price: input.base_price.unwrap_or(variant.base_price),
            promo_price: input.promo_price,
            promo_active: input.promo_active,
            promo_start: input.promo_start,
            promo_end: input.promo_end,
        };
        fields
            .validate()
            .map_err(|v| promo_error(v, &variant.sku))?;
        let now = Utc::now();
        fields.stamp_start(now);

        let txn = self.db.begin().await?;
        let mut active: item_variant::ActiveModel = variant.into();
        active.base_price = Set(fields.base_price);
        active.promo_price = Set(fields.promo_price);
        active.promo_active = Set(fields.promo_active);
        active.promo_start = Set(fields.promo_start);
        active.promo_end = Set(fields.promo_end);
        active.updated_at = Set(Some(now));
        let updated = active.update(&txn).await?;
        outbox::enqueue(
            &txn,
            &Event::VariantPromotionChanged {
                item_id: item.id,
                variant_id,
            },
        )
        .await?;
        txn.commit().await?;

        info!(item_id = item.id, variant_id, promo_active = updated.promo_active, "Updated variant promotion");
        Ok(updated)
    }

    async fn variant_with_item(
        &self,
        variant_id: i64,
    ) -> Result<(item_variant::Model, item::Model), ServiceError> {
        let variant = ItemVariant::find_by_id(variant_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Variant {} not found", variant_id)))?;
        let item = Item::find_by_id(variant.item_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Item {} not found", variant.item_id)))?;
        Ok((variant, item))
    }

    async fn write_values(
        &self,
        item_id: i64,
        category_id: i64,
        owner: Owner,
        values: AttributeInput,
    ) -> Result<AttributeWriteOutcome, ServiceError> {
        let categories = Category::find().all(&*self.db).await?;
        let attributes = self.attributes_by_code().await?;
        let bound = self.bound_attribute_ids(&categories, category_id).await?;
        let plan = plan_writes(&values, &attributes, &bound)?;

        let txn = self.db.begin().await?;
        let mut events = Vec::new();
        let unchanged = apply_plan(&txn, item_id, owner, plan.writes, &mut events).await?;

        let mut written = Vec::new();
        for event in &events {
            if let Event::ItemAttributeChanged { field, .. } = event {
                written.push(field.clone());
            }
            outbox::enqueue(&txn, event).await?;
        }
        txn.commit().await?;

        metrics::counter!("catalog.attribute_values.written", written.len() as u64);
        debug!(item_id, ?written, skipped = ?plan.skipped, "Wrote attribute values");
        Ok(AttributeWriteOutcome {
            written,
            skipped: plan.skipped,
            unchanged,
        })
    }

    async fn attributes_by_code(&self) -> Result<HashMap<String, attribute::Model>, ServiceError> {
        Ok(Attribute::find()
            .all(&*self.db)
            .await?
            .into_iter()
            .map(|a| (a.code.to_lowercase(), a))
            .collect())
    }

    /// Attributes bound to the category or one of its ancestors.
    async fn bound_attribute_ids(
        &self,
        categories: &[crate::entities::category::Model],
        category_id: i64,
    ) -> Result<HashMap<i64, bool>, ServiceError> {
        let chain = scope::ancestors(categories, category_id);
        let mut bound: HashMap<i64, bool> = HashMap::new();
        for binding in CategoryAttribute::find()
            .filter(category_attribute::Column::CategoryId.is_in(chain))
            .all(&*self.db)
            .await?
        {
            *bound.entry(binding.attribute_id).or_default() |= binding.is_required;
        }
        Ok(bound)
    }
}

/// Resolves codes, checks bindings and parses every supplied value before any write.
fn plan_writes(
    values: &AttributeInput,
    attributes: &HashMap<String, attribute::Model>,
    bound: &HashMap<i64, bool>,
) -> Result<WritePlan, ServiceError> {
    let mut plan = WritePlan {
        writes: Vec::new(),
        skipped: Vec::new(),
    };
    for (key, raw) in values {
        let code = normalize_code(key.strip_prefix("attr_").unwrap_or(key));
        let attribute = attributes
            .get(&code)
            .filter(|a| a.is_active)
            .ok_or_else(|| ServiceError::invalid_field(&code, "unknown or inactive attribute"))?;
        if !bound.contains_key(&attribute.id) {
            return Err(ServiceError::invalid_field(
                &code,
                "attribute is not bound to the item's category",
            ));
        }
        match parse_input(attribute.attribute_type, raw)
            .map_err(|reason| ServiceError::invalid_field(&code, reason))?
        {
            Some(input) => plan.writes.push(PlannedWrite {
                attribute: attribute.clone(),
                input,
            }),
            None => plan.skipped.push(code),
        }
    }
    Ok(plan)
}

/// Applies planned writes for one owner. Changed codes are reported as
/// `ItemAttributeChanged` events; codes whose value was already stored are returned.
async fn apply_plan(
    txn: &DatabaseTransaction,
    item_id: i64,
    owner: Owner,
    writes: Vec<PlannedWrite>,
    events: &mut Vec<Event>,
) -> Result<Vec<String>, ServiceError> {
    let mut unchanged = Vec::new();
    for write in writes {
        let value = match write.input {
            ParsedInput::Value(value) => value,
            ParsedInput::Choice(choice) => {
                AttributeValue::Choice(resolve_choice(txn, &write.attribute, choice, events).await?)
            }
        };
        let slots = value.to_slots();
        let changed = match owner {
            Owner::Item(item_id) => upsert_item_value(txn, item_id, write.attribute.id, slots).await?,
            Owner::Variant(variant_id) => {
                upsert_variant_value(txn, variant_id, write.attribute.id, slots).await?
            }
        };
        if changed {
            events.push(Event::ItemAttributeChanged {
                item_id,
                field: write.attribute.code.clone(),
            });
        } else {
            unchanged.push(write.attribute.code);
        }
    }
    Ok(unchanged)
}

/// Finds the referenced choice, creating a labelled one that does not exist yet.
async fn resolve_choice(
    txn: &DatabaseTransaction,
    attr: &attribute::Model,
    choice: ChoiceRef,
    events: &mut Vec<Event>,
) -> Result<i64, ServiceError> {
    let label = match choice {
        ChoiceRef::Id(id) => {
            return AttributeChoiceValue::find_by_id(id)
                .one(txn)
                .await?
                .filter(|c| c.attribute_id == attr.id)
                .map(|c| c.id)
                .ok_or_else(|| ServiceError::invalid_field(&attr.code, format!("unknown choice {}", id)));
        }
        ChoiceRef::Label(label) => label,
    };

    let slug = slugify(&label);
    if slug.is_empty() {
        return Err(ServiceError::invalid_field(&attr.code, "choice must contain letters or digits"));
    }
    if let Some(existing) = find_choice(txn, attr.id, &slug).await? {
        return Ok(existing.id);
    }

    let savepoint = txn.begin().await?;
    let inserted = attribute_choice_value::ActiveModel {
        attribute_id: Set(attr.id),
        value: Set(label),
        slug: Set(slug.clone()),
        ..Default::default()
    }
    .insert(&savepoint)
    .await;
    match inserted {
        Ok(row) => {
            savepoint.commit().await?;
            events.push(Event::AttributeChoiceCreated {
                attribute_id: attr.id,
                choice_id: row.id,
            });
            Ok(row.id)
        }
        Err(e) if is_unique_violation(&e) => {
            savepoint.rollback().await?;
            find_choice(txn, attr.id, &slug)
                .await?
                .map(|c| c.id)
                .ok_or_else(|| ServiceError::InternalError(format!("choice '{}' vanished", slug)))
        }
        Err(e) => {
            savepoint.rollback().await?;
            Err(e.into())
        }
    }
}

async fn find_choice<C: ConnectionTrait>(
    db: &C,
    attribute_id: i64,
    slug: &str,
) -> Result<Option<attribute_choice_value::Model>, ServiceError> {
    Ok(AttributeChoiceValue::find()
        .filter(attribute_choice_value::Column::AttributeId.eq(attribute_id))
        .filter(attribute_choice_value::Column::Slug.eq(slug))
        .one(db)
        .await?)
}

fn slots_of(text: &Option<String>, int: Option<i64>, decimal: Option<Decimal>, choice_id: Option<i64>) -> ValueSlots {
    ValueSlots {
        text: text.clone(),
        int,
        decimal,
        choice_id,
    }
}

async fn upsert_item_value(
    txn: &DatabaseTransaction,
    item_id: i64,
    attribute_id: i64,
    slots: ValueSlots,
) -> Result<bool, ServiceError> {
    let existing = ItemAttributeValue::find()
        .filter(item_attribute_value::Column::ItemId.eq(item_id))
        .filter(item_attribute_value::Column::AttributeId.eq(attribute_id))
        .one(txn)
        .await?;
    match existing {
        Some(row) if slots_of(&row.value_text, row.value_int, row.value_decimal, row.value_choice_id) == slots => {
            Ok(false)
        }
        Some(row) => {
            let mut active: item_attribute_value::ActiveModel = row.into();
            active.value_text = Set(slots.text);
            active.value_int = Set(slots.int);
            active.value_decimal = Set(slots.decimal);
            active.value_choice_id = Set(slots.choice_id);
            active.update(txn).await?;
            Ok(true)
        }
        None => {
            item_attribute_value::ActiveModel {
                item_id: Set(item_id),
                attribute_id: Set(attribute_id),
                value_text: Set(slots.text),
                value_int: Set(slots.int),
                value_decimal: Set(slots.decimal),
                value_choice_id: Set(slots.choice_id),
                ..Default::default()
            }
            .insert(txn)
            .await?;
            Ok(true)
        }
    }
}

async fn upsert_variant_value(
    txn: &DatabaseTransaction,
    variant_id: i64,
    attribute_id: i64,
    slots: ValueSlots,
) -> Result<bool, ServiceError> {
    let existing = VariantAttributeValue::find()
        .filter(variant_attribute_value::Column::VariantId.eq(variant_id))
        .filter(variant_attribute_value::Column::AttributeId.eq(attribute_id))
        .one(txn)
        .await?;
    match existing {
        Some(row) if slots_of(&row.value_text, row.value_int, row.value_decimal, row.value_choice_id) == slots => {
            Ok(false)
        }
        Some(row) => {
            let mut active: variant_attribute_value::ActiveModel = row.into();
            active.value_text = Set(slots.text);
            active.value_int = Set(slots.int);
            active.value_decimal = Set(slots.decimal);
            active.value_choice_id = Set(slots.choice_id);
            active.update(txn).await?;
            Ok(true)
        }
        None => {
            variant_attribute_value::ActiveModel {
                variant_id: Set(variant_id),
                attribute_id: Set(attribute_id),
                value_text: Set(slots.text),
                value_int: Set(slots.int),
                value_decimal: Set(slots.decimal),
                value_choice_id: Set(slots.choice_id),
                ..Default::default()
            }
            .insert(txn)
            .await?;
            Ok(true)
        }
    }
}
