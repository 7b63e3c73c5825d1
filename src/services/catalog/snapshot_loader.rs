use std::collections::{BTreeSet, HashMap, HashSet};

use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder};
use tracing::debug;

use crate::catalog::attribute_value::{AttributeValue, ValueSlots};
use crate::catalog::snapshot::{CatalogSnapshot, ItemRecord, StoredValue, VariantRecord};
use crate::entities::{
    attribute, attribute_choice_value, brand, category, category_attribute, color, item,
    item_attribute_value, item_image, item_variant, variant_attribute_value, Attribute,
    AttributeChoiceValue, Brand, Category, CategoryAttribute, Color, Item, ItemAttributeValue,
    ItemImage, ItemVariant, VariantAttributeValue,
};
use crate::errors::ServiceError;

/// Which items a snapshot holds.
pub enum ItemSelector<'a> {
    /// Active, visible items of these categories
    InCategories(&'a BTreeSet<i64>),
    /// One item by slug, regardless of scope
    BySlug(&'a str),
}

pub async fn load_categories<C: ConnectionTrait>(db: &C) -> Result<Vec<category::Model>, ServiceError> {
    Ok(Category::find()
        .order_by_asc(category::Column::Id)
        .all(db)
        .await?)
}

/// Loads the items picked by `selector` with everything the engine reads.
/// `binding_categories` selects which category bindings come along.
///
/// Per-item and per-variant rows are fetched `id_chunk` ids at a time so a large
/// scope never exceeds the backend's bind parameter limit.
pub async fn load_snapshot<C: ConnectionTrait>(
    db: &C,
    categories: Vec<category::Model>,
    selector: ItemSelector<'_>,
    binding_categories: &BTreeSet<i64>,
    id_chunk: usize,
) -> Result<CatalogSnapshot, ServiceError> {
    let id_chunk = id_chunk.max(1);
    let mut items: Vec<item::Model> = Vec::new();
    match selector {
        ItemSelector::InCategories(ids) => {
            let ids: Vec<i64> = ids.iter().copied().collect();
            for chunk in ids.chunks(id_chunk) {
                items.extend(
                    Item::find()
                        .filter(item::Column::CategoryId.is_in(chunk.iter().copied()))
                        .filter(item::Column::IsActive.eq(true))
                        .filter(item::Column::IsVisible.eq(true))
                        .all(db)
                        .await?,
                );
            }
            items.sort_by(|a, b| b.id.cmp(&a.id));
        }
        ItemSelector::BySlug(slug) => {
            items = Item::find()
                .filter(item::Column::Slug.eq(slug))
                .all(db)
                .await?;
        }
    }
    let item_ids: Vec<i64> = items.iter().map(|i| i.id).collect();

    // Each item falls in exactly one chunk, so per-item ordering survives.
    let mut variants: Vec<item_variant::Model> = Vec::new();
    let mut images: Vec<item_image::Model> = Vec::new();
    let mut item_values: Vec<item_attribute_value::Model> = Vec::new();
    for chunk in item_ids.chunks(id_chunk) {
        variants.extend(
            ItemVariant::find()
                .filter(item_variant::Column::ItemId.is_in(chunk.iter().copied()))
                .order_by_asc(item_variant::Column::Id)
                .all(db)
                .await?,
        );
        images.extend(
            ItemImage::find()
                .filter(item_image::Column::ItemId.is_in(chunk.iter().copied()))
                .order_by_asc(item_image::Column::Position)
                .all(db)
                .await?,
        );
        item_values.extend(
            ItemAttributeValue::find()
                .filter(item_attribute_value::Column::ItemId.is_in(chunk.iter().copied()))
                .all(db)
                .await?,
        );
    }

    let variant_ids: Vec<i64> = variants.iter().map(|v| v.id).collect();
    let mut variant_values: Vec<variant_attribute_value::Model> = Vec::new();
    for chunk in variant_ids.chunks(id_chunk) {
        variant_values.extend(
            VariantAttributeValue::find()
                .filter(variant_attribute_value::Column::VariantId.is_in(chunk.iter().copied()))
                .all(db)
                .await?,
        );
    }

    let bindings: Vec<category_attribute::Model> = if binding_categories.is_empty() {
        Vec::new()
    } else {
        CategoryAttribute::find()
            .filter(category_attribute::Column::CategoryId.is_in(binding_categories.iter().copied()))
            .order_by_asc(category_attribute::Column::DisplayOrder)
            .all(db)
            .await?
    };

    let attributes: HashMap<i64, attribute::Model> = Attribute::find()
        .all(db)
        .await?
        .into_iter()
        .map(|a| (a.id, a))
        .collect();

    let mut choice_attributes: HashSet<i64> = bindings.iter().map(|b| b.attribute_id).collect();
    choice_attributes.extend(item_values.iter().map(|v| v.attribute_id));
    choice_attributes.extend(variant_values.iter().map(|v| v.attribute_id));
    choice_attributes.retain(|id| {
        attributes
            .get(id)
            .is_some_and(|a| a.attribute_type == crate::entities::AttributeType::Choice)
    });
    let choices: HashMap<i64, attribute_choice_value::Model> = if choice_attributes.is_empty() {
        HashMap::new()
    } else {
        AttributeChoiceValue::find()
            .filter(attribute_choice_value::Column::AttributeId.is_in(choice_attributes))
            .all(db)
            .await?
            .into_iter()
            .map(|c| (c.id, c))
            .collect()
    };

    let brand_ids: HashSet<i64> = items.iter().filter_map(|i| i.brand_id).collect();
    let brands: HashMap<i64, brand::Model> = if brand_ids.is_empty() {
        HashMap::new()
    } else {
        Brand::find()
            .filter(brand::Column::Id.is_in(brand_ids))
            .all(db)
            .await?
            .into_iter()
            .map(|b| (b.id, b))
            .collect()
    };

    let active_colors: Vec<color::Model> = Color::find()
        .filter(color::Column::IsActive.eq(true))
        .order_by_asc(color::Column::Name)
        .all(db)
        .await?;
    let used_color_ids: HashSet<i64> = variants.iter().filter_map(|v| v.color_id).collect();
    let mut colors: HashMap<i64, color::Model> = active_colors
        .iter()
        .filter(|c| used_color_ids.contains(&c.id))
        .map(|c| (c.id, c.clone()))
        .collect();
    let missing: Vec<i64> = used_color_ids
        .iter()
        .copied()
        .filter(|id| !colors.contains_key(id))
        .collect();
    if !missing.is_empty() {
        colors.extend(
            Color::find()
                .filter(color::Column::Id.is_in(missing))
                .all(db)
                .await?
                .into_iter()
                .map(|c| (c.id, c)),
        );
    }

    let typed = |attribute_id: i64, slots: ValueSlots| -> Option<StoredValue> {
        let attr = attributes.get(&attribute_id)?;
        AttributeValue::from_slots(attr.attribute_type, &slots).map(|value| StoredValue {
            attribute_id,
            value,
        })
    };

    let mut item_specs: HashMap<i64, Vec<StoredValue>> = HashMap::new();
    for row in item_values {
        let slots = ValueSlots {
            text: row.value_text,
            int: row.value_int,
            decimal: row.value_decimal,
            choice_id: row.value_choice_id,
        };
        if let Some(spec) = typed(row.attribute_id, slots) {
            item_specs.entry(row.item_id).or_default().push(spec);
        }
    }

    let mut variant_specs: HashMap<i64, Vec<StoredValue>> = HashMap::new();
    for row in variant_values {
        let slots = ValueSlots {
            text: row.value_text,
            int: row.value_int,
            decimal: row.value_decimal,
            choice_id: row.value_choice_id,
        };
        if let Some(spec) = typed(row.attribute_id, slots) {
            variant_specs.entry(row.variant_id).or_default().push(spec);
        }
    }

    let mut variants_by_item: HashMap<i64, Vec<VariantRecord>> = HashMap::new();
    for variant in variants {
        let specs = variant_specs.remove(&variant.id).unwrap_or_default();
        variants_by_item
            .entry(variant.item_id)
            .or_default()
            .push(VariantRecord::new(variant, specs));
    }

    let mut images_by_item: HashMap<i64, Vec<item_image::Model>> = HashMap::new();
    for image in images {
        images_by_item.entry(image.item_id).or_default().push(image);
    }

    let records: Vec<ItemRecord> = items
        .into_iter()
        .map(|item| ItemRecord {
            variants: variants_by_item.remove(&item.id).unwrap_or_default(),
            specs: item_specs.remove(&item.id).unwrap_or_default(),
            images: images_by_item.remove(&item.id).unwrap_or_default(),
            item,
        })
        .collect();

    debug!(
        items = records.len(),
        bindings = bindings.len(),
        id_chunk,
        "Loaded catalog snapshot"
    );

    Ok(CatalogSnapshot {
        categories,
        items: records,
        brands,
        colors,
        active_colors,
        attributes,
        choices,
        bindings,
    })
}
