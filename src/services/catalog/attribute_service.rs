use std::sync::Arc;

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter,
    QueryOrder, Set, SqlErr, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use validator::Validate;

use crate::catalog::attribute_value::slugify;
use crate::catalog::scope;
use crate::entities::{
    attribute, attribute_choice_value, category_attribute, Attribute, AttributeChoiceValue,
    AttributeType, Category, CategoryAttribute,
};
use crate::errors::ServiceError;
use crate::events::{outbox, Event};

#[derive(Debug, Clone, Deserialize, Serialize, Validate, ToSchema)]
pub struct CreateAttributeInput {
    /// Filter key; normalized to lowercase with `_` separators
    #[validate(length(min = 1, max = 64))]
    pub code: String,
    #[validate(length(min = 1, max = 255))]
    pub label: String,
    pub attribute_type: AttributeType,
    pub unit: Option<String>,
    #[serde(default)]
    pub display_order: i32,
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate, ToSchema)]
pub struct EnsureChoiceInput {
    #[validate(length(min = 1, max = 255))]
    pub value: String,
}

#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct BindAttributeInput {
    pub attribute_id: i64,
    #[serde(default)]
    pub is_required: bool,
    #[serde(default)]
    pub display_order: i32,
}

pub(crate) fn is_unique_violation(err: &DbErr) -> bool {
    matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}

/// Normalized attribute code: `Screen Size` -> `screen_size`.
pub fn normalize_code(raw: &str) -> String {
    slugify(raw).replace('-', "_")
}

/// Admin-side management of attribute definitions, choice values and category bindings.
#[derive(Clone)]
pub struct AttributeCatalogService {
    db: Arc<DatabaseConnection>,
}

impl AttributeCatalogService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    #[instrument(skip(self))]
    pub async fn create_attribute(
        &self,
        input: CreateAttributeInput,
    ) -> Result<attribute::Model, ServiceError> {
        input.validate()?;
        let code = normalize_code(&input.code);
        if code.is_empty() {
            return Err(ServiceError::invalid_field("code", "must contain letters or digits"));
        }

        let existing = Attribute::find()
            .filter(attribute::Column::Code.eq(code.as_str()))
            .one(&*self.db)
            .await?;
        if existing.is_some() {
            return Err(ServiceError::Conflict(format!(
                "Attribute with code '{}' already exists",
                code
            )));
        }

        let model = attribute::ActiveModel {
            code: Set(code.clone()),
            label: Set(input.label.trim().to_string()),
            attribute_type: Set(input.attribute_type),
            unit: Set(input.unit.filter(|u| !u.trim().is_empty())),
            display_order: Set(input.display_order),
            is_active: Set(true),
            created_at: Set(Utc::now()),
            ..Default::default()
        };

        let created = model.insert(&*self.db).await.map_err(|e| {
            if is_unique_violation(&e) {
                ServiceError::Conflict(format!("Attribute with code '{}' already exists", code))
            } else {
                ServiceError::DatabaseError(e)
            }
        })?;

        info!(attribute_id = created.id, code = %created.code, "Created attribute");
        Ok(created)
    }

    #[instrument(skip(self))]
    pub async fn get_attribute(&self, attribute_id: i64) -> Result<attribute::Model, ServiceError> {
        Attribute::find_by_id(attribute_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Attribute {} not found", attribute_id)))
    }

    #[instrument(skip(self))]
    pub async fn set_attribute_active(
        &self,
        attribute_id: i64,
        is_active: bool,
    ) -> Result<attribute::Model, ServiceError> {
        let attr = self.get_attribute(attribute_id).await?;
        if attr.is_active == is_active {
            return Ok(attr);
        }
        let mut active: attribute::ActiveModel = attr.into();
        active.is_active = Set(is_active);
        let updated = active.update(&*self.db).await?;
        info!(attribute_id, is_active, "Changed attribute activation");
        Ok(updated)
    }

    /// Returns the choice value with this slug, creating it when missing.
    ///
    /// Concurrent callers converge on the same row: a lost insert race re-reads the
    /// winner's row.
    #[instrument(skip(self))]
    pub async fn ensure_choice_value(
        &self,
        attribute_id: i64,
        input: EnsureChoiceInput,
    ) -> Result<attribute_choice_value::Model, ServiceError> {
        input.validate()?;
        let attr = self.get_attribute(attribute_id).await?;
        if attr.attribute_type != AttributeType::Choice {
            return Err(ServiceError::invalid_field(
                &attr.code,
                "choice values only apply to choice attributes",
            ));
        }

        let value = input.value.trim().to_string();
        let slug = slugify(&value);
        if slug.is_empty() {
            return Err(ServiceError::invalid_field("value", "must contain letters or digits"));
        }

        if let Some(existing) = self.find_choice(attribute_id, &slug).await? {
            return Ok(existing);
        }

        let txn = self.db.begin().await?;
        let inserted = attribute_choice_value::ActiveModel {
            attribute_id: Set(attribute_id),
            value: Set(value),
            slug: Set(slug.clone()),
            ..Default::default()
        }
        .insert(&txn)
        .await;

        match inserted {
            Ok(choice) => {
                outbox::enqueue(
                    &txn,
                    &Event::AttributeChoiceCreated {
                        attribute_id,
                        choice_id: choice.id,
                    },
                )
                .await?;
                txn.commit().await?;
                info!(attribute_id, choice_id = choice.id, slug = %choice.slug, "Created choice value");
                Ok(choice)
            }
            Err(e) if is_unique_violation(&e) => {
                txn.rollback().await?;
                warn!(attribute_id, slug = %slug, "Choice value created concurrently, re-reading");
                self.find_choice(attribute_id, &slug).await?.ok_or_else(|| {
                    ServiceError::InternalError(format!(
                        "choice '{}' vanished after a unique violation",
                        slug
                    ))
                })
            }
            Err(e) => {
                txn.rollback().await?;
                Err(e.into())
            }
        }
    }

    async fn find_choice(
        &self,
        attribute_id: i64,
        slug: &str,
    ) -> Result<Option<attribute_choice_value::Model>, ServiceError> {
        Ok(AttributeChoiceValue::find()
            .filter(attribute_choice_value::Column::AttributeId.eq(attribute_id))
            .filter(attribute_choice_value::Column::Slug.eq(slug))
            .one(&*self.db)
            .await?)
    }

    #[instrument(skip(self))]
    pub async fn list_choice_values(
        &self,
        attribute_id: i64,
    ) -> Result<Vec<attribute_choice_value::Model>, ServiceError> {
        self.get_attribute(attribute_id).await?;
        Ok(AttributeChoiceValue::find()
            .filter(attribute_choice_value::Column::AttributeId.eq(attribute_id))
            .order_by_asc(attribute_choice_value::Column::Value)
            .all(&*self.db)
            .await?)
    }

    /// Binds an attribute to a category, or updates the existing binding.
    #[instrument(skip(self))]
    pub async fn bind_attribute(
        &self,
        category_id: i64,
        input: BindAttributeInput,
    ) -> Result<category_attribute::Model, ServiceError> {
        if Category::find_by_id(category_id).one(&*self.db).await?.is_none() {
            return Err(ServiceError::NotFound(format!("Category {} not found", category_id)));
        }
        self.get_attribute(input.attribute_id).await?;

        let existing = match self.find_binding(category_id, input.attribute_id).await? {
            Some(binding) => Some(binding),
            None => {
                let inserted = category_attribute::ActiveModel {
                    category_id: Set(category_id),
                    attribute_id: Set(input.attribute_id),
                    is_required: Set(input.is_required),
                    display_order: Set(input.display_order),
                    ..Default::default()
                }
                .insert(&*self.db)
                .await;
                match inserted {
                    Ok(binding) => {
                        info!(category_id, attribute_id = input.attribute_id, "Bound attribute to category");
                        return Ok(binding);
                    }
                    Err(e) if is_unique_violation(&e) => {
                        self.find_binding(category_id, input.attribute_id).await?
                    }
                    Err(e) => return Err(e.into()),
                }
            }
        };

        let binding = existing.ok_or_else(|| {
            ServiceError::InternalError("binding vanished after a unique violation".to_string())
        })?;
        if binding.is_required == input.is_required && binding.display_order == input.display_order {
            return Ok(binding);
        }
        let mut active: category_attribute::ActiveModel = binding.into();
        active.is_required = Set(input.is_required);
        active.display_order = Set(input.display_order);
        Ok(active.update(&*self.db).await?)
    }

    async fn find_binding(
        &self,
        category_id: i64,
        attribute_id: i64,
    ) -> Result<Option<category_attribute::Model>, ServiceError> {
        Ok(CategoryAttribute::find()
            .filter(category_attribute::Column::CategoryId.eq(category_id))
            .filter(category_attribute::Column::AttributeId.eq(attribute_id))
            .one(&*self.db)
            .await?)
    }

    /// Codes of the active attributes required for items of `category_id`, including
    /// requirements inherited from ancestor categories. Sorted.
    #[instrument(skip(self))]
    pub async fn required_codes(&self, category_id: i64) -> Result<Vec<String>, ServiceError> {
        let categories = Category::find().all(&*self.db).await?;
        let chain = scope::ancestors(&categories, category_id);

        let attribute_ids: Vec<i64> = CategoryAttribute::find()
            .filter(category_attribute::Column::CategoryId.is_in(chain))
            .filter(category_attribute::Column::IsRequired.eq(true))
            .all(&*self.db)
            .await?
            .into_iter()
            .map(|b| b.attribute_id)
            .collect();
        if attribute_ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut codes: Vec<String> = Attribute::find()
            .filter(attribute::Column::Id.is_in(attribute_ids))
            .filter(attribute::Column::IsActive.eq(true))
            .all(&*self.db)
            .await?
            .into_iter()
            .map(|a| a.code)
            .collect();
        codes.sort();
        codes.dedup();
        Ok(codes)
    }
}
