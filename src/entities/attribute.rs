use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Attribute definition; `code` is the external filter key (`attr_<code>`).
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "attributes")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    #[sea_orm(unique)]
    pub code: String,
    pub label: String,
    pub attribute_type: AttributeType,
    pub unit: Option<String>,
    pub display_order: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::attribute_choice_value::Entity")]
    ChoiceValues,
    #[sea_orm(has_many = "super::category_attribute::Entity")]
    CategoryBindings,
}

impl Related<super::attribute_choice_value::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ChoiceValues.def()
    }
}

impl Related<super::category_attribute::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::CategoryBindings.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// Value type of an attribute. Fixed once values exist for it.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    EnumIter,
    DeriveActiveEnum,
    ToSchema,
    strum::Display,
    strum::EnumString,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum AttributeType {
    #[sea_orm(string_value = "text")]
    Text,
    #[sea_orm(string_value = "int")]
    Int,
    #[sea_orm(string_value = "decimal")]
    Decimal,
    #[sea_orm(string_value = "boolean")]
    Boolean,
    #[sea_orm(string_value = "choice")]
    Choice,
}

impl AttributeType {
    pub fn is_numeric(self) -> bool {
        matches!(self, AttributeType::Int | AttributeType::Decimal)
    }
}
