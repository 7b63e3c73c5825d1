//! Catalog persistence model.
//!
//! Attribute values live in two structurally identical tables, one per owner kind
//! (`item_attribute_values`, `variant_attribute_values`). Each row holds exactly one
//! populated value slot; see [`crate::catalog::attribute_value`] for the typed view.

pub mod attribute;
pub mod attribute_choice_value;
pub mod brand;
pub mod category;
pub mod category_attribute;
pub mod color;
pub mod item;
pub mod item_attribute_value;
pub mod item_image;
pub mod item_variant;
pub mod outbox_event;
pub mod variant_attribute_value;

pub use attribute::{AttributeType, Entity as Attribute, Model as AttributeModel};
pub use attribute_choice_value::{Entity as AttributeChoiceValue, Model as AttributeChoiceValueModel};
pub use brand::{Entity as Brand, Model as BrandModel};
pub use category::{Entity as Category, Model as CategoryModel};
pub use category_attribute::{Entity as CategoryAttribute, Model as CategoryAttributeModel};
pub use color::{Entity as Color, Model as ColorModel};
pub use item::{Entity as Item, ItemState, Model as ItemModel};
pub use item_attribute_value::{Entity as ItemAttributeValue, Model as ItemAttributeValueModel};
pub use item_image::{Entity as ItemImage, Model as ItemImageModel};
pub use item_variant::{Entity as ItemVariant, Model as ItemVariantModel};
pub use outbox_event::{Entity as OutboxEvent, Model as OutboxEventModel};
pub use variant_attribute_value::{
    Entity as VariantAttributeValue, Model as VariantAttributeValueModel,
};
