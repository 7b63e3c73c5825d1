//! Catalog schema, one migration per table group. The same definitions run on
//! PostgreSQL and SQLite.

use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240601_000001_create_reference_tables::Migration),
            Box::new(m20240601_000002_create_attribute_tables::Migration),
            Box::new(m20240601_000003_create_item_tables::Migration),
            Box::new(m20240601_000004_create_attribute_value_tables::Migration),
            Box::new(m20240601_000005_create_outbox_events_table::Migration),
        ]
    }
}

mod m20240601_000001_create_reference_tables {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240601_000001_create_reference_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Categories::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Categories::Id)
                                .big_integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(Categories::ParentId).big_integer().null())
                        .col(ColumnDef::new(Categories::Name).string().not_null())
                        .col(
                            ColumnDef::new(Categories::Slug)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(Categories::Description).text().null())
                        .col(ColumnDef::new(Categories::ImageUrl).string().null())
                        .col(
                            ColumnDef::new(Categories::Position)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Categories::IsActive)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(
                            ColumnDef::new(Categories::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_categories_parent_id")
                                .from(Categories::Table, Categories::ParentId)
                                .to(Categories::Table, Categories::Id)
                                .on_delete(ForeignKeyAction::SetNull)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_categories_parent_id")
                        .table(Categories::Table)
                        .col(Categories::ParentId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Brands::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Brands::Id)
                                .big_integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(Brands::Name).string().not_null())
                        .col(ColumnDef::new(Brands::Slug).string().not_null().unique_key())
                        .col(ColumnDef::new(Brands::LogoUrl).string().null())
                        .col(
                            ColumnDef::new(Brands::IsActive)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Colors::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Colors::Id)
                                .big_integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(Colors::Name).string().not_null())
                        .col(ColumnDef::new(Colors::Slug).string().not_null().unique_key())
                        .col(ColumnDef::new(Colors::HexCode).string_len(9).null())
                        .col(
                            ColumnDef::new(Colors::IsActive)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .to_owned(),
                )
                .await?;

            Ok(())
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Colors::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Brands::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Categories::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Categories {
        Table,
        Id,
        ParentId,
        Name,
        Slug,
        Description,
        ImageUrl,
        Position,
        IsActive,
        CreatedAt,
    }

    #[derive(DeriveIden)]
    enum Brands {
        Table,
        Id,
        Name,
        Slug,
        LogoUrl,
        IsActive,
    }

    #[derive(DeriveIden)]
    enum Colors {
        Table,
        Id,
        Name,
        Slug,
        HexCode,
        IsActive,
    }
}

mod m20240601_000002_create_attribute_tables {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240601_000002_create_attribute_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Attributes::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Attributes::Id)
                                .big_integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(
                            ColumnDef::new(Attributes::Code)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(Attributes::Label).string().not_null())
                        .col(
                            ColumnDef::new(Attributes::AttributeType)
                                .string_len(16)
                                .not_null(),
                        )
                        .col(ColumnDef::new(Attributes::Unit).string().null())
                        .col(
                            ColumnDef::new(Attributes::DisplayOrder)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Attributes::IsActive)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(
                            ColumnDef::new(Attributes::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(AttributeChoiceValues::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(AttributeChoiceValues::Id)
                                .big_integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(
                            ColumnDef::new(AttributeChoiceValues::AttributeId)
                                .big_integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(AttributeChoiceValues::Value)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(AttributeChoiceValues::Slug)
                                .string()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_attribute_choice_values_attribute_id")
                                .from(
                                    AttributeChoiceValues::Table,
                                    AttributeChoiceValues::AttributeId,
                                )
                                .to(Attributes::Table, Attributes::Id)
                                .on_delete(ForeignKeyAction::Cascade)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("uq_attribute_choice_values_attribute_slug")
                        .table(AttributeChoiceValues::Table)
                        .col(AttributeChoiceValues::AttributeId)
                        .col(AttributeChoiceValues::Slug)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(CategoryAttributes::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(CategoryAttributes::Id)
                                .big_integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(
                            ColumnDef::new(CategoryAttributes::CategoryId)
                                .big_integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(CategoryAttributes::AttributeId)
                                .big_integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(CategoryAttributes::IsRequired)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(
                            ColumnDef::new(CategoryAttributes::DisplayOrder)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_category_attributes_category_id")
                                .from(CategoryAttributes::Table, CategoryAttributes::CategoryId)
                                .to(Categories::Table, Categories::Id)
                                .on_delete(ForeignKeyAction::Cascade)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_category_attributes_attribute_id")
                                .from(CategoryAttributes::Table, CategoryAttributes::AttributeId)
                                .to(Attributes::Table, Attributes::Id)
                                .on_delete(ForeignKeyAction::Cascade)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("uq_category_attributes_category_attribute")
                        .table(CategoryAttributes::Table)
                        .col(CategoryAttributes::CategoryId)
                        .col(CategoryAttributes::AttributeId)
                        .unique()
                        .to_owned(),
                )
                .await?;

            Ok(())
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(CategoryAttributes::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(AttributeChoiceValues::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Attributes::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Attributes {
        Table,
        Id,
        Code,
        Label,
        AttributeType,
        Unit,
        DisplayOrder,
        IsActive,
        CreatedAt,
    }

    #[derive(DeriveIden)]
    enum AttributeChoiceValues {
        Table,
        Id,
        AttributeId,
        Value,
        Slug,
    }

    #[derive(DeriveIden)]
    enum CategoryAttributes {
        Table,
        Id,
        CategoryId,
        AttributeId,
        IsRequired,
        DisplayOrder,
    }

    #[derive(DeriveIden)]
    enum Categories {
        Table,
        Id,
    }
}

mod m20240601_000003_create_item_tables {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240601_000003_create_item_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Items::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Items::Id)
                                .big_integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(Items::CategoryId).big_integer().not_null())
                        .col(ColumnDef::new(Items::BrandId).big_integer().null())
                        .col(ColumnDef::new(Items::Name).string().not_null())
                        .col(ColumnDef::new(Items::Slug).string().not_null().unique_key())
                        .col(ColumnDef::new(Items::ShortDescription).text().null())
                        .col(ColumnDef::new(Items::LongDescription).text().null())
                        .col(ColumnDef::new(Items::State).string_len(20).null())
                        .col(
                            ColumnDef::new(Items::IsActive)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(
                            ColumnDef::new(Items::IsVisible)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(
                            ColumnDef::new(Items::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Items::UpdatedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_items_category_id")
                                .from(Items::Table, Items::CategoryId)
                                .to(Categories::Table, Categories::Id)
                                .on_delete(ForeignKeyAction::Restrict)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_items_brand_id")
                                .from(Items::Table, Items::BrandId)
                                .to(Brands::Table, Brands::Id)
                                .on_delete(ForeignKeyAction::SetNull)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_items_category_id")
                        .table(Items::Table)
                        .col(Items::CategoryId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(ItemVariants::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(ItemVariants::Id)
                                .big_integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(ItemVariants::ItemId).big_integer().not_null())
                        .col(
                            ColumnDef::new(ItemVariants::Sku)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(ItemVariants::Name).string().null())
                        .col(
                            ColumnDef::new(ItemVariants::BasePrice)
                                .decimal_len(12, 2)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ItemVariants::PromoPrice)
                                .decimal_len(12, 2)
                                .null(),
                        )
                        .col(
                            ColumnDef::new(ItemVariants::PromoActive)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(
                            ColumnDef::new(ItemVariants::PromoStart)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(ItemVariants::PromoEnd)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(ColumnDef::new(ItemVariants::ColorId).big_integer().null())
                        .col(
                            ColumnDef::new(ItemVariants::StockQuantity)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(ItemVariants::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ItemVariants::UpdatedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_item_variants_item_id")
                                .from(ItemVariants::Table, ItemVariants::ItemId)
                                .to(Items::Table, Items::Id)
                                .on_delete(ForeignKeyAction::Cascade)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_item_variants_color_id")
                                .from(ItemVariants::Table, ItemVariants::ColorId)
                                .to(Colors::Table, Colors::Id)
                                .on_delete(ForeignKeyAction::SetNull)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_item_variants_item_id")
                        .table(ItemVariants::Table)
                        .col(ItemVariants::ItemId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(ItemImages::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(ItemImages::Id)
                                .big_integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(ItemImages::ItemId).big_integer().not_null())
                        .col(ColumnDef::new(ItemImages::Url).string().not_null())
                        .col(ColumnDef::new(ItemImages::AltText).string().null())
                        .col(
                            ColumnDef::new(ItemImages::Position)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(ItemImages::IsPrimary)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_item_images_item_id")
                                .from(ItemImages::Table, ItemImages::ItemId)
                                .to(Items::Table, Items::Id)
                                .on_delete(ForeignKeyAction::Cascade)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            Ok(())
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(ItemImages::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(ItemVariants::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Items::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Items {
        Table,
        Id,
        CategoryId,
        BrandId,
        Name,
        Slug,
        ShortDescription,
        LongDescription,
        State,
        IsActive,
        IsVisible,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum ItemVariants {
        Table,
        Id,
        ItemId,
        Sku,
        Name,
        BasePrice,
        PromoPrice,
        PromoActive,
        PromoStart,
        PromoEnd,
        ColorId,
        StockQuantity,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum ItemImages {
        Table,
        Id,
        ItemId,
        Url,
        AltText,
        Position,
        IsPrimary,
    }

    #[derive(DeriveIden)]
    enum Categories {
        Table,
        Id,
    }

    #[derive(DeriveIden)]
    enum Brands {
        Table,
        Id,
    }

    #[derive(DeriveIden)]
    enum Colors {
        Table,
        Id,
    }
}

mod m20240601_000004_create_attribute_value_tables {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240601_000004_create_attribute_value_tables"
        }
    }

    /// Both value tables share one layout and differ only in the owner column.
    fn value_table(
        table: impl IntoIden + Copy + 'static,
        owner: impl IntoIden + Copy + 'static,
        owner_table: impl IntoIden + Copy + 'static,
        fk_prefix: &str,
    ) -> TableCreateStatement {
        Table::create()
            .table(table)
            .if_not_exists()
            .col(
                ColumnDef::new(ValueColumns::Id)
                    .big_integer()
                    .not_null()
                    .auto_increment()
                    .primary_key(),
            )
            .col(ColumnDef::new(owner).big_integer().not_null())
            .col(ColumnDef::new(ValueColumns::AttributeId).big_integer().not_null())
            .col(ColumnDef::new(ValueColumns::ValueText).text().null())
            .col(ColumnDef::new(ValueColumns::ValueInt).big_integer().null())
            .col(ColumnDef::new(ValueColumns::ValueDecimal).decimal_len(12, 4).null())
            .col(ColumnDef::new(ValueColumns::ValueChoiceId).big_integer().null())
            .foreign_key(
                ForeignKey::create()
                    .name(format!("fk_{fk_prefix}_owner"))
                    .from(table, owner)
                    .to(owner_table, ValueColumns::Id)
                    .on_delete(ForeignKeyAction::Cascade)
                    .on_update(ForeignKeyAction::Cascade),
            )
            .foreign_key(
                ForeignKey::create()
                    .name(format!("fk_{fk_prefix}_attribute_id"))
                    .from(table, ValueColumns::AttributeId)
                    .to(Attributes::Table, Attributes::Id)
                    .on_delete(ForeignKeyAction::Cascade)
                    .on_update(ForeignKeyAction::Cascade),
            )
            .foreign_key(
                ForeignKey::create()
                    .name(format!("fk_{fk_prefix}_value_choice_id"))
                    .from(table, ValueColumns::ValueChoiceId)
                    .to(AttributeChoiceValues::Table, AttributeChoiceValues::Id)
                    .on_delete(ForeignKeyAction::SetNull)
                    .on_update(ForeignKeyAction::Cascade),
            )
            .to_owned()
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(value_table(
                    ItemAttributeValues::Table,
                    ItemAttributeValues::ItemId,
                    Items::Table,
                    "item_attribute_values",
                ))
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("uq_item_attribute_values_owner_attribute")
                        .table(ItemAttributeValues::Table)
                        .col(ItemAttributeValues::ItemId)
                        .col(ValueColumns::AttributeId)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(value_table(
                    VariantAttributeValues::Table,
                    VariantAttributeValues::VariantId,
                    ItemVariants::Table,
                    "variant_attribute_values",
                ))
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("uq_variant_attribute_values_owner_attribute")
                        .table(VariantAttributeValues::Table)
                        .col(VariantAttributeValues::VariantId)
                        .col(ValueColumns::AttributeId)
                        .unique()
                        .to_owned(),
                )
                .await?;

            Ok(())
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(VariantAttributeValues::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(ItemAttributeValues::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden, Clone, Copy)]
    enum ItemAttributeValues {
        Table,
        ItemId,
    }

    #[derive(DeriveIden, Clone, Copy)]
    enum VariantAttributeValues {
        Table,
        VariantId,
    }

    #[derive(DeriveIden, Clone, Copy)]
    enum ValueColumns {
        Id,
        AttributeId,
        ValueText,
        ValueInt,
        ValueDecimal,
        ValueChoiceId,
    }

    #[derive(DeriveIden, Clone, Copy)]
    enum Items {
        Table,
    }

    #[derive(DeriveIden, Clone, Copy)]
    enum ItemVariants {
        Table,
    }

    #[derive(DeriveIden)]
    enum Attributes {
        Table,
        Id,
    }

    #[derive(DeriveIden)]
    enum AttributeChoiceValues {
        Table,
        Id,
    }
}

mod m20240601_000005_create_outbox_events_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240601_000005_create_outbox_events_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(OutboxEvents::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(OutboxEvents::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(OutboxEvents::AggregateType).string().not_null())
                        .col(ColumnDef::new(OutboxEvents::AggregateId).string().null())
                        .col(ColumnDef::new(OutboxEvents::EventType).string().not_null())
                        .col(ColumnDef::new(OutboxEvents::Payload).json().not_null())
                        .col(
                            ColumnDef::new(OutboxEvents::Status)
                                .string_len(20)
                                .not_null()
                                .default("pending"),
                        )
                        .col(
                            ColumnDef::new(OutboxEvents::Attempts)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(OutboxEvents::AvailableAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(OutboxEvents::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(OutboxEvents::UpdatedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(OutboxEvents::ProcessedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(ColumnDef::new(OutboxEvents::ErrorMessage).text().null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_outbox_events_status_available_at")
                        .table(OutboxEvents::Table)
                        .col(OutboxEvents::Status)
                        .col(OutboxEvents::AvailableAt)
                        .to_owned(),
                )
                .await?;

            Ok(())
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(OutboxEvents::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum OutboxEvents {
        Table,
        Id,
        AggregateType,
        AggregateId,
        EventType,
        Payload,
        Status,
        Attempts,
        AvailableAt,
        CreatedAt,
        UpdatedAt,
        ProcessedAt,
        ErrorMessage,
    }
}

