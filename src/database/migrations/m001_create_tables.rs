use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Create teams table
        manager
            .create_table(
                Table::create()
                    .table(Teams::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Teams::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Teams::Name).string().not_null())
                    .col(ColumnDef::new(Teams::Description).string())
                    .col(ColumnDef::new(Teams::CreatedBy).integer())
                    .col(ColumnDef::new(Teams::CreatedAt).timestamp().not_null())
                    .to_owned(),
            )
            .await?;

        // Create users table
        manager
            .create_table(
                Table::create()
                    .table(Users::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Users::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Users::Username).string().not_null().unique_key())
                    .col(ColumnDef::new(Users::Email).string().not_null().default(""))
                    .col(ColumnDef::new(Users::FirstName).string().not_null().default(""))
                    .col(ColumnDef::new(Users::LastName).string().not_null().default(""))
                    .col(ColumnDef::new(Users::TeamId).integer())
                    .col(ColumnDef::new(Users::TeamInviteId).integer())
                    .col(ColumnDef::new(Users::CreatedAt).timestamp().not_null())
                    .col(ColumnDef::new(Users::UpdatedAt).timestamp().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_users_team_id")
                            .from(Users::Table, Users::TeamId)
                            .to(Teams::Table, Teams::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_users_team_invite_id")
                            .from(Users::Table, Users::TeamInviteId)
                            .to(Teams::Table, Teams::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        // Create material_categories table (no unique index on the code, duplicates
        // are coalesced when materials are saved)
        manager
            .create_table(
                Table::create()
                    .table(MaterialCategories::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(MaterialCategories::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(MaterialCategories::Category).string_len(2).not_null())
                    .col(ColumnDef::new(MaterialCategories::CreatedAt).timestamp().not_null())
                    .to_owned(),
            )
            .await?;

        // Create materials table
        manager
            .create_table(
                Table::create()
                    .table(Materials::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Materials::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Materials::UniqueId).string_len(6).not_null().unique_key())
                    .col(ColumnDef::new(Materials::Name).string().not_null())
                    .col(ColumnDef::new(Materials::Conductivity).double().not_null())
                    .col(ColumnDef::new(Materials::Emissivity).double().not_null())
                    .col(ColumnDef::new(Materials::CategoryId).integer().not_null())
                    .col(ColumnDef::new(Materials::UserId).integer())
                    .col(ColumnDef::new(Materials::Source).string().not_null().default(""))
                    .col(ColumnDef::new(Materials::Comments).text().not_null().default(""))
                    .col(ColumnDef::new(Materials::ColorArgb).string().not_null().default(""))
                    .col(ColumnDef::new(Materials::CreatedAt).timestamp().not_null())
                    .col(ColumnDef::new(Materials::UpdatedAt).timestamp().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_materials_category_id")
                            .from(Materials::Table, Materials::CategoryId)
                            .to(MaterialCategories::Table, MaterialCategories::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_materials_user_id")
                            .from(Materials::Table, Materials::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Create projects table
        manager
            .create_table(
                Table::create()
                    .table(Projects::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Projects::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Projects::Uid).string().not_null())
                    .col(ColumnDef::new(Projects::Name).string().not_null())
                    .col(ColumnDef::new(Projects::CreatedBy).integer().not_null())
                    .col(ColumnDef::new(Projects::AssemblyIdOrder).text().not_null().default("[]"))
                    .col(ColumnDef::new(Projects::OrderVersion).integer().not_null().default(0))
                    .col(ColumnDef::new(Projects::CreatedAt).timestamp().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_projects_created_by")
                            .from(Projects::Table, Projects::CreatedBy)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Create assemblies table
        manager
            .create_table(
                Table::create()
                    .table(Assemblies::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Assemblies::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Assemblies::Name).string().not_null())
                    .col(ColumnDef::new(Assemblies::ProjectId).integer().not_null())
                    .col(ColumnDef::new(Assemblies::UserId).integer())
                    .col(ColumnDef::new(Assemblies::LayerIdOrder).text().not_null().default("[]"))
                    .col(ColumnDef::new(Assemblies::OrderVersion).integer().not_null().default(0))
                    .col(ColumnDef::new(Assemblies::CreatedAt).timestamp().not_null())
                    .col(ColumnDef::new(Assemblies::UpdatedAt).timestamp().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_assemblies_project_id")
                            .from(Assemblies::Table, Assemblies::ProjectId)
                            .to(Projects::Table, Projects::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_assemblies_user_id")
                            .from(Assemblies::Table, Assemblies::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        // Create layers table
        manager
            .create_table(
                Table::create()
                    .table(Layers::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Layers::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Layers::AssemblyId).integer().not_null())
                    .col(ColumnDef::new(Layers::ThicknessMm).double().not_null())
                    .col(ColumnDef::new(Layers::SegmentIdOrder).text().not_null().default("[]"))
                    .col(ColumnDef::new(Layers::OrderVersion).integer().not_null().default(0))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_layers_assembly_id")
                            .from(Layers::Table, Layers::AssemblyId)
                            .to(Assemblies::Table, Assemblies::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Create layer_segments table
        manager
            .create_table(
                Table::create()
                    .table(LayerSegments::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(LayerSegments::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(LayerSegments::LayerId).integer().not_null())
                    .col(ColumnDef::new(LayerSegments::MaterialId).integer())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_layer_segments_layer_id")
                            .from(LayerSegments::Table, LayerSegments::LayerId)
                            .to(Layers::Table, Layers::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_layer_segments_material_id")
                            .from(LayerSegments::Table, LayerSegments::MaterialId)
                            .to(Materials::Table, Materials::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_material_categories_category")
                    .table(MaterialCategories::Table)
                    .col(MaterialCategories::Category)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(LayerSegments::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Layers::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Assemblies::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Projects::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Materials::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(MaterialCategories::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Users::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Teams::Table).to_owned())
            .await?;

        Ok(())
    }
}

#[derive(Iden)]
enum Teams {
    Table,
    Id,
    Name,
    Description,
    CreatedBy,
    CreatedAt,
}

#[derive(Iden)]
enum Users {
    Table,
    Id,
    Username,
    Email,
    FirstName,
    LastName,
    TeamId,
    TeamInviteId,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum MaterialCategories {
    Table,
    Id,
    Category,
    CreatedAt,
}

#[derive(Iden)]
enum Materials {
    Table,
    Id,
    UniqueId,
    Name,
    Conductivity,
    Emissivity,
    CategoryId,
    UserId,
    Source,
    Comments,
    ColorArgb,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum Projects {
    Table,
    Id,
    Uid,
    Name,
    CreatedBy,
    AssemblyIdOrder,
    OrderVersion,
    CreatedAt,
}

#[derive(Iden)]
enum Assemblies {
    Table,
    Id,
    Name,
    ProjectId,
    UserId,
    LayerIdOrder,
    OrderVersion,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum Layers {
    Table,
    Id,
    AssemblyId,
    ThicknessMm,
    SegmentIdOrder,
    OrderVersion,
}

#[derive(Iden)]
enum LayerSegments {
    Table,
    Id,
    LayerId,
    MaterialId,
}
