use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "materials")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub unique_id: String,
    pub name: String,
    pub conductivity: f64, // W/(m-K)
    pub emissivity: f64,
    pub category_id: i32,
    pub user_id: Option<i32>,
    pub source: String,
    #[sea_orm(column_type = "Text")]
    pub comments: String,
    pub color_argb: String,
    pub created_at: ChronoDateTimeUtc,
    pub updated_at: ChronoDateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::material_categories::Entity",
        from = "Column::CategoryId",
        to = "super::material_categories::Column::Id"
    )]
    MaterialCategories,
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::UserId",
        to = "super::users::Column::Id"
    )]
    Users,
    #[sea_orm(has_many = "super::layer_segments::Entity")]
    LayerSegments,
}

impl Related<super::material_categories::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::MaterialCategories.def()
    }
}

impl Related<super::users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Users.def()
    }
}

impl Related<super::layer_segments::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::LayerSegments.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// Six lowercase hex characters, the public identifier used by CSV round trips.
pub fn generate_unique_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..6].to_string()
}
