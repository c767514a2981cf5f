use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

pub const DEFAULT_THICKNESS_MM: f64 = 50.0;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "layers")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub assembly_id: i32,
    pub thickness_mm: f64,
    #[sea_orm(column_type = "Text", default_value = "[]")]
    pub segment_id_order: String, // JSON array of layer_segment ids
    pub order_version: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::assemblies::Entity",
        from = "Column::AssemblyId",
        to = "super::assemblies::Column::Id"
    )]
    Assemblies,
    #[sea_orm(has_many = "super::layer_segments::Entity")]
    LayerSegments,
}

impl Related<super::assemblies::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Assemblies.def()
    }
}

impl Related<super::layer_segments::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::LayerSegments.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
