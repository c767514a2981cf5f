use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "projects")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub uid: String,
    pub name: String,
    pub created_by: i32,
    #[sea_orm(column_type = "Text", default_value = "[]")]
    pub assembly_id_order: String, // JSON array of assembly ids
    pub order_version: i32,
    pub created_at: ChronoDateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::CreatedBy",
        to = "super::users::Column::Id"
    )]
    Users,
    #[sea_orm(has_many = "super::assemblies::Entity")]
    Assemblies,
}

impl Related<super::users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Users.def()
    }
}

impl Related<super::assemblies::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Assemblies.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

pub fn generate_uid() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..8].to_string()
}
