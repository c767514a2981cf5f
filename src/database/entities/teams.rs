use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Team names that are created at startup and can never be taken or renamed.
pub const PUBLIC_TEAM: &str = "PUBLIC";
pub const ADMIN_TEAM: &str = "ADMIN";

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "teams")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub name: String,
    pub description: Option<String>,
    pub created_by: Option<i32>,
    pub created_at: ChronoDateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::users::Entity")]
    Users,
}

impl Related<super::users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Users.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn is_locked(&self) -> bool {
        is_locked_name(&self.name)
    }
}

pub fn is_locked_name(name: &str) -> bool {
    name == PUBLIC_TEAM || name == ADMIN_TEAM
}
