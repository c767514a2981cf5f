use chrono::Utc;
use sea_orm::*;
use tracing::info;

use crate::database::entities::{projects, users};
use crate::errors::{ContainerError, ContainerResult};

pub const DEFAULT_PROJECT_NAME: &str = "Default Project";

pub struct ProjectService {
    db: DatabaseConnection,
}

impl ProjectService {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub async fn create_project(&self, user: &users::Model, name: &str) -> ContainerResult<projects::Model> {
        let project = projects::ActiveModel {
            uid: Set(projects::generate_uid()),
            name: Set(name.to_string()),
            created_by: Set(user.id),
            assembly_id_order: Set("[]".to_string()),
            order_version: Set(0),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(&self.db)
        .await?;

        info!("User {} created project {} '{}'", user.username, project.id, project.name);
        Ok(project)
    }

    /// Projects created by anyone on the user's team, oldest first.
    pub async fn team_projects(&self, user: &users::Model) -> ContainerResult<Vec<projects::Model>> {
        let query = projects::Entity::find().inner_join(users::Entity);
        let query = match user.team_id {
            Some(team_id) => query.filter(users::Column::TeamId.eq(team_id)),
            None => query.filter(projects::Column::CreatedBy.eq(user.id)),
        };
        Ok(query.order_by_asc(projects::Column::Id).all(&self.db).await?)
    }

    pub async fn default_project(&self, user: &users::Model) -> ContainerResult<Option<projects::Model>> {
        Ok(self.team_projects(user).await?.into_iter().next())
    }

    /// The team's first project, creating "Default Project" when there is none.
    pub async fn ensure_default_project(&self, user: &users::Model) -> ContainerResult<projects::Model> {
        match self.default_project(user).await? {
            Some(project) => Ok(project),
            None => self.create_project(user, DEFAULT_PROJECT_NAME).await,
        }
    }

    /// A project the user's team can see; anything else is not-found.
    pub async fn get_team_project(&self, user: &users::Model, project_id: i32) -> ContainerResult<projects::Model> {
        self.team_projects(user)
            .await?
            .into_iter()
            .find(|p| p.id == project_id)
            .ok_or(ContainerError::NotFound { kind: "project", id: project_id })
    }
}
