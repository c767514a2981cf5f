use chrono::Utc;
use sea_orm::*;
use tracing::info;

use crate::database::entities::{teams, users};
use crate::errors::{TeamError, TeamResult};

/// Editable profile fields on the account settings page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileField {
    FirstName,
    LastName,
    Email,
}

pub struct TeamService {
    db: DatabaseConnection,
}

/// Name of the team a user gets to themselves.
fn personal_team_name(username: &str) -> String {
    if teams::is_locked_name(username) {
        format!("{} (personal)", username)
    } else {
        username.to_string()
    }
}

impl TeamService {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Look up the user behind an authenticated username, creating the user
    /// and a personal team on first sight.
    pub async fn resolve_user(&self, username: &str) -> TeamResult<users::Model> {
        let existing = users::Entity::find()
            .filter(users::Column::Username.eq(username))
            .one(&self.db)
            .await?;

        let user = match existing {
            Some(user) => user,
            None => {
                info!("Provisioning user '{}'", username);
                users::ActiveModel::new(username).insert(&self.db).await?
            }
        };

        if user.team_id.is_some() {
            return Ok(user);
        }
        self.join_personal_team(user).await
    }

    async fn join_personal_team(&self, user: users::Model) -> TeamResult<users::Model> {
        let name = personal_team_name(&user.username);
        let team = match teams::Entity::find()
            .filter(teams::Column::Name.eq(name.as_str()))
            .filter(teams::Column::CreatedBy.eq(user.id))
            .one(&self.db)
            .await?
        {
            Some(team) => team,
            None => {
                teams::ActiveModel {
                    name: Set(name),
                    description: Set(None),
                    created_by: Set(Some(user.id)),
                    created_at: Set(Utc::now()),
                    ..Default::default()
                }
                .insert(&self.db)
                .await?
            }
        };

        let mut active: users::ActiveModel = user.into();
        active.team_id = Set(Some(team.id));
        active.team_invite_id = Set(None);
        Ok(active.set_updated_at().update(&self.db).await?)
    }

    pub async fn team(&self, user: &users::Model) -> TeamResult<Option<teams::Model>> {
        match user.team_id {
            Some(team_id) => Ok(teams::Entity::find_by_id(team_id).one(&self.db).await?),
            None => Ok(None),
        }
    }

    pub async fn pending_invite(&self, user: &users::Model) -> TeamResult<Option<teams::Model>> {
        match user.team_invite_id {
            Some(team_id) => Ok(teams::Entity::find_by_id(team_id).one(&self.db).await?),
            None => Ok(None),
        }
    }

    pub async fn team_members(&self, user: &users::Model) -> TeamResult<Vec<users::Model>> {
        let Some(team_id) = user.team_id else {
            return Ok(vec![user.clone()]);
        };
        Ok(users::Entity::find()
            .filter(users::Column::TeamId.eq(team_id))
            .order_by_asc(users::Column::Username)
            .all(&self.db)
            .await?)
    }

    /// Rename the user's team. Locked teams keep their name and locked names
    /// are never assigned. Returns the name the team ends up with.
    pub async fn update_team_name(&self, user: &users::Model, new_name: &str) -> TeamResult<String> {
        let Some(team) = self.team(user).await? else {
            return Ok(teams::PUBLIC_TEAM.to_string());
        };
        if team.is_locked() {
            return Ok(team.name);
        }

        let new_name = new_name.trim();
        if new_name.is_empty() {
            return Ok(team.name);
        }
        if teams::is_locked_name(new_name) {
            return Err(TeamError::LockedName(new_name.to_string()));
        }

        let mut active: teams::ActiveModel = team.into();
        active.name = Set(new_name.to_string());
        let team = active.update(&self.db).await?;
        info!("User {} renamed team {} to '{}'", user.username, team.id, team.name);
        Ok(team.name)
    }

    /// Set one profile field. A blank value leaves it unchanged. Returns the
    /// stored value.
    pub async fn update_profile(
        &self,
        user: &users::Model,
        field: ProfileField,
        value: &str,
    ) -> TeamResult<String> {
        let value = value.trim();
        let current = match field {
            ProfileField::FirstName => &user.first_name,
            ProfileField::LastName => &user.last_name,
            ProfileField::Email => &user.email,
        };
        if value.is_empty() {
            return Ok(current.clone());
        }

        let mut active: users::ActiveModel = user.clone().into();
        match field {
            ProfileField::FirstName => active.first_name = Set(value.to_string()),
            ProfileField::LastName => active.last_name = Set(value.to_string()),
            ProfileField::Email => active.email = Set(value.to_string()),
        }
        active.set_updated_at().update(&self.db).await?;
        Ok(value.to_string())
    }

    /// Invite the user with `email` to the inviter's team.
    pub async fn invite_user(&self, inviter: &users::Model, email: &str) -> TeamResult<teams::Model> {
        let team = self.team(inviter).await?.ok_or(TeamError::NoTeam)?;
        let email = email.trim();
        let invitee = users::Entity::find()
            .filter(users::Column::Email.eq(email))
            .filter(users::Column::Email.ne(""))
            .one(&self.db)
            .await?
            .ok_or_else(|| TeamError::UserNotFound(email.to_string()))?;

        let mut active: users::ActiveModel = invitee.into();
        active.team_invite_id = Set(Some(team.id));
        active.set_updated_at().update(&self.db).await?;
        info!("User {} invited {} to team '{}'", inviter.username, email, team.name);
        Ok(team)
    }

    pub async fn accept_invite(&self, user: &users::Model) -> TeamResult<teams::Model> {
        let team = self.pending_invite(user).await?.ok_or(TeamError::NoInvite)?;
        let mut active: users::ActiveModel = user.clone().into();
        active.team_id = Set(Some(team.id));
        active.team_invite_id = Set(None);
        active.set_updated_at().update(&self.db).await?;
        info!("User {} joined team '{}'", user.username, team.name);
        Ok(team)
    }

    pub async fn decline_invite(&self, user: &users::Model) -> TeamResult<teams::Model> {
        let team = self.pending_invite(user).await?.ok_or(TeamError::NoInvite)?;
        let mut active: users::ActiveModel = user.clone().into();
        active.team_invite_id = Set(None);
        active.set_updated_at().update(&self.db).await?;
        Ok(team)
    }

    /// Move the user back to their personal team, dropping any pending invite.
    pub async fn leave_team(&self, user: &users::Model) -> TeamResult<users::Model> {
        let user = self.join_personal_team(user.clone()).await?;
        info!("User {} left to personal team", user.username);
        Ok(user)
    }
}
