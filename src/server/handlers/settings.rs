use axum::{extract::State, response::Html, Form};
use serde::Deserialize;
use serde_json::json;

use crate::database::entities::users;
use crate::errors::TeamError;
use crate::server::app::AppState;
use crate::server::error::AppError;
use crate::server::extract::CurrentUser;
use crate::server::views::{TeamView, UserView};
use crate::services::team_service::ProfileField;
use crate::services::TeamService;

#[derive(Debug, Default, Deserialize)]
pub struct SettingsForm {
    #[serde(default)]
    pub team_name: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub user_email: String,
}

fn text(message: impl AsRef<str>) -> Html<String> {
    Html(handlebars::html_escape(message.as_ref()))
}

async fn settings_context(state: &AppState, user: &users::Model) -> Result<serde_json::Value, AppError> {
    let service = TeamService::new(state.db.clone());
    let team = service.team(user).await?;
    let invite = service.pending_invite(user).await?;
    let members: Vec<UserView> = service
        .team_members(user)
        .await?
        .iter()
        .map(UserView::from)
        .collect();

    Ok(json!({
        "title": "Account Settings",
        "user": UserView::from(user),
        "team": team.as_ref().map(TeamView::from),
        "team_invite": invite.as_ref().map(TeamView::from),
        "team_members": members,
    }))
}

pub async fn account_settings(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Html<String>, AppError> {
    let context = settings_context(&state, &user).await?;
    state.render("account_settings", &context)
}

pub async fn update_team_name(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Form(form): Form<SettingsForm>,
) -> Result<Html<String>, AppError> {
    let service = TeamService::new(state.db.clone());
    match service.update_team_name(&user, &form.team_name).await {
        Ok(name) => Ok(text(name)),
        // A locked name is refused silently; the current name stays on screen
        Err(TeamError::LockedName(_)) => {
            let current = service.team(&user).await?;
            Ok(text(current.map(|t| t.name).unwrap_or_default()))
        }
        Err(err) => Err(err.into()),
    }
}

async fn update_profile(
    state: &AppState,
    user: &users::Model,
    field: ProfileField,
    value: &str,
) -> Result<Html<String>, AppError> {
    let stored = TeamService::new(state.db.clone())
        .update_profile(user, field, value)
        .await?;
    Ok(text(stored))
}

pub async fn update_first_name(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Form(form): Form<SettingsForm>,
) -> Result<Html<String>, AppError> {
    update_profile(&state, &user, ProfileField::FirstName, &form.first_name).await
}

pub async fn update_last_name(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Form(form): Form<SettingsForm>,
) -> Result<Html<String>, AppError> {
    update_profile(&state, &user, ProfileField::LastName, &form.last_name).await
}

pub async fn update_email(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Form(form): Form<SettingsForm>,
) -> Result<Html<String>, AppError> {
    update_profile(&state, &user, ProfileField::Email, &form.email).await
}

pub async fn invite_user_to_team(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Form(form): Form<SettingsForm>,
) -> Result<Html<String>, AppError> {
    let service = TeamService::new(state.db.clone());
    if service.team(&user).await?.is_none() {
        return Ok(text("No Team to invite to"));
    }

    let email = form.user_email.trim();
    if email.is_empty() {
        return Ok(text("Invite User to Team"));
    }

    match service.invite_user(&user, email).await {
        Ok(team) => Ok(text(format!("Invited User '{}' to Team '{}'", email, team.name))),
        Err(TeamError::UserNotFound(_)) => Ok(text(format!("Error: User '{}' not found?", email))),
        Err(TeamError::NoTeam) => Ok(text("No Team to invite to")),
        Err(err) => Err(err.into()),
    }
}

pub async fn accept_team_invite(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Html<String>, AppError> {
    match TeamService::new(state.db.clone()).accept_invite(&user).await {
        Ok(team) => Ok(text(format!("Joined Team '{}'", team.name))),
        Err(TeamError::NoInvite) => Ok(text("No Team Invite to accept")),
        Err(err) => Err(err.into()),
    }
}

pub async fn decline_team_invite(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Html<String>, AppError> {
    match TeamService::new(state.db.clone()).decline_invite(&user).await {
        Ok(team) => Ok(text(format!("Declined Team Invite to join '{}'", team.name))),
        Err(TeamError::NoInvite) => Ok(text("No Team Invite to accept")),
        Err(err) => Err(err.into()),
    }
}

/// Back to the personal team; answers with the refreshed teams block.
pub async fn leave_team(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Html<String>, AppError> {
    let user = TeamService::new(state.db.clone()).leave_team(&user).await?;
    let context = settings_context(&state, &user).await?;
    state.render("teams_block", &context)
}
