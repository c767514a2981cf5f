use axum::{extract::State, response::Html};
use serde_json::json;

use crate::server::app::AppState;
use crate::server::error::AppError;
use crate::server::extract::CurrentUser;
use crate::server::views::{TeamView, UserView};
use crate::services::TeamService;

pub async fn index_page(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Html<String>, AppError> {
    let team = TeamService::new(state.db.clone()).team(&user).await?;
    state.render(
        "index",
        &json!({
            "title": "Assembly Portal",
            "user": UserView::from(&user),
            "team": team.as_ref().map(TeamView::from),
        }),
    )
}
