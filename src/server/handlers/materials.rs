use axum::{
    extract::{Multipart, OriginalUri, Path, RawQuery, State},
    http::{header, StatusCode},
    response::{AppendHeaders, Html, IntoResponse, Json, Redirect, Response},
    Form,
};
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::database::entities::users;
use crate::errors::{ImportExportError, MaterialError};
use crate::server::app::AppState;
use crate::server::error::AppError;
use crate::server::extract::{CurrentUser, HxRequest, Units};
use crate::server::views::{category_options, MaterialFormView, MaterialRowView, UnitsView, UserView};
use crate::services::csv_service::{self, EXPORT_FILENAME};
use crate::services::material_service::{MaterialInput, MaterialQuery};
use crate::services::{CsvService, MaterialService};
use crate::units::{UnitSystem, UNIT_COOKIE};

const IMPORT_FAILED: &str = "Sorry, an error occurred during upload";

/// Parse `?category=IN&category=WO&page=2`. Unknown keys are ignored and a
/// bad page number means page 1.
pub fn parse_list_query(raw: Option<&str>) -> MaterialQuery {
    let mut query = MaterialQuery {
        categories: Vec::new(),
        page: 1,
    };
    for (key, value) in url::form_urlencoded::parse(raw.unwrap_or_default().as_bytes()) {
        match key.as_ref() {
            "category" if !value.is_empty() => query.categories.push(value.into_owned()),
            "page" => query.page = value.parse().unwrap_or(1),
            _ => {}
        }
    }
    query
}

/// The category part of a list query, for pager links.
fn filter_query_string(categories: &[String]) -> String {
    url::form_urlencoded::Serializer::new(String::new())
        .extend_pairs(categories.iter().map(|c| ("category", c.as_str())))
        .finish()
}

fn material_service(state: &AppState) -> MaterialService {
    MaterialService::new(state.db.clone(), state.config.public_owner.clone())
}

async fn list_context(
    state: &AppState,
    user: &users::Model,
    units: UnitSystem,
    raw_query: Option<&str>,
) -> Result<Value, AppError> {
    let query = parse_list_query(raw_query);
    let page = material_service(state)
        .list(user, &query, state.config.page_size)
        .await?;

    let rows: Vec<MaterialRowView> = page
        .materials
        .iter()
        .map(|row| MaterialRowView::new(row, user, units))
        .collect();

    Ok(json!({
        "title": "Materials",
        "user": UserView::from(user),
        "materials": rows,
        "page": page.page,
        "categories": category_options(&query.categories),
        "filter_query": filter_query_string(&query.categories),
        "units": UnitsView::from(units),
    }))
}

pub async fn materials_page(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Units(units): Units,
    RawQuery(raw): RawQuery,
) -> Result<Html<String>, AppError> {
    let context = list_context(&state, &user, units, raw.as_deref()).await?;
    state.render("materials_page", &context)
}

pub async fn materials_list(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Units(units): Units,
    RawQuery(raw): RawQuery,
) -> Result<Html<String>, AppError> {
    let context = list_context(&state, &user, units, raw.as_deref()).await?;
    state.render("materials_container", &context)
}

pub async fn get_materials(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Units(units): Units,
    RawQuery(raw): RawQuery,
) -> Result<Html<String>, AppError> {
    let context = list_context(&state, &user, units, raw.as_deref()).await?;
    state.render("materials_table", &context)
}

fn success(state: &AppState, message: &str) -> Result<Html<String>, AppError> {
    state.render("material_success", &json!({ "message": message }))
}

/// Re-render a rejected form into the list page container.
fn invalid_form(state: &AppState, form: &MaterialFormView) -> Result<Response, AppError> {
    let html = state.render("material_form", form)?;
    Ok((AppendHeaders([("HX-Retarget", "#material-list-page")]), html).into_response())
}

pub async fn create_material_form(
    State(state): State<AppState>,
    CurrentUser(_user): CurrentUser,
) -> Result<Html<String>, AppError> {
    state.render("material_form", &MaterialFormView::create(MaterialInput::default()))
}

pub async fn create_material(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Form(input): Form<MaterialInput>,
) -> Result<Response, AppError> {
    match material_service(&state).create(&user, &input).await {
        Ok(_) => Ok(success(&state, "Material created successfully!")?.into_response()),
        Err(MaterialError::Validation(errors)) => {
            invalid_form(&state, &MaterialFormView::create(input).with_errors(&errors))
        }
        Err(err) => Err(err.into()),
    }
}

pub async fn update_material_form(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(pk): Path<i32>,
) -> Result<Html<String>, AppError> {
    let found = material_service(&state).get_owned(&user, pk).await?;
    let values = MaterialInput::from_model(&found.material, &found.category);
    state.render("material_form", &MaterialFormView::update(pk, values))
}

pub async fn update_material(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(pk): Path<i32>,
    Form(input): Form<MaterialInput>,
) -> Result<Response, AppError> {
    match material_service(&state).update(&user, pk, &input).await {
        Ok(_) => Ok(success(&state, "Material updated successfully!")?.into_response()),
        Err(MaterialError::Validation(errors)) => {
            invalid_form(&state, &MaterialFormView::update(pk, input).with_errors(&errors))
        }
        Err(err) => Err(err.into()),
    }
}

pub async fn delete_material(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(pk): Path<i32>,
) -> Result<Html<String>, AppError> {
    material_service(&state).delete(&user, pk).await?;
    success(&state, "Material deleted successfully!")
}

pub async fn export_csv(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    HxRequest(hx): HxRequest,
    OriginalUri(uri): OriginalUri,
    RawQuery(raw): RawQuery,
) -> Result<Response, AppError> {
    // htmx cannot save a download; have the browser re-request it
    if hx {
        let target = uri
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| uri.path().to_string());
        return Ok((AppendHeaders([("HX-Redirect", target)]), StatusCode::OK).into_response());
    }

    let query = parse_list_query(raw.as_deref());
    let rows = material_service(&state).list_all(&user, &query.categories).await?;
    if rows.is_empty() {
        return Ok(Json(json!({ "message": "No data to export" })).into_response());
    }

    let csv = csv_service::export_materials(&rows)?;
    info!("User {} exported {} materials", user.username, rows.len());
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename={}", EXPORT_FILENAME),
            ),
        ],
        csv,
    )
        .into_response())
}

pub async fn import_form(
    State(state): State<AppState>,
    CurrentUser(_user): CurrentUser,
) -> Result<Html<String>, AppError> {
    state.render("import_form", &json!({}))
}

pub async fn import_materials(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    mut multipart: Multipart,
) -> Result<Html<String>, AppError> {
    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?
    {
        if field.name() == Some("file") {
            let bytes = field
                .bytes()
                .await
                .map_err(|e| AppError::BadRequest(e.to_string()))?;
            upload = Some(bytes);
        }
    }

    let Some(bytes) = upload.filter(|b| !b.is_empty()) else {
        return state.render("import_form", &json!({ "message": "Please select a file to import" }));
    };

    let Ok(content) = String::from_utf8(bytes.to_vec()) else {
        warn!("Import by {} rejected: {}", user.username, ImportExportError::Encoding);
        return success(&state, IMPORT_FAILED);
    };

    match CsvService::new(state.db.clone(), state.config.public_owner.clone())
        .import_materials(&user, &content)
        .await
    {
        Ok(summary) => success(
            &state,
            &format!("{} materials imported successfully!", summary.total()),
        ),
        Err(ImportExportError::Database(err)) => Err(err.into()),
        Err(err) => {
            warn!("Import by {} rejected: {}", user.username, err);
            success(&state, IMPORT_FAILED)
        }
    }
}

/// Store the unit choice and send the browser back to the material table
/// with the rest of the submitted form as its query.
pub async fn set_unit_system(Form(fields): Form<Vec<(String, String)>>) -> impl IntoResponse {
    let units = if fields
        .iter()
        .any(|(key, value)| key == "unit-system" && !value.is_empty())
    {
        UnitSystem::IP
    } else {
        UnitSystem::SI
    };

    let query = url::form_urlencoded::Serializer::new(String::new())
        .extend_pairs(fields.iter().filter(|(key, _)| key != "unit-system"))
        .finish();

    let cookie = format!("{}={}; Path=/; SameSite=Lax", UNIT_COOKIE, units.as_str());
    (
        AppendHeaders([(header::SET_COOKIE, cookie)]),
        Redirect::to(&format!("/get-materials?{}", query)),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_list_query_collects_categories() {
        let query = parse_list_query(Some("category=IN&category=WO&page=3&other=x"));
        assert_eq!(query.categories, vec!["IN", "WO"]);
        assert_eq!(query.page, 3);
    }

    #[test]
    fn test_parse_list_query_defaults() {
        let query = parse_list_query(None);
        assert!(query.categories.is_empty());
        assert_eq!(query.page, 1);
        assert_eq!(parse_list_query(Some("page=abc")).page, 1);
    }

    #[test]
    fn test_filter_query_string() {
        let query = filter_query_string(&["IN".to_string(), "WO".to_string()]);
        assert_eq!(query, "category=IN&category=WO");
    }
}
