//! Project / assembly / layer editor. Most routes answer with several htmx
//! fragments glued together: the assembly detail plus out-of-band sidebar
//! pieces.

use std::collections::HashMap;

use axum::{
    extract::{Path, Query, State},
    response::Html,
    Form,
};
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use crate::database::entities::{assemblies, layers, projects, users};
use crate::server::app::AppState;
use crate::server::error::AppError;
use crate::server::extract::CurrentUser;
use crate::server::views::{layer_views, AssemblyView, LayerView, ProjectView, UserView};
use crate::services::assembly_service::DEFAULT_ASSEMBLY_NAME;
use crate::services::ordering::MoveDirection;
use crate::services::{AssemblyService, MaterialService, ProjectService};

#[derive(Debug, Deserialize)]
pub struct ChangeProjectQuery {
    #[serde(default)]
    pub project_pk: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct NameForm {
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct ThicknessForm {
    #[serde(default)]
    pub thickness: String,
}

#[derive(Debug, Deserialize)]
pub struct MoveForm {
    pub direction: MoveDirection,
}

async fn scoped_project(state: &AppState, user: &users::Model, project_pk: i32) -> Result<projects::Model, AppError> {
    Ok(ProjectService::new(state.db.clone())
        .get_team_project(user, project_pk)
        .await?)
}

async fn scoped_assembly(
    state: &AppState,
    user: &users::Model,
    project_pk: i32,
    assembly_pk: i32,
) -> Result<(projects::Model, assemblies::Model), AppError> {
    let project = scoped_project(state, user, project_pk).await?;
    let assembly = AssemblyService::new(state.db.clone())
        .find_assembly(project.id, assembly_pk)
        .await?;
    Ok((project, assembly))
}

async fn scoped_layer(
    state: &AppState,
    user: &users::Model,
    (project_pk, assembly_pk, layer_pk): (i32, i32, i32),
) -> Result<(projects::Model, assemblies::Model, layers::Model), AppError> {
    let (project, assembly) = scoped_assembly(state, user, project_pk, assembly_pk).await?;
    let layer = AssemblyService::new(state.db.clone())
        .find_layer(assembly.id, layer_pk)
        .await?;
    Ok((project, assembly, layer))
}

/// The detail panel. With no assembly it renders the empty panel.
async fn render_detail(
    state: &AppState,
    user: &users::Model,
    project: &projects::Model,
    assembly: Option<assemblies::Model>,
) -> Result<String, AppError> {
    let Some(assembly) = assembly else {
        return state.render_string(
            "assembly_detail",
            &json!({ "project": ProjectView::new(project, Some(project.id)) }),
        );
    };

    let detail = AssemblyService::new(state.db.clone())
        .assembly_detail(assembly)
        .await?;
    let options = MaterialService::new(state.db.clone(), state.config.public_owner.clone())
        .options(user)
        .await?;
    state.render_string(
        "assembly_detail",
        &json!({
            "project": ProjectView::new(project, Some(project.id)),
            "assembly": AssemblyView::new(&detail.assembly, Some(detail.assembly.id)),
            "layers": layer_views(&detail, &options),
        }),
    )
}

async fn render_sidebar(
    state: &AppState,
    user: &users::Model,
    project: &projects::Model,
    active_assembly: Option<i32>,
) -> Result<String, AppError> {
    let assemblies = AssemblyService::new(state.db.clone())
        .project_assemblies(user, project)
        .await?;
    let views: Vec<AssemblyView> = assemblies
        .iter()
        .map(|a| AssemblyView::new(a, active_assembly))
        .collect();
    state.render_string(
        "assembly_sidebar",
        &json!({
            "project": ProjectView::new(project, Some(project.id)),
            "assemblies": views,
            "oob": true,
        }),
    )
}

fn render_add_button(state: &AppState, project: &projects::Model) -> Result<String, AppError> {
    state.render_string(
        "assembly_add_button",
        &json!({
            "project": ProjectView::new(project, Some(project.id)),
            "oob": true,
        }),
    )
}

/// Detail panel plus the sidebar list with `assembly` highlighted.
async fn assembly_fragments(
    state: &AppState,
    user: &users::Model,
    project: &projects::Model,
    assembly: Option<assemblies::Model>,
) -> Result<Html<String>, AppError> {
    let active = assembly.as_ref().map(|a| a.id);
    let detail = render_detail(state, user, project, assembly).await?;
    let sidebar = render_sidebar(state, user, project, active).await?;
    Ok(Html(detail + &sidebar))
}

async fn render_layer(
    state: &AppState,
    user: &users::Model,
    project: &projects::Model,
    assembly: &assemblies::Model,
    layer: layers::Model,
) -> Result<Html<String>, AppError> {
    let detail = AssemblyService::new(state.db.clone()).layer_detail(layer).await?;
    let options = MaterialService::new(state.db.clone(), state.config.public_owner.clone())
        .options(user)
        .await?;
    state.render(
        "layer",
        &json!({
            "project": ProjectView::new(project, Some(project.id)),
            "assembly": AssemblyView::new(assembly, Some(assembly.id)),
            "layer": LayerView::new(&detail, &options),
        }),
    )
}

pub async fn assemblies_page(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Html<String>, AppError> {
    let project_service = ProjectService::new(state.db.clone());
    let project = project_service.ensure_default_project(&user).await?;
    let projects = project_service.team_projects(&user).await?;

    let service = AssemblyService::new(state.db.clone());
    let assemblies = service.project_assemblies(&user, &project).await?;
    let first = assemblies.first().cloned();
    let active = first.as_ref().map(|a| a.id);

    let detail = render_detail(&state, &user, &project, first).await?;
    let project_views: Vec<ProjectView> = projects
        .iter()
        .map(|p| ProjectView::new(p, Some(project.id)))
        .collect();
    let assembly_views: Vec<AssemblyView> = assemblies
        .iter()
        .map(|a| AssemblyView::new(a, active))
        .collect();

    state.render(
        "assemblies_page",
        &json!({
            "title": "Assemblies",
            "user": UserView::from(&user),
            "projects": project_views,
            "project": ProjectView::new(&project, Some(project.id)),
            "assemblies": assembly_views,
            "detail_html": detail,
            "oob": false,
        }),
    )
}

pub async fn change_project(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(query): Query<ChangeProjectQuery>,
) -> Result<Html<String>, AppError> {
    let requested = query
        .project_pk
        .as_deref()
        .map(str::trim)
        .filter(|pk| !pk.is_empty());

    let project = match requested {
        Some(pk) => {
            let pk = pk
                .parse::<i32>()
                .map_err(|_| AppError::BadRequest(format!("Invalid project '{}'", pk)))?;
            scoped_project(&state, &user, pk).await?
        }
        None => ProjectService::new(state.db.clone())
            .ensure_default_project(&user)
            .await?,
    };
    info!("User {} switched to project {}", user.username, project.id);

    let detail = render_detail(&state, &user, &project, None).await?;
    let button = render_add_button(&state, &project)?;
    let sidebar = render_sidebar(&state, &user, &project, None).await?;
    let uid = format!(
        "<span id=\"active-project-uid\" hx-swap-oob=\"true\">{}</span>",
        handlebars::html_escape(&project.uid)
    );
    Ok(Html(detail + &button + &sidebar + &uid))
}

pub async fn project_view(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(project_pk): Path<i32>,
) -> Result<Html<String>, AppError> {
    let project = scoped_project(&state, &user, project_pk).await?;
    assembly_fragments(&state, &user, &project, None).await
}

pub async fn assembly_view(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path((project_pk, assembly_pk)): Path<(i32, i32)>,
) -> Result<Html<String>, AppError> {
    let (project, assembly) = scoped_assembly(&state, &user, project_pk, assembly_pk).await?;
    assembly_fragments(&state, &user, &project, Some(assembly)).await
}

pub async fn add_new_assembly(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(project_pk): Path<i32>,
) -> Result<Html<String>, AppError> {
    let project = scoped_project(&state, &user, project_pk).await?;
    let assembly = AssemblyService::new(state.db.clone())
        .add_assembly(&user, project.id, DEFAULT_ASSEMBLY_NAME)
        .await?;
    info!("User {} added assembly {} to project {}", user.username, assembly.id, project.id);
    assembly_fragments(&state, &user, &project, Some(assembly)).await
}

pub async fn update_assembly_name(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path((project_pk, assembly_pk)): Path<(i32, i32)>,
    Form(form): Form<NameForm>,
) -> Result<Html<String>, AppError> {
    let (project, assembly) = scoped_assembly(&state, &user, project_pk, assembly_pk).await?;
    let assembly = AssemblyService::new(state.db.clone())
        .rename_assembly(assembly, &form.name)
        .await?;

    let name_block = state.render_string(
        "assembly_name",
        &json!({
            "project": ProjectView::new(&project, Some(project.id)),
            "assembly": AssemblyView::new(&assembly, Some(assembly.id)),
        }),
    )?;
    let sidebar_name = format!(
        "<div id=\"assembly-name-{}\" hx-swap-oob=\"true\">{}</div>",
        assembly.id,
        handlebars::html_escape(&assembly.name)
    );
    Ok(Html(name_block + &sidebar_name))
}

pub async fn delete_assembly(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path((project_pk, assembly_pk)): Path<(i32, i32)>,
) -> Result<Html<String>, AppError> {
    let (project, assembly) = scoped_assembly(&state, &user, project_pk, assembly_pk).await?;
    let service = AssemblyService::new(state.db.clone());
    service.delete_assembly(project.id, assembly.id).await?;
    info!("User {} deleted assembly {}", user.username, assembly.id);

    let first = service
        .project_assemblies(&user, &project)
        .await?
        .into_iter()
        .next();
    assembly_fragments(&state, &user, &project, first).await
}

pub async fn add_layer(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path((project_pk, assembly_pk)): Path<(i32, i32)>,
) -> Result<Html<String>, AppError> {
    let (project, assembly) = scoped_assembly(&state, &user, project_pk, assembly_pk).await?;
    let layer = AssemblyService::new(state.db.clone())
        .add_layer(assembly.id)
        .await?;
    render_layer(&state, &user, &project, &assembly, layer).await
}

pub async fn delete_layer(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(ids): Path<(i32, i32, i32)>,
) -> Result<Html<String>, AppError> {
    let (project, assembly, layer) = scoped_layer(&state, &user, ids).await?;
    AssemblyService::new(state.db.clone())
        .delete_layer(assembly.id, layer.id)
        .await?;
    assembly_fragments(&state, &user, &project, Some(assembly)).await
}

pub async fn move_layer(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(ids): Path<(i32, i32, i32)>,
    Form(form): Form<MoveForm>,
) -> Result<Html<String>, AppError> {
    let (project, assembly, layer) = scoped_layer(&state, &user, ids).await?;
    AssemblyService::new(state.db.clone())
        .move_layer(assembly.id, layer.id, form.direction)
        .await?;
    assembly_fragments(&state, &user, &project, Some(assembly)).await
}

/// Responds with the stored thickness. A blank value leaves it unchanged.
pub async fn update_layer_thickness(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(ids): Path<(i32, i32, i32)>,
    Form(form): Form<ThicknessForm>,
) -> Result<String, AppError> {
    let (_, _, layer) = scoped_layer(&state, &user, ids).await?;
    let raw = form.thickness.trim();
    if raw.is_empty() {
        return Ok(layer.thickness_mm.to_string());
    }

    let thickness = raw
        .parse::<f64>()
        .map_err(|_| AppError::BadRequest(format!("Invalid thickness '{}'", raw)))?;
    let layer = AssemblyService::new(state.db.clone())
        .set_layer_thickness(layer, thickness)
        .await?;
    Ok(layer.thickness_mm.to_string())
}

/// The picker posts `form_{segment}-material`; the first segment of the
/// layer with a matching key is updated and the material name returned.
pub async fn update_layer_material(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(ids): Path<(i32, i32, i32)>,
    Form(fields): Form<HashMap<String, String>>,
) -> Result<Html<String>, AppError> {
    let (_, _, layer) = scoped_layer(&state, &user, ids).await?;
    let service = AssemblyService::new(state.db.clone());
    let detail = service.layer_detail(layer).await?;

    for segment in &detail.segments {
        let Some(value) = fields.get(&format!("form_{}-material", segment.segment.id)) else {
            continue;
        };
        let value = value.trim();
        if value.is_empty() {
            service
                .set_segment_material(detail.layer.id, segment.segment.id, None)
                .await?;
            return Ok(Html(String::new()));
        }

        let material_id = value
            .parse::<i32>()
            .map_err(|_| AppError::BadRequest(format!("Invalid material '{}'", value)))?;
        let material = MaterialService::new(state.db.clone(), state.config.public_owner.clone())
            .get_visible(&user, material_id)
            .await?;
        service
            .set_segment_material(detail.layer.id, segment.segment.id, Some(material.material.id))
            .await?;
        return Ok(Html(handlebars::html_escape(&material.material.name)));
    }
    Ok(Html(String::new()))
}

pub async fn add_segment(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(ids): Path<(i32, i32, i32)>,
) -> Result<Html<String>, AppError> {
    let (project, assembly, layer) = scoped_layer(&state, &user, ids).await?;
    AssemblyService::new(state.db.clone())
        .add_segment(layer.id)
        .await?;
    render_layer(&state, &user, &project, &assembly, layer).await
}

pub async fn delete_segment(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path((project_pk, assembly_pk, layer_pk, segment_pk)): Path<(i32, i32, i32, i32)>,
) -> Result<Html<String>, AppError> {
    let (project, assembly, layer) =
        scoped_layer(&state, &user, (project_pk, assembly_pk, layer_pk)).await?;
    AssemblyService::new(state.db.clone())
        .delete_segment(layer.id, segment_pk)
        .await?;
    render_layer(&state, &user, &project, &assembly, layer).await
}
