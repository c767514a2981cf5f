use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    response::Html,
    routing::{delete, get, post},
    Router,
};
use handlebars::Handlebars;
use sea_orm::DatabaseConnection;
use serde::Serialize;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::error::AppError;
use super::handlers::{assemblies, health, index, materials, settings};
use crate::common::get_portal_handlebars;
use crate::config::ServerConfig;

#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub handlebars: Arc<Handlebars<'static>>,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    pub fn new(db: DatabaseConnection, config: ServerConfig) -> Result<Self> {
        let handlebars = get_portal_handlebars().context("Failed to register templates")?;
        Ok(Self {
            db,
            handlebars: Arc::new(handlebars),
            config: Arc::new(config),
        })
    }

    pub fn render_string<T: Serialize>(&self, template: &str, data: &T) -> Result<String, AppError> {
        Ok(self.handlebars.render(template, data)?)
    }

    pub fn render<T: Serialize>(&self, template: &str, data: &T) -> Result<Html<String>, AppError> {
        self.render_string(template, data).map(Html)
    }
}

pub async fn create_app(db: DatabaseConnection, config: ServerConfig) -> Result<Router> {
    let cors = match config.cors_origin.as_deref() {
        Some(origin) => CorsLayer::new()
            .allow_origin(
                origin
                    .parse::<axum::http::HeaderValue>()
                    .with_context(|| format!("Invalid CORS origin '{}'", origin))?,
            )
            .allow_methods(Any)
            .allow_headers(Any),
        None => CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any),
    };

    let state = AppState::new(db, config)?;

    let app = Router::new()
        .route("/health", get(health::health_check))
        .route("/", get(index::index_page))
        .merge(settings_routes())
        .merge(material_routes())
        .merge(assembly_routes())
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state);

    Ok(app)
}

fn settings_routes() -> Router<AppState> {
    Router::new()
        .route("/account-settings/", get(settings::account_settings))
        .route("/account-settings/update-team-name/", post(settings::update_team_name))
        .route("/account-settings/update-first-name/", post(settings::update_first_name))
        .route("/account-settings/update-last-name/", post(settings::update_last_name))
        .route("/account-settings/update-email/", post(settings::update_email))
        .route("/account-settings/invite-user-to-team/", post(settings::invite_user_to_team))
        .route("/account-settings/accept-team-invite/", post(settings::accept_team_invite))
        .route("/account-settings/decline-team-invite/", post(settings::decline_team_invite))
        .route("/account-settings/leave-team/", post(settings::leave_team))
}

fn material_routes() -> Router<AppState> {
    Router::new()
        .route("/materials/", get(materials::materials_page))
        .route("/materials-list/", get(materials::materials_list))
        .route("/get-materials", get(materials::get_materials))
        .route(
            "/create-material/",
            get(materials::create_material_form).post(materials::create_material),
        )
        .route(
            "/materials/:pk/update",
            get(materials::update_material_form).post(materials::update_material),
        )
        .route("/material/:pk/delete", delete(materials::delete_material))
        .route("/materials/export-csv", get(materials::export_csv))
        .route(
            "/materials/import-materials",
            get(materials::import_form).post(materials::import_materials),
        )
        .route("/materials/set-unit-system", post(materials::set_unit_system))
}

fn assembly_routes() -> Router<AppState> {
    Router::new()
        .route("/assemblies/", get(assemblies::assemblies_page))
        .route("/assemblies/change-project/", get(assemblies::change_project))
        .route("/assemblies/:project_pk/", get(assemblies::project_view))
        .route("/assemblies/:project_pk/:assembly_pk/", get(assemblies::assembly_view))
        .route("/assemblies/:project_pk/add-new-assembly", post(assemblies::add_new_assembly))
        .route(
            "/assemblies/:project_pk/:assembly_pk/update-assembly-name",
            post(assemblies::update_assembly_name),
        )
        .route(
            "/assemblies/:project_pk/:assembly_pk/delete-assembly",
            post(assemblies::delete_assembly),
        )
        .route("/assemblies/:project_pk/:assembly_pk/add-layer/", post(assemblies::add_layer))
        .route(
            "/assemblies/:project_pk/:assembly_pk/delete-layer/:layer_pk/",
            post(assemblies::delete_layer),
        )
        .route(
            "/assemblies/:project_pk/:assembly_pk/move-layer/:layer_pk/",
            post(assemblies::move_layer),
        )
        .route(
            "/assemblies/:project_pk/:assembly_pk/update-layer-thickness/:layer_pk/",
            post(assemblies::update_layer_thickness),
        )
        .route(
            "/assemblies/:project_pk/:assembly_pk/update-layer-material/:layer_pk/",
            post(assemblies::update_layer_material),
        )
        .route(
            "/assemblies/:project_pk/:assembly_pk/layers/:layer_pk/add-segment/",
            post(assemblies::add_segment),
        )
        .route(
            "/assemblies/:project_pk/:assembly_pk/layers/:layer_pk/delete-segment/:segment_pk/",
            post(assemblies::delete_segment),
        )
}
