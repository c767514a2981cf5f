//! HTTP integration tests
//!
//! Drive the router the way the htmx front end does: form posts, fragment
//! responses and the identity header.

use anyhow::Result;
use axum::http::{header, HeaderName, HeaderValue, StatusCode};
use axum_test::{TestRequest, TestServer};
use portal::config::ServerConfig;
use portal::database::entities::*;
use portal::database::seed_data::seed_defaults;
use portal::database::setup_database;
use portal::server::app::create_app;
use sea_orm::{ColumnTrait, Database, DatabaseConnection, EntityTrait, QueryFilter};
use serde_json::Value;
use tempfile::NamedTempFile;

struct TestApp {
    server: TestServer,
    db: DatabaseConnection,
    _temp_file: NamedTempFile,
}

/// Test server on a temporary database file
async fn setup_test_server() -> Result<TestApp> {
    let temp_file = NamedTempFile::new()?;
    let db_url = format!("sqlite://{}?mode=rwc", temp_file.path().display());

    let db = Database::connect(&db_url).await?;
    setup_database(&db).await?;
    seed_defaults(&db, "public").await?;

    let app = create_app(db.clone(), ServerConfig::default()).await?;
    let server = TestServer::new(app)?;

    Ok(TestApp {
        server,
        db,
        _temp_file: temp_file,
    })
}

fn as_user(request: TestRequest, username: &'static str) -> TestRequest {
    request.add_header(
        HeaderName::from_static("x-remote-user"),
        HeaderValue::from_static(username),
    )
}

fn header_str(response: &axum_test::TestResponse, name: &str) -> Option<String> {
    response
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

#[tokio::test]
async fn test_health_endpoint() -> Result<()> {
    let app = setup_test_server().await?;

    let response = app.server.get("/health").await;
    assert_eq!(response.status_code(), StatusCode::OK);

    let body: Value = response.json();
    assert_eq!(body["service"], "assembly-portal");
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["database"], "ok");
    assert!(body["version"].is_string());

    Ok(())
}

#[tokio::test]
async fn test_missing_identity_is_unauthorized() -> Result<()> {
    let app = setup_test_server().await?;

    let response = app.server.get("/materials/").await;
    assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);

    Ok(())
}

#[tokio::test]
async fn test_first_request_provisions_user() -> Result<()> {
    let app = setup_test_server().await?;

    let response = as_user(app.server.get("/"), "alice").await;
    assert_eq!(response.status_code(), StatusCode::OK);
    assert!(response.text().contains("alice"));

    let user = users::Entity::find()
        .filter(users::Column::Username.eq("alice"))
        .one(&app.db)
        .await?
        .expect("user provisioned");
    assert!(user.team_id.is_some());

    Ok(())
}

#[tokio::test]
async fn test_create_material_validation_rerenders_form() -> Result<()> {
    let app = setup_test_server().await?;

    let response = as_user(app.server.post("/create-material/"), "alice")
        .form(&[
            ("name", ""),
            ("conductivity", "abc"),
            ("emissivity", "2"),
            ("category", "IN"),
        ])
        .await;

    assert_eq!(response.status_code(), StatusCode::OK);
    assert_eq!(header_str(&response, "hx-retarget").as_deref(), Some("#material-list-page"));
    let body = response.text();
    assert!(body.contains("Please enter a valid name."));
    assert!(body.contains("Enter a number."));
    assert!(body.contains("Emissivity must be between 0.0 and 1.0"));

    assert!(materials::Entity::find().all(&app.db).await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_material_lifecycle_and_units() -> Result<()> {
    let app = setup_test_server().await?;

    let response = as_user(app.server.post("/create-material/"), "alice")
        .form(&[
            ("name", "Cork Board"),
            ("conductivity", "0.04"),
            ("emissivity", "0.9"),
            ("category", "IN"),
        ])
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    assert!(response.text().contains("Material created successfully!"));

    let si = as_user(app.server.get("/get-materials"), "alice").await;
    let body = si.text();
    assert!(body.contains("Cork Board"));
    assert!(body.contains("0.0400"));
    assert!(body.contains("W/(m-K)"));

    let ip = as_user(app.server.get("/get-materials"), "alice")
        .add_header(header::COOKIE, HeaderValue::from_static("unit_system=IP"))
        .await;
    let body = ip.text();
    assert!(body.contains("0.0231"));
    assert!(body.contains("Btu/(hr-ft-°F)"));

    // Other users neither see nor edit it
    let other = as_user(app.server.get("/get-materials"), "bob").await;
    assert!(!other.text().contains("Cork Board"));

    let material = materials::Entity::find()
        .one(&app.db)
        .await?
        .expect("material created");
    let forbidden = as_user(app.server.delete(&format!("/material/{}/delete", material.id)), "bob").await;
    assert_eq!(forbidden.status_code(), StatusCode::NOT_FOUND);

    let deleted = as_user(app.server.delete(&format!("/material/{}/delete", material.id)), "alice").await;
    assert_eq!(deleted.status_code(), StatusCode::OK);
    assert!(deleted.text().contains("Material deleted successfully!"));
    assert!(materials::Entity::find().all(&app.db).await?.is_empty());

    Ok(())
}

#[tokio::test]
async fn test_category_filter() -> Result<()> {
    let app = setup_test_server().await?;
    for (name, category) in [("Cork Board", "IN"), ("Larch", "WO")] {
        as_user(app.server.post("/create-material/"), "alice")
            .form(&[
                ("name", name),
                ("conductivity", "0.1"),
                ("emissivity", "0.9"),
                ("category", category),
            ])
            .await;
    }

    let response = as_user(app.server.get("/get-materials"), "alice")
        .add_query_param("category", "WO")
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let body = response.text();
    assert!(body.contains("Larch"));
    assert!(!body.contains("Cork Board"));

    // The export honours the same filter
    let download = as_user(app.server.get("/materials/export-csv"), "alice")
        .add_query_param("category", "WO")
        .await;
    assert_eq!(download.status_code(), StatusCode::OK);
    let csv = download.text();
    assert!(csv.contains(",Wood,Larch,"));
    assert!(!csv.contains("Cork Board"));

    Ok(())
}

#[tokio::test]
async fn test_export_csv() -> Result<()> {
    let app = setup_test_server().await?;

    let empty = as_user(app.server.get("/materials/export-csv"), "alice").await;
    let body: Value = empty.json();
    assert_eq!(body["message"], "No data to export");

    as_user(app.server.post("/create-material/"), "alice")
        .form(&[
            ("name", "Cork Board"),
            ("conductivity", "0.04"),
            ("emissivity", "0.9"),
            ("category", "IN"),
        ])
        .await;

    let htmx = as_user(app.server.get("/materials/export-csv"), "alice")
        .add_header(HeaderName::from_static("hx-request"), HeaderValue::from_static("true"))
        .await;
    assert_eq!(header_str(&htmx, "hx-redirect").as_deref(), Some("/materials/export-csv"));

    let download = as_user(app.server.get("/materials/export-csv"), "alice").await;
    assert_eq!(download.status_code(), StatusCode::OK);
    let disposition = header_str(&download, "content-disposition").unwrap_or_default();
    assert!(disposition.contains("ph_materials.csv"));
    let csv = download.text();
    assert!(csv.starts_with("unique_id,category,name,conductivity,emissivity,source,comments,color_argb"));
    assert!(csv.contains(",Insulation,Cork Board,0.04,0.9,"));

    Ok(())
}

#[tokio::test]
async fn test_set_unit_system_redirects_with_filter() -> Result<()> {
    let app = setup_test_server().await?;

    let response = app
        .server
        .post("/materials/set-unit-system")
        .form(&[("unit-system", "IP"), ("category", "IN")])
        .await;

    assert_eq!(response.status_code(), StatusCode::SEE_OTHER);
    assert_eq!(
        header_str(&response, "location").as_deref(),
        Some("/get-materials?category=IN")
    );
    let cookie = header_str(&response, "set-cookie").unwrap_or_default();
    assert!(cookie.starts_with("unit_system=IP"));

    let cleared = app
        .server
        .post("/materials/set-unit-system")
        .form(&[("category", "IN")])
        .await;
    let cookie = header_str(&cleared, "set-cookie").unwrap_or_default();
    assert!(cookie.starts_with("unit_system=SI"));

    Ok(())
}

#[tokio::test]
async fn test_assembly_editor_flow() -> Result<()> {
    let app = setup_test_server().await?;

    let page = as_user(app.server.get("/assemblies/"), "alice").await;
    assert_eq!(page.status_code(), StatusCode::OK);
    let body = page.text();
    assert!(body.contains("Default Project"));
    assert!(body.contains("unnamed"));

    let project = projects::Entity::find().one(&app.db).await?.expect("default project");
    let assembly = assemblies::Entity::find().one(&app.db).await?.expect("seeded assembly");
    let base = format!("/assemblies/{}/{}", project.id, assembly.id);

    let added = as_user(app.server.post(&format!("{}/add-layer/", base)), "alice").await;
    assert_eq!(added.status_code(), StatusCode::OK);
    assert!(added.text().contains("class=\"layer\""));

    let layer = layers::Entity::find()
        .filter(layers::Column::AssemblyId.eq(assembly.id))
        .all(&app.db)
        .await?
        .into_iter()
        .last()
        .expect("layer added");

    let thickness = as_user(
        app.server
            .post(&format!("{}/update-layer-thickness/{}/", base, layer.id)),
        "alice",
    )
    .form(&[("thickness", "120.5")])
    .await;
    assert_eq!(thickness.text(), "120.5");

    let rejected = as_user(
        app.server
            .post(&format!("{}/update-layer-thickness/{}/", base, layer.id)),
        "alice",
    )
    .form(&[("thickness", "-3")])
    .await;
    assert_eq!(rejected.status_code(), StatusCode::BAD_REQUEST);

    let renamed = as_user(app.server.post(&format!("{}/update-assembly-name", base)), "alice")
        .form(&[("name", "North Wall")])
        .await;
    let body = renamed.text();
    assert!(body.contains("North Wall"));
    assert!(body.contains(&format!("assembly-name-{}", assembly.id)));

    let moved = as_user(app.server.post(&format!("{}/move-layer/{}/", base, layer.id)), "alice")
        .form(&[("direction", "up")])
        .await;
    assert_eq!(moved.status_code(), StatusCode::OK);
    assert!(moved.text().contains("hx-swap-oob"));

    // Another team cannot reach the project
    let intruder = as_user(app.server.get(&format!("{}/", base)), "mallory").await;
    assert_eq!(intruder.status_code(), StatusCode::NOT_FOUND);

    Ok(())
}

#[tokio::test]
async fn test_change_project_returns_oob_fragments() -> Result<()> {
    let app = setup_test_server().await?;
    as_user(app.server.get("/assemblies/"), "alice").await;
    let project = projects::Entity::find().one(&app.db).await?.expect("default project");

    let response = as_user(app.server.get("/assemblies/change-project/"), "alice")
        .add_query_param("project_pk", project.id)
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let body = response.text();
    assert!(body.contains("id=\"assembly-detail\""));
    assert!(body.contains("id=\"assembly-sidebar-add-button\" hx-swap-oob=\"true\""));
    assert!(body.contains("id=\"assembly-sidebar-list\" hx-swap-oob=\"true\""));
    assert!(body.contains(&format!(
        "<span id=\"active-project-uid\" hx-swap-oob=\"true\">{}</span>",
        project.uid
    )));

    Ok(())
}

#[tokio::test]
async fn test_team_invite_flow() -> Result<()> {
    let app = setup_test_server().await?;

    as_user(app.server.post("/account-settings/update-email/"), "bob")
        .form(&[("email", "bob@example.com")])
        .await;

    let invited = as_user(app.server.post("/account-settings/invite-user-to-team/"), "alice")
        .form(&[("user_email", "bob@example.com")])
        .await;
    assert!(invited.text().starts_with("Invited User"));

    let missing = as_user(app.server.post("/account-settings/invite-user-to-team/"), "alice")
        .form(&[("user_email", "nobody@example.com")])
        .await;
    assert!(missing.text().starts_with("Error: User"));

    let joined = as_user(app.server.post("/account-settings/accept-team-invite/"), "bob").await;
    assert!(joined.text().starts_with("Joined Team"));

    let alice = users::Entity::find()
        .filter(users::Column::Username.eq("alice"))
        .one(&app.db)
        .await?
        .expect("alice");
    let bob = users::Entity::find()
        .filter(users::Column::Username.eq("bob"))
        .one(&app.db)
        .await?
        .expect("bob");
    assert_eq!(alice.team_id, bob.team_id);

    let again = as_user(app.server.post("/account-settings/decline-team-invite/"), "bob").await;
    assert_eq!(again.text(), "No Team Invite to accept");

    let left = as_user(app.server.post("/account-settings/leave-team/"), "bob").await;
    assert!(left.text().contains("id=\"teams\""));

    Ok(())
}

#[tokio::test]
async fn test_locked_team_name_is_refused() -> Result<()> {
    let app = setup_test_server().await?;

    let response = as_user(app.server.post("/account-settings/update-team-name/"), "carol")
        .form(&[("team_name", "ADMIN")])
        .await;
    assert_eq!(response.text(), "carol");

    let response = as_user(app.server.post("/account-settings/update-team-name/"), "carol")
        .form(&[("team_name", "Builders")])
        .await;
    assert_eq!(response.text(), "Builders");

    Ok(())
}
