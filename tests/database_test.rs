//! Database functionality tests
//!
//! Schema, startup seeding, cascades and the purge command

use anyhow::Result;
use chrono::Utc;
use portal::database::entities::*;
use portal::database::maintenance::{purge, PurgeTarget};
use portal::database::seed_data::{seed_defaults, seed_sample_materials};
use portal::database::setup_database;
use portal::services::{AssemblyService, ProjectService, TeamService};
use sea_orm::{ActiveModelTrait, ColumnTrait, Database, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter, Set};
use tempfile::NamedTempFile;

/// File-backed database with migrations applied and defaults seeded
async fn setup_test_db() -> Result<(DatabaseConnection, NamedTempFile)> {
    let temp_file = NamedTempFile::new()?;
    let db_url = format!("sqlite://{}?mode=rwc", temp_file.path().display());

    let db = Database::connect(&db_url).await?;
    setup_database(&db).await?;
    seed_defaults(&db, "public").await?;

    Ok((db, temp_file))
}

#[tokio::test]
async fn test_seed_defaults_is_idempotent() -> Result<()> {
    let (db, _temp_file) = setup_test_db().await?;
    seed_defaults(&db, "public").await?;

    let team_names: Vec<String> = teams::Entity::find()
        .all(&db)
        .await?
        .into_iter()
        .map(|t| t.name)
        .collect();
    assert_eq!(team_names.len(), 2);
    assert!(team_names.contains(&"PUBLIC".to_string()));
    assert!(team_names.contains(&"ADMIN".to_string()));

    let owners = users::Entity::find()
        .filter(users::Column::Username.eq("public"))
        .count(&db)
        .await?;
    assert_eq!(owners, 1);

    let categories = material_categories::Entity::find().count(&db).await?;
    assert_eq!(categories, 12);

    Ok(())
}

#[tokio::test]
async fn test_sample_materials_skip_existing() -> Result<()> {
    let (db, _temp_file) = setup_test_db().await?;

    let added = seed_sample_materials(&db, "public").await?;
    assert!(added > 0);
    let again = seed_sample_materials(&db, "public").await?;
    assert_eq!(again, 0);

    let total = materials::Entity::find().count(&db).await?;
    assert_eq!(total as usize, added);

    Ok(())
}

#[tokio::test]
async fn test_deleting_assembly_cascades_to_layers_and_segments() -> Result<()> {
    let (db, _temp_file) = setup_test_db().await?;
    let user = TeamService::new(db.clone()).resolve_user("erin").await?;
    let project = ProjectService::new(db.clone()).create_project(&user, "Cabin").await?;
    let service = AssemblyService::new(db.clone());

    let assembly = service.add_assembly(&user, project.id, "Wall").await?;
    service.add_layer(assembly.id).await?;
    service.add_layer(assembly.id).await?;
    assert_eq!(layers::Entity::find().count(&db).await?, 2);
    assert_eq!(layer_segments::Entity::find().count(&db).await?, 2);

    service.delete_assembly(project.id, assembly.id).await?;
    assert_eq!(layers::Entity::find().count(&db).await?, 0);
    assert_eq!(layer_segments::Entity::find().count(&db).await?, 0);

    Ok(())
}

#[tokio::test]
async fn test_deleting_material_clears_segment_reference() -> Result<()> {
    let (db, _temp_file) = setup_test_db().await?;
    let user = TeamService::new(db.clone()).resolve_user("erin").await?;
    let project = ProjectService::new(db.clone()).create_project(&user, "Cabin").await?;
    let service = AssemblyService::new(db.clone());
    let assembly = service.add_assembly(&user, project.id, "Wall").await?;
    let layer = service.add_layer(assembly.id).await?;

    let category = material_categories::Entity::find()
        .filter(material_categories::Column::Category.eq("WO"))
        .one(&db)
        .await?
        .expect("WO category seeded");
    let now = Utc::now();
    let material = materials::ActiveModel {
        unique_id: Set("pine01".to_string()),
        name: Set("Pine".to_string()),
        conductivity: Set(0.13),
        emissivity: Set(0.9),
        category_id: Set(category.id),
        user_id: Set(Some(user.id)),
        source: Set(String::new()),
        comments: Set(String::new()),
        color_argb: Set(String::new()),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(&db)
    .await?;

    let detail = service.layer_detail(layer.clone()).await?;
    let segment_id = detail.segments[0].segment.id;
    service.set_segment_material(layer.id, segment_id, Some(material.id)).await?;

    materials::Entity::delete_by_id(material.id).exec(&db).await?;
    let segment = layer_segments::Entity::find_by_id(segment_id)
        .one(&db)
        .await?
        .expect("segment survives");
    assert_eq!(segment.material_id, None);

    Ok(())
}

#[tokio::test]
async fn test_purge_layers_leaves_assemblies() -> Result<()> {
    let (db, _temp_file) = setup_test_db().await?;
    let user = TeamService::new(db.clone()).resolve_user("erin").await?;
    let project = ProjectService::new(db.clone()).create_project(&user, "Cabin").await?;
    let service = AssemblyService::new(db.clone());
    let assembly = service.add_assembly(&user, project.id, "Wall").await?;
    service.add_layer(assembly.id).await?;

    let removed = purge(&db, PurgeTarget::Layers, "public").await?;
    assert_eq!(removed, 1);
    assert_eq!(assemblies::Entity::find().count(&db).await?, 1);

    // The next view seeds a fresh layer
    let detail = service.assembly_detail(assembly).await?;
    assert_eq!(detail.layers.len(), 1);

    Ok(())
}
