//! Order-list integration tests: concurrent appends, drift and repair

use anyhow::Result;
use portal::database::entities::*;
use portal::database::seed_data::seed_defaults;
use portal::database::setup_database;
use portal::services::ordering::{
    get_ordered_children, load_order, move_child, reconcile, reconcile_all, remove_child, seed_if_empty,
    store_order, ContainerRef, MoveDirection, NewChild, OrderList,
};
use portal::services::{AssemblyService, ProjectService, TeamService};
use sea_orm::{ActiveModelTrait, Database, DatabaseConnection, EntityTrait, Set};

async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = Database::connect("sqlite::memory:").await?;
    setup_database(&db).await?;
    seed_defaults(&db, "public").await?;
    Ok(db)
}

/// A fresh assembly in a fresh project, returned with the service
async fn assembly_fixture(db: &DatabaseConnection) -> Result<(AssemblyService, assemblies::Model)> {
    let user = TeamService::new(db.clone()).resolve_user("frank").await?;
    let project = ProjectService::new(db.clone()).create_project(&user, "Ordering").await?;
    let service = AssemblyService::new(db.clone());
    let assembly = service.add_assembly(&user, project.id, "Wall").await?;
    Ok((service, assembly))
}

#[tokio::test]
async fn test_concurrent_add_layer_keeps_both() -> Result<()> {
    let db = setup_test_db().await?;
    let (service, assembly) = assembly_fixture(&db).await?;

    let (first, second) = tokio::join!(service.add_layer(assembly.id), service.add_layer(assembly.id));
    let (first, second) = (first?, second?);

    let (order, version) = load_order(&db, ContainerRef::assembly(assembly.id)).await?;
    assert_eq!(order.len(), 2);
    assert!(order.contains(first.id));
    assert!(order.contains(second.id));
    assert_eq!(version, 2);

    let detail = service.assembly_detail(assembly).await?;
    assert_eq!(detail.layers.len(), 2);
    for layer in &detail.layers {
        assert_eq!(layer.segments.len(), 1);
    }
    Ok(())
}

#[tokio::test]
async fn test_read_tolerates_drift_and_reconcile_repairs_it() -> Result<()> {
    let db = setup_test_db().await?;
    let (service, assembly) = assembly_fixture(&db).await?;
    let listed = service.add_layer(assembly.id).await?;

    // A layer row nobody listed, and a listed id with no row
    let stray = layers::ActiveModel {
        assembly_id: Set(assembly.id),
        thickness_mm: Set(25.0),
        segment_id_order: Set("[]".to_string()),
        order_version: Set(0),
        ..Default::default()
    }
    .insert(&db)
    .await?;
    let current = assemblies::Entity::find_by_id(assembly.id)
        .one(&db)
        .await?
        .expect("assembly exists");
    let mut active: assemblies::ActiveModel = current.into();
    active.layer_id_order = Set(format!("[{}, 9999]", listed.id));
    active.update(&db).await?;

    let ordered = get_ordered_children::<layers::Model, _>(&db, assembly.id).await?;
    let ids: Vec<i32> = ordered.children.iter().map(|l| l.id).collect();
    assert_eq!(ids, vec![listed.id]);
    assert_eq!(ordered.drift.dangling, vec![9999]);
    assert_eq!(ordered.drift.unlisted, vec![stray.id]);

    let repaired = reconcile(&db, ContainerRef::assembly(assembly.id)).await?;
    assert!(!repaired.is_clean());
    let (order, _) = load_order(&db, ContainerRef::assembly(assembly.id)).await?;
    assert_eq!(order.ids(), &[listed.id, stray.id]);

    // Nothing left to repair anywhere
    assert_eq!(reconcile_all(&db).await?, 0);
    Ok(())
}

#[tokio::test]
async fn test_move_at_the_edges_is_a_no_op() -> Result<()> {
    let db = setup_test_db().await?;
    let (service, assembly) = assembly_fixture(&db).await?;
    let top = service.add_layer(assembly.id).await?;
    let bottom = service.add_layer(assembly.id).await?;
    let container = ContainerRef::assembly(assembly.id);

    assert!(!move_child(&db, container, top.id, MoveDirection::Up).await?);
    assert!(!move_child(&db, container, bottom.id, MoveDirection::Down).await?);
    assert!(move_child(&db, container, top.id, MoveDirection::Down).await?);

    let (order, _) = load_order(&db, container).await?;
    assert_eq!(order.ids(), &[bottom.id, top.id]);
    Ok(())
}

#[tokio::test]
async fn test_remove_foreign_child_is_not_found() -> Result<()> {
    let db = setup_test_db().await?;
    let (service, assembly) = assembly_fixture(&db).await?;
    let layer = service.add_layer(assembly.id).await?;

    let err = remove_child(&db, ContainerRef::assembly(assembly.id + 1), layer.id)
        .await
        .unwrap_err();
    assert!(err.is_not_found());

    let (order, _) = load_order(&db, ContainerRef::assembly(assembly.id)).await?;
    assert_eq!(order.ids(), &[layer.id]);
    Ok(())
}

#[tokio::test]
async fn test_overlapping_first_views_seed_one_layer() -> Result<()> {
    let db = setup_test_db().await?;
    let (service, assembly) = assembly_fixture(&db).await?;

    let (first, second) = tokio::join!(
        service.assembly_detail(assembly.clone()),
        service.assembly_detail(assembly.clone())
    );
    let (first, second) = (first?, second?);
    assert_eq!(first.layers.len(), 1);
    assert_eq!(second.layers.len(), 1);
    assert_eq!(first.layers[0].layer.id, second.layers[0].layer.id);

    let (order, _) = load_order(&db, ContainerRef::assembly(assembly.id)).await?;
    assert_eq!(order.len(), 1);
    assert_eq!(layers::Entity::find().all(&db).await?.len(), 1);
    assert_eq!(layer_segments::Entity::find().all(&db).await?.len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_overlapping_project_views_seed_one_assembly() -> Result<()> {
    let db = setup_test_db().await?;
    let user = TeamService::new(db.clone()).resolve_user("gina").await?;
    let project = ProjectService::new(db.clone()).create_project(&user, "Empty").await?;
    let service = AssemblyService::new(db.clone());

    let (first, second) = tokio::join!(
        service.project_assemblies(&user, &project),
        service.project_assemblies(&user, &project)
    );
    assert_eq!(first?.len(), 1);
    assert_eq!(second?.len(), 1);

    let (order, _) = load_order(&db, ContainerRef::project(project.id)).await?;
    assert_eq!(order.len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_seed_if_empty_leaves_populated_container_alone() -> Result<()> {
    let db = setup_test_db().await?;
    let (service, assembly) = assembly_fixture(&db).await?;
    let existing = service.add_layer(assembly.id).await?;

    let seeded = seed_if_empty::<layers::Model>(&db, assembly.id, NewChild::Layer { thickness_mm: 10.0 }).await?;
    assert_eq!(seeded, None);

    let (order, version) = load_order(&db, ContainerRef::assembly(assembly.id)).await?;
    assert_eq!(order.ids(), &[existing.id]);
    assert_eq!(version, 1);

    // A container holding the wrong kind of child is refused
    let err = seed_if_empty::<layers::Model>(&db, assembly.id, NewChild::Segment { material_id: None })
        .await
        .unwrap_err();
    assert!(!err.is_not_found());
    Ok(())
}

#[tokio::test]
async fn test_new_layer_lists_its_segment_and_stale_writes_lose() -> Result<()> {
    let db = setup_test_db().await?;
    let (service, assembly) = assembly_fixture(&db).await?;
    let layer = service.add_layer(assembly.id).await?;
    let container = ContainerRef::layer(layer.id);

    let (order, version) = load_order(&db, container).await?;
    assert_eq!(order.len(), 1);
    assert_eq!(version, 1);

    // A writer still holding version 0 must not overwrite the list
    assert!(!store_order(&db, container, &OrderList::new(vec![]), 0).await?);
    let (after, _) = load_order(&db, container).await?;
    assert_eq!(after, order);
    Ok(())
}
