//! Bulk clean-up operations behind the `db purge` command.

use anyhow::Result;
use clap::ValueEnum;
use sea_orm::sea_query::Expr;
use sea_orm::*;
use tracing::info;

use crate::database::entities::{
    assemblies, layer_segments, layers, materials, projects, teams, users,
};

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum PurgeTarget {
    Materials,
    Assemblies,
    Layers,
    Segments,
    Users,
}

/// Delete every row of the target kind and return the number removed.
///
/// Containers keep their order lists; the next read skips the dangling ids and
/// `db reconcile` clears them.
pub async fn purge(db: &DatabaseConnection, target: PurgeTarget, public_owner: &str) -> Result<u64> {
    let removed = match target {
        PurgeTarget::Materials => materials::Entity::delete_many().exec(db).await?.rows_affected,
        PurgeTarget::Assemblies => {
            let removed = assemblies::Entity::delete_many().exec(db).await?.rows_affected;
            projects::Entity::update_many()
                .col_expr(projects::Column::AssemblyIdOrder, Expr::value("[]"))
                .exec(db)
                .await?;
            removed
        }
        PurgeTarget::Layers => {
            let removed = layers::Entity::delete_many().exec(db).await?.rows_affected;
            assemblies::Entity::update_many()
                .col_expr(assemblies::Column::LayerIdOrder, Expr::value("[]"))
                .exec(db)
                .await?;
            removed
        }
        PurgeTarget::Segments => {
            let removed = layer_segments::Entity::delete_many().exec(db).await?.rows_affected;
            layers::Entity::update_many()
                .col_expr(layers::Column::SegmentIdOrder, Expr::value("[]"))
                .exec(db)
                .await?;
            removed
        }
        PurgeTarget::Users => {
            // The public owner and the locked teams survive
            let removed = users::Entity::delete_many()
                .filter(users::Column::Username.ne(public_owner))
                .exec(db)
                .await?
                .rows_affected;
            teams::Entity::delete_many()
                .filter(teams::Column::Name.is_not_in([teams::PUBLIC_TEAM, teams::ADMIN_TEAM]))
                .exec(db)
                .await?;
            removed
        }
    };

    info!("Purged {} {:?}", removed, target);
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::test_utils::setup_test_db;
    use crate::services::assembly_service::AssemblyService;
    use crate::services::project_service::ProjectService;
    use crate::services::team_service::TeamService;

    #[tokio::test]
    async fn test_purge_layers_clears_order_lists() {
        let db = setup_test_db().await;
        let user = TeamService::new(db.clone()).resolve_user("alice").await.unwrap();
        let project = ProjectService::new(db.clone())
            .create_project(&user, "Purge")
            .await
            .unwrap();
        let service = AssemblyService::new(db.clone());
        let assembly = service.add_assembly(&user, project.id, "wall").await.unwrap();
        service.add_layer(assembly.id).await.unwrap();

        let removed = purge(&db, PurgeTarget::Layers, "public").await.unwrap();
        assert_eq!(removed, 1);

        let assembly = assemblies::Entity::find_by_id(assembly.id)
            .one(&db)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(assembly.layer_id_order, "[]");
        assert_eq!(layer_segments::Entity::find().count(&db).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_purge_users_keeps_public_owner() {
        let db = setup_test_db().await;
        TeamService::new(db.clone()).resolve_user("bob").await.unwrap();

        let removed = purge(&db, PurgeTarget::Users, "public").await.unwrap();
        assert_eq!(removed, 1);

        let remaining = users::Entity::find().all(&db).await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].username, "public");
        let teams = teams::Entity::find().count(&db).await.unwrap();
        assert_eq!(teams, 2);
    }
}
