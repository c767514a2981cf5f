pub mod app;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod views;

use clap::Subcommand;

#[derive(Subcommand, Debug)]
pub enum MigrateDirection {
    Up,
    Down,
    Fresh,
}

use crate::config::ServerConfig;
use crate::database::{connection::*, migrations::Migrator, seed_data};
use anyhow::{Context, Result};
use sea_orm::DatabaseConnection;
use sea_orm_migration::prelude::*;
use tracing::info;

/// Connect and bring the schema up to date.
pub async fn open_database(database_path: &str) -> Result<DatabaseConnection> {
    let database_url = get_database_url(Some(database_path));
    let db = establish_connection(&database_url)
        .await
        .with_context(|| format!("Failed to open database '{}'", database_path))?;
    Migrator::up(&db, None).await?;
    info!("Database migrations completed");
    Ok(db)
}

pub async fn start_server(port: u16, database_path: &str, config: ServerConfig) -> Result<()> {
    let db = open_database(database_path).await?;
    seed_data::seed_defaults(&db, &config.public_owner).await?;

    if let Some(dev_user) = &config.dev_user {
        info!("Requests without an identity header run as '{}'", dev_user);
    }
    let app = app::create_app(db, config).await?;

    log_routes();

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;
    info!("Server running on http://0.0.0.0:{}", port);

    axum::serve(listener, app).await?;

    Ok(())
}

fn log_routes() {
    info!("Endpoints:");
    info!("  /health                     - Health check");
    info!("  /materials/                 - Material catalog, CSV import/export");
    info!("  /assemblies/                - Projects, assemblies and layers");
    info!("  /account-settings/          - Profile and team");
}

pub async fn migrate_database(database_path: &str, direction: MigrateDirection) -> Result<()> {
    let database_url = get_database_url(Some(database_path));
    let db = establish_connection(&database_url).await?;

    info!("Running migrations {:?} on {}", direction, database_path);
    match direction {
        MigrateDirection::Up => Migrator::up(&db, None).await?,
        MigrateDirection::Down => Migrator::down(&db, None).await?,
        // Drops every table, so all data is lost
        MigrateDirection::Fresh => Migrator::fresh(&db).await?,
    }

    info!("Database migration completed");
    Ok(())
}
