use sea_orm::{Database, DatabaseConnection};

use crate::database::seed_data::seed_defaults;

/// In-memory database with the schema applied and the default rows seeded.
pub async fn setup_test_db() -> DatabaseConnection {
    let db = Database::connect("sqlite::memory:")
        .await
        .expect("Failed to connect to test database");

    use sea_orm_migration::MigratorTrait;
    crate::database::migrations::Migrator::up(&db, None)
        .await
        .expect("Failed to run migrations");

    seed_defaults(&db, "public")
        .await
        .expect("Failed to seed defaults");

    db
}
