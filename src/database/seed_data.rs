use anyhow::Result;
use chrono::Utc;
use sea_orm::*;
use tracing::info;

use crate::database::entities::{
    material_categories, materials, teams, users,
};
use crate::services::categories::{self, CATEGORIES};

/// Rows every installation needs: the locked teams, the public pseudo-owner
/// whose materials every user can see, and one row per category code.
///
/// Safe to run on every startup. Returns the public owner.
pub async fn seed_defaults(db: &DatabaseConnection, public_owner: &str) -> Result<users::Model> {
    let public_team = get_or_create_team(db, teams::PUBLIC_TEAM, "The default Public Team").await?;
    get_or_create_team(db, teams::ADMIN_TEAM, "The default Admin Team").await?;

    let owner = match users::Entity::find()
        .filter(users::Column::Username.eq(public_owner))
        .one(db)
        .await?
    {
        Some(owner) => owner,
        None => {
            info!("Creating public material owner '{}'", public_owner);
            let mut owner = users::ActiveModel::new(public_owner);
            owner.team_id = Set(Some(public_team.id));
            owner.insert(db).await?
        }
    };

    for (code, _) in CATEGORIES {
        categories::canonical_category(db, code).await?;
    }

    Ok(owner)
}

async fn get_or_create_team(
    db: &DatabaseConnection,
    name: &str,
    description: &str,
) -> Result<teams::Model> {
    if let Some(team) = teams::Entity::find()
        .filter(teams::Column::Name.eq(name))
        .one(db)
        .await?
    {
        return Ok(team);
    }

    info!("Creating team '{}'", name);
    let team = teams::ActiveModel {
        name: Set(name.to_string()),
        description: Set(Some(description.to_string())),
        created_by: Set(None),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await?;

    Ok(team)
}

/// Insert a small reference set of public materials. Skips any unique id that
/// already exists, so re-running is harmless.
pub async fn seed_sample_materials(db: &DatabaseConnection, public_owner: &str) -> Result<usize> {
    let owner = seed_defaults(db, public_owner).await?;

    let samples = vec![
        ("a0b1c2", "IN", "Mineral Wool Batt", 0.035, 0.9, "255,230,210,120"),
        ("a0b1c3", "IN", "EPS Board", 0.032, 0.9, "255,245,245,245"),
        ("a0b1c4", "IN", "Wood Fibre Board", 0.042, 0.9, "255,170,130,80"),
        ("a0b1c5", "CO", "Reinforced Concrete", 2.3, 0.9, "255,160,160,160"),
        ("a0b1c6", "BR", "Solid Clay Brick", 0.77, 0.93, "255,170,70,50"),
        ("a0b1c7", "GY", "Gypsum Board", 0.25, 0.9, "255,235,235,235"),
        ("a0b1c8", "WO", "Softwood Timber", 0.13, 0.9, "255,200,160,100"),
        ("a0b1c9", "WO", "OSB", 0.13, 0.9, "255,210,170,110"),
        ("a0b1ca", "ME", "Steel", 50.0, 0.3, "255,120,120,130"),
        ("a0b1cb", "AR", "Still Air", 0.025, 0.9, "255,220,240,255"),
    ];

    let mut created = 0;
    for (unique_id, code, name, conductivity, emissivity, color) in samples {
        let exists = materials::Entity::find()
            .filter(materials::Column::UniqueId.eq(unique_id))
            .one(db)
            .await?
            .is_some();
        if exists {
            continue;
        }

        let category: material_categories::Model = categories::canonical_category(db, code).await?;
        let now = Utc::now();
        materials::ActiveModel {
            unique_id: Set(unique_id.to_string()),
            name: Set(name.to_string()),
            conductivity: Set(conductivity),
            emissivity: Set(emissivity),
            category_id: Set(category.id),
            user_id: Set(Some(owner.id)),
            source: Set("Reference values".to_string()),
            comments: Set(String::new()),
            color_argb: Set(color.to_string()),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(db)
        .await?;
        created += 1;
    }

    info!("Seeded {} sample materials", created);
    Ok(created)
}
