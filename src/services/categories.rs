//! Material category enumeration and canonical-row resolution.

use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, Set,
};
use tracing::{debug, info};

use crate::database::entities::{material_categories, materials};
use crate::errors::MaterialError;

/// Every valid category, as (code, label), in code order.
pub static CATEGORIES: &[(&str, &str)] = &[
    ("AR", "Air"),
    ("BR", "Brick & Masonry"),
    ("CO", "Concrete"),
    ("GL", "Glass"),
    ("GY", "Gypsum & Plaster"),
    ("IN", "Insulation"),
    ("ME", "Metal"),
    ("MM", "Membrane"),
    ("OT", "Other"),
    ("PL", "Plastic"),
    ("SO", "Soil & Stone"),
    ("WO", "Wood"),
];

pub fn label_for_code(code: &str) -> Option<&'static str> {
    CATEGORIES
        .iter()
        .find(|(c, _)| c.eq_ignore_ascii_case(code.trim()))
        .map(|(_, label)| *label)
}

/// Resolve a label (or a code) to its canonical code, ignoring case.
pub fn code_for_label(label: &str) -> Option<&'static str> {
    let label = label.trim();
    CATEGORIES
        .iter()
        .find(|(code, l)| l.eq_ignore_ascii_case(label) || code.eq_ignore_ascii_case(label))
        .map(|(code, _)| *code)
}

/// The static spelling of `code`, if it is in the enumeration.
pub fn canonical_code(code: &str) -> Option<&'static str> {
    CATEGORIES
        .iter()
        .find(|(c, _)| c.eq_ignore_ascii_case(code.trim()))
        .map(|(c, _)| *c)
}

pub fn is_valid_code(code: &str) -> bool {
    canonical_code(code).is_some()
}

/// Fetch the canonical row for `code`, creating it when missing.
///
/// When several rows carry the same code the lowest id wins: materials on the
/// other rows are re-pointed to it and the extra rows are deleted.
pub async fn canonical_category<C: ConnectionTrait>(
    conn: &C,
    code: &str,
) -> Result<material_categories::Model, MaterialError> {
    let code = canonical_code(code)
        .ok_or_else(|| MaterialError::UnknownCategory(code.to_string()))?;

    let mut rows = material_categories::Entity::find()
        .filter(material_categories::Column::Category.eq(code))
        .order_by_asc(material_categories::Column::Id)
        .all(conn)
        .await?;

    if rows.is_empty() {
        info!("Creating material category {}", code);
        let row = material_categories::ActiveModel {
            category: Set(code.to_string()),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(conn)
        .await?;
        return Ok(row);
    }

    let canonical = rows.remove(0);
    if !rows.is_empty() {
        let duplicate_ids: Vec<i32> = rows.iter().map(|r| r.id).collect();
        debug!(
            "Coalescing category {} rows {:?} into {}",
            code, duplicate_ids, canonical.id
        );

        materials::Entity::update_many()
            .col_expr(materials::Column::CategoryId, Expr::value(canonical.id))
            .filter(materials::Column::CategoryId.is_in(duplicate_ids.clone()))
            .exec(conn)
            .await?;
        material_categories::Entity::delete_many()
            .filter(material_categories::Column::Id.is_in(duplicate_ids))
            .exec(conn)
            .await?;
    }

    Ok(canonical)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::test_utils::setup_test_db;
    use sea_orm::PaginatorTrait;

    #[test]
    fn test_label_lookup_ignores_case() {
        assert_eq!(label_for_code("in"), Some("Insulation"));
        assert_eq!(label_for_code("WO"), Some("Wood"));
        assert_eq!(label_for_code("XX"), None);
    }

    #[test]
    fn test_code_lookup_accepts_labels_and_codes() {
        assert_eq!(code_for_label("Insulation"), Some("IN"));
        assert_eq!(code_for_label("brick & masonry"), Some("BR"));
        assert_eq!(code_for_label("gy"), Some("GY"));
        assert_eq!(code_for_label("Styrofoam"), None);
    }

    #[test]
    fn test_enumeration_is_sorted_and_unique() {
        let codes: Vec<&str> = CATEGORIES.iter().map(|(c, _)| *c).collect();
        let mut sorted = codes.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(codes, sorted);
    }

    #[tokio::test]
    async fn test_canonical_category_rejects_unknown_code() {
        let db = setup_test_db().await;
        let err = canonical_category(&db, "ZZ").await.unwrap_err();
        assert!(matches!(err, MaterialError::UnknownCategory(_)));
    }

    #[tokio::test]
    async fn test_canonical_category_coalesces_duplicates() {
        let db = setup_test_db().await;
        let first = canonical_category(&db, "ME").await.unwrap();

        let duplicate = material_categories::ActiveModel {
            category: Set("ME".to_string()),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(&db)
        .await
        .unwrap();
        assert!(duplicate.id > first.id);

        let resolved = canonical_category(&db, "me").await.unwrap();
        assert_eq!(resolved.id, first.id);

        let remaining = material_categories::Entity::find()
            .filter(material_categories::Column::Category.eq("ME"))
            .count(&db)
            .await
            .unwrap();
        assert_eq!(remaining, 1);
    }
}
