//! CSV export and import of materials.
//!
//! Columns: `unique_id, category, name, conductivity, emissivity, source,
//! comments, color_argb`. The category column carries the label ("Insulation"),
//! not the code. Import is all-or-nothing: every row is checked first and a
//! single bad row means nothing is written.

use std::collections::HashSet;

use chrono::Utc;
use csv::{ReaderBuilder, Writer};
use once_cell::sync::Lazy;
use regex::Regex;
use sea_orm::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::database::entities::{materials, users};
use crate::errors::{ImportExportError, ImportExportResult, RowError};
use crate::services::categories;
use crate::services::material_service::{MaterialFields, MaterialInput, MaterialWithCategory};

pub const EXPORT_FILENAME: &str = "ph_materials.csv";

static UNIQUE_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9a-f]{6}$").expect("unique id pattern is valid"));

pub const CSV_HEADERS: [&str; 8] = [
    "unique_id",
    "category",
    "name",
    "conductivity",
    "emissivity",
    "source",
    "comments",
    "color_argb",
];

/// One CSV row as read from a file.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct CsvMaterialRow {
    #[serde(default)]
    pub unique_id: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub conductivity: String,
    #[serde(default)]
    pub emissivity: String,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub comments: String,
    #[serde(default)]
    pub color_argb: String,
}

impl CsvMaterialRow {
    fn to_input(&self, category_code: &str) -> MaterialInput {
        MaterialInput {
            name: self.name.clone(),
            conductivity: self.conductivity.clone(),
            emissivity: self.emissivity.clone(),
            category: category_code.to_string(),
            source: self.source.clone(),
            comments: self.comments.clone(),
            color_argb: self.color_argb.clone(),
        }
    }
}

/// Render materials as CSV text, header included.
pub fn export_materials(rows: &[MaterialWithCategory]) -> ImportExportResult<String> {
    let mut wtr = Writer::from_writer(vec![]);
    wtr.write_record(CSV_HEADERS)?;

    for row in rows {
        let m = &row.material;
        let label = categories::label_for_code(&row.category).unwrap_or(row.category.as_str());
        let conductivity = m.conductivity.to_string();
        let emissivity = m.emissivity.to_string();
        wtr.write_record([
            m.unique_id.as_str(),
            label,
            m.name.as_str(),
            conductivity.as_str(),
            emissivity.as_str(),
            m.source.as_str(),
            m.comments.as_str(),
            m.color_argb.as_str(),
        ])?;
    }

    let data = wtr
        .into_inner()
        .map_err(|e| ImportExportError::ExportFailed(e.to_string()))?;
    String::from_utf8(data).map_err(|e| ImportExportError::ExportFailed(e.to_string()))
}

/// Read CSV text into rows. Line numbers in errors count the header as line 1.
pub fn parse_rows(content: &str) -> ImportExportResult<Vec<CsvMaterialRow>> {
    let mut reader = ReaderBuilder::new()
        .trim(csv::Trim::Headers)
        .flexible(true)
        .from_reader(content.trim_start_matches('\u{feff}').as_bytes());
    let mut rows = Vec::new();
    for record in reader.deserialize::<CsvMaterialRow>() {
        rows.push(record?);
    }
    Ok(rows)
}

/// A row that passed the dry run.
#[derive(Debug, Clone)]
struct CheckedRow {
    unique_id: Option<String>,
    fields: MaterialFields,
}

/// Dry-run verdict for one row.
#[derive(Debug, Clone)]
enum RowCheck {
    Write(CheckedRow),
    /// A shared catalog entry the user may read but not change
    Skip(String),
    Reject(String),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub created: usize,
    pub updated: usize,
    pub skipped: usize,
}

impl ImportSummary {
    pub fn total(&self) -> usize {
        self.created + self.updated
    }
}

pub struct CsvService {
    db: DatabaseConnection,
    public_owner: String,
}

impl CsvService {
    pub fn new(db: DatabaseConnection, public_owner: impl Into<String>) -> Self {
        Self {
            db,
            public_owner: public_owner.into(),
        }
    }

    async fn public_owner_id(&self) -> ImportExportResult<Option<i32>> {
        Ok(users::Entity::find()
            .filter(users::Column::Username.eq(self.public_owner.as_str()))
            .one(&self.db)
            .await?
            .map(|u| u.id))
    }

    /// Validate every row without writing. Collects one error per bad row;
    /// the second value counts rows left alone.
    async fn dry_run(
        &self,
        user: &users::Model,
        rows: &[CsvMaterialRow],
    ) -> ImportExportResult<Result<(Vec<CheckedRow>, usize), Vec<RowError>>> {
        let public_id = self.public_owner_id().await?;
        let mut checked = Vec::with_capacity(rows.len());
        let mut skipped = 0;
        let mut errors = Vec::new();
        let mut seen_ids = HashSet::new();

        for (index, row) in rows.iter().enumerate() {
            let line = index + 2;
            match self.check_row(user, public_id, row, &mut seen_ids).await? {
                RowCheck::Write(valid) => checked.push(valid),
                RowCheck::Skip(unique_id) => {
                    debug!("Import row {} skipped: shared material '{}'", line, unique_id);
                    skipped += 1;
                }
                RowCheck::Reject(message) => {
                    warn!("Import row {} rejected: {}", line, message);
                    errors.push(RowError { line, message });
                }
            }
        }

        if errors.is_empty() {
            Ok(Ok((checked, skipped)))
        } else {
            Ok(Err(errors))
        }
    }

    async fn check_row(
        &self,
        user: &users::Model,
        public_id: Option<i32>,
        row: &CsvMaterialRow,
        seen_ids: &mut HashSet<String>,
    ) -> ImportExportResult<RowCheck> {
        let Some(code) = categories::code_for_label(&row.category) else {
            return Ok(RowCheck::Reject(format!("Unknown category '{}'", row.category.trim())));
        };

        let fields = match row.to_input(code).validate() {
            Ok(fields) => fields,
            Err(errors) => return Ok(RowCheck::Reject(errors.to_string())),
        };

        let unique_id = row.unique_id.trim().to_lowercase();
        if unique_id.is_empty() {
            return Ok(RowCheck::Write(CheckedRow { unique_id: None, fields }));
        }
        if !UNIQUE_ID.is_match(&unique_id) {
            return Ok(RowCheck::Reject(format!("Invalid unique_id '{}'", row.unique_id.trim())));
        }
        if !seen_ids.insert(unique_id.clone()) {
            return Ok(RowCheck::Reject(format!("Duplicate unique_id '{}' in file", unique_id)));
        }

        let existing = materials::Entity::find()
            .filter(materials::Column::UniqueId.eq(unique_id.as_str()))
            .one(&self.db)
            .await?;
        if let Some(existing) = existing {
            if existing.user_id != Some(user.id) {
                // Shared catalog rows are left as they are
                if public_id.is_some() && existing.user_id == public_id {
                    return Ok(RowCheck::Skip(unique_id));
                }
                return Ok(RowCheck::Reject(format!("Material '{}' belongs to another user", unique_id)));
            }
        }

        Ok(RowCheck::Write(CheckedRow {
            unique_id: Some(unique_id),
            fields,
        }))
    }

    /// Import CSV text for `user`. Rows whose unique id already exists are
    /// updated in place; the rest are created.
    pub async fn import_materials(&self, user: &users::Model, content: &str) -> ImportExportResult<ImportSummary> {
        let rows = parse_rows(content)?;
        let (checked, skipped) = self
            .dry_run(user, &rows)
            .await?
            .map_err(ImportExportError::RowErrors)?;

        let txn = self.db.begin().await?;
        let mut summary = ImportSummary {
            skipped,
            ..Default::default()
        };
        for row in checked {
            let category = categories::canonical_category(&txn, row.fields.category).await?;
            let existing = match &row.unique_id {
                Some(uid) => {
                    materials::Entity::find()
                        .filter(materials::Column::UniqueId.eq(uid.as_str()))
                        .one(&txn)
                        .await?
                }
                None => None,
            };

            let now = Utc::now();
            let fields = row.fields;
            match existing {
                Some(existing) => {
                    let mut active: materials::ActiveModel = existing.into();
                    active.name = Set(fields.name);
                    active.conductivity = Set(fields.conductivity);
                    active.emissivity = Set(fields.emissivity);
                    active.category_id = Set(category.id);
                    active.source = Set(fields.source);
                    active.comments = Set(fields.comments);
                    active.color_argb = Set(fields.color_argb);
                    active.updated_at = Set(now);
                    active.update(&txn).await?;
                    summary.updated += 1;
                }
                None => {
                    materials::ActiveModel {
                        unique_id: Set(row.unique_id.unwrap_or_else(materials::generate_unique_id)),
                        name: Set(fields.name),
                        conductivity: Set(fields.conductivity),
                        emissivity: Set(fields.emissivity),
                        category_id: Set(category.id),
                        user_id: Set(Some(user.id)),
                        source: Set(fields.source),
                        comments: Set(fields.comments),
                        color_argb: Set(fields.color_argb),
                        created_at: Set(now),
                        updated_at: Set(now),
                        ..Default::default()
                    }
                    .insert(&txn)
                    .await?;
                    summary.created += 1;
                }
            }
        }
        txn.commit().await?;

        info!(
            "User {} imported {} materials ({} new, {} updated, {} shared left alone)",
            user.username,
            summary.total(),
            summary.created,
            summary.updated,
            summary.skipped
        );
        Ok(summary)
    }
}
