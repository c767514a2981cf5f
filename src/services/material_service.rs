use chrono::Utc;
use sea_orm::sea_query::{Expr, Func, SimpleExpr};
use sea_orm::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::database::entities::{material_categories, materials, users};
use crate::errors::{FieldErrors, MaterialError, MaterialResult};
use crate::services::categories;
use crate::services::pagination::PageInfo;

/// Raw material form fields, exactly as submitted.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct MaterialInput {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub conductivity: String,
    #[serde(default)]
    pub emissivity: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub comments: String,
    #[serde(default)]
    pub color_argb: String,
}

/// Validated material values. Conductivity is in W/(m-K).
#[derive(Debug, Clone, PartialEq)]
pub struct MaterialFields {
    pub name: String,
    pub conductivity: f64,
    pub emissivity: f64,
    pub category: &'static str,
    pub source: String,
    pub comments: String,
    pub color_argb: String,
}

fn parse_number(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

impl MaterialInput {
    pub fn from_model(material: &materials::Model, category: &str) -> Self {
        Self {
            name: material.name.clone(),
            conductivity: material.conductivity.to_string(),
            emissivity: material.emissivity.to_string(),
            category: category.to_string(),
            source: material.source.clone(),
            comments: material.comments.clone(),
            color_argb: material.color_argb.clone(),
        }
    }

    pub fn validate(&self) -> Result<MaterialFields, FieldErrors> {
        let mut errors = FieldErrors::new();

        let name = self.name.trim();
        if name.is_empty() {
            errors.add("name", "Please enter a valid name.");
        }

        let conductivity = parse_number(&self.conductivity);
        match conductivity {
            None => errors.add("conductivity", "Enter a number."),
            Some(value) if value <= 0.0 => {
                errors.add("conductivity", "Conductivity must be greater than 0")
            }
            Some(_) => {}
        }

        let emissivity = parse_number(&self.emissivity);
        match emissivity {
            None => errors.add("emissivity", "Enter a number."),
            Some(value) if !(0.0..=1.0).contains(&value) => {
                errors.add("emissivity", "Emissivity must be between 0.0 and 1.0")
            }
            Some(_) => {}
        }

        let category = categories::code_for_label(&self.category);
        if category.is_none() {
            errors.add("category", "Select a valid category.");
        }

        match (conductivity, emissivity, category) {
            (Some(conductivity), Some(emissivity), Some(category)) if errors.is_empty() => {
                Ok(MaterialFields {
                    name: name.to_string(),
                    conductivity,
                    emissivity,
                    category,
                    source: self.source.trim().to_string(),
                    comments: self.comments.trim().to_string(),
                    color_argb: self.color_argb.trim().to_string(),
                })
            }
            _ => Err(errors),
        }
    }
}

/// A material together with its category code.
#[derive(Debug, Clone, PartialEq)]
pub struct MaterialWithCategory {
    pub material: materials::Model,
    pub category: String,
}

impl MaterialWithCategory {
    fn from_pair((material, category): (materials::Model, Option<material_categories::Model>)) -> Self {
        Self {
            material,
            category: category.map(|c| c.category).unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MaterialPage {
    pub materials: Vec<MaterialWithCategory>,
    pub page: PageInfo,
}

/// List parameters: category codes to include (empty means all) and a 1-based page.
#[derive(Debug, Clone, Default)]
pub struct MaterialQuery {
    pub categories: Vec<String>,
    pub page: u64,
}

pub struct MaterialService {
    db: DatabaseConnection,
    public_owner: String,
}

impl MaterialService {
    pub fn new(db: DatabaseConnection, public_owner: impl Into<String>) -> Self {
        Self {
            db,
            public_owner: public_owner.into(),
        }
    }

    async fn public_owner_id(&self) -> MaterialResult<Option<i32>> {
        Ok(users::Entity::find()
            .filter(users::Column::Username.eq(self.public_owner.as_str()))
            .one(&self.db)
            .await?
            .map(|u| u.id))
    }

    /// Materials the user owns plus the public owner's materials.
    async fn visible_to(&self, user: &users::Model) -> MaterialResult<Condition> {
        let mut condition = Condition::any().add(materials::Column::UserId.eq(user.id));
        if let Some(public_id) = self.public_owner_id().await? {
            condition = condition.add(materials::Column::UserId.eq(public_id));
        }
        Ok(condition)
    }

    fn listing(
        visible: Condition,
        category_codes: &[String],
    ) -> SelectTwo<materials::Entity, material_categories::Entity> {
        let mut select = materials::Entity::find()
            .find_also_related(material_categories::Entity)
            .filter(visible);

        let codes: Vec<&'static str> = category_codes
            .iter()
            .filter_map(|c| categories::canonical_code(c))
            .collect();
        if !codes.is_empty() {
            select = select.filter(material_categories::Column::Category.is_in(codes));
        }

        select
            .order_by_asc(material_categories::Column::Category)
            .order_by(
                SimpleExpr::from(Func::lower(Expr::col((
                    materials::Entity,
                    materials::Column::Name,
                )))),
                Order::Asc,
            )
            .order_by_asc(materials::Column::Id)
    }

    pub async fn list(
        &self,
        user: &users::Model,
        query: &MaterialQuery,
        page_size: u64,
    ) -> MaterialResult<MaterialPage> {
        let visible = self.visible_to(user).await?;
        let paginator = Self::listing(visible, &query.categories).paginate(&self.db, page_size.max(1));
        let total = paginator.num_items().await?;
        let page = PageInfo::new(total, page_size, query.page);

        let materials = paginator
            .fetch_page(page.index())
            .await?
            .into_iter()
            .map(MaterialWithCategory::from_pair)
            .collect();

        debug!("Listing page {}/{} of {} materials", page.number, page.num_pages, total);
        Ok(MaterialPage { materials, page })
    }

    /// Every visible material matching the filter, in list order.
    pub async fn list_all(
        &self,
        user: &users::Model,
        category_codes: &[String],
    ) -> MaterialResult<Vec<MaterialWithCategory>> {
        let visible = self.visible_to(user).await?;
        Ok(Self::listing(visible, category_codes)
            .all(&self.db)
            .await?
            .into_iter()
            .map(MaterialWithCategory::from_pair)
            .collect())
    }

    /// Visible materials by name, for the layer material picker.
    pub async fn options(&self, user: &users::Model) -> MaterialResult<Vec<materials::Model>> {
        let visible = self.visible_to(user).await?;
        Ok(materials::Entity::find()
            .filter(visible)
            .order_by(
                SimpleExpr::from(Func::lower(Expr::col(materials::Column::Name))),
                Order::Asc,
            )
            .all(&self.db)
            .await?)
    }

    pub async fn get_visible(&self, user: &users::Model, id: i32) -> MaterialResult<MaterialWithCategory> {
        let visible = self.visible_to(user).await?;
        materials::Entity::find_by_id(id)
            .find_also_related(material_categories::Entity)
            .filter(visible)
            .one(&self.db)
            .await?
            .map(MaterialWithCategory::from_pair)
            .ok_or(MaterialError::NotFound(id))
    }

    /// A material the user may change. Visible-but-foreign is forbidden.
    pub async fn get_owned(&self, user: &users::Model, id: i32) -> MaterialResult<MaterialWithCategory> {
        let found = self.get_visible(user, id).await?;
        if found.material.user_id != Some(user.id) {
            return Err(MaterialError::Forbidden(id));
        }
        Ok(found)
    }

    pub async fn create(&self, user: &users::Model, input: &MaterialInput) -> MaterialResult<materials::Model> {
        let fields = input.validate().map_err(MaterialError::Validation)?;

        let txn = self.db.begin().await?;
        let category = categories::canonical_category(&txn, fields.category).await?;
        let now = Utc::now();
        let material = materials::ActiveModel {
            unique_id: Set(materials::generate_unique_id()),
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
        txn.commit().await?;

        info!("User {} created material {} ({})", user.username, material.id, material.unique_id);
        Ok(material)
    }

    pub async fn update(
        &self,
        user: &users::Model,
        id: i32,
        input: &MaterialInput,
    ) -> MaterialResult<materials::Model> {
        let existing = self.get_owned(user, id).await?;
        let fields = input.validate().map_err(MaterialError::Validation)?;

        let txn = self.db.begin().await?;
        let category = categories::canonical_category(&txn, fields.category).await?;
        let mut active: materials::ActiveModel = existing.material.into();
        active.name = Set(fields.name);
        active.conductivity = Set(fields.conductivity);
        active.emissivity = Set(fields.emissivity);
        active.category_id = Set(category.id);
        active.source = Set(fields.source);
        active.comments = Set(fields.comments);
        active.color_argb = Set(fields.color_argb);
        active.updated_at = Set(Utc::now());
        let material = active.update(&txn).await?;
        txn.commit().await?;

        info!("User {} updated material {}", user.username, material.id);
        Ok(material)
    }

    pub async fn delete(&self, user: &users::Model, id: i32) -> MaterialResult<()> {
        self.get_owned(user, id).await?;
        materials::Entity::delete_by_id(id).exec(&self.db).await?;
        info!("User {} deleted material {}", user.username, id);
        Ok(())
    }
}
