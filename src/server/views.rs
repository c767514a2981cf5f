//! Serializable view models handed to the templates.

use serde::Serialize;

use crate::database::entities::{assemblies, materials, projects, teams, users};
use crate::services::assembly_service::{AssemblyDetail, LayerDetail};
use crate::services::categories::{self, CATEGORIES};
use crate::services::material_service::{MaterialInput, MaterialWithCategory};
use crate::units::UnitSystem;

#[derive(Debug, Serialize)]
pub struct UnitsView {
    pub system: &'static str,
    pub is_ip: bool,
    pub conductivity_unit: &'static str,
}

impl From<UnitSystem> for UnitsView {
    fn from(units: UnitSystem) -> Self {
        Self {
            system: units.as_str(),
            is_ip: units.is_ip(),
            conductivity_unit: units.conductivity_unit(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct UserView {
    pub id: i32,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
}

impl From<&users::Model> for UserView {
    fn from(user: &users::Model) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TeamView {
    pub id: i32,
    pub name: String,
    pub locked: bool,
}

impl From<&teams::Model> for TeamView {
    fn from(team: &teams::Model) -> Self {
        Self {
            id: team.id,
            name: team.name.clone(),
            locked: team.is_locked(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CategoryOption {
    pub code: &'static str,
    pub label: &'static str,
    pub selected: bool,
}

/// Every category, marking those in `selected` (codes or labels).
pub fn category_options(selected: &[String]) -> Vec<CategoryOption> {
    let selected: Vec<&str> = selected
        .iter()
        .filter_map(|s| categories::code_for_label(s))
        .collect();
    CATEGORIES
        .iter()
        .map(|(code, label)| CategoryOption {
            code: *code,
            label: *label,
            selected: selected.contains(code),
        })
        .collect()
}

#[derive(Debug, Serialize)]
pub struct MaterialRowView {
    pub id: i32,
    pub unique_id: String,
    pub name: String,
    pub category: String,
    pub category_label: String,
    /// Converted to the requested unit system
    pub conductivity: f64,
    pub emissivity: f64,
    pub source: String,
    pub comments: String,
    pub color_argb: String,
    pub owned: bool,
}

impl MaterialRowView {
    pub fn new(row: &MaterialWithCategory, user: &users::Model, units: UnitSystem) -> Self {
        let m = &row.material;
        Self {
            id: m.id,
            unique_id: m.unique_id.clone(),
            name: m.name.clone(),
            category: row.category.clone(),
            category_label: categories::label_for_code(&row.category)
                .unwrap_or(row.category.as_str())
                .to_string(),
            conductivity: units.conductivity(m.conductivity),
            emissivity: m.emissivity,
            source: m.source.clone(),
            comments: m.comments.clone(),
            color_argb: m.color_argb.clone(),
            owned: m.user_id == Some(user.id),
        }
    }
}

/// Context for the create/update material form.
#[derive(Debug, Serialize)]
pub struct MaterialFormView {
    pub mode: &'static str,
    pub action: String,
    pub material_id: Option<i32>,
    pub values: MaterialInput,
    pub errors: std::collections::BTreeMap<String, String>,
    pub categories: Vec<CategoryOption>,
}

impl MaterialFormView {
    pub fn create(values: MaterialInput) -> Self {
        Self::build("create", "/create-material/".to_string(), None, values)
    }

    pub fn update(material_id: i32, values: MaterialInput) -> Self {
        Self::build(
            "update",
            format!("/materials/{}/update", material_id),
            Some(material_id),
            values,
        )
    }

    fn build(mode: &'static str, action: String, material_id: Option<i32>, values: MaterialInput) -> Self {
        let categories = category_options(std::slice::from_ref(&values.category));
        Self {
            mode,
            action,
            material_id,
            values,
            errors: Default::default(),
            categories,
        }
    }

    pub fn with_errors(mut self, errors: &crate::errors::FieldErrors) -> Self {
        self.errors = errors.as_map().clone();
        self
    }
}

#[derive(Debug, Serialize)]
pub struct ProjectView {
    pub id: i32,
    pub uid: String,
    pub name: String,
    pub active: bool,
}

impl ProjectView {
    pub fn new(project: &projects::Model, active_id: Option<i32>) -> Self {
        Self {
            id: project.id,
            uid: project.uid.clone(),
            name: project.name.clone(),
            active: active_id == Some(project.id),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AssemblyView {
    pub id: i32,
    pub name: String,
    pub active: bool,
}

impl AssemblyView {
    pub fn new(assembly: &assemblies::Model, active_id: Option<i32>) -> Self {
        Self {
            id: assembly.id,
            name: assembly.name.clone(),
            active: active_id == Some(assembly.id),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MaterialOption {
    pub id: i32,
    pub name: String,
    pub selected: bool,
}

#[derive(Debug, Serialize)]
pub struct SegmentView {
    pub id: i32,
    pub layer_id: i32,
    /// Form key the material picker posts under
    pub field_name: String,
    pub material_name: Option<String>,
    pub options: Vec<MaterialOption>,
}

#[derive(Debug, Serialize)]
pub struct LayerView {
    pub id: i32,
    pub thickness_mm: f64,
    pub segments: Vec<SegmentView>,
}

impl LayerView {
    pub fn new(detail: &LayerDetail, material_options: &[materials::Model]) -> Self {
        let segments = detail
            .segments
            .iter()
            .map(|s| SegmentView {
                id: s.segment.id,
                layer_id: detail.layer.id,
                field_name: format!("form_{}-material", s.segment.id),
                material_name: s.material.as_ref().map(|m| m.name.clone()),
                options: material_options
                    .iter()
                    .map(|m| MaterialOption {
                        id: m.id,
                        name: m.name.clone(),
                        selected: s.segment.material_id == Some(m.id),
                    })
                    .collect(),
            })
            .collect();
        Self {
            id: detail.layer.id,
            thickness_mm: detail.layer.thickness_mm,
            segments,
        }
    }
}

pub fn layer_views(detail: &AssemblyDetail, material_options: &[materials::Model]) -> Vec<LayerView> {
    detail
        .layers
        .iter()
        .map(|layer| LayerView::new(layer, material_options))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_options_marks_selection() {
        let options = category_options(&["IN".to_string(), "Wood".to_string()]);
        let selected: Vec<&str> = options.iter().filter(|o| o.selected).map(|o| o.code).collect();
        assert_eq!(selected, vec!["IN", "WO"]);
        assert_eq!(options.len(), CATEGORIES.len());
    }

    #[test]
    fn test_units_view() {
        let view = UnitsView::from(UnitSystem::IP);
        assert!(view.is_ip);
        assert_eq!(view.conductivity_unit, "Btu/(hr-ft-°F)");
    }
}
