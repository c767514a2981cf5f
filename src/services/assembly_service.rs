//! Assemblies, their layers and the layers' segments.
//!
//! All order-list bookkeeping goes through [`crate::services::ordering`];
//! this service adds the scoping checks (a layer must belong to the assembly
//! in the URL, and so on), the detail views with auto-seeding, and the plain
//! field updates.

use std::collections::HashMap;

use chrono::Utc;
use sea_orm::*;

use crate::database::entities::{assemblies, layer_segments, layers, materials, projects, users};
use crate::errors::{ContainerError, ContainerResult};
use crate::services::ordering::{
    self, get_ordered_children, ContainerRef, MoveDirection, NewChild,
};

pub const DEFAULT_ASSEMBLY_NAME: &str = "unnamed";

#[derive(Debug, Clone)]
pub struct SegmentDetail {
    pub segment: layer_segments::Model,
    pub material: Option<materials::Model>,
}

#[derive(Debug, Clone)]
pub struct LayerDetail {
    pub layer: layers::Model,
    pub segments: Vec<SegmentDetail>,
}

#[derive(Debug, Clone)]
pub struct AssemblyDetail {
    pub assembly: assemblies::Model,
    pub layers: Vec<LayerDetail>,
}

pub struct AssemblyService {
    db: DatabaseConnection,
}

impl AssemblyService {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// The assembly, provided it belongs to `project_id`.
    pub async fn find_assembly(&self, project_id: i32, assembly_id: i32) -> ContainerResult<assemblies::Model> {
        assemblies::Entity::find_by_id(assembly_id)
            .filter(assemblies::Column::ProjectId.eq(project_id))
            .one(&self.db)
            .await?
            .ok_or(ContainerError::not_found("assembly", assembly_id))
    }

    /// The layer, provided it belongs to `assembly_id`.
    pub async fn find_layer(&self, assembly_id: i32, layer_id: i32) -> ContainerResult<layers::Model> {
        layers::Entity::find_by_id(layer_id)
            .filter(layers::Column::AssemblyId.eq(assembly_id))
            .one(&self.db)
            .await?
            .ok_or(ContainerError::not_found("layer", layer_id))
    }

    pub async fn add_assembly(
        &self,
        user: &users::Model,
        project_id: i32,
        name: &str,
    ) -> ContainerResult<assemblies::Model> {
        let id = ordering::append_child(
            &self.db,
            ContainerRef::project(project_id),
            NewChild::Assembly {
                name: name.to_string(),
                user_id: Some(user.id),
            },
        )
        .await?;
        assemblies::Entity::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or(ContainerError::not_found("assembly", id))
    }

    pub async fn delete_assembly(&self, project_id: i32, assembly_id: i32) -> ContainerResult<()> {
        ordering::remove_child(&self.db, ContainerRef::project(project_id), assembly_id).await
    }

    pub async fn rename_assembly(&self, assembly: assemblies::Model, name: &str) -> ContainerResult<assemblies::Model> {
        let name = name.trim();
        if name.is_empty() {
            return Ok(assembly);
        }
        let mut active: assemblies::ActiveModel = assembly.into();
        active.name = Set(name.to_string());
        active.updated_at = Set(Utc::now());
        Ok(active.update(&self.db).await?)
    }

    /// The project's assemblies in order, seeding an `unnamed` one if empty.
    pub async fn project_assemblies(
        &self,
        user: &users::Model,
        project: &projects::Model,
    ) -> ContainerResult<Vec<assemblies::Model>> {
        let ordered = get_ordered_children::<assemblies::Model, _>(&self.db, project.id).await?;
        if !ordered.children.is_empty() {
            return Ok(ordered.children);
        }
        ordering::seed_if_empty::<assemblies::Model>(
            &self.db,
            project.id,
            NewChild::Assembly {
                name: DEFAULT_ASSEMBLY_NAME.to_string(),
                user_id: Some(user.id),
            },
        )
        .await?;
        Ok(get_ordered_children::<assemblies::Model, _>(&self.db, project.id)
            .await?
            .children)
    }

    /// Assembly with its ordered layers, seeding a first layer if it has none.
    pub async fn assembly_detail(&self, assembly: assemblies::Model) -> ContainerResult<AssemblyDetail> {
        let mut ordered = get_ordered_children::<layers::Model, _>(&self.db, assembly.id).await?;
        if ordered.children.is_empty() {
            ordering::seed_if_empty::<layers::Model>(
                &self.db,
                assembly.id,
                NewChild::Layer {
                    thickness_mm: layers::DEFAULT_THICKNESS_MM,
                },
            )
            .await?;
            ordered = get_ordered_children::<layers::Model, _>(&self.db, assembly.id).await?;
        }

        let mut layers = Vec::with_capacity(ordered.children.len());
        for layer in ordered.children {
            layers.push(self.layer_detail(layer).await?);
        }
        Ok(AssemblyDetail { assembly, layers })
    }

    /// Layer with its ordered segments (and their materials), seeding a first
    /// segment if it has none.
    pub async fn layer_detail(&self, layer: layers::Model) -> ContainerResult<LayerDetail> {
        let mut ordered = get_ordered_children::<layer_segments::Model, _>(&self.db, layer.id).await?;
        if ordered.children.is_empty() {
            ordering::seed_if_empty::<layer_segments::Model>(
                &self.db,
                layer.id,
                NewChild::Segment { material_id: None },
            )
            .await?;
            ordered = get_ordered_children::<layer_segments::Model, _>(&self.db, layer.id).await?;
        }

        let material_ids: Vec<i32> = ordered
            .children
            .iter()
            .filter_map(|s| s.material_id)
            .collect();
        let mut by_id: HashMap<i32, materials::Model> = HashMap::new();
        if !material_ids.is_empty() {
            for material in materials::Entity::find()
                .filter(materials::Column::Id.is_in(material_ids))
                .all(&self.db)
                .await?
            {
                by_id.insert(material.id, material);
            }
        }

        let segments = ordered
            .children
            .into_iter()
            .map(|segment| SegmentDetail {
                material: segment.material_id.and_then(|id| by_id.get(&id).cloned()),
                segment,
            })
            .collect();
        Ok(LayerDetail { layer, segments })
    }

    /// Append a layer (with its first segment) to the assembly.
    pub async fn add_layer(&self, assembly_id: i32) -> ContainerResult<layers::Model> {
        let id = ordering::append_child(
            &self.db,
            ContainerRef::assembly(assembly_id),
            NewChild::Layer {
                thickness_mm: layers::DEFAULT_THICKNESS_MM,
            },
        )
        .await?;
        layers::Entity::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or(ContainerError::not_found("layer", id))
    }

    pub async fn delete_layer(&self, assembly_id: i32, layer_id: i32) -> ContainerResult<()> {
        ordering::remove_child(&self.db, ContainerRef::assembly(assembly_id), layer_id).await
    }

    pub async fn move_layer(&self, assembly_id: i32, layer_id: i32, direction: MoveDirection) -> ContainerResult<bool> {
        ordering::move_child(&self.db, ContainerRef::assembly(assembly_id), layer_id, direction).await
    }

    /// Store a new thickness in millimetres; must be a finite number above zero.
    pub async fn set_layer_thickness(&self, layer: layers::Model, thickness_mm: f64) -> ContainerResult<layers::Model> {
        if !thickness_mm.is_finite() || thickness_mm <= 0.0 {
            return Err(ContainerError::Invalid(format!(
                "Layer thickness must be greater than 0, got {}",
                thickness_mm
            )));
        }
        let mut active: layers::ActiveModel = layer.into();
        active.thickness_mm = Set(thickness_mm);
        Ok(active.update(&self.db).await?)
    }

    /// Point one of the layer's segments at a material (or none).
    pub async fn set_segment_material(
        &self,
        layer_id: i32,
        segment_id: i32,
        material_id: Option<i32>,
    ) -> ContainerResult<layer_segments::Model> {
        let segment = layer_segments::Entity::find_by_id(segment_id)
            .filter(layer_segments::Column::LayerId.eq(layer_id))
            .one(&self.db)
            .await?
            .ok_or(ContainerError::not_found("segment", segment_id))?;
        let mut active: layer_segments::ActiveModel = segment.into();
        active.material_id = Set(material_id);
        Ok(active.update(&self.db).await?)
    }

    pub async fn add_segment(&self, layer_id: i32) -> ContainerResult<layer_segments::Model> {
        let id = ordering::append_child(
            &self.db,
            ContainerRef::layer(layer_id),
            NewChild::Segment { material_id: None },
        )
        .await?;
        layer_segments::Entity::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or(ContainerError::not_found("segment", id))
    }

    pub async fn delete_segment(&self, layer_id: i32, segment_id: i32) -> ContainerResult<()> {
        ordering::remove_child(&self.db, ContainerRef::layer(layer_id), segment_id).await
    }
}
