//! Domain-specific error types
//!
//! - **MaterialError**: material validation, ownership and category resolution
//! - **ContainerError**: ordered containers (projects, assemblies, layers, segments)
//! - **ImportExportError**: CSV import/export of materials
//! - **TeamError**: users, teams and invitations
//!
//! ```rust
//! use portal::errors::ContainerError;
//!
//! let err = ContainerError::NotFound { kind: "layer", id: 7 };
//! assert!(err.is_not_found());
//! ```

pub mod container;
pub mod import_export;
pub mod material;
pub mod team;

pub use container::ContainerError;
pub use import_export::{ImportExportError, RowError};
pub use material::{FieldErrors, MaterialError};
pub use team::TeamError;

pub type MaterialResult<T> = Result<T, MaterialError>;

pub type ContainerResult<T> = Result<T, ContainerError>;

pub type ImportExportResult<T> = Result<T, ImportExportError>;

pub type TeamResult<T> = Result<T, TeamError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_container_result_alias() {
        let result: ContainerResult<()> = Err(ContainerError::NotFound { kind: "assembly", id: 3 });
        assert!(result.is_err());
    }

    #[test]
    fn test_material_result_alias() {
        let result: MaterialResult<()> = Err(MaterialError::NotFound(1));
        assert!(result.is_err());
    }
}
