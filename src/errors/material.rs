use std::collections::BTreeMap;
use std::fmt;

use thiserror::Error;

/// Per-field validation messages, keyed by form field name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldErrors(BTreeMap<String, String>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a message for `field`; the first message for a field wins.
    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0.entry(field.to_string()).or_insert_with(|| message.into());
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_map(&self) -> &BTreeMap<String, String> {
        &self.0
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined = self
            .0
            .iter()
            .map(|(field, message)| format!("{}: {}", field, message))
            .collect::<Vec<_>>()
            .join("; ");
        write!(f, "{}", joined)
    }
}

#[derive(Error, Debug)]
pub enum MaterialError {
    #[error("Material {0} not found")]
    NotFound(i32),

    /// The material is visible but owned by someone else
    #[error("Material {0} belongs to another user")]
    Forbidden(i32),

    #[error("Invalid material: {0}")]
    Validation(FieldErrors),

    #[error("Unknown material category: {0}")]
    UnknownCategory(String),

    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),
}

impl MaterialError {
    pub fn is_client_error(&self) -> bool {
        !matches!(self, MaterialError::Database(_))
    }

    pub fn field_errors(&self) -> Option<&FieldErrors> {
        match self {
            MaterialError::Validation(errors) => Some(errors),
            _ => None,
        }
    }
}
