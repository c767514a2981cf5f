use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use thiserror::Error;
use tracing::error;

use crate::common::db_errors::{format_db_error, DbErrorKind};
use crate::errors::{ContainerError, ImportExportError, MaterialError, TeamError};

/// Everything a handler can fail with, mapped onto a status and a small
/// HTML fragment the page can swap in.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Not signed in")]
    Unauthenticated,

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Conflict(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Unauthenticated => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            AppError::Internal(err) => {
                error!("Request failed: {:#}", err);
                "Something went wrong, please try again.".to_string()
            }
            other => other.to_string(),
        };
        let body = format!(
            "<div class=\"error\" role=\"alert\">{}</div>",
            handlebars::html_escape(&message)
        );
        (status, Html(body)).into_response()
    }
}

impl From<sea_orm::DbErr> for AppError {
    fn from(err: sea_orm::DbErr) -> Self {
        match DbErrorKind::from_db_err(&err) {
            DbErrorKind::NotFound => AppError::NotFound(err.to_string()),
            DbErrorKind::Busy | DbErrorKind::Timeout => {
                AppError::Conflict("The database is busy, please try again.".to_string())
            }
            DbErrorKind::UniqueViolation => {
                AppError::Conflict("That record already exists.".to_string())
            }
            _ => {
                let (_, message) = format_db_error("request", &err);
                AppError::Internal(anyhow::Error::new(err).context(message))
            }
        }
    }
}

impl From<MaterialError> for AppError {
    fn from(err: MaterialError) -> Self {
        match err {
            MaterialError::NotFound(_) => AppError::NotFound(err.to_string()),
            MaterialError::Forbidden(_) => AppError::Forbidden(err.to_string()),
            MaterialError::Validation(_) | MaterialError::UnknownCategory(_) => {
                AppError::BadRequest(err.to_string())
            }
            MaterialError::Database(db) => db.into(),
        }
    }
}

impl From<ContainerError> for AppError {
    fn from(err: ContainerError) -> Self {
        match err {
            ContainerError::NotFound { .. } | ContainerError::NotListed { .. } => {
                AppError::NotFound(err.to_string())
            }
            ContainerError::Invalid(_) => AppError::BadRequest(err.to_string()),
            ContainerError::Contention { .. } => AppError::Conflict(err.to_string()),
            ContainerError::Database(db) => db.into(),
            ContainerError::CorruptOrder(_) => AppError::Internal(err.into()),
        }
    }
}

impl From<TeamError> for AppError {
    fn from(err: TeamError) -> Self {
        match err {
            TeamError::Database(db) => db.into(),
            TeamError::UserNotFound(_) => AppError::NotFound(err.to_string()),
            TeamError::LockedName(_) | TeamError::NoTeam | TeamError::NoInvite => {
                AppError::BadRequest(err.to_string())
            }
        }
    }
}

impl From<ImportExportError> for AppError {
    fn from(err: ImportExportError) -> Self {
        match err {
            ImportExportError::Database(db) => db.into(),
            ImportExportError::Material(material) => material.into(),
            ImportExportError::ExportFailed(_) => AppError::Internal(err.into()),
            other => AppError::BadRequest(other.to_string()),
        }
    }
}

impl From<handlebars::RenderError> for AppError {
    fn from(err: handlebars::RenderError) -> Self {
        AppError::Internal(anyhow::anyhow!("Template render failed: {}", err))
    }
}
