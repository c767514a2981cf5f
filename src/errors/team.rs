use thiserror::Error;

#[derive(Error, Debug)]
pub enum TeamError {
    #[error("Team name '{0}' is reserved")]
    LockedName(String),

    #[error("User '{0}' not found")]
    UserNotFound(String),

    #[error("User has no team")]
    NoTeam,

    #[error("No pending team invite")]
    NoInvite,

    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),
}
