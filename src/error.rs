use thiserror::Error;

#[derive(Error, Debug)]
pub enum KakeiboError {
    #[cfg(feature = "sqlite")]
    #[error("Database error: {0}")]
    Db(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Invalid {field}: {value}")]
    Invalid { field: &'static str, value: String },

    #[error("Unknown card: {0}")]
    UnknownCard(String),

    #[error("No {kind} with id {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("{0} has already been paid out")]
    AlreadyPaid(String),

    #[error("Spending target not met for {title}: {spent} of {target}")]
    TargetNotMet {
        title: String,
        spent: String,
        target: String,
    },

    #[error("Settings error: {0}")]
    Settings(String),
}

pub type Result<T> = std::result::Result<T, KakeiboError>;
