use std::path::PathBuf;

use cmt_common::ConfigError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("failed to {operation}: {source}")]
    Sqlite {
        operation: &'static str,
        #[source]
        source: rusqlite::Error,
    },
    #[error("failed to create database directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("invalid {field} value {value:?}")]
    InvalidValue { field: &'static str, value: String },
    #[error("session {0} not found")]
    NotFound(String),
}

impl StoreError {
    pub(crate) fn sqlite(operation: &'static str) -> impl FnOnce(rusqlite::Error) -> Self {
        move |source| StoreError::Sqlite { operation, source }
    }

    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            StoreError::Sqlite { .. } => {
                Some("Check that the database is not locked by another process, or set CMT_DB.")
            }
            StoreError::CreateDir { .. } => Some("Check permissions on the cmt config directory."),
            StoreError::NotFound(_) => Some("Run 'cmt sessions' to list known session ids."),
            StoreError::Config(_) | StoreError::InvalidValue { .. } => None,
        }
    }
}
