use crate::store::StoreError;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GradebookError {
    #[error("{0}")]
    BadParams(String),
    #[error("student {0} not found")]
    StudentNotFound(String),
    #[error("student {0} is already registered")]
    AlreadyExists(String),
    #[error("quarter {0} is not in the quarter catalog")]
    QuarterNotInCatalog(String),
    #[error("quarter {quarter} is already recorded for student {ra}")]
    QuarterAlreadyRecorded { ra: String, quarter: String },
    #[error("quarter {quarter} has no scores for student {ra}")]
    QuarterNotRecorded { ra: String, quarter: String },
    #[error("no quarter codes are loaded")]
    CatalogEmpty { reason: Option<String> },
    #[error("student {0} has no quarter scores yet")]
    NoScores(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl GradebookError {
    pub fn code(&self) -> &'static str {
        match self {
            GradebookError::BadParams(_) => "bad_params",
            GradebookError::StudentNotFound(_) => "student_not_found",
            GradebookError::AlreadyExists(_) => "already_exists",
            GradebookError::QuarterNotInCatalog(_) => "quarter_not_in_catalog",
            GradebookError::QuarterAlreadyRecorded { .. } => "quarter_already_recorded",
            GradebookError::QuarterNotRecorded { .. } => "quarter_not_recorded",
            GradebookError::CatalogEmpty { .. } => "catalog_empty",
            GradebookError::NoScores(_) => "no_scores",
            GradebookError::Store(_) => "store_failed",
        }
    }

    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            GradebookError::StudentNotFound(ra)
            | GradebookError::AlreadyExists(ra)
            | GradebookError::NoScores(ra) => Some(json!({ "ra": ra })),
            GradebookError::QuarterNotInCatalog(quarter) => Some(json!({ "quarter": quarter })),
            GradebookError::QuarterAlreadyRecorded { ra, quarter }
            | GradebookError::QuarterNotRecorded { ra, quarter } => {
                Some(json!({ "ra": ra, "quarter": quarter }))
            }
            GradebookError::CatalogEmpty { reason } => {
                reason.as_ref().map(|r| json!({ "reason": r }))
            }
            GradebookError::BadParams(_) | GradebookError::Store(_) => None,
        }
    }
}
