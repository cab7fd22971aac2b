use std::path::PathBuf;

use serde::Deserialize;

use crate::catalog::QuarterCatalog;
use crate::credentials::ServiceAccount;
use crate::gradebook::Gradebook;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

pub struct AppState {
    pub credentials: ServiceAccount,
    pub catalog_path: PathBuf,
    pub catalog: QuarterCatalog,
    pub workspace: Option<PathBuf>,
    pub gradebook: Option<Gradebook>,
}
