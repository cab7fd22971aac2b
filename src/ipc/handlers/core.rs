use crate::gradebook::Gradebook;
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::store::{SqliteStore, StoreError};
use serde_json::json;
use std::path::{Path, PathBuf};

/// Opens (or creates) the store under `path` for the loaded credentials'
/// project and makes it the active workspace.
pub fn open_workspace(state: &mut AppState, path: &Path) -> Result<(), StoreError> {
    let store = SqliteStore::open(path, &state.credentials.project_id)?;
    tracing::info!(
        workspace = %path.display(),
        project = store.project_id(),
        "workspace opened"
    );
    state.workspace = Some(path.to_path_buf());
    state.gradebook = Some(Gradebook::new(Box::new(store)));
    Ok(())
}

fn handle_health(state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(
        &req.id,
        json!({
            "version": env!("CARGO_PKG_VERSION"),
            "workspacePath": state.workspace.as_ref().map(|p| p.to_string_lossy().to_string()),
            "projectId": state.credentials.project_id,
            "catalogSize": state.catalog.codes().len(),
        }),
    )
}

fn handle_workspace_select(state: &mut AppState, req: &Request) -> serde_json::Value {
    let p = req
        .params
        .get("path")
        .and_then(|v| v.as_str())
        .map(PathBuf::from);
    let Some(path) = p else {
        return err(&req.id, "bad_params", "missing params.path", None);
    };

    match open_workspace(state, &path) {
        Ok(()) => ok(&req.id, json!({ "workspacePath": path.to_string_lossy() })),
        Err(e) => {
            tracing::error!(workspace = %path.display(), error = %e, "workspace open failed");
            err(&req.id, "workspace_open_failed", e.to_string(), None)
        }
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "health" => Some(handle_health(state, req)),
        "workspace.select" => Some(handle_workspace_select(state, req)),
        _ => None,
    }
}
