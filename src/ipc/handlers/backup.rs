use crate::backup;
use crate::ipc::error::{respond, HandlerErr};
use crate::ipc::handlers::core::open_workspace;
use crate::ipc::helpers::required_str;
use crate::ipc::types::{AppState, Request};
use serde_json::json;
use std::path::PathBuf;

fn workspace_path(state: &AppState) -> Result<PathBuf, HandlerErr> {
    state
        .workspace
        .clone()
        .ok_or_else(|| HandlerErr::new("no_workspace", "select a workspace first"))
}

fn export_bundle(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let workspace = workspace_path(state)?;
    let out_path = PathBuf::from(required_str(req, "outPath")?);
    let summary = backup::export_workspace_bundle(
        &workspace,
        &out_path,
        &state.credentials.project_id,
    )
    .map_err(|e| HandlerErr::new("io_failed", format!("{e:#}")))?;
    tracing::info!(bundle = %out_path.display(), sha256 = %summary.sha256, "workspace exported");
    Ok(json!({
        "path": out_path.to_string_lossy(),
        "bundleFormat": summary.bundle_format,
        "entryCount": summary.entry_count,
        "sha256": summary.sha256,
    }))
}

fn import_bundle(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let workspace = workspace_path(state)?;
    let in_path = PathBuf::from(required_str(req, "inPath")?);

    // Close the store before its file is replaced.
    state.gradebook = None;
    let imported = backup::import_workspace_bundle(
        &in_path,
        &workspace,
        Some(state.credentials.project_id.as_str()),
    );
    // Reopen whatever is on disk now, imported or not.
    let reopened = open_workspace(state, &workspace);

    let summary = imported.map_err(|e| HandlerErr::new("io_failed", format!("{e:#}")))?;
    reopened.map_err(|e| HandlerErr::new("workspace_open_failed", e.to_string()))?;
    tracing::info!(bundle = %in_path.display(), format = %summary.bundle_format_detected, "workspace imported");
    Ok(json!({
        "bundleFormatDetected": summary.bundle_format_detected,
        "projectId": summary.project_id,
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "workspace.exportBundle" => export_bundle(state, req),
        "workspace.importBundle" => import_bundle(state, req),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
