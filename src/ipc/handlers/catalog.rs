use crate::catalog::QuarterCatalog;
use crate::ipc::error::ok;
use crate::ipc::types::{AppState, Request};
use serde_json::json;

fn catalog_json(catalog: &QuarterCatalog) -> serde_json::Value {
    json!({
        "codes": catalog.codes(),
        "loaded": catalog.load_error().is_none(),
        "error": catalog.load_error(),
    })
}

fn handle_catalog_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(&req.id, catalog_json(&state.catalog))
}

fn handle_catalog_reload(state: &mut AppState, req: &Request) -> serde_json::Value {
    state.catalog = QuarterCatalog::load(&state.catalog_path);
    ok(&req.id, catalog_json(&state.catalog))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "catalog.list" => Some(handle_catalog_list(state, req)),
        "catalog.reload" => Some(handle_catalog_reload(state, req)),
        _ => None,
    }
}
