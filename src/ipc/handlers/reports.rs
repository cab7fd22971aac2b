use crate::ipc::error::{respond, HandlerErr};
use crate::ipc::helpers::{gradebook, required_ra};
use crate::ipc::types::{AppState, Request};
use serde_json::json;

fn reports_evolution(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let ra = required_ra(req)?;
    let (rec, report) = gradebook(state)?.evolution(&ra)?;
    let report = serde_json::to_value(&report)
        .map_err(|e| HandlerErr::new("serialize_failed", e.to_string()))?;
    Ok(json!({
        "student": { "ra": rec.id, "name": rec.name },
        "report": report,
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "reports.evolution" => Some(respond(&req.id, reports_evolution(state, req))),
        _ => None,
    }
}
