use crate::ipc::error::{respond, HandlerErr};
use crate::ipc::helpers::{gradebook, required_quarter, required_ra, required_scores, student_json};
use crate::ipc::types::{AppState, Request};
use serde_json::json;

fn scores_get(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let ra = required_ra(req)?;
    let rec = gradebook(state)?.student(&ra)?;
    let codes: Vec<&str> = rec.quarters.keys().map(|c| c.as_str()).collect();
    let student = student_json(&rec);
    Ok(json!({
        "quarters": student["quarters"].clone(),
        "editableQuarters": codes,
        "student": student,
    }))
}

fn scores_available(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let ra = required_ra(req)?;
    let (rec, available) = gradebook(state)?.available_quarters(&state.catalog, &ra)?;
    Ok(json!({
        "ra": rec.id,
        "name": rec.name,
        "available": available,
        "registrationEnabled": !available.is_empty(),
    }))
}

fn scores_record(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let ra = required_ra(req)?;
    let quarter = required_quarter(req)?;
    let scores = required_scores(req)?;
    let rec = gradebook(state)?.record_scores(&state.catalog, &ra, &quarter, &scores)?;
    Ok(json!({ "quarter": quarter, "student": student_json(&rec) }))
}

fn scores_edit(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let ra = required_ra(req)?;
    let quarter = required_quarter(req)?;
    let scores = required_scores(req)?;
    let rec = gradebook(state)?.edit_scores(&ra, &quarter, &scores)?;
    Ok(json!({ "quarter": quarter, "student": student_json(&rec) }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "scores.get" => scores_get(state, req),
        "scores.available" => scores_available(state, req),
        "scores.record" => scores_record(state, req),
        "scores.edit" => scores_edit(state, req),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
