use crate::ipc::error::{respond, HandlerErr};
use crate::ipc::helpers::{
    gradebook, gradebook_mut, optional_bool, optional_str, required_ra, required_str, student_json,
};
use crate::ipc::types::{AppState, Request};
use crate::lookup::{LookupOutcome, LookupQuery};
use crate::model::StudentRecord;
use serde_json::json;

fn found_json(rec: &StudentRecord) -> serde_json::Value {
    json!({
        "state": "found",
        "ra": rec.id,
        "student": student_json(rec),
    })
}

fn students_list(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let refresh = optional_bool(req, "refresh")?;
    let gb = gradebook_mut(state)?;
    if refresh {
        gb.invalidate_roster();
    }
    let cached = gb.roster_cached();
    let students = gb.roster()?.to_vec();
    Ok(json!({ "students": students, "cached": cached }))
}

fn students_lookup(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let ra = optional_str(req, "ra")?;
    let name = optional_str(req, "name")?;
    let gb = gradebook(state)?;

    let Some(query) = LookupQuery::new(ra.as_deref(), name.as_deref()) else {
        return Ok(json!({
            "state": "needs_input",
            "message": "provide ra or name to search",
        }));
    };

    Ok(match gb.lookup(&query)? {
        LookupOutcome::Found(rec) => found_json(&rec),
        LookupOutcome::NotFoundById(ra) => json!({
            "state": "not_found_by_id",
            "ra": ra,
            "canRegister": true,
        }),
        LookupOutcome::NotFoundByName(name) => json!({
            "state": "not_found_by_name",
            "suggestedName": name,
            "canRegister": false,
        }),
        LookupOutcome::Ambiguous(candidates) => {
            let candidates: Vec<serde_json::Value> = candidates
                .iter()
                .map(|c| json!({ "ra": c.id, "name": c.name, "label": c.label() }))
                .collect();
            json!({
                "state": "ambiguous",
                "count": candidates.len(),
                "candidates": candidates,
            })
        }
    })
}

fn students_select(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let ra = required_ra(req)?;
    let rec = gradebook(state)?.select(&ra)?;
    Ok(found_json(&rec))
}

fn students_register(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let ra = required_ra(req)?;
    let name = required_str(req, "name")?;
    let rec = gradebook_mut(state)?.register(&ra, &name)?;
    Ok(found_json(&rec))
}

fn students_rename(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let ra = required_ra(req)?;
    let name = required_str(req, "name")?;
    let rec = gradebook_mut(state)?.rename(&ra, &name)?;
    Ok(json!({ "student": student_json(&rec) }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "students.list" => students_list(state, req),
        "students.lookup" => students_lookup(state, req),
        "students.select" => students_select(state, req),
        "students.register" => students_register(state, req),
        "students.rename" => students_rename(state, req),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
