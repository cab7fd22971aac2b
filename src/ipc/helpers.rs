use crate::gradebook::Gradebook;
use crate::ipc::error::HandlerErr;
use crate::ipc::types::{AppState, Request};
use crate::model::{Metric, QuarterCode, Score, ScoreVector, StudentRecord};
use serde_json::json;

pub fn required_str(req: &Request, key: &str) -> Result<String, HandlerErr> {
    req.params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|v| v.to_string())
        .ok_or_else(|| HandlerErr::new("bad_params", format!("missing {}", key)))
}

/// Student RA, trimmed the same way registration stores it.
pub fn required_ra(req: &Request) -> Result<String, HandlerErr> {
    let raw = required_str(req, "ra")?;
    let ra = raw.trim();
    if ra.is_empty() {
        return Err(HandlerErr::new("bad_params", "ra must not be empty"));
    }
    Ok(ra.to_string())
}

pub fn optional_str(req: &Request, key: &str) -> Result<Option<String>, HandlerErr> {
    match req.params.get(key) {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(v) => v
            .as_str()
            .map(|s| Some(s.to_string()))
            .ok_or_else(|| HandlerErr::new("bad_params", format!("{} must be a string", key))),
    }
}

pub fn optional_bool(req: &Request, key: &str) -> Result<bool, HandlerErr> {
    match req.params.get(key) {
        None | Some(serde_json::Value::Null) => Ok(false),
        Some(v) => v
            .as_bool()
            .ok_or_else(|| HandlerErr::new("bad_params", format!("{} must be a boolean", key))),
    }
}

pub fn required_quarter(req: &Request) -> Result<QuarterCode, HandlerErr> {
    let raw = required_str(req, "quarter")?;
    QuarterCode::parse(&raw)
        .ok_or_else(|| HandlerErr::new("bad_params", "quarter must not be empty"))
}

/// Reads `params.scores` as the five metrics, each an integer in [0, 10].
pub fn required_scores(req: &Request) -> Result<ScoreVector, HandlerErr> {
    let Some(obj) = req.params.get("scores").and_then(|v| v.as_object()) else {
        return Err(HandlerErr::new("bad_params", "missing/invalid scores"));
    };

    let mut values = [Score::default(); 5];
    for (slot, metric) in values.iter_mut().zip(Metric::ALL) {
        let field = metric.field();
        let Some(raw) = obj.get(field) else {
            return Err(HandlerErr::new("bad_params", format!("missing scores.{}", field))
                .with_details(json!({ "metric": field })));
        };
        let Some(n) = raw.as_i64() else {
            return Err(
                HandlerErr::new("bad_params", format!("scores.{} must be an integer", field))
                    .with_details(json!({ "metric": field, "value": raw })),
            );
        };
        *slot = Score::new(n).ok_or_else(|| {
            HandlerErr::new(
                "bad_params",
                format!("scores.{} must be between {} and {}", field, Score::MIN, Score::MAX),
            )
            .with_details(json!({ "metric": field, "value": n }))
        })?;
    }
    let [bd, func, nfr, eng, tech] = values;
    Ok(ScoreVector::new(bd, func, nfr, eng, tech))
}

pub fn gradebook_mut(state: &mut AppState) -> Result<&mut Gradebook, HandlerErr> {
    state
        .gradebook
        .as_mut()
        .ok_or_else(|| HandlerErr::new("no_workspace", "select a workspace first"))
}

pub fn gradebook(state: &AppState) -> Result<&Gradebook, HandlerErr> {
    state
        .gradebook
        .as_ref()
        .ok_or_else(|| HandlerErr::new("no_workspace", "select a workspace first"))
}

pub fn student_json(rec: &StudentRecord) -> serde_json::Value {
    let quarters: Vec<serde_json::Value> = rec
        .quarters
        .iter()
        .map(|(code, q)| {
            json!({
                "code": code,
                "scores": q.scores.to_json(),
                "evaluationTimestamp": q.evaluation_timestamp,
            })
        })
        .collect();
    json!({
        "ra": rec.id,
        "name": rec.name,
        "label": rec.label(),
        "quarterCount": quarters.len(),
        "quarters": quarters,
        "createdAt": rec.created_at,
        "updatedAt": rec.updated_at,
    })
}
