use crate::grading::{self, GradeBand, GradingScale};
use crate::ipc::error::HandlerErr;
use crate::ipc::helpers::{get_required_f64, to_json, with_db};
use crate::ipc::types::{AppState, Request};
use rusqlite::Connection;
use serde_json::{json, Value};

fn scale_get(conn: &Connection, _params: &Value) -> Result<Value, HandlerErr> {
    let scale = grading::load_scale(conn)?;
    Ok(json!({ "bands": to_json(&scale.bands())? }))
}

fn scale_set(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let Some(raw) = params.get("bands") else {
        return Err(HandlerErr::bad_params("missing bands"));
    };
    let bands: Vec<GradeBand> = serde_json::from_value(raw.clone())
        .map_err(|e| HandlerErr::bad_params(format!("invalid bands: {}", e)))?;
    let scale = GradingScale::new(bands)?;
    grading::save_scale(conn, &scale)?;
    Ok(json!({ "bands": to_json(&scale.bands())? }))
}

fn grade_score(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let score = get_required_f64(params, "score")?;
    let scale = grading::load_scale(conn)?;
    to_json(&scale.grade(score))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    match req.method.as_str() {
        "grading.scale.get" => Some(with_db(state, req, scale_get)),
        "grading.scale.set" => Some(with_db(state, req, scale_set)),
        "grading.grade" => Some(with_db(state, req, grade_score)),
        _ => None,
    }
}
