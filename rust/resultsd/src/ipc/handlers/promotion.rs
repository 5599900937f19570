use crate::ipc::error::HandlerErr;
use crate::ipc::helpers::{get_optional_str, to_json, with_db};
use crate::ipc::types::{AppState, Request};
use crate::promotion;
use rusqlite::Connection;
use serde_json::{json, Value};

fn promotion_run(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let class_name = get_optional_str(params, "className")?;
    let report = promotion::promote_students(conn, class_name.as_deref())?;
    to_json(&report)
}

fn promotion_history(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let student_id = get_optional_str(params, "studentId")?;
    let records = promotion::promotion_history(conn, student_id.as_deref())?;
    Ok(json!({ "records": to_json(&records)? }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    match req.method.as_str() {
        "promotion.run" => Some(with_db(state, req, promotion_run)),
        "promotion.history" => Some(with_db(state, req, promotion_history)),
        _ => None,
    }
}
