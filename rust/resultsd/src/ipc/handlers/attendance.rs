use crate::attendance;
use crate::ipc::error::HandlerErr;
use crate::ipc::helpers::{get_required_i64, get_required_str, get_session, get_term, to_json, with_db};
use crate::ipc::types::{AppState, Request};
use rusqlite::Connection;
use serde_json::{json, Value};

fn attendance_upsert(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let student_id = get_required_str(params, "studentId")?;
    let term = get_term(params)?;
    let session = get_session(params)?;
    let entry = attendance::upsert_attendance(
        conn,
        &student_id,
        term,
        &session,
        get_required_i64(params, "daysOpened")?,
        get_required_i64(params, "daysPresent")?,
    )?;
    Ok(json!({ "entry": to_json(&entry)? }))
}

// `entry: null` means nothing recorded, which callers must not read as zero attendance.
fn attendance_get(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let student_id = get_required_str(params, "studentId")?;
    let entry =
        attendance::get_attendance(conn, &student_id, get_term(params)?, &get_session(params)?)?;
    Ok(json!({ "entry": to_json(&entry)? }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    match req.method.as_str() {
        "attendance.upsert" => Some(with_db(state, req, attendance_upsert)),
        "attendance.get" => Some(with_db(state, req, attendance_get)),
        _ => None,
    }
}
