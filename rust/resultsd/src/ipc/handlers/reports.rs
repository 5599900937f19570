use crate::ipc::error::HandlerErr;
use crate::ipc::helpers::{get_required_str, get_session, get_term, to_json, with_db};
use crate::ipc::types::{AppState, Request};
use crate::report;
use rusqlite::Connection;
use serde_json::Value;

fn reports_student(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let student_id = get_required_str(params, "studentId")?;
    let r = report::student_report(conn, &student_id, get_term(params)?, &get_session(params)?)?;
    to_json(&r)
}

fn reports_class_results(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let r = report::class_results(
        conn,
        &get_required_str(params, "className")?,
        get_term(params)?,
        &get_session(params)?,
    )?;
    to_json(&r)
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    match req.method.as_str() {
        "reports.student" => Some(with_db(state, req, reports_student)),
        "reports.classResults" => Some(with_db(state, req, reports_class_results)),
        _ => None,
    }
}
