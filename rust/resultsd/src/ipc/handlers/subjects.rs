use crate::ipc::error::HandlerErr;
use crate::ipc::helpers::{get_required_str, to_json, with_db};
use crate::ipc::types::{AppState, Request};
use crate::roster;
use rusqlite::Connection;
use serde_json::{json, Value};

fn subjects_create(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let subject = roster::create_subject(
        conn,
        &get_required_str(params, "className")?,
        &get_required_str(params, "name")?,
    )?;
    Ok(json!({ "subject": to_json(&subject)? }))
}

fn subjects_list(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let subjects = roster::list_subjects(conn, &get_required_str(params, "className")?)?;
    Ok(json!({ "subjects": to_json(&subjects)? }))
}

fn subjects_delete(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let subject_id = get_required_str(params, "subjectId")?;
    roster::delete_subject(conn, &subject_id)?;
    Ok(json!({ "deleted": true, "subjectId": subject_id }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    match req.method.as_str() {
        "subjects.create" => Some(with_db(state, req, subjects_create)),
        "subjects.list" => Some(with_db(state, req, subjects_list)),
        "subjects.delete" => Some(with_db(state, req, subjects_delete)),
        _ => None,
    }
}
