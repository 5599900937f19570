use crate::ipc::error::HandlerErr;
use crate::ipc::helpers::{to_json, with_db};
use crate::ipc::types::{AppState, Request};
use crate::roster;
use rusqlite::Connection;
use serde_json::json;

fn classes_list(conn: &Connection, _params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let classes = roster::class_counts(conn)?;
    Ok(json!({ "classes": to_json(&classes)? }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "classes.list" => Some(with_db(state, req, classes_list)),
        _ => None,
    }
}
