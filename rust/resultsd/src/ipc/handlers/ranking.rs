use crate::ipc::error::HandlerErr;
use crate::ipc::helpers::{get_required_str, get_session, get_term, to_json, with_db};
use crate::ipc::types::{AppState, Request};
use crate::ranking;
use rusqlite::Connection;
use serde_json::Value;

fn ranking_class(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let ranking = ranking::rank_class(
        conn,
        &get_required_str(params, "className")?,
        get_term(params)?,
        &get_session(params)?,
    )?;
    to_json(&ranking)
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    match req.method.as_str() {
        "ranking.class" => Some(with_db(state, req, ranking_class)),
        _ => None,
    }
}
