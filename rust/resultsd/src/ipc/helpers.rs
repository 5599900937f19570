use super::error::{err, ok, HandlerErr};
use super::types::{AppState, Request};
use crate::model::{Session, Term};
use rusqlite::Connection;
use serde::Serialize;
use serde_json::Value;

/// Run a handler against the open workspace database.
pub fn with_db(
    state: &AppState,
    req: &Request,
    f: impl FnOnce(&Connection, &Value) -> Result<Value, HandlerErr>,
) -> Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match f(conn, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(error) => {
            tracing::debug!(method = %req.method, code = error.code, "request failed");
            error.response(&req.id)
        }
    }
}

pub fn to_json<T: Serialize>(value: &T) -> Result<Value, HandlerErr> {
    Ok(serde_json::to_value(value)?)
}

pub fn get_required_str(params: &Value, key: &str) -> Result<String, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| HandlerErr::bad_params(format!("missing {}", key)))
}

/// Absent or null reads as `None`; any other non-string is rejected.
pub fn get_optional_str(params: &Value, key: &str) -> Result<Option<String>, HandlerErr> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(HandlerErr::bad_params(format!("{} must be a string", key))),
    }
}

pub fn get_required_i64(params: &Value, key: &str) -> Result<i64, HandlerErr> {
    match params.get(key) {
        Some(v) => v
            .as_i64()
            .ok_or_else(|| HandlerErr::bad_params(format!("{} must be an integer", key))),
        None => Err(HandlerErr::bad_params(format!("missing {}", key))),
    }
}

pub fn get_required_f64(params: &Value, key: &str) -> Result<f64, HandlerErr> {
    match params.get(key) {
        Some(v) => v
            .as_f64()
            .ok_or_else(|| HandlerErr::bad_params(format!("{} must be a number", key))),
        None => Err(HandlerErr::bad_params(format!("missing {}", key))),
    }
}

pub fn get_optional_bool(params: &Value, key: &str) -> Result<Option<bool>, HandlerErr> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Bool(b)) => Ok(Some(*b)),
        Some(_) => Err(HandlerErr::bad_params(format!("{} must be a boolean", key))),
    }
}

/// `term` given as a label ("2nd") or a number (2).
pub fn get_term(params: &Value) -> Result<Term, HandlerErr> {
    match params.get("term") {
        Some(Value::String(s)) => Ok(Term::parse(s)?),
        Some(Value::Number(n)) => Ok(Term::parse(&n.to_string())?),
        Some(_) => Err(HandlerErr::bad_params("term must be a string or number")),
        None => Err(HandlerErr::bad_params("missing term")),
    }
}

pub fn get_session(params: &Value) -> Result<Session, HandlerErr> {
    Ok(Session::parse(&get_required_str(params, "session")?)?)
}
