use crate::error::ResultsError;
use crate::ipc::error::HandlerErr;
use crate::ipc::helpers::{
    get_optional_bool, get_optional_str, get_required_str, get_session, get_term, to_json, with_db,
};
use crate::ipc::types::{AppState, Request};
use crate::model::Session;
use crate::scores::{self, ResultFilter, ScoreKey, ScoreMarks};
use rusqlite::Connection;
use serde_json::{json, Value};

/// Marks are whole numbers; a fractional or non-numeric mark is a validation error
/// on that field rather than a protocol error.
fn get_mark(params: &Value, key: &str) -> Result<i64, HandlerErr> {
    let Some(v) = params.get(key) else {
        return Err(HandlerErr::bad_params(format!("missing {}", key)));
    };
    v.as_i64().ok_or_else(|| {
        ResultsError::validation_with(
            format!("{} must be a whole number", key),
            json!({ "field": key, "value": v }),
        )
        .into()
    })
}

fn scores_upsert(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let student_id = get_required_str(params, "studentId")?;
    let subject_id = get_required_str(params, "subjectId")?;
    let term = get_term(params)?;
    let session = get_session(params)?;
    let marks = ScoreMarks {
        pt1: get_mark(params, "pt1")?,
        pt2: get_mark(params, "pt2")?,
        pt3: get_mark(params, "pt3")?,
        exam: get_mark(params, "exam")?,
    };
    let outcome = scores::upsert_academic_score(
        conn,
        &ScoreKey {
            student_id: &student_id,
            subject_id: &subject_id,
            term,
            session: &session,
        },
        marks,
    )?;
    to_json(&outcome)
}

fn scores_get(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let student_id = get_required_str(params, "studentId")?;
    let subject_id = get_required_str(params, "subjectId")?;
    let term = get_term(params)?;
    let session = get_session(params)?;
    let entry = scores::get_score(
        conn,
        &ScoreKey {
            student_id: &student_id,
            subject_id: &subject_id,
            term,
            session: &session,
        },
    )?;
    Ok(json!({ "entry": to_json(&entry)? }))
}

fn scores_for_student(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let student_id = get_required_str(params, "studentId")?;
    let entries =
        scores::get_scores_for(conn, &student_id, get_term(params)?, &get_session(params)?)?;
    Ok(json!({ "entries": to_json(&entries)? }))
}

fn scores_for_class(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let entries = scores::get_scores_for_class(
        conn,
        &get_required_str(params, "className")?,
        &get_required_str(params, "subjectId")?,
        get_term(params)?,
        &get_session(params)?,
    )?;
    Ok(json!({ "entries": to_json(&entries)? }))
}

fn results_approve(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let entry = scores::approve_result(conn, &get_required_str(params, "resultId")?)?;
    Ok(json!({ "entry": to_json(&entry)? }))
}

fn results_list(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let term = match params.get("term") {
        None | Some(Value::Null) => None,
        Some(_) => Some(get_term(params)?),
    };
    let session = get_optional_str(params, "session")?
        .map(|s| Session::parse(&s))
        .transpose()?;
    let filter = ResultFilter {
        class_name: get_optional_str(params, "className")?,
        term,
        session,
        approved: get_optional_bool(params, "approved")?,
    };
    let rows = scores::list_results(conn, &filter)?;
    Ok(json!({ "results": to_json(&rows)? }))
}

fn results_stats(conn: &Connection, _params: &Value) -> Result<Value, HandlerErr> {
    to_json(&scores::result_stats(conn)?)
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    match req.method.as_str() {
        "scores.upsert" => Some(with_db(state, req, scores_upsert)),
        "scores.get" => Some(with_db(state, req, scores_get)),
        "scores.forStudent" => Some(with_db(state, req, scores_for_student)),
        "scores.forClass" => Some(with_db(state, req, scores_for_class)),
        "results.approve" => Some(with_db(state, req, results_approve)),
        "results.list" => Some(with_db(state, req, results_list)),
        "results.stats" => Some(with_db(state, req, results_stats)),
        _ => None,
    }
}
