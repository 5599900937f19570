use crate::comments::{self, CommentsUpdate};
use crate::ipc::error::HandlerErr;
use crate::ipc::helpers::{get_optional_str, get_required_str, get_session, get_term, to_json, with_db};
use crate::ipc::types::{AppState, Request};
use rusqlite::Connection;
use serde_json::{json, Value};

fn comments_upsert(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let student_id = get_required_str(params, "studentId")?;
    let term = get_term(params)?;
    let session = get_session(params)?;
    let update = CommentsUpdate {
        teacher_comment: get_optional_str(params, "teacherComment")?,
        head_teacher_comment: get_optional_str(params, "headTeacherComment")?,
    };
    if update.teacher_comment.is_none() && update.head_teacher_comment.is_none() {
        return Err(HandlerErr::bad_params(
            "provide teacherComment or headTeacherComment",
        ));
    }
    let saved = comments::upsert_comments(conn, &student_id, term, &session, update)?;
    Ok(json!({ "comments": to_json(&saved)? }))
}

fn comments_get(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let student_id = get_required_str(params, "studentId")?;
    let saved = comments::get_comments(conn, &student_id, get_term(params)?, &get_session(params)?)?;
    Ok(json!({ "comments": to_json(&saved)? }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    match req.method.as_str() {
        "comments.upsert" => Some(with_db(state, req, comments_upsert)),
        "comments.get" => Some(with_db(state, req, comments_get)),
        _ => None,
    }
}
