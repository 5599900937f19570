use crate::error::ResultsError;
use crate::ipc::error::HandlerErr;
use crate::ipc::helpers::{get_required_str, get_session, get_term, to_json, with_db};
use crate::ipc::types::{AppState, Request};
use crate::model::SkillGrade;
use crate::psychomotor::{self, PsychomotorSkills, SKILL_NAMES};
use rusqlite::Connection;
use serde_json::{json, Value};

fn parse_skills(params: &Value) -> Result<PsychomotorSkills, HandlerErr> {
    let Some(skills) = params.get("skills").filter(|s| s.is_object()) else {
        return Err(HandlerErr::bad_params("missing skills"));
    };
    let mut grades = [SkillGrade::F; 7];
    for (slot, name) in grades.iter_mut().zip(SKILL_NAMES) {
        let raw = skills.get(name).and_then(|v| v.as_str()).ok_or_else(|| {
            ResultsError::validation_with(
                format!("skills.{} must be one of A..F", name),
                json!({ "field": name }),
            )
        })?;
        *slot = SkillGrade::parse(raw)?;
    }
    Ok(PsychomotorSkills::from_grades(grades))
}

fn psychomotor_upsert(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let student_id = get_required_str(params, "studentId")?;
    let term = get_term(params)?;
    let session = get_session(params)?;
    let skills = parse_skills(params)?;
    let entry = psychomotor::upsert_psychomotor(conn, &student_id, term, &session, skills)?;
    Ok(json!({ "entry": to_json(&entry)? }))
}

fn psychomotor_get(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let student_id = get_required_str(params, "studentId")?;
    let entry =
        psychomotor::get_psychomotor(conn, &student_id, get_term(params)?, &get_session(params)?)?;
    Ok(json!({ "entry": to_json(&entry)? }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    match req.method.as_str() {
        "psychomotor.upsert" => Some(with_db(state, req, psychomotor_upsert)),
        "psychomotor.get" => Some(with_db(state, req, psychomotor_get)),
        _ => None,
    }
}
