use crate::ipc::error::HandlerErr;
use crate::ipc::helpers::{get_optional_bool, get_optional_str, get_required_str, to_json, with_db};
use crate::ipc::types::{AppState, Request};
use crate::roster::{self, NewStudent, StudentUpdate};
use rusqlite::Connection;
use serde_json::{json, Value};

fn students_create(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let student = roster::create_student(
        conn,
        NewStudent {
            id: get_required_str(params, "studentId")?,
            full_name: get_required_str(params, "fullName")?,
            class_name: get_required_str(params, "className")?,
            gender: get_optional_str(params, "gender")?,
            picture: get_optional_str(params, "picture")?,
        },
    )?;
    Ok(json!({ "student": to_json(&student)? }))
}

fn students_list(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let class_name = get_optional_str(params, "className")?;
    let include_inactive = get_optional_bool(params, "includeInactive")?.unwrap_or(false);
    let students = roster::list_students(conn, class_name.as_deref(), include_inactive)?;
    Ok(json!({ "students": to_json(&students)? }))
}

fn students_get(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let student = roster::get_student(conn, &get_required_str(params, "studentId")?)?;
    Ok(json!({ "student": to_json(&student)? }))
}

fn students_update(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let student_id = get_required_str(params, "studentId")?;
    let Some(patch) = params.get("patch").filter(|p| p.is_object()) else {
        return Err(HandlerErr::bad_params("missing patch"));
    };
    let update = StudentUpdate {
        full_name: get_optional_str(patch, "fullName")?,
        class_name: get_optional_str(patch, "className")?,
        gender: get_optional_str(patch, "gender")?,
        picture: get_optional_str(patch, "picture")?,
        active: get_optional_bool(patch, "active")?,
    };
    let student = roster::update_student(conn, &student_id, update)?;
    Ok(json!({ "student": to_json(&student)? }))
}

fn students_deactivate(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let student = roster::deactivate_student(conn, &get_required_str(params, "studentId")?)?;
    Ok(json!({ "student": to_json(&student)? }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    match req.method.as_str() {
        "students.create" => Some(with_db(state, req, students_create)),
        "students.list" => Some(with_db(state, req, students_list)),
        "students.get" => Some(with_db(state, req, students_get)),
        "students.update" => Some(with_db(state, req, students_update)),
        "students.deactivate" => Some(with_db(state, req, students_deactivate)),
        _ => None,
    }
}
