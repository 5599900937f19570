use crate::db::now_timestamp;
use crate::error::{ResultsError, ResultsResult};
use crate::model::{require_class, Session, Student, StudentStatus, Subject, Term};
use rusqlite::{Connection, OptionalExtension, Row};
use serde_json::json;
use uuid::Uuid;

const STUDENT_COLUMNS: &str = "id, full_name, class_name, gender, picture, active, status";

fn student_from_row(r: &Row<'_>) -> rusqlite::Result<Student> {
    let status: String = r.get(6)?;
    Ok(Student {
        id: r.get(0)?,
        full_name: r.get(1)?,
        class_name: r.get(2)?,
        gender: r.get(3)?,
        picture: r.get(4)?,
        active: r.get::<_, i64>(5)? != 0,
        status: StudentStatus::from_db(&status),
    })
}

fn non_empty(v: Option<String>) -> Option<String> {
    v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

#[derive(Debug, Clone, Default)]
pub struct NewStudent {
    pub id: String,
    pub full_name: String,
    pub class_name: String,
    pub gender: Option<String>,
    pub picture: Option<String>,
}

pub fn create_student(conn: &Connection, new: NewStudent) -> ResultsResult<Student> {
    let id = new.id.trim().to_string();
    let full_name = new.full_name.trim().to_string();
    if id.is_empty() {
        return Err(ResultsError::validation("student id must not be empty"));
    }
    if full_name.is_empty() {
        return Err(ResultsError::validation("fullName must not be empty"));
    }
    let class_name = require_class(&new.class_name)?;
    if find_student(conn, &id)?.is_some() {
        return Err(ResultsError::conflict(
            "a student with this id already exists",
            Some(json!({ "studentId": id })),
        ));
    }

    conn.execute(
        "INSERT INTO students(id, full_name, class_name, gender, picture, active, status, created_at)
         VALUES(?, ?, ?, ?, ?, 1, 'active', ?)",
        (
            &id,
            &full_name,
            class_name,
            non_empty(new.gender),
            non_empty(new.picture),
            now_timestamp(),
        ),
    )?;
    tracing::info!(student_id = %id, class = class_name, "student created");
    get_student(conn, &id)
}

pub fn find_student(conn: &Connection, student_id: &str) -> ResultsResult<Option<Student>> {
    let sql = format!("SELECT {} FROM students WHERE id = ?", STUDENT_COLUMNS);
    Ok(conn
        .query_row(&sql, [student_id], student_from_row)
        .optional()?)
}

pub fn get_student(conn: &Connection, student_id: &str) -> ResultsResult<Student> {
    find_student(conn, student_id)?.ok_or_else(|| ResultsError::not_found("student"))
}

/// Students ordered by name. `class_name = None` lists the whole school.
pub fn list_students(
    conn: &Connection,
    class_name: Option<&str>,
    include_inactive: bool,
) -> ResultsResult<Vec<Student>> {
    let class_name = class_name.map(require_class).transpose()?;
    let sql = format!(
        "SELECT {}
         FROM students
         WHERE (?1 IS NULL OR class_name = ?1)
           AND (?2 = 1 OR active = 1)
         ORDER BY full_name, id",
        STUDENT_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map((class_name, include_inactive as i64), student_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Members of a class for one term of a session, ordered by id.
///
/// A student belongs to the cohort when they were scored on one of the class's
/// subjects that term, or when they are an active member of the class today and
/// hold no scores anywhere for that term. Graduates stay in the cohorts they were
/// scored in; deactivated students drop out of every cohort.
pub fn term_cohort(
    conn: &Connection,
    class_name: &str,
    term: Term,
    session: &Session,
) -> ResultsResult<Vec<Student>> {
    let sql = format!(
        "SELECT {}
         FROM students st
         WHERE st.status IN ('active', 'graduated')
           AND (
             EXISTS (
               SELECT 1 FROM academic_scores s
               JOIN subjects sub ON sub.id = s.subject_id
               WHERE s.student_id = st.id AND sub.class_name = ?1
                 AND s.term = ?2 AND s.session = ?3
             )
             OR (
               st.class_name = ?1 AND st.active = 1
               AND NOT EXISTS (
                 SELECT 1 FROM academic_scores s
                 WHERE s.student_id = st.id AND s.term = ?2 AND s.session = ?3
               )
             )
           )
         ORDER BY st.id",
        STUDENT_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map((class_name, term.index(), session.as_str()), student_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// The class a student sat `term` of `session` in: the class of the subjects they
/// were scored on that term, falling back to their current class.
pub fn class_for_term(
    conn: &Connection,
    student: &Student,
    term: Term,
    session: &Session,
) -> ResultsResult<String> {
    let scored_in: Option<String> = conn
        .query_row(
            "SELECT sub.class_name
             FROM academic_scores s
             JOIN subjects sub ON sub.id = s.subject_id
             WHERE s.student_id = ? AND s.term = ? AND s.session = ?
             GROUP BY sub.class_name
             ORDER BY COUNT(*) DESC, sub.class_name
             LIMIT 1",
            (&student.id, term.index(), session.as_str()),
            |r| r.get(0),
        )
        .optional()?;
    Ok(scored_in.unwrap_or_else(|| student.class_name.clone()))
}

#[derive(Debug, Clone, Default)]
pub struct StudentUpdate {
    pub full_name: Option<String>,
    pub class_name: Option<String>,
    pub gender: Option<String>,
    pub picture: Option<String>,
    pub active: Option<bool>,
}

pub fn update_student(
    conn: &Connection,
    student_id: &str,
    update: StudentUpdate,
) -> ResultsResult<Student> {
    let current = get_student(conn, student_id)?;

    let full_name = match update.full_name {
        Some(n) if n.trim().is_empty() => {
            return Err(ResultsError::validation("fullName must not be empty"))
        }
        Some(n) => n.trim().to_string(),
        None => current.full_name.clone(),
    };
    let class_name = match update.class_name {
        Some(c) => require_class(&c)?.to_string(),
        None => current.class_name.clone(),
    };
    let gender = match update.gender {
        Some(g) => non_empty(Some(g)),
        None => current.gender.clone(),
    };
    let picture = match update.picture {
        Some(p) => non_empty(Some(p)),
        None => current.picture.clone(),
    };
    let active = update.active.unwrap_or(current.active);
    let status = match (active, current.status) {
        (true, _) => StudentStatus::Active,
        (false, StudentStatus::Graduated) => StudentStatus::Graduated,
        (false, _) => StudentStatus::Inactive,
    };

    conn.execute(
        "UPDATE students
         SET full_name = ?, class_name = ?, gender = ?, picture = ?, active = ?, status = ?, updated_at = ?
         WHERE id = ?",
        (
            &full_name,
            &class_name,
            &gender,
            &picture,
            active as i64,
            status.as_str(),
            now_timestamp(),
            student_id,
        ),
    )?;
    tracing::info!(student_id, class = %class_name, active, "student updated");
    get_student(conn, student_id)
}

/// Students are never deleted; they are switched off and keep their results.
pub fn deactivate_student(conn: &Connection, student_id: &str) -> ResultsResult<Student> {
    update_student(
        conn,
        student_id,
        StudentUpdate {
            active: Some(false),
            ..StudentUpdate::default()
        },
    )
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassCount {
    pub class_name: &'static str,
    pub active_students: i64,
    pub inactive_students: i64,
    pub subject_count: i64,
}

/// Every class on the ladder with its roster counts, in ladder order.
pub fn class_counts(conn: &Connection) -> ResultsResult<Vec<ClassCount>> {
    let mut stmt = conn.prepare(
        "SELECT
           (SELECT COUNT(*) FROM students s WHERE s.class_name = ?1 AND s.active = 1),
           (SELECT COUNT(*) FROM students s WHERE s.class_name = ?1 AND s.active = 0),
           (SELECT COUNT(*) FROM subjects sub WHERE sub.class_name = ?1)",
    )?;
    crate::model::CLASS_LADDER
        .iter()
        .map(|&class_name| -> ResultsResult<ClassCount> {
            let (active, inactive, subjects): (i64, i64, i64) =
                stmt.query_row([class_name], |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)))?;
            Ok(ClassCount {
                class_name,
                active_students: active,
                inactive_students: inactive,
                subject_count: subjects,
            })
        })
        .collect()
}

fn subject_from_row(r: &Row<'_>) -> rusqlite::Result<Subject> {
    Ok(Subject {
        id: r.get(0)?,
        name: r.get(1)?,
        class_name: r.get(2)?,
    })
}

pub fn create_subject(conn: &Connection, class_name: &str, name: &str) -> ResultsResult<Subject> {
    let class_name = require_class(class_name)?;
    let name = name.trim();
    if name.is_empty() {
        return Err(ResultsError::validation("subject name must not be empty"));
    }
    let existing: Option<String> = conn
        .query_row(
            "SELECT id FROM subjects WHERE class_name = ? AND name = ? COLLATE NOCASE",
            (class_name, name),
            |r| r.get(0),
        )
        .optional()?;
    if let Some(existing_id) = existing {
        return Err(ResultsError::conflict(
            "subject already exists for this class",
            Some(json!({ "subjectId": existing_id })),
        ));
    }

    let id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO subjects(id, class_name, name, created_at) VALUES(?, ?, ?, ?)",
        (&id, class_name, name, now_timestamp()),
    )?;
    tracing::info!(subject_id = %id, class = class_name, name, "subject created");
    Ok(Subject {
        id,
        name: name.to_string(),
        class_name: class_name.to_string(),
    })
}

pub fn get_subject(conn: &Connection, subject_id: &str) -> ResultsResult<Subject> {
    conn.query_row(
        "SELECT id, name, class_name FROM subjects WHERE id = ?",
        [subject_id],
        subject_from_row,
    )
    .optional()?
    .ok_or_else(|| ResultsError::not_found("subject"))
}

pub fn list_subjects(conn: &Connection, class_name: &str) -> ResultsResult<Vec<Subject>> {
    let class_name = require_class(class_name)?;
    let mut stmt = conn.prepare(
        "SELECT id, name, class_name FROM subjects WHERE class_name = ? ORDER BY name",
    )?;
    let rows = stmt
        .query_map([class_name], subject_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Refused with a conflict while any score row references the subject.
pub fn delete_subject(conn: &Connection, subject_id: &str) -> ResultsResult<()> {
    get_subject(conn, subject_id)?;
    let referencing: i64 = conn.query_row(
        "SELECT COUNT(*) FROM academic_scores WHERE subject_id = ?",
        [subject_id],
        |r| r.get(0),
    )?;
    if referencing > 0 {
        return Err(ResultsError::conflict(
            "subject has recorded scores and cannot be deleted",
            Some(json!({ "subjectId": subject_id, "scoreCount": referencing })),
        ));
    }
    conn.execute("DELETE FROM subjects WHERE id = ?", [subject_id])?;
    tracing::info!(subject_id, "subject deleted");
    Ok(())
}
