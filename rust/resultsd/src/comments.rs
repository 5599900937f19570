use crate::db::now_timestamp;
use crate::error::{ResultsError, ResultsResult};
use crate::model::{Session, Term};
use crate::roster;
use crate::scores::term_from_column;
use rusqlite::{Connection, OptionalExtension};
use serde::Serialize;
use serde_json::json;

const MAX_COMMENT_CHARS: usize = 2000;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportComments {
    pub student_id: String,
    pub term: Term,
    pub session: String,
    pub teacher_comment: String,
    pub head_teacher_comment: String,
    pub updated_at: String,
}

/// Partial update: `None` keeps the stored text (or empty for a new row).
#[derive(Debug, Clone, Default)]
pub struct CommentsUpdate {
    pub teacher_comment: Option<String>,
    pub head_teacher_comment: Option<String>,
}

fn check_len(field: &str, text: &str) -> ResultsResult<()> {
    let n = text.chars().count();
    if n > MAX_COMMENT_CHARS {
        return Err(ResultsError::validation_with(
            format!("{} is too long", field),
            json!({ "field": field, "length": n, "max": MAX_COMMENT_CHARS }),
        ));
    }
    Ok(())
}

pub fn upsert_comments(
    conn: &Connection,
    student_id: &str,
    term: Term,
    session: &Session,
    update: CommentsUpdate,
) -> ResultsResult<ReportComments> {
    roster::get_student(conn, student_id)?;
    let existing = get_comments(conn, student_id, term, session)?;

    let teacher = update
        .teacher_comment
        .map(|s| s.trim().to_string())
        .or_else(|| existing.as_ref().map(|c| c.teacher_comment.clone()))
        .unwrap_or_default();
    let head = update
        .head_teacher_comment
        .map(|s| s.trim().to_string())
        .or_else(|| existing.as_ref().map(|c| c.head_teacher_comment.clone()))
        .unwrap_or_default();
    check_len("teacherComment", &teacher)?;
    check_len("headTeacherComment", &head)?;

    conn.execute(
        "INSERT INTO report_comments(student_id, term, session, teacher_comment, head_teacher_comment, updated_at)
         VALUES(?, ?, ?, ?, ?, ?)
         ON CONFLICT(student_id, term, session) DO UPDATE SET
           teacher_comment = excluded.teacher_comment,
           head_teacher_comment = excluded.head_teacher_comment,
           updated_at = excluded.updated_at
         WHERE report_comments.teacher_comment <> excluded.teacher_comment
            OR report_comments.head_teacher_comment <> excluded.head_teacher_comment",
        (
            student_id,
            term.index(),
            session.as_str(),
            &teacher,
            &head,
            now_timestamp(),
        ),
    )?;
    get_comments(conn, student_id, term, session)?
        .ok_or_else(|| ResultsError::not_found("report comments"))
}

pub fn get_comments(
    conn: &Connection,
    student_id: &str,
    term: Term,
    session: &Session,
) -> ResultsResult<Option<ReportComments>> {
    Ok(conn
        .query_row(
            "SELECT student_id, term, session, teacher_comment, head_teacher_comment, updated_at
             FROM report_comments
             WHERE student_id = ? AND term = ? AND session = ?",
            (student_id, term.index(), session.as_str()),
            |r| {
                Ok(ReportComments {
                    student_id: r.get(0)?,
                    term: term_from_column(r, 1)?,
                    session: r.get(2)?,
                    teacher_comment: r.get(3)?,
                    head_teacher_comment: r.get(4)?,
                    updated_at: r.get(5)?,
                })
            },
        )
        .optional()?)
}
