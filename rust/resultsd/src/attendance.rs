use crate::calc::round_2dp;
use crate::db::now_timestamp;
use crate::error::{ResultsError, ResultsResult};
use crate::model::{Session, Term};
use crate::roster;
use crate::scores::term_from_column;
use rusqlite::{Connection, OptionalExtension};
use serde::Serialize;
use serde_json::json;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceEntry {
    pub student_id: String,
    pub term: Term,
    pub session: String,
    pub days_opened: i64,
    pub days_present: i64,
    pub days_absent: i64,
    pub present_percentage: f64,
    pub updated_at: String,
}

fn validate_days(days_opened: i64, days_present: i64) -> ResultsResult<()> {
    if days_opened < 1 {
        return Err(ResultsError::validation_with(
            "daysOpened must be at least 1",
            json!({ "field": "daysOpened", "value": days_opened }),
        ));
    }
    if !(0..=days_opened).contains(&days_present) {
        return Err(ResultsError::validation_with(
            "daysPresent must be between 0 and daysOpened",
            json!({ "field": "daysPresent", "value": days_present, "max": days_opened }),
        ));
    }
    Ok(())
}

pub fn upsert_attendance(
    conn: &Connection,
    student_id: &str,
    term: Term,
    session: &Session,
    days_opened: i64,
    days_present: i64,
) -> ResultsResult<AttendanceEntry> {
    validate_days(days_opened, days_present)?;
    roster::get_student(conn, student_id)?;
    let changed = conn.execute(
        "INSERT INTO attendance_entries(student_id, term, session, days_opened, days_present, updated_at)
         VALUES(?, ?, ?, ?, ?, ?)
         ON CONFLICT(student_id, term, session) DO UPDATE SET
           days_opened = excluded.days_opened,
           days_present = excluded.days_present,
           updated_at = excluded.updated_at
         WHERE attendance_entries.days_opened <> excluded.days_opened
            OR attendance_entries.days_present <> excluded.days_present",
        (
            student_id,
            term.index(),
            session.as_str(),
            days_opened,
            days_present,
            now_timestamp(),
        ),
    )?;
    if changed > 0 {
        tracing::info!(student_id, days_opened, days_present, "attendance recorded");
    }
    get_attendance(conn, student_id, term, session)?
        .ok_or_else(|| ResultsError::not_found("attendance entry"))
}

pub fn get_attendance(
    conn: &Connection,
    student_id: &str,
    term: Term,
    session: &Session,
) -> ResultsResult<Option<AttendanceEntry>> {
    Ok(conn
        .query_row(
            "SELECT student_id, term, session, days_opened, days_present, updated_at
             FROM attendance_entries
             WHERE student_id = ? AND term = ? AND session = ?",
            (student_id, term.index(), session.as_str()),
            |r| {
                let days_opened: i64 = r.get(3)?;
                let days_present: i64 = r.get(4)?;
                Ok(AttendanceEntry {
                    student_id: r.get(0)?,
                    term: term_from_column(r, 1)?,
                    session: r.get(2)?,
                    days_opened,
                    days_present,
                    days_absent: days_opened - days_present,
                    present_percentage: present_percentage(days_opened, days_present),
                    updated_at: r.get(5)?,
                })
            },
        )
        .optional()?)
}

fn present_percentage(days_opened: i64, days_present: i64) -> f64 {
    if days_opened <= 0 {
        return 0.0;
    }
    round_2dp(days_present as f64 * 100.0 / days_opened as f64)
}
