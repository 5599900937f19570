//! Academic score repository: one row of continuous-assessment tests and exam marks
//! per (student, subject, term, session), with upsert semantics.

use crate::calc;
use crate::db::now_timestamp;
use crate::error::{ResultsError, ResultsResult};
use crate::model::{require_class, Session, Term};
use crate::roster;
use rusqlite::{Connection, OptionalExtension, Row};
use serde::Serialize;
use serde_json::json;
use uuid::Uuid;

pub const PT_MAX: i64 = 30;
pub const EXAM_MAX: i64 = 70;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoreMarks {
    pub pt1: i64,
    pub pt2: i64,
    pub pt3: i64,
    pub exam: i64,
}

impl ScoreMarks {
    pub fn validate(&self) -> ResultsResult<()> {
        let fields = [
            ("pt1", self.pt1, PT_MAX),
            ("pt2", self.pt2, PT_MAX),
            ("pt3", self.pt3, PT_MAX),
            ("exam", self.exam, EXAM_MAX),
        ];
        for (field, value, max) in fields {
            if !(0..=max).contains(&value) {
                return Err(ResultsError::validation_with(
                    format!("{} must be between 0 and {}", field, max),
                    json!({ "field": field, "value": value, "max": max }),
                ));
            }
        }
        Ok(())
    }

    pub fn avg_pt(&self) -> i64 {
        calc::avg_pt(self.pt1, self.pt2, self.pt3)
    }

    pub fn total(&self) -> i64 {
        calc::subject_total(self.pt1, self.pt2, self.pt3, self.exam)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AcademicScoreEntry {
    pub id: String,
    pub student_id: String,
    pub subject_id: String,
    pub subject_name: String,
    pub term: Term,
    pub session: String,
    pub pt1: i64,
    pub pt2: i64,
    pub pt3: i64,
    pub exam: i64,
    pub avg_pt: i64,
    pub total_score: i64,
    pub approved: bool,
    pub updated_at: String,
}

impl AcademicScoreEntry {
    pub fn marks(&self) -> ScoreMarks {
        ScoreMarks {
            pt1: self.pt1,
            pt2: self.pt2,
            pt3: self.pt3,
            exam: self.exam,
        }
    }
}

const ENTRY_SELECT: &str = "SELECT s.id, s.student_id, s.subject_id, sub.name, s.term, s.session,
        s.pt1, s.pt2, s.pt3, s.exam, s.approved, s.updated_at
     FROM academic_scores s
     JOIN subjects sub ON sub.id = s.subject_id";

pub(crate) fn term_from_column(r: &Row<'_>, idx: usize) -> rusqlite::Result<Term> {
    let raw: i64 = r.get(idx)?;
    Term::from_index(raw).ok_or(rusqlite::Error::IntegralValueOutOfRange(idx, raw))
}

fn entry_from_row(r: &Row<'_>) -> rusqlite::Result<AcademicScoreEntry> {
    let marks = ScoreMarks {
        pt1: r.get(6)?,
        pt2: r.get(7)?,
        pt3: r.get(8)?,
        exam: r.get(9)?,
    };
    Ok(AcademicScoreEntry {
        id: r.get(0)?,
        student_id: r.get(1)?,
        subject_id: r.get(2)?,
        subject_name: r.get(3)?,
        term: term_from_column(r, 4)?,
        session: r.get(5)?,
        pt1: marks.pt1,
        pt2: marks.pt2,
        pt3: marks.pt3,
        exam: marks.exam,
        avg_pt: marks.avg_pt(),
        total_score: marks.total(),
        approved: r.get::<_, i64>(10)? != 0,
        updated_at: r.get(11)?,
    })
}

#[derive(Debug, Clone, Copy)]
pub struct ScoreKey<'a> {
    pub student_id: &'a str,
    pub subject_id: &'a str,
    pub term: Term,
    pub session: &'a Session,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpsertOutcome {
    pub entry: AcademicScoreEntry,
    /// False when the submitted marks equal the stored ones; the row is then untouched.
    pub changed: bool,
}

/// Insert or overwrite the marks for one key. Identical re-submissions leave the row
/// (including `updatedAt` and the approval flag) exactly as it was; changed marks
/// clear the approval.
pub fn upsert_academic_score(
    conn: &Connection,
    key: &ScoreKey<'_>,
    marks: ScoreMarks,
) -> ResultsResult<UpsertOutcome> {
    marks.validate()?;
    let student = roster::get_student(conn, key.student_id)?;
    let subject = roster::get_subject(conn, key.subject_id)?;
    let term_class = roster::class_for_term(conn, &student, key.term, key.session)?;
    if subject.class_name != term_class {
        return Err(ResultsError::validation_with(
            "subject does not belong to the student's class for that term",
            json!({
                "subjectId": subject.id,
                "subjectClass": subject.class_name,
                "studentClass": term_class,
            }),
        ));
    }

    let changed = conn.execute(
        "INSERT INTO academic_scores(id, student_id, subject_id, term, session, pt1, pt2, pt3, exam, approved, updated_at)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, 0, ?)
         ON CONFLICT(student_id, subject_id, term, session) DO UPDATE SET
           pt1 = excluded.pt1,
           pt2 = excluded.pt2,
           pt3 = excluded.pt3,
           exam = excluded.exam,
           approved = 0,
           updated_at = excluded.updated_at
         WHERE academic_scores.pt1 <> excluded.pt1
            OR academic_scores.pt2 <> excluded.pt2
            OR academic_scores.pt3 <> excluded.pt3
            OR academic_scores.exam <> excluded.exam",
        (
            Uuid::new_v4().to_string(),
            key.student_id,
            key.subject_id,
            key.term.index(),
            key.session.as_str(),
            marks.pt1,
            marks.pt2,
            marks.pt3,
            marks.exam,
            now_timestamp(),
        ),
    )? > 0;

    let entry = get_score(conn, key)?.ok_or_else(|| ResultsError::not_found("score"))?;
    if changed {
        tracing::info!(
            student_id = key.student_id,
            subject_id = key.subject_id,
            term = %key.term,
            session = %key.session,
            total = entry.total_score,
            "academic score recorded"
        );
    } else {
        tracing::debug!(
            student_id = key.student_id,
            subject_id = key.subject_id,
            "academic score unchanged"
        );
    }
    Ok(UpsertOutcome { entry, changed })
}

pub fn get_score(conn: &Connection, key: &ScoreKey<'_>) -> ResultsResult<Option<AcademicScoreEntry>> {
    let sql = format!(
        "{} WHERE s.student_id = ? AND s.subject_id = ? AND s.term = ? AND s.session = ?",
        ENTRY_SELECT
    );
    Ok(conn
        .query_row(
            &sql,
            (
                key.student_id,
                key.subject_id,
                key.term.index(),
                key.session.as_str(),
            ),
            entry_from_row,
        )
        .optional()?)
}

/// All subject rows of one student for a term, ordered by subject name.
pub fn get_scores_for(
    conn: &Connection,
    student_id: &str,
    term: Term,
    session: &Session,
) -> ResultsResult<Vec<AcademicScoreEntry>> {
    roster::get_student(conn, student_id)?;
    let sql = format!(
        "{} WHERE s.student_id = ? AND s.term = ? AND s.session = ? ORDER BY sub.name, s.subject_id",
        ENTRY_SELECT
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map((student_id, term.index(), session.as_str()), entry_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Rows recorded against one subject of `class_name`, whatever class the
/// students have moved on to since.
pub fn get_scores_for_class(
    conn: &Connection,
    class_name: &str,
    subject_id: &str,
    term: Term,
    session: &Session,
) -> ResultsResult<Vec<AcademicScoreEntry>> {
    let class_name = require_class(class_name)?;
    let subject = roster::get_subject(conn, subject_id)?;
    if subject.class_name != class_name {
        return Err(ResultsError::validation_with(
            "subject does not belong to this class",
            json!({ "subjectId": subject_id, "subjectClass": subject.class_name, "className": class_name }),
        ));
    }
    let sql = format!(
        "{} WHERE s.subject_id = ? AND s.term = ? AND s.session = ?
         ORDER BY s.student_id",
        ENTRY_SELECT
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(
            (subject_id, term.index(), session.as_str()),
            entry_from_row,
        )?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn approve_result(conn: &Connection, result_id: &str) -> ResultsResult<AcademicScoreEntry> {
    let updated = conn.execute(
        "UPDATE academic_scores SET approved = 1 WHERE id = ?",
        [result_id],
    )?;
    if updated == 0 {
        return Err(ResultsError::not_found("result"));
    }
    tracing::info!(result_id, "result approved");
    let sql = format!("{} WHERE s.id = ?", ENTRY_SELECT);
    Ok(conn.query_row(&sql, [result_id], entry_from_row)?)
}

#[derive(Debug, Clone, Default)]
pub struct ResultFilter {
    pub class_name: Option<String>,
    pub term: Option<Term>,
    pub session: Option<Session>,
    pub approved: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultListRow {
    #[serde(flatten)]
    pub entry: AcademicScoreEntry,
    pub student_name: String,
    pub student_class: String,
}

pub fn list_results(conn: &Connection, filter: &ResultFilter) -> ResultsResult<Vec<ResultListRow>> {
    let class_name = filter.class_name.as_deref().map(require_class).transpose()?;
    let mut stmt = conn.prepare(
        "SELECT s.id, s.student_id, s.subject_id, sub.name, s.term, s.session,
                s.pt1, s.pt2, s.pt3, s.exam, s.approved, s.updated_at,
                st.full_name, st.class_name
         FROM academic_scores s
         JOIN subjects sub ON sub.id = s.subject_id
         JOIN students st ON st.id = s.student_id
         WHERE (?1 IS NULL OR sub.class_name = ?1)
           AND (?2 IS NULL OR s.term = ?2)
           AND (?3 IS NULL OR s.session = ?3)
           AND (?4 IS NULL OR s.approved = ?4)
         ORDER BY s.session DESC, s.term DESC, sub.class_name, st.full_name, sub.name",
    )?;
    let rows = stmt
        .query_map(
            (
                class_name,
                filter.term.map(Term::index),
                filter.session.as_ref().map(Session::as_str),
                filter.approved.map(|a| a as i64),
            ),
            |r| {
                Ok(ResultListRow {
                    entry: entry_from_row(r)?,
                    student_name: r.get(12)?,
                    student_class: r.get(13)?,
                })
            },
        )?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultStats {
    pub total: i64,
    pub approved: i64,
    pub pending: i64,
    pub average_total_score: Option<f64>,
}

pub fn result_stats(conn: &Connection) -> ResultsResult<ResultStats> {
    let mut stmt = conn.prepare("SELECT pt1, pt2, pt3, exam, approved FROM academic_scores")?;
    let rows = stmt
        .query_map([], |r| {
            Ok((
                ScoreMarks {
                    pt1: r.get(0)?,
                    pt2: r.get(1)?,
                    pt3: r.get(2)?,
                    exam: r.get(3)?,
                },
                r.get::<_, i64>(4)? != 0,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let total = rows.len() as i64;
    let approved = rows.iter().filter(|(_, a)| *a).count() as i64;
    let totals: Vec<f64> = rows.iter().map(|(m, _)| m.total() as f64).collect();
    Ok(ResultStats {
        total,
        approved,
        pending: total - approved,
        average_total_score: calc::mean(&totals).map(calc::round_2dp),
    })
}
