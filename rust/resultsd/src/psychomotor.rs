//! Behavioural skill ratings recorded once per student per term.

use crate::db::now_timestamp;
use crate::error::ResultsResult;
use crate::model::{Session, SkillGrade, Term};
use crate::roster;
use crate::scores::term_from_column;
use rusqlite::{Connection, OptionalExtension, Row};
use serde::Serialize;

pub const SKILL_NAMES: [&str; 7] = [
    "attendance",
    "punctuality",
    "neatness",
    "honesty",
    "responsibility",
    "creativity",
    "sports",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PsychomotorSkills {
    pub attendance: SkillGrade,
    pub punctuality: SkillGrade,
    pub neatness: SkillGrade,
    pub honesty: SkillGrade,
    pub responsibility: SkillGrade,
    pub creativity: SkillGrade,
    pub sports: SkillGrade,
}

impl PsychomotorSkills {
    /// Build from grades given in [`SKILL_NAMES`] order.
    pub fn from_grades(g: [SkillGrade; 7]) -> Self {
        Self {
            attendance: g[0],
            punctuality: g[1],
            neatness: g[2],
            honesty: g[3],
            responsibility: g[4],
            creativity: g[5],
            sports: g[6],
        }
    }

    fn grades(&self) -> [SkillGrade; 7] {
        [
            self.attendance,
            self.punctuality,
            self.neatness,
            self.honesty,
            self.responsibility,
            self.creativity,
            self.sports,
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PsychomotorEntry {
    pub student_id: String,
    pub term: Term,
    pub session: String,
    #[serde(flatten)]
    pub skills: PsychomotorSkills,
    pub updated_at: String,
}

fn grade_column(r: &Row<'_>, idx: usize) -> rusqlite::Result<SkillGrade> {
    let raw: String = r.get(idx)?;
    SkillGrade::parse(&raw).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            rusqlite::types::Type::Text,
            Box::new(e),
        )
    })
}

fn entry_from_row(r: &Row<'_>) -> rusqlite::Result<PsychomotorEntry> {
    let mut grades = [SkillGrade::F; 7];
    for (i, g) in grades.iter_mut().enumerate() {
        *g = grade_column(r, 3 + i)?;
    }
    Ok(PsychomotorEntry {
        student_id: r.get(0)?,
        term: term_from_column(r, 1)?,
        session: r.get(2)?,
        skills: PsychomotorSkills::from_grades(grades),
        updated_at: r.get(10)?,
    })
}

pub fn upsert_psychomotor(
    conn: &Connection,
    student_id: &str,
    term: Term,
    session: &Session,
    skills: PsychomotorSkills,
) -> ResultsResult<PsychomotorEntry> {
    roster::get_student(conn, student_id)?;
    let g = skills.grades().map(SkillGrade::as_str);
    let changed = conn.execute(
        "INSERT INTO psychomotor_entries(student_id, term, session, attendance, punctuality,
            neatness, honesty, responsibility, creativity, sports, updated_at)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
         ON CONFLICT(student_id, term, session) DO UPDATE SET
           attendance = excluded.attendance,
           punctuality = excluded.punctuality,
           neatness = excluded.neatness,
           honesty = excluded.honesty,
           responsibility = excluded.responsibility,
           creativity = excluded.creativity,
           sports = excluded.sports,
           updated_at = excluded.updated_at
         WHERE psychomotor_entries.attendance <> excluded.attendance
            OR psychomotor_entries.punctuality <> excluded.punctuality
            OR psychomotor_entries.neatness <> excluded.neatness
            OR psychomotor_entries.honesty <> excluded.honesty
            OR psychomotor_entries.responsibility <> excluded.responsibility
            OR psychomotor_entries.creativity <> excluded.creativity
            OR psychomotor_entries.sports <> excluded.sports",
        rusqlite::params![
            student_id,
            term.index(),
            session.as_str(),
            g[0],
            g[1],
            g[2],
            g[3],
            g[4],
            g[5],
            g[6],
            now_timestamp(),
        ],
    )?;
    if changed > 0 {
        tracing::info!(student_id, term = %term, session = %session, "psychomotor ratings recorded");
    }
    get_psychomotor(conn, student_id, term, session)?
        .ok_or_else(|| crate::error::ResultsError::not_found("psychomotor entry"))
}

pub fn get_psychomotor(
    conn: &Connection,
    student_id: &str,
    term: Term,
    session: &Session,
) -> ResultsResult<Option<PsychomotorEntry>> {
    Ok(conn
        .query_row(
            "SELECT student_id, term, session, attendance, punctuality, neatness, honesty,
                    responsibility, creativity, sports, updated_at
             FROM psychomotor_entries
             WHERE student_id = ? AND term = ? AND session = ?",
            (student_id, term.index(), session.as_str()),
            entry_from_row,
        )
        .optional()?)
}
