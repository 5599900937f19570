//! Per-student and per-class result payloads.
//!
//! A student report is assembled inside one read transaction from the aggregator,
//! the class ranking, the grading scale and the per-term side records. Apart from
//! the student lookup itself, a section that cannot be fetched is logged and left
//! empty so the rest of the report still renders.

use crate::attendance::{get_attendance, AttendanceEntry};
use crate::calc::{
    aggregate_student_term, subject_class_averages, term_performance, CumulativeOverview,
    SubjectClassAverage, SubjectResult, TermPerformance,
};
use crate::comments::{get_comments, ReportComments};
use crate::error::ResultsResult;
use crate::grading::{load_scale, Grade, GradingScale};
use crate::model::{require_class, Session, Student, Term};
use crate::psychomotor::{get_psychomotor, PsychomotorEntry};
use crate::ranking::{rank_class_in, ClassRanking, RankedStudent};
use crate::roster;
use rusqlite::Connection;
use serde::Serialize;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AcademicRow {
    #[serde(flatten)]
    pub result: SubjectResult,
    pub grade: String,
    pub remark: String,
    pub subject_class_average: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OverallPerformance {
    pub total_scored: i64,
    pub total_obtainable: i64,
    pub subjects_count: i64,
    pub percentage: f64,
    pub grade_of_percentage: Grade,
    pub class_average: Option<f64>,
    pub position: Option<i64>,
    pub position_label: Option<String>,
    pub class_size: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentReport {
    pub student: Student,
    /// Class the term was sat in; differs from `student.className` after a promotion.
    pub class_name: String,
    pub term: Term,
    pub session: String,
    pub academic: Vec<AcademicRow>,
    pub overall: OverallPerformance,
    pub cumulative: Option<CumulativeOverview>,
    pub psychomotor: Option<PsychomotorEntry>,
    pub attendance: Option<AttendanceEntry>,
    pub comments: Option<ReportComments>,
}

fn section<T>(name: &'static str, student_id: &str, res: ResultsResult<T>) -> Option<T> {
    match res {
        Ok(v) => Some(v),
        Err(e) => {
            tracing::warn!(section = name, student_id, error = %e, "report section unavailable");
            None
        }
    }
}

pub fn student_report(
    conn: &Connection,
    student_id: &str,
    term: Term,
    session: &Session,
) -> ResultsResult<StudentReport> {
    let tx = conn.unchecked_transaction()?;
    let report = student_report_in(&tx, student_id, term, session)?;
    tx.commit()?;
    Ok(report)
}

fn student_report_in(
    conn: &Connection,
    student_id: &str,
    term: Term,
    session: &Session,
) -> ResultsResult<StudentReport> {
    let student = roster::get_student(conn, student_id)?;
    let class_name = section(
        "class",
        student_id,
        roster::class_for_term(conn, &student, term, session),
    )
    .unwrap_or_else(|| student.class_name.clone());
    let scale = section("grading", student_id, load_scale(conn)).unwrap_or_default();

    let aggregate = section(
        "academic",
        student_id,
        aggregate_student_term(conn, student_id, &class_name, term, session),
    );
    let class_averages: HashMap<String, f64> = section(
        "subjectClassAverages",
        student_id,
        subject_class_averages(conn, &class_name, term, session),
    )
    .unwrap_or_default()
    .into_iter()
    .map(|a| (a.subject_id, a.class_average))
    .collect();
    let ranking = section(
        "ranking",
        student_id,
        rank_class_in(conn, &class_name, term, session),
    );

    let (subjects, performance, cumulative) = match aggregate {
        Some(a) => (a.subjects, a.performance, a.cumulative),
        None => (Vec::new(), term_performance(&[]), None),
    };
    let academic = subjects
        .into_iter()
        .map(|result| {
            let grade = scale.grade(result.total_score as f64);
            AcademicRow {
                subject_class_average: class_averages.get(&result.subject_id).copied(),
                grade: grade.letter,
                remark: grade.remark,
                result,
            }
        })
        .collect();
    let overall = overall_block(&scale, performance, ranking.as_ref(), student_id);

    Ok(StudentReport {
        psychomotor: section(
            "psychomotor",
            student_id,
            get_psychomotor(conn, student_id, term, session),
        )
        .flatten(),
        attendance: section(
            "attendance",
            student_id,
            get_attendance(conn, student_id, term, session),
        )
        .flatten(),
        comments: section(
            "comments",
            student_id,
            get_comments(conn, student_id, term, session),
        )
        .flatten(),
        student,
        class_name,
        term,
        session: session.as_str().to_string(),
        academic,
        overall,
        cumulative,
    })
}

fn overall_block(
    scale: &GradingScale,
    performance: TermPerformance,
    ranking: Option<&ClassRanking>,
    student_id: &str,
) -> OverallPerformance {
    let entry = ranking.and_then(|r| r.entry_for(student_id));
    OverallPerformance {
        total_scored: performance.total_scored,
        total_obtainable: performance.total_obtainable,
        subjects_count: performance.subjects_count,
        percentage: performance.percentage,
        grade_of_percentage: scale.grade(performance.percentage),
        class_average: ranking.and_then(|r| r.class_average),
        position: entry.and_then(|e| e.position),
        position_label: entry.and_then(|e| e.position_label.clone()),
        class_size: ranking.map(|r| r.class_size),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassResultRow {
    #[serde(flatten)]
    pub ranked: RankedStudent,
    pub grade: Option<Grade>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassResults {
    pub class_name: String,
    pub term: Term,
    pub session: String,
    pub students: Vec<ClassResultRow>,
    pub ranked_count: i64,
    pub class_size: i64,
    pub class_average: Option<f64>,
    pub subject_averages: Vec<SubjectClassAverage>,
    pub snapshot_hash: String,
}

/// Ranking rows of a class, graded by percentage, plus per-subject class averages.
pub fn class_results(
    conn: &Connection,
    class_name: &str,
    term: Term,
    session: &Session,
) -> ResultsResult<ClassResults> {
    let class_name = require_class(class_name)?;
    let tx = conn.unchecked_transaction()?;
    let ranking = rank_class_in(&tx, class_name, term, session)?;
    let subject_averages = subject_class_averages(&tx, class_name, term, session)?;
    let scale = load_scale(&tx)?;
    tx.commit()?;

    let students = ranking
        .entries
        .into_iter()
        .map(|ranked| ClassResultRow {
            grade: ranked.position.map(|_| scale.grade(ranked.percentage)),
            ranked,
        })
        .collect();
    Ok(ClassResults {
        class_name: ranking.class_name,
        term: ranking.term,
        session: ranking.session,
        students,
        ranked_count: ranking.ranked_count,
        class_size: ranking.class_size,
        class_average: ranking.class_average,
        subject_averages,
        snapshot_hash: ranking.snapshot_hash,
    })
}
