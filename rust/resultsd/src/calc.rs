use crate::error::ResultsResult;
use crate::model::{Session, Term};
use crate::scores::{term_from_column, ScoreMarks};
use rusqlite::Connection;
use serde::Serialize;
use std::collections::HashMap;

/// Marks available per subject: three tests and the exam, weighted so that the
/// rounded test average plus the exam is out of 100.
pub const SUBJECT_MAX: i64 = 100;

/// Rounded mean of the three continuous-assessment tests. The sum is an integer, so
/// the mean never lands on .5 and rounding direction is unambiguous.
pub fn avg_pt(pt1: i64, pt2: i64, pt3: i64) -> i64 {
    ((pt1 + pt2 + pt3) as f64 / 3.0).round() as i64
}

pub fn subject_total(pt1: i64, pt2: i64, pt3: i64, exam: i64) -> i64 {
    avg_pt(pt1, pt2, pt3) + exam
}

pub fn round_2dp(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TermPerformance {
    pub total_scored: i64,
    pub total_obtainable: i64,
    pub subjects_count: i64,
    pub percentage: f64,
}

/// Overall performance from the subject totals of one term. No subjects means
/// nothing obtainable and a 0% result.
pub fn term_performance(totals: &[i64]) -> TermPerformance {
    let subjects_count = totals.len() as i64;
    let total_scored: i64 = totals.iter().sum();
    let total_obtainable = subjects_count * SUBJECT_MAX;
    let percentage = if total_obtainable > 0 {
        round_2dp(total_scored as f64 * 100.0 / total_obtainable as f64)
    } else {
        0.0
    };
    TermPerformance {
        total_scored,
        total_obtainable,
        subjects_count,
        percentage,
    }
}

// Prior-term lookups use a nested Option: the outer level says whether the term
// calls for the field at all, the inner one is null when nothing was recorded.

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectResult {
    pub subject_id: String,
    pub subject_name: String,
    pub pt1: i64,
    pub pt2: i64,
    pub pt3: i64,
    pub exam: i64,
    pub avg_pt: i64,
    pub total_score: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_term_subject_total: Option<Option<i64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub second_term_subject_total: Option<Option<i64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cumulative_subject_average: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CumulativeOverview {
    pub first_term_total: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub second_term_total: Option<Option<i64>>,
    pub cumulative_average_percentage: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentTermAggregate {
    pub student_id: String,
    pub term: Term,
    pub session: String,
    pub subjects: Vec<SubjectResult>,
    pub performance: TermPerformance,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cumulative: Option<CumulativeOverview>,
}

struct SubjectTerms {
    subject_id: String,
    subject_name: String,
    marks: [Option<ScoreMarks>; 3],
}

impl SubjectTerms {
    fn total(&self, term: Term) -> Option<i64> {
        self.marks[(term.index() - 1) as usize].map(|m| m.total())
    }
}

/// Academic rows and overall performance of one student for `term`, using every
/// entry of the session up to and including that term on the subjects of
/// `class_name`. Scores taken in another class never leak into this one.
pub fn aggregate_student_term(
    conn: &Connection,
    student_id: &str,
    class_name: &str,
    term: Term,
    session: &Session,
) -> ResultsResult<StudentTermAggregate> {
    let mut stmt = conn.prepare(
        "SELECT s.subject_id, sub.name, s.term, s.pt1, s.pt2, s.pt3, s.exam
         FROM academic_scores s
         JOIN subjects sub ON sub.id = s.subject_id
         WHERE s.student_id = ? AND sub.class_name = ? AND s.session = ? AND s.term <= ?
         ORDER BY sub.name, s.subject_id, s.term",
    )?;
    let rows = stmt
        .query_map((student_id, class_name, session.as_str(), term.index()), |r| {
            Ok((
                r.get::<_, String>(0)?,
                r.get::<_, String>(1)?,
                term_from_column(r, 2)?,
                ScoreMarks {
                    pt1: r.get(3)?,
                    pt2: r.get(4)?,
                    pt3: r.get(5)?,
                    exam: r.get(6)?,
                },
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let mut subjects: Vec<SubjectTerms> = Vec::new();
    let mut by_id: HashMap<String, usize> = HashMap::new();
    for (subject_id, subject_name, row_term, marks) in rows {
        let idx = *by_id.entry(subject_id.clone()).or_insert_with(|| {
            subjects.push(SubjectTerms {
                subject_id,
                subject_name,
                marks: [None; 3],
            });
            subjects.len() - 1
        });
        subjects[idx].marks[(row_term.index() - 1) as usize] = Some(marks);
    }

    let mut results = Vec::new();
    for s in &subjects {
        let Some(current) = s.marks[(term.index() - 1) as usize] else {
            continue;
        };
        let first = (term >= Term::Second).then(|| s.total(Term::First));
        let second = (term == Term::Third).then(|| s.total(Term::Second));
        let cumulative = if term >= Term::Second {
            let available: Vec<f64> = term
                .up_to()
                .iter()
                .filter_map(|t| s.total(*t))
                .map(|t| t as f64)
                .collect();
            mean(&available).map(round_2dp)
        } else {
            None
        };
        results.push(SubjectResult {
            subject_id: s.subject_id.clone(),
            subject_name: s.subject_name.clone(),
            pt1: current.pt1,
            pt2: current.pt2,
            pt3: current.pt3,
            exam: current.exam,
            avg_pt: current.avg_pt(),
            total_score: current.total(),
            first_term_subject_total: first,
            second_term_subject_total: second,
            cumulative_subject_average: cumulative,
        });
    }

    let performance_of = |t: Term| {
        let totals: Vec<i64> = subjects.iter().filter_map(|s| s.total(t)).collect();
        (!totals.is_empty()).then(|| term_performance(&totals))
    };
    let current_totals: Vec<i64> = results.iter().map(|r| r.total_score).collect();
    let performance = term_performance(&current_totals);

    let cumulative = if term >= Term::Second {
        let first = performance_of(Term::First);
        let second = (term == Term::Third).then(|| performance_of(Term::Second));
        let percentages: Vec<f64> = term
            .up_to()
            .iter()
            .filter_map(|t| performance_of(*t))
            .map(|p| p.percentage)
            .collect();
        Some(CumulativeOverview {
            first_term_total: first.map(|p| p.total_scored),
            second_term_total: second.map(|p| p.map(|p| p.total_scored)),
            cumulative_average_percentage: mean(&percentages).map(round_2dp),
        })
    } else {
        None
    };

    Ok(StudentTermAggregate {
        student_id: student_id.to_string(),
        term,
        session: session.as_str().to_string(),
        subjects: results,
        performance,
        cumulative,
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectClassAverage {
    pub subject_id: String,
    pub subject_name: String,
    pub entries: i64,
    pub class_average: f64,
}

/// Mean subject total per subject of a class, over the entries of students who
/// have not been deactivated.
pub fn subject_class_averages(
    conn: &Connection,
    class_name: &str,
    term: Term,
    session: &Session,
) -> ResultsResult<Vec<SubjectClassAverage>> {
    let mut stmt = conn.prepare(
        "SELECT s.subject_id, sub.name, s.pt1, s.pt2, s.pt3, s.exam
         FROM academic_scores s
         JOIN subjects sub ON sub.id = s.subject_id
         JOIN students st ON st.id = s.student_id
         WHERE sub.class_name = ? AND st.status IN ('active', 'graduated')
           AND s.term = ? AND s.session = ?
         ORDER BY sub.name, s.subject_id",
    )?;
    let rows = stmt
        .query_map((class_name, term.index(), session.as_str()), |r| {
            Ok((
                r.get::<_, String>(0)?,
                r.get::<_, String>(1)?,
                ScoreMarks {
                    pt1: r.get(2)?,
                    pt2: r.get(3)?,
                    pt3: r.get(4)?,
                    exam: r.get(5)?,
                },
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let mut out: Vec<(String, String, Vec<f64>)> = Vec::new();
    for (subject_id, subject_name, marks) in rows {
        match out.last_mut() {
            Some((id, _, totals)) if *id == subject_id => totals.push(marks.total() as f64),
            _ => out.push((subject_id, subject_name, vec![marks.total() as f64])),
        }
    }
    Ok(out
        .into_iter()
        .map(|(subject_id, subject_name, totals)| SubjectClassAverage {
            subject_id,
            subject_name,
            entries: totals.len() as i64,
            class_average: mean(&totals).map(round_2dp).unwrap_or(0.0),
        })
        .collect())
}
