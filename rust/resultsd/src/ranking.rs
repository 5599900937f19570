//! Class positions for a term.
//!
//! Positions use standard competition ranking over each student's overall term
//! total: equal totals share a position and the next distinct total skips the
//! tied places, so `[90, 90, 80, 70]` ranks `[1, 1, 3, 4]`. Rows with equal totals
//! are ordered by student id, which keeps the output (and its hash) identical
//! across calls over the same stored scores.
//!
//! The cohort is the class as it stood that term (see [`roster::term_cohort`]), and
//! each total only counts the class's own subjects, so rankings of past sessions
//! survive promotion. Students with no subject entries for the term are listed
//! without a position and do not count towards `rankedCount` or `classAverage`.

use crate::calc::{aggregate_student_term, mean, round_2dp};
use crate::error::ResultsResult;
use crate::model::{require_class, Session, Term};
use crate::roster;
use rusqlite::Connection;
use serde::Serialize;
use sha2::{Digest, Sha256};

/// Positions for totals already sorted in descending order.
pub fn competition_positions(sorted_totals: &[i64]) -> Vec<i64> {
    let mut out: Vec<i64> = Vec::with_capacity(sorted_totals.len());
    for (i, total) in sorted_totals.iter().enumerate() {
        let pos = match (i.checked_sub(1), out.last()) {
            (Some(prev), Some(prev_pos)) if sorted_totals[prev] == *total => *prev_pos,
            _ => i as i64 + 1,
        };
        out.push(pos);
    }
    out
}

pub fn ordinal_label(n: i64) -> String {
    let suffix = match (n % 10, n % 100) {
        (_, 11..=13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    };
    format!("{}{}", n, suffix)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedStudent {
    pub student_id: String,
    pub full_name: String,
    pub term_total_score: i64,
    pub subjects_count: i64,
    pub percentage: f64,
    pub position: Option<i64>,
    pub position_label: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassRanking {
    pub class_name: String,
    pub term: Term,
    pub session: String,
    pub entries: Vec<RankedStudent>,
    pub ranked_count: i64,
    pub class_size: i64,
    pub class_average: Option<f64>,
    pub snapshot_hash: String,
}

impl ClassRanking {
    pub fn entry_for(&self, student_id: &str) -> Option<&RankedStudent> {
        self.entries.iter().find(|e| e.student_id == student_id)
    }
}

/// Rank a class inside its own read transaction.
pub fn rank_class(
    conn: &Connection,
    class_name: &str,
    term: Term,
    session: &Session,
) -> ResultsResult<ClassRanking> {
    let tx = conn.unchecked_transaction()?;
    let ranking = rank_class_in(&tx, class_name, term, session)?;
    tx.commit()?;
    Ok(ranking)
}

/// Rank a class on a connection whose transaction the caller already holds.
pub fn rank_class_in(
    conn: &Connection,
    class_name: &str,
    term: Term,
    session: &Session,
) -> ResultsResult<ClassRanking> {
    let class_name = require_class(class_name)?;
    let students = roster::term_cohort(conn, class_name, term, session)?;

    let mut ranked = Vec::new();
    let mut unranked = Vec::new();
    for s in students {
        let agg = aggregate_student_term(conn, &s.id, class_name, term, session)?;
        let row = RankedStudent {
            student_id: s.id,
            full_name: s.full_name,
            term_total_score: agg.performance.total_scored,
            subjects_count: agg.performance.subjects_count,
            percentage: agg.performance.percentage,
            position: None,
            position_label: None,
        };
        if row.subjects_count > 0 {
            ranked.push(row);
        } else {
            unranked.push(row);
        }
    }

    ranked.sort_by(|a, b| {
        b.term_total_score
            .cmp(&a.term_total_score)
            .then_with(|| a.student_id.cmp(&b.student_id))
    });
    let totals: Vec<i64> = ranked.iter().map(|r| r.term_total_score).collect();
    for (row, pos) in ranked.iter_mut().zip(competition_positions(&totals)) {
        row.position = Some(pos);
        row.position_label = Some(ordinal_label(pos));
    }

    let percentages: Vec<f64> = ranked.iter().map(|r| r.percentage).collect();
    let class_average = mean(&percentages).map(round_2dp);
    let ranked_count = ranked.len() as i64;

    let mut entries = ranked;
    entries.extend(unranked);
    let snapshot_hash = snapshot_hash(class_name, term, session, &entries);
    tracing::debug!(
        class_name,
        term = %term,
        session = %session,
        ranked_count,
        class_size = entries.len(),
        "class ranked"
    );

    Ok(ClassRanking {
        class_name: class_name.to_string(),
        term,
        session: session.as_str().to_string(),
        class_size: entries.len() as i64,
        entries,
        ranked_count,
        class_average,
        snapshot_hash,
    })
}

fn snapshot_hash(class_name: &str, term: Term, session: &Session, rows: &[RankedStudent]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!("{}\t{}\t{}\n", class_name, term, session));
    for r in rows {
        let pos = r.position.map(|p| p.to_string()).unwrap_or_else(|| "-".into());
        hasher.update(format!("{}\t{}\t{}\n", r.student_id, r.term_total_score, pos));
    }
    format!("{:x}", hasher.finalize())
}
