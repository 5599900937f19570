//! End-of-session promotion.
//!
//! Every active student moves one class up the ladder, and SS3 students graduate
//! (inactive, status `graduated`). The batch works from a roster snapshot taken
//! before the first update, so a student promoted into a class later in the same
//! run is not promoted again. Each student is committed in its own transaction; a
//! failure is recorded as skipped and the batch carries on.

use crate::db::now_timestamp;
use crate::error::{ResultsError, ResultsResult};
use crate::model::{next_step, require_class, NextStep, Student, StudentStatus};
use crate::roster;
use rusqlite::Connection;
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PromotionOutcome {
    Promoted,
    Graduated,
    Skipped,
}

impl PromotionOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            PromotionOutcome::Promoted => "promoted",
            PromotionOutcome::Graduated => "graduated",
            PromotionOutcome::Skipped => "skipped",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PromotionDetail {
    pub student_id: String,
    pub full_name: String,
    pub from_class: String,
    pub to_class: Option<String>,
    pub outcome: PromotionOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PromotionReport {
    pub promoted_count: i64,
    pub graduated_count: i64,
    pub skipped_count: i64,
    pub details: Vec<PromotionDetail>,
}

pub fn promote_students(conn: &Connection, class_name: Option<&str>) -> ResultsResult<PromotionReport> {
    let scope = class_name.map(require_class).transpose()?;
    let snapshot = roster::list_students(conn, scope, false)?;
    tracing::info!(scope = scope.unwrap_or("all"), students = snapshot.len(), "promotion started");

    let mut report = PromotionReport {
        promoted_count: 0,
        graduated_count: 0,
        skipped_count: 0,
        details: Vec::with_capacity(snapshot.len()),
    };
    for student in snapshot {
        let detail = match promote_one(conn, &student) {
            Ok(d) => d,
            Err(e) => {
                tracing::error!(student_id = %student.id, error = %e, "promotion failed for student");
                PromotionDetail {
                    student_id: student.id.clone(),
                    full_name: student.full_name.clone(),
                    from_class: student.class_name.clone(),
                    to_class: None,
                    outcome: PromotionOutcome::Skipped,
                    reason: Some(e.to_string()),
                }
            }
        };
        match detail.outcome {
            PromotionOutcome::Promoted => report.promoted_count += 1,
            PromotionOutcome::Graduated => report.graduated_count += 1,
            PromotionOutcome::Skipped => report.skipped_count += 1,
        }
        report.details.push(detail);
    }

    tracing::info!(
        promoted = report.promoted_count,
        graduated = report.graduated_count,
        skipped = report.skipped_count,
        "promotion finished"
    );
    Ok(report)
}

fn promote_one(conn: &Connection, student: &Student) -> ResultsResult<PromotionDetail> {
    let skipped = |reason: &str| PromotionDetail {
        student_id: student.id.clone(),
        full_name: student.full_name.clone(),
        from_class: student.class_name.clone(),
        to_class: None,
        outcome: PromotionOutcome::Skipped,
        reason: Some(reason.to_string()),
    };
    let Some(step) = next_step(&student.class_name) else {
        return Ok(skipped("class is not on the promotion ladder"));
    };
    let (to_class, outcome) = match step {
        NextStep::Promote(next) => (Some(next), PromotionOutcome::Promoted),
        NextStep::Graduate => (None, PromotionOutcome::Graduated),
    };

    let tx = conn.unchecked_transaction()?;
    let updated = match step {
        NextStep::Promote(next) => tx.execute(
            "UPDATE students SET class_name = ?, updated_at = ?
             WHERE id = ? AND class_name = ? AND active = 1",
            (next, now_timestamp(), &student.id, &student.class_name),
        )?,
        NextStep::Graduate => tx.execute(
            "UPDATE students SET active = 0, status = ?, updated_at = ?
             WHERE id = ? AND class_name = ? AND active = 1",
            (
                StudentStatus::Graduated.as_str(),
                now_timestamp(),
                &student.id,
                &student.class_name,
            ),
        )?,
    };
    if updated != 1 {
        return Err(ResultsError::conflict(
            "student changed since the promotion snapshot",
            None,
        ));
    }
    tx.execute(
        "INSERT INTO promotion_history(id, student_id, from_class, to_class, outcome, recorded_at)
         VALUES(?, ?, ?, ?, ?, ?)",
        (
            Uuid::new_v4().to_string(),
            &student.id,
            &student.class_name,
            to_class,
            outcome.as_str(),
            now_timestamp(),
        ),
    )?;
    tx.commit()?;

    Ok(PromotionDetail {
        student_id: student.id.clone(),
        full_name: student.full_name.clone(),
        from_class: student.class_name.clone(),
        to_class: to_class.map(str::to_string),
        outcome,
        reason: None,
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PromotionRecord {
    pub id: String,
    pub student_id: String,
    pub from_class: String,
    pub to_class: Option<String>,
    pub outcome: String,
    pub recorded_at: String,
}

/// Newest first. `student_id = None` returns the whole school's history.
pub fn promotion_history(conn: &Connection, student_id: Option<&str>) -> ResultsResult<Vec<PromotionRecord>> {
    let mut stmt = conn.prepare(
        "SELECT id, student_id, from_class, to_class, outcome, recorded_at
         FROM promotion_history
         WHERE (?1 IS NULL OR student_id = ?1)
         ORDER BY recorded_at DESC, rowid DESC",
    )?;
    let rows = stmt
        .query_map([student_id], |r| {
            Ok(PromotionRecord {
                id: r.get(0)?,
                student_id: r.get(1)?,
                from_class: r.get(2)?,
                to_class: r.get(3)?,
                outcome: r.get(4)?,
                recorded_at: r.get(5)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_in_memory;
    use crate::roster::{create_student, get_student, NewStudent};

    fn add(conn: &Connection, id: &str, class_name: &str) {
        create_student(
            conn,
            NewStudent {
                id: id.into(),
                full_name: format!("Student {}", id),
                class_name: class_name.into(),
                ..NewStudent::default()
            },
        )
        .unwrap();
    }

    #[test]
    fn ss3_class_graduates_everyone() {
        let conn = open_in_memory();
        for id in ["G1", "G2", "G3"] {
            add(&conn, id, "SS3");
        }
        let r = promote_students(&conn, Some("SS3")).unwrap();
        assert_eq!(r.graduated_count, 3);
        assert_eq!(r.promoted_count, 0);
        assert_eq!(r.skipped_count, 0);
        for id in ["G1", "G2", "G3"] {
            let s = get_student(&conn, id).unwrap();
            assert!(!s.active);
            assert_eq!(s.status, StudentStatus::Graduated);
            assert_eq!(s.class_name, "SS3");
        }
        assert_eq!(promotion_history(&conn, None).unwrap().len(), 3);
    }

    #[test]
    fn primary_five_moves_to_jss_one_and_stays_active() {
        let conn = open_in_memory();
        add(&conn, "P5", "Primary 5");
        let r = promote_students(&conn, None).unwrap();
        assert_eq!(r.promoted_count, 1);
        assert_eq!(r.details[0].to_class.as_deref(), Some("JSS 1"));
        let s = get_student(&conn, "P5").unwrap();
        assert_eq!(s.class_name, "JSS 1");
        assert!(s.active);

        let history = promotion_history(&conn, Some("P5")).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].from_class, "Primary 5");
        assert_eq!(history[0].outcome, "promoted");
    }

    #[test]
    fn whole_school_run_moves_each_student_once() {
        let conn = open_in_memory();
        add(&conn, "A", "Primary 4");
        add(&conn, "B", "Primary 5");
        add(&conn, "C", "SS2");
        add(&conn, "D", "SS3");
        add(&conn, "E", "SS1");
        crate::roster::deactivate_student(&conn, "E").unwrap();

        let r = promote_students(&conn, None).unwrap();
        assert_eq!(r.promoted_count, 3);
        assert_eq!(r.graduated_count, 1);
        assert_eq!(r.details.len(), 4);
        assert_eq!(get_student(&conn, "A").unwrap().class_name, "Primary 5");
        assert_eq!(get_student(&conn, "B").unwrap().class_name, "JSS 1");
        assert_eq!(get_student(&conn, "C").unwrap().class_name, "SS3");
        assert!(get_student(&conn, "C").unwrap().active);
        assert_eq!(get_student(&conn, "E").unwrap().class_name, "SS1");
    }

    #[test]
    fn off_ladder_student_is_skipped_without_blocking_others() {
        let conn = open_in_memory();
        add(&conn, "OK", "KG 1");
        conn.execute(
            "INSERT INTO students(id, full_name, class_name, active, status, created_at)
             VALUES('X', 'Imported', 'Year 7', 1, 'active', '2024-09-01T00:00:00Z')",
            [],
        )
        .unwrap();

        let r = promote_students(&conn, None).unwrap();
        assert_eq!(r.promoted_count, 1);
        assert_eq!(r.skipped_count, 1);
        let skipped = r.details.iter().find(|d| d.student_id == "X").unwrap();
        assert_eq!(skipped.outcome, PromotionOutcome::Skipped);
        assert!(skipped.reason.is_some());
        assert_eq!(get_student(&conn, "OK").unwrap().class_name, "KG 2");
    }

    #[test]
    fn unknown_scope_is_not_found() {
        let conn = open_in_memory();
        assert_eq!(promote_students(&conn, Some("Grade 1")).unwrap_err().code(), "not_found");
    }
}
