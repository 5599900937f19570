use chrono::{SecondsFormat, Utc};
use rusqlite::{Connection, OptionalExtension};
use std::path::Path;

pub const DB_FILE_NAME: &str = "results.sqlite3";

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join(DB_FILE_NAME);
    let conn = Connection::open(db_path)?;
    init_schema(&conn)?;
    Ok(conn)
}

#[cfg(test)]
pub fn open_in_memory() -> Connection {
    let conn = Connection::open_in_memory().expect("open in-memory db");
    init_schema(&conn).expect("init schema");
    conn
}

pub fn init_schema(conn: &Connection) -> anyhow::Result<()> {
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS students(
            id TEXT PRIMARY KEY,
            full_name TEXT NOT NULL,
            class_name TEXT NOT NULL,
            gender TEXT,
            picture TEXT,
            active INTEGER NOT NULL,
            status TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_students_class ON students(class_name, active)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS subjects(
            id TEXT PRIMARY KEY,
            class_name TEXT NOT NULL,
            name TEXT NOT NULL,
            created_at TEXT NOT NULL,
            UNIQUE(class_name, name)
        )",
        [],
    )?;

    // One row per (student, subject, term, session). `approved` drops back to 0
    // whenever the marks change.
    conn.execute(
        "CREATE TABLE IF NOT EXISTS academic_scores(
            id TEXT PRIMARY KEY,
            student_id TEXT NOT NULL,
            subject_id TEXT NOT NULL,
            term INTEGER NOT NULL,
            session TEXT NOT NULL,
            pt1 INTEGER NOT NULL,
            pt2 INTEGER NOT NULL,
            pt3 INTEGER NOT NULL,
            exam INTEGER NOT NULL,
            approved INTEGER NOT NULL DEFAULT 0,
            updated_at TEXT NOT NULL,
            FOREIGN KEY(student_id) REFERENCES students(id),
            FOREIGN KEY(subject_id) REFERENCES subjects(id),
            UNIQUE(student_id, subject_id, term, session),
            CHECK(pt1 BETWEEN 0 AND 30),
            CHECK(pt2 BETWEEN 0 AND 30),
            CHECK(pt3 BETWEEN 0 AND 30),
            CHECK(exam BETWEEN 0 AND 70)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_scores_student_session
         ON academic_scores(student_id, session, term)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_scores_subject_session
         ON academic_scores(subject_id, session, term)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS psychomotor_entries(
            student_id TEXT NOT NULL,
            term INTEGER NOT NULL,
            session TEXT NOT NULL,
            attendance TEXT NOT NULL,
            punctuality TEXT NOT NULL,
            neatness TEXT NOT NULL,
            honesty TEXT NOT NULL,
            responsibility TEXT NOT NULL,
            creativity TEXT NOT NULL,
            sports TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            PRIMARY KEY(student_id, term, session),
            FOREIGN KEY(student_id) REFERENCES students(id)
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS attendance_entries(
            student_id TEXT NOT NULL,
            term INTEGER NOT NULL,
            session TEXT NOT NULL,
            days_opened INTEGER NOT NULL,
            days_present INTEGER NOT NULL,
            updated_at TEXT NOT NULL,
            PRIMARY KEY(student_id, term, session),
            FOREIGN KEY(student_id) REFERENCES students(id),
            CHECK(days_opened >= 1),
            CHECK(days_present BETWEEN 0 AND days_opened)
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS report_comments(
            student_id TEXT NOT NULL,
            term INTEGER NOT NULL,
            session TEXT NOT NULL,
            teacher_comment TEXT NOT NULL DEFAULT '',
            head_teacher_comment TEXT NOT NULL DEFAULT '',
            updated_at TEXT NOT NULL,
            PRIMARY KEY(student_id, term, session),
            FOREIGN KEY(student_id) REFERENCES students(id)
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS promotion_history(
            id TEXT PRIMARY KEY,
            student_id TEXT NOT NULL,
            from_class TEXT NOT NULL,
            to_class TEXT,
            outcome TEXT NOT NULL,
            recorded_at TEXT NOT NULL,
            FOREIGN KEY(student_id) REFERENCES students(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_promotion_history_student ON promotion_history(student_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS settings(
            key TEXT PRIMARY KEY,
            value_json TEXT NOT NULL
        )",
        [],
    )?;

    Ok(())
}

/// Returns `None` when the key is unset or the stored text is not valid JSON.
pub fn settings_get_json(
    conn: &Connection,
    key: &str,
) -> rusqlite::Result<Option<serde_json::Value>> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT value_json FROM settings WHERE key = ?",
            [key],
            |r| r.get(0),
        )
        .optional()?;
    Ok(raw.and_then(|s| serde_json::from_str(&s).ok()))
}

pub fn settings_set_json(
    conn: &Connection,
    key: &str,
    value: &serde_json::Value,
) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO settings(key, value_json) VALUES(?, ?)
         ON CONFLICT(key) DO UPDATE SET value_json = excluded.value_json",
        (key, value.to_string()),
    )?;
    Ok(())
}

/// RFC 3339 UTC timestamp with second precision, as stored in `*_at` columns.
pub fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}
