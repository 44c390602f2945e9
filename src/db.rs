use rusqlite::{Connection, OptionalExtension};
use std::collections::HashMap;
use std::path::Path;

use crate::engine::StudentRecord;

/// Subject list served until the workspace stores its own.
pub const DEFAULT_SUBJECTS: [&str; 5] = [
    "Mathematics",
    "English",
    "Science",
    "Social Studies",
    "Kiswahili",
];

pub const SUBJECTS_KEY: &str = "subjects.list";

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join("reportcard.sqlite3");
    let conn = Connection::open(db_path)?;
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS students(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            student_no TEXT NOT NULL,
            class_name TEXT NOT NULL,
            sort_order INTEGER NOT NULL,
            updated_at TEXT
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_students_class ON students(class_name)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_students_sort ON students(sort_order)",
        [],
    )?;

    // Raw mark cells. Values keep the caller's JSON encoding; the engine
    // owns coercion, so junk input must survive storage untouched.
    conn.execute(
        "CREATE TABLE IF NOT EXISTS marks(
            student_id TEXT NOT NULL,
            subject TEXT NOT NULL,
            value TEXT NOT NULL,
            updated_at TEXT,
            PRIMARY KEY(student_id, subject),
            FOREIGN KEY(student_id) REFERENCES students(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_marks_student ON marks(student_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS settings(
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        )",
        [],
    )?;

    Ok(conn)
}

pub fn settings_get_json(
    conn: &Connection,
    key: &str,
) -> anyhow::Result<Option<serde_json::Value>> {
    let raw: Option<String> = conn
        .query_row("SELECT value FROM settings WHERE key = ?", [key], |r| {
            r.get(0)
        })
        .optional()?;
    match raw {
        Some(s) => Ok(Some(serde_json::from_str(&s)?)),
        None => Ok(None),
    }
}

pub fn settings_set_json(
    conn: &Connection,
    key: &str,
    value: &serde_json::Value,
) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO settings(key, value) VALUES(?, ?)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        (key, serde_json::to_string(value)?),
    )?;
    Ok(())
}

/// Active subject list for aggregation and report rows.
pub fn subject_list(conn: &Connection) -> anyhow::Result<Vec<String>> {
    if let Some(stored) = settings_get_json(conn, SUBJECTS_KEY)? {
        if let Some(arr) = stored.as_array() {
            let subjects: Vec<String> = arr
                .iter()
                .filter_map(|v| v.as_str())
                .map(|s| s.to_string())
                .collect();
            if !subjects.is_empty() {
                return Ok(subjects);
            }
        }
    }
    Ok(DEFAULT_SUBJECTS.iter().map(|s| s.to_string()).collect())
}

pub fn next_student_sort_order(conn: &Connection) -> anyhow::Result<i64> {
    let next: i64 = conn.query_row(
        "SELECT COALESCE(MAX(sort_order), 0) + 1 FROM students",
        [],
        |r| r.get(0),
    )?;
    Ok(next)
}

/// Full roster snapshot in submission order. This ordering is what makes
/// equal-total ranking deterministic across calls.
pub fn load_students(conn: &Connection) -> anyhow::Result<Vec<StudentRecord>> {
    let mut stmt = conn.prepare(
        "SELECT id, name, student_no, class_name
         FROM students
         ORDER BY sort_order",
    )?;
    let mut records: Vec<StudentRecord> = stmt
        .query_map([], |r| {
            Ok(StudentRecord {
                id: r.get(0)?,
                name: r.get(1)?,
                student_id: r.get(2)?,
                class_name: r.get(3)?,
                marks: HashMap::new(),
            })
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())?;

    let mut index_by_id: HashMap<String, usize> = HashMap::new();
    for (i, r) in records.iter().enumerate() {
        index_by_id.insert(r.id.clone(), i);
    }

    let mut stmt = conn.prepare("SELECT student_id, subject, value FROM marks")?;
    let rows = stmt
        .query_map([], |r| {
            let student_id: String = r.get(0)?;
            let subject: String = r.get(1)?;
            let value: String = r.get(2)?;
            Ok((student_id, subject, value))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())?;

    for (student_id, subject, raw) in rows {
        let Some(&i) = index_by_id.get(&student_id) else {
            continue;
        };
        // A value that predates JSON encoding is kept as a plain string.
        let value = serde_json::from_str(&raw).unwrap_or(serde_json::Value::String(raw));
        records[i].marks.insert(subject, value);
    }

    Ok(records)
}
