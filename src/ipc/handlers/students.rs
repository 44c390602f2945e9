use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{db_conn, required_str};
use crate::ipc::types::{AppState, Request};
use rusqlite::{params_from_iter, types::Value as SqlValue, Connection, OptionalExtension};
use serde_json::{json, Map, Value};
use uuid::Uuid;

fn handle_students_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };

    match db::load_students(conn) {
        Ok(students) => ok(&req.id, json!({ "students": students })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn identity_field(req: &Request, key: &str) -> Result<String, serde_json::Value> {
    let raw = required_str(req, key)?;
    let trimmed = raw.trim().to_string();
    if trimmed.is_empty() {
        return Err(err(
            &req.id,
            "bad_params",
            format!("{} must not be empty", key),
            None,
        ));
    }
    Ok(trimmed)
}

fn marks_object(req: &Request) -> Result<Map<String, Value>, serde_json::Value> {
    match req.params.get("marks") {
        None => Ok(Map::new()),
        Some(Value::Null) => Ok(Map::new()),
        Some(Value::Object(m)) => Ok(m.clone()),
        Some(_) => Err(err(&req.id, "bad_params", "marks must be an object", None)),
    }
}

// The only validation done at this boundary: a mark entry is either blank
// or numeric within [0, 100]. Everything already stored stays raw and the
// engine coerces it.
fn validate_marks(req: &Request, marks: &Map<String, Value>) -> Result<(), serde_json::Value> {
    for (subject, value) in marks {
        let accepted = match value {
            Value::Null => true,
            Value::Number(n) => n
                .as_f64()
                .map(|v| (0.0..=100.0).contains(&v))
                .unwrap_or(false),
            Value::String(s) => {
                let t = s.trim();
                t.is_empty()
                    || t.parse::<f64>()
                        .map(|v| v.is_finite() && (0.0..=100.0).contains(&v))
                        .unwrap_or(false)
            }
            _ => false,
        };
        if !accepted {
            return Err(err(
                &req.id,
                "bad_params",
                format!("mark for {} must be empty or a number from 0 to 100", subject),
                Some(json!({ "subject": subject })),
            ));
        }
    }
    Ok(())
}

fn upsert_marks(
    conn: &Connection,
    student_id: &str,
    marks: &Map<String, Value>,
) -> rusqlite::Result<()> {
    for (subject, value) in marks {
        conn.execute(
            "INSERT INTO marks(student_id, subject, value, updated_at)
             VALUES(?, ?, ?, strftime('%Y-%m-%dT%H:%M:%SZ','now'))
             ON CONFLICT(student_id, subject)
             DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            (student_id, subject.as_str(), value.to_string()),
        )?;
    }
    Ok(())
}

fn handle_students_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };

    let name = match identity_field(req, "name") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let student_no = match identity_field(req, "studentId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let class_name = match identity_field(req, "className") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let marks = match marks_object(req) {
        Ok(m) => m,
        Err(resp) => return resp,
    };
    if let Err(resp) = validate_marks(req, &marks) {
        return resp;
    }

    let sort_order = match db::next_student_sort_order(conn) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let id = Uuid::new_v4().to_string();

    let tx = match conn.unchecked_transaction() {
        Ok(t) => t,
        Err(e) => return err(&req.id, "db_tx_failed", e.to_string(), None),
    };

    if let Err(e) = tx.execute(
        "INSERT INTO students(id, name, student_no, class_name, sort_order, updated_at)
         VALUES(?, ?, ?, ?, ?, strftime('%Y-%m-%dT%H:%M:%SZ','now'))",
        (&id, &name, &student_no, &class_name, sort_order),
    ) {
        let _ = tx.rollback();
        return err(
            &req.id,
            "db_insert_failed",
            e.to_string(),
            Some(json!({ "table": "students" })),
        );
    }

    if let Err(e) = upsert_marks(&tx, &id, &marks) {
        let _ = tx.rollback();
        return err(
            &req.id,
            "db_insert_failed",
            e.to_string(),
            Some(json!({ "table": "marks" })),
        );
    }

    if let Err(e) = tx.commit() {
        return err(&req.id, "db_commit_failed", e.to_string(), None);
    }

    ok(
        &req.id,
        json!({
            "student": {
                "id": id,
                "name": name,
                "studentId": student_no,
                "className": class_name,
                "marks": marks
            }
        }),
    )
}

fn handle_students_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };

    let student_id = match required_str(req, "studentId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let Some(patch) = req.params.get("patch").and_then(|v| v.as_object()) else {
        return err(&req.id, "bad_params", "missing/invalid patch", None);
    };

    let mut set_parts: Vec<String> = Vec::new();
    let mut bind_values: Vec<SqlValue> = Vec::new();

    for (field, column) in [
        ("name", "name"),
        ("studentId", "student_no"),
        ("className", "class_name"),
    ] {
        if let Some(v) = patch.get(field) {
            let Some(s) = v.as_str() else {
                return err(
                    &req.id,
                    "bad_params",
                    format!("patch.{} must be a string", field),
                    None,
                );
            };
            let s = s.trim().to_string();
            if s.is_empty() {
                return err(
                    &req.id,
                    "bad_params",
                    format!("{} must not be empty", field),
                    None,
                );
            }
            set_parts.push(format!("{} = ?", column));
            bind_values.push(SqlValue::Text(s));
        }
    }

    let marks_patch: Option<Map<String, Value>> = match patch.get("marks") {
        None => None,
        Some(Value::Object(m)) => Some(m.clone()),
        Some(_) => {
            return err(&req.id, "bad_params", "patch.marks must be an object", None);
        }
    };
    if let Some(marks) = &marks_patch {
        if let Err(resp) = validate_marks(req, marks) {
            return resp;
        }
    }

    if set_parts.is_empty() && marks_patch.is_none() {
        return err(
            &req.id,
            "bad_params",
            "patch must include at least one field",
            None,
        );
    }

    let tx = match conn.unchecked_transaction() {
        Ok(t) => t,
        Err(e) => return err(&req.id, "db_tx_failed", e.to_string(), None),
    };

    if set_parts.is_empty() {
        let exists: Option<i64> = match tx
            .query_row("SELECT 1 FROM students WHERE id = ?", [&student_id], |r| {
                r.get(0)
            })
            .optional()
        {
            Ok(v) => v,
            Err(e) => {
                let _ = tx.rollback();
                return err(&req.id, "db_query_failed", e.to_string(), None);
            }
        };
        if exists.is_none() {
            let _ = tx.rollback();
            return err(&req.id, "not_found", "student not found", None);
        }
    } else {
        set_parts.push("updated_at = strftime('%Y-%m-%dT%H:%M:%SZ','now')".into());
        let sql = format!("UPDATE students SET {} WHERE id = ?", set_parts.join(", "));
        bind_values.push(SqlValue::Text(student_id.clone()));

        let changed = match tx.execute(&sql, params_from_iter(bind_values)) {
            Ok(v) => v,
            Err(e) => {
                let _ = tx.rollback();
                return err(
                    &req.id,
                    "db_update_failed",
                    e.to_string(),
                    Some(json!({ "table": "students" })),
                );
            }
        };
        if changed == 0 {
            let _ = tx.rollback();
            return err(&req.id, "not_found", "student not found", None);
        }
    }

    // A marks patch replaces the whole map, mirroring the record shape the
    // caller submits.
    if let Some(marks) = &marks_patch {
        if let Err(e) = tx.execute("DELETE FROM marks WHERE student_id = ?", [&student_id]) {
            let _ = tx.rollback();
            return err(
                &req.id,
                "db_delete_failed",
                e.to_string(),
                Some(json!({ "table": "marks" })),
            );
        }
        if let Err(e) = upsert_marks(&tx, &student_id, marks) {
            let _ = tx.rollback();
            return err(
                &req.id,
                "db_insert_failed",
                e.to_string(),
                Some(json!({ "table": "marks" })),
            );
        }
    }

    if let Err(e) = tx.commit() {
        return err(&req.id, "db_commit_failed", e.to_string(), None);
    }

    ok(&req.id, json!({ "ok": true }))
}

fn handle_students_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };

    let student_id = match required_str(req, "studentId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let exists: Option<i64> = match conn
        .query_row("SELECT 1 FROM students WHERE id = ?", [&student_id], |r| {
            r.get(0)
        })
        .optional()
    {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    if exists.is_none() {
        return err(&req.id, "not_found", "student not found", None);
    }

    let tx = match conn.unchecked_transaction() {
        Ok(t) => t,
        Err(e) => return err(&req.id, "db_tx_failed", e.to_string(), None),
    };

    if let Err(e) = tx.execute("DELETE FROM marks WHERE student_id = ?", [&student_id]) {
        let _ = tx.rollback();
        return err(
            &req.id,
            "db_delete_failed",
            e.to_string(),
            Some(json!({ "table": "marks" })),
        );
    }
    if let Err(e) = tx.execute("DELETE FROM students WHERE id = ?", [&student_id]) {
        let _ = tx.rollback();
        return err(
            &req.id,
            "db_delete_failed",
            e.to_string(),
            Some(json!({ "table": "students" })),
        );
    }

    if let Err(e) = tx.commit() {
        return err(&req.id, "db_commit_failed", e.to_string(), None);
    }

    ok(&req.id, json!({ "ok": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "students.list" => Some(handle_students_list(state, req)),
        "students.create" => Some(handle_students_create(state, req)),
        "students.update" => Some(handle_students_update(state, req)),
        "students.delete" => Some(handle_students_delete(state, req)),
        _ => None,
    }
}
