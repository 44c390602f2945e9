use crate::db;
use crate::engine;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{db_conn, required_str};
use crate::ipc::types::{AppState, Request};
use serde_json::{json, Value};

fn subject_rows(record: &engine::StudentRecord, subjects: &[String]) -> Vec<Value> {
    subjects
        .iter()
        .map(|subject| {
            let mark = engine::coerce_mark(record.marks.get(subject).unwrap_or(&Value::Null));
            // Per-subject grades reuse the same band table as the average.
            json!({
                "subject": subject,
                "mark": mark,
                "grade": engine::grade_for(mark)
            })
        })
        .collect()
}

fn handle_report_student(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let student_id = match required_str(req, "studentId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let subjects = match db::subject_list(conn) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let roster = match db::load_students(conn) {
        Ok(r) => r,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    let Some(record) = roster.iter().find(|r| r.id == student_id) else {
        return err(&req.id, "not_found", "student not found", None);
    };

    // The printable card ranks within the student's own class so its
    // position does not depend on whatever list filter was active.
    let class_set: Vec<engine::StudentRecord> = roster
        .iter()
        .filter(|r| r.class_name == record.class_name)
        .cloned()
        .collect();
    let ranked = engine::calculate_positions(&class_set, &subjects);
    let Some(entry) = ranked.iter().find(|r| r.graded.record.id == student_id) else {
        return err(&req.id, "not_found", "student not found", None);
    };

    ok(
        &req.id,
        json!({
            "report": {
                "student": entry,
                "classSize": class_set.len(),
                "subjects": subject_rows(record, &subjects),
                "generatedAt": chrono::Utc::now().to_rfc3339()
            }
        }),
    )
}

fn handle_report_class(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let class_name = match required_str(req, "className") {
        Ok(v) => v.trim().to_string(),
        Err(resp) => return resp,
    };
    if class_name.is_empty() || class_name.eq_ignore_ascii_case(engine::ALL_CLASSES) {
        return err(
            &req.id,
            "bad_params",
            "className must name a specific class",
            None,
        );
    }

    let subjects = match db::subject_list(conn) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let roster = match db::load_students(conn) {
        Ok(r) => r,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    let class_set: Vec<engine::StudentRecord> = roster
        .iter()
        .filter(|r| r.class_name == class_name)
        .cloned()
        .collect();
    let records = engine::calculate_positions(&class_set, &subjects);
    let stats = engine::class_stats(&class_set, &subjects);

    ok(
        &req.id,
        json!({
            "report": {
                "className": class_name,
                "records": records,
                "stats": stats,
                "generatedAt": chrono::Utc::now().to_rfc3339()
            }
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "reports.student" => Some(handle_report_student(state, req)),
        "reports.class" => Some(handle_report_class(state, req)),
        _ => None,
    }
}
