use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::db_conn;
use crate::ipc::types::{AppState, Request};
use serde_json::json;
use std::collections::HashSet;

fn handle_subjects_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };

    match db::subject_list(conn) {
        Ok(subjects) => ok(&req.id, json!({ "subjects": subjects })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_subjects_set(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };

    let Some(raw) = req.params.get("subjects").and_then(|v| v.as_array()) else {
        return err(&req.id, "bad_params", "missing/invalid subjects", None);
    };

    let mut subjects: Vec<String> = Vec::with_capacity(raw.len());
    let mut seen: HashSet<String> = HashSet::new();
    for v in raw {
        let Some(s) = v.as_str() else {
            return err(&req.id, "bad_params", "subjects must be strings", None);
        };
        let t = s.trim().to_string();
        if t.is_empty() {
            return err(&req.id, "bad_params", "subject names must not be empty", None);
        }
        if !seen.insert(t.clone()) {
            return err(
                &req.id,
                "bad_params",
                "duplicate subject name",
                Some(json!({ "subject": t })),
            );
        }
        subjects.push(t);
    }
    if subjects.is_empty() {
        return err(&req.id, "bad_params", "subjects must not be empty", None);
    }

    if let Err(e) = db::settings_set_json(conn, db::SUBJECTS_KEY, &json!(subjects)) {
        return err(
            &req.id,
            "db_update_failed",
            e.to_string(),
            Some(json!({ "table": "settings" })),
        );
    }

    ok(&req.id, json!({ "subjects": subjects }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "subjects.get" => Some(handle_subjects_get(state, req)),
        "subjects.set" => Some(handle_subjects_set(state, req)),
        _ => None,
    }
}
