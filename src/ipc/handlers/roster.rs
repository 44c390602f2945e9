use crate::db;
use crate::engine;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{db_conn, engine_err};
use crate::ipc::types::{AppState, Request};
use serde_json::json;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StatsScope {
    All,
    Filtered,
}

fn parse_stats_scope(req: &Request) -> Result<StatsScope, serde_json::Value> {
    match req
        .params
        .get("scope")
        .and_then(|v| v.as_str())
        .map(|s| s.to_ascii_lowercase())
        .as_deref()
    {
        None | Some("all") => Ok(StatsScope::All),
        Some("filtered") => Ok(StatsScope::Filtered),
        Some(other) => Err(err(
            &req.id,
            "bad_params",
            "scope must be one of: all, filtered",
            Some(json!({ "scope": other })),
        )),
    }
}

fn handle_roster_query(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };

    let filters = match engine::parse_roster_filters(req.params.get("filters")) {
        Ok(f) => f,
        Err(e) => return engine_err(req, e),
    };
    let scope = match parse_stats_scope(req) {
        Ok(s) => s,
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

    // Positions are always relative to the visible (filtered) set.
    let filtered = engine::apply_filters(&roster, &filters);
    let records = engine::calculate_positions(&filtered, &subjects);
    let stats = match scope {
        StatsScope::All => engine::class_stats(&roster, &subjects),
        StatsScope::Filtered => engine::class_stats(&filtered, &subjects),
    };

    ok(
        &req.id,
        json!({
            "records": records,
            "stats": stats
        }),
    )
}

fn handle_roster_classes(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };

    let roster = match db::load_students(conn) {
        Ok(r) => r,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    let mut classes: Vec<String> = Vec::new();
    for record in &roster {
        if record.class_name.is_empty() {
            continue;
        }
        if !classes.contains(&record.class_name) {
            classes.push(record.class_name.clone());
        }
    }

    ok(&req.id, json!({ "classes": classes }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "roster.query" => Some(handle_roster_query(state, req)),
        "roster.classes" => Some(handle_roster_classes(state, req)),
        _ => None,
    }
}
