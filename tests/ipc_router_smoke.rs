
use serde_json::json;
use test_support::{open_workspace, request, request_ok};

#[test]
fn router_dispatch_smoke_covers_handler_families() {
    let (_child, mut stdin, mut reader, workspace) = open_workspace("reportcard-router-smoke");

    let health = request_ok(&mut stdin, &mut reader, "1", "health", json!({}));
    assert!(health.get("version").and_then(|v| v.as_str()).is_some());
    assert_eq!(
        health
            .get("workspacePath")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string()),
        Some(workspace.to_string_lossy().to_string())
    );

    let subjects = request_ok(&mut stdin, &mut reader, "2", "subjects.get", json!({}));
    let subject_names = subjects
        .get("subjects")
        .and_then(|v| v.as_array())
        .cloned()
        .expect("subjects");
    assert_eq!(subject_names.len(), 5);
    assert_eq!(subject_names[0].as_str(), Some("Mathematics"));

    let created = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "students.create",
        json!({
            "name": "Amina Yusuf",
            "studentId": "STD-001",
            "className": "Grade 6",
            "marks": { "Mathematics": "82", "English": 74 }
        }),
    );
    let student_id = created
        .get("student")
        .and_then(|s| s.get("id"))
        .and_then(|v| v.as_str())
        .expect("student id")
        .to_string();

    let listed = request_ok(&mut stdin, &mut reader, "4", "students.list", json!({}));
    let students = listed
        .get("students")
        .and_then(|v| v.as_array())
        .cloned()
        .expect("students");
    assert_eq!(students.len(), 1);

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "students.update",
        json!({
            "studentId": student_id.clone(),
            "patch": { "name": "Amina A. Yusuf" }
        }),
    );

    let queried = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "roster.query",
        json!({ "filters": { "search": "amina" } }),
    );
    assert_eq!(
        queried
            .get("records")
            .and_then(|v| v.as_array())
            .map(|a| a.len()),
        Some(1)
    );
    assert!(queried.get("stats").is_some());

    let classes = request_ok(&mut stdin, &mut reader, "7", "roster.classes", json!({}));
    assert_eq!(
        classes.get("classes").and_then(|v| v.as_array()).cloned(),
        Some(vec![json!("Grade 6")])
    );

    let report = request_ok(
        &mut stdin,
        &mut reader,
        "8",
        "reports.student",
        json!({ "studentId": student_id.clone() }),
    );
    assert!(report.get("report").and_then(|r| r.get("generatedAt")).is_some());

    let class_report = request_ok(
        &mut stdin,
        &mut reader,
        "9",
        "reports.class",
        json!({ "className": "Grade 6" }),
    );
    assert_eq!(
        class_report
            .get("report")
            .and_then(|r| r.get("className"))
            .and_then(|v| v.as_str()),
        Some("Grade 6")
    );

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "10",
        "students.delete",
        json!({ "studentId": student_id }),
    );

    let unknown = request(&mut stdin, &mut reader, "11", "nope.unknown", json!({}));
    assert_eq!(unknown.get("ok").and_then(|v| v.as_bool()), Some(false));
    assert_eq!(
        unknown
            .get("error")
            .and_then(|e| e.get("code"))
            .and_then(|v| v.as_str()),
        Some("not_implemented")
    );
}
