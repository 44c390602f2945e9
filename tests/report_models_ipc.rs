
use serde_json::json;
use test_support::{create_student, open_workspace, request_err, request_ok};

#[test]
fn student_report_grades_each_subject_with_the_band_table() {
    let (_child, mut stdin, mut reader, _ws) = open_workspace("reportcard-report-student");

    let id = create_student(
        &mut stdin,
        &mut reader,
        "c1",
        "Chebet",
        "STD-1",
        "Grade 6",
        json!({ "Mathematics": 82, "English": 41 }),
    );

    let result = request_ok(
        &mut stdin,
        &mut reader,
        "r1",
        "reports.student",
        json!({ "studentId": id }),
    );
    let report = result.get("report").expect("report");

    let student = report.get("student").expect("student");
    assert_eq!(student.get("total").and_then(|v| v.as_f64()), Some(123.0));
    assert_eq!(student.get("average").and_then(|v| v.as_str()), Some("24.60"));
    assert_eq!(student.get("grade").and_then(|v| v.as_str()), Some("F"));
    assert_eq!(student.get("position").and_then(|v| v.as_u64()), Some(1));
    assert_eq!(report.get("classSize").and_then(|v| v.as_u64()), Some(1));

    let rows = report
        .get("subjects")
        .and_then(|v| v.as_array())
        .cloned()
        .expect("subject rows");
    assert_eq!(rows.len(), 5);

    let row = |subject: &str| {
        rows.iter()
            .find(|r| r.get("subject").and_then(|v| v.as_str()) == Some(subject))
            .cloned()
            .expect("row")
    };
    assert_eq!(row("Mathematics").get("mark").and_then(|v| v.as_f64()), Some(82.0));
    assert_eq!(row("Mathematics").get("grade").and_then(|v| v.as_str()), Some("A"));
    assert_eq!(row("English").get("grade").and_then(|v| v.as_str()), Some("E"));
    assert_eq!(row("Science").get("mark").and_then(|v| v.as_f64()), Some(0.0));
    assert_eq!(row("Science").get("grade").and_then(|v| v.as_str()), Some("F"));

    assert!(report.get("generatedAt").and_then(|v| v.as_str()).is_some());
}

#[test]
fn student_report_ranks_within_the_students_class() {
    let (_child, mut stdin, mut reader, _ws) = open_workspace("reportcard-report-position");

    let _ = create_student(
        &mut stdin,
        &mut reader,
        "c1",
        "Amina",
        "STD-1",
        "Grade 6",
        json!({ "Mathematics": 95 }),
    );
    let id = create_student(
        &mut stdin,
        &mut reader,
        "c2",
        "Baraka",
        "STD-2",
        "Grade 6",
        json!({ "Mathematics": 60 }),
    );
    // A stronger student in another class must not push Baraka down.
    let _ = create_student(
        &mut stdin,
        &mut reader,
        "c3",
        "Chebet",
        "STD-3",
        "Grade 7",
        json!({ "Mathematics": 99 }),
    );

    let result = request_ok(
        &mut stdin,
        &mut reader,
        "r1",
        "reports.student",
        json!({ "studentId": id }),
    );
    let report = result.get("report").expect("report");
    let student = report.get("student").expect("student");
    assert_eq!(student.get("position").and_then(|v| v.as_u64()), Some(2));
    assert_eq!(report.get("classSize").and_then(|v| v.as_u64()), Some(2));
}

#[test]
fn missing_student_is_not_found() {
    let (_child, mut stdin, mut reader, _ws) = open_workspace("reportcard-report-missing");
    let code = request_err(
        &mut stdin,
        &mut reader,
        "r1",
        "reports.student",
        json!({ "studentId": "missing" }),
    );
    assert_eq!(code, "not_found");
}

#[test]
fn class_report_requires_a_specific_class() {
    let (_child, mut stdin, mut reader, _ws) = open_workspace("reportcard-report-class-params");

    let code = request_err(&mut stdin, &mut reader, "r1", "reports.class", json!({}));
    assert_eq!(code, "bad_params");

    let code = request_err(
        &mut stdin,
        &mut reader,
        "r2",
        "reports.class",
        json!({ "className": "All Classes" }),
    );
    assert_eq!(code, "bad_params");
}

#[test]
fn class_report_bundles_ranked_rows_and_statistics() {
    let (_child, mut stdin, mut reader, _ws) = open_workspace("reportcard-report-class");

    let _ = create_student(
        &mut stdin,
        &mut reader,
        "c1",
        "Amina",
        "STD-1",
        "Grade 6",
        json!({
            "Mathematics": 80,
            "English": 80,
            "Science": 80,
            "Social Studies": 80,
            "Kiswahili": 80
        }),
    );
    let _ = create_student(
        &mut stdin,
        &mut reader,
        "c2",
        "Baraka",
        "STD-2",
        "Grade 6",
        json!({
            "Mathematics": 60,
            "English": 60,
            "Science": 60,
            "Social Studies": 60,
            "Kiswahili": 60
        }),
    );
    let _ = create_student(
        &mut stdin,
        &mut reader,
        "c3",
        "Chebet",
        "STD-3",
        "Grade 7",
        json!({ "Mathematics": 99 }),
    );

    let result = request_ok(
        &mut stdin,
        &mut reader,
        "r1",
        "reports.class",
        json!({ "className": "Grade 6" }),
    );
    let report = result.get("report").expect("report");
    assert_eq!(report.get("className").and_then(|v| v.as_str()), Some("Grade 6"));

    let records = report
        .get("records")
        .and_then(|v| v.as_array())
        .cloned()
        .expect("records");
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].get("name").and_then(|v| v.as_str()), Some("Amina"));
    assert_eq!(records[0].get("position").and_then(|v| v.as_u64()), Some(1));

    let stats = report.get("stats").expect("stats");
    assert_eq!(stats.get("totalStudents").and_then(|v| v.as_u64()), Some(2));
    assert_eq!(stats.get("averageScore").and_then(|v| v.as_str()), Some("70.00"));

    assert!(report.get("generatedAt").and_then(|v| v.as_str()).is_some());
}

#[test]
fn reports_honor_a_customized_subject_list() {
    let (_child, mut stdin, mut reader, _ws) = open_workspace("reportcard-report-subjects");

    let set = request_ok(
        &mut stdin,
        &mut reader,
        "s1",
        "subjects.set",
        json!({ "subjects": ["Mathematics", "English"] }),
    );
    assert_eq!(
        set.get("subjects").and_then(|v| v.as_array()).map(|a| a.len()),
        Some(2)
    );

    let id = create_student(
        &mut stdin,
        &mut reader,
        "c1",
        "Chebet",
        "STD-1",
        "Grade 6",
        json!({ "Mathematics": 82, "English": 41 }),
    );

    let result = request_ok(
        &mut stdin,
        &mut reader,
        "r1",
        "reports.student",
        json!({ "studentId": id }),
    );
    let report = result.get("report").expect("report");
    let student = report.get("student").expect("student");
    // Two subjects now: 123 / 2.
    assert_eq!(student.get("average").and_then(|v| v.as_str()), Some("61.50"));
    assert_eq!(student.get("grade").and_then(|v| v.as_str()), Some("C"));
    assert_eq!(
        report
            .get("subjects")
            .and_then(|v| v.as_array())
            .map(|a| a.len()),
        Some(2)
    );

    let code = request_err(
        &mut stdin,
        &mut reader,
        "s2",
        "subjects.set",
        json!({ "subjects": [] }),
    );
    assert_eq!(code, "bad_params");
    let code = request_err(
        &mut stdin,
        &mut reader,
        "s3",
        "subjects.set",
        json!({ "subjects": ["Mathematics", "Mathematics"] }),
    );
    assert_eq!(code, "bad_params");
}
