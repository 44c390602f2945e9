use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::HashMap;

/// Sentinel class filter value meaning "no filter".
pub const ALL_CLASSES: &str = "All Classes";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Grade {
    A,
    B,
    C,
    D,
    E,
    F,
}

impl Grade {
    pub const ALL: [Grade; 6] = [Grade::A, Grade::B, Grade::C, Grade::D, Grade::E, Grade::F];

    /// Ordering rank: F < E < D < C < B < A.
    #[allow(dead_code)]
    pub fn rank(self) -> u8 {
        match self {
            Grade::F => 0,
            Grade::E => 1,
            Grade::D => 2,
            Grade::C => 3,
            Grade::B => 4,
            Grade::A => 5,
        }
    }
}

/// Grade bands as (inclusive lower bound, grade), evaluated top-down.
/// Averages below every band fall through to F.
pub const GRADE_BANDS: [(f64, Grade); 5] = [
    (80.0, Grade::A),
    (70.0, Grade::B),
    (60.0, Grade::C),
    (50.0, Grade::D),
    (40.0, Grade::E),
];

pub fn grade_for(average: f64) -> Grade {
    for (min, grade) in GRADE_BANDS {
        if average >= min {
            return grade;
        }
    }
    Grade::F
}

/// Numeric value of a raw mark. JSON numbers pass through, numeric strings
/// are parsed, everything else (missing, blank, junk, non-finite) is 0.
pub fn coerce_mark(raw: &Value) -> f64 {
    let parsed = match raw {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match parsed {
        Some(v) if v.is_finite() => v,
        _ => 0.0,
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EngineError {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl EngineError {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
            details: None,
        }
    }
}

/// One roster entry as supplied by the record store. Marks are kept raw;
/// coercion happens at aggregation time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentRecord {
    pub id: String,
    pub name: String,
    pub student_id: String,
    #[serde(default)]
    pub class_name: String,
    #[serde(default)]
    pub marks: HashMap<String, Value>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GradedRecord {
    #[serde(flatten)]
    pub record: StudentRecord,
    pub total: f64,
    #[serde(serialize_with = "two_decimal_string")]
    pub average: f64,
    pub grade: Grade,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedRecord {
    #[serde(flatten)]
    pub graded: GradedRecord,
    pub position: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectAverage {
    pub subject: String,
    #[serde(serialize_with = "two_decimal_string")]
    pub average: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeBucket {
    pub grade: Grade,
    pub count: usize,
    pub percentage: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassStats {
    pub total_students: usize,
    #[serde(serialize_with = "two_decimal_string")]
    pub average_score: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_student: Option<RankedRecord>,
    pub per_subject_average: Vec<SubjectAverage>,
    pub grade_distribution: Vec<GradeBucket>,
}

// Display values carry two decimals on the wire; ranking stays numeric.
fn two_decimal_string<S>(value: &f64, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&format!("{value:.2}"))
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RosterFilters {
    pub search: Option<String>,
    pub class_name: Option<String>,
}

pub fn parse_roster_filters(raw: Option<&Value>) -> Result<RosterFilters, EngineError> {
    let Some(raw) = raw else {
        return Ok(RosterFilters::default());
    };
    if raw.is_null() {
        return Ok(RosterFilters::default());
    }
    let Some(obj) = raw.as_object() else {
        return Err(EngineError::new("bad_params", "filters must be an object"));
    };

    let search = match obj.get("search") {
        None => None,
        Some(v) if v.is_null() => None,
        Some(v) => {
            let Some(s) = v.as_str() else {
                return Err(EngineError::new(
                    "bad_params",
                    "filters.search must be string or null",
                ));
            };
            let t = s.trim();
            if t.is_empty() {
                None
            } else {
                Some(t.to_string())
            }
        }
    };

    let class_name = match obj.get("className") {
        None => None,
        Some(v) if v.is_null() => None,
        Some(v) => {
            let Some(s) = v.as_str() else {
                return Err(EngineError::new(
                    "bad_params",
                    "filters.className must be string or null",
                ));
            };
            let t = s.trim();
            if t.is_empty() || t.eq_ignore_ascii_case(ALL_CLASSES) {
                None
            } else {
                Some(t.to_string())
            }
        }
    };

    Ok(RosterFilters { search, class_name })
}

impl RosterFilters {
    pub fn matches(&self, record: &StudentRecord) -> bool {
        let search_ok = match &self.search {
            None => true,
            Some(q) => {
                let q = q.to_lowercase();
                record.name.to_lowercase().contains(&q)
                    || record.student_id.to_lowercase().contains(&q)
                    || record.class_name.to_lowercase().contains(&q)
            }
        };
        let class_ok = self
            .class_name
            .as_deref()
            .map(|c| record.class_name == c)
            .unwrap_or(true);
        search_ok && class_ok
    }
}

/// Records satisfying both filters, roster order preserved.
pub fn apply_filters(records: &[StudentRecord], filters: &RosterFilters) -> Vec<StudentRecord> {
    records
        .iter()
        .filter(|r| filters.matches(r))
        .cloned()
        .collect()
}

/// Total, average and grade for one record over the active subject list.
/// Missing and unparsable marks count as 0; an empty subject list yields
/// average 0 (grade F) rather than a division fault.
pub fn calculate_results(record: &StudentRecord, subjects: &[String]) -> GradedRecord {
    let total: f64 = subjects
        .iter()
        .map(|s| coerce_mark(record.marks.get(s).unwrap_or(&Value::Null)))
        .sum();
    let average = if subjects.is_empty() {
        0.0
    } else {
        total / subjects.len() as f64
    };
    GradedRecord {
        record: record.clone(),
        total,
        average,
        grade: grade_for(average),
    }
}

/// Grade every record, then rank by total descending. The sort is stable,
/// so equal totals keep their roster order and still receive strictly
/// increasing positions (no shared ranks).
pub fn calculate_positions(records: &[StudentRecord], subjects: &[String]) -> Vec<RankedRecord> {
    let mut graded: Vec<GradedRecord> = records
        .iter()
        .map(|r| calculate_results(r, subjects))
        .collect();
    graded.sort_by(|a, b| b.total.partial_cmp(&a.total).unwrap_or(Ordering::Equal));
    graded
        .into_iter()
        .enumerate()
        .map(|(i, g)| RankedRecord {
            graded: g,
            position: i + 1,
        })
        .collect()
}

/// Statistics over a caller-chosen evaluation set. An empty set produces
/// zero counts, a 0.00 average and no top student.
pub fn class_stats(records: &[StudentRecord], subjects: &[String]) -> ClassStats {
    let ranked = calculate_positions(records, subjects);
    let n = ranked.len();

    let average_score = if n > 0 {
        ranked.iter().map(|r| r.graded.average).sum::<f64>() / n as f64
    } else {
        0.0
    };
    let top_student = ranked.first().cloned();

    let per_subject_average = subjects
        .iter()
        .map(|subject| {
            let average = if n > 0 {
                records
                    .iter()
                    .map(|r| coerce_mark(r.marks.get(subject).unwrap_or(&Value::Null)))
                    .sum::<f64>()
                    / n as f64
            } else {
                0.0
            };
            SubjectAverage {
                subject: subject.clone(),
                average,
            }
        })
        .collect();

    let grade_distribution = Grade::ALL
        .iter()
        .map(|&grade| {
            let count = ranked.iter().filter(|r| r.graded.grade == grade).count();
            let percentage = if n > 0 {
                (100.0 * count as f64 / n as f64).round() as u64
            } else {
                0
            };
            GradeBucket {
                grade,
                count,
                percentage,
            }
        })
        .collect();

    ClassStats {
        total_students: n,
        average_score,
        top_student,
        per_subject_average,
        grade_distribution,
    }
}
