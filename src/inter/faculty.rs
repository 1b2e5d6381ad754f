/*!
Subcrate for interoperation with Faculty users.

(Admins may use this dashboard too; the original front end let them
review attendance and assignments through the faculty views.)
*/
use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    http::header::HeaderMap,
    response::{IntoResponse, Response},
    Form,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use time::Date;
use tokio::sync::RwLock;

use crate::config::Glob;
use crate::models::{AttendanceRecord, GradeUpdate, MarkBatch, MarkRecord, UserRecord};
use crate::session::Session;
use crate::user::Role;
use super::*;

static SECTIONS: &[(&str, &str)] = &[
    ("overview",    "Overview"),
    ("attendance",  "Attendance"),
    ("assignments", "Assignments"),
    ("reports",     "Reports"),
];

static STAFF: &[Role] = &[Role::Faculty, Role::Admin];

#[derive(Debug, Deserialize)]
pub struct FacultyQuery {
    pub section: Option<String>,
    #[serde(rename = "className")]
    pub class_name: Option<String>,
    pub date: Option<String>,
    pub course: Option<String>,
    #[serde(rename = "startDate")]
    pub start_date: Option<String>,
    #[serde(rename = "endDate")]
    pub end_date: Option<String>,
}

/// Data type to read the grade form on an assignment review card.
#[derive(Debug, Deserialize)]
pub struct GradeData {
    pub grade: String,
    pub feedback: String,
    pub course: String,
}

pub async fn dashboard(
    headers: HeaderMap,
    Query(query): Query<FacultyQuery>,
    Extension(glob): Extension<Arc<RwLock<Glob>>>
) -> Response {
    log::trace!("faculty::dashboard( {:?}, [ global state ] ) called.", &query.section);

    let sess = match guard(&headers, STAFF, &glob).await {
        Ok(sess) => sess,
        Err(resp) => { return resp; },
    };

    let glob = glob.read().await;
    let (nav, active) = sidebar(SECTIONS, query.section.as_deref());

    match active {
        "attendance" => attendance_section(&glob, &sess, nav, &query, None, None).await,
        "assignments" => assignments_section(
            &glob, &sess, nav, query.course.as_deref(), None, None
        ).await,
        "reports" => reports_section(&glob, &sess, nav, &query).await,
        _ => overview_section(&glob, &sess, nav).await,
    }
}

async fn overview_section(glob: &Glob, sess: &Session, nav: Vec<NavLink>) -> Response {
    log::trace!("faculty::overview_section( [ global state ] ) called.");

    let mut error_message: Option<String> = None;
    let stats = match glob.api.faculty_dashboard(&sess.token).await {
        Ok(stats) => Some(stats),
        Err(e) => {
            log::error!("Error fetching faculty dashboard: {}", e.display());
            error_message = Some(e.display().to_owned());
            None
        },
    };

    let data = json!({
        "name": &sess.name,
        "nav": nav,
        "show_overview": true,
        "stats": stats,
        "error_message": error_message,
    });

    serve_template(StatusCode::OK, "faculty", &data, vec![])
}

//
//
// This section is for dealing with ATTENDANCE MARKING.
//
//

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RosterRow {
    student_id: i64,
    name: String,
    email: String,
    present: bool,
    absent: bool,
}

/// Merge a class roster with whatever marks already exist for the day.
/// Students without an existing record default to present, the same as
/// the original marking form.
fn roster_rows(students: Vec<UserRecord>, existing: &[AttendanceRecord]) -> Vec<RosterRow> {
    let marks: HashMap<i64, &str> = existing.iter()
        .map(|r| (r.student_id, r.status.as_str()))
        .collect();

    students.into_iter()
        .map(|s| {
            let status = marks.get(&s.id).copied().unwrap_or("PRESENT");
            let absent = status == "ABSENT";
            RosterRow {
                student_id: s.id,
                name: s.name,
                email: s.email,
                present: !absent,
                absent,
            }
        })
        .collect()
}

async fn attendance_section(
    glob: &Glob,
    sess: &Session,
    nav: Vec<NavLink>,
    query: &FacultyQuery,
    error: Option<String>,
    success: Option<String>,
) -> Response {
    log::trace!(
        "faculty::attendance_section( {:?}, {:?} ) called.",
        &query.class_name, &query.date
    );

    let mut error_message = error;
    let courses = match glob.api.public_courses().await {
        Ok(courses) => courses,
        Err(e) => {
            log::error!("Error fetching courses for class selector: {}", e.display());
            if error_message.is_none() {
                error_message = Some(e.display().to_owned());
            }
            Vec::new()
        },
    };

    let class_name = query.class_name.as_deref().filter(|s| !s.is_empty());
    let options = course_options(courses, class_name);
    let date = query.date.clone()
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| {
            crate::now().format(&crate::DATE_FMT).unwrap_or_default()
        });

    let mut roster = String::new();
    let mut has_roster = false;

    if let Some(class_name) = class_name {
        if Date::parse(&date, &crate::DATE_FMT).is_err() {
            error_message = Some(format!("Unable to parse {:?} as a date.", &date));
        } else {
            match load_roster(glob, sess, class_name, &date).await {
                Ok(rows) => {
                    let rendered = render_rows(
                        "roster_row", &rows, 3,
                        "No students enrolled in this class."
                    );
                    match rendered {
                        Ok(r) => {
                            roster = r;
                            has_roster = true;
                        },
                        Err(e) => {
                            log::error!("Error rendering roster rows: {}", &e);
                            return html_500();
                        },
                    }
                },
                Err(e) => {
                    if error_message.is_none() {
                        error_message = Some(e);
                    }
                },
            }
        }
    }

    let data = json!({
        "name": &sess.name,
        "nav": nav,
        "show_attendance": true,
        "course_options": options,
        "date": date,
        "class_name": class_name,
        "has_roster": has_roster,
        "roster_rows": roster,
        "error_message": error_message,
        "success_message": success,
    });

    serve_template(StatusCode::OK, "faculty", &data, vec![])
}

/// Two round trips: the enrolled students, then any marks already saved
/// for the requested day.
async fn load_roster(
    glob: &Glob,
    sess: &Session,
    class_name: &str,
    date: &str,
) -> Result<Vec<RosterRow>, String> {
    let students = glob.api.class_roster(&sess.token, class_name).await
        .map_err(|e| e.display().to_owned())?;
    let existing = glob.api.attendance_on(&sess.token, class_name, date).await
        .map_err(|e| e.display().to_owned())?;

    Ok(roster_rows(students, &existing))
}

pub async fn save_attendance(
    headers: HeaderMap,
    Extension(glob): Extension<Arc<RwLock<Glob>>>,
    Form(form): Form<HashMap<String, String>>
) -> Response {
    log::trace!("faculty::save_attendance( [ {} form fields ] ) called.", form.len());

    let sess = match guard(&headers, STAFF, &glob).await {
        Ok(sess) => sess,
        Err(resp) => { return resp; },
    };

    let glob = glob.read().await;
    let (nav, _) = sidebar(SECTIONS, Some("attendance"));

    let class_name = form.get("className").cloned().unwrap_or_default();
    let date = form.get("date").cloned().unwrap_or_default();
    let query = FacultyQuery {
        section: Some("attendance".to_owned()),
        class_name: Some(class_name.clone()),
        date: Some(date.clone()),
        course: None,
        start_date: None,
        end_date: None,
    };

    if class_name.is_empty() || date.is_empty() {
        return attendance_section(
            &glob, &sess, nav, &query,
            Some("Class and date are required.".to_owned()),
            None,
        ).await;
    }

    let records = mark_records(&form);
    if records.is_empty() {
        return attendance_section(
            &glob, &sess, nav, &query,
            Some("Load a class roster before saving.".to_owned()),
            None,
        ).await;
    }

    let n_records = records.len();
    let batch = MarkBatch { class_name, date, records };

    match glob.api.mark_batch(&sess.token, &batch).await {
        Ok(_) => {
            let msg = format!("Attendance saved for {} students.", n_records);
            attendance_section(&glob, &sess, nav, &query, None, Some(msg)).await
        },
        Err(e) => {
            log::error!(
                "Error saving attendance for {:?} on {:?}: {}",
                &batch.class_name, &batch.date, e.display()
            );
            attendance_section(
                &glob, &sess, nav, &query,
                Some(e.display().to_owned()),
                None,
            ).await
        },
    }
}

/// Pull the per-student status selections out of the roster form. Each
/// roster row posts a field named `status-<student id>`.
fn mark_records(form: &HashMap<String, String>) -> Vec<MarkRecord> {
    let mut records: Vec<MarkRecord> = form.iter()
        .filter_map(|(key, value)| {
            let id_str = key.strip_prefix("status-")?;
            let student_id: i64 = id_str.parse().ok()?;
            Some(MarkRecord {
                student_id,
                status: value.clone(),
            })
        })
        .collect();

    records.sort_by_key(|r| r.student_id);
    records
}

//
//
// This section is for dealing with ASSIGNMENT REVIEW.
//
//

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ReviewCard {
    id: i64,
    student_name: String,
    course: String,
    title: String,
    file: String,
    feedback: String,
    feedback_display: String,
    grade: String,
}

impl ReviewCard {
    fn from_assignment(a: crate::models::Assignment) -> Self {
        let feedback = a.feedback.unwrap_or_default();
        let feedback_display = if feedback.is_empty() {
            "No feedback yet".to_owned()
        } else {
            feedback.clone()
        };

        Self {
            id: a.id,
            student_name: a.student_name.unwrap_or_default(),
            course: a.course,
            title: a.assignment_title
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| "General Submission".to_owned()),
            file: a.original_file_name.unwrap_or_default(),
            feedback,
            feedback_display,
            grade: a.grade.unwrap_or_default(),
        }
    }
}

async fn assignments_section(
    glob: &Glob,
    sess: &Session,
    nav: Vec<NavLink>,
    course: Option<&str>,
    error: Option<String>,
    success: Option<String>,
) -> Response {
    log::trace!("faculty::assignments_section( {:?} ) called.", course);

    let mut error_message = error;
    let courses = match glob.api.public_courses().await {
        Ok(courses) => courses,
        Err(e) => {
            log::error!("Error fetching courses for review selector: {}", e.display());
            if error_message.is_none() {
                error_message = Some(e.display().to_owned());
            }
            Vec::new()
        },
    };

    let course = course.filter(|s| !s.is_empty());
    let options = course_options(courses, course);

    let cards = match course {
        Some(course) => {
            match glob.api.course_assignments(&sess.token, course).await {
                Ok(assignments) => {
                    let cards: Vec<ReviewCard> = assignments.into_iter()
                        .map(ReviewCard::from_assignment)
                        .collect();
                    render_cards(
                        "review_card", &cards,
                        "No assignments submitted for this course."
                    )
                },
                Err(e) => {
                    let data = json!({ "message": e.display() });
                    let mut buff: Vec<u8> = Vec::new();
                    match write_template("error_note", &data, &mut buff) {
                        Ok(()) => Ok(unsafe { String::from_utf8_unchecked(buff) }),
                        Err(e) => Err(e),
                    }
                },
            }
        },
        None => {
            let data = json!({ "message": "Select a course to load assignments." });
            let mut buff: Vec<u8> = Vec::new();
            match write_template("no_data_note", &data, &mut buff) {
                Ok(()) => Ok(unsafe { String::from_utf8_unchecked(buff) }),
                Err(e) => Err(e),
            }
        },
    };

    let cards = match cards {
        Ok(cards) => cards,
        Err(e) => {
            log::error!("Error rendering review cards: {}", &e);
            return html_500();
        },
    };

    let data = json!({
        "name": &sess.name,
        "nav": nav,
        "show_assignments": true,
        "course_options": options,
        "course": course,
        "review_cards": cards,
        "error_message": error_message,
        "success_message": success,
    });

    serve_template(StatusCode::OK, "faculty", &data, vec![])
}

/// Normalize a submitted grade; only A, B, and C exist here. Anything
/// else never makes it onto the wire.
fn valid_grade(raw: &str) -> Option<&'static str> {
    match raw.trim().to_uppercase().as_str() {
        "A" => Some("A"),
        "B" => Some("B"),
        "C" => Some("C"),
        _ => None,
    }
}

pub async fn save_grade(
    headers: HeaderMap,
    Path(id): Path<i64>,
    Extension(glob): Extension<Arc<RwLock<Glob>>>,
    Form(form): Form<GradeData>
) -> Response {
    log::trace!("faculty::save_grade( {}, {:?} ) called.", id, &form.grade);

    let sess = match guard(&headers, STAFF, &glob).await {
        Ok(sess) => sess,
        Err(resp) => { return resp; },
    };

    let glob = glob.read().await;
    let (nav, _) = sidebar(SECTIONS, Some("assignments"));

    let grade = match valid_grade(&form.grade) {
        Some(grade) => grade,
        None => {
            return assignments_section(
                &glob, &sess, nav, Some(form.course.as_str()),
                Some("Grade must be A, B, or C".to_owned()),
                None,
            ).await;
        },
    };

    let update = GradeUpdate {
        grade: grade.to_owned(),
        feedback: form.feedback.trim().to_owned(),
    };

    match glob.api.save_grade(&sess.token, id, &update).await {
        Ok(_) => {
            assignments_section(
                &glob, &sess, nav, Some(form.course.as_str()),
                None,
                Some("Grade updated successfully".to_owned()),
            ).await
        },
        Err(e) => {
            log::error!("Error saving grade for assignment {}: {}", id, e.display());
            assignments_section(
                &glob, &sess, nav, Some(form.course.as_str()),
                Some(e.display().to_owned()),
                None,
            ).await
        },
    }
}

//
//
// This section is for dealing with the ATTENDANCE REPORT.
//
//

async fn reports_section(
    glob: &Glob,
    sess: &Session,
    nav: Vec<NavLink>,
    query: &FacultyQuery,
) -> Response {
    log::trace!(
        "faculty::reports_section( {:?}, {:?}, {:?} ) called.",
        &query.class_name, &query.start_date, &query.end_date
    );

    let mut error_message: Option<String> = None;
    let courses = match glob.api.public_courses().await {
        Ok(courses) => courses,
        Err(e) => {
            log::error!("Error fetching courses for report form: {}", e.display());
            error_message = Some(e.display().to_owned());
            Vec::new()
        },
    };

    let class_name = query.class_name.as_deref().filter(|s| !s.is_empty());
    let options = course_options(courses, class_name);

    let (default_start, default_end) = month_range_defaults();
    let start = query.start_date.clone().unwrap_or(default_start);
    let end = query.end_date.clone().unwrap_or(default_end);

    let has_report = query.start_date.is_some() && query.end_date.is_some();
    let report_rows = if has_report {
        let rendered = match glob.api.attendance_report(
            &sess.token, class_name, &start, &end
        ).await {
            Ok(rows) => render_rows("report_row", &rows, 5, "No records for selected range."),
            Err(e) => render_error_row(5, e.display()),
        };

        match rendered {
            Ok(rows) => rows,
            Err(e) => {
                log::error!("Error rendering report rows: {}", &e);
                return html_500();
            },
        }
    } else {
        String::new()
    };

    let data = json!({
        "name": &sess.name,
        "nav": nav,
        "show_reports": true,
        "course_options": options,
        "start_date": start,
        "end_date": end,
        "has_report": has_report,
        "report_rows": report_rows,
        "error_message": error_message,
    });

    serve_template(StatusCode::OK, "faculty", &data, vec![])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::ensure_logging;

    #[test]
    fn grade_validation() {
        // Case and whitespace get normalized away...
        assert_eq!(valid_grade("a"), Some("A"));
        assert_eq!(valid_grade(" b "), Some("B"));
        assert_eq!(valid_grade("C"), Some("C"));

        // ...and everything outside {A, B, C} is rejected.
        assert_eq!(valid_grade("D"), None);
        assert_eq!(valid_grade("A+"), None);
        assert_eq!(valid_grade(""), None);
        assert_eq!(valid_grade("  "), None);
    }

    fn student(id: i64, name: &str) -> UserRecord {
        UserRecord {
            id,
            name: name.to_owned(),
            email: format!("{}@example.edu", name.to_lowercase()),
            role: "STUDENT".to_owned(),
            enabled: true,
            created_at: None,
        }
    }

    fn mark(student_id: i64, status: &str) -> AttendanceRecord {
        AttendanceRecord {
            id: None,
            student_id,
            student_name: None,
            class_name: "CS101".to_owned(),
            date: "2026-03-01".to_owned(),
            status: status.to_owned(),
        }
    }

    #[test]
    fn roster_merging() {
        ensure_logging();

        let students = vec![student(1, "Ada"), student(2, "Grace"), student(3, "Edsger")];
        let existing = vec![mark(2, "ABSENT"), mark(3, "PRESENT")];

        let rows = roster_rows(students, &existing);
        assert_eq!(rows.len(), 3);

        // No existing mark defaults to present.
        assert!(rows[0].present);
        assert!(!rows[0].absent);

        assert!(rows[1].absent);
        assert!(rows[2].present);
    }

    #[test]
    fn mark_record_extraction() {
        let mut form: HashMap<String, String> = HashMap::new();
        form.insert("className".to_owned(), "CS101".to_owned());
        form.insert("date".to_owned(), "2026-03-01".to_owned());
        form.insert("status-2".to_owned(), "ABSENT".to_owned());
        form.insert("status-1".to_owned(), "PRESENT".to_owned());
        form.insert("status-bogus".to_owned(), "PRESENT".to_owned());

        let records = mark_records(&form);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].student_id, 1);
        assert_eq!(records[0].status, "PRESENT");
        assert_eq!(records[1].student_id, 2);
        assert_eq!(records[1].status, "ABSENT");
    }
}
