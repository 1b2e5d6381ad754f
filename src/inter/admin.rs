/*!
Subcrate for interoperation with Admin users.
*/
use std::fmt::Write;
use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    http::header::{HeaderMap, HeaderValue},
    response::{IntoResponse, Response},
    Form,
};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::RwLock;

use crate::config::Glob;
use crate::models::{NewCourse, NewUser, ReportRow};
use crate::session::Session;
use crate::user::Role;
use super::*;

static SECTIONS: &[(&str, &str)] = &[
    ("overview",   "Overview"),
    ("users",      "Users"),
    ("courses",    "Courses"),
    ("attendance", "Attendance"),
];

static ADMIN_ONLY: &[Role] = &[Role::Admin];

#[derive(Debug, Deserialize)]
pub struct AdminQuery {
    pub section: Option<String>,
    #[serde(rename = "className")]
    pub class_name: Option<String>,
    #[serde(rename = "startDate")]
    pub start_date: Option<String>,
    #[serde(rename = "endDate")]
    pub end_date: Option<String>,
}

/// Data type to read the add-user form on the users section.
#[derive(Debug, Deserialize)]
pub struct NewUserData {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: String,
}

/// Data type to read the add-course form on the courses section.
#[derive(Debug, Deserialize)]
pub struct NewCourseData {
    pub code: String,
    pub title: String,
    pub department: String,
    #[serde(rename = "facultyName")]
    pub faculty_name: String,
}

pub async fn dashboard(
    headers: HeaderMap,
    Query(query): Query<AdminQuery>,
    Extension(glob): Extension<Arc<RwLock<Glob>>>
) -> Response {
    log::trace!("admin::dashboard( {:?}, [ global state ] ) called.", &query.section);

    let sess = match guard(&headers, ADMIN_ONLY, &glob).await {
        Ok(sess) => sess,
        Err(resp) => { return resp; },
    };

    let glob = glob.read().await;
    let (nav, active) = sidebar(SECTIONS, query.section.as_deref());

    match active {
        "users" => users_section(&glob, &sess, nav, None, None).await,
        "courses" => courses_section(&glob, &sess, nav, None, None).await,
        "attendance" => attendance_section(&glob, &sess, nav, &query).await,
        _ => overview_section(&glob, &sess, nav).await,
    }
}

async fn overview_section(glob: &Glob, sess: &Session, nav: Vec<NavLink>) -> Response {
    log::trace!("admin::overview_section( [ global state ] ) called.");

    let mut error_message: Option<String> = None;
    let stats = match glob.api.admin_stats(&sess.token).await {
        Ok(stats) => Some(stats),
        Err(e) => {
            log::error!("Error fetching admin stats: {}", e.display());
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

    serve_template(StatusCode::OK, "admin", &data, vec![])
}

async fn users_section(
    glob: &Glob,
    sess: &Session,
    nav: Vec<NavLink>,
    error: Option<String>,
    success: Option<String>,
) -> Response {
    log::trace!("admin::users_section( [ global state ] ) called.");

    let mut error_message = error;
    let users = match glob.api.admin_users(&sess.token).await {
        Ok(users) => users,
        Err(e) => {
            log::error!("Error fetching user list: {}", e.display());
            if error_message.is_none() {
                error_message = Some(e.display().to_owned());
            }
            Vec::new()
        },
    };

    let user_rows = match render_rows("user_row", &users, 5, "No users found.") {
        Ok(rows) => rows,
        Err(e) => {
            log::error!("Error rendering user rows: {}", &e);
            return html_500();
        },
    };

    let data = json!({
        "name": &sess.name,
        "nav": nav,
        "show_users": true,
        "user_rows": user_rows,
        "error_message": error_message,
        "success_message": success,
    });

    serve_template(StatusCode::OK, "admin", &data, vec![])
}

pub async fn add_user(
    headers: HeaderMap,
    Extension(glob): Extension<Arc<RwLock<Glob>>>,
    Form(form): Form<NewUserData>
) -> Response {
    log::trace!("admin::add_user( {:?}, {:?} ) called.", &form.email, &form.role);

    let sess = match guard(&headers, ADMIN_ONLY, &glob).await {
        Ok(sess) => sess,
        Err(resp) => { return resp; },
    };

    let glob = glob.read().await;
    let (nav, _) = sidebar(SECTIONS, Some("users"));

    let name = form.name.trim();
    let email = form.email.trim();
    if name.is_empty() || email.is_empty() || form.password.is_empty() {
        return users_section(
            &glob, &sess, nav,
            Some("Name, email, and password are all required.".to_owned()),
            None,
        ).await;
    }

    let role: Role = match form.role.parse() {
        Ok(role) => role,
        Err(e) => {
            return users_section(&glob, &sess, nav, Some(e), None).await;
        },
    };

    let new_user = NewUser {
        name: name.to_owned(),
        email: email.to_owned(),
        password: form.password.clone(),
        role: role.to_string(),
    };

    match glob.api.add_user(&sess.token, &new_user).await {
        Ok(u) => {
            let msg = format!("User {} created.", &u.email);
            users_section(&glob, &sess, nav, None, Some(msg)).await
        },
        Err(e) => {
            log::error!("Error adding user {:?}: {}", &new_user.email, e.display());
            users_section(&glob, &sess, nav, Some(e.display().to_owned()), None).await
        },
    }
}

pub async fn delete_user(
    headers: HeaderMap,
    Path(id): Path<i64>,
    Extension(glob): Extension<Arc<RwLock<Glob>>>
) -> Response {
    log::trace!("admin::delete_user( {} ) called.", id);

    let sess = match guard(&headers, ADMIN_ONLY, &glob).await {
        Ok(sess) => sess,
        Err(resp) => { return resp; },
    };

    let glob = glob.read().await;
    let (nav, _) = sidebar(SECTIONS, Some("users"));

    match glob.api.delete_user(&sess.token, id).await {
        Ok(()) => {
            users_section(&glob, &sess, nav, None, Some("User deleted.".to_owned())).await
        },
        Err(e) => {
            log::error!("Error deleting user {}: {}", id, e.display());
            users_section(&glob, &sess, nav, Some(e.display().to_owned()), None).await
        },
    }
}

//
//
// This section is for dealing with COURSES.
//
//

async fn courses_section(
    glob: &Glob,
    sess: &Session,
    nav: Vec<NavLink>,
    error: Option<String>,
    success: Option<String>,
) -> Response {
    log::trace!("admin::courses_section( [ global state ] ) called.");

    let mut error_message = error;
    let courses = match glob.api.admin_courses(&sess.token).await {
        Ok(courses) => courses,
        Err(e) => {
            log::error!("Error fetching course list: {}", e.display());
            if error_message.is_none() {
                error_message = Some(e.display().to_owned());
            }
            Vec::new()
        },
    };

    let course_rows = match render_rows("course_row", &courses, 5, "No courses found.") {
        Ok(rows) => rows,
        Err(e) => {
            log::error!("Error rendering course rows: {}", &e);
            return html_500();
        },
    };

    let data = json!({
        "name": &sess.name,
        "nav": nav,
        "show_courses": true,
        "course_rows": course_rows,
        "error_message": error_message,
        "success_message": success,
    });

    serve_template(StatusCode::OK, "admin", &data, vec![])
}

pub async fn add_course(
    headers: HeaderMap,
    Extension(glob): Extension<Arc<RwLock<Glob>>>,
    Form(form): Form<NewCourseData>
) -> Response {
    log::trace!("admin::add_course( {:?} ) called.", &form.code);

    let sess = match guard(&headers, ADMIN_ONLY, &glob).await {
        Ok(sess) => sess,
        Err(resp) => { return resp; },
    };

    let glob = glob.read().await;
    let (nav, _) = sidebar(SECTIONS, Some("courses"));

    let code = form.code.trim();
    let title = form.title.trim();
    if code.is_empty() || title.is_empty() {
        return courses_section(
            &glob, &sess, nav,
            Some("Course code and title are required.".to_owned()),
            None,
        ).await;
    }

    let new_course = NewCourse {
        code: code.to_owned(),
        title: title.to_owned(),
        department: form.department.trim().to_owned(),
        faculty_name: form.faculty_name.trim().to_owned(),
        active: true,
    };

    match glob.api.add_course(&sess.token, &new_course).await {
        Ok(c) => {
            let msg = format!("Course {} created.", &c.code);
            courses_section(&glob, &sess, nav, None, Some(msg)).await
        },
        Err(e) => {
            log::error!("Error adding course {:?}: {}", &new_course.code, e.display());
            courses_section(&glob, &sess, nav, Some(e.display().to_owned()), None).await
        },
    }
}

pub async fn delete_course(
    headers: HeaderMap,
    Path(id): Path<i64>,
    Extension(glob): Extension<Arc<RwLock<Glob>>>
) -> Response {
    log::trace!("admin::delete_course( {} ) called.", id);

    let sess = match guard(&headers, ADMIN_ONLY, &glob).await {
        Ok(sess) => sess,
        Err(resp) => { return resp; },
    };

    let glob = glob.read().await;
    let (nav, _) = sidebar(SECTIONS, Some("courses"));

    match glob.api.delete_course(&sess.token, id).await {
        Ok(()) => {
            courses_section(&glob, &sess, nav, None, Some("Course deleted.".to_owned())).await
        },
        Err(e) => {
            log::error!("Error deleting course {}: {}", id, e.display());
            courses_section(&glob, &sess, nav, Some(e.display().to_owned()), None).await
        },
    }
}

//
//
// This section is for dealing with the ATTENDANCE REPORT.
//
//

/// Query-string tail for the CSV export link, so the export re-runs
/// exactly the report being looked at.
fn report_query_string(class_name: Option<&str>, start: &str, end: &str) -> String {
    let mut s = String::new();

    if let Some(class_name) = class_name {
        let _ = write!(
            &mut s,
            "className={}&",
            urlencoding::encode(class_name)
        );
    }
    let _ = write!(
        &mut s,
        "startDate={}&endDate={}",
        urlencoding::encode(start),
        urlencoding::encode(end)
    );

    s
}

async fn attendance_section(
    glob: &Glob,
    sess: &Session,
    nav: Vec<NavLink>,
    query: &AdminQuery,
) -> Response {
    log::trace!(
        "admin::attendance_section( {:?}, {:?}, {:?} ) called.",
        &query.class_name, &query.start_date, &query.end_date
    );

    let mut error_message: Option<String> = None;
    let courses = match glob.api.admin_courses(&sess.token).await {
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

    // The table only shows up once the form has been submitted.
    let has_report = query.start_date.is_some() && query.end_date.is_some();
    let report_rows = if has_report {
        let rendered = match glob.api.attendance_report(
            &sess.token, class_name, &start, &end
        ).await {
            Ok(rows) => render_rows("report_row", &rows, 5, "No report data available."),
            // A failed report load lands in the table, not in a banner.
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
        "show_attendance": true,
        "course_options": options,
        "start_date": start,
        "end_date": end,
        "has_report": has_report,
        "report_rows": report_rows,
        "csv_query": report_query_string(class_name, &start, &end),
        "error_message": error_message,
    });

    serve_template(StatusCode::OK, "admin", &data, vec![])
}

fn report_to_csv(rows: &[ReportRow]) -> Result<String, String> {
    let mut w = csv::Writer::from_writer(Vec::new());

    w.write_record(["Student", "Class", "Total", "Present", "Percentage"])
        .map_err(|e| format!("Error writing CSV header: {}", &e))?;

    for row in rows.iter() {
        let total = row.total_classes.to_string();
        let present = row.present_classes.to_string();
        let percentage = format!("{}%", row.attendance_percentage);
        w.write_record([
            row.student_name.as_str(),
            row.class_name.as_str(),
            total.as_str(),
            present.as_str(),
            percentage.as_str(),
        ]).map_err(|e| format!(
            "Error writing CSV row for {:?}: {}", &row.student_name, &e
        ))?;
    }

    let bytes = w.into_inner()
        .map_err(|e| format!("Error finishing CSV: {}", &e))?;
    String::from_utf8(bytes)
        .map_err(|e| format!("CSV output not UTF-8: {}", &e))
}

pub async fn report_csv(
    headers: HeaderMap,
    Query(query): Query<AdminQuery>,
    Extension(glob): Extension<Arc<RwLock<Glob>>>
) -> Response {
    log::trace!(
        "admin::report_csv( {:?}, {:?}, {:?} ) called.",
        &query.class_name, &query.start_date, &query.end_date
    );

    let sess = match guard(&headers, ADMIN_ONLY, &glob).await {
        Ok(sess) => sess,
        Err(resp) => { return resp; },
    };

    let glob = glob.read().await;

    let class_name = query.class_name.as_deref().filter(|s| !s.is_empty());
    let (default_start, default_end) = month_range_defaults();
    let start = query.start_date.clone().unwrap_or(default_start);
    let end = query.end_date.clone().unwrap_or(default_end);

    let rows = match glob.api.attendance_report(
        &sess.token, class_name, &start, &end
    ).await {
        Ok(rows) => rows,
        Err(e) => {
            log::error!("Error fetching report for CSV export: {}", e.display());
            return text_500(Some(e.display().to_owned()));
        },
    };

    let csv_text = match report_to_csv(&rows) {
        Ok(csv_text) => csv_text,
        Err(e) => {
            log::error!("Error building report CSV: {}", &e);
            return text_500(None);
        },
    };

    (
        StatusCode::OK,
        [
            (
                header::CONTENT_TYPE,
                HeaderValue::from_static("text/csv; charset=utf-8")
            ),
            (
                header::CONTENT_DISPOSITION,
                HeaderValue::from_static("attachment; filename=\"attendance-report.csv\"")
            ),
        ],
        csv_text,
    ).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::ensure_logging;

    fn report_row(name: &str, class: &str, total: i64, present: i64, pct: f64) -> ReportRow {
        ReportRow {
            student_id: None,
            student_name: name.to_owned(),
            class_name: class.to_owned(),
            total_classes: total,
            present_classes: present,
            attendance_percentage: pct,
        }
    }

    #[test]
    fn csv_export() {
        ensure_logging();

        let rows = vec![
            report_row("Ada", "CS101", 10, 9, 90.0),
            report_row("Grace, H", "CS101", 10, 8, 80.0),
        ];

        let text = report_to_csv(&rows).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next().unwrap(), "Student,Class,Total,Present,Percentage");
        assert_eq!(lines.next().unwrap(), "Ada,CS101,10,9,90%");
        // The comma in the name has to survive quoting.
        assert_eq!(lines.next().unwrap(), "\"Grace, H\",CS101,10,8,80%");
        assert!(lines.next().is_none());
    }

    #[test]
    fn csv_export_empty() {
        let text = report_to_csv(&[]).unwrap();
        assert_eq!(text.lines().count(), 1);
    }

    #[test]
    fn report_query_strings() {
        assert_eq!(
            report_query_string(None, "2026-03-01", "2026-03-31"),
            "startDate=2026-03-01&endDate=2026-03-31"
        );
        assert_eq!(
            report_query_string(Some("CS 101"), "2026-03-01", "2026-03-31"),
            "className=CS%20101&startDate=2026-03-01&endDate=2026-03-31"
        );
    }
}
