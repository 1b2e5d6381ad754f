/*!
Subcrate for interoperation with Student users.
*/
use std::fmt::Write as FmtWrite;
use std::sync::Arc;

use axum::{
    extract::{Extension, Multipart, Query},
    http::header::HeaderMap,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::RwLock;

use crate::{
    config::Glob,
    models::{Assignment, AttendanceRecord},
    session::Session,
    user::Role,
    MiniString,
};
use super::*;

type SMALLSTORE = [u8; 16];

static SECTIONS: &[(&str, &str)] = &[
    ("overview",    "Overview"),
    ("attendance",  "Attendance"),
    ("assignments", "Assignments"),
    ("submit",      "Submit"),
];

static STUDENT_ONLY: &[Role] = &[Role::Student];

#[derive(Debug, Deserialize)]
pub struct StudentQuery {
    pub section: Option<String>,
}

pub async fn dashboard(
    headers: HeaderMap,
    Query(query): Query<StudentQuery>,
    Extension(glob): Extension<Arc<RwLock<Glob>>>
) -> Response {
    log::trace!("student::dashboard( {:?}, [ global state ] ) called.", &query.section);

    let sess = match guard(&headers, STUDENT_ONLY, &glob).await {
        Ok(sess) => sess,
        Err(resp) => { return resp; },
    };
    let sess = ensure_user_id(&headers, sess, &glob).await;

    let glob = glob.read().await;
    let (nav, active) = sidebar(SECTIONS, query.section.as_deref());

    match active {
        "attendance" => attendance_section(&glob, &sess, nav).await,
        "assignments" => assignments_section(&glob, &sess, nav).await,
        "submit" => submit_section(&glob, &sess, nav, None, None).await,
        _ => overview_section(&glob, &sess, nav).await,
    }
}

/// Sessions written before the user id landed in the login payload hold
/// a zero id; fill it in from `/api/auth/me` and write the session back
/// so the next page load skips the round trip.
async fn ensure_user_id(
    headers: &HeaderMap,
    mut sess: Session,
    glob: &Arc<RwLock<Glob>>,
) -> Session {
    if sess.user_id != 0 {
        return sess;
    }

    let me = { glob.read().await.api.me(&sess.token).await };
    match me {
        Ok(u) => {
            sess.user_id = u.id;
            if let Some(key) = session_key(headers) {
                if let Err(e) = glob.write().await.sessions.set_session(&key, sess.clone()) {
                    log::error!(
                        "Error writing refreshed session for {:?}: {}",
                        &sess.name, e.display()
                    );
                }
            }
        },
        Err(e) => {
            log::error!(
                "Error fetching current user for {:?}: {}",
                &sess.name, e.display()
            );
        },
    }

    sess
}

async fn overview_section(glob: &Glob, sess: &Session, nav: Vec<NavLink>) -> Response {
    log::trace!("student::overview_section( [ global state ] ) called.");

    let mut error_message: Option<String> = None;
    let stats = match glob.api.student_dashboard(&sess.token).await {
        Ok(stats) => Some(stats),
        Err(e) => {
            log::error!("Error fetching student dashboard: {}", e.display());
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

    serve_template(StatusCode::OK, "student", &data, vec![])
}

//
//
// This section is for dealing with the ATTENDANCE HISTORY.
//
//

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AttendanceRow {
    class_name: String,
    date: String,
    status: String,
    present: bool,
}

impl AttendanceRow {
    fn from_record(r: AttendanceRecord) -> Self {
        let present = r.status == "PRESENT";
        Self {
            class_name: r.class_name,
            date: r.date,
            status: r.status,
            present,
        }
    }
}

async fn attendance_section(glob: &Glob, sess: &Session, nav: Vec<NavLink>) -> Response {
    log::trace!("student::attendance_section( [ global state ] ) called.");

    let rendered = match glob.api.student_attendance(&sess.token, sess.user_id).await {
        Ok(records) => {
            let rows: Vec<AttendanceRow> = records.into_iter()
                .map(AttendanceRow::from_record)
                .collect();
            render_rows("attendance_row", &rows, 3, "No attendance records found.")
        },
        // A failed load lands in the table, not in a banner.
        Err(e) => render_error_row(3, e.display()),
    };

    let attendance_rows = match rendered {
        Ok(rows) => rows,
        Err(e) => {
            log::error!("Error rendering attendance rows: {}", &e);
            return html_500();
        },
    };

    let data = json!({
        "name": &sess.name,
        "nav": nav,
        "show_attendance": true,
        "attendance_rows": attendance_rows,
    });

    serve_template(StatusCode::OK, "student", &data, vec![])
}

//
//
// This section is for dealing with SUBMITTED ASSIGNMENTS.
//
//

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AssignmentCard {
    course: String,
    title: String,
    file: String,
    submitted: String,
    feedback: String,
    grade: Option<String>,
    grade_class: &'static str,
    scores: String,
}

fn score_display(score: Option<i64>) -> Result<MiniString<SMALLSTORE>, String> {
    let mut s: MiniString<SMALLSTORE> = MiniString::new();
    match score {
        Some(n) => {
            write!(&mut s, "{}", n).map_err(|e| e.to_string())?;
        },
        None => {
            write!(&mut s, "-").map_err(|e| e.to_string())?;
        },
    }
    Ok(s)
}

impl AssignmentCard {
    fn from_assignment(a: Assignment) -> Result<Self, String> {
        let grade_class = match a.grade.as_deref() {
            Some("A") => "grade-a",
            Some("B") => "grade-b",
            _ => "grade-c",
        };

        let mut scores = String::new();
        write!(
            &mut scores,
            "Content {}, Grammar {}, Structure {}, Originality {}",
            score_display(a.content_score)?,
            score_display(a.grammar_score)?,
            score_display(a.structure_score)?,
            score_display(a.originality_score)?,
        ).map_err(|e| e.to_string())?;

        Ok(Self {
            course: a.course,
            title: a.assignment_title
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| "General Submission".to_owned()),
            file: a.original_file_name.unwrap_or_default(),
            submitted: match a.submission_date {
                Some(d) => d.replace('T', " "),
                None => "-".to_owned(),
            },
            feedback: a.feedback
                .filter(|f| !f.is_empty())
                .unwrap_or_else(|| "Feedback pending".to_owned()),
            grade: a.grade,
            grade_class,
            scores,
        })
    }
}

async fn assignments_section(glob: &Glob, sess: &Session, nav: Vec<NavLink>) -> Response {
    log::trace!("student::assignments_section( [ global state ] ) called.");

    let rendered = match glob.api.student_assignments(&sess.token, sess.user_id).await {
        Ok(assignments) => {
            let mut cards: Vec<AssignmentCard> = Vec::with_capacity(assignments.len());
            for a in assignments {
                match AssignmentCard::from_assignment(a) {
                    Ok(card) => { cards.push(card); },
                    Err(e) => {
                        log::error!("Error building assignment card: {}", &e);
                        return html_500();
                    },
                }
            }
            render_cards("assignment_card", &cards, "No assignments submitted yet.")
        },
        Err(e) => {
            let data = json!({ "message": e.display() });
            let mut buff: Vec<u8> = Vec::new();
            match write_template("error_note", &data, &mut buff) {
                Ok(()) => Ok(unsafe { String::from_utf8_unchecked(buff) }),
                Err(e) => Err(e),
            }
        },
    };

    let assignment_cards = match rendered {
        Ok(cards) => cards,
        Err(e) => {
            log::error!("Error rendering assignment cards: {}", &e);
            return html_500();
        },
    };

    let data = json!({
        "name": &sess.name,
        "nav": nav,
        "show_assignments": true,
        "assignment_cards": assignment_cards,
    });

    serve_template(StatusCode::OK, "student", &data, vec![])
}

//
//
// This section is for dealing with ASSIGNMENT SUBMISSION.
//
//

async fn submit_section(
    glob: &Glob,
    sess: &Session,
    nav: Vec<NavLink>,
    error: Option<String>,
    success: Option<String>,
) -> Response {
    log::trace!("student::submit_section( [ global state ] ) called.");

    let mut error_message = error;
    let courses = match glob.api.public_courses().await {
        Ok(courses) => courses,
        Err(e) => {
            log::error!("Error fetching courses for submit form: {}", e.display());
            if error_message.is_none() {
                error_message = Some("No courses available.".to_owned());
            }
            Vec::new()
        },
    };

    let options = course_options(courses, None);

    let data = json!({
        "name": &sess.name,
        "nav": nav,
        "show_submit": true,
        "course_options": options,
        "error_message": error_message,
        "success_message": success,
    });

    serve_template(StatusCode::OK, "student", &data, vec![])
}

/// The pieces of a multipart submission form, pulled out of the body.
#[derive(Debug, Default)]
struct SubmissionForm {
    course: String,
    title: String,
    file_name: String,
    file_bytes: Vec<u8>,
}

async fn read_submission(multipart: &mut Multipart) -> Result<SubmissionForm, String> {
    let mut form = SubmissionForm::default();

    while let Some(field) = multipart.next_field().await
        .map_err(|e| format!("Error reading multipart field: {}", &e))?
    {
        let name = field.name().unwrap_or("").to_owned();
        match name.as_str() {
            "course" => {
                form.course = field.text().await
                    .map_err(|e| format!("Error reading course field: {}", &e))?;
            },
            "assignmentTitle" => {
                form.title = field.text().await
                    .map_err(|e| format!("Error reading title field: {}", &e))?;
            },
            "file" => {
                form.file_name = field.file_name().unwrap_or("upload").to_owned();
                form.file_bytes = field.bytes().await
                    .map_err(|e| format!("Error reading file field: {}", &e))?
                    .to_vec();
            },
            x => {
                log::warn!("Unexpected submission form field {:?}; ignoring.", x);
            },
        }
    }

    Ok(form)
}

pub async fn submit_assignment(
    headers: HeaderMap,
    Extension(glob): Extension<Arc<RwLock<Glob>>>,
    mut multipart: Multipart
) -> Response {
    log::trace!("student::submit_assignment() called.");

    let sess = match guard(&headers, STUDENT_ONLY, &glob).await {
        Ok(sess) => sess,
        Err(resp) => { return resp; },
    };
    let sess = ensure_user_id(&headers, sess, &glob).await;

    let form = match read_submission(&mut multipart).await {
        Ok(form) => form,
        Err(e) => {
            log::error!("Error reading submission form: {}", &e);
            return respond_bad_request(e);
        },
    };

    let glob = glob.read().await;
    let (nav, _) = sidebar(SECTIONS, Some("submit"));

    if form.course.is_empty() || form.file_bytes.is_empty() {
        return submit_section(
            &glob, &sess, nav,
            Some("Course and file are required.".to_owned()),
            None,
        ).await;
    }

    let api_response = glob.api.submit_assignment(
        &sess.token,
        sess.user_id,
        &form.course,
        form.title.trim(),
        &form.file_name,
        form.file_bytes,
    ).await;

    match api_response {
        Ok(_) => {
            submit_section(
                &glob, &sess, nav,
                None,
                Some("Assignment submitted successfully.".to_owned()),
            ).await
        },
        Err(e) => {
            log::error!(
                "Error submitting assignment for {:?} in {:?}: {}",
                &sess.name, &form.course, e.display()
            );
            submit_section(
                &glob, &sess, nav,
                Some(e.display().to_owned()),
                None,
            ).await
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::ensure_logging;

    fn assignment(grade: Option<&str>) -> Assignment {
        Assignment {
            id: 1,
            student_id: Some(9),
            student_name: Some("S".to_owned()),
            course: "CS101".to_owned(),
            assignment_title: None,
            original_file_name: Some("essay.pdf".to_owned()),
            file_path: None,
            feedback: None,
            grade: grade.map(|g| g.to_owned()),
            submission_date: Some("2026-03-01T09:30:00".to_owned()),
            content_score: Some(8),
            grammar_score: None,
            structure_score: Some(7),
            originality_score: None,
            total_score: None,
        }
    }

    #[test]
    fn assignment_card_fallbacks() {
        ensure_logging();

        let card = AssignmentCard::from_assignment(assignment(None)).unwrap();
        assert_eq!(card.title, "General Submission");
        assert_eq!(card.feedback, "Feedback pending");
        assert_eq!(card.submitted, "2026-03-01 09:30:00");
        assert_eq!(card.scores, "Content 8, Grammar -, Structure 7, Originality -");
        assert!(card.grade.is_none());
    }

    #[test]
    fn assignment_grade_classes() {
        for (grade, class) in [("A", "grade-a"), ("B", "grade-b"), ("C", "grade-c")] {
            let card = AssignmentCard::from_assignment(assignment(Some(grade))).unwrap();
            assert_eq!(card.grade.as_deref(), Some(grade));
            assert_eq!(card.grade_class, class);
        }
    }

    #[test]
    fn attendance_row_statuses() {
        let r = AttendanceRecord {
            id: None,
            student_id: 9,
            student_name: None,
            class_name: "CS101".to_owned(),
            date: "2026-03-01".to_owned(),
            status: "ABSENT".to_owned(),
        };

        let row = AttendanceRow::from_record(r);
        assert!(!row.present);
        assert_eq!(row.status, "ABSENT");
    }
}
