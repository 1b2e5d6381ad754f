/*!
Interoperation between the visitor's browser and this front end.

(Talking to the upstream API is covered by `api`; this module holds the
plumbing the page controllers share: the template registry, the role
guard, the sidebar builder, and the session cookie helpers.)
*/
use std::{
    fmt::Debug,
    path::Path,
    sync::Arc,
};

use axum::{
    http::{header, StatusCode},
    http::header::{HeaderMap, HeaderName, HeaderValue},
    response::{Html, IntoResponse, Redirect, Response},
};
use handlebars::Handlebars;
use once_cell::sync::OnceCell;
use serde::Serialize;
use serde_json::json;
use tokio::sync::RwLock;

use crate::config::Glob;
use crate::models::Course;
use crate::session::Session;
use crate::user::Role;

pub mod admin;
pub mod faculty;
pub mod login;
pub mod student;

static TEMPLATES: OnceCell<Handlebars> = OnceCell::new();

/// Name of the cookie that carries the visitor's session key.
pub const SESSION_COOKIE: &str = "quad-key";

static HTML_500: &str = r#"<!doctype html>
<html>
<head>
<meta charset="utf-8">
<title>quad | Error</title>
<link rel="stylesheet" href="/static/quad.css">
</head>
<body>
<h1>Internal Server Error</h1>
<p>(Error 500)</p>
<p>Something went wrong on our end. No further or more
helpful information is available about the problem.</p>
</body>
</html>"#;

static TEXT_500: &str = "An internal error occurred; an appropriate response was inconstructable.";

trait AddHeaders: IntoResponse + Sized {
    fn add_headers(self, mut new_headers: Vec<(HeaderName, HeaderValue)>) -> Response {
        let mut r = self.into_response();
        let r_headers = r.headers_mut();
        for (name, value) in new_headers.drain(..) {
            r_headers.insert(name, value);
        }

        r
    }
}

impl<T: IntoResponse + Sized> AddHeaders for T {}

/**
Initializes the resources used in this module. This function should be
called before any functionality of this module or any of its submodules
is used.

Currently the only thing that happens here is loading the templates used
by `serve_template()` and `write_template()`, which will panic unless
`init()` has been called first.

The argument is the path to the directory where the templates can be
found.
*/
pub fn init<P: AsRef<Path>>(template_dir: P) -> Result<(), String> {
    if TEMPLATES.get().is_some() {
        log::warn!("Templates directory already initialized; ignoring.");
        return Ok(())
    }

    let template_dir = template_dir.as_ref();

    let mut h = Handlebars::new();
    #[cfg(debug_assertions)]
    h.set_dev_mode(true);
    h.register_templates_directory(".html", template_dir)
        .map_err(|e| format!(
            "Error registering templates directory {}: {}",
            template_dir.display(), &e
        ))?;

    TEMPLATES.set(h)
        .map_err(|old_h| {
            let mut estr = String::from("Templates directory already registered w/templates:");
            for template_name in old_h.get_templates().keys() {
                estr.push('\n');
                estr.push_str(template_name.as_str());
            }
            estr
        })?;

    Ok(())
}

/**
Return an HTML response in the case of an unrecoverable* error.

(*"Unrecoverable" from the perspective of fielding the current request,
not from the perspective of the program crashing.)
*/
pub fn html_500() -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Html(HTML_500)
    ).into_response()
}

pub fn text_500(text: Option<String>) -> Response {
    match text {
        Some(text) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            text
        ).into_response(),
        None => (
            StatusCode::INTERNAL_SERVER_ERROR,
            TEXT_500.to_owned()
        ).into_response()
    }
}

pub fn respond_bad_request(msg: String) -> Response {
    log::trace!("respond_bad_request( {:?} ) called.", &msg);

    (
        StatusCode::BAD_REQUEST,
        msg
    ).into_response()
}

pub fn serve_template<S>(
    code: StatusCode,
    template_name: &str,
    data: &S,
    addl_headers: Vec<(HeaderName, HeaderValue)>
) -> Response
where
    S: Serialize + Debug
{
    log::trace!("serve_template( {}, {:?}, ... ) called.", &code, template_name);

    match TEMPLATES.get().unwrap().render(template_name, data) {
        Ok(response_body) => (
            code,
            Html(response_body)
        ).add_headers(addl_headers),
        Err(e) => {
            log::error!(
                "Error rendering template {:?} with data {:?}:\n{}",
                template_name, data, &e
            );
            html_500()
        },
    }
}

/// Render the template into a writer instead of straight into a
/// response; the dashboard controllers use this to accumulate row and
/// card fragments into a buffer.
pub fn write_template<S, W>(
    template_name: &str,
    data: &S,
    w: W,
) -> Result<(), String>
where
    S: Serialize + Debug,
    W: std::io::Write,
{
    TEMPLATES.get().unwrap().render_to_write(template_name, data, w)
        .map_err(|e| format!(
            "Error rendering template {:?} with data {:?}: {}",
            template_name, data, &e
        ))
}

/**
Render one row per item through `row_template`, or exactly one "no data"
row spanning `colspan` columns when `items` is empty. An empty table
body with no feedback is never okay.
*/
pub fn render_rows<S>(
    row_template: &str,
    items: &[S],
    colspan: u8,
    empty_message: &str,
) -> Result<String, String>
where
    S: Serialize + Debug
{
    let mut buff: Vec<u8> = Vec::new();

    if items.is_empty() {
        let data = json!({
            "colspan": colspan,
            "message": empty_message,
        });
        write_template("no_data_row", &data, &mut buff)?;
    } else {
        for item in items.iter() {
            write_template(row_template, item, &mut buff)?;
        }
    }

    Ok(unsafe { String::from_utf8_unchecked(buff) })
}

/// `render_rows()`, but for card lists; the empty case is a note rather
/// than a table row.
pub fn render_cards<S>(
    card_template: &str,
    items: &[S],
    empty_message: &str,
) -> Result<String, String>
where
    S: Serialize + Debug
{
    let mut buff: Vec<u8> = Vec::new();

    if items.is_empty() {
        let data = json!({ "message": empty_message });
        write_template("no_data_note", &data, &mut buff)?;
    } else {
        for item in items.iter() {
            write_template(card_template, item, &mut buff)?;
        }
    }

    Ok(unsafe { String::from_utf8_unchecked(buff) })
}

/// A single error row for a table body, the way a failed report load
/// lands in the table rather than in a banner.
pub fn render_error_row(colspan: u8, message: &str) -> Result<String, String> {
    let mut buff: Vec<u8> = Vec::new();
    let data = json!({
        "colspan": colspan,
        "message": message,
    });
    write_template("error_row", &data, &mut buff)?;

    Ok(unsafe { String::from_utf8_unchecked(buff) })
}

//
//
// Session cookie plumbing.
//
//

/// Dig the visitor's session key out of the Cookie header, if any.
pub fn session_key(headers: &HeaderMap) -> Option<String> {
    let raw = headers.get(header::COOKIE)?.to_str().ok()?;

    for pair in raw.split(';') {
        if let Some((name, value)) = pair.trim().split_once('=') {
            if name == SESSION_COOKIE {
                return Some(value.to_owned());
            }
        }
    }

    None
}

/// Set-Cookie value installing `key` as the visitor's session key.
pub fn session_cookie(key: &str) -> HeaderValue {
    // Keys come out of SessionStore::generate_key(), which only emits
    // ASCII alphanumerics, so this cannot fail.
    let s = format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax",
        SESSION_COOKIE, key
    );
    HeaderValue::from_str(&s).unwrap()
}

/// Set-Cookie value that removes the session cookie.
pub fn expired_cookie() -> HeaderValue {
    let s = format!(
        "{}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0",
        SESSION_COOKIE
    );
    HeaderValue::from_str(&s).unwrap()
}

pub fn redirect_to_login() -> Response {
    Redirect::to("/login-page").into_response()
}

/// The membership check at the core of the role guard.
fn authorize<'a>(session: Option<&'a Session>, allowed: &[Role]) -> Option<&'a Session> {
    match session {
        Some(s) if allowed.contains(&s.role) => Some(s),
        _ => None,
    }
}

/**
Role guard for the dashboard pages: resolves the visitor's session from
the cookie and checks the stored role against the set of permitted
roles. An absent session or a role outside the set bounces the visitor
to the login page; callers early-return the `Err` response.
*/
pub async fn guard(
    headers: &HeaderMap,
    allowed: &[Role],
    glob: &Arc<RwLock<Glob>>,
) -> Result<Session, Response> {
    log::trace!("guard( [ headers ], {:?}, [ global state ] ) called.", allowed);

    let session = match session_key(headers) {
        Some(key) => glob.read().await.sessions.get(&key),
        None => None,
    };

    match authorize(session.as_ref(), allowed) {
        Some(s) => Ok(s.clone()),
        None => Err(redirect_to_login()),
    }
}

//
//
// Sidebar navigation.
//
//

#[derive(Debug, Serialize)]
pub struct NavLink {
    pub target: &'static str,
    pub label: &'static str,
    pub active: bool,
}

/**
Build the sidebar for a dashboard: one link per section, with exactly
one marked active. The active section is the requested one when it names
a section the dashboard has; anything else falls back to the first.

The returned identifier is what the page controller dispatches on to
decide which section body to render.
*/
pub fn sidebar(
    sections: &'static [(&'static str, &'static str)],
    requested: Option<&str>,
) -> (Vec<NavLink>, &'static str) {
    let active = sections.iter()
        .map(|(target, _)| *target)
        .find(|target| Some(*target) == requested)
        .unwrap_or(sections[0].0);

    let links = sections.iter()
        .map(|&(target, label)| NavLink {
            target,
            label,
            active: target == active,
        })
        .collect();

    (links, active)
}

/// Options for a course `<select>`, with at most one preselected.
#[derive(Debug, Serialize)]
pub struct CourseOption {
    pub code: String,
    pub title: String,
    pub selected: bool,
}

pub fn course_options(courses: Vec<Course>, selected: Option<&str>) -> Vec<CourseOption> {
    courses.into_iter()
        .map(|c| CourseOption {
            selected: Some(c.code.as_str()) == selected,
            code: c.code,
            title: c.title,
        })
        .collect()
}

/// Default report range: first of the current month through today, as
/// wire-format date strings.
pub fn month_range_defaults() -> (String, String) {
    let today = crate::now();
    let first = today.replace_day(1).unwrap_or(today);

    (
        first.format(&crate::DATE_FMT).unwrap_or_default(),
        today.format(&crate::DATE_FMT).unwrap_or_default(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::ensure_logging;

    use crate::models::UserRecord;

    pub fn ensure_templates() {
        if TEMPLATES.get().is_none() {
            init("templates").unwrap();
        }
    }

    static ADMIN_ONLY: &[Role] = &[Role::Admin];
    static STAFF: &[Role] = &[Role::Faculty, Role::Admin];

    fn session_for(role: Role) -> Session {
        Session {
            token: "t".to_owned(),
            role,
            name: "N".to_owned(),
            user_id: 1,
        }
    }

    #[test]
    fn authorize_role_combinations() {
        ensure_logging();

        for role in [Role::Student, Role::Faculty, Role::Admin] {
            let s = session_for(role);
            assert_eq!(
                authorize(Some(&s), ADMIN_ONLY).is_some(),
                role == Role::Admin
            );
            assert_eq!(
                authorize(Some(&s), STAFF).is_some(),
                role != Role::Student
            );
        }

        // No session at all is denied everywhere.
        assert!(authorize(None, ADMIN_ONLY).is_none());
        assert!(authorize(None, STAFF).is_none());
        assert!(authorize(None, &[Role::Student, Role::Faculty, Role::Admin]).is_none());
    }

    #[test]
    fn cookie_round_trip() {
        let mut headers = HeaderMap::new();
        assert!(session_key(&headers).is_none());

        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("other=1; quad-key=abc123; theme=dark"),
        );
        assert_eq!(session_key(&headers).unwrap(), "abc123");
    }

    static SECTIONS: &[(&str, &str)] = &[
        ("overview", "Overview"),
        ("users", "Users"),
        ("courses", "Courses"),
    ];

    #[test]
    fn sidebar_activation() {
        let (links, active) = sidebar(SECTIONS, Some("courses"));
        assert_eq!(active, "courses");
        assert_eq!(links.iter().filter(|l| l.active).count(), 1);
        assert!(links[2].active);

        // Unknown and missing sections both fall back to the first.
        let (links, active) = sidebar(SECTIONS, Some("launch-codes"));
        assert_eq!(active, "overview");
        assert!(links[0].active);

        let (_, active) = sidebar(SECTIONS, None);
        assert_eq!(active, "overview");
    }

    #[test]
    fn empty_tables_get_one_no_data_row() {
        ensure_logging();
        ensure_templates();

        let rows = render_rows::<UserRecord>("user_row", &[], 5, "No users found.").unwrap();
        assert!(rows.contains("No users found."));
        assert_eq!(rows.matches("<tr").count(), 1);
        assert!(rows.contains("colspan=\"5\""));
    }

    #[test]
    fn populated_tables_get_one_row_per_item() {
        ensure_logging();
        ensure_templates();

        let users = vec![
            UserRecord {
                id: 1,
                name: "Ada".to_owned(),
                email: "ada@example.edu".to_owned(),
                role: "FACULTY".to_owned(),
                enabled: true,
                created_at: None,
            },
            UserRecord {
                id: 2,
                name: "Grace".to_owned(),
                email: "grace@example.edu".to_owned(),
                role: "STUDENT".to_owned(),
                enabled: false,
                created_at: None,
            },
        ];

        let rows = render_rows("user_row", &users, 5, "No users found.").unwrap();
        assert_eq!(rows.matches("<tr").count(), 2);
        assert!(rows.contains("ada@example.edu"));
        assert!(rows.contains("Disabled"));
        assert!(!rows.contains("No users found."));
    }

    #[test]
    fn template_escaping() {
        ensure_logging();
        ensure_templates();

        let users = vec![
            UserRecord {
                id: 3,
                name: "<script>alert(1)</script>".to_owned(),
                email: "x@example.edu".to_owned(),
                role: "STUDENT".to_owned(),
                enabled: true,
                created_at: None,
            },
        ];

        let rows = render_rows("user_row", &users, 5, "No users found.").unwrap();
        assert!(!rows.contains("<script>"));
        assert!(rows.contains("&lt;script&gt;"));
    }
}
