/*!
Controllers for the public pages: home, login, registration, logout.
*/
use std::sync::Arc;

use axum::{
    extract::Extension,
    http::header::HeaderMap,
    response::{IntoResponse, Redirect, Response},
    Form,
};
use serde_json::json;
use tokio::sync::RwLock;

use crate::{
    config::Glob,
    models::LoginPayload,
    session::Session,
    user::Role,
};
use super::*;

/// Data type to read the form data from a login request.
#[derive(serde::Deserialize, Debug)]
pub struct LoginData {
    pub email: String,
    pub password: String,
}

/// Data type to read the form data from a registration request.
#[derive(serde::Deserialize, Debug)]
pub struct RegisterData {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: String,
}

pub async fn home(
    Extension(glob): Extension<Arc<RwLock<Glob>>>
) -> Response {
    log::trace!("home( [ global state ] ) called.");

    // The home page features the first few public courses; if the API
    // is down the page still serves, just without them.
    let courses = match glob.read().await.api.public_courses().await {
        Ok(mut courses) => {
            courses.truncate(3);
            courses
        },
        Err(e) => {
            log::error!("Error fetching public courses for home page: {}", e.display());
            Vec::new()
        },
    };

    let data = json!({
        "has_courses": !courses.is_empty(),
        "courses": courses,
    });

    serve_template(StatusCode::OK, "home", &data, vec![])
}

pub async fn login_page(
    headers: HeaderMap,
    Extension(glob): Extension<Arc<RwLock<Glob>>>
) -> Response {
    log::trace!("login_page() called.");

    // A visitor with a live session skips the form entirely.
    if let Ok(sess) = guard(
        &headers,
        &[Role::Student, Role::Faculty, Role::Admin],
        &glob
    ).await {
        return Redirect::to(sess.role.dashboard_path()).into_response();
    }

    serve_template(StatusCode::OK, "login", &json!({}), vec![])
}

fn respond_bad_login(msg: &str) -> Response {
    log::trace!("respond_bad_login( {:?} ) called.", msg);

    let data = json!({
        "error_message": msg,
    });

    serve_template(
        StatusCode::UNAUTHORIZED,
        "login",
        &data,
        vec![]
    )
}

/// Where a fresh login payload says the visitor should land: the
/// payload's own redirect when it names one, else the role's dashboard.
fn landing_path(payload: &LoginPayload) -> String {
    match &payload.redirect_url {
        Some(url) if !url.is_empty() => url.clone(),
        _ => payload.role.dashboard_path().to_owned(),
    }
}

pub async fn login(
    Extension(glob): Extension<Arc<RwLock<Glob>>>,
    Form(form): Form<LoginData>
) -> Response {
    log::trace!("login( {:?}, [ global state ] ) called.", &form.email);

    let email = form.email.trim().to_lowercase();
    if email.is_empty() || form.password.is_empty() {
        return respond_bad_login("Email and password are required.");
    }

    let payload = {
        let api_response = glob.read().await.api.login(&email, &form.password).await;
        match api_response {
            Ok(payload) => payload,
            Err(e) => { return respond_bad_login(e.display()); },
        }
    };

    let session = Session {
        token: payload.token.clone(),
        role: payload.role,
        name: payload.name.clone(),
        user_id: payload.user_id,
    };
    let dest = landing_path(&payload);

    let key = {
        let mut glob = glob.write().await;
        let key = glob.sessions.generate_key();
        if let Err(e) = glob.sessions.set_session(&key, session) {
            log::error!(
                "Error persisting session for {:?}: {}",
                &email, e.display()
            );
            return html_500();
        }
        key
    };

    Redirect::to(&dest)
        .add_headers(vec![(header::SET_COOKIE, session_cookie(&key))])
}

pub async fn register_page() -> Response {
    log::trace!("register_page() called.");

    serve_template(StatusCode::OK, "register", &json!({}), vec![])
}

fn respond_register_error(form: &RegisterData, msg: &str) -> Response {
    log::trace!("respond_register_error( {:?} ) called.", msg);

    // Hand the entered values back so the visitor doesn't retype them.
    let data = json!({
        "error_message": msg,
        "name": form.name.trim(),
        "email": form.email.trim(),
        "role": &form.role,
    });

    serve_template(StatusCode::BAD_REQUEST, "register", &data, vec![])
}

/// Self-service registration only hands out the two self-service roles;
/// admins get created from the admin dashboard.
fn parse_register_role(s: &str) -> Result<Role, String> {
    let role: Role = s.parse()?;
    match role {
        Role::Admin => Err("Admin accounts cannot be self-registered.".to_owned()),
        role => Ok(role),
    }
}

pub async fn register(
    Extension(glob): Extension<Arc<RwLock<Glob>>>,
    Form(form): Form<RegisterData>
) -> Response {
    log::trace!(
        "register( {:?}, {:?}, [ global state ] ) called.",
        &form.email, &form.role
    );

    let name = form.name.trim();
    let email = form.email.trim();
    if name.is_empty() || email.is_empty() || form.password.is_empty() {
        return respond_register_error(&form, "Name, email, and password are all required.");
    }

    let role = match parse_register_role(&form.role) {
        Ok(role) => role,
        Err(e) => { return respond_register_error(&form, &e); },
    };

    let api_response = {
        glob.read().await.api.register(
            name,
            email,
            &form.password,
            &role.to_string()
        ).await
    };

    match api_response {
        Ok(u) => {
            log::trace!("Registered new {:?} user {:?}.", &u.role, &u.email);
            let data = json!({
                "success_message": "Registration complete. Please sign in.",
            });
            serve_template(StatusCode::OK, "login", &data, vec![])
        },
        Err(e) => respond_register_error(&form, e.display()),
    }
}

pub async fn logout(
    headers: HeaderMap,
    Extension(glob): Extension<Arc<RwLock<Glob>>>
) -> Response {
    log::trace!("logout() called.");

    if let Some(key) = session_key(&headers) {
        if let Err(e) = glob.write().await.sessions.clear(&key) {
            // The visitor still gets logged out; the stale record just
            // lingers in the file until it gets overwritten.
            log::error!("Error clearing session {:?}: {}", &key, e.display());
        }
    }

    Redirect::to("/login-page")
        .add_headers(vec![(header::SET_COOKIE, expired_cookie())])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::ensure_logging;

    fn payload(role: Role, redirect: Option<&str>) -> LoginPayload {
        LoginPayload {
            token: "t".to_owned(),
            user_id: 1,
            email: "x@example.edu".to_owned(),
            name: "X".to_owned(),
            role,
            redirect_url: redirect.map(|s| s.to_owned()),
        }
    }

    #[test]
    fn landing_paths() {
        ensure_logging();

        // The payload's own redirect wins when present...
        let p = payload(Role::Student, Some("/student-dashboard"));
        assert_eq!(landing_path(&p), "/student-dashboard");

        // ...and the role decides otherwise.
        for (role, path) in [
            (Role::Student, "/student-dashboard"),
            (Role::Faculty, "/faculty-dashboard"),
            (Role::Admin, "/admin-dashboard"),
        ] {
            assert_eq!(landing_path(&payload(role, None)), path);
            assert_eq!(landing_path(&payload(role, Some(""))), path);
        }
    }

    #[test]
    fn register_roles() {
        assert_eq!(parse_register_role("STUDENT").unwrap(), Role::Student);
        assert_eq!(parse_register_role("FACULTY").unwrap(), Role::Faculty);
        assert!(parse_register_role("ADMIN").is_err());
        assert!(parse_register_role("WIZARD").is_err());
    }
}
