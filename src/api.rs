/*!
The authenticated-request layer.

Every data operation in the portal is one round trip against the
upstream REST API. All of them funnel through `ApiClient::dispatch()`,
which attaches the bearer token when one is present, tries to read the
response body as JSON (an unreadable body is treated as no body at all),
and turns any unsuccessful outcome into a single `ApiError` carrying the
message the visitor should see: the body's `message` field when it has
one, a caller-supplied fallback otherwise.

The API wraps every payload in the common envelope
`{success, message, data}`; the typed wrappers below pull `data` out and
deserialize it into the view-model shapes in `models`.
*/
use reqwest::{header, RequestBuilder, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};

use crate::models::*;

#[derive(Debug, PartialEq)]
pub struct ApiError(String);

impl ApiError {
    /// Prepend some contextual `annotation` for the error.
    fn annotate(self, annotation: &str) -> Self {
        let s = format!("{}: {}", annotation, &self.0);
        Self(s)
    }

    pub fn display(&self) -> &str { &self.0 }
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> ApiError {
        ApiError(format!("API request: {}", &e))
    }
}

impl From<String> for ApiError {
    fn from(s: String) -> ApiError { ApiError(s) }
}

/// The `Authorization` header value for `token`, if there is a token.
fn auth_header(token: Option<&str>) -> Option<String> {
    token.map(|t| format!("Bearer {}", t))
}

/// The message to surface for a failed call: the body's `message` field
/// when present and non-blank, else the fallback.
fn error_message(body: Option<&Value>, fallback: &str) -> String {
    if let Some(msg) = body.and_then(|b| b.get("message")).and_then(Value::as_str) {
        if !msg.trim().is_empty() {
            return msg.to_owned();
        }
    }
    fallback.to_owned()
}

/// Turn a response's status and (maybe) body into the envelope's `data`,
/// or into the error the visitor should see.
fn digest(status: StatusCode, body: Option<Value>, fallback: &str) -> Result<Value, ApiError> {
    if !status.is_success() {
        return Err(ApiError(error_message(body.as_ref(), fallback)));
    }

    let body = match body {
        Some(body) => body,
        None => { return Err(ApiError(fallback.to_owned())); },
    };

    match body.get("success").and_then(Value::as_bool) {
        Some(true) => Ok(body.get("data").cloned().unwrap_or(Value::Null)),
        _ => Err(ApiError(error_message(Some(&body), fallback))),
    }
}

fn from_data<T: DeserializeOwned>(data: Value, what: &str) -> Result<T, ApiError> {
    serde_json::from_value(data).map_err(|e| ApiError(format!(
        "Unexpected shape for {}: {}", what, &e
    )))
}

/// Like `from_data`, but a null `data` is just an empty list.
fn list_from_data<T: DeserializeOwned>(data: Value, what: &str) -> Result<Vec<T>, ApiError> {
    if data.is_null() {
        return Ok(Vec::new());
    }
    from_data(data, what)
}

#[derive(Clone, Debug)]
pub struct ApiClient {
    base: Url,
    client: reqwest::Client,
}

impl ApiClient {
    pub fn new(base: &str) -> Result<Self, String> {
        log::trace!("ApiClient::new( {:?} ) called.", base);

        let base = Url::parse(base)
            .map_err(|e| format!("Error parsing API base URL {:?}: {}", base, &e))?;
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| format!("Error building HTTP client: {}", &e))?;

        Ok(Self { base, client })
    }

    fn url(&self, path: &str) -> Result<Url, ApiError> {
        self.base.join(path).map_err(|e| ApiError(format!(
            "Invalid API path {:?}: {}", path, &e
        )))
    }

    /// The single chokepoint every call goes through; see the module
    /// docs for the contract.
    async fn dispatch(
        &self,
        req: RequestBuilder,
        token: Option<&str>,
        fallback: &str,
    ) -> Result<Value, ApiError> {
        let req = match auth_header(token) {
            Some(value) => req.header(header::AUTHORIZATION, value),
            None => req,
        };

        let resp = req.send().await
            .map_err(|e| ApiError::from(e).annotate("Unable to reach the portal API"))?;
        let status = resp.status();
        let body: Option<Value> = resp.json().await.ok();

        digest(status, body, fallback)
    }

    //
    //
    // Auth endpoints.
    //
    //

    pub async fn login(&self, email: &str, password: &str) -> Result<LoginPayload, ApiError> {
        log::trace!("ApiClient::login( {:?} ) called.", email);

        let body = json!({ "email": email, "password": password });
        let data = self.dispatch(
            self.client.post(self.url("/api/auth/login")?).json(&body),
            None,
            "Invalid credentials",
        ).await?;

        from_data(data, "login payload")
    }

    pub async fn register(
        &self,
        name: &str,
        email: &str,
        password: &str,
        role: &str,
    ) -> Result<UserRecord, ApiError> {
        log::trace!("ApiClient::register( {:?}, {:?} ) called.", email, role);

        let body = json!({
            "name": name,
            "email": email,
            "password": password,
            "role": role,
        });
        let data = self.dispatch(
            self.client.post(self.url("/api/auth/register")?).json(&body),
            None,
            "Registration failed",
        ).await?;

        from_data(data, "registered user")
    }

    pub async fn me(&self, token: &str) -> Result<UserRecord, ApiError> {
        log::trace!("ApiClient::me() called.");

        let data = self.dispatch(
            self.client.get(self.url("/api/auth/me")?),
            Some(token),
            "Request failed",
        ).await?;

        from_data(data, "current user")
    }

    //
    //
    // Admin endpoints.
    //
    //

    pub async fn admin_stats(&self, token: &str) -> Result<AdminStats, ApiError> {
        let data = self.dispatch(
            self.client.get(self.url("/api/admin/stats")?),
            Some(token),
            "Request failed",
        ).await?;

        from_data(data, "admin stats")
    }

    pub async fn admin_users(&self, token: &str) -> Result<Vec<UserRecord>, ApiError> {
        let data = self.dispatch(
            self.client.get(self.url("/api/admin/users")?),
            Some(token),
            "Request failed",
        ).await?;

        list_from_data(data, "user list")
    }

    pub async fn add_user(&self, token: &str, user: &NewUser) -> Result<UserRecord, ApiError> {
        log::trace!("ApiClient::add_user( {:?}, {:?} ) called.", &user.email, &user.role);

        let data = self.dispatch(
            self.client.post(self.url("/api/admin/users")?).json(user),
            Some(token),
            "Request failed",
        ).await?;

        from_data(data, "new user")
    }

    pub async fn delete_user(&self, token: &str, id: i64) -> Result<(), ApiError> {
        log::trace!("ApiClient::delete_user( {} ) called.", id);

        let path = format!("/api/admin/users/{}", id);
        let _ = self.dispatch(
            self.client.delete(self.url(&path)?),
            Some(token),
            "Request failed",
        ).await?;

        Ok(())
    }

    pub async fn admin_courses(&self, token: &str) -> Result<Vec<Course>, ApiError> {
        let data = self.dispatch(
            self.client.get(self.url("/api/admin/courses")?),
            Some(token),
            "Request failed",
        ).await?;

        list_from_data(data, "course list")
    }

    pub async fn add_course(&self, token: &str, course: &NewCourse) -> Result<Course, ApiError> {
        log::trace!("ApiClient::add_course( {:?} ) called.", &course.code);

        let data = self.dispatch(
            self.client.post(self.url("/api/admin/courses")?).json(course),
            Some(token),
            "Request failed",
        ).await?;

        from_data(data, "new course")
    }

    pub async fn delete_course(&self, token: &str, id: i64) -> Result<(), ApiError> {
        log::trace!("ApiClient::delete_course( {} ) called.", id);

        let path = format!("/api/admin/courses/{}", id);
        let _ = self.dispatch(
            self.client.delete(self.url(&path)?),
            Some(token),
            "Request failed",
        ).await?;

        Ok(())
    }

    //
    //
    // Dashboard + public endpoints.
    //
    //

    pub async fn faculty_dashboard(&self, token: &str) -> Result<FacultyDashboard, ApiError> {
        let data = self.dispatch(
            self.client.get(self.url("/api/faculty/dashboard")?),
            Some(token),
            "Request failed",
        ).await?;

        from_data(data, "faculty dashboard")
    }

    pub async fn student_dashboard(&self, token: &str) -> Result<StudentDashboard, ApiError> {
        let data = self.dispatch(
            self.client.get(self.url("/api/student/dashboard")?),
            Some(token),
            "Request failed",
        ).await?;

        from_data(data, "student dashboard")
    }

    /// The one unauthenticated data call: the course list that feeds
    /// the public pages and the course selectors.
    pub async fn public_courses(&self) -> Result<Vec<Course>, ApiError> {
        let data = self.dispatch(
            self.client.get(self.url("/api/public/courses")?),
            None,
            "Request failed",
        ).await?;

        list_from_data(data, "public course list")
    }

    //
    //
    // Attendance endpoints.
    //
    //

    pub async fn class_roster(&self, token: &str, class_name: &str) -> Result<Vec<UserRecord>, ApiError> {
        log::trace!("ApiClient::class_roster( {:?} ) called.", class_name);

        let data = self.dispatch(
            self.client.get(self.url("/api/attendance/faculty/students")?)
                .query(&[("className", class_name)]),
            Some(token),
            "Request failed",
        ).await?;

        list_from_data(data, "class roster")
    }

    pub async fn attendance_on(
        &self,
        token: &str,
        class_name: &str,
        date: &str,
    ) -> Result<Vec<AttendanceRecord>, ApiError> {
        log::trace!("ApiClient::attendance_on( {:?}, {:?} ) called.", class_name, date);

        let data = self.dispatch(
            self.client.get(self.url("/api/attendance/filter")?)
                .query(&[("className", class_name), ("date", date)]),
            Some(token),
            "Request failed",
        ).await?;

        list_from_data(data, "attendance records")
    }

    pub async fn mark_batch(&self, token: &str, batch: &MarkBatch) -> Result<Vec<AttendanceRecord>, ApiError> {
        log::trace!(
            "ApiClient::mark_batch( {:?}, {:?}, [ {} records ] ) called.",
            &batch.class_name, &batch.date, batch.records.len()
        );

        let data = self.dispatch(
            self.client.post(self.url("/api/attendance/mark-batch")?).json(batch),
            Some(token),
            "Request failed",
        ).await?;

        list_from_data(data, "marked attendance")
    }

    pub async fn attendance_report(
        &self,
        token: &str,
        class_name: Option<&str>,
        start_date: &str,
        end_date: &str,
    ) -> Result<Vec<ReportRow>, ApiError> {
        log::trace!(
            "ApiClient::attendance_report( {:?}, {:?}, {:?} ) called.",
            class_name, start_date, end_date
        );

        let mut params: Vec<(&str, &str)> = Vec::with_capacity(3);
        if let Some(class_name) = class_name {
            params.push(("className", class_name));
        }
        params.push(("startDate", start_date));
        params.push(("endDate", end_date));

        let data = self.dispatch(
            self.client.get(self.url("/api/attendance/report")?).query(&params),
            Some(token),
            "Request failed",
        ).await?;

        list_from_data(data, "attendance report")
    }

    pub async fn student_attendance(&self, token: &str, student_id: i64) -> Result<Vec<AttendanceRecord>, ApiError> {
        let path = format!("/api/attendance/student/{}", student_id);
        let data = self.dispatch(
            self.client.get(self.url(&path)?),
            Some(token),
            "Request failed",
        ).await?;

        list_from_data(data, "student attendance")
    }

    //
    //
    // Assignment endpoints.
    //
    //

    pub async fn student_assignments(&self, token: &str, student_id: i64) -> Result<Vec<Assignment>, ApiError> {
        let path = format!("/api/assignments/student/{}", student_id);
        let data = self.dispatch(
            self.client.get(self.url(&path)?),
            Some(token),
            "Request failed",
        ).await?;

        list_from_data(data, "student assignments")
    }

    pub async fn course_assignments(&self, token: &str, course: &str) -> Result<Vec<Assignment>, ApiError> {
        let path = format!("/api/assignments/course/{}", urlencoding::encode(course));
        let data = self.dispatch(
            self.client.get(self.url(&path)?),
            Some(token),
            "Request failed",
        ).await?;

        list_from_data(data, "course assignments")
    }

    pub async fn save_grade(
        &self,
        token: &str,
        id: i64,
        update: &GradeUpdate,
    ) -> Result<Assignment, ApiError> {
        log::trace!("ApiClient::save_grade( {}, {:?} ) called.", id, &update.grade);

        let path = format!("/api/assignments/{}/grade", id);
        let data = self.dispatch(
            self.client.put(self.url(&path)?).json(update),
            Some(token),
            "Request failed",
        ).await?;

        from_data(data, "graded assignment")
    }

    pub async fn submit_assignment(
        &self,
        token: &str,
        student_id: i64,
        course: &str,
        title: &str,
        file_name: &str,
        file_bytes: Vec<u8>,
    ) -> Result<Assignment, ApiError> {
        log::trace!(
            "ApiClient::submit_assignment( {}, {:?}, {:?}, {:?}, [ {} bytes ] ) called.",
            student_id, course, title, file_name, file_bytes.len()
        );

        let part = reqwest::multipart::Part::bytes(file_bytes)
            .file_name(file_name.to_owned());
        let form = reqwest::multipart::Form::new()
            .text("studentId", student_id.to_string())
            .text("course", course.to_owned())
            .text("assignmentTitle", title.to_owned())
            .part("file", part);

        let data = self.dispatch(
            self.client.post(self.url("/api/assignments/submit")?).multipart(form),
            Some(token),
            "Request failed",
        ).await?;

        from_data(data, "submitted assignment")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::ensure_logging;

    #[test]
    fn bearer_header_iff_token() {
        assert_eq!(auth_header(Some("tok")), Some("Bearer tok".to_owned()));
        assert_eq!(auth_header(None), None);
    }

    #[test]
    fn error_messages() {
        let with_message = json!({ "success": false, "message": "No such course." });
        let blank_message = json!({ "success": false, "message": "   " });
        let no_message = json!({ "success": false });

        assert_eq!(error_message(Some(&with_message), "Request failed"), "No such course.");
        assert_eq!(error_message(Some(&blank_message), "Request failed"), "Request failed");
        assert_eq!(error_message(Some(&no_message), "Request failed"), "Request failed");
        assert_eq!(error_message(None, "Request failed"), "Request failed");
    }

    #[test]
    fn digest_failure_paths() {
        ensure_logging();

        // Non-2xx with a body message surfaces the message.
        let body = json!({ "success": false, "message": "Invalid credentials" });
        let res = digest(StatusCode::UNAUTHORIZED, Some(body), "fallback");
        assert_eq!(res.unwrap_err(), ApiError("Invalid credentials".to_owned()));

        // Non-2xx with an unreadable body surfaces the fallback.
        let res = digest(StatusCode::INTERNAL_SERVER_ERROR, None, "fallback");
        assert_eq!(res.unwrap_err(), ApiError("fallback".to_owned()));

        // A 2xx envelope with success: false still fails.
        let body = json!({ "success": false, "message": "Nope." });
        let res = digest(StatusCode::OK, Some(body), "fallback");
        assert_eq!(res.unwrap_err(), ApiError("Nope.".to_owned()));
    }

    #[test]
    fn digest_success_paths() {
        let body = json!({ "success": true, "message": "ok", "data": [1, 2, 3] });
        let data = digest(StatusCode::OK, Some(body), "fallback").unwrap();
        assert_eq!(data, json!([1, 2, 3]));

        // A success envelope with no data yields null...
        let body = json!({ "success": true, "message": "ok" });
        let data = digest(StatusCode::OK, Some(body), "fallback").unwrap();
        assert!(data.is_null());

        // ...which the list helper reads as an empty list.
        let empty: Vec<Course> = list_from_data(Value::Null, "course list").unwrap();
        assert!(empty.is_empty());
    }
}
