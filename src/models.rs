/*!
Transient view-model shapes mirrored 1:1 from the API's JSON payloads.

These only ever live in local variables for the duration of a page view;
nothing here is persisted. Everything is camelCase on the wire.
*/
use serde::{Deserialize, Serialize};

use crate::user::Role;

/// What a successful login hands back. (The payload also carries a
/// `type: "Bearer"` field, which nothing here needs.)
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginPayload {
    pub token: String,
    pub user_id: i64,
    #[serde(default)]
    pub email: String,
    pub name: String,
    pub role: Role,
    #[serde(default)]
    pub redirect_url: Option<String>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub role: String,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub created_at: Option<String>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    pub id: i64,
    pub code: String,
    pub title: String,
    #[serde(default)]
    pub department: String,
    #[serde(default)]
    pub faculty_name: String,
    #[serde(default)]
    pub active: bool,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRecord {
    #[serde(default)]
    pub id: Option<i64>,
    pub student_id: i64,
    #[serde(default)]
    pub student_name: Option<String>,
    pub class_name: String,
    pub date: String,
    pub status: String,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportRow {
    #[serde(default)]
    pub student_id: Option<i64>,
    pub student_name: String,
    pub class_name: String,
    pub total_classes: i64,
    pub present_classes: i64,
    pub attendance_percentage: f64,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Assignment {
    pub id: i64,
    #[serde(default)]
    pub student_id: Option<i64>,
    #[serde(default)]
    pub student_name: Option<String>,
    pub course: String,
    #[serde(default)]
    pub assignment_title: Option<String>,
    #[serde(default)]
    pub original_file_name: Option<String>,
    #[serde(default)]
    pub file_path: Option<String>,
    #[serde(default)]
    pub feedback: Option<String>,
    #[serde(default)]
    pub grade: Option<String>,
    #[serde(default)]
    pub submission_date: Option<String>,
    #[serde(default)]
    pub content_score: Option<i64>,
    #[serde(default)]
    pub grammar_score: Option<i64>,
    #[serde(default)]
    pub structure_score: Option<i64>,
    #[serde(default)]
    pub originality_score: Option<i64>,
    #[serde(default)]
    pub total_score: Option<i64>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminStats {
    pub total_users: i64,
    pub total_students: i64,
    pub total_faculty: i64,
    pub total_admins: i64,
    pub total_courses: i64,
    pub total_assignments: i64,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FacultyDashboard {
    pub total_courses: i64,
    pub total_students: i64,
    pub pending_evaluations: i64,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentDashboard {
    pub attendance_percentage: f64,
    pub submitted_assignments: i64,
    pub average_grade: String,
}

//
//
// Request bodies this side sends upstream.
//
//

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCourse {
    pub code: String,
    pub title: String,
    pub department: String,
    pub faculty_name: String,
    pub active: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkRecord {
    pub student_id: i64,
    pub status: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkBatch {
    pub class_name: String,
    pub date: String,
    pub records: Vec<MarkRecord>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeUpdate {
    pub grade: String,
    pub feedback: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_payload_shape() {
        let text = r#"{
            "token": "abc.def.ghi",
            "type": "Bearer",
            "userId": 7,
            "email": "a@example.edu",
            "name": "A",
            "role": "ADMIN",
            "redirectUrl": "/admin-dashboard"
        }"#;

        let p: LoginPayload = serde_json::from_str(text).unwrap();
        assert_eq!(p.token, "abc.def.ghi");
        assert_eq!(p.user_id, 7);
        assert_eq!(p.role, Role::Admin);
        assert_eq!(p.redirect_url.as_deref(), Some("/admin-dashboard"));
    }

    #[test]
    fn assignment_with_nulls() {
        // A fresh submission has no grade, feedback, or scores yet.
        let text = r#"{
            "id": 4,
            "studentId": 9,
            "studentName": "S",
            "course": "CS101",
            "assignmentTitle": null,
            "originalFileName": "essay.pdf",
            "feedback": null,
            "grade": null,
            "submissionDate": "2026-03-01T09:30:00"
        }"#;

        let a: Assignment = serde_json::from_str(text).unwrap();
        assert_eq!(a.course, "CS101");
        assert!(a.grade.is_none());
        assert!(a.assignment_title.is_none());
        assert!(a.content_score.is_none());
    }

    #[test]
    fn mark_batch_wire_shape() {
        let batch = MarkBatch {
            class_name: "CS101".to_owned(),
            date: "2026-03-01".to_owned(),
            records: vec![
                MarkRecord { student_id: 1, status: "PRESENT".to_owned() },
                MarkRecord { student_id: 2, status: "ABSENT".to_owned() },
            ],
        };

        let v = serde_json::to_value(&batch).unwrap();
        assert_eq!(v["className"], "CS101");
        assert_eq!(v["records"][1]["studentId"], 2);
        assert_eq!(v["records"][1]["status"], "ABSENT");
    }
}
