/*!
Portal roles and where each one lands after login.
*/
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    Student,
    Faculty,
    Admin,
}

impl Role {
    /// Path of the dashboard a freshly logged-in user of this role
    /// should be sent to.
    pub fn dashboard_path(&self) -> &'static str {
        match self {
            Role::Student => "/student-dashboard",
            Role::Faculty => "/faculty-dashboard",
            Role::Admin   => "/admin-dashboard",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let token = match self {
            Role::Student => "STUDENT",
            Role::Faculty => "FACULTY",
            Role::Admin   => "ADMIN",
        };

        write!(f, "{}", token)
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "STUDENT" => Ok(Role::Student),
            "FACULTY" => Ok(Role::Faculty),
            "ADMIN"   => Ok(Role::Admin),
            _ => Err(format!("{:?} is not a valid Role.", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    static ROLES: &[(Role, &str, &str)] = &[
        (Role::Student, "STUDENT", "/student-dashboard"),
        (Role::Faculty, "FACULTY", "/faculty-dashboard"),
        (Role::Admin,   "ADMIN",   "/admin-dashboard"),
    ];

    #[test]
    fn role_round_trip() {
        for (role, token, _) in ROLES.iter() {
            assert_eq!(&format!("{}", role), token);
            assert_eq!(token.parse::<Role>().unwrap(), *role);
        }

        assert!("TEACHER".parse::<Role>().is_err());
        assert!("admin".parse::<Role>().is_err());
    }

    #[test]
    fn role_wire_spelling() {
        for (role, token, _) in ROLES.iter() {
            let json = serde_json::to_string(role).unwrap();
            assert_eq!(json, format!("{:?}", token));
            let back: Role = serde_json::from_str(&json).unwrap();
            assert_eq!(back, *role);
        }
    }

    #[test]
    fn dashboard_paths() {
        for (role, _, path) in ROLES.iter() {
            assert_eq!(role.dashboard_path(), *path);
        }
    }
}
