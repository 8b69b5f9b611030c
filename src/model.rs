use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeSet;

/// The three disjoint profile partitions. A uid owns a record in at most one
/// of them; `reconcile` preserves that invariant and `PRECEDENCE` resolves it
/// if a prior race ever left it violated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Teacher,
    Student,
}

/// Lookup/tie-break order: admin > teacher > student.
pub const PRECEDENCE: [Role; 3] = [Role::Admin, Role::Teacher, Role::Student];

impl Role {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "admin" => Some(Self::Admin),
            "teacher" => Some(Self::Teacher),
            "student" => Some(Self::Student),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Teacher => "teacher",
            Self::Student => "student",
        }
    }

    pub fn table(self) -> &'static str {
        match self {
            Self::Admin => "admins",
            Self::Teacher => "teachers",
            Self::Student => "students",
        }
    }
}

/// Authenticated identity handed over by the shell after a successful
/// sign-in. The daemon never authenticates; it only reconciles.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Principal {
    pub uid: String,
    pub email: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    #[serde(rename = "photoURL")]
    pub photo_url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdminRole {
    Admin,
    SuperAdmin,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminProfile {
    pub id: String,
    pub full_name: String,
    pub email: String,
    #[serde(rename = "photoURL")]
    pub photo_url: Option<String>,
    pub is_active: bool,
    pub role: AdminRole,
    pub permissions: BTreeSet<String>,
    pub created_at: String,
    pub updated_at: String,
    pub last_login: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeacherProfile {
    pub id: String,
    pub full_name: String,
    pub email: String,
    #[serde(rename = "photoURL")]
    pub photo_url: Option<String>,
    pub is_active: bool,
    pub subject_specialization: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    pub last_login: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentProfile {
    pub id: String,
    pub full_name: String,
    pub email: String,
    #[serde(rename = "photoURL")]
    pub photo_url: Option<String>,
    pub is_active: bool,
    pub enrolled_courses: Vec<String>,
    pub linked_teachers: Vec<String>,
    pub created_at: String,
    pub updated_at: String,
    pub last_login: Option<String>,
}

/// One profile record, tagged by the partition it lives in.
#[derive(Debug, Clone, PartialEq)]
pub enum RoleProfile {
    Admin(AdminProfile),
    Teacher(TeacherProfile),
    Student(StudentProfile),
}

impl RoleProfile {
    pub fn role(&self) -> Role {
        match self {
            Self::Admin(_) => Role::Admin,
            Self::Teacher(_) => Role::Teacher,
            Self::Student(_) => Role::Student,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Self::Admin(p) => &p.id,
            Self::Teacher(p) => &p.id,
            Self::Student(p) => &p.id,
        }
    }

    pub fn set_last_login(&mut self, now: &str) {
        match self {
            Self::Admin(p) => {
                p.last_login = Some(now.to_string());
                p.updated_at = now.to_string();
            }
            Self::Teacher(p) => {
                p.last_login = Some(now.to_string());
                p.updated_at = now.to_string();
            }
            Self::Student(p) => {
                p.last_login = Some(now.to_string());
                p.updated_at = now.to_string();
            }
        }
    }

    /// JSON shape sent to the shell: `{ "role": ..., "profile": ... }`.
    /// The partition tag stays outside the profile object so the admin
    /// variant's own `role` field (admin vs super_admin) is not shadowed.
    pub fn to_json(&self) -> serde_json::Value {
        let profile = match self {
            Self::Admin(p) => json!(p),
            Self::Teacher(p) => json!(p),
            Self::Student(p) => json!(p),
        };
        json!({ "role": self.role(), "profile": profile })
    }
}

/// Partial update applied by `users.update`. Every field is optional; which
/// fields are legal depends on the target partition.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ProfilePatch {
    pub full_name: Option<String>,
    pub email: Option<String>,
    #[serde(rename = "photoURL")]
    pub photo_url: Option<String>,
    pub role: Option<AdminRole>,
    pub permissions: Option<BTreeSet<String>>,
    pub subject_specialization: Option<String>,
    pub enrolled_courses: Option<Vec<String>>,
    pub linked_teachers: Option<Vec<String>>,
}

impl ProfilePatch {
    pub fn is_empty(&self) -> bool {
        self.full_name.is_none()
            && self.email.is_none()
            && self.photo_url.is_none()
            && self.role.is_none()
            && self.permissions.is_none()
            && self.subject_specialization.is_none()
            && self.enrolled_courses.is_none()
            && self.linked_teachers.is_none()
    }

    /// Names of populated fields that do not exist in the target partition.
    pub fn fields_invalid_for(&self, role: Role) -> Vec<&'static str> {
        let mut bad = Vec::new();
        if role != Role::Admin {
            if self.role.is_some() {
                bad.push("role");
            }
            if self.permissions.is_some() {
                bad.push("permissions");
            }
        }
        if role != Role::Teacher && self.subject_specialization.is_some() {
            bad.push("subjectSpecialization");
        }
        if role != Role::Student {
            if self.enrolled_courses.is_some() {
                bad.push("enrolledCourses");
            }
            if self.linked_teachers.is_some() {
                bad.push("linkedTeachers");
            }
        }
        bad
    }
}

/// Display name for a profile whose identity record carries none.
pub const NEW_USER_PLACEHOLDER: &str = "New User";

/// Capability set granted to the bootstrap admin on first sign-in.
pub fn default_admin_permissions() -> BTreeSet<String> {
    ["read", "write", "delete", "manage_users"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}
