use anyhow::Context;
use rusqlite::{Connection, OptionalExtension, Row};
use std::collections::BTreeSet;

use crate::model::{
    AdminProfile, AdminRole, ProfilePatch, Role, RoleProfile, StudentProfile, TeacherProfile,
};

/// Partition-level access to profile records. The reconciler is written
/// against this trait so a single failing partition can be simulated in
/// tests; production code uses [`SqliteProfileStore`].
pub trait ProfileStore {
    fn fetch(&self, role: Role, uid: &str) -> anyhow::Result<Option<RoleProfile>>;
    /// Keyed by uid; re-creating an existing record overwrites it.
    fn create(&self, profile: &RoleProfile) -> anyhow::Result<()>;
    fn touch_login(&self, role: Role, uid: &str, now: &str) -> anyhow::Result<()>;
    fn set_active(&self, role: Role, uid: &str, active: bool, now: &str) -> anyhow::Result<bool>;
    fn update_fields(
        &self,
        role: Role,
        uid: &str,
        patch: &ProfilePatch,
        now: &str,
    ) -> anyhow::Result<bool>;
    fn delete(&self, role: Role, uid: &str) -> anyhow::Result<bool>;
    fn list(&self, role: Role) -> anyhow::Result<Vec<RoleProfile>>;
}

pub struct SqliteProfileStore<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteProfileStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }
}

const COMMON_COLUMNS: &str = "id, full_name, email, photo_url, is_active, created_at, updated_at, last_login";

fn admin_from_row(row: &Row) -> rusqlite::Result<RoleProfile> {
    let permissions_raw: String = row.get(8)?;
    let role_raw: String = row.get(9)?;
    Ok(RoleProfile::Admin(AdminProfile {
        id: row.get(0)?,
        full_name: row.get(1)?,
        email: row.get(2)?,
        photo_url: row.get(3)?,
        is_active: row.get::<_, i64>(4)? != 0,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
        last_login: row.get(7)?,
        permissions: parse_string_set(&permissions_raw),
        role: parse_admin_role(&role_raw),
    }))
}

fn teacher_from_row(row: &Row) -> rusqlite::Result<RoleProfile> {
    Ok(RoleProfile::Teacher(TeacherProfile {
        id: row.get(0)?,
        full_name: row.get(1)?,
        email: row.get(2)?,
        photo_url: row.get(3)?,
        is_active: row.get::<_, i64>(4)? != 0,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
        last_login: row.get(7)?,
        subject_specialization: row.get(8)?,
    }))
}

fn student_from_row(row: &Row) -> rusqlite::Result<RoleProfile> {
    let courses_raw: String = row.get(8)?;
    let teachers_raw: String = row.get(9)?;
    Ok(RoleProfile::Student(StudentProfile {
        id: row.get(0)?,
        full_name: row.get(1)?,
        email: row.get(2)?,
        photo_url: row.get(3)?,
        is_active: row.get::<_, i64>(4)? != 0,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
        last_login: row.get(7)?,
        enrolled_courses: parse_string_list(&courses_raw),
        linked_teachers: parse_string_list(&teachers_raw),
    }))
}

// Stored list columns are written by this process, but an operator may have
// edited the file; unreadable JSON degrades to empty rather than failing
// the whole row.
fn parse_string_list(raw: &str) -> Vec<String> {
    serde_json::from_str(raw).unwrap_or_default()
}

fn parse_string_set(raw: &str) -> BTreeSet<String> {
    serde_json::from_str(raw).unwrap_or_default()
}

fn parse_admin_role(raw: &str) -> AdminRole {
    match raw {
        "super_admin" => AdminRole::SuperAdmin,
        _ => AdminRole::Admin,
    }
}

fn admin_role_str(role: AdminRole) -> &'static str {
    match role {
        AdminRole::Admin => "admin",
        AdminRole::SuperAdmin => "super_admin",
    }
}

impl ProfileStore for SqliteProfileStore<'_> {
    fn fetch(&self, role: Role, uid: &str) -> anyhow::Result<Option<RoleProfile>> {
        let profile = match role {
            Role::Admin => self
                .conn
                .query_row(
                    &format!(
                        "SELECT {}, permissions, role FROM admins WHERE id = ?",
                        COMMON_COLUMNS
                    ),
                    [uid],
                    admin_from_row,
                )
                .optional(),
            Role::Teacher => self
                .conn
                .query_row(
                    &format!(
                        "SELECT {}, subject_specialization FROM teachers WHERE id = ?",
                        COMMON_COLUMNS
                    ),
                    [uid],
                    teacher_from_row,
                )
                .optional(),
            Role::Student => self
                .conn
                .query_row(
                    &format!(
                        "SELECT {}, enrolled_courses, linked_teachers FROM students WHERE id = ?",
                        COMMON_COLUMNS
                    ),
                    [uid],
                    student_from_row,
                )
                .optional(),
        };
        profile.with_context(|| format!("lookup in {} failed", role.table()))
    }

    fn create(&self, profile: &RoleProfile) -> anyhow::Result<()> {
        match profile {
            RoleProfile::Admin(p) => {
                let permissions = serde_json::to_string(&p.permissions)?;
                self.conn.execute(
                    "INSERT OR REPLACE INTO admins(
                        id, full_name, email, photo_url, is_active, role,
                        permissions, created_at, updated_at, last_login
                     ) VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                    (
                        &p.id,
                        &p.full_name,
                        &p.email,
                        &p.photo_url,
                        p.is_active as i64,
                        admin_role_str(p.role),
                        &permissions,
                        &p.created_at,
                        &p.updated_at,
                        &p.last_login,
                    ),
                )?;
            }
            RoleProfile::Teacher(p) => {
                self.conn.execute(
                    "INSERT OR REPLACE INTO teachers(
                        id, full_name, email, photo_url, is_active,
                        subject_specialization, created_at, updated_at, last_login
                     ) VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?)",
                    (
                        &p.id,
                        &p.full_name,
                        &p.email,
                        &p.photo_url,
                        p.is_active as i64,
                        &p.subject_specialization,
                        &p.created_at,
                        &p.updated_at,
                        &p.last_login,
                    ),
                )?;
            }
            RoleProfile::Student(p) => {
                let courses = serde_json::to_string(&p.enrolled_courses)?;
                let teachers = serde_json::to_string(&p.linked_teachers)?;
                self.conn.execute(
                    "INSERT OR REPLACE INTO students(
                        id, full_name, email, photo_url, is_active,
                        enrolled_courses, linked_teachers, created_at, updated_at, last_login
                     ) VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                    (
                        &p.id,
                        &p.full_name,
                        &p.email,
                        &p.photo_url,
                        p.is_active as i64,
                        &courses,
                        &teachers,
                        &p.created_at,
                        &p.updated_at,
                        &p.last_login,
                    ),
                )?;
            }
        }
        Ok(())
    }

    fn touch_login(&self, role: Role, uid: &str, now: &str) -> anyhow::Result<()> {
        self.conn.execute(
            &format!(
                "UPDATE {} SET last_login = ?, updated_at = ? WHERE id = ?",
                role.table()
            ),
            (now, now, uid),
        )?;
        Ok(())
    }

    fn set_active(&self, role: Role, uid: &str, active: bool, now: &str) -> anyhow::Result<bool> {
        let changed = self.conn.execute(
            &format!(
                "UPDATE {} SET is_active = ?, updated_at = ? WHERE id = ?",
                role.table()
            ),
            (active as i64, now, uid),
        )?;
        Ok(changed > 0)
    }

    fn update_fields(
        &self,
        role: Role,
        uid: &str,
        patch: &ProfilePatch,
        now: &str,
    ) -> anyhow::Result<bool> {
        let mut sets: Vec<&'static str> = Vec::new();
        let mut values: Vec<rusqlite::types::Value> = Vec::new();

        if let Some(v) = &patch.full_name {
            sets.push("full_name = ?");
            values.push(v.clone().into());
        }
        if let Some(v) = &patch.email {
            sets.push("email = ?");
            values.push(v.clone().into());
        }
        if let Some(v) = &patch.photo_url {
            sets.push("photo_url = ?");
            values.push(v.clone().into());
        }
        match role {
            Role::Admin => {
                if let Some(v) = patch.role {
                    sets.push("role = ?");
                    values.push(admin_role_str(v).to_string().into());
                }
                if let Some(v) = &patch.permissions {
                    sets.push("permissions = ?");
                    values.push(serde_json::to_string(v)?.into());
                }
            }
            Role::Teacher => {
                if let Some(v) = &patch.subject_specialization {
                    sets.push("subject_specialization = ?");
                    values.push(v.clone().into());
                }
            }
            Role::Student => {
                if let Some(v) = &patch.enrolled_courses {
                    sets.push("enrolled_courses = ?");
                    values.push(serde_json::to_string(v)?.into());
                }
                if let Some(v) = &patch.linked_teachers {
                    sets.push("linked_teachers = ?");
                    values.push(serde_json::to_string(v)?.into());
                }
            }
        }

        if sets.is_empty() {
            // Nothing to write; treat as a no-op against an existing record.
            return Ok(self.fetch(role, uid)?.is_some());
        }

        sets.push("updated_at = ?");
        values.push(now.to_string().into());
        values.push(uid.to_string().into());

        let sql = format!(
            "UPDATE {} SET {} WHERE id = ?",
            role.table(),
            sets.join(", ")
        );
        let changed = self
            .conn
            .execute(&sql, rusqlite::params_from_iter(values))?;
        Ok(changed > 0)
    }

    fn delete(&self, role: Role, uid: &str) -> anyhow::Result<bool> {
        let changed = self
            .conn
            .execute(&format!("DELETE FROM {} WHERE id = ?", role.table()), [uid])?;
        Ok(changed > 0)
    }

    fn list(&self, role: Role) -> anyhow::Result<Vec<RoleProfile>> {
        let (sql, mapper): (String, fn(&Row) -> rusqlite::Result<RoleProfile>) = match role {
            Role::Admin => (
                format!(
                    "SELECT {}, permissions, role FROM admins ORDER BY full_name, id",
                    COMMON_COLUMNS
                ),
                admin_from_row,
            ),
            Role::Teacher => (
                format!(
                    "SELECT {}, subject_specialization FROM teachers ORDER BY full_name, id",
                    COMMON_COLUMNS
                ),
                teacher_from_row,
            ),
            Role::Student => (
                format!(
                    "SELECT {}, enrolled_courses, linked_teachers FROM students ORDER BY full_name, id",
                    COMMON_COLUMNS
                ),
                student_from_row,
            ),
        };
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map([], mapper)?
            .collect::<Result<Vec<_>, _>>()
            .with_context(|| format!("listing {} failed", role.table()))?;
        Ok(rows)
    }
}
