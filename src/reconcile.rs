use anyhow::anyhow;
use chrono::Utc;
use tracing::warn;

use crate::model::{
    default_admin_permissions, AdminProfile, AdminRole, Principal, Role, RoleProfile,
    StudentProfile, NEW_USER_PLACEHOLDER, PRECEDENCE,
};
use crate::store::ProfileStore;

pub const DEFAULT_BOOTSTRAP_ADMIN_EMAIL: &str = "admin@classhub.app";

#[derive(Debug, Clone)]
pub struct ReconcileConfig {
    /// First sign-in with this email is provisioned as an admin instead of a
    /// student. Startup configuration, overridable per workspace.
    pub bootstrap_admin_email: String,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            bootstrap_admin_email: DEFAULT_BOOTSTRAP_ADMIN_EMAIL.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReconcileOutcome {
    pub role: Role,
    pub created: bool,
    pub profile: RoleProfile,
}

/// Maps an authenticated principal to the partition that owns its profile,
/// provisioning one on first sign-in.
///
/// The lookup fans out over all three partitions. A single partition lookup
/// that errors is absorbed as "not found" there, so a transient fault in one
/// partition cannot hide a record in another; only all three failing aborts
/// the call. No lock spans the read and the write: two sessions racing on a
/// fresh uid may both create, which lands as an overwrite keyed by uid and
/// self-corrects on the next read.
pub fn reconcile(
    store: &dyn ProfileStore,
    config: &ReconcileConfig,
    principal: &Principal,
) -> anyhow::Result<ReconcileOutcome> {
    let now = Utc::now().to_rfc3339();

    if let Some(mut existing) = lookup_all(store, &principal.uid)? {
        let role = existing.role();
        store.touch_login(role, &principal.uid, &now)?;
        existing.set_last_login(&now);
        return Ok(ReconcileOutcome {
            role,
            created: false,
            profile: existing,
        });
    }

    let profile = if principal.email == config.bootstrap_admin_email {
        RoleProfile::Admin(AdminProfile {
            id: principal.uid.clone(),
            full_name: display_name(principal),
            email: principal.email.clone(),
            photo_url: principal.photo_url.clone(),
            is_active: true,
            role: AdminRole::Admin,
            permissions: default_admin_permissions(),
            created_at: now.clone(),
            updated_at: now.clone(),
            last_login: Some(now),
        })
    } else {
        RoleProfile::Student(StudentProfile {
            id: principal.uid.clone(),
            full_name: display_name(principal),
            email: principal.email.clone(),
            photo_url: principal.photo_url.clone(),
            is_active: true,
            enrolled_courses: Vec::new(),
            linked_teachers: Vec::new(),
            created_at: now.clone(),
            updated_at: now.clone(),
            last_login: Some(now),
        })
    };

    store.create(&profile)?;
    Ok(ReconcileOutcome {
        role: profile.role(),
        created: true,
        profile,
    })
}

/// The read-only half of reconciliation: same three-way lookup and failure
/// absorption, no create, no liveness stamp.
pub fn get_owning_profile(
    store: &dyn ProfileStore,
    uid: &str,
) -> anyhow::Result<Option<RoleProfile>> {
    lookup_all(store, uid)
}

fn lookup_all(store: &dyn ProfileStore, uid: &str) -> anyhow::Result<Option<RoleProfile>> {
    let mut hits: Vec<RoleProfile> = Vec::new();
    let mut failures = 0usize;

    for role in PRECEDENCE {
        match store.fetch(role, uid) {
            Ok(Some(profile)) => hits.push(profile),
            Ok(None) => {}
            Err(e) => {
                failures += 1;
                warn!(
                    partition = role.as_str(),
                    uid,
                    error = %e,
                    "partition lookup failed; treating as not found"
                );
            }
        }
    }

    if failures == PRECEDENCE.len() {
        return Err(anyhow!("all partition lookups failed for uid {}", uid));
    }

    if hits.len() > 1 {
        // A prior create race left the uid in several partitions. Not a hard
        // error: resolve by precedence and leave a trace for the operator.
        let roles: Vec<&str> = hits.iter().map(|p| p.role().as_str()).collect();
        warn!(
            uid = hits[0].id(),
            partitions = %roles.join(","),
            "uid owned by multiple partitions; resolving by precedence"
        );
    }

    // `hits` is already in precedence order because the fetch loop is.
    Ok(hits.into_iter().next())
}

fn display_name(principal: &Principal) -> String {
    principal
        .display_name
        .clone()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| NEW_USER_PLACEHOLDER.to_string())
}
