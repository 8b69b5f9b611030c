use rusqlite::Connection;
use std::collections::{HashMap, HashSet};

use crate::db;

pub const FLAG_SUBSCRIPTION_APPROVED: &str = "isSubscriptionApproved";
pub const FLAG_TRIAL_ACTIVE: &str = "trialActive";
pub const FLAG_ALLOWED_SECTIONS: &str = "allowedSections";

/// Snapshot of the entitlement flags at one point in time. The evaluator is
/// a pure function of this struct; nothing here touches the database.
///
/// The flags are written by the shell's billing flow (`flags.set`); this
/// side only ever reads them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntitlementState {
    pub subscription_approved: bool,
    pub trial_active: bool,
    pub allowed_sections: HashMap<String, HashSet<String>>,
}

impl EntitlementState {
    /// Builds a snapshot from raw flag-store strings. Fail closed: a missing
    /// or unparseable value grants nothing, and never errors.
    pub fn from_flags(
        subscription_approved: Option<&str>,
        trial_active: Option<&str>,
        allowed_sections: Option<&str>,
    ) -> Self {
        Self {
            subscription_approved: parse_bool_flag(subscription_approved),
            trial_active: parse_bool_flag(trial_active),
            allowed_sections: parse_allowed_sections(allowed_sections),
        }
    }

    /// Reads the current snapshot out of a workspace database. Read errors
    /// degrade to the absent-flag default, same as a missing key.
    pub fn load(conn: &Connection) -> Self {
        let approved = db::flag_get(conn, FLAG_SUBSCRIPTION_APPROVED).unwrap_or_default();
        let trial = db::flag_get(conn, FLAG_TRIAL_ACTIVE).unwrap_or_default();
        let sections = db::flag_get(conn, FLAG_ALLOWED_SECTIONS).unwrap_or_default();
        Self::from_flags(approved.as_deref(), trial.as_deref(), sections.as_deref())
    }

    /// Decision order: approved account, then active trial, then the
    /// per-feature allow-list. An approved or trialing account sees
    /// everything; otherwise a feature is visible iff it has at least one
    /// allowed section.
    pub fn is_feature_allowed(&self, feature_id: &str) -> bool {
        if self.subscription_approved || self.trial_active {
            return true;
        }
        self.allowed_sections
            .get(feature_id)
            .map(|sections| !sections.is_empty())
            .unwrap_or(false)
    }

    pub fn is_section_allowed(&self, feature_id: &str, section_id: &str) -> bool {
        if self.subscription_approved || self.trial_active {
            return true;
        }
        self.allowed_sections
            .get(feature_id)
            .map(|sections| sections.contains(section_id))
            .unwrap_or(false)
    }
}

fn parse_bool_flag(value: Option<&str>) -> bool {
    matches!(value, Some("true"))
}

fn parse_allowed_sections(value: Option<&str>) -> HashMap<String, HashSet<String>> {
    let Some(raw) = value else {
        return HashMap::new();
    };
    let Ok(parsed) = serde_json::from_str::<serde_json::Value>(raw) else {
        return HashMap::new();
    };
    let Some(obj) = parsed.as_object() else {
        return HashMap::new();
    };

    let mut out = HashMap::new();
    for (feature, sections) in obj {
        let Some(arr) = sections.as_array() else {
            // One malformed entry doesn't poison the rest of the mapping.
            continue;
        };
        let set: HashSet<String> = arr
            .iter()
            .filter_map(|v| v.as_str().map(|s| s.to_string()))
            .collect();
        out.insert(feature.clone(), set);
    }
    out
}
