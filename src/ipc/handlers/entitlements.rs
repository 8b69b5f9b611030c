use crate::db;
use crate::entitlements::EntitlementState;
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use serde_json::json;

/// Entitlement queries never error toward the shell: with no workspace open
/// there are no flags, and no flags means no extended access. The UI renders
/// a denial as "feature unavailable", not as a failure.
fn current_state(state: &AppState) -> EntitlementState {
    state
        .db
        .as_ref()
        .map(EntitlementState::load)
        .unwrap_or_default()
}

fn handle_feature_allowed(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(feature_id) = req.params.get("featureId").and_then(|v| v.as_str()) else {
        return err(&req.id, "bad_params", "missing featureId", None);
    };
    let allowed = current_state(state).is_feature_allowed(feature_id);
    ok(&req.id, json!({ "featureId": feature_id, "allowed": allowed }))
}

fn handle_section_allowed(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(feature_id) = req.params.get("featureId").and_then(|v| v.as_str()) else {
        return err(&req.id, "bad_params", "missing featureId", None);
    };
    let Some(section_id) = req.params.get("sectionId").and_then(|v| v.as_str()) else {
        return err(&req.id, "bad_params", "missing sectionId", None);
    };
    let allowed = current_state(state).is_section_allowed(feature_id, section_id);
    ok(
        &req.id,
        json!({
            "featureId": feature_id,
            "sectionId": section_id,
            "allowed": allowed
        }),
    )
}

fn handle_snapshot(state: &mut AppState, req: &Request) -> serde_json::Value {
    let snapshot = current_state(state);
    let sections: serde_json::Map<String, serde_json::Value> = snapshot
        .allowed_sections
        .iter()
        .map(|(feature, set)| {
            let mut ids: Vec<&String> = set.iter().collect();
            ids.sort();
            (feature.clone(), json!(ids))
        })
        .collect();
    ok(
        &req.id,
        json!({
            "subscriptionApproved": snapshot.subscription_approved,
            "trialActive": snapshot.trial_active,
            "allowedSections": sections
        }),
    )
}

/// Write-side of the flag store. The billing/subscription flow in the shell
/// owns these values; the daemon only persists what it is handed.
fn handle_flags_set(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let Some(key) = req.params.get("key").and_then(|v| v.as_str()) else {
        return err(&req.id, "bad_params", "missing key", None);
    };
    let Some(value) = req.params.get("value").and_then(|v| v.as_str()) else {
        return err(&req.id, "bad_params", "missing value", None);
    };

    match db::flag_set(conn, key, value) {
        Ok(()) => ok(&req.id, json!({ "key": key })),
        Err(e) => err(&req.id, "db_update_failed", e.to_string(), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "entitlements.featureAllowed" => Some(handle_feature_allowed(state, req)),
        "entitlements.sectionAllowed" => Some(handle_section_allowed(state, req)),
        "entitlements.snapshot" => Some(handle_snapshot(state, req)),
        "flags.set" => Some(handle_flags_set(state, req)),
        _ => None,
    }
}
