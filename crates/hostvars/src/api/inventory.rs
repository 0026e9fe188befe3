//! Inventory API endpoints
//!
//! Bodies are decoded leniently: a body that is not valid JSON is treated
//! as if every field were missing, so it yields an error status instead of
//! an extractor rejection.

use std::sync::Arc;

use axum::{
    Json,
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use hostvars_api::requests::{CreateHostRequest, CreateHostgroupRequest, SetFactsRequest};
use hostvars_api::responses::{InventoryListing, META_KEY};
use hostvars_core::InventoryState;

use crate::api::error::AppError;
use crate::state::AppState;

fn decode<T: DeserializeOwned + Default>(body: &[u8]) -> T {
    serde_json::from_slice(body).unwrap_or_else(|e| {
        debug!(error = %e, "undecodable request body");
        T::default()
    })
}

fn check_hostgroup_name(name: &str) -> Result<(), AppError> {
    if name == META_KEY {
        return Err(AppError::bad_request(format!(
            "hostgroup name {META_KEY} is reserved"
        )));
    }
    Ok(())
}

/// Build the Ansible listing from one inventory snapshot
pub fn listing_from(state: &InventoryState) -> InventoryListing {
    let mut listing = InventoryListing::new();
    for (name, group) in &state.hostgroups {
        if name == META_KEY {
            warn!(hostgroup = %name, "skipping hostgroup with reserved name");
            continue;
        }
        listing.add_group(name.as_str());
        for (hostname, host) in group.hosts() {
            listing.add_host(name, hostname, host.facts());
        }
    }
    listing
}

/// Create a hostgroup
///
/// # Errors
/// Returns 500 if the `hostgroup` field is missing
pub async fn create_hostgroup(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<StatusCode, AppError> {
    let req: CreateHostgroupRequest = decode(&body);
    let hostgroup = req
        .hostgroup
        .ok_or_else(|| AppError::internal("missing field: hostgroup"))?;
    check_hostgroup_name(&hostgroup)?;

    state.inventory.create_hostgroup(&hostgroup).await;
    Ok(StatusCode::CREATED)
}

/// Create a host, and its hostgroup if needed
///
/// # Errors
/// Returns 500 if `hostgroup` or `hostname` is missing
pub async fn create_host(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<StatusCode, AppError> {
    let req: CreateHostRequest = decode(&body);
    let (Some(hostgroup), Some(hostname)) = (req.hostgroup, req.hostname) else {
        return Err(AppError::internal("missing field: hostgroup and hostname are required"));
    };
    check_hostgroup_name(&hostgroup)?;

    state.inventory.create_host(&hostgroup, &hostname).await;
    Ok(StatusCode::CREATED)
}

/// Set facts on an existing host
///
/// # Errors
/// Returns 400 if `hostgroup` or `hostname` is missing or a fact value is
/// not a scalar, 500 if the target host does not exist
pub async fn set_host_facts(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<StatusCode, AppError> {
    let req: SetFactsRequest = decode(&body);
    let (Some(hostgroup), Some(hostname)) = (req.hostgroup.as_deref(), req.hostname.as_deref())
    else {
        return Err(AppError::bad_request("hostgroup and hostname are required"));
    };

    let facts = req.string_facts().map_err(|name| {
        AppError::bad_request(format!("fact {name} must be a string, number or boolean"))
    })?;
    if facts.is_empty() {
        return Ok(StatusCode::CREATED);
    }

    state
        .inventory
        .set_host_facts(hostgroup, hostname, facts)
        .await
        .map_err(|e| {
            warn!(hostgroup = %hostgroup, hostname = %hostname, error = %e, "failed to set facts");
            AppError::internal(format!("unable to set facts: {e}"))
        })?;

    Ok(StatusCode::CREATED)
}

/// Full inventory in Ansible dynamic-inventory layout
pub async fn get_inventory(State(state): State<Arc<AppState>>) -> Json<InventoryListing> {
    let snapshot = state.inventory.snapshot().await;
    Json(listing_from(&snapshot))
}

/// Hosts of a single hostgroup
///
/// # Errors
/// Always returns 501; the response shape is not defined yet
pub async fn get_hosts(
    State(_state): State<Arc<AppState>>,
    Path(_hostgroup): Path<String>,
) -> Result<StatusCode, AppError> {
    Err(AppError::not_implemented("Pending implementation"))
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::time::Duration;

    use hostvars_core::{Host, HostGroup};

    use super::*;

    #[test]
    fn test_listing_skips_reserved_group() {
        let mut web = HostGroup::new("web");
        let mut w1 = Host::new("w1");
        w1.set_fact("env", "prod");
        web.add_host(w1);

        let state = InventoryState {
            hostgroups: [
                ("web".to_string(), web),
                (META_KEY.to_string(), HostGroup::new(META_KEY)),
            ]
            .into_iter()
            .collect(),
            data_store_path: PathBuf::from("inventory.json"),
            flush_interval: Duration::from_secs(5),
            pending_ops: 0,
        };

        let listing = listing_from(&state);
        assert_eq!(listing.groups.len(), 1);
        assert!(listing.groups["web"].hosts.iter().eq(["w1"]));
        assert_eq!(listing.hostvars("w1").unwrap()["env"], "prod");
    }

    #[test]
    fn test_decode_falls_back_to_default() {
        let req: CreateHostRequest = decode(b"not json");
        assert!(req.hostgroup.is_none());
        assert!(req.hostname.is_none());
    }
}
