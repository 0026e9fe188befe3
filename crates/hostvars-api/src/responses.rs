//! Response types for the API

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Reserved listing key holding per-host variables
pub const META_KEY: &str = "_meta";

/// Inventory in Ansible dynamic-inventory layout
///
/// ```json
/// {"_meta": {"hostvars": {"w1": {"env": "prod"}}}, "web": {"hosts": ["w1"]}}
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryListing {
    #[serde(rename = "_meta", default)]
    pub meta: InventoryMeta,
    #[serde(flatten)]
    pub groups: BTreeMap<String, GroupListing>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct InventoryMeta {
    #[serde(default)]
    pub hostvars: BTreeMap<String, BTreeMap<String, String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct GroupListing {
    #[serde(default)]
    pub hosts: BTreeSet<String>,
}

impl InventoryListing {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a group, possibly without hosts
    pub fn add_group(&mut self, group: impl Into<String>) -> &mut GroupListing {
        self.groups.entry(group.into()).or_default()
    }

    /// Register a host under a group and merge its facts into the hostvars
    ///
    /// Facts of a host listed in several groups are merged; later calls win
    /// on conflicting names.
    pub fn add_host<'a>(
        &mut self,
        group: &str,
        hostname: &str,
        facts: impl IntoIterator<Item = (&'a String, &'a String)>,
    ) {
        self.add_group(group).hosts.insert(hostname.to_string());

        let vars = self
            .meta
            .hostvars
            .entry(hostname.to_string())
            .or_default();
        for (name, value) in facts {
            vars.insert(name.clone(), value.clone());
        }
    }

    /// Variables of a single host
    #[must_use]
    pub fn hostvars(&self, hostname: &str) -> Option<&BTreeMap<String, String>> {
        self.meta.hostvars.get(hostname)
    }
}
