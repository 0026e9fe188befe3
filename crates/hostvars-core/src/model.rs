//! Host and hostgroup entities

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Fact name to value mapping for a single host
pub type Facts = BTreeMap<String, String>;

/// An addressable host and its facts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Host {
    hostname: String,
    #[serde(default)]
    facts: Facts,
}

impl Host {
    /// Create a host with an empty fact table
    pub fn new(hostname: impl Into<String>) -> Self {
        Self {
            hostname: hostname.into(),
            facts: Facts::new(),
        }
    }

    #[must_use]
    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    /// Live fact table of this host
    #[must_use]
    pub fn facts(&self) -> &Facts {
        &self.facts
    }

    #[must_use]
    pub fn fact(&self, name: &str) -> Option<&str> {
        self.facts.get(name).map(String::as_str)
    }

    /// Insert or overwrite a fact
    pub fn set_fact(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.facts.insert(name.into(), value.into());
    }

    /// Remove a fact, returning whether it was present
    pub fn delete_fact(&mut self, name: &str) -> bool {
        self.facts.remove(name).is_some()
    }
}

/// A named collection of hosts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostGroup {
    name: String,
    #[serde(default)]
    hosts: BTreeMap<String, Host>,
}

impl HostGroup {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            hosts: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Add a host unless one with the same hostname already exists
    ///
    /// Returns `true` if the host was inserted. An existing host is never
    /// replaced.
    pub fn add_host(&mut self, host: Host) -> bool {
        if self.hosts.contains_key(host.hostname()) {
            return false;
        }
        self.hosts.insert(host.hostname.clone(), host);
        true
    }

    /// Remove a host from the group
    pub fn delete_host(&mut self, hostname: &str) -> Option<Host> {
        self.hosts.remove(hostname)
    }

    #[must_use]
    pub fn host(&self, hostname: &str) -> Option<&Host> {
        self.hosts.get(hostname)
    }

    pub fn host_mut(&mut self, hostname: &str) -> Option<&mut Host> {
        self.hosts.get_mut(hostname)
    }

    /// Live host mapping of this group
    #[must_use]
    pub fn hosts(&self) -> &BTreeMap<String, Host> {
        &self.hosts
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.hosts.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_host_has_no_facts() {
        let host = Host::new("m1.example.com");
        assert_eq!(host.hostname(), "m1.example.com");
        assert!(host.facts().is_empty());
    }

    #[test]
    fn test_set_fact_last_write_wins() {
        let mut host = Host::new("m1.example.com");
        host.set_fact("env", "staging");
        host.set_fact("env", "prod");
        assert_eq!(host.fact("env"), Some("prod"));
        assert_eq!(host.facts().len(), 1);
    }

    #[test]
    fn test_delete_fact_removes_only_named_fact() {
        let mut host = Host::new("m1.example.com");
        host.set_fact("test1", "value1");
        host.set_fact("test2", "value2");
        host.set_fact("test3", "value3");

        assert!(host.delete_fact("test1"));
        assert_eq!(host.fact("test1"), None);
        assert_eq!(host.fact("test2"), Some("value2"));
        assert_eq!(host.fact("test3"), Some("value3"));
    }

    #[test]
    fn test_delete_missing_fact_is_noop() {
        let mut host = Host::new("m1.example.com");
        host.set_fact("test1", "value1");
        assert!(!host.delete_fact("absent"));
        assert_eq!(host.facts().len(), 1);
    }

    #[test]
    fn test_add_host_does_not_overwrite() {
        let mut group = HostGroup::new("TestGroup");
        let mut original = Host::new("m1.example.com");
        original.set_fact("role", "db");

        assert!(group.add_host(original));
        assert!(!group.add_host(Host::new("m1.example.com")));

        let host = group.host("m1.example.com").unwrap();
        assert_eq!(host.fact("role"), Some("db"));
        assert_eq!(group.len(), 1);
    }

    #[test]
    fn test_delete_host_removes_key() {
        let mut group = HostGroup::new("TestGroup");
        group.add_host(Host::new("m1.example.com"));
        group.add_host(Host::new("m2.example.com"));

        let removed = group.delete_host("m1.example.com");
        assert_eq!(removed.map(|h| h.hostname().to_string()).as_deref(), Some("m1.example.com"));

        let names: Vec<&str> = group.hosts().keys().map(String::as_str).collect();
        assert_eq!(names, vec!["m2.example.com"]);
        assert!(group.host("m1.example.com").is_none());
    }

    #[test]
    fn test_delete_missing_host() {
        let mut group = HostGroup::new("TestGroup");
        assert!(group.delete_host("ghost").is_none());
        assert!(group.is_empty());
    }

    #[test]
    fn test_host_mut_updates_live_table() {
        let mut group = HostGroup::new("TestGroup");
        group.add_host(Host::new("m1.example.com"));
        group.host_mut("m1.example.com").unwrap().set_fact("os", "debian");
        assert_eq!(group.hosts()["m1.example.com"].fact("os"), Some("debian"));
    }

    #[test]
    fn test_serialized_shape() {
        let mut group = HostGroup::new("web");
        let mut host = Host::new("w1");
        host.set_fact("env", "prod");
        group.add_host(host);

        let value = serde_json::to_value(&group).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "name": "web",
                "hosts": { "w1": { "hostname": "w1", "facts": { "env": "prod" } } }
            })
        );
    }
}
