//! Request types for the API
//!
//! Every field is optional on the wire; the daemon decides which absences
//! are errors.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct CreateHostgroupRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostgroup: Option<String>,
}

impl CreateHostgroupRequest {
    pub fn new(hostgroup: impl Into<String>) -> Self {
        Self {
            hostgroup: Some(hostgroup.into()),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct CreateHostRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostgroup: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
}

impl CreateHostRequest {
    pub fn new(hostgroup: impl Into<String>, hostname: impl Into<String>) -> Self {
        Self {
            hostgroup: Some(hostgroup.into()),
            hostname: Some(hostname.into()),
        }
    }
}

/// Fact assignment: every key other than `hostgroup` and `hostname` is a
/// fact name mapped to its value
///
/// Values are kept as raw JSON so that one oddly typed fact does not hide
/// the target fields; [`SetFactsRequest::string_facts`] normalizes them.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct SetFactsRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostgroup: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    #[serde(flatten)]
    pub facts: BTreeMap<String, Value>,
}

impl SetFactsRequest {
    pub fn new(hostgroup: impl Into<String>, hostname: impl Into<String>) -> Self {
        Self {
            hostgroup: Some(hostgroup.into()),
            hostname: Some(hostname.into()),
            facts: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn fact(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.facts.insert(name.into(), Value::String(value.into()));
        self
    }

    /// Facts as strings
    ///
    /// Numbers and booleans are rendered in their JSON form.
    ///
    /// # Errors
    /// Returns the name of the first fact whose value is null, an array or
    /// an object.
    pub fn string_facts(&self) -> Result<BTreeMap<String, String>, String> {
        self.facts
            .iter()
            .map(|(name, value)| {
                let value = match value {
                    Value::String(s) => s.clone(),
                    Value::Number(n) => n.to_string(),
                    Value::Bool(b) => b.to_string(),
                    Value::Null | Value::Array(_) | Value::Object(_) => return Err(name.clone()),
                };
                Ok((name.clone(), value))
            })
            .collect()
    }
}
