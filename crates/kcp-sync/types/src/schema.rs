//! APIResourceSchema model
//!
//! Mirrors the JSON shape of `apis.kcp.io/v1alpha1` APIResourceSchema so the
//! spec can be sent to the remote control plane as-is.

use serde::{Deserialize, Serialize};

/// A schema resource that must exist in a tenant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResourceSchema {
    /// Object name, by convention `<prefix>.<plural>.<group>`
    pub name: String,

    /// Schema definition
    pub spec: ApiResourceSchemaSpec,
}

impl ApiResourceSchema {
    pub fn new(name: impl Into<String>, spec: ApiResourceSchemaSpec) -> Self {
        Self {
            name: name.into(),
            spec,
        }
    }
}

/// Body of an APIResourceSchema
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResourceSchemaSpec {
    pub group: String,
    pub names: ResourceNames,
    pub scope: ResourceScope,
    pub versions: Vec<ApiResourceVersion>,
}

/// Naming of the served resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceNames {
    pub plural: String,
    pub singular: String,
    pub kind: String,
    pub list_kind: String,
}

/// Whether the resource is namespaced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResourceScope {
    Namespaced,
    Cluster,
}

/// One served version of the resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResourceVersion {
    pub name: String,
    pub served: bool,
    pub storage: bool,

    /// OpenAPI v3 validation schema
    pub schema: serde_json::Value,
}
