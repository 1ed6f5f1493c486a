//! Request keys
//!
//! The work queue is keyed by (tenant, namespace, name). Upstream controller
//! tooling only understands (namespace, name), so the tenant travels in the
//! namespace field as `"<tenant>!<namespace>"` with the name carried
//! alongside. [`RequestKey`] keeps the three fields separate and exposes that
//! flat form through [`RequestKey::encoded_namespace`] and
//! [`RequestKey::decode`].

use crate::tenant::{TenantError, TenantId};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

/// Separator between tenant and namespace in the flat key form.
pub const KEY_SEPARATOR: char = '!';

/// Errors raised when decoding a flat request key
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyError {
    /// The combined field has no tenant separator
    #[error("request key {0:?} has no '{KEY_SEPARATOR}' separator")]
    MissingSeparator(String),

    /// The rendered key has no `/` before the name
    #[error("request key {0:?} has no name component")]
    MissingName(String),

    /// Tenant part failed validation
    #[error(transparent)]
    Tenant(#[from] TenantError),
}

/// Namespace/name pair of an object in the local cluster
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectKey {
    pub namespace: String,
    pub name: String,
}

impl ObjectKey {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl std::fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.namespace.is_empty() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{}/{}", self.namespace, self.name)
        }
    }
}

/// Work queue key: tenant identity plus the local object's namespace/name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RequestKey {
    tenant: TenantId,
    object: ObjectKey,
}

impl RequestKey {
    /// Build a key for an object observed under `tenant`.
    pub fn encode(tenant: TenantId, namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            tenant,
            object: ObjectKey::new(namespace, name),
        }
    }

    /// Rebuild a key from its flat form.
    ///
    /// Splits `encoded_namespace` on the first separator only, so the
    /// namespace part may be empty.
    pub fn decode(encoded_namespace: &str, name: impl Into<String>) -> Result<Self, KeyError> {
        let (tenant, namespace) = encoded_namespace
            .split_once(KEY_SEPARATOR)
            .ok_or_else(|| KeyError::MissingSeparator(encoded_namespace.to_string()))?;

        Ok(Self::encode(TenantId::new(tenant)?, namespace, name))
    }

    /// Flat `"<tenant>!<namespace>"` form of the key.
    pub fn encoded_namespace(&self) -> String {
        format!("{}{}{}", self.tenant, KEY_SEPARATOR, self.object.namespace)
    }

    pub fn tenant(&self) -> &TenantId {
        &self.tenant
    }

    pub fn object(&self) -> &ObjectKey {
        &self.object
    }

    pub fn namespace(&self) -> &str {
        &self.object.namespace
    }

    pub fn name(&self) -> &str {
        &self.object.name
    }

    pub fn into_parts(self) -> (ObjectKey, TenantId) {
        (self.object, self.tenant)
    }
}

impl std::fmt::Display for RequestKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.encoded_namespace(), self.object.name)
    }
}

impl FromStr for RequestKey {
    type Err = KeyError;

    /// Parses the `Display` form `"<tenant>!<namespace>/<name>"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (encoded_namespace, name) = s
            .rsplit_once('/')
            .ok_or_else(|| KeyError::MissingName(s.to_string()))?;
        Self::decode(encoded_namespace, name)
    }
}
