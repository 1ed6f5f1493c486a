//! Tenant (logical cluster) identity

use crate::key::KEY_SEPARATOR;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised when constructing a tenant identity
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TenantError {
    /// The identity contains the queue key separator
    #[error("tenant identity {0:?} contains the reserved separator '{KEY_SEPARATOR}'")]
    ContainsSeparator(String),
}

/// Identity of one logical cluster in the remote control plane.
///
/// A `TenantId` never contains [`KEY_SEPARATOR`], which is what keeps the
/// flat request key encoding unambiguous. The empty identity is the explicit
/// sentinel for objects that carry no tenant annotation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TenantId(String);

impl TenantId {
    /// Validate and wrap a tenant identity
    pub fn new(id: impl Into<String>) -> Result<Self, TenantError> {
        let id = id.into();
        if id.contains(KEY_SEPARATOR) {
            return Err(TenantError::ContainsSeparator(id));
        }
        Ok(Self(id))
    }

    /// The untenanted sentinel
    pub fn empty() -> Self {
        Self(String::new())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns `self` unless it is the empty sentinel, in which case `fallback`.
    pub fn or<'a>(&'a self, fallback: &'a TenantId) -> &'a TenantId {
        if self.is_empty() {
            fallback
        } else {
            self
        }
    }
}

impl std::fmt::Display for TenantId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for TenantId {
    type Error = TenantError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<TenantId> for String {
    fn from(id: TenantId) -> Self {
        id.0
    }
}
