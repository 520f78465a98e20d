//! Object identity

use crate::error::StoreError;
use kube::{Resource, ResourceExt};
use std::fmt;

/// Identity of a namespaced object: `(namespace, name)`.
///
/// A HomeAgent and the Deployment managed for it share the same key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectKey {
    pub namespace: String,
    pub name: String,
}

impl ObjectKey {
    /// Create a key from namespace and name
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Derive the key of a namespaced object from its metadata.
    ///
    /// Objects without a name or namespace are rejected with
    /// [`StoreError::InvalidObject`].
    pub fn from_resource<K: Resource>(resource: &K) -> Result<Self, StoreError> {
        let name = resource
            .meta()
            .name
            .clone()
            .ok_or_else(|| StoreError::InvalidObject("object has no name".to_string()))?;
        let namespace = resource.namespace().ok_or_else(|| {
            StoreError::InvalidObject(format!("object {} has no namespace", name))
        })?;
        Ok(Self { namespace, name })
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}
