//! Resource store errors

use thiserror::Error;

/// Errors that can occur when talking to the resource store
#[derive(Debug, Error)]
pub enum StoreError {
    /// Object does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Create targeted an identity that already exists
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// Any other Kubernetes API or transport failure
    #[error("Kubernetes error: {0}")]
    Kube(#[source] kube::Error),

    /// Object metadata is missing a field needed to address it
    #[error("Invalid object: {0}")]
    InvalidObject(String),

    /// Store could not serve the request (used by non-Kubernetes stores)
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    /// Classifies a `kube::Error` for the object described by `what`.
    ///
    /// API status 404 maps to [`StoreError::NotFound`] and a 409 with reason
    /// `AlreadyExists` to [`StoreError::AlreadyExists`]; everything else,
    /// including resourceVersion conflicts, is kept as is.
    pub fn from_kube(error: kube::Error, what: impl std::fmt::Display) -> Self {
        match &error {
            kube::Error::Api(ae) if ae.code == 404 => Self::NotFound(what.to_string()),
            kube::Error::Api(ae) if is_already_exists_status(ae.code, &ae.reason) => {
                Self::AlreadyExists(what.to_string())
            }
            _ => Self::Kube(error),
        }
    }

    /// Returns true for the typed not-found signal
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Returns true when a create lost against an existing object
    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists(_))
    }
}

/// 409 is shared by create collisions and optimistic-lock conflicts; only
/// the former carries reason `AlreadyExists`.
fn is_already_exists_status(code: u16, reason: &str) -> bool {
    code == 409 && reason == "AlreadyExists"
}

impl From<kube::Error> for StoreError {
    fn from(error: kube::Error) -> Self {
        Self::from_kube(error, "object")
    }
}
