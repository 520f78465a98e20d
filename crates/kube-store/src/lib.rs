//! Resource store client
//!
//! Typed access to the Kubernetes objects the HomeAgent operator reads and
//! writes: `HomeAgent` custom resources, the `Deployment` managed for each of
//! them, and the `Pod`s that deployment runs.
//!
//! # Example
//!
//! ```no_run
//! use kube_store::{KubeStore, ObjectKey, ResourceStore, StoreError};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = kube::Client::try_default().await?;
//! let store = KubeStore::new(client);
//!
//! let key = ObjectKey::new("default", "edge-pool");
//! match store.get_home_agent(&key).await {
//!     Ok(agent) => println!("desired size: {}", agent.spec.size),
//!     Err(StoreError::NotFound(_)) => println!("{} is gone", key),
//!     Err(e) => return Err(e.into()),
//! }
//! # Ok(())
//! # }
//! ```
//!
//! The `test-util` feature enables [`MockStore`], an in-memory store that
//! records every call for use in unit tests.

pub mod client;
pub mod error;
pub mod key;
#[path = "trait.rs"]
pub mod store_trait;
#[cfg(any(test, feature = "test-util"))]
pub mod mock;

pub use client::KubeStore;
pub use error::StoreError;
pub use key::ObjectKey;
pub use store_trait::ResourceStore;
#[cfg(any(test, feature = "test-util"))]
pub use mock::{MockStore, StoreCall, StoreOp};
