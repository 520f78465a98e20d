//! HomeAgent CRD Definitions
//!
//! Kubernetes Custom Resource Definitions for the HomeAgent operator.

pub mod home_agent;

pub use home_agent::*;
