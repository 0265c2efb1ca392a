//! Remote cluster registration
//!
//! Attaches the local cluster to a central control plane:
//! - `client`: HTTP client for the remote management API
//! - `session`: workflow states and the per-run session
//! - `orchestrator`: the register / deregister workflows
//! - `manifest`: applying the returned manifest to the local cluster

pub mod client;
pub mod manifest;
pub mod orchestrator;
pub mod session;

pub use client::{ApiError, ClusterObject, ManagementClient, RegistrationToken};
pub use manifest::{ApplyError, KubeManifestApplier, ManifestApplier};
pub use orchestrator::{Deregistration, Orchestrator, RegistrationError, RegistrationReport};
pub use session::{RegistrationSession, RegistrationState};
