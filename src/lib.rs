pub mod config;
pub mod controller;
pub mod crd;
pub mod labels;
pub mod registration;
pub mod retry;
pub mod server;

// Re-export for main.rs
pub use crate::config::{resolve_config, ConfigSource, LabConfig};
pub use crate::controller::{reconcile_routes, ReconcileError, ReconcileSummary};
pub use crate::registration::{Orchestrator, RegistrationError};
