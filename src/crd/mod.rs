//! Custom resource types written by labctl

pub mod virtual_service;

pub use virtual_service::{VirtualService, VirtualServiceSpec};
