//! Modules layer - Infrastructure components for external integrations
//!
//! Contains the object storage client and template.

pub mod storage;
