//! Plugin extension contracts.
//!
//! Plugins declare contributions (`config`), the registry validates and
//! publishes them (`validate`, `registry`), and hosts resolve them for a
//! concrete extension point and context (`getter`). Manifests are the
//! declarative file form of a registration batch.

pub mod config;
pub mod getter;
pub mod manifest;
pub mod registry;
pub mod validate;
