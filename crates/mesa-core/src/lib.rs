//! # mesa-core
//!
//! Lazy identity and serialization layer for mesa.
//!
//! This crate provides:
//! - The [`Saveable`] contract and per-type [`EntitySchema`] declarations
//! - Short and full [`Identity`] values and the [`BackendRef`] they live in
//! - The injected [`ActiveBackend`] context
//! - [`Placeholder`] proxies and [`ObjectList`]s with the [`reconcile`] rule
//! - An in-process [`MemoryBackend`]
//! - Built-in measurement, series, and calibration entities
//! - Cross-cutting error types

pub mod backend;
pub mod counter;
pub mod entities;
pub mod errors;
pub mod identity;
pub mod mapping;
pub mod memory;
pub mod object_list;
pub mod placeholder;
pub mod reserved;
pub mod saveable;
pub mod schema;

pub use backend::{ActiveBackend, Backend, BackendRef, NewRow, StoredRow};
pub use counter::EphemeralCounter;
pub use errors::{CoreError, Result};
pub use identity::{FullIdentity, Identity};
pub use mapping::{MappingRegistry, StorageMapping, TableDescriptor};
pub use memory::MemoryBackend;
pub use object_list::{ObjectList, Reference, reconcile};
pub use placeholder::Placeholder;
pub use saveable::{BuildFn, Dict, EntityClass, Saveable};
pub use schema::{EntitySchema, Relation};
