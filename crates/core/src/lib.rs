#![allow(clippy::result_large_err)]

//! modlink-core: module graph linker.
//!
//! Resolves cross-references between the entities of a module (values,
//! inputs, resources, functions, packages, variables), finalizes the
//! deferred provider identifiers, and derives function environments,
//! producing a graph ready to serialize as a provider template.
//!
//! # Public API
//!
//! Key types are re-exported at the crate root for convenience:
//!
//! - [`link()`] -- run the full pipeline
//! - [`ModuleGraph`] / [`ModuleDocument`] -- linker input
//! - [`LinkedModule`] -- linker output
//! - [`LinkerConfig`] -- reserved prefixes and naming conventions
//! - [`TypeCatalog`] -- attribute capability lookups
//! - [`LinkError`] / [`LinkFailure`] -- diagnostics
//! - Value types: [`Value`], [`Scalar`], [`Record`], [`ResourceRecord`]
//!
//! Individual pass entry functions are also re-exported for selective
//! pipeline execution.

pub mod ast;
pub mod catalog;
pub mod config;
pub mod error;
pub mod expr;
pub mod graph;
pub mod link;
pub mod pass1_classify;
pub mod pass2_resolve;
pub mod pass3_finalize;
pub mod pass4_environment;
pub mod pass5_serialize;
pub mod record;
pub mod walk;

// ── Convenience re-exports: key types ────────────────────────────────

pub use ast::{Entity, EntityKind, Pragma, Scalar, Value};
pub use catalog::{PermissiveCatalog, StaticCatalog, TypeCatalog};
pub use config::LinkerConfig;
pub use error::{LinkError, LinkErrorKind, LinkFailure, StructuralError};
pub use graph::{EntityDocument, ModuleDocument, ModuleGraph};
pub use link::LinkedModule;
pub use pass2_resolve::{LinkStats, Resolver};
pub use pass4_environment::FunctionEnvironment;
pub use record::{Record, ResourceRecord};

// ── Convenience re-exports: pipeline entry points ────────────────────

pub use link::link;
pub use pass1_classify::partition;
pub use pass2_resolve::resolve;
pub use pass3_finalize::finalize;
pub use pass4_environment::propagate;
pub use pass5_serialize::serialize_template;
