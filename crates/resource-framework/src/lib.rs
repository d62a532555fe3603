//! # Resource Framework
//!
//! A declarative REST resource engine over a document store. A resource describes *what* it is
//! (collection, bindings, filters, field allow-lists, validation, hooks) through the
//! [`ResourceSpec`] trait; the framework supplies every CRUD operation, nested-path dispatch,
//! pagination, ordered child lists and the single-primary invariant.
//!
//! ## Architecture Overview
//!
//! 1. **Storage Layer** ([`store`]) - The [`Storage`] trait and an in-memory document store
//!    running as an actor ([`StoreActor`]) behind a cloneable [`StoreClient`]
//! 2. **Engine Layer** ([`Controller`]) - Generic list, fetch-one, create, update and delete,
//!    built on the [`navigator`], [`id_list`] and [`primary`] modules
//! 3. **Routing Layer** ([`Api`]) - URL patterns, segment-by-segment dispatch and the coded
//!    exception surface
//!
//! ## Nested Resources
//!
//! A parent document owns an ordered list of child ids. Dispatching
//! `:username/addresses/:address_id` resolves the user, hands the rest of the path to the
//! address controller with the user as parent, and only accepts addresses in the user's list:
//!
//! ```text
//! user  ──:username──▶ resolve user ──addresses──▶ address (parent = user)
//!                                                   ──:address_id──▶ member of user.addresses
//!                                                   ──primary──────▶ user's primary address
//! ```
//!
//! When a resource tracks a primary child, every insert, update and delete under a parent
//! leaves exactly one child flagged `primary`, and the parent mirrors that child's id.
//!
//! ## Concurrency Model
//!
//! - The store actor processes requests sequentially in its own Tokio task
//! - The [`Api`] is immutable once built and can be shared across any number of tasks
//! - Mutation pipelines are sequential; the first failing step short-circuits the rest
//!
//! ## Testing
//!
//! [`mock::MockStore`] answers storage calls from scripted expectations, so engine logic can be
//! tested against exact storage failures without a real store.

pub mod api;
pub mod config;
pub mod controller;
pub mod dispatch;
pub mod document;
pub mod error;
pub mod exception;
pub mod hooks;
pub mod id_list;
pub mod mock;
pub mod navigator;
pub mod primary;
pub mod query;
pub mod resource;
pub mod route;
pub mod schema;
pub mod store;
pub mod tracing;

// Re-export core types for convenience
pub use api::{Api, ApiBuilder, Response};
pub use config::ApiConfig;
pub use controller::Controller;
pub use document::{Document, DocumentId, Fields};
pub use error::{FieldError, FrameworkError, StorageError};
pub use exception::CodeTable;
pub use hooks::Hook;
pub use navigator::Page;
pub use query::{Filter, QueryParams};
pub use resource::{
    Attributes, Binding, ChildLink, Identity, Parent, Reply, Request, ResourceSpec, Verb,
};
pub use route::Route;
pub use schema::{FieldRule, Schema};
pub use store::{Storage, StoreActor, StoreClient};
