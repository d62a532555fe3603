//! # Storage Collaborator
//!
//! The engine never owns persistence. Everything it needs from a document store is the
//! [`Storage`] trait below; any backend implementing it can sit under the API.
//!
//! The crate ships one implementation: an in-memory document store running as a Tokio task
//! ([`StoreActor`]) and reached through a cheap, cloneable handle ([`StoreClient`]). The actor
//! owns every collection and processes requests sequentially, so no locks guard the data.

pub mod actor;
pub mod client;
pub mod message;

pub use actor::StoreActor;
pub use client::StoreClient;
pub use message::{Response, StoreRequest};

use crate::document::{Document, DocumentId, Fields};
use crate::error::StorageError;
use crate::query::{FindOptions, Filter, Reference};
use async_trait::async_trait;

/// Operations the engine consumes from a document store.
///
/// Every call is a suspension point; none of them may block a shared worker.
#[async_trait]
pub trait Storage: Send + Sync {
    /// First document (in natural order) matching `filter`.
    async fn find_one(
        &self,
        collection: &str,
        filter: &Filter,
        projection: Option<&[String]>,
    ) -> Result<Option<Document>, StorageError>;

    async fn find(
        &self,
        collection: &str,
        filter: &Filter,
        options: FindOptions,
    ) -> Result<Vec<Document>, StorageError>;

    async fn count(&self, collection: &str, filter: &Filter) -> Result<usize, StorageError>;

    /// Stores a new document under a freshly generated id.
    async fn insert(&self, collection: &str, fields: Fields) -> Result<Document, StorageError>;

    /// Merges `patch` into the document. `None` when the id does not exist.
    async fn update_by_id(
        &self,
        collection: &str,
        id: &DocumentId,
        patch: Fields,
    ) -> Result<Option<Document>, StorageError>;

    /// Merges `patch` into every matching document and returns how many changed.
    async fn update_many(
        &self,
        collection: &str,
        filter: &Filter,
        patch: Fields,
    ) -> Result<usize, StorageError>;

    /// `false` when the id does not exist.
    async fn delete_by_id(&self, collection: &str, id: &DocumentId) -> Result<bool, StorageError>;

    /// Replaces referenced ids with the referenced documents.
    async fn populate(
        &self,
        documents: Vec<Document>,
        references: &[Reference],
    ) -> Result<Vec<Document>, StorageError>;
}
