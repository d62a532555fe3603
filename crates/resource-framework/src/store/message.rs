//! # Store Messages
//!
//! Requests sent from a [`StoreClient`](super::StoreClient) to the
//! [`StoreActor`](super::StoreActor). Each variant carries a one-shot channel the actor answers
//! on, mirroring the storage collaborator's operations one to one.

use crate::document::{Document, DocumentId, Fields};
use crate::error::StorageError;
use crate::query::{FindOptions, Filter, Reference};
use tokio::sync::oneshot;

/// Type alias for the one-shot response channel used by the store.
pub type Response<T> = oneshot::Sender<Result<T, StorageError>>;

#[derive(Debug)]
pub enum StoreRequest {
    FindOne {
        collection: String,
        filter: Filter,
        projection: Option<Vec<String>>,
        respond_to: Response<Option<Document>>,
    },
    Find {
        collection: String,
        filter: Filter,
        options: FindOptions,
        respond_to: Response<Vec<Document>>,
    },
    Count {
        collection: String,
        filter: Filter,
        respond_to: Response<usize>,
    },
    Insert {
        collection: String,
        fields: Fields,
        respond_to: Response<Document>,
    },
    UpdateById {
        collection: String,
        id: DocumentId,
        patch: Fields,
        respond_to: Response<Option<Document>>,
    },
    UpdateMany {
        collection: String,
        filter: Filter,
        patch: Fields,
        respond_to: Response<usize>,
    },
    DeleteById {
        collection: String,
        id: DocumentId,
        respond_to: Response<bool>,
    },
    Populate {
        documents: Vec<Document>,
        references: Vec<Reference>,
        respond_to: Response<Vec<Document>>,
    },
}

impl StoreRequest {
    /// Short operation name, used in logs and mock diagnostics.
    pub fn operation(&self) -> &'static str {
        match self {
            StoreRequest::FindOne { .. } => "find_one",
            StoreRequest::Find { .. } => "find",
            StoreRequest::Count { .. } => "count",
            StoreRequest::Insert { .. } => "insert",
            StoreRequest::UpdateById { .. } => "update_by_id",
            StoreRequest::UpdateMany { .. } => "update_many",
            StoreRequest::DeleteById { .. } => "delete_by_id",
            StoreRequest::Populate { .. } => "populate",
        }
    }
}
