//! # Store Client
//!
//! Handle for talking to a running [`StoreActor`](super::StoreActor).

use super::message::StoreRequest;
use super::Storage;
use crate::document::{Document, DocumentId, Fields};
use crate::error::StorageError;
use crate::query::{FindOptions, Filter, Reference};
use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};

/// A type-safe client for a `StoreActor`.
///
/// Holds only a sender, so cloning is inexpensive and clones can be shared across tasks.
/// Dropping every clone closes the channel and lets the actor shut down.
#[derive(Clone)]
pub struct StoreClient {
    sender: mpsc::Sender<StoreRequest>,
}

impl StoreClient {
    pub fn new(sender: mpsc::Sender<StoreRequest>) -> Self {
        Self { sender }
    }

    async fn call<T: Send>(
        &self,
        build: impl FnOnce(oneshot::Sender<Result<T, StorageError>>) -> StoreRequest + Send,
    ) -> Result<T, StorageError> {
        let (respond_to, response) = oneshot::channel();
        self.sender
            .send(build(respond_to))
            .await
            .map_err(|_| StorageError::Closed)?;
        response.await.map_err(|_| StorageError::Dropped)?
    }
}

#[async_trait]
impl Storage for StoreClient {
    async fn find_one(
        &self,
        collection: &str,
        filter: &Filter,
        projection: Option<&[String]>,
    ) -> Result<Option<Document>, StorageError> {
        self.call(|respond_to| StoreRequest::FindOne {
            collection: collection.to_string(),
            filter: filter.clone(),
            projection: projection.map(<[String]>::to_vec),
            respond_to,
        })
        .await
    }

    async fn find(
        &self,
        collection: &str,
        filter: &Filter,
        options: FindOptions,
    ) -> Result<Vec<Document>, StorageError> {
        self.call(|respond_to| StoreRequest::Find {
            collection: collection.to_string(),
            filter: filter.clone(),
            options,
            respond_to,
        })
        .await
    }

    async fn count(&self, collection: &str, filter: &Filter) -> Result<usize, StorageError> {
        self.call(|respond_to| StoreRequest::Count {
            collection: collection.to_string(),
            filter: filter.clone(),
            respond_to,
        })
        .await
    }

    async fn insert(&self, collection: &str, fields: Fields) -> Result<Document, StorageError> {
        self.call(|respond_to| StoreRequest::Insert {
            collection: collection.to_string(),
            fields,
            respond_to,
        })
        .await
    }

    async fn update_by_id(
        &self,
        collection: &str,
        id: &DocumentId,
        patch: Fields,
    ) -> Result<Option<Document>, StorageError> {
        self.call(|respond_to| StoreRequest::UpdateById {
            collection: collection.to_string(),
            id: id.clone(),
            patch,
            respond_to,
        })
        .await
    }

    async fn update_many(
        &self,
        collection: &str,
        filter: &Filter,
        patch: Fields,
    ) -> Result<usize, StorageError> {
        self.call(|respond_to| StoreRequest::UpdateMany {
            collection: collection.to_string(),
            filter: filter.clone(),
            patch,
            respond_to,
        })
        .await
    }

    async fn delete_by_id(&self, collection: &str, id: &DocumentId) -> Result<bool, StorageError> {
        self.call(|respond_to| StoreRequest::DeleteById {
            collection: collection.to_string(),
            id: id.clone(),
            respond_to,
        })
        .await
    }

    async fn populate(
        &self,
        documents: Vec<Document>,
        references: &[Reference],
    ) -> Result<Vec<Document>, StorageError> {
        self.call(|respond_to| StoreRequest::Populate {
            documents,
            references: references.to_vec(),
            respond_to,
        })
        .await
    }
}
