//! # Mock Store
//!
//! Utilities for testing engine code against a scripted storage collaborator.
//!
//! | | MockStore | StoreActor |
//! |---------|------------|------------|
//! | **State** | None (scripted answers) | Real collections |
//! | **Error Injection** | Easy (`return_err`) | Hard |
//! | **Use Case** | Failure paths, "which queries were issued" | Behaviour end to end |
//!
//! ```rust
//! use resource_framework::mock::MockStore;
//! use resource_framework::query::Filter;
//! use resource_framework::store::Storage;
//!
//! #[tokio::main]
//! async fn main() {
//!     let mut mock = MockStore::new();
//!     mock.expect_count().return_ok(0);
//!
//!     let store = mock.client();
//!     assert_eq!(store.count("users", &Filter::new()).await.unwrap(), 0);
//!
//!     mock.verify();
//!     assert_eq!(mock.received(), vec!["count"]);
//! }
//! ```
//!
//! For full control over each request, [`create_mock_store`] hands back the raw receiver.

use crate::document::Document;
use crate::error::StorageError;
use crate::store::{StoreClient, StoreRequest};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// A scripted answer, consumed in FIFO order.
enum Expectation {
    FindOne(Result<Option<Document>, StorageError>),
    Find(Result<Vec<Document>, StorageError>),
    Count(Result<usize, StorageError>),
    Insert(Result<Document, StorageError>),
    UpdateById(Result<Option<Document>, StorageError>),
    UpdateMany(Result<usize, StorageError>),
    DeleteById(Result<bool, StorageError>),
    Populate(Result<Vec<Document>, StorageError>),
}

type Queue = Arc<Mutex<VecDeque<Expectation>>>;

/// A mock store with expectation tracking.
///
/// A request that does not match the next expectation panics the background task, which
/// the caller observes as [`StorageError::Dropped`].
pub struct MockStore {
    client: StoreClient,
    expectations: Queue,
    received: Arc<Mutex<Vec<&'static str>>>,
    _handle: tokio::task::JoinHandle<()>,
}

impl MockStore {
    /// Creates a new mock with no expectations. Must be called inside a Tokio runtime.
    pub fn new() -> Self {
        let (sender, mut receiver) = mpsc::channel::<StoreRequest>(100);
        let expectations: Queue = Arc::new(Mutex::new(VecDeque::new()));
        let received = Arc::new(Mutex::new(Vec::new()));
        let expectations_clone = expectations.clone();
        let received_clone = received.clone();

        let handle = tokio::spawn(async move {
            while let Some(request) = receiver.recv().await {
                if let Ok(mut log) = received_clone.lock() {
                    log.push(request.operation());
                }
                let expectation = expectations_clone
                    .lock()
                    .ok()
                    .and_then(|mut queue| queue.pop_front());

                match (request, expectation) {
                    (StoreRequest::FindOne { respond_to, .. }, Some(Expectation::FindOne(r))) => {
                        let _ = respond_to.send(r);
                    }
                    (StoreRequest::Find { respond_to, .. }, Some(Expectation::Find(r))) => {
                        let _ = respond_to.send(r);
                    }
                    (StoreRequest::Count { respond_to, .. }, Some(Expectation::Count(r))) => {
                        let _ = respond_to.send(r);
                    }
                    (StoreRequest::Insert { respond_to, .. }, Some(Expectation::Insert(r))) => {
                        let _ = respond_to.send(r);
                    }
                    (
                        StoreRequest::UpdateById { respond_to, .. },
                        Some(Expectation::UpdateById(r)),
                    ) => {
                        let _ = respond_to.send(r);
                    }
                    (
                        StoreRequest::UpdateMany { respond_to, .. },
                        Some(Expectation::UpdateMany(r)),
                    ) => {
                        let _ = respond_to.send(r);
                    }
                    (
                        StoreRequest::DeleteById { respond_to, .. },
                        Some(Expectation::DeleteById(r)),
                    ) => {
                        let _ = respond_to.send(r);
                    }
                    (StoreRequest::Populate { respond_to, .. }, Some(Expectation::Populate(r))) => {
                        let _ = respond_to.send(r);
                    }
                    (request, _) => {
                        panic!("Unexpected `{}` request or expectation mismatch", request.operation());
                    }
                }
            }
        });

        Self {
            client: StoreClient::new(sender),
            expectations,
            received,
            _handle: handle,
        }
    }

    /// Returns the client for use in tests.
    pub fn client(&self) -> StoreClient {
        self.client.clone()
    }

    fn builder<T>(&self, wrap: fn(Result<T, StorageError>) -> Expectation) -> ExpectationBuilder<T> {
        ExpectationBuilder {
            wrap,
            expectations: self.expectations.clone(),
        }
    }

    pub fn expect_find_one(&mut self) -> ExpectationBuilder<Option<Document>> {
        self.builder(Expectation::FindOne)
    }

    pub fn expect_find(&mut self) -> ExpectationBuilder<Vec<Document>> {
        self.builder(Expectation::Find)
    }

    pub fn expect_count(&mut self) -> ExpectationBuilder<usize> {
        self.builder(Expectation::Count)
    }

    pub fn expect_insert(&mut self) -> ExpectationBuilder<Document> {
        self.builder(Expectation::Insert)
    }

    pub fn expect_update_by_id(&mut self) -> ExpectationBuilder<Option<Document>> {
        self.builder(Expectation::UpdateById)
    }

    pub fn expect_update_many(&mut self) -> ExpectationBuilder<usize> {
        self.builder(Expectation::UpdateMany)
    }

    pub fn expect_delete_by_id(&mut self) -> ExpectationBuilder<bool> {
        self.builder(Expectation::DeleteById)
    }

    pub fn expect_populate(&mut self) -> ExpectationBuilder<Vec<Document>> {
        self.builder(Expectation::Populate)
    }

    /// Operation names of every request received so far, in order.
    pub fn received(&self) -> Vec<&'static str> {
        self.received.lock().map(|log| log.clone()).unwrap_or_default()
    }

    /// Verifies that all expectations were met.
    pub fn verify(&self) {
        let remaining = self.expectations.lock().map(|q| q.len()).unwrap_or(0);
        if remaining > 0 {
            panic!("Not all expectations were met. {} remaining", remaining);
        }
    }
}

/// Builder for a single expectation.
pub struct ExpectationBuilder<T> {
    wrap: fn(Result<T, StorageError>) -> Expectation,
    expectations: Queue,
}

impl<T> ExpectationBuilder<T> {
    /// Sets the expectation to return a successful result.
    pub fn return_ok(self, value: T) {
        self.push(Ok(value));
    }

    /// Sets the expectation to return an error.
    pub fn return_err(self, error: StorageError) {
        self.push(Err(error));
    }

    fn push(self, response: Result<T, StorageError>) {
        if let Ok(mut queue) = self.expectations.lock() {
            queue.push_back((self.wrap)(response));
        }
    }
}

/// Creates a store client and the receiver its requests arrive on.
///
/// Tests answer each request by hand through its `respond_to` channel.
pub fn create_mock_store(buffer_size: usize) -> (StoreClient, mpsc::Receiver<StoreRequest>) {
    let (sender, receiver) = mpsc::channel(buffer_size);
    (StoreClient::new(sender), receiver)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::Filter;
    use crate::store::Storage;

    #[tokio::test]
    async fn test_mock_store_with_expectations() {
        let mut mock = MockStore::new();
        mock.expect_count().return_ok(3);
        mock.expect_delete_by_id().return_err(StorageError::Rejected("disk full".into()));

        let store = mock.client();
        assert_eq!(store.count("users", &Filter::new()).await, Ok(3));
        let deleted = store.delete_by_id("users", &"u1".into()).await;
        assert_eq!(deleted, Err(StorageError::Rejected("disk full".into())));

        mock.verify();
        assert_eq!(mock.received(), vec!["count", "delete_by_id"]);
    }

    #[tokio::test]
    async fn test_raw_receiver() {
        let (store, mut receiver) = create_mock_store(4);
        let task = tokio::spawn(async move { store.count("users", &Filter::new()).await });

        match receiver.recv().await {
            Some(StoreRequest::Count {
                collection,
                respond_to,
                ..
            }) => {
                assert_eq!(collection, "users");
                respond_to.send(Ok(7)).unwrap();
            }
            other => panic!("Expected Count request, got {:?}", other.map(|r| r.operation())),
        }
        assert_eq!(task.await.unwrap(), Ok(7));
    }
}
