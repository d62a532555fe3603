//! # In-Memory Store Actor
//!
//! The [`StoreActor`] is the "server" half of the in-memory store. It owns every collection
//! and the receiver end of the request channel, and handles one request at a time.

use super::client::StoreClient;
use super::message::StoreRequest;
use crate::document::{Document, DocumentId, Fields, ID_FIELD};
use crate::query::{FindOptions, Filter, Reference};
use indexmap::IndexMap;
use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Insertion order of a collection is its natural order.
type Collection = IndexMap<DocumentId, Fields>;

/// An in-memory document store running in its own Tokio task.
///
/// **Concurrency Model**:
/// Requests are processed sequentially in [`StoreActor::run`], so the collections need no
/// `Mutex`. Concurrent callers interleave at request granularity: two writers of the same
/// field see last-write-wins, exactly like a document store without transactions.
///
/// Every inserted document gets `created` and `updated` timestamps (epoch milliseconds);
/// every patch refreshes `updated`.
pub struct StoreActor {
    receiver: mpsc::Receiver<StoreRequest>,
    collections: HashMap<String, Collection>,
}

impl StoreActor {
    /// Creates a new `StoreActor` and its associated `StoreClient`.
    ///
    /// `buffer_size` is the capacity of the request channel; when it is full, callers wait.
    pub fn new(buffer_size: usize) -> (Self, StoreClient) {
        let (sender, receiver) = mpsc::channel(buffer_size);
        let actor = Self {
            receiver,
            collections: HashMap::new(),
        };
        (actor, StoreClient::new(sender))
    }

    /// Runs the store's event loop until every client is dropped.
    pub async fn run(mut self) {
        info!("Store started");

        while let Some(msg) = self.receiver.recv().await {
            match msg {
                StoreRequest::FindOne {
                    collection,
                    filter,
                    projection,
                    respond_to,
                } => {
                    let found = self
                        .scan(&collection, &filter)
                        .next()
                        .map(|doc| project(doc, projection.as_deref(), None));
                    debug!(%collection, found = found.is_some(), "FindOne");
                    let _ = respond_to.send(Ok(found));
                }
                StoreRequest::Find {
                    collection,
                    filter,
                    options,
                    respond_to,
                } => {
                    let results = self.find(&collection, &filter, options);
                    debug!(%collection, count = results.len(), "Find");
                    let _ = respond_to.send(Ok(results));
                }
                StoreRequest::Count {
                    collection,
                    filter,
                    respond_to,
                } => {
                    let count = self.scan(&collection, &filter).count();
                    debug!(%collection, count, "Count");
                    let _ = respond_to.send(Ok(count));
                }
                StoreRequest::Insert {
                    collection,
                    mut fields,
                    respond_to,
                } => {
                    fields.remove(ID_FIELD);
                    let now = timestamp();
                    fields.entry("created").or_insert_with(|| now.clone());
                    fields.insert("updated".to_string(), now);
                    let id = DocumentId::generate();
                    let docs = self.collections.entry(collection.clone()).or_default();
                    docs.insert(id.clone(), fields.clone());
                    info!(%collection, %id, size = docs.len(), "Inserted");
                    let _ = respond_to.send(Ok(Document::new(collection, id, fields)));
                }
                StoreRequest::UpdateById {
                    collection,
                    id,
                    patch,
                    respond_to,
                } => {
                    let updated = self
                        .collections
                        .get_mut(&collection)
                        .and_then(|docs| docs.get_mut(&id))
                        .map(|fields| {
                            apply_patch(fields, patch);
                            fields.clone()
                        });
                    match &updated {
                        Some(_) => debug!(%collection, %id, "Updated"),
                        None => warn!(%collection, %id, "Update target not found"),
                    }
                    let _ = respond_to
                        .send(Ok(updated.map(|fields| Document::new(collection, id, fields))));
                }
                StoreRequest::UpdateMany {
                    collection,
                    filter,
                    patch,
                    respond_to,
                } => {
                    let mut changed = 0;
                    if let Some(docs) = self.collections.get_mut(&collection) {
                        for (id, fields) in docs.iter_mut() {
                            let doc = Document::new(collection.as_str(), id.clone(), fields.clone());
                            if filter.matches(&doc) {
                                apply_patch(fields, patch.clone());
                                changed += 1;
                            }
                        }
                    }
                    debug!(%collection, changed, "UpdateMany");
                    let _ = respond_to.send(Ok(changed));
                }
                StoreRequest::DeleteById {
                    collection,
                    id,
                    respond_to,
                } => {
                    let removed = self
                        .collections
                        .get_mut(&collection)
                        .and_then(|docs| docs.shift_remove(&id))
                        .is_some();
                    if removed {
                        info!(%collection, %id, "Deleted");
                    } else {
                        warn!(%collection, %id, "Delete target not found");
                    }
                    let _ = respond_to.send(Ok(removed));
                }
                StoreRequest::Populate {
                    documents,
                    references,
                    respond_to,
                } => {
                    let populated = documents
                        .into_iter()
                        .map(|doc| self.populate(doc, &references))
                        .collect();
                    let _ = respond_to.send(Ok(populated));
                }
            }
        }

        let size: usize = self.collections.values().map(IndexMap::len).sum();
        info!(collections = self.collections.len(), size, "Shutdown");
    }

    fn scan<'a>(
        &'a self,
        collection: &'a str,
        filter: &'a Filter,
    ) -> impl Iterator<Item = Document> + 'a {
        self.collections
            .get(collection)
            .into_iter()
            .flat_map(move |docs| {
                docs.iter()
                    .map(move |(id, fields)| Document::new(collection, id.clone(), fields.clone()))
            })
            .filter(move |doc| filter.matches(doc))
    }

    fn find(&self, collection: &str, filter: &Filter, options: FindOptions) -> Vec<Document> {
        let mut docs: Vec<Document> = self.scan(collection, filter).collect();

        if let Some(positions) = &options.positions {
            for doc in &mut docs {
                let position = positions.position_of(&doc.id);
                doc.fields
                    .insert(positions.field.clone(), Value::from(position));
            }
        }
        if let Some(sort) = &options.sort {
            // Stable: ties keep natural order.
            docs.sort_by(|a, b| sort.compare(a, b));
        }

        let virtual_field = options.positions.as_ref().map(|p| p.field.as_str());
        docs.into_iter()
            .skip(options.skip)
            .take(options.limit.unwrap_or(usize::MAX))
            .map(|doc| project(doc, options.projection.as_deref(), virtual_field))
            .collect()
    }

    fn lookup(&self, reference: &Reference, id: &DocumentId) -> Option<Value> {
        self.collections
            .get(&reference.collection)
            .and_then(|docs| docs.get(id))
            .map(|fields| {
                let mut doc = Document::new(&reference.collection, id.clone(), fields.clone());
                doc.strip(&reference.hidden);
                doc.export()
            })
    }

    /// Dangling ids degrade to `null` (or are dropped from arrays) instead of failing.
    fn populate(&self, mut doc: Document, references: &[Reference]) -> Document {
        for reference in references {
            let resolved = match doc.fields.get(&reference.field) {
                Some(Value::String(id)) => self
                    .lookup(reference, &DocumentId::from(id.as_str()))
                    .unwrap_or(Value::Null),
                Some(Value::Array(items)) => Value::Array(
                    items
                        .iter()
                        .filter_map(DocumentId::from_value)
                        .filter_map(|id| self.lookup(reference, &id))
                        .collect(),
                ),
                _ => continue,
            };
            doc.fields.insert(reference.field.clone(), resolved);
        }
        doc
    }
}

fn project(mut doc: Document, projection: Option<&[String]>, keep: Option<&str>) -> Document {
    if let Some(fields) = projection {
        doc.fields
            .retain(|key, _| fields.iter().any(|f| f == key) || Some(key.as_str()) == keep);
    }
    doc
}

fn apply_patch(fields: &mut Fields, patch: Fields) {
    for (key, value) in patch {
        if key != ID_FIELD {
            fields.insert(key, value);
        }
    }
    fields.insert("updated".to_string(), timestamp());
}

fn timestamp() -> Value {
    Value::from(chrono::Utc::now().timestamp_millis())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{Positions, Sort, SortDirection};
    use crate::store::Storage;
    use serde_json::json;

    fn fields(value: Value) -> Fields {
        match value {
            Value::Object(map) => map,
            _ => Fields::new(),
        }
    }

    fn spawn_store() -> StoreClient {
        let (actor, client) = StoreActor::new(16);
        tokio::spawn(actor.run());
        client
    }

    #[tokio::test]
    async fn test_store_crud() {
        let store = spawn_store();

        let doc = store
            .insert("users", fields(json!({ "username": "alice" })))
            .await
            .unwrap();
        assert!(doc.get("created").is_some());

        let found = store
            .find_one("users", &Filter::new().eq("username", "alice"), None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, doc.id);

        let updated = store
            .update_by_id("users", &doc.id, fields(json!({ "first_name": "Alice" })))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.get("first_name"), Some(&json!("Alice")));
        assert_eq!(updated.get("username"), Some(&json!("alice")));

        assert!(store.delete_by_id("users", &doc.id).await.unwrap());
        assert!(!store.delete_by_id("users", &doc.id).await.unwrap());
        assert_eq!(store.count("users", &Filter::new()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_update_missing_returns_none() {
        let store = spawn_store();
        let result = store
            .update_by_id("users", &DocumentId::from("nope"), Fields::new())
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_positions_sort_and_projection() {
        let store = spawn_store();
        let mut ids = Vec::new();
        for name in ["a", "b", "c"] {
            let doc = store
                .insert("things", fields(json!({ "name": name, "size": 1 })))
                .await
                .unwrap();
            ids.push(doc.id);
        }
        let order = vec![ids[2].clone(), ids[0].clone(), ids[1].clone()];
        let options = FindOptions {
            projection: Some(vec!["name".to_string()]),
            positions: Some(Positions {
                field: "order".to_string(),
                ids: order.clone(),
            }),
            sort: Some(Sort {
                field: "order".to_string(),
                direction: SortDirection::Asc,
            }),
            ..FindOptions::default()
        };
        let results = store.find("things", &Filter::new(), options).await.unwrap();
        let got: Vec<DocumentId> = results.iter().map(|d| d.id.clone()).collect();
        assert_eq!(got, order);
        assert_eq!(results[0].get("order"), Some(&json!(0)));
        assert!(results[0].get("size").is_none());
    }

    #[tokio::test]
    async fn test_populate_is_best_effort() {
        let store = spawn_store();
        let photo = store
            .insert("photos", fields(json!({ "caption": "beach" })))
            .await
            .unwrap();
        let user = store
            .insert(
                "users",
                fields(json!({
                    "primary_photo": photo.id.as_str(),
                    "photos": [photo.id.as_str(), "gone"],
                    "avatar": "gone",
                })),
            )
            .await
            .unwrap();
        let populated = store
            .populate(
                vec![user],
                &[
                    Reference::new("primary_photo", "photos"),
                    Reference::new("photos", "photos"),
                    Reference::new("avatar", "photos"),
                ],
            )
            .await
            .unwrap();
        let user = &populated[0];
        assert_eq!(user.get("primary_photo").unwrap()["caption"], json!("beach"));
        assert_eq!(user.get("photos").unwrap().as_array().unwrap().len(), 1);
        assert_eq!(user.get("avatar"), Some(&Value::Null));
    }

    #[tokio::test]
    async fn test_populate_hides_referenced_attributes() {
        let store = spawn_store();
        let owner = store
            .insert("users", fields(json!({ "username": "ana", "password": "x" })))
            .await
            .unwrap();
        let photo = store
            .insert("photos", fields(json!({ "owner": owner.id.as_str() })))
            .await
            .unwrap();

        let populated = store
            .populate(
                vec![photo],
                &[Reference::new("owner", "users").hiding(&["password".to_string()])],
            )
            .await
            .unwrap();
        let embedded = populated[0].get("owner").unwrap();
        assert_eq!(embedded["username"], json!("ana"));
        assert!(embedded.get("password").is_none());
    }

    #[tokio::test]
    async fn test_update_many() {
        let store = spawn_store();
        for primary in [true, true, false] {
            store
                .insert("photos", fields(json!({ "primary": primary })))
                .await
                .unwrap();
        }
        let changed = store
            .update_many(
                "photos",
                &Filter::new().eq("primary", true),
                fields(json!({ "primary": false })),
            )
            .await
            .unwrap();
        assert_eq!(changed, 2);
        let remaining = store
            .count("photos", &Filter::new().eq("primary", true))
            .await
            .unwrap();
        assert_eq!(remaining, 0);
    }

    #[tokio::test]
    async fn test_closed_store() {
        let (actor, client) = StoreActor::new(1);
        drop(actor);
        let result = client.count("users", &Filter::new()).await;
        assert_eq!(result, Err(crate::error::StorageError::Closed));
    }
}
