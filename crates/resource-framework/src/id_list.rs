//! # Ordered Id List
//!
//! A parent document keeps its children as an ordered array of ids in one field. List order is
//! meaningful: it is the default browsing order of the children and decides which child
//! becomes primary by default.
//!
//! [`OrderedIdList`] only reads and overwrites that field. Deduplication and membership rules
//! live with the caller; [`appended`] and [`removed`] are the helpers the CRUD operations use.

use crate::document::{Document, DocumentId, Fields};
use crate::error::FrameworkError;
use crate::query::Filter;
use crate::store::Storage;
use serde_json::Value;
use tracing::{debug, warn};

pub const PERSISTENCE_ERROR: &str = "PERSISTENCE_ERROR";

pub struct OrderedIdList<'a> {
    storage: &'a dyn Storage,
    field: &'a str,
}

impl<'a> OrderedIdList<'a> {
    pub fn new(storage: &'a dyn Storage, field: &'a str) -> Self {
        Self { storage, field }
    }

    /// Current ids, read from storage so earlier writes in the same request are visible.
    ///
    /// A parent that no longer exists reads as an empty list.
    pub async fn list(&self, parent: &Document) -> Result<Vec<DocumentId>, FrameworkError> {
        let projection = [self.field.to_string()];
        let stored = self
            .storage
            .find_one(
                &parent.collection,
                &Filter::by_id(parent.id.clone()),
                Some(&projection[..]),
            )
            .await?;
        Ok(stored.map(|doc| doc.id_list(self.field)).unwrap_or_default())
    }

    /// Overwrites the list and returns the updated parent.
    pub async fn set(
        &self,
        parent: &Document,
        ids: &[DocumentId],
    ) -> Result<Document, FrameworkError> {
        debug!(parent = %parent.id, field = self.field, ?ids, "Set id list");
        let mut patch = Fields::new();
        patch.insert(
            self.field.to_string(),
            Value::Array(ids.iter().map(DocumentId::to_value).collect()),
        );

        match self
            .storage
            .update_by_id(&parent.collection, &parent.id, patch)
            .await
        {
            Ok(Some(updated)) => Ok(updated),
            Ok(None) => {
                warn!(parent = %parent.id, "Parent vanished while setting id list");
                Err(FrameworkError::persistence(PERSISTENCE_ERROR, None))
            }
            Err(e) => {
                warn!(parent = %parent.id, error = %e, "Failed to set id list");
                Err(FrameworkError::persistence(PERSISTENCE_ERROR, Some(e)))
            }
        }
    }
}

/// `ids` with `id` at the end, unless it is already present.
pub fn appended(mut ids: Vec<DocumentId>, id: &DocumentId) -> Vec<DocumentId> {
    if !ids.contains(id) {
        ids.push(id.clone());
    }
    ids
}

/// `ids` without any occurrence of `id`.
pub fn removed(mut ids: Vec<DocumentId>, id: &DocumentId) -> Vec<DocumentId> {
    ids.retain(|candidate| candidate != id);
    ids
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StorageError;
    use crate::mock::MockStore;
    use crate::store::StoreActor;
    use serde_json::json;

    fn ids(raw: &[&str]) -> Vec<DocumentId> {
        raw.iter().map(|id| DocumentId::from(*id)).collect()
    }

    #[tokio::test]
    async fn test_list_and_set() {
        let (actor, store) = StoreActor::new(8);
        tokio::spawn(actor.run());

        let mut fields = Fields::new();
        fields.insert("name".into(), json!("alice"));
        let parent = store.insert("users", fields).await.unwrap();
        let list = OrderedIdList::new(&store, "addresses");

        assert!(list.list(&parent).await.unwrap().is_empty());

        let updated = list.set(&parent, &ids(&["b", "a"])).await.unwrap();
        assert_eq!(updated.id_list("addresses"), ids(&["b", "a"]));
        assert_eq!(updated.get("name"), Some(&json!("alice")));
        assert_eq!(list.list(&parent).await.unwrap(), ids(&["b", "a"]));
    }

    #[tokio::test]
    async fn test_set_failure_is_persistence_error() {
        let mut mock = MockStore::new();
        mock.expect_update_by_id()
            .return_err(StorageError::Rejected("read only".into()));
        mock.expect_update_by_id().return_ok(None);

        let store = mock.client();
        let parent = Document::new("users", "u1".into(), Fields::new());
        let list = OrderedIdList::new(&store, "addresses");

        let err = list.set(&parent, &ids(&["a"])).await.unwrap_err();
        assert!(matches!(
            err,
            FrameworkError::Persistence { ref code, source: Some(_) } if code == PERSISTENCE_ERROR
        ));
        let err = list.set(&parent, &ids(&["a"])).await.unwrap_err();
        assert!(matches!(err, FrameworkError::Persistence { source: None, .. }));
        mock.verify();
    }

    #[test]
    fn test_append_and_remove() {
        assert_eq!(appended(ids(&["a"]), &"b".into()), ids(&["a", "b"]));
        assert_eq!(appended(ids(&["a", "b"]), &"a".into()), ids(&["a", "b"]));
        assert_eq!(removed(ids(&["a", "b", "a"]), &"a".into()), ids(&["b"]));
    }
}
