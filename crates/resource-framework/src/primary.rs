//! # Primary Invariant
//!
//! Children referenced by a parent's ordered id list carry a `primary` flag. After every
//! mutation settles, exactly one referenced child is primary whenever the list is non-empty,
//! and by default that is the first id in the list. Primary-ness is scoped to the parent: only
//! members referenced by that parent's list are considered or touched.
//!
//! [`PrimaryInvariant::reconcile`] restores this from any state, including one left behind by a
//! previous reconcile that failed half way, so a failed call can simply be retried.

use crate::document::{Document, DocumentId, Fields, PRIMARY_FIELD};
use crate::error::{FrameworkError, StorageError};
use crate::id_list::{OrderedIdList, PERSISTENCE_ERROR};
use crate::query::{FindOptions, Filter};
use crate::resource::ChildLink;
use crate::store::Storage;
use serde_json::Value;
use std::collections::HashMap;
use tracing::{debug, info, warn};

pub struct PrimaryInvariant<'a> {
    storage: &'a dyn Storage,
    /// Collection holding the children.
    collection: &'a str,
    link: &'a ChildLink,
}

impl<'a> PrimaryInvariant<'a> {
    pub fn new(storage: &'a dyn Storage, collection: &'a str, link: &'a ChildLink) -> Self {
        Self {
            storage,
            collection,
            link,
        }
    }

    /// Re-establishes a single primary member under `parent` and returns its id.
    ///
    /// `changed` names the child the current request touched; when it is flagged primary it
    /// wins over any previously primary sibling.
    pub async fn reconcile(
        &self,
        parent: &Document,
        changed: Option<&DocumentId>,
    ) -> Result<Option<DocumentId>, FrameworkError> {
        let members = self.members(parent).await.map_err(persistence)?;

        let mut current = None;
        let mut index = None;
        for (position, member) in members.iter().enumerate() {
            if current.is_none() && member.is_primary() {
                current = Some(position);
            }
            if changed == Some(&member.id) {
                index = Some(position);
            }
        }

        let keep = match index {
            Some(index) if members[index].is_primary() => Some(index),
            _ if current.is_none() && !members.is_empty() => {
                self.flag(&members[0].id).await?;
                Some(0)
            }
            _ => current,
        };
        let keep = keep.map(|position| members[position].id.clone());

        let others: Vec<DocumentId> = members
            .iter()
            .map(|member| member.id.clone())
            .filter(|id| Some(id) != keep.as_ref())
            .collect();
        if !others.is_empty() {
            let mut patch = Fields::new();
            patch.insert(PRIMARY_FIELD.to_string(), Value::Bool(false));
            let filter = Filter::id_in(others).eq(PRIMARY_FIELD, true);
            let cleared = self
                .storage
                .update_many(self.collection, &filter, patch)
                .await
                .map_err(persistence_of)?;
            debug!(parent = %parent.id, cleared, "Cleared primary flags");
        }

        if let Some(mirror) = &self.link.primary_mirror_field {
            self.mirror(parent, mirror, keep.as_ref()).await?;
        }

        info!(parent = %parent.id, primary = ?keep.as_ref().map(DocumentId::as_str), "Primary reconciled");
        Ok(keep)
    }

    /// Members referenced by the parent, in list order.
    async fn members(&self, parent: &Document) -> Result<Vec<Document>, FrameworkError> {
        let ids = OrderedIdList::new(self.storage, &self.link.parent_field)
            .list(parent)
            .await?;
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let found = self
            .storage
            .find(self.collection, &Filter::id_in(ids.clone()), FindOptions::default())
            .await?;
        let mut by_id: HashMap<DocumentId, Document> =
            found.into_iter().map(|doc| (doc.id.clone(), doc)).collect();
        Ok(ids.iter().filter_map(|id| by_id.remove(id)).collect())
    }

    async fn flag(&self, id: &DocumentId) -> Result<(), FrameworkError> {
        let mut patch = Fields::new();
        patch.insert(PRIMARY_FIELD.to_string(), Value::Bool(true));
        match self.storage.update_by_id(self.collection, id, patch).await {
            Ok(Some(_)) => Ok(()),
            Ok(None) => Err(FrameworkError::persistence(PERSISTENCE_ERROR, None)),
            Err(e) => {
                warn!(id = %id, error = %e, "Failed to promote primary");
                Err(FrameworkError::persistence(PERSISTENCE_ERROR, Some(e)))
            }
        }
    }

    async fn mirror(
        &self,
        parent: &Document,
        field: &str,
        primary: Option<&DocumentId>,
    ) -> Result<(), FrameworkError> {
        let mut patch = Fields::new();
        patch.insert(
            field.to_string(),
            primary.map(DocumentId::to_value).unwrap_or(Value::Null),
        );
        match self
            .storage
            .update_by_id(&parent.collection, &parent.id, patch)
            .await
        {
            Ok(Some(_)) => Ok(()),
            Ok(None) => Err(FrameworkError::persistence(PERSISTENCE_ERROR, None)),
            Err(e) => {
                warn!(parent = %parent.id, field, error = %e, "Failed to mirror primary");
                Err(FrameworkError::persistence(PERSISTENCE_ERROR, Some(e)))
            }
        }
    }
}

fn persistence(error: FrameworkError) -> FrameworkError {
    match error {
        FrameworkError::Storage(source) => persistence_of(source),
        other => other,
    }
}

fn persistence_of(source: StorageError) -> FrameworkError {
    FrameworkError::persistence(PERSISTENCE_ERROR, Some(source))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockStore;
    use crate::store::{StoreActor, StoreClient};
    use serde_json::json;

    fn link() -> ChildLink {
        ChildLink::new("addresses").mirror("primary_address")
    }

    fn spawn_store() -> StoreClient {
        let (actor, client) = StoreActor::new(16);
        tokio::spawn(actor.run());
        client
    }

    /// A parent whose list holds three fresh children, none primary.
    async fn family(store: &StoreClient) -> (Document, Vec<DocumentId>) {
        let parent = store.insert("users", Fields::new()).await.unwrap();
        let mut ids = Vec::new();
        for label in ["a", "b", "c"] {
            let mut fields = Fields::new();
            fields.insert("label".into(), json!(label));
            ids.push(store.insert("addresses", fields).await.unwrap().id);
        }
        OrderedIdList::new(store, "addresses")
            .set(&parent, &ids)
            .await
            .unwrap();
        (parent, ids)
    }

    async fn primaries(store: &StoreClient) -> Vec<DocumentId> {
        store
            .find(
                "addresses",
                &Filter::new().eq(PRIMARY_FIELD, true),
                FindOptions::default(),
            )
            .await
            .unwrap()
            .into_iter()
            .map(|doc| doc.id)
            .collect()
    }

    async fn mirrored(store: &StoreClient, parent: &Document) -> Option<Value> {
        store
            .find_one("users", &Filter::by_id(parent.id.clone()), None)
            .await
            .unwrap()
            .and_then(|doc| doc.get("primary_address").cloned())
    }

    #[tokio::test]
    async fn test_first_member_promoted_by_default() {
        let store = spawn_store();
        let (parent, ids) = family(&store).await;
        let link = link();
        let invariant = PrimaryInvariant::new(&store, "addresses", &link);

        let primary = invariant.reconcile(&parent, None).await.unwrap();
        assert_eq!(primary, Some(ids[0].clone()));
        assert_eq!(primaries(&store).await, vec![ids[0].clone()]);
        assert_eq!(mirrored(&store, &parent).await, Some(ids[0].to_value()));
    }

    #[tokio::test]
    async fn test_removing_primary_promotes_next() {
        let store = spawn_store();
        let (parent, ids) = family(&store).await;
        let link = link();
        let invariant = PrimaryInvariant::new(&store, "addresses", &link);
        invariant.reconcile(&parent, None).await.unwrap();

        store.delete_by_id("addresses", &ids[0]).await.unwrap();
        OrderedIdList::new(&store, "addresses")
            .set(&parent, &ids[1..])
            .await
            .unwrap();

        let primary = invariant.reconcile(&parent, None).await.unwrap();
        assert_eq!(primary, Some(ids[1].clone()));
        assert_eq!(primaries(&store).await, vec![ids[1].clone()]);
    }

    #[tokio::test]
    async fn test_changed_primary_wins() {
        let store = spawn_store();
        let (parent, ids) = family(&store).await;
        let link = link();
        let invariant = PrimaryInvariant::new(&store, "addresses", &link);
        invariant.reconcile(&parent, None).await.unwrap();

        let mut patch = Fields::new();
        patch.insert(PRIMARY_FIELD.into(), json!(true));
        store.update_by_id("addresses", &ids[2], patch).await.unwrap();

        let primary = invariant.reconcile(&parent, Some(&ids[2])).await.unwrap();
        assert_eq!(primary, Some(ids[2].clone()));
        assert_eq!(primaries(&store).await, vec![ids[2].clone()]);
        assert_eq!(mirrored(&store, &parent).await, Some(ids[2].to_value()));

        // Idempotent from the settled state.
        let again = invariant.reconcile(&parent, None).await.unwrap();
        assert_eq!(again, Some(ids[2].clone()));
        assert_eq!(primaries(&store).await, vec![ids[2].clone()]);
    }

    #[tokio::test]
    async fn test_primary_scoped_to_parent() {
        let store = spawn_store();
        let (parent, ids) = family(&store).await;
        let (_, foreign) = family(&store).await;
        let mut patch = Fields::new();
        patch.insert(PRIMARY_FIELD.into(), json!(true));
        store
            .update_by_id("addresses", &foreign[1], patch)
            .await
            .unwrap();

        let link = link();
        let invariant = PrimaryInvariant::new(&store, "addresses", &link);
        let primary = invariant.reconcile(&parent, None).await.unwrap();

        assert_eq!(primary, Some(ids[0].clone()));
        let flagged = primaries(&store).await;
        assert!(flagged.contains(&ids[0]));
        assert!(flagged.contains(&foreign[1]));
    }

    #[tokio::test]
    async fn test_empty_list_clears_mirror() {
        let store = spawn_store();
        let mut fields = Fields::new();
        fields.insert("primary_address".into(), json!("stale"));
        let parent = store.insert("users", fields).await.unwrap();

        let link = link();
        let invariant = PrimaryInvariant::new(&store, "addresses", &link);
        assert_eq!(invariant.reconcile(&parent, None).await.unwrap(), None);
        assert_eq!(mirrored(&store, &parent).await, Some(Value::Null));
    }

    #[tokio::test]
    async fn test_storage_failure_is_persistence_error() {
        let mut mock = MockStore::new();
        mock.expect_find_one()
            .return_err(StorageError::Rejected("offline".into()));

        let store = mock.client();
        let parent = Document::new("users", "u1".into(), Fields::new());
        let link = link();
        let err = PrimaryInvariant::new(&store, "addresses", &link)
            .reconcile(&parent, None)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            FrameworkError::Persistence { ref code, source: Some(_) } if code == PERSISTENCE_ERROR
        ));
        mock.verify();
    }

    #[tokio::test]
    async fn test_failed_mirror_after_clear_converges_on_retry() {
        let flagged = |id: &str| {
            let mut fields = Fields::new();
            fields.insert(PRIMARY_FIELD.into(), json!(true));
            Document::new("addresses", id.into(), fields)
        };
        let mut parent_fields = Fields::new();
        parent_fields.insert("addresses".into(), json!(["a", "b"]));
        let parent = Document::new("users", "u1".into(), parent_fields);

        let mut mock = MockStore::new();
        mock.expect_find_one().return_ok(Some(parent.clone()));
        mock.expect_find().return_ok(vec![flagged("a"), flagged("b")]);
        mock.expect_update_many().return_ok(1);
        mock.expect_update_by_id()
            .return_err(StorageError::Rejected("parent locked".into()));

        let store = mock.client();
        let link = link();
        let err = PrimaryInvariant::new(&store, "addresses", &link)
            .reconcile(&parent, Some(&"b".into()))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            FrameworkError::Persistence { ref code, source: Some(_) } if code == PERSISTENCE_ERROR
        ));
        assert_eq!(
            mock.received(),
            vec!["find_one", "find", "update_many", "update_by_id"]
        );
        mock.verify();

        // The same half-applied state on a live store: the old primary is cleared, the newly
        // flagged one is set, and the mirror still names the old primary.
        let store = spawn_store();
        let (parent, ids) = family(&store).await;
        let invariant = PrimaryInvariant::new(&store, "addresses", &link);
        invariant.reconcile(&parent, None).await.unwrap();
        for (id, primary) in [(&ids[0], false), (&ids[2], true)] {
            let mut patch = Fields::new();
            patch.insert(PRIMARY_FIELD.into(), json!(primary));
            store.update_by_id("addresses", id, patch).await.unwrap();
        }
        assert_eq!(mirrored(&store, &parent).await, Some(ids[0].to_value()));

        let primary = invariant.reconcile(&parent, Some(&ids[2])).await.unwrap();
        assert_eq!(primary, Some(ids[2].clone()));
        assert_eq!(primaries(&store).await, vec![ids[2].clone()]);
        assert_eq!(mirrored(&store, &parent).await, Some(ids[2].to_value()));
    }
}
