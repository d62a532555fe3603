//! # Controller
//!
//! The generic CRUD operation set of one resource. A `Controller` wraps a
//! [`ResourceSpec`] and implements list, fetch-one, create, update and delete on top of the
//! storage collaborator, the [`Navigator`], the [`OrderedIdList`] and the
//! [`PrimaryInvariant`].
//!
//! Mutations are strictly sequential pipelines; the first failing step short-circuits the rest:
//!
//! ```text
//! create: whitelist -> data -> validate -> before -> insert -> id list -> reconcile -> after -> reload
//! update: whitelist -> data -> validate -> before -> update -> reconcile -> after -> reload
//! delete: id list -> reconcile -> before -> delete -> after
//! ```

use crate::config::NavigatorConfig;
use crate::document::{Document, DocumentId, Fields, ID_FIELD};
use crate::error::FrameworkError;
use crate::hooks::Hooks;
use crate::id_list::{appended, removed, OrderedIdList};
use crate::navigator::{Navigator, Page};
use crate::primary::PrimaryInvariant;
use crate::query::{Filter, Reference};
use crate::resource::{
    Action, Attributes, Binding, FieldAction, Handler, Parent, Request, ResourceSpec, Target, Verb,
};
use crate::schema::{ValidationMode, Validator};
use crate::store::Storage;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

pub const FAILED_TO_CREATE: &str = "FAILED_TO_CREATE";
pub const FAILED_TO_UPDATE: &str = "FAILED_TO_UPDATE";
pub const FAILED_TO_DELETE: &str = "FAILED_TO_DELETE";

pub struct Controller {
    name: String,
    spec: Arc<dyn ResourceSpec>,
    attributes: Attributes,
    storage: Arc<dyn Storage>,
    validator: Arc<dyn Validator>,
    bindings: HashMap<String, Binding>,
    routes: HashMap<(Verb, String), Arc<dyn Handler>>,
    navigator: NavigatorConfig,
    hooks: Arc<Hooks>,
    /// Excluded attributes of other resources, by collection.
    hidden: HashMap<String, Vec<String>>,
}

impl Controller {
    /// Builds the controller and freezes the resource's binding and route tables.
    pub fn new(
        name: impl Into<String>,
        spec: Arc<dyn ResourceSpec>,
        storage: Arc<dyn Storage>,
        navigator: NavigatorConfig,
        hooks: Arc<Hooks>,
    ) -> Self {
        let bindings = spec.context().into_iter().collect();
        let routes = spec
            .routes()
            .into_iter()
            .map(|route| ((route.verb, route.name), route.handler))
            .collect();
        Self {
            name: name.into(),
            attributes: spec.attributes(),
            validator: spec.validator(),
            spec,
            storage,
            bindings,
            routes,
            navigator,
            hooks,
            hidden: HashMap::new(),
        }
    }

    /// Registers the excluded attributes of the resources this one may populate from.
    pub fn hide_referenced(&mut self, hidden: HashMap<String, Vec<String>>) {
        self.hidden = hidden;
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    pub fn spec(&self) -> &dyn ResourceSpec {
        self.spec.as_ref()
    }

    pub fn storage(&self) -> &dyn Storage {
        self.storage.as_ref()
    }

    pub fn binding(&self, segment: &str) -> Option<&Binding> {
        self.bindings.get(segment)
    }

    pub fn literal(&self, verb: Verb, name: &str) -> Option<&Arc<dyn Handler>> {
        self.routes.get(&(verb, name.to_string()))
    }

    /// Exported form: excluded attributes removed.
    pub fn export(&self, mut document: Document) -> Document {
        document.strip(&self.attributes.excluded);
        document
    }

    /// Ids in `parent`'s child list for this resource, or `None` when the resource is not a
    /// child collection.
    pub async fn member_ids(
        &self,
        parent: &Document,
    ) -> Result<Option<Vec<DocumentId>>, FrameworkError> {
        match &self.attributes.child_link {
            Some(link) => Ok(Some(
                OrderedIdList::new(self.storage(), &link.parent_field)
                    .list(parent)
                    .await?,
            )),
            None => Ok(None),
        }
    }

    /// Lists documents. Under a live parent, only its members are listed, in list order.
    #[instrument(skip_all, fields(resource = %self.name))]
    pub async fn list(
        &self,
        req: &Request,
        parent: Option<&Parent>,
    ) -> Result<Page, FrameworkError> {
        let mut filter = self
            .spec
            .filters(req, Target::Multiple, self.storage())
            .await?;
        let mut order = None;
        if let Some(parent) = parent.and_then(Parent::document) {
            if let Some(ids) = self.member_ids(parent).await? {
                filter = filter.and_ids(ids.clone());
                order = Some(ids);
            }
        }
        debug!(?filter, query = ?req.query, "List");

        let mut page = Navigator::new(
            self.storage(),
            &self.attributes.collection,
            &req.query,
            self.navigator,
        )
        .fields(self.spec.fields(req, FieldAction::Select, Some(Target::Multiple)))
        .order(order)
        .populate(self.references(req, Target::Multiple))
        .sort(
            self.spec
                .fields(req, FieldAction::Sort, None)
                .unwrap_or_default(),
        )
        .exec(filter)
        .await?;

        page.results = page
            .results
            .into_iter()
            .map(|doc| self.export(doc))
            .collect();
        Ok(page)
    }

    /// Resolves one document and checks the acting identity may apply `verb` to it.
    ///
    /// `filter` defaults to the resource's single-document filter.
    #[instrument(skip(self, req, filter), fields(resource = %self.name))]
    pub async fn fetch_one(
        &self,
        req: &Request,
        verb: Verb,
        target: Target,
        filter: Option<Filter>,
    ) -> Result<Document, FrameworkError> {
        let filter = match filter {
            Some(filter) => filter,
            None => {
                self.spec
                    .filters(req, Target::Single, self.storage())
                    .await?
            }
        };
        let select = self.spec.fields(req, FieldAction::Select, Some(target));
        debug!(?filter, ?select, "Fetch one");

        let Some(document) = self
            .storage
            .find_one(&self.attributes.collection, &filter, select.as_deref())
            .await?
        else {
            warn!(code = %self.attributes.not_found_code, "Not found");
            return Err(FrameworkError::not_found(&self.attributes.not_found_code));
        };

        if let Some(check) = self.spec.permission() {
            if !check.has_permission(&document, req.identity.as_ref(), verb) {
                warn!(id = %document.id, %verb, "Permission denied");
                return Err(FrameworkError::PermissionDenied {
                    code: self.attributes.permission_denied_code.clone(),
                });
            }
        }

        let references = self.references(req, target);
        if references.is_empty() {
            return Ok(document);
        }
        match self.storage.populate(vec![document.clone()], &references).await {
            Ok(mut populated) if populated.len() == 1 => Ok(populated.remove(0)),
            Ok(_) => Ok(document),
            Err(e) => {
                warn!(id = %document.id, error = %e, "Population failed, returning unpopulated document");
                Ok(document)
            }
        }
    }

    #[instrument(skip_all, fields(resource = %self.name))]
    pub async fn create(
        &self,
        req: &Request,
        parent: Option<&Parent>,
    ) -> Result<Document, FrameworkError> {
        let body = pick(
            req.body_fields(),
            self.spec.fields(req, FieldAction::Create, None),
        );
        let mut data = self.spec.data(req, Verb::Post, parent, body);
        self.validate(ValidationMode::Create, &mut data)?;
        debug!(?data, "Create");

        let parent = parent.and_then(Parent::document);
        self.fire(Action::Create, "before", parent.map(|p| &p.id), &data)
            .await?;
        let data = self.spec.before(req, Action::Create, parent, data).await?;

        let created = self
            .storage
            .insert(&self.attributes.collection, data)
            .await
            .map_err(|e| {
                warn!(error = %e, "Create failed");
                FrameworkError::persistence(FAILED_TO_CREATE, Some(e))
            })?;
        info!(collection = %self.attributes.collection, id = %created.id, "Created");

        if let Some(parent) = parent {
            self.link(parent, &created.id).await?;
            self.reconcile(parent, Some(&created.id)).await?;
        }

        self.spec.after(req, Action::Create, &created).await?;
        self.fire(Action::Create, "after", Some(&created.id), &created.fields)
            .await?;
        self.reload(req, &created.id).await
    }

    #[instrument(skip_all, fields(resource = %self.name, id = %document.id))]
    pub async fn update(
        &self,
        req: &Request,
        document: Document,
        parent: Option<&Parent>,
    ) -> Result<Document, FrameworkError> {
        let body = pick(
            req.body_fields(),
            self.spec.fields(req, FieldAction::Update, None),
        );
        let mut data = self.spec.data(req, Verb::Put, parent, body);
        self.validate(ValidationMode::Update, &mut data)?;
        debug!(?data, "Update");

        self.fire(Action::Update, "before", Some(&document.id), &data)
            .await?;
        let data = self
            .spec
            .before(req, Action::Update, Some(&document), data)
            .await?;

        let updated = match self
            .storage
            .update_by_id(&self.attributes.collection, &document.id, data)
            .await
        {
            Ok(Some(updated)) => updated,
            Ok(None) => {
                warn!("Update target vanished");
                return Err(FrameworkError::persistence(FAILED_TO_UPDATE, None));
            }
            Err(e) => {
                warn!(error = %e, "Update failed");
                return Err(FrameworkError::persistence(FAILED_TO_UPDATE, Some(e)));
            }
        };
        info!(collection = %self.attributes.collection, "Updated");

        if let Some(parent) = parent.and_then(Parent::document) {
            self.reconcile(parent, Some(&updated.id)).await?;
        }

        self.spec.after(req, Action::Update, &updated).await?;
        self.fire(Action::Update, "after", Some(&updated.id), &updated.fields)
            .await?;
        self.reload(req, &updated.id).await
    }

    #[instrument(skip_all, fields(resource = %self.name, id = %document.id))]
    pub async fn delete(
        &self,
        req: &Request,
        document: Document,
        parent: Option<&Parent>,
    ) -> Result<(), FrameworkError> {
        if let Some(parent) = parent.and_then(Parent::document) {
            self.unlink(parent, &document.id).await?;
            self.reconcile(parent, None).await?;
        }

        self.fire(Action::Delete, "before", Some(&document.id), &document.fields)
            .await?;
        self.spec
            .before(req, Action::Delete, Some(&document), Fields::new())
            .await?;

        match self
            .storage
            .delete_by_id(&self.attributes.collection, &document.id)
            .await
        {
            Ok(true) => {}
            Ok(false) => {
                warn!("Delete target vanished");
                return Err(FrameworkError::persistence(FAILED_TO_DELETE, None));
            }
            Err(e) => {
                warn!(error = %e, "Delete failed");
                return Err(FrameworkError::persistence(FAILED_TO_DELETE, Some(e)));
            }
        }
        info!(collection = %self.attributes.collection, "Deleted");

        self.spec.after(req, Action::Delete, &document).await?;
        self.fire(Action::Delete, "after", Some(&document.id), &document.fields)
            .await
    }

    /// Re-reads the canonical exported form of `id`.
    pub async fn reload(&self, req: &Request, id: &DocumentId) -> Result<Document, FrameworkError> {
        let document = self
            .fetch_one(req, Verb::Get, Target::All, Some(Filter::by_id(id.clone())))
            .await?;
        Ok(self.export(document))
    }

    fn validate(&self, mode: ValidationMode, data: &mut Fields) -> Result<(), FrameworkError> {
        data.remove(ID_FIELD);
        let errors = self.validator.validate(mode, data);
        if errors.is_empty() {
            Ok(())
        } else {
            warn!(errors = errors.len(), "Validation failed");
            Err(FrameworkError::ValidationFailed(errors))
        }
    }

    /// References named by the populate allow-list. No allow-list populates nothing.
    fn references(&self, req: &Request, target: Target) -> Vec<Reference> {
        let Some(names) = self.spec.fields(req, FieldAction::Populate, Some(target)) else {
            return Vec::new();
        };
        self.attributes
            .references
            .iter()
            .filter(|reference| names.contains(&reference.field))
            .map(|reference| match self.hidden.get(&reference.collection) {
                Some(hidden) => reference.clone().hiding(hidden),
                None => reference.clone(),
            })
            .collect()
    }

    async fn link(&self, parent: &Document, id: &DocumentId) -> Result<(), FrameworkError> {
        if let Some(link) = &self.attributes.child_link {
            let list = OrderedIdList::new(self.storage(), &link.parent_field);
            let ids = appended(list.list(parent).await?, id);
            list.set(parent, &ids).await?;
        }
        Ok(())
    }

    async fn unlink(&self, parent: &Document, id: &DocumentId) -> Result<(), FrameworkError> {
        if let Some(link) = &self.attributes.child_link {
            let list = OrderedIdList::new(self.storage(), &link.parent_field);
            let ids = removed(list.list(parent).await?, id);
            list.set(parent, &ids).await?;
        }
        Ok(())
    }

    async fn reconcile(
        &self,
        parent: &Document,
        changed: Option<&DocumentId>,
    ) -> Result<(), FrameworkError> {
        if !self.attributes.tracks_primary {
            return Ok(());
        }
        if let Some(link) = &self.attributes.child_link {
            PrimaryInvariant::new(self.storage(), &self.attributes.collection, link)
                .reconcile(parent, changed)
                .await?;
        }
        Ok(())
    }

    /// Fires `<resource>-<action>-<stage>`.
    async fn fire(
        &self,
        action: Action,
        stage: &str,
        id: Option<&DocumentId>,
        data: &Fields,
    ) -> Result<(), FrameworkError> {
        let name = format!("{}-{}-{}", self.name, action, stage);
        if !self.hooks.is_registered(&name) {
            return Ok(());
        }
        let args = json!({
            "resource": self.name,
            "id": id.map(DocumentId::to_value).unwrap_or(Value::Null),
            "data": Value::Object(data.clone()),
        });
        self.hooks.run(&name, &args).await
    }
}

/// Keeps only the allowed keys; no allow-list keeps nothing.
fn pick(mut body: Fields, allowed: Option<Vec<String>>) -> Fields {
    let allowed = allowed.unwrap_or_default();
    body.retain(|key, _| allowed.contains(key));
    body
}
