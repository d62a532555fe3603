//! # ResourceSpec Trait
//!
//! The `ResourceSpec` trait is the contract every concrete resource (users, addresses,
//! photos, ...) implements to be served by the generic [`Controller`](crate::controller::Controller).
//! The engine holds an `Arc<dyn ResourceSpec>` and never a concrete type, so the dispatch and
//! CRUD logic is written once and reused for every resource.
//!
//! # Provided Methods (Extension Points)
//! Only [`ResourceSpec::attributes`] is required. Every other method has a default:
//! - [`ResourceSpec::context`] / [`ResourceSpec::routes`]: no bindings, no literal routes
//! - [`ResourceSpec::fields`]: no allow-list (every field is selected; nothing is creatable,
//!   updatable, populated or sortable)
//! - [`ResourceSpec::filters`]: select by the `id_param` context value for single lookups,
//!   `NotFound` when it is unbound
//! - [`ResourceSpec::data`]: the whitelisted body, unchanged
//! - [`ResourceSpec::before`] / [`ResourceSpec::after`]: pass-through
//! - [`ResourceSpec::validator`]: [`AcceptAll`](crate::schema::AcceptAll)
//! - [`ResourceSpec::permission`]: none

use crate::api::Api;
use crate::controller::Controller;
use crate::document::{Document, DocumentId, Fields};
use crate::error::FrameworkError;
use crate::navigator::Page;
use crate::query::{Filter, QueryParams, Reference};
use crate::schema::{AcceptAll, Validator};
use crate::store::Storage;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::fmt::{self, Display};
use std::str::FromStr;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verb {
    Get,
    Post,
    Put,
    Delete,
}

impl Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Verb::Get => "get",
            Verb::Post => "post",
            Verb::Put => "put",
            Verb::Delete => "delete",
        })
    }
}

impl FromStr for Verb {
    type Err = FrameworkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "get" => Ok(Verb::Get),
            "post" => Ok(Verb::Post),
            "put" => Ok(Verb::Put),
            "delete" | "del" => Ok(Verb::Delete),
            _ => Err(FrameworkError::MethodNotAllowed),
        }
    }
}

/// Path parameters bound for one request, keyed without the leading `:`.
pub type Context = HashMap<String, String>;

/// The acting user, as established by the authentication layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: DocumentId,
    #[serde(default)]
    pub roles: Vec<String>,
}

impl Identity {
    pub fn new(user_id: impl Into<DocumentId>) -> Self {
        Self {
            user_id: user_id.into(),
            roles: Vec::new(),
        }
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.roles.push(role.into());
        self
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }
}

/// Everything a request carries into dispatch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Request {
    pub context: Context,
    pub query: QueryParams,
    pub body: Option<Value>,
    pub identity: Option<Identity>,
}

impl Request {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_identity(mut self, identity: Identity) -> Self {
        self.identity = Some(identity);
        self
    }

    pub fn with_query(mut self, query: QueryParams) -> Self {
        self.query = query;
        self
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.context.get(name).map(String::as_str)
    }

    /// The body as a field map; anything but a JSON object reads as empty.
    pub fn body_fields(&self) -> Fields {
        match &self.body {
            Some(Value::Object(fields)) => fields.clone(),
            _ => Fields::new(),
        }
    }
}

/// What a resource is nested under.
#[derive(Debug, Clone, PartialEq)]
pub enum Parent {
    /// A live parent document.
    Resource(Document),
    /// A raw path segment, passed along when delegating without a resolved document.
    Token(String),
}

impl Parent {
    pub fn document(&self) -> Option<&Document> {
        match self {
            Parent::Resource(doc) => Some(doc),
            Parent::Token(_) => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldAction {
    Select,
    Populate,
    Sort,
    Create,
    Update,
}

/// Which kind of lookup a field list or filter is requested for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Target {
    /// Resolving one document by its binding.
    Single,
    /// Listing.
    Multiple,
    /// A single document that is the terminal result of a `get`.
    All,
    /// A single document resolved on the way to something else.
    Reference,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Create,
    Update,
    Delete,
}

impl Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Action::Create => "create",
            Action::Update => "update",
            Action::Delete => "delete",
        })
    }
}

/// How a child collection hangs off its parent document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildLink {
    /// Parent field holding the ordered child ids.
    pub parent_field: String,
    /// Parent field mirroring the primary child's id, if the parent has one.
    pub primary_mirror_field: Option<String>,
}

impl ChildLink {
    pub fn new(parent_field: impl Into<String>) -> Self {
        Self {
            parent_field: parent_field.into(),
            primary_mirror_field: None,
        }
    }

    pub fn mirror(mut self, field: impl Into<String>) -> Self {
        self.primary_mirror_field = Some(field.into());
        self
    }
}

/// Static description of a resource.
#[derive(Debug, Clone, PartialEq)]
pub struct Attributes {
    pub collection: String,
    /// Context key holding the id of a single document (`address_id` for `:address_id`).
    pub id_param: Option<String>,
    pub child_link: Option<ChildLink>,
    /// Whether members carry the `primary` flag that reconcile maintains.
    pub tracks_primary: bool,
    /// Every field that may be populated, with the collection it points into.
    pub references: Vec<Reference>,
    /// Fields never exported (e.g. `password`).
    pub excluded: Vec<String>,
    pub not_found_code: String,
    pub permission_denied_code: String,
}

impl Attributes {
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            id_param: None,
            child_link: None,
            tracks_primary: false,
            references: Vec::new(),
            excluded: Vec::new(),
            not_found_code: "NOT_FOUND".to_string(),
            permission_denied_code: "PERMISSION_DENIED".to_string(),
        }
    }

    pub fn id_param(mut self, param: impl Into<String>) -> Self {
        self.id_param = Some(param.into());
        self
    }

    pub fn child_of(mut self, link: ChildLink) -> Self {
        self.child_link = Some(link);
        self
    }

    pub fn tracks_primary(mut self) -> Self {
        self.tracks_primary = true;
        self
    }

    pub fn reference(mut self, field: impl Into<String>, collection: impl Into<String>) -> Self {
        self.references.push(Reference::new(field, collection));
        self
    }

    pub fn exclude(mut self, field: impl Into<String>) -> Self {
        self.excluded.push(field.into());
        self
    }

    pub fn not_found(mut self, code: impl Into<String>) -> Self {
        self.not_found_code = code.into();
        self
    }

    pub fn permission_denied(mut self, code: impl Into<String>) -> Self {
        self.permission_denied_code = code.into();
        self
    }
}

/// What a path segment resolves to.
#[derive(Clone)]
pub enum Binding {
    /// A member of the parent's child list, identified by the segment's context value.
    Member,
    /// The parent's member flagged primary.
    Primary,
    /// Hand the remaining path to another controller.
    Delegate(String),
    /// Resource-specific resolution.
    Custom(Arc<dyn Handler>),
}

impl fmt::Debug for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Binding::Member => f.write_str("Member"),
            Binding::Primary => f.write_str("Primary"),
            Binding::Delegate(name) => f.debug_tuple("Delegate").field(name).finish(),
            Binding::Custom(_) => f.write_str("Custom"),
        }
    }
}

/// Successful result of a dispatch.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Resource(Document),
    Page(Page),
    /// `{"success": true}`
    Success,
    Value(Value),
}

impl Reply {
    pub fn into_body(self) -> Value {
        match self {
            Reply::Resource(doc) => doc.export(),
            Reply::Page(page) => json!({
                "count": page.count,
                "results": page.results.iter().map(Document::export).collect::<Vec<_>>(),
            }),
            Reply::Success => json!({ "success": true }),
            Reply::Value(value) => value,
        }
    }
}

/// Arguments handed to a [`Handler`].
pub struct Call<'a> {
    pub api: &'a Api,
    pub controller: &'a Controller,
    pub verb: Verb,
    pub request: &'a Request,
    /// The segment that selected the handler.
    pub segment: &'a str,
    /// Path left after that segment.
    pub path: &'a str,
    pub parent: Option<&'a Parent>,
}

/// A custom binding or literal route.
#[async_trait]
pub trait Handler: Send + Sync {
    async fn call(&self, call: Call<'_>) -> Result<Reply, FrameworkError>;
}

/// A literal route: `verb` + `name` (e.g. `get me`) handled by `handler`.
#[derive(Clone)]
pub struct LiteralRoute {
    pub verb: Verb,
    pub name: String,
    pub handler: Arc<dyn Handler>,
}

impl LiteralRoute {
    pub fn new(verb: Verb, name: impl Into<String>, handler: impl Handler + 'static) -> Self {
        Self {
            verb,
            name: name.into(),
            handler: Arc::new(handler),
        }
    }
}

/// Per-document permission collaborator.
pub trait PermissionCheck: Send + Sync {
    fn has_permission(&self, document: &Document, identity: Option<&Identity>, verb: Verb) -> bool;
}

/// Capability interface of a concrete resource.
///
/// # Example
///
/// ```rust
/// use resource_framework::resource::{Attributes, Binding, ChildLink, ResourceSpec};
///
/// struct Address;
///
/// impl ResourceSpec for Address {
///     fn attributes(&self) -> Attributes {
///         Attributes::new("addresses")
///             .id_param("address_id")
///             .child_of(ChildLink::new("addresses").mirror("primary_address"))
///             .tracks_primary()
///     }
///
///     fn context(&self) -> Vec<(String, Binding)> {
///         vec![
///             (":address_id".into(), Binding::Member),
///             ("primary".into(), Binding::Primary),
///         ]
///     }
/// }
/// ```
#[async_trait]
pub trait ResourceSpec: Send + Sync {
    fn attributes(&self) -> Attributes;

    /// Segment bindings, keyed by the literal pattern segment (`:username`, `primary`, ...).
    fn context(&self) -> Vec<(String, Binding)> {
        Vec::new()
    }

    /// Literal routes, tried when a segment has no binding.
    fn routes(&self) -> Vec<LiteralRoute> {
        Vec::new()
    }

    fn permission(&self) -> Option<Arc<dyn PermissionCheck>> {
        None
    }

    fn validator(&self) -> Arc<dyn Validator> {
        Arc::new(AcceptAll)
    }

    /// Field allow-list for `action`. `None` selects every field and allows nothing else:
    /// no field is created, updated, populated or sorted on.
    ///
    /// `target` is `None` for `Sort`, `Create` and `Update`.
    fn fields(
        &self,
        _req: &Request,
        _action: FieldAction,
        _target: Option<Target>,
    ) -> Option<Vec<String>> {
        None
    }

    /// Filter for `target`. May consult storage, e.g. to resolve a username to an id.
    ///
    /// A `Single` target with no bound identifier is `NotFound`, never a match-all.
    async fn filters(
        &self,
        req: &Request,
        target: Target,
        _storage: &dyn Storage,
    ) -> Result<Filter, FrameworkError> {
        if target != Target::Single {
            return Ok(Filter::new());
        }
        let attributes = self.attributes();
        attributes
            .id_param
            .as_deref()
            .and_then(|param| req.param(param))
            .map(|id| Filter::by_id(DocumentId::from(id)))
            .ok_or_else(|| FrameworkError::not_found(&attributes.not_found_code))
    }

    /// Post-processes the whitelisted body of a create (`Post`) or update (`Put`).
    fn data(&self, _req: &Request, _verb: Verb, _parent: Option<&Parent>, data: Fields) -> Fields {
        data
    }

    /// Runs after validation, before persisting. `target` is the parent on create and the
    /// resource itself on update and delete.
    async fn before(
        &self,
        _req: &Request,
        _action: Action,
        _target: Option<&Document>,
        data: Fields,
    ) -> Result<Fields, FrameworkError> {
        Ok(data)
    }

    async fn after(
        &self,
        _req: &Request,
        _action: Action,
        _document: &Document,
    ) -> Result<(), FrameworkError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Plain;

    impl ResourceSpec for Plain {
        fn attributes(&self) -> Attributes {
            Attributes::new("things").id_param("thing_id")
        }
    }

    #[test]
    fn test_verb_parsing() {
        assert_eq!("GET".parse::<Verb>().unwrap(), Verb::Get);
        assert_eq!("del".parse::<Verb>().unwrap(), Verb::Delete);
        assert!(matches!(
            "patch".parse::<Verb>(),
            Err(FrameworkError::MethodNotAllowed)
        ));
        assert_eq!(Verb::Put.to_string(), "put");
    }

    #[tokio::test]
    async fn test_default_single_filter_uses_id_param() {
        let (actor, store) = crate::store::StoreActor::new(4);
        tokio::spawn(actor.run());

        let mut req = Request::new();
        req.context.insert("thing_id".into(), "t1".into());

        let single = Plain.filters(&req, Target::Single, &store).await.unwrap();
        assert_eq!(single, Filter::by_id("t1".into()));
        let multiple = Plain.filters(&req, Target::Multiple, &store).await.unwrap();
        assert_eq!(multiple, Filter::new());
    }

    #[tokio::test]
    async fn test_single_filter_without_id_is_not_found() {
        let (actor, store) = crate::store::StoreActor::new(4);
        tokio::spawn(actor.run());

        let err = Plain
            .filters(&Request::new(), Target::Single, &store)
            .await
            .unwrap_err();
        assert!(matches!(err, FrameworkError::NotFound { ref code } if code == "NOT_FOUND"));

        struct Unkeyed;
        impl ResourceSpec for Unkeyed {
            fn attributes(&self) -> Attributes {
                Attributes::new("things").not_found("THING_NOT_FOUND")
            }
        }
        let mut req = Request::new();
        req.context.insert("thing_id".into(), "t1".into());
        let err = Unkeyed.filters(&req, Target::Single, &store).await.unwrap_err();
        assert!(matches!(err, FrameworkError::NotFound { ref code } if code == "THING_NOT_FOUND"));
    }

    #[test]
    fn test_reply_bodies() {
        let mut fields = Fields::new();
        fields.insert("name".into(), json!("x"));
        let doc = Document::new("things", "t1".into(), fields);

        assert_eq!(Reply::Success.into_body(), json!({"success": true}));
        assert_eq!(
            Reply::Resource(doc.clone()).into_body(),
            json!({"id": "t1", "name": "x"})
        );
        let page = Page {
            count: 5,
            results: vec![doc],
        };
        assert_eq!(
            Reply::Page(page).into_body(),
            json!({"count": 5, "results": [{"id": "t1", "name": "x"}]})
        );
    }

    #[test]
    fn test_request_body_fields() {
        assert!(Request::new().with_body(json!([1])).body_fields().is_empty());
        let req = Request::new().with_body(json!({"a": 1}));
        assert_eq!(req.body_fields().get("a"), Some(&json!(1)));
    }
}
