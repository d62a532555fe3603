//! # User Resource
//!
//! Users live in the `users` collection and are addressed by username. A user owns two ordered
//! child collections, `addresses` and `photos`, which are served by their own controllers.
//!
//! | segment     | binding                     |
//! |-------------|-----------------------------|
//! | `:username` | member, resolved by username |
//! | `addresses` | delegate to `address`       |
//! | `photos`    | delegate to `photo`         |
//! | `get me`    | the acting user             |
//! | `put me`    | update the acting user      |
//!
//! Anyone may read a user; only the user themself or an admin may change one.

use super::{ADMIN_ROLE, AUTHORIZATION_REQUIRED, USER_NOT_FOUND};
use async_trait::async_trait;
use resource_framework::query::Filter;
use resource_framework::resource::{
    Attributes, Binding, Call, FieldAction, Handler, Identity, LiteralRoute, Parent,
    PermissionCheck, Reply, Request, ResourceSpec, Target, Verb,
};
use resource_framework::schema::{FieldRule, Schema, Validator};
use resource_framework::{Document, FrameworkError, Storage};
use serde_json::json;
use std::sync::Arc;
use tracing::debug;

pub const USERS: &str = "users";

pub struct UserResource;

impl UserResource {
    fn schema() -> Schema {
        Schema::new()
            .field("username", FieldRule::string().required().trim().lowercase())
            .field("email", FieldRule::string().trim().lowercase())
            .field("name", FieldRule::string().trim())
            .field("password", FieldRule::string())
            .field(
                "status",
                FieldRule::string()
                    .one_of(["active", "suspended"])
                    .default(json!("active")),
            )
    }
}

#[async_trait]
impl ResourceSpec for UserResource {
    fn attributes(&self) -> Attributes {
        Attributes::new(USERS)
            .reference("primary_address", "addresses")
            .reference("primary_photo", "photos")
            .exclude("password")
            .not_found(USER_NOT_FOUND)
    }

    fn context(&self) -> Vec<(String, Binding)> {
        vec![
            (":username".into(), Binding::Member),
            ("addresses".into(), Binding::Delegate("address".into())),
            ("photos".into(), Binding::Delegate("photo".into())),
        ]
    }

    fn routes(&self) -> Vec<LiteralRoute> {
        vec![
            LiteralRoute::new(Verb::Get, "me", Me),
            LiteralRoute::new(Verb::Put, "me", Me),
        ]
    }

    fn permission(&self) -> Option<Arc<dyn PermissionCheck>> {
        Some(Arc::new(SelfOrAdmin))
    }

    fn validator(&self) -> Arc<dyn Validator> {
        Arc::new(Self::schema())
    }

    fn fields(
        &self,
        _req: &Request,
        action: FieldAction,
        target: Option<Target>,
    ) -> Option<Vec<String>> {
        let names: &[&str] = match (action, target) {
            (FieldAction::Populate, Some(Target::All)) => &["primary_address", "primary_photo"],
            (FieldAction::Populate, _) => return None,
            (FieldAction::Sort, _) => &["username", "created"],
            (FieldAction::Create, _) => &["username", "email", "name", "password", "status"],
            (FieldAction::Update, _) => &["email", "name", "password", "status"],
            (FieldAction::Select, _) => return None,
        };
        Some(names.iter().map(|name| name.to_string()).collect())
    }

    /// A single user is looked up by username; the username is resolved to an id first.
    async fn filters(
        &self,
        req: &Request,
        target: Target,
        storage: &dyn Storage,
    ) -> Result<Filter, FrameworkError> {
        if target != Target::Single {
            return Ok(Filter::new());
        }
        let Some(username) = req.param("username") else {
            return Err(FrameworkError::not_found(USER_NOT_FOUND));
        };
        let username = username.trim().to_lowercase();
        let found = storage
            .find_one(USERS, &Filter::new().eq("username", username.as_str()), None)
            .await?;
        debug!(%username, found = found.is_some(), "Resolved username");
        Ok(match found {
            Some(user) => Filter::by_id(user.id),
            None => Filter::new().eq("username", username),
        })
    }
}

/// Reads may come from anyone; changes only from the user or an admin.
struct SelfOrAdmin;

impl PermissionCheck for SelfOrAdmin {
    fn has_permission(&self, document: &Document, identity: Option<&Identity>, verb: Verb) -> bool {
        if verb == Verb::Get {
            return true;
        }
        identity.is_some_and(|identity| {
            identity.user_id == document.id || identity.has_role(ADMIN_ROLE)
        })
    }
}

/// `get me` / `put me`: the acting user. Any remaining path continues under that user.
struct Me;

#[async_trait]
impl Handler for Me {
    async fn call(&self, call: Call<'_>) -> Result<Reply, FrameworkError> {
        let Some(identity) = call.request.identity.as_ref() else {
            return Err(FrameworkError::coded(AUTHORIZATION_REQUIRED));
        };
        let target = if call.verb == Verb::Get && call.path.is_empty() {
            Target::All
        } else {
            Target::Reference
        };
        let me = call
            .controller
            .fetch_one(
                call.request,
                call.verb,
                target,
                Some(Filter::by_id(identity.user_id.clone())),
            )
            .await?;

        if !call.path.is_empty() {
            return call
                .api
                .request(
                    call.controller,
                    call.verb,
                    call.request,
                    call.path,
                    Some(Parent::Resource(me)),
                )
                .await;
        }
        match call.verb {
            Verb::Get => Ok(Reply::Resource(call.controller.export(me))),
            Verb::Put => call
                .controller
                .update(call.request, me, None)
                .await
                .map(Reply::Resource),
            Verb::Post | Verb::Delete => Err(FrameworkError::MethodNotAllowed),
        }
    }
}
