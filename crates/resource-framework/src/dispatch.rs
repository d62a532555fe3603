//! # Dispatcher
//!
//! Resolves a verb and a `/`-delimited path against a controller one segment at a time.
//!
//! For each segment, the controller's bindings are consulted first (`Member`, `Primary`,
//! `Delegate`, `Custom`), then its literal `(verb, segment)` routes. Nothing matching is
//! `MethodNotAllowed`. Resolution is never backtracked.
//!
//! Once the path is exhausted the verb picks the operation:
//!
//! | remaining path | resolved single document | no document |
//! |----------------|--------------------------|-------------|
//! | `get`          | the document             | `list`      |
//! | `post`         | `MethodNotAllowed`       | `create`    |
//! | `put`          | `update`                 | `MethodNotAllowed` |
//! | `delete`       | `delete`                 | `MethodNotAllowed` |
//!
//! A resolved document with path left over becomes the parent for the rest of the path.

use crate::api::Api;
use crate::controller::Controller;
use crate::document::{DocumentId, PRIMARY_FIELD};
use crate::error::FrameworkError;
use crate::query::Filter;
use crate::resource::{Binding, Call, Parent, Reply, Request, Target, Verb};
use std::future::Future;
use std::pin::Pin;
use tracing::{debug, info_span, warn, Instrument};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// First segment of `path`.
pub fn next_path(path: &str) -> &str {
    path.split_once('/').map_or(path, |(next, _)| next)
}

/// Everything after the first segment of `path`.
pub fn rem_path(path: &str) -> &str {
    path.split_once('/').map_or("", |(_, rem)| rem)
}

impl Api {
    /// Dispatches `verb` + `path` through `controller`.
    pub fn request<'a>(
        &'a self,
        controller: &'a Controller,
        verb: Verb,
        req: &'a Request,
        path: &'a str,
        parent: Option<Parent>,
    ) -> BoxFuture<'a, Result<Reply, FrameworkError>> {
        let span = info_span!("dispatch", resource = controller.name(), %verb, path);
        Box::pin(
            async move {
                let next = next_path(path);
                let rem = rem_path(path);

                if next.is_empty() {
                    return match verb {
                        Verb::Get => controller.list(req, parent.as_ref()).await.map(Reply::Page),
                        Verb::Post => controller
                            .create(req, parent.as_ref())
                            .await
                            .map(Reply::Resource),
                        Verb::Put | Verb::Delete => Err(FrameworkError::MethodNotAllowed),
                    };
                }

                match controller.binding(next) {
                    Some(Binding::Member) => {
                        self.member(controller, verb, req, next, rem, parent).await
                    }
                    Some(Binding::Primary) => {
                        self.primary(controller, verb, req, rem, parent).await
                    }
                    Some(Binding::Delegate(name)) => {
                        let Some(target) = self.controller(name) else {
                            warn!(delegate = %name, "Controller is undefined");
                            return Err(FrameworkError::not_found("RESOURCE_NOT_FOUND"));
                        };
                        debug!(delegate = %name, "Delegate");
                        let parent = parent.or_else(|| Some(Parent::Token(next.to_string())));
                        self.request(target, verb, req, rem, parent).await
                    }
                    Some(Binding::Custom(handler)) => {
                        handler
                            .call(Call {
                                api: self,
                                controller,
                                verb,
                                request: req,
                                segment: next,
                                path: rem,
                                parent: parent.as_ref(),
                            })
                            .await
                    }
                    None => match controller.literal(verb, next) {
                        Some(handler) => {
                            handler
                                .call(Call {
                                    api: self,
                                    controller,
                                    verb,
                                    request: req,
                                    segment: next,
                                    path: rem,
                                    parent: parent.as_ref(),
                                })
                                .await
                        }
                        None => {
                            warn!(segment = next, "No binding or route for segment");
                            Err(FrameworkError::MethodNotAllowed)
                        }
                    },
                }
            }
            .instrument(span),
        )
    }

    /// A member of the parent's child list, named by the segment's context value.
    async fn member(
        &self,
        controller: &Controller,
        verb: Verb,
        req: &Request,
        segment: &str,
        rem: &str,
        parent: Option<Parent>,
    ) -> Result<Reply, FrameworkError> {
        let param = segment.strip_prefix(':').unwrap_or(segment);
        if let Some(parent) = parent.as_ref().and_then(Parent::document) {
            if let Some(ids) = controller.member_ids(parent).await? {
                let wanted = req.param(param).map(DocumentId::from);
                if !wanted.is_some_and(|id| ids.contains(&id)) {
                    warn!(param, "Not a member of the parent's list");
                    return Err(FrameworkError::not_found(
                        &controller.attributes().not_found_code,
                    ));
                }
            }
        }
        self.resolve_single(controller, verb, req, rem, None, parent)
            .await
    }

    /// The parent's member flagged primary.
    async fn primary(
        &self,
        controller: &Controller,
        verb: Verb,
        req: &Request,
        rem: &str,
        parent: Option<Parent>,
    ) -> Result<Reply, FrameworkError> {
        let not_found = || FrameworkError::not_found(&controller.attributes().not_found_code);
        let Some(document) = parent.as_ref().and_then(Parent::document) else {
            return Err(not_found());
        };
        let Some(ids) = controller.member_ids(document).await? else {
            return Err(not_found());
        };
        let filter = Filter::id_in(ids).eq(PRIMARY_FIELD, true);
        self.resolve_single(controller, verb, req, rem, Some(filter), parent)
            .await
    }

    async fn resolve_single(
        &self,
        controller: &Controller,
        verb: Verb,
        req: &Request,
        rem: &str,
        filter: Option<Filter>,
        parent: Option<Parent>,
    ) -> Result<Reply, FrameworkError> {
        let target = if verb == Verb::Get && rem.is_empty() {
            Target::All
        } else {
            Target::Reference
        };
        let document = controller.fetch_one(req, verb, target, filter).await?;

        if !rem.is_empty() {
            return self
                .request(controller, verb, req, rem, Some(Parent::Resource(document)))
                .await;
        }

        match verb {
            Verb::Get => Ok(Reply::Resource(controller.export(document))),
            Verb::Put => controller
                .update(req, document, parent.as_ref())
                .await
                .map(Reply::Resource),
            Verb::Delete => controller
                .delete(req, document, parent.as_ref())
                .await
                .map(|()| Reply::Success),
            Verb::Post => Err(FrameworkError::MethodNotAllowed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_splitting() {
        assert_eq!(next_path(":username/addresses/:id"), ":username");
        assert_eq!(rem_path(":username/addresses/:id"), "addresses/:id");
        assert_eq!(next_path("me"), "me");
        assert_eq!(rem_path("me"), "");
        assert_eq!(next_path(""), "");
        assert_eq!(rem_path("addresses/"), "");
    }
}
