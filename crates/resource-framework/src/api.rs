//! # API
//!
//! The registry of controllers and routes, and the transport surface [`Api::handle`].
//!
//! Registration happens once, through [`ApiBuilder`]; the built `Api` is immutable and shared
//! by every request.
//!
//! ```rust,no_run
//! use resource_framework::api::Api;
//! use resource_framework::resource::{
//!     Attributes, Binding, FieldAction, Request, ResourceSpec, Target, Verb,
//! };
//! use resource_framework::route::Route;
//! use resource_framework::store::StoreActor;
//! use std::sync::Arc;
//!
//! struct Tag;
//!
//! impl ResourceSpec for Tag {
//!     fn attributes(&self) -> Attributes {
//!         Attributes::new("tags").id_param("tag_id")
//!     }
//!
//!     fn context(&self) -> Vec<(String, Binding)> {
//!         vec![(":tag_id".into(), Binding::Member)]
//!     }
//!
//!     fn fields(&self, _req: &Request, action: FieldAction, _target: Option<Target>) -> Option<Vec<String>> {
//!         match action {
//!             FieldAction::Create | FieldAction::Update => Some(vec!["label".into()]),
//!             _ => None,
//!         }
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), resource_framework::FrameworkError> {
//!     let (actor, store) = StoreActor::new(64);
//!     tokio::spawn(actor.run());
//!
//!     let api = Api::builder(Arc::new(store))
//!         .resource("tag", Tag)
//!         .route(Route::new("tags").controller("tag").get("").post("").get(":tag_id"))
//!         .build()
//!         .await?;
//!
//!     let response = api.handle(Verb::Get, "/tags?limit=5", Request::new()).await;
//!     assert_eq!(response.status, 200);
//!     Ok(())
//! }
//! ```

use crate::config::ApiConfig;
use crate::controller::Controller;
use crate::error::FrameworkError;
use crate::exception::CodeTable;
use crate::hooks::{Hook, Hooks};
use crate::query::QueryParams;
use crate::resource::{Binding, Reply, Request, ResourceSpec, Verb};
use crate::route::{Route, RouteTable};
use crate::store::Storage;
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument, warn};

pub const RESOURCE_NOT_FOUND: &str = "RESOURCE_NOT_FOUND";
pub const CONTROLLER_UNDEFINED: &str = "CONTROLLER_UNDEFINED";

/// What goes back over the transport.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Response {
    pub status: u16,
    pub body: Value,
}

pub struct Api {
    config: ApiConfig,
    controllers: HashMap<String, Controller>,
    routes: RouteTable,
    codes: CodeTable,
}

impl Api {
    pub fn builder(storage: Arc<dyn Storage>) -> ApiBuilder {
        ApiBuilder::new(storage)
    }

    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    pub fn controller(&self, name: &str) -> Option<&Controller> {
        self.controllers.get(name)
    }

    pub fn codes(&self) -> &CodeTable {
        &self.codes
    }

    /// Dispatches `path` through the named controller, bypassing URL routing.
    pub async fn dispatch(
        &self,
        controller: &str,
        verb: Verb,
        req: &Request,
        path: &str,
    ) -> Result<Reply, FrameworkError> {
        let controller = self
            .controller(controller)
            .ok_or_else(|| FrameworkError::not_found(RESOURCE_NOT_FOUND))?;
        self.request(controller, verb, req, path, None).await
    }

    /// Serves one request: `url` is matched under the configured root, its pattern parameters
    /// are bound into the request context and the endpoint's pattern is dispatched.
    ///
    /// A query string on `url` replaces `request.query`.
    #[instrument(skip(self, request), fields(%verb))]
    pub async fn handle(&self, verb: Verb, url: &str, mut request: Request) -> Response {
        let (path, query) = url.split_once('?').unwrap_or((url, ""));
        if !query.is_empty() {
            request.query = QueryParams::from_query(query);
        }

        let result = match self.route(verb, path, &mut request) {
            Some((controller, pattern)) => self.request(controller, verb, &request, &pattern, None).await,
            None => {
                warn!(path, "No route");
                Err(FrameworkError::not_found(RESOURCE_NOT_FOUND))
            }
        };

        match result {
            Ok(reply) => Response {
                status: 200,
                body: reply.into_body(),
            },
            Err(e) => {
                let (status, body) = self.codes.error_body(&e);
                warn!(status, error = %e, "Request failed");
                Response {
                    status,
                    body: serde_json::to_value(&body).unwrap_or_else(|_| json!({ "exceptions": [] })),
                }
            }
        }
    }

    /// Matches `path` and binds the endpoint's parameters into `request`.
    fn route(&self, verb: Verb, path: &str, request: &mut Request) -> Option<(&Controller, String)> {
        let path = strip_root(path, &self.config.root)?;
        let matched = self.routes.find(verb, path)?;
        let controller = self.controller(matched.controller)?;
        request.context.extend(matched.params);
        Some((controller, matched.endpoint.path.clone()))
    }
}

/// `path` relative to `root`, or `None` when it is not under it.
fn strip_root<'a>(path: &'a str, root: &str) -> Option<&'a str> {
    let root = root.trim_matches('/');
    let path = path.trim_start_matches('/');
    if root.is_empty() {
        return Some(path);
    }
    match path.strip_prefix(root) {
        Some(rest) if rest.is_empty() || rest.starts_with('/') => Some(rest),
        _ => None,
    }
}

/// Collects resources, routes, codes and hooks, then builds an [`Api`].
pub struct ApiBuilder {
    config: ApiConfig,
    storage: Arc<dyn Storage>,
    resources: Vec<(String, Arc<dyn ResourceSpec>)>,
    routes: Vec<Route>,
    codes: CodeTable,
    hooks: Vec<(String, Arc<dyn Hook>)>,
}

impl ApiBuilder {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self {
            config: ApiConfig::default(),
            storage,
            resources: Vec::new(),
            routes: Vec::new(),
            codes: CodeTable::default(),
            hooks: Vec::new(),
        }
    }

    pub fn config(mut self, config: ApiConfig) -> Self {
        self.config = config;
        self
    }

    /// Registers a resource under the controller name `name`.
    pub fn resource(mut self, name: impl Into<String>, spec: impl ResourceSpec + 'static) -> Self {
        self.resources.push((name.into(), Arc::new(spec)));
        self
    }

    pub fn route(mut self, route: Route) -> Self {
        self.routes.push(route);
        self
    }

    /// Registers an exception code.
    pub fn code(mut self, code: impl Into<String>, status: u16, message: impl Into<String>) -> Self {
        self.codes.register(code, status, message);
        self
    }

    pub fn hook(mut self, name: impl Into<String>, hook: impl Hook + 'static) -> Self {
        self.hooks.push((name.into(), Arc::new(hook)));
        self
    }

    /// Runs `init-before`, builds every controller, checks that every route and delegation
    /// names a registered controller, then runs `init-after`.
    pub async fn build(self) -> Result<Api, FrameworkError> {
        let mut hooks = Hooks::new(self.config.hooks.timeout());
        for (name, hook) in self.hooks {
            hooks.register(name, hook);
        }
        let hooks = Arc::new(hooks);

        hooks
            .run("init-before", &json!({ "version": self.config.version }))
            .await?;

        let mut controllers: HashMap<String, Controller> = self
            .resources
            .into_iter()
            .map(|(name, spec)| {
                let controller = Controller::new(
                    name.clone(),
                    spec,
                    self.storage.clone(),
                    self.config.navigator,
                    hooks.clone(),
                );
                (name, controller)
            })
            .collect();

        let mut hidden: HashMap<String, Vec<String>> = HashMap::new();
        for controller in controllers.values() {
            let attributes = controller.attributes();
            if !attributes.excluded.is_empty() {
                hidden
                    .entry(attributes.collection.clone())
                    .or_default()
                    .extend(attributes.excluded.iter().cloned());
            }
        }
        for controller in controllers.values_mut() {
            controller.hide_referenced(hidden.clone());
        }

        for route in &self.routes {
            match route.controller_name() {
                Some(name) if controllers.contains_key(name) => {}
                other => {
                    return Err(undefined(
                        other.unwrap_or_default(),
                        &format!("route `{}`", route.base()),
                    ))
                }
            }
        }
        for controller in controllers.values() {
            for (segment, binding) in controller.spec().context() {
                if let Binding::Delegate(target) = binding {
                    if !controllers.contains_key(&target) {
                        return Err(undefined(
                            &target,
                            &format!("`{}` segment `{}`", controller.name(), segment),
                        ));
                    }
                }
            }
        }

        let routes = RouteTable::new(&self.routes);
        let mut names: Vec<&String> = controllers.keys().collect();
        names.sort();
        hooks
            .run("init-after", &json!({ "controllers": names }))
            .await?;

        info!(
            controllers = controllers.len(),
            endpoints = routes.len(),
            version = %self.config.version,
            "API ready"
        );
        Ok(Api {
            config: self.config,
            controllers,
            routes,
            codes: self.codes,
        })
    }
}

fn undefined(controller: &str, used_by: &str) -> FrameworkError {
    warn!(controller, used_by, "Controller is undefined");
    FrameworkError::Coded {
        code: CONTROLLER_UNDEFINED.to_string(),
        message: Some(format!("Controller `{controller}` used by {used_by} is undefined")),
    }
}
