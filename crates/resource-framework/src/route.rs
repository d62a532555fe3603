//! # Routes
//!
//! A [`Route`] mounts a controller under a base path and lists the endpoints it answers:
//!
//! ```rust
//! use resource_framework::route::Route;
//!
//! let users = Route::new("users")
//!     .controller("user")
//!     .get("")
//!     .get("me")
//!     .put("me")
//!     .get(":username")
//!     .get_with_priority(":username/addresses/primary", 110);
//! assert_eq!(users.endpoints().len(), 5);
//! ```
//!
//! An endpoint's relative path is both its URL pattern and the path dispatched through the
//! controller: matching `users/alice` against `:username` binds `username = "alice"` into the
//! request context and dispatches `:username`.
//!
//! Endpoints are tried by descending priority (default 100); ties keep registration order.
//! Registering the same verb and path twice keeps the last registration.

use crate::resource::{Context, Verb};

pub const DEFAULT_PRIORITY: i32 = 100;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub verb: Verb,
    /// Pattern relative to the route base.
    pub path: String,
    pub priority: i32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    base: String,
    controller: Option<String>,
    endpoints: Vec<Endpoint>,
}

impl Route {
    pub fn new(base: impl Into<String>) -> Self {
        Self {
            base: base.into().trim_matches('/').to_string(),
            controller: None,
            endpoints: Vec::new(),
        }
    }

    /// Names the controller the endpoints dispatch into.
    pub fn controller(mut self, name: impl Into<String>) -> Self {
        self.controller = Some(name.into());
        self
    }

    pub fn get(self, path: impl Into<String>) -> Self {
        self.endpoint(Verb::Get, path, DEFAULT_PRIORITY)
    }

    pub fn post(self, path: impl Into<String>) -> Self {
        self.endpoint(Verb::Post, path, DEFAULT_PRIORITY)
    }

    pub fn put(self, path: impl Into<String>) -> Self {
        self.endpoint(Verb::Put, path, DEFAULT_PRIORITY)
    }

    pub fn delete(self, path: impl Into<String>) -> Self {
        self.endpoint(Verb::Delete, path, DEFAULT_PRIORITY)
    }

    pub fn get_with_priority(self, path: impl Into<String>, priority: i32) -> Self {
        self.endpoint(Verb::Get, path, priority)
    }

    /// Registers an endpoint, replacing an earlier one with the same verb and path.
    pub fn endpoint(mut self, verb: Verb, path: impl Into<String>, priority: i32) -> Self {
        let endpoint = Endpoint {
            verb,
            path: path.into().trim_matches('/').to_string(),
            priority,
        };
        match self
            .endpoints
            .iter_mut()
            .find(|e| e.verb == endpoint.verb && e.path == endpoint.path)
        {
            Some(existing) => *existing = endpoint,
            None => self.endpoints.push(endpoint),
        }
        self
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn controller_name(&self) -> Option<&str> {
        self.controller.as_deref()
    }

    pub fn endpoints(&self) -> &[Endpoint] {
        &self.endpoints
    }
}

/// One endpoint flattened into the routing table.
#[derive(Debug, Clone)]
struct Entry {
    controller: String,
    endpoint: Endpoint,
    segments: Vec<String>,
}

/// A matched endpoint and the parameters its pattern bound.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteMatch<'a> {
    pub controller: &'a str,
    pub endpoint: &'a Endpoint,
    pub params: Context,
}

/// All endpoints of all routes, in matching order.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    entries: Vec<Entry>,
}

impl RouteTable {
    /// Flattens `routes`. Routes without a controller are skipped.
    pub fn new(routes: &[Route]) -> Self {
        let mut entries: Vec<Entry> = routes
            .iter()
            .filter_map(|route| route.controller.as_ref().map(|name| (route, name)))
            .flat_map(|(route, name)| {
                route.endpoints.iter().map(move |endpoint| Entry {
                    controller: name.clone(),
                    endpoint: endpoint.clone(),
                    segments: split(&route.base)
                        .chain(split(&endpoint.path))
                        .map(str::to_string)
                        .collect(),
                })
            })
            .collect();
        entries.sort_by(|a, b| b.endpoint.priority.cmp(&a.endpoint.priority));
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// First endpoint answering `verb` whose pattern matches `path`.
    pub fn find(&self, verb: Verb, path: &str) -> Option<RouteMatch<'_>> {
        let segments: Vec<&str> = split(path).collect();
        self.entries
            .iter()
            .filter(|entry| entry.endpoint.verb == verb)
            .find_map(|entry| {
                bind(&entry.segments, &segments).map(|params| RouteMatch {
                    controller: &entry.controller,
                    endpoint: &entry.endpoint,
                    params,
                })
            })
    }
}

fn split(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|segment| !segment.is_empty())
}

fn bind(pattern: &[String], segments: &[&str]) -> Option<Context> {
    if pattern.len() != segments.len() {
        return None;
    }
    let mut params = Context::new();
    for (expected, actual) in pattern.iter().zip(segments) {
        match expected.strip_prefix(':') {
            Some(name) => {
                params.insert(name.to_string(), actual.to_string());
            }
            None if expected == actual => {}
            None => return None,
        }
    }
    Some(params)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn users() -> Route {
        Route::new("users")
            .controller("user")
            .get("")
            .get("me")
            .get(":username")
            .get(":username/addresses/:address_id")
            .get_with_priority(":username/addresses/primary", 110)
            .post(":username/addresses")
    }

    #[test]
    fn test_binds_parameters() {
        let table = RouteTable::new(&[users()]);
        let matched = table.find(Verb::Get, "/users/alice/").unwrap();

        assert_eq!(matched.controller, "user");
        assert_eq!(matched.endpoint.path, ":username");
        assert_eq!(matched.params.get("username").map(String::as_str), Some("alice"));
    }

    #[test]
    fn test_registration_order_and_priority() {
        let table = RouteTable::new(&[users()]);

        assert_eq!(table.find(Verb::Get, "users/me").unwrap().endpoint.path, "me");
        let primary = table.find(Verb::Get, "users/alice/addresses/primary").unwrap();
        assert_eq!(primary.endpoint.path, ":username/addresses/primary");
        assert_eq!(table.find(Verb::Get, "users").unwrap().endpoint.path, "");
    }

    #[test]
    fn test_verb_and_shape_must_match() {
        let table = RouteTable::new(&[users()]);
        assert!(table.find(Verb::Delete, "users/alice").is_none());
        assert!(table.find(Verb::Get, "users/alice/photos").is_none());
        assert!(table.find(Verb::Get, "things").is_none());
    }

    #[test]
    fn test_reregistration_overwrites() {
        let route = Route::new("users")
            .controller("user")
            .get(":username")
            .endpoint(Verb::Get, ":username", 50);

        assert_eq!(route.endpoints().len(), 1);
        assert_eq!(route.endpoints()[0].priority, 50);
    }

    #[test]
    fn test_routes_without_controller_are_skipped() {
        let table = RouteTable::new(&[Route::new("orphans").get("")]);
        assert!(table.is_empty());
    }
}
