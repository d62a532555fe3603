//! # Navigator
//!
//! Turns a filter into one page of a collection: `{count, results}`.
//!
//! 1. Count the matches. Zero short-circuits to an empty page without further queries.
//! 2. Resolve the window ([`Window::resolve`]).
//! 3. Resolve the sort. With an explicit id order, every row gets a virtual `order` column
//!    holding its position in that sequence, and rows are browsed by it unless the caller
//!    asks for a sortable field instead. Without one, only fields on the sortable allow-list
//!    are honoured.
//! 4. Fetch the page, projected to the selected fields.
//! 5. Populate references on the fetched page only. Population is best-effort: when it fails
//!    the page is returned unpopulated.
//! 6. Strip the virtual column.

use crate::config::NavigatorConfig;
use crate::document::{Document, DocumentId};
use crate::error::FrameworkError;
use crate::query::{FindOptions, Filter, Positions, QueryParams, Reference, Sort, SortDirection};
use crate::store::Storage;
use serde::Serialize;
use tracing::{debug, warn};

/// Name of the virtual position column used for explicit ordering.
pub const ORDER_FIELD: &str = "order";

/// One page of a listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page {
    /// Total number of matches, independent of the window.
    pub count: usize,
    pub results: Vec<Document>,
}

impl Page {
    pub fn empty() -> Self {
        Self {
            count: 0,
            results: Vec::new(),
        }
    }
}

/// Pagination window after clamping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub start: usize,
    pub limit: usize,
}

impl Window {
    /// Clamps the requested window against `count`.
    ///
    /// `limit` defaults to `default_limit` when absent or zero, is raised to 1 when negative and
    /// capped at `max_limit`. `start` is clamped into `[0, floor(count / limit) * limit]`.
    pub fn resolve(
        start: Option<i64>,
        limit: Option<i64>,
        count: usize,
        config: &NavigatorConfig,
    ) -> Self {
        let max_limit = config.max_limit.max(1);
        let limit = match limit {
            None | Some(0) => config.default_limit.clamp(1, max_limit),
            Some(limit) if limit < 0 => 1,
            Some(limit) => usize::try_from(limit).unwrap_or(max_limit).min(max_limit),
        };
        let start = usize::try_from(start.unwrap_or(0).max(0)).unwrap_or(0);
        let last_page = (count / limit) * limit;
        Self {
            start: start.min(last_page),
            limit,
        }
    }
}

/// Builder for one listing query.
pub struct Navigator<'a> {
    storage: &'a dyn Storage,
    collection: &'a str,
    params: &'a QueryParams,
    config: NavigatorConfig,
    fields: Option<Vec<String>>,
    order: Option<Vec<DocumentId>>,
    populate: Vec<Reference>,
    sortable: Vec<String>,
}

impl<'a> Navigator<'a> {
    pub fn new(
        storage: &'a dyn Storage,
        collection: &'a str,
        params: &'a QueryParams,
        config: NavigatorConfig,
    ) -> Self {
        Self {
            storage,
            collection,
            params,
            config,
            fields: None,
            order: None,
            populate: Vec::new(),
            sortable: Vec::new(),
        }
    }

    /// Projection. `None` returns every field.
    pub fn fields(mut self, fields: Option<Vec<String>>) -> Self {
        self.fields = fields.filter(|fields| !fields.is_empty());
        self
    }

    /// Explicit browse order.
    pub fn order(mut self, order: Option<Vec<DocumentId>>) -> Self {
        self.order = order;
        self
    }

    pub fn populate(mut self, references: Vec<Reference>) -> Self {
        self.populate = references;
        self
    }

    /// Fields a caller may sort by.
    pub fn sort(mut self, sortable: Vec<String>) -> Self {
        self.sortable = sortable;
        self
    }

    pub async fn exec(self, filter: Filter) -> Result<Page, FrameworkError> {
        let count = self.storage.count(self.collection, &filter).await?;
        if count == 0 {
            return Ok(Page::empty());
        }

        let window = Window::resolve(self.params.start, self.params.limit, count, &self.config);
        let sort = self.resolve_sort();
        debug!(collection = self.collection, count, ?window, ?sort, "Navigate");

        let options = FindOptions {
            projection: self.fields.clone(),
            positions: self.order.clone().map(|ids| Positions {
                field: ORDER_FIELD.to_string(),
                ids,
            }),
            sort,
            skip: window.start,
            limit: Some(window.limit),
        };
        let mut results = self.storage.find(self.collection, &filter, options).await?;

        if !self.populate.is_empty() {
            match self.storage.populate(results.clone(), &self.populate).await {
                Ok(populated) => results = populated,
                Err(e) => {
                    warn!(collection = self.collection, error = %e, "Population failed, returning unpopulated rows");
                }
            }
        }

        if self.order.is_some() {
            let virtual_field = [ORDER_FIELD.to_string()];
            for doc in &mut results {
                doc.strip(&virtual_field);
            }
        }

        Ok(Page { count, results })
    }

    fn resolve_sort(&self) -> Option<Sort> {
        let requested = self
            .params
            .sort
            .as_deref()
            .map(str::to_lowercase)
            .filter(|field| !field.is_empty());
        let direction = SortDirection::parse(self.params.order.as_deref());

        match (requested, &self.order) {
            (Some(field), Some(_)) if field == ORDER_FIELD || self.sortable.contains(&field) => {
                Some(Sort { field, direction })
            }
            (_, Some(_)) => Some(Sort {
                field: ORDER_FIELD.to_string(),
                direction: SortDirection::Asc,
            }),
            (Some(field), None) if self.sortable.contains(&field) => {
                Some(Sort { field, direction })
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Fields;
    use crate::error::StorageError;
    use crate::mock::MockStore;
    use crate::store::{StoreActor, StoreClient};
    use serde_json::json;

    fn config() -> NavigatorConfig {
        NavigatorConfig::default()
    }

    async fn seeded(n: usize) -> (StoreClient, Vec<DocumentId>) {
        let (actor, store) = StoreActor::new(64);
        tokio::spawn(actor.run());
        let mut ids = Vec::new();
        for i in 0..n {
            let mut fields = Fields::new();
            fields.insert("rank".into(), json!(i));
            fields.insert("name".into(), json!(format!("doc-{i:02}")));
            ids.push(store.insert("docs", fields).await.unwrap().id);
        }
        (store, ids)
    }

    fn ranks(page: &Page) -> Vec<i64> {
        page.results
            .iter()
            .filter_map(|doc| doc.get("rank").and_then(|v| v.as_i64()))
            .collect()
    }

    #[test]
    fn test_limit_clamp() {
        assert_eq!(Window::resolve(None, Some(100), 50, &config()).limit, 20);
        assert_eq!(Window::resolve(None, Some(-5), 50, &config()).limit, 1);
        assert_eq!(Window::resolve(None, None, 50, &config()).limit, 20);
        assert_eq!(Window::resolve(None, Some(0), 50, &config()).limit, 20);
        assert_eq!(Window::resolve(None, Some(7), 50, &config()).limit, 7);
    }

    #[test]
    fn test_start_clamp() {
        assert_eq!(Window::resolve(Some(-3), None, 30, &config()).start, 0);
        assert_eq!(Window::resolve(Some(25), Some(20), 30, &config()).start, 20);
        assert_eq!(Window::resolve(Some(500), Some(10), 35, &config()).start, 30);
        assert_eq!(Window::resolve(Some(5), Some(10), 35, &config()).start, 5);
    }

    #[tokio::test]
    async fn test_window_past_end_serves_last_full_page_boundary() {
        let (store, _) = seeded(30).await;
        let params = QueryParams {
            start: Some(25),
            limit: Some(20),
            ..Default::default()
        };

        let page = Navigator::new(&store, "docs", &params, config())
            .exec(Filter::new())
            .await
            .unwrap();

        assert_eq!(page.count, 30);
        assert_eq!(ranks(&page), (20..30).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_explicit_order() {
        let (store, ids) = seeded(3).await;
        let order = vec![ids[2].clone(), ids[0].clone(), ids[1].clone()];
        let params = QueryParams::default();

        let page = Navigator::new(&store, "docs", &params, config())
            .order(Some(order.clone()))
            .exec(Filter::id_in(order.clone()))
            .await
            .unwrap();

        let got: Vec<DocumentId> = page.results.iter().map(|doc| doc.id.clone()).collect();
        assert_eq!(got, order);
        assert!(page.results.iter().all(|doc| doc.get(ORDER_FIELD).is_none()));
    }

    #[tokio::test]
    async fn test_explicit_order_descending_and_sortable_override() {
        let (store, ids) = seeded(3).await;
        let order = vec![ids[2].clone(), ids[0].clone(), ids[1].clone()];

        let params = QueryParams {
            sort: Some("order".into()),
            order: Some("desc".into()),
            ..Default::default()
        };
        let page = Navigator::new(&store, "docs", &params, config())
            .order(Some(order.clone()))
            .exec(Filter::new())
            .await
            .unwrap();
        assert_eq!(ranks(&page), vec![1, 0, 2]);

        let params = QueryParams {
            sort: Some("Rank".into()),
            ..Default::default()
        };
        let page = Navigator::new(&store, "docs", &params, config())
            .order(Some(order))
            .sort(vec!["rank".into()])
            .exec(Filter::new())
            .await
            .unwrap();
        assert_eq!(ranks(&page), vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn test_sort_requires_allow_list() {
        let (store, _) = seeded(3).await;
        let params = QueryParams {
            sort: Some("rank".into()),
            order: Some("desc".into()),
            ..Default::default()
        };

        let ignored = Navigator::new(&store, "docs", &params, config())
            .exec(Filter::new())
            .await
            .unwrap();
        assert_eq!(ranks(&ignored), vec![0, 1, 2]);

        let honoured = Navigator::new(&store, "docs", &params, config())
            .sort(vec!["rank".into()])
            .exec(Filter::new())
            .await
            .unwrap();
        assert_eq!(ranks(&honoured), vec![2, 1, 0]);
    }

    #[tokio::test]
    async fn test_projection() {
        let (store, _) = seeded(2).await;
        let params = QueryParams::default();
        let page = Navigator::new(&store, "docs", &params, config())
            .fields(Some(vec!["name".into()]))
            .exec(Filter::new())
            .await
            .unwrap();
        assert!(page
            .results
            .iter()
            .all(|doc| doc.get("rank").is_none() && doc.get("name").is_some()));
    }

    #[tokio::test]
    async fn test_zero_count_short_circuits() {
        let mut mock = MockStore::new();
        mock.expect_count().return_ok(0);

        let store = mock.client();
        let params = QueryParams::default();
        let page = Navigator::new(&store, "docs", &params, config())
            .populate(vec![Reference::new("owner", "users")])
            .exec(Filter::new())
            .await
            .unwrap();

        assert_eq!(page, Page::empty());
        mock.verify();
        assert_eq!(mock.received(), vec!["count"]);
    }

    #[tokio::test]
    async fn test_population_failure_degrades() {
        let mut mock = MockStore::new();
        let mut fields = Fields::new();
        fields.insert("owner".into(), json!("u1"));
        let row = Document::new("docs", "d1".into(), fields);
        mock.expect_count().return_ok(1);
        mock.expect_find().return_ok(vec![row.clone()]);
        mock.expect_populate()
            .return_err(StorageError::Rejected("lookup failed".into()));

        let store = mock.client();
        let params = QueryParams::default();
        let page = Navigator::new(&store, "docs", &params, config())
            .populate(vec![Reference::new("owner", "users")])
            .exec(Filter::new())
            .await
            .unwrap();

        assert_eq!(page.count, 1);
        assert_eq!(page.results, vec![row]);
        mock.verify();
    }
}
