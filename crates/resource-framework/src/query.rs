//! # Query Building Blocks
//!
//! Filters, find options and request query parameters shared by the storage collaborator,
//! the [`Navigator`](crate::navigator::Navigator) and the CRUD operations.

use crate::document::{compare_values, Document, DocumentId, ID_FIELD};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;

/// Bounds of a range condition. Unset bounds are open.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Range {
    pub gt: Option<Value>,
    pub gte: Option<Value>,
    pub lt: Option<Value>,
    pub lte: Option<Value>,
}

impl Range {
    fn contains(&self, value: &Value) -> bool {
        let check = |bound: &Option<Value>, accept: fn(Ordering) -> bool| match bound {
            Some(bound) => same_kind(value, bound) && accept(compare_values(value, bound)),
            None => true,
        };
        check(&self.gt, |o| o == Ordering::Greater)
            && check(&self.gte, |o| o != Ordering::Less)
            && check(&self.lt, |o| o == Ordering::Less)
            && check(&self.lte, |o| o != Ordering::Greater)
    }
}

fn same_kind(a: &Value, b: &Value) -> bool {
    std::mem::discriminant(a) == std::mem::discriminant(b)
}

/// A single field constraint.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// Equality. An array field matches when it contains the value.
    Eq(Value),
    /// The field equals one of the listed values.
    OneOf(Vec<Value>),
    Range(Range),
}

impl Condition {
    fn matches(&self, value: Option<&Value>) -> bool {
        let value = value.unwrap_or(&Value::Null);
        match self {
            Condition::Eq(expected) => match value {
                Value::Array(items) if !expected.is_array() => items.contains(expected),
                other => other == expected,
            },
            Condition::OneOf(candidates) => candidates.contains(value),
            Condition::Range(range) => range.contains(value),
        }
    }
}

/// Conjunction of an optional id set and per-field conditions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    ids: Option<Vec<DocumentId>>,
    conditions: Vec<(String, Condition)>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn by_id(id: DocumentId) -> Self {
        Self::id_in(vec![id])
    }

    pub fn id_in(ids: Vec<DocumentId>) -> Self {
        Self {
            ids: Some(ids),
            conditions: Vec::new(),
        }
    }

    pub fn eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.conditions
            .push((field.into(), Condition::Eq(value.into())));
        self
    }

    pub fn one_of(mut self, field: impl Into<String>, values: Vec<Value>) -> Self {
        self.conditions.push((field.into(), Condition::OneOf(values)));
        self
    }

    pub fn range(mut self, field: impl Into<String>, range: Range) -> Self {
        self.conditions.push((field.into(), Condition::Range(range)));
        self
    }

    /// Restricts the filter to `ids`, intersecting with any id set already present.
    pub fn and_ids(mut self, ids: Vec<DocumentId>) -> Self {
        self.ids = Some(match self.ids.take() {
            Some(existing) => ids.into_iter().filter(|id| existing.contains(id)).collect(),
            None => ids,
        });
        self
    }

    pub fn ids(&self) -> Option<&[DocumentId]> {
        self.ids.as_deref()
    }

    pub fn matches(&self, document: &Document) -> bool {
        if let Some(ids) = &self.ids {
            if !ids.contains(&document.id) {
                return false;
            }
        }
        self.conditions.iter().all(|(field, condition)| {
            if field == ID_FIELD {
                condition.matches(Some(&document.id.to_value()))
            } else {
                condition.matches(document.get(field))
            }
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    /// Parses `asc`/`desc` case-insensitively; anything else falls back to ascending.
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(str::to_ascii_lowercase).as_deref() {
            Some("desc") => SortDirection::Desc,
            _ => SortDirection::Asc,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Sort {
    pub field: String,
    pub direction: SortDirection,
}

impl Sort {
    pub fn compare(&self, a: &Document, b: &Document) -> Ordering {
        let null = Value::Null;
        let left = a.get(&self.field).unwrap_or(&null);
        let right = b.get(&self.field).unwrap_or(&null);
        let ordering = compare_values(left, right);
        match self.direction {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        }
    }
}

/// Virtual column holding each document's position inside an explicit id sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct Positions {
    pub field: String,
    pub ids: Vec<DocumentId>,
}

impl Positions {
    /// Index of `id` in the sequence, `-1` when absent.
    pub fn position_of(&self, id: &DocumentId) -> i64 {
        self.ids
            .iter()
            .position(|candidate| candidate == id)
            .map(|index| index as i64)
            .unwrap_or(-1)
    }
}

/// Options of a `find` call, applied in order: positions, sort, skip, limit, projection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindOptions {
    pub projection: Option<Vec<String>>,
    pub positions: Option<Positions>,
    pub sort: Option<Sort>,
    pub skip: usize,
    pub limit: Option<usize>,
}

/// A field whose id value(s) should be replaced by the referenced document(s).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    pub field: String,
    pub collection: String,
    /// Attributes removed from every embedded document.
    pub hidden: Vec<String>,
}

impl Reference {
    pub fn new(field: impl Into<String>, collection: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            collection: collection.into(),
            hidden: Vec::new(),
        }
    }

    pub fn hiding(mut self, fields: &[String]) -> Self {
        self.hidden = fields.to_vec();
        self
    }
}

/// Listing parameters supplied by the caller (`?start=&limit=&sort=&order=`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryParams {
    pub start: Option<i64>,
    pub limit: Option<i64>,
    pub sort: Option<String>,
    pub order: Option<String>,
}

impl QueryParams {
    /// Builds parameters from raw key/value pairs; unparsable numbers are ignored.
    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let mut params = Self::default();
        for (key, value) in pairs {
            match key {
                "start" => params.start = value.trim().parse().ok(),
                "limit" => params.limit = value.trim().parse().ok(),
                "sort" => params.sort = Some(value.to_string()),
                "order" => params.order = Some(value.to_string()),
                _ => {}
            }
        }
        params
    }

    /// Parses a raw `a=1&b=2` query string; values are percent-decoded and `+` reads as a space.
    pub fn from_query(query: &str) -> Self {
        let pairs: Vec<_> = url::form_urlencoded::parse(query.as_bytes()).collect();
        Self::from_pairs(pairs.iter().map(|(key, value)| (&**key, &**value)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Fields;
    use serde_json::json;

    fn doc(id: &str, value: Value) -> Document {
        let fields: Fields = match value {
            Value::Object(map) => map,
            _ => Fields::new(),
        };
        Document::new("things", DocumentId::from(id), fields)
    }

    #[test]
    fn test_eq_matches_array_membership() {
        let d = doc("a", json!({ "tags": ["red", "blue"], "size": 3 }));
        assert!(Filter::new().eq("tags", "red").matches(&d));
        assert!(!Filter::new().eq("tags", "green").matches(&d));
        assert!(Filter::new().eq("size", 3).matches(&d));
        assert!(Filter::new().eq("id", "a").matches(&d));
    }

    #[test]
    fn test_range_ignores_other_types() {
        let range = Range {
            gte: Some(json!(2)),
            lt: Some(json!(5)),
            ..Range::default()
        };
        let filter = Filter::new().range("size", range);
        assert!(filter.matches(&doc("a", json!({ "size": 2 }))));
        assert!(!filter.matches(&doc("b", json!({ "size": 5 }))));
        assert!(!filter.matches(&doc("c", json!({ "size": "3" }))));
    }

    #[test]
    fn test_and_ids_intersects() {
        let filter = Filter::id_in(vec!["a".into(), "b".into()]).and_ids(vec!["b".into(), "c".into()]);
        assert_eq!(filter.ids(), Some(&[DocumentId::from("b")][..]));
    }

    #[test]
    fn test_direction_fallback() {
        assert_eq!(SortDirection::parse(Some("DESC")), SortDirection::Desc);
        assert_eq!(SortDirection::parse(Some("sideways")), SortDirection::Asc);
        assert_eq!(SortDirection::parse(None), SortDirection::Asc);
    }

    #[test]
    fn test_query_params_from_pairs() {
        let params = QueryParams::from_pairs([("start", "25"), ("limit", "x"), ("sort", "name")]);
        assert_eq!(params.start, Some(25));
        assert_eq!(params.limit, None);
        assert_eq!(params.sort.as_deref(), Some("name"));
    }

    #[test]
    fn test_query_params_are_decoded() {
        let params = QueryParams::from_query("sort=cap%74ion&order=%64esc&limit=%205&&start");
        assert_eq!(params.sort.as_deref(), Some("caption"));
        assert_eq!(params.order.as_deref(), Some("desc"));
        assert_eq!(params.limit, Some(5));
        assert_eq!(params.start, None);

        let spaced = QueryParams::from_query("sort=first+name");
        assert_eq!(spaced.sort.as_deref(), Some("first name"));
    }
}
