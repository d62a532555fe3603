//! # Address Resource
//!
//! A user's postal addresses. The user document keeps their ids in `addresses`, in the order
//! the user arranged them, and mirrors the primary one in `primary_address`.
//!
//! Posting or putting `{"primary": true}` makes an address the primary one; the framework
//! clears the flag on the others.

use super::ADDRESS_NOT_FOUND;
use resource_framework::resource::{
    Attributes, Binding, ChildLink, FieldAction, Request, ResourceSpec, Target,
};
use resource_framework::schema::{FieldRule, Schema, Validator};
use std::sync::Arc;

pub const ADDRESSES: &str = "addresses";

pub struct AddressResource;

impl ResourceSpec for AddressResource {
    fn attributes(&self) -> Attributes {
        Attributes::new(ADDRESSES)
            .id_param("address_id")
            .child_of(ChildLink::new("addresses").mirror("primary_address"))
            .tracks_primary()
            .not_found(ADDRESS_NOT_FOUND)
    }

    fn context(&self) -> Vec<(String, Binding)> {
        vec![
            (":address_id".into(), Binding::Member),
            ("primary".into(), Binding::Primary),
        ]
    }

    fn validator(&self) -> Arc<dyn Validator> {
        Arc::new(
            Schema::new()
                .field("label", FieldRule::string().required().trim())
                .field("street", FieldRule::string().trim())
                .field("city", FieldRule::string().trim())
                .field("zip", FieldRule::string().trim())
                .field("primary", FieldRule::boolean()),
        )
    }

    fn fields(
        &self,
        _req: &Request,
        action: FieldAction,
        _target: Option<Target>,
    ) -> Option<Vec<String>> {
        let names: &[&str] = match action {
            FieldAction::Create | FieldAction::Update => {
                &["label", "street", "city", "zip", "primary"]
            }
            FieldAction::Sort => &["label", "city", "created"],
            FieldAction::Select | FieldAction::Populate => return None,
        };
        Some(names.iter().map(|name| name.to_string()).collect())
    }
}
