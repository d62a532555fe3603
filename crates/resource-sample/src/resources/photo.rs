//! # Photo Resource
//!
//! A user's photos, kept in the order the user arranged them in `photos` on the user document.
//! The primary photo is mirrored in `primary_photo`.

use resource_framework::document::Fields;
use resource_framework::resource::{
    Attributes, Binding, ChildLink, FieldAction, Parent, Request, ResourceSpec, Target, Verb,
};
use resource_framework::schema::{FieldRule, Schema, Validator};
use serde_json::Value;
use std::sync::Arc;

pub const PHOTOS: &str = "photos";

pub struct PhotoResource;

impl ResourceSpec for PhotoResource {
    fn attributes(&self) -> Attributes {
        Attributes::new(PHOTOS)
            .id_param("photo_id")
            .child_of(ChildLink::new("photos").mirror("primary_photo"))
            .tracks_primary()
    }

    fn context(&self) -> Vec<(String, Binding)> {
        vec![
            (":photo_id".into(), Binding::Member),
            ("primary".into(), Binding::Primary),
        ]
    }

    fn validator(&self) -> Arc<dyn Validator> {
        Arc::new(
            Schema::new()
                .field("url", FieldRule::string().required().trim())
                .field("caption", FieldRule::string().trim())
                .field("owner", FieldRule::string())
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
            FieldAction::Create => &["url", "caption", "primary"],
            FieldAction::Update => &["caption", "primary"],
            FieldAction::Sort => &["caption", "created"],
            FieldAction::Select | FieldAction::Populate => return None,
        };
        Some(names.iter().map(|name| name.to_string()).collect())
    }

    /// New photos record the user they were uploaded under.
    fn data(&self, _req: &Request, verb: Verb, parent: Option<&Parent>, mut data: Fields) -> Fields {
        if verb == Verb::Post {
            if let Some(owner) = parent.and_then(Parent::document) {
                data.insert("owner".to_string(), Value::String(owner.id.to_string()));
            }
        }
        data
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use resource_framework::document::{Document, DocumentId};
    use serde_json::json;

    #[test]
    fn test_new_photos_record_their_owner() {
        let owner = Document::new("users", DocumentId::from("u1"), Fields::new());
        let parent = Parent::Resource(owner);
        let body = json!({"url": "a.png"}).as_object().cloned().unwrap();

        let created = PhotoResource.data(&Request::new(), Verb::Post, Some(&parent), body.clone());
        assert_eq!(created["owner"], json!("u1"));

        let updated = PhotoResource.data(&Request::new(), Verb::Put, Some(&parent), body);
        assert!(!updated.contains_key("owner"));
    }
}
