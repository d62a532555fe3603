//! # Validation
//!
//! The engine consumes validation through the [`Validator`] trait only. A validator sees the
//! whitelisted body of a create or update, may coerce values in place, and reports every
//! violation it finds; an empty list means the body is valid.
//!
//! [`Schema`] is a declarative validator in the spirit of document-store schemas:
//!
//! ```rust
//! use resource_framework::schema::{FieldRule, Schema, ValidationMode, Validator};
//! use serde_json::json;
//!
//! let schema = Schema::new()
//!     .field("username", FieldRule::string().required().trim().lowercase())
//!     .field("status", FieldRule::string().one_of(["active", "banned"]).default(json!("active")));
//!
//! let mut body = json!({"username": "  Alice "}).as_object().cloned().unwrap();
//! assert!(schema.validate(ValidationMode::Create, &mut body).is_empty());
//! assert_eq!(body["username"], json!("alice"));
//! assert_eq!(body["status"], json!("active"));
//! ```

use crate::document::Fields;
use crate::error::FieldError;
use indexmap::IndexMap;
use serde_json::{Number, Value};

pub const FIELD_REQUIRED: &str = "FIELD_REQUIRED";
pub const INVALID_FIELD_TYPE: &str = "INVALID_FIELD_TYPE";
pub const INVALID_FIELD_VALUE: &str = "INVALID_FIELD_VALUE";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationMode {
    Create,
    Update,
}

/// Validation collaborator.
pub trait Validator: Send + Sync {
    fn validate(&self, mode: ValidationMode, fields: &mut Fields) -> Vec<FieldError>;
}

/// Accepts every body unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAll;

impl Validator for AcceptAll {
    fn validate(&self, _mode: ValidationMode, _fields: &mut Fields) -> Vec<FieldError> {
        Vec::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    String,
    Number,
    Boolean,
    Array,
    Object,
    Any,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldRule {
    pub kind: FieldKind,
    /// Checked on create only; an update may omit the field but not null it.
    pub required: bool,
    pub one_of: Option<Vec<Value>>,
    pub lowercase: bool,
    pub trim: bool,
    /// Applied on create when the field is absent.
    pub default: Option<Value>,
}

impl FieldRule {
    pub fn of(kind: FieldKind) -> Self {
        Self {
            kind,
            required: false,
            one_of: None,
            lowercase: false,
            trim: false,
            default: None,
        }
    }

    pub fn string() -> Self {
        Self::of(FieldKind::String)
    }

    pub fn number() -> Self {
        Self::of(FieldKind::Number)
    }

    pub fn boolean() -> Self {
        Self::of(FieldKind::Boolean)
    }

    pub fn array() -> Self {
        Self::of(FieldKind::Array)
    }

    pub fn object() -> Self {
        Self::of(FieldKind::Object)
    }

    pub fn any() -> Self {
        Self::of(FieldKind::Any)
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn lowercase(mut self) -> Self {
        self.lowercase = true;
        self
    }

    pub fn trim(mut self) -> Self {
        self.trim = true;
        self
    }

    pub fn one_of<V: Into<Value>>(mut self, values: impl IntoIterator<Item = V>) -> Self {
        self.one_of = Some(values.into_iter().map(Into::into).collect());
        self
    }

    pub fn default(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    /// Casts `value` to the rule's kind, applying string coercions.
    fn coerce(&self, value: &Value) -> Option<Value> {
        match (self.kind, value) {
            (FieldKind::String, Value::String(s)) => {
                let mut s = if self.trim { s.trim().to_string() } else { s.clone() };
                if self.lowercase {
                    s = s.to_lowercase();
                }
                Some(Value::String(s))
            }
            (FieldKind::String, Value::Number(n)) => Some(Value::String(n.to_string())),
            (FieldKind::Number, Value::Number(_)) => Some(value.clone()),
            (FieldKind::Number, Value::String(s)) => parse_number(s.trim()),
            (FieldKind::Boolean, Value::Bool(_)) => Some(value.clone()),
            (FieldKind::Boolean, Value::String(s)) => match s.as_str() {
                "true" => Some(Value::Bool(true)),
                "false" => Some(Value::Bool(false)),
                _ => None,
            },
            (FieldKind::Array, Value::Array(_))
            | (FieldKind::Object, Value::Object(_))
            | (FieldKind::Any, _) => Some(value.clone()),
            _ => None,
        }
    }
}

fn parse_number(raw: &str) -> Option<Value> {
    if let Ok(int) = raw.parse::<i64>() {
        return Some(Value::from(int));
    }
    raw.parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map(Value::Number)
}

/// Declarative validator. Fields without a rule pass through untouched.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    rules: IndexMap<String, FieldRule>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, name: impl Into<String>, rule: FieldRule) -> Self {
        self.rules.insert(name.into(), rule);
        self
    }

    pub fn rule(&self, name: &str) -> Option<&FieldRule> {
        self.rules.get(name)
    }
}

impl Validator for Schema {
    fn validate(&self, mode: ValidationMode, fields: &mut Fields) -> Vec<FieldError> {
        let mut errors = Vec::new();

        for (name, rule) in &self.rules {
            let present = fields.get(name).filter(|value| !value.is_null()).cloned();
            let Some(value) = present else {
                match mode {
                    ValidationMode::Create => {
                        if let Some(default) = &rule.default {
                            fields.insert(name.clone(), default.clone());
                        } else if rule.required {
                            errors.push(FieldError::new(name, FIELD_REQUIRED));
                        }
                    }
                    ValidationMode::Update => {
                        if rule.required && fields.contains_key(name) {
                            errors.push(FieldError::new(name, FIELD_REQUIRED));
                        }
                    }
                }
                continue;
            };

            let Some(coerced) = rule.coerce(&value) else {
                errors.push(
                    FieldError::new(name, INVALID_FIELD_TYPE)
                        .with_message(format!("Expected {:?}", rule.kind).to_lowercase()),
                );
                continue;
            };
            if rule.required && coerced.as_str() == Some("") {
                errors.push(FieldError::new(name, FIELD_REQUIRED));
                continue;
            }
            if let Some(allowed) = &rule.one_of {
                if !allowed.contains(&coerced) {
                    errors.push(FieldError::new(name, INVALID_FIELD_VALUE));
                    continue;
                }
            }
            fields.insert(name.clone(), coerced);
        }

        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn body(value: Value) -> Fields {
        value.as_object().cloned().unwrap()
    }

    fn schema() -> Schema {
        Schema::new()
            .field("username", FieldRule::string().required().trim().lowercase())
            .field("age", FieldRule::number())
            .field("status", FieldRule::string().one_of(["active", "banned"]).default(json!("active")))
            .field("tags", FieldRule::array())
    }

    #[test]
    fn test_create_applies_defaults_and_coercions() {
        let mut fields = body(json!({"username": " Bob ", "age": "42", "extra": 1}));
        let errors = schema().validate(ValidationMode::Create, &mut fields);

        assert!(errors.is_empty());
        assert_eq!(
            Value::Object(fields),
            json!({"username": "bob", "age": 42, "status": "active", "extra": 1})
        );
    }

    #[test]
    fn test_required_only_on_create() {
        let mut fields = body(json!({"age": 3}));
        let errors = schema().validate(ValidationMode::Create, &mut fields);
        assert_eq!(errors, vec![FieldError::new("username", FIELD_REQUIRED)]);

        let mut fields = body(json!({"age": 3}));
        assert!(schema().validate(ValidationMode::Update, &mut fields).is_empty());

        let mut fields = body(json!({"username": null}));
        let errors = schema().validate(ValidationMode::Update, &mut fields);
        assert_eq!(errors[0].code, FIELD_REQUIRED);
    }

    #[test]
    fn test_every_violation_reported() {
        let mut fields = body(json!({"username": "", "age": "old", "status": "gone", "tags": "x"}));
        let errors = schema().validate(ValidationMode::Create, &mut fields);

        let tagged: Vec<(&str, &str)> = errors
            .iter()
            .map(|e| (e.field.as_str(), e.code.as_str()))
            .collect();
        assert_eq!(
            tagged,
            vec![
                ("username", FIELD_REQUIRED),
                ("age", INVALID_FIELD_TYPE),
                ("status", INVALID_FIELD_VALUE),
                ("tags", INVALID_FIELD_TYPE),
            ]
        );
    }

    #[test]
    fn test_accept_all() {
        let mut fields = body(json!({"anything": [1, 2]}));
        assert!(AcceptAll.validate(ValidationMode::Create, &mut fields).is_empty());
    }
}
