//! User role model

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::sync::Fields;
use crate::util::normalize_key;

/// Field key holding the role tag inside a flat role map.
pub const ROLE_TAG_KEY: &str = "role";

/// A role held by a user: a tag plus free-form string attributes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRole {
    /// Role tag, e.g. `chef` or `recruiter`
    pub role: String,
    /// Associated attributes (never contains the `role` key)
    pub attributes: BTreeMap<String, String>,
}

impl UserRole {
    /// Create a role with no attributes.
    ///
    /// The tag is trimmed and lowercased.
    pub fn new(role: impl AsRef<str>) -> Result<Self> {
        let role = normalize_key(role.as_ref());
        if role.is_empty() {
            return Err(Error::InvalidInput("Role tag must not be empty".to_string()));
        }
        Ok(Self {
            role,
            attributes: BTreeMap::new(),
        })
    }

    /// Attach an attribute, rejecting the reserved `role` key.
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Result<Self> {
        let key = key.into();
        if key == ROLE_TAG_KEY || key.trim().is_empty() {
            return Err(Error::InvalidInput(format!(
                "'{key}' cannot be used as a role attribute name"
            )));
        }
        self.attributes.insert(key, value.into());
        Ok(self)
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    /// Flatten into the document form `{ "role": tag, attr: value, ... }`.
    pub fn to_fields(&self) -> Fields {
        let mut fields = Fields::new();
        fields.insert(ROLE_TAG_KEY.to_string(), Value::String(self.role.clone()));
        for (key, value) in &self.attributes {
            fields.insert(key.clone(), Value::String(value.clone()));
        }
        fields
    }

    /// Rebuild a role from its flat document form.
    pub fn from_fields(fields: &Fields) -> Result<Self> {
        let role = match fields.get(ROLE_TAG_KEY) {
            Some(Value::String(role)) if role.trim().is_empty() => {
                return Err(Error::Listener("role tag must not be empty".to_string()));
            }
            Some(Value::String(role)) => role.clone(),
            Some(other) => {
                return Err(Error::Listener(format!("role tag must be a string, got {other}")));
            }
            None => return Err(Error::Listener("role entry is missing its tag".to_string())),
        };

        let mut attributes = BTreeMap::new();
        for (key, value) in fields {
            if key == ROLE_TAG_KEY {
                continue;
            }
            let Value::String(value) = value else {
                return Err(Error::Listener(format!(
                    "role attribute '{key}' must be a string"
                )));
            };
            attributes.insert(key.clone(), value.clone());
        }

        Ok(Self { role, attributes })
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    fn fields(value: Value) -> Fields {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn new_normalizes_tag() {
        let role = UserRole::new("  Chef ").unwrap();
        assert_eq!(role.role, "chef");
        assert!(UserRole::new("   ").is_err());
    }

    #[test]
    fn with_attribute_rejects_reserved_key() {
        let error = UserRole::new("chef").unwrap().with_attribute("role", "x");
        assert!(error.is_err());
    }

    #[test]
    fn flat_form_round_trips() {
        let role = UserRole::new("recruiter")
            .unwrap()
            .with_attribute("agency", "Kitchen Talent")
            .unwrap()
            .with_attribute("region", "Berlin")
            .unwrap();

        let flat = role.to_fields();
        assert_eq!(flat.get("role"), Some(&json!("recruiter")));
        assert_eq!(flat.get("agency"), Some(&json!("Kitchen Talent")));
        assert_eq!(UserRole::from_fields(&flat).unwrap(), role);
    }

    #[test]
    fn from_fields_rejects_missing_tag_and_non_string_attributes() {
        assert!(UserRole::from_fields(&fields(json!({ "agency": "x" }))).is_err());
        assert!(UserRole::from_fields(&fields(json!({ "role": 3 }))).is_err());
        assert!(UserRole::from_fields(&fields(json!({ "role": "chef", "stars": 2 }))).is_err());
    }

    #[test]
    fn blank_tag_is_reported_as_empty() {
        for tag in ["", "   "] {
            let error = UserRole::from_fields(&fields(json!({ "role": tag }))).unwrap_err();
            assert_eq!(error.to_string(), "Listener error: role tag must not be empty");
        }
        let error = UserRole::from_fields(&fields(json!({ "role": 3 }))).unwrap_err();
        assert_eq!(error.to_string(), "Listener error: role tag must be a string, got 3");
    }
}
