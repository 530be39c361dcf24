//! Extended profile model: structured name and linked sign-in providers

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::sync::{decode_fields, to_fields, Fields, SyncEntity};

/// A person's name split into its parts; any part may be empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FullName {
    #[serde(default)]
    pub first: String,
    #[serde(default)]
    pub middle: String,
    #[serde(default)]
    pub last: String,
}

impl FullName {
    pub fn new(first: impl Into<String>, middle: impl Into<String>, last: impl Into<String>) -> Self {
        Self {
            first: first.into(),
            middle: middle.into(),
            last: last.into(),
        }
    }

    /// Non-empty parts joined by single spaces.
    pub fn display(&self) -> String {
        [&self.first, &self.middle, &self.last]
            .into_iter()
            .map(|part| part.trim())
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Companion record of [`crate::models::UserProfile`], keyed by the same id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtendedProfile {
    pub id: String,
    pub full_name: FullName,
    /// Provider names in link order, without duplicates
    pub account_providers: Vec<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct ProfileDocument {
    #[serde(default)]
    full_name: Option<FullName>,
    #[serde(default)]
    account_providers: Option<Vec<String>>,
}

impl ExtendedProfile {
    /// First name only.
    pub fn name(&self) -> &str {
        &self.full_name.first
    }

    pub fn display_name(&self) -> String {
        self.full_name.display()
    }

    /// Record a provider; returns `false` when it was already linked.
    pub fn link_provider(&mut self, provider: &str) -> bool {
        if self.account_providers.iter().any(|linked| linked == provider) {
            return false;
        }
        self.account_providers.push(provider.to_string());
        true
    }
}

impl SyncEntity for ExtendedProfile {
    fn document_id(&self) -> &str {
        &self.id
    }

    fn assign_id(&mut self, id: &str) {
        self.id = id.to_string();
    }

    fn to_fields(&self) -> Result<Fields> {
        to_fields(&ProfileDocument {
            full_name: Some(self.full_name.clone()),
            account_providers: Some(self.account_providers.clone()),
        })
    }

    fn apply_fields(&mut self, fields: &Fields) -> Result<()> {
        let document: ProfileDocument = decode_fields(fields)?;
        if let Some(full_name) = document.full_name {
            self.full_name = full_name;
        }
        if let Some(providers) = document.account_providers {
            self.account_providers = providers;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::{json, Value};

    use super::*;

    #[test]
    fn display_skips_empty_parts() {
        assert_eq!(FullName::new("Ana", "", "Lopez").display(), "Ana Lopez");
        assert_eq!(FullName::new("Ana", "Maria", "Lopez").display(), "Ana Maria Lopez");
        assert_eq!(FullName::default().display(), "");
    }

    #[test]
    fn link_provider_deduplicates() {
        let mut profile = ExtendedProfile::default();
        assert!(profile.link_provider("google"));
        assert!(!profile.link_provider("google"));
        assert!(profile.link_provider("email"));
        assert_eq!(profile.account_providers, vec!["google", "email"]);
    }

    #[test]
    fn fields_round_trip() {
        let profile = ExtendedProfile {
            id: "u1".to_string(),
            full_name: FullName::new("Ana", "", "Lopez"),
            account_providers: vec!["apple".to_string()],
        };
        let fields = profile.to_fields().unwrap();
        assert_eq!(
            Value::Object(fields.clone()),
            json!({
                "full_name": { "first": "Ana", "middle": "", "last": "Lopez" },
                "account_providers": ["apple"]
            })
        );

        let mut restored = ExtendedProfile {
            id: "u1".to_string(),
            ..ExtendedProfile::default()
        };
        restored.apply_fields(&fields).unwrap();
        assert_eq!(restored, profile);
    }
}
