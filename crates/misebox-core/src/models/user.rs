//! User profile model

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::UserRole;
use crate::sync::{decode_fields, to_fields, Fields, SyncEntity};

/// Placeholder image shown until the user uploads one.
pub const DEFAULT_IMAGE_URL: &str = "https://misebox.app/assets/default-user.png";

/// The user record shared across the Misebox ecosystem.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    /// Document id; empty until assigned by authentication or hydration
    pub id: String,
    pub username: String,
    pub image_url: String,
    /// Set by the remote authority only
    pub verified: bool,
    pub roles: Vec<UserRole>,
}

/// Document layout of a user profile. Every field is optional so partial
/// snapshots only touch what they carry.
#[derive(Debug, Default, Serialize, Deserialize)]
struct UserDocument {
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    image_url: Option<String>,
    #[serde(default)]
    verified: Option<bool>,
    #[serde(default)]
    user_roles: Option<Vec<Fields>>,
}

impl UserProfile {
    /// Build a profile from a document id and its fields. A document without
    /// an image gets `placeholder`.
    pub fn from_document(id: &str, fields: &Fields, placeholder: &str) -> Result<Self> {
        let mut profile = Self {
            id: id.to_string(),
            ..Self::default()
        };
        profile.apply_fields(fields)?;
        profile.prime(placeholder);
        Ok(profile)
    }

    /// Fill the image url with `placeholder` when it is empty.
    ///
    /// Returns `true` when the value changed.
    pub fn prime(&mut self, placeholder: &str) -> bool {
        if self.image_url.trim().is_empty() {
            self.image_url = placeholder.to_string();
            return true;
        }
        false
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|held| held.role == role)
    }

    /// Add a role, replacing an existing one with the same tag in place.
    pub fn upsert_role(&mut self, role: UserRole) {
        if let Some(existing) = self.roles.iter_mut().find(|held| held.role == role.role) {
            *existing = role;
        } else {
            self.roles.push(role);
        }
    }

    /// Remove a role by tag, returning whether it was held.
    pub fn remove_role(&mut self, role: &str) -> bool {
        let before = self.roles.len();
        self.roles.retain(|held| held.role != role);
        self.roles.len() != before
    }
}

impl SyncEntity for UserProfile {
    fn document_id(&self) -> &str {
        &self.id
    }

    fn assign_id(&mut self, id: &str) {
        self.id = id.to_string();
    }

    fn to_fields(&self) -> Result<Fields> {
        to_fields(&UserDocument {
            username: Some(self.username.clone()),
            image_url: Some(self.image_url.clone()),
            verified: Some(self.verified),
            user_roles: Some(self.roles.iter().map(UserRole::to_fields).collect()),
        })
    }

    fn apply_fields(&mut self, fields: &Fields) -> Result<()> {
        let document: UserDocument = decode_fields(fields)?;
        let roles = document
            .user_roles
            .map(|roles| roles.iter().map(UserRole::from_fields).collect::<Result<Vec<_>>>())
            .transpose()?;

        if let Some(username) = document.username {
            self.username = username;
        }
        if let Some(image_url) = document.image_url {
            self.image_url = image_url;
        }
        if let Some(verified) = document.verified {
            self.verified = verified;
        }
        if let Some(roles) = roles {
            self.roles = roles;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::{json, Value};

    use super::*;
    use crate::error::Error;
    use crate::sync::DocumentSnapshot;

    fn fields(value: Value) -> Fields {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    fn sample_profile() -> UserProfile {
        UserProfile {
            id: "u1".to_string(),
            username: "ana".to_string(),
            image_url: "https://cdn.example.com/ana.png".to_string(),
            verified: false,
            roles: vec![
                UserRole::new("chef")
                    .unwrap()
                    .with_attribute("kitchen", "Nordic")
                    .unwrap(),
                UserRole::new("agent").unwrap(),
            ],
        }
    }

    #[test]
    fn document_layout_uses_remote_field_names() {
        let fields = sample_profile().to_fields().unwrap();
        assert_eq!(fields.get("username"), Some(&json!("ana")));
        assert_eq!(
            fields.get("image_url"),
            Some(&json!("https://cdn.example.com/ana.png"))
        );
        assert_eq!(fields.get("verified"), Some(&json!(false)));
        assert_eq!(
            fields.get("user_roles"),
            Some(&json!([{ "role": "chef", "kitchen": "Nordic" }, { "role": "agent" }]))
        );
        assert!(!fields.contains_key("id"));
    }

    #[test]
    fn rehydrating_serialized_fields_yields_equal_profile() {
        for roles in [Vec::new(), sample_profile().roles] {
            let profile = UserProfile {
                roles,
                ..sample_profile()
            };
            let restored = UserProfile::from_document("u1", &profile.to_fields().unwrap(), DEFAULT_IMAGE_URL)
                    .unwrap();
            assert_eq!(restored, profile);
        }
    }

    #[test]
    fn partial_fields_only_touch_present_keys() {
        let mut profile = sample_profile();
        profile
            .apply_fields(&fields(json!({ "verified": true })))
            .unwrap();

        let expected = UserProfile {
            verified: true,
            ..sample_profile()
        };
        assert_eq!(profile, expected);
    }

    #[test]
    fn malformed_payload_leaves_profile_untouched() {
        let mut profile = sample_profile();
        let error = profile
            .apply_fields(&fields(json!({
                "username": "changed",
                "user_roles": [{ "role": "chef" }, { "kitchen": "no tag" }]
            })))
            .unwrap_err();
        assert!(matches!(error, Error::Listener(_)));
        assert_eq!(profile, sample_profile());

        let error = profile
            .apply_fields(&fields(json!({ "username": "changed", "verified": "yes" })))
            .unwrap_err();
        assert!(matches!(error, Error::Listener(_)));
        assert_eq!(profile, sample_profile());
    }

    #[test]
    fn snapshot_for_another_document_is_rejected() {
        let mut profile = sample_profile();
        let snapshot = DocumentSnapshot {
            collection: "misebox-users".to_string(),
            id: "u2".to_string(),
            fields: fields(json!({ "username": "intruder" })),
        };
        assert!(profile.apply_snapshot(&snapshot).is_err());
        assert_eq!(profile.username, "ana");

        let mut fresh = UserProfile::default();
        fresh.apply_snapshot(&snapshot).unwrap();
        assert_eq!(fresh.id, "u2");
        assert_eq!(fresh.username, "intruder");
    }

    #[test]
    fn document_without_image_gets_placeholder() {
        let profile =
            UserProfile::from_document("u9", &fields(json!({ "username": "ana" })), DEFAULT_IMAGE_URL)
                .unwrap();
        assert_eq!(profile.username, "ana");
        assert_eq!(profile.image_url, DEFAULT_IMAGE_URL);

        let mut hydrated = sample_profile();
        hydrated
            .apply_fields(&fields(json!({ "username": "ana lind" })))
            .unwrap();
        assert_eq!(hydrated.image_url, "https://cdn.example.com/ana.png");
    }

    #[test]
    fn prime_only_fills_empty_image() {
        let mut profile = UserProfile::default();
        assert!(profile.prime(DEFAULT_IMAGE_URL));
        assert_eq!(profile.image_url, DEFAULT_IMAGE_URL);
        assert!(!profile.prime("https://other.example.com/x.png"));
        assert_eq!(profile.image_url, DEFAULT_IMAGE_URL);
    }

    #[test]
    fn upsert_and_remove_roles() {
        let mut profile = sample_profile();
        profile.upsert_role(
            UserRole::new("chef")
                .unwrap()
                .with_attribute("kitchen", "Basque")
                .unwrap(),
        );
        assert_eq!(profile.roles.len(), 2);
        assert_eq!(profile.roles[0].attribute("kitchen"), Some("Basque"));

        profile.upsert_role(UserRole::new("recruiter").unwrap());
        assert!(profile.has_role("recruiter"));
        assert!(profile.remove_role("agent"));
        assert!(!profile.remove_role("agent"));
        assert_eq!(profile.roles.len(), 2);
    }
}
