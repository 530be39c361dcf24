//! Client configuration.
//!
//! `ClientConfig` carries collection names, onboarding copy, menu labels and
//! the optional Supabase endpoint. It is read from a JSON file and then
//! overlaid by environment variables.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::models::DEFAULT_IMAGE_URL;
use crate::util::{is_http_url, normalize_text_option};

pub const DEFAULT_USERS_COLLECTION: &str = "misebox-users";
pub const DEFAULT_PROFILES_COLLECTION: &str = "misebox-user-profiles";

const ENV_USERS_COLLECTION: &str = "MISEBOX_USERS_COLLECTION";
const ENV_PROFILES_COLLECTION: &str = "MISEBOX_PROFILES_COLLECTION";
const ENV_DEFAULT_IMAGE_URL: &str = "MISEBOX_DEFAULT_IMAGE_URL";
const ENV_SUPABASE_URL: &str = "SUPABASE_URL";
const ENV_SUPABASE_ANON_KEY: &str = "SUPABASE_ANON_KEY";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct ClientConfig {
    pub users_collection: String,
    pub profiles_collection: String,
    /// Placeholder used to prime profiles without an image
    pub default_image_url: String,
    pub welcome: String,
    pub motto: String,
    pub small_print: String,
    /// Root menu entries of the main toolbar
    pub option1_label: String,
    pub option2_label: String,
    pub supabase_url: Option<String>,
    pub supabase_anon_key: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            users_collection: DEFAULT_USERS_COLLECTION.to_string(),
            profiles_collection: DEFAULT_PROFILES_COLLECTION.to_string(),
            default_image_url: DEFAULT_IMAGE_URL.to_string(),
            welcome: "Welcome to Misebox".to_string(),
            motto: "Where kitchens find their people".to_string(),
            small_print: "By continuing you accept our terms of service".to_string(),
            option1_label: "Option 1".to_string(),
            option2_label: "Option 2".to_string(),
            supabase_url: None,
            supabase_anon_key: None,
        }
    }
}

impl ClientConfig {
    /// Parse a JSON config payload and validate it.
    pub fn parse(payload: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(payload)
            .map_err(|error| Error::Config(format!("invalid config JSON: {error}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|error| {
            Error::Config(format!("failed to read config at {}: {error}", path.display()))
        })?;
        Self::parse(&raw)
    }

    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Overlay values from the process environment.
    #[must_use]
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Overlay values from `lookup`; blank values are ignored.
    #[must_use]
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let read = |key: &str| normalize_text_option(lookup(key));

        if let Some(value) = read(ENV_USERS_COLLECTION) {
            self.users_collection = value;
        }
        if let Some(value) = read(ENV_PROFILES_COLLECTION) {
            self.profiles_collection = value;
        }
        if let Some(value) = read(ENV_DEFAULT_IMAGE_URL) {
            self.default_image_url = value;
        }
        if let Some(value) = read(ENV_SUPABASE_URL) {
            self.supabase_url = Some(value);
        }
        if let Some(value) = read(ENV_SUPABASE_ANON_KEY) {
            self.supabase_anon_key = Some(value);
        }
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.users_collection.trim().is_empty() || self.profiles_collection.trim().is_empty() {
            return Err(Error::Config("collection names must not be empty".to_string()));
        }
        if self.users_collection == self.profiles_collection {
            return Err(Error::Config(
                "users and profiles must live in different collections".to_string(),
            ));
        }
        if !is_http_url(self.default_image_url.trim()) {
            return Err(Error::Config(
                "default_image_url must include http:// or https://".to_string(),
            ));
        }
        Ok(())
    }

    /// Messages cycled on the sign-in screen.
    pub fn welcome_messages(&self) -> Vec<String> {
        vec![
            self.welcome.clone(),
            self.motto.clone(),
            self.small_print.clone(),
        ]
    }
}
