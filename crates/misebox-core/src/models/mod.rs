//! Data models for Misebox

mod profile;
mod role;
mod user;

pub use profile::{ExtendedProfile, FullName};
pub use role::{UserRole, ROLE_TAG_KEY};
pub use user::{UserProfile, DEFAULT_IMAGE_URL};
