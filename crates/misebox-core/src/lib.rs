//! misebox-core - Core library for the Misebox client
//!
//! This crate contains the user models, navigation state, routers, session
//! management and document sync adapter used by every Misebox interface.

pub mod auth;
pub mod config;
pub mod context;
pub mod dashboard;
pub mod error;
pub mod models;
pub mod navigation;
pub mod onboarding;
pub mod router;
pub mod session;
pub mod state;
pub mod sync;
pub mod util;

pub use context::AppContext;
pub use error::{Error, Result};
pub use models::{ExtendedProfile, FullName, UserProfile, UserRole};
pub use navigation::{DashboardRoute, GlobalRoute, NavigationState, Route};
pub use session::{SessionManager, VerifyOutcome};
pub use state::AuthState;
