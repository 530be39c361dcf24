//! Application context: the explicit composition root.
//!
//! Screens receive the pieces they need from here instead of looking them
//! up. The context owns the global navigation, the dashboard, the session and
//! the sign-in screen state.

use std::sync::Arc;

use crate::auth::{AuthProvider, CredentialKind};
use crate::config::ClientConfig;
use crate::dashboard::{Dashboard, DashboardView};
use crate::error::Result;
use crate::navigation::{
    apply_main_action, main_toolbar, GlobalRoute, MenuLabels, NavigationState, Toolbar,
    ToolbarAction,
};
use crate::onboarding::{Gate, SignInScreen};
use crate::router::{DashboardRouter, GlobalRouter, Router, ScreenDescriptor, StaticScreen};
use crate::session::{SessionManager, VerifyOutcome};
use crate::sync::DocumentStore;

pub struct AppContext {
    pub navigation: NavigationState<GlobalRoute>,
    pub router: GlobalRouter,
    pub dashboard: Dashboard,
    pub session: SessionManager,
    pub onboarding: SignInScreen,
    labels: MenuLabels,
}

impl AppContext {
    /// Wire a context with the default screen providers.
    pub fn new(
        config: ClientConfig,
        auth: Arc<dyn AuthProvider>,
        store: Arc<dyn DocumentStore>,
    ) -> Self {
        let router = GlobalRouter::new(Box::new(StaticScreen::new("dashboard", "Dashboard")));
        let dashboard = Dashboard::new(DashboardRouter::new(
            Box::new(StaticScreen::new("user-profile", "Profile")),
            Box::new(StaticScreen::new("user-card", "User")),
        ));
        Self::with_routers(config, auth, store, router, dashboard)
    }

    pub fn with_routers(
        config: ClientConfig,
        auth: Arc<dyn AuthProvider>,
        store: Arc<dyn DocumentStore>,
        router: GlobalRouter,
        dashboard: Dashboard,
    ) -> Self {
        Self {
            navigation: NavigationState::new(),
            router,
            dashboard,
            onboarding: SignInScreen::new(&config),
            labels: MenuLabels::from(&config),
            session: SessionManager::new(auth, store, config),
        }
    }

    pub const fn gate(&self) -> Gate {
        Gate::for_state(self.session.state())
    }

    pub fn toolbar(&self) -> Toolbar {
        main_toolbar(&self.navigation, &self.labels)
    }

    pub fn apply(&self, action: ToolbarAction) {
        apply_main_action(action, &self.navigation);
    }

    /// Descriptor of the visible main screen.
    pub fn screen(&self) -> ScreenDescriptor {
        self.router.resolve_current(&self.navigation)
    }

    pub fn dashboard_view(&self) -> DashboardView {
        self.dashboard.view(self.session.state())
    }

    /// Sign in with the credential built from the sign-in screen, recording
    /// the outcome on its inline message line.
    pub async fn sign_in(&mut self, kind: CredentialKind) -> Result<VerifyOutcome> {
        let result = match self.onboarding.request(kind) {
            Ok(credential) => self.session.verify(credential).await,
            Err(error) => Err(error),
        };
        self.onboarding.record_result(&result);
        result
    }

    /// Sign out and return every navigation stack to its root.
    pub async fn sign_out(&mut self) {
        self.session.sign_out().await;
        self.navigation.reset([]);
        self.dashboard.reset();
    }
}
