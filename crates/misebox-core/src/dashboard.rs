//! Dashboard: the signed-in user's landing screen.

use crate::navigation::{profile_toolbar, DashboardRoute, NavigationState, Route, Toolbar};
use crate::router::{DashboardRouter, Router, ScreenDescriptor};
use crate::state::AuthState;

pub const SIGN_OUT_LABEL: &str = "Sign Out";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DashboardView {
    /// Anonymous sessions get a single card inviting them to create an account
    Anonymous,
    Cards {
        user_card: ScreenDescriptor,
        role_card: Option<ScreenDescriptor>,
        sign_out: &'static str,
    },
}

pub struct Dashboard {
    router: DashboardRouter,
    navigation: NavigationState<DashboardRoute>,
}

impl Dashboard {
    pub fn new(router: DashboardRouter) -> Self {
        Self {
            router,
            navigation: NavigationState::new(),
        }
    }

    pub const fn navigation(&self) -> &NavigationState<DashboardRoute> {
        &self.navigation
    }

    pub const fn router(&self) -> &DashboardRouter {
        &self.router
    }

    pub fn view(&self, state: AuthState) -> DashboardView {
        if state.is_anonymous() {
            return DashboardView::Anonymous;
        }
        DashboardView::Cards {
            user_card: self.router.user_card(),
            role_card: self.router.role_card(),
            sign_out: SIGN_OUT_LABEL,
        }
    }

    /// Open the profile behind a card. The role card only exists when a role
    /// provider was configured; tapping it otherwise does nothing.
    pub fn tap(&self, route: DashboardRoute) -> bool {
        if route == DashboardRoute::Role && !self.router.has_role_card() {
            tracing::debug!("dash: no role card to tap");
            return false;
        }
        self.navigation.push(route);
        true
    }

    pub fn screen(&self) -> ScreenDescriptor {
        self.router.resolve_current(&self.navigation)
    }

    pub fn toolbar(&self) -> Toolbar {
        let title = self
            .navigation
            .current()
            .map_or_else(|| "Dashboard".to_string(), Route::display_name);
        profile_toolbar(&self.navigation, &title)
    }

    /// Return to the card list, e.g. after sign-out.
    pub fn reset(&self) {
        self.navigation.reset([]);
    }
}
