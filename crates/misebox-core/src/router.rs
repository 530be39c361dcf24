//! Route resolution.
//!
//! Routers map a route token to a [`ScreenDescriptor`]. They hold no
//! navigation state and have no side effects. Each registry has its own
//! router type, so the global menu and the dashboard sub-menu stay apart.

use serde::Serialize;

use crate::navigation::{DashboardRoute, GlobalRoute, NavigationState, Route};

/// What the rendering layer should show.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScreenDescriptor {
    /// Nothing configured for this destination
    Empty,
    Screen { id: String, title: String },
}

impl ScreenDescriptor {
    pub fn screen(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self::Screen {
            id: id.into(),
            title: title.into(),
        }
    }

    pub const fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }
}

/// Anything that can render itself into a descriptor.
pub trait ScreenProvider: Send + Sync {
    fn render(&self) -> ScreenDescriptor;
}

/// A provider that always renders the same screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticScreen {
    id: String,
    title: String,
}

impl StaticScreen {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
        }
    }
}

impl ScreenProvider for StaticScreen {
    fn render(&self) -> ScreenDescriptor {
        ScreenDescriptor::screen(self.id.clone(), self.title.clone())
    }
}

/// Resolve an optional provider, falling back to [`ScreenDescriptor::Empty`].
pub fn render_optional(provider: Option<&dyn ScreenProvider>) -> ScreenDescriptor {
    provider.map_or(ScreenDescriptor::Empty, ScreenProvider::render)
}

pub trait Router {
    type Route: Route;

    fn resolve(&self, route: Self::Route) -> ScreenDescriptor;

    /// Screen shown when the path is empty.
    fn root(&self) -> ScreenDescriptor;

    fn resolve_current(&self, nav: &NavigationState<Self::Route>) -> ScreenDescriptor {
        nav.current()
            .map_or_else(|| self.root(), |route| self.resolve(route))
    }
}

/// Router of the app-wide menu.
pub struct GlobalRouter {
    root: Box<dyn ScreenProvider>,
    notifications: Box<dyn ScreenProvider>,
    chats: Box<dyn ScreenProvider>,
}

impl GlobalRouter {
    pub fn new(root: Box<dyn ScreenProvider>) -> Self {
        Self {
            root,
            notifications: Box::new(StaticScreen::new("notifications", "Notifications")),
            chats: Box::new(StaticScreen::new("chats", "Chats")),
        }
    }

    #[must_use]
    pub fn with_notifications(mut self, provider: Box<dyn ScreenProvider>) -> Self {
        self.notifications = provider;
        self
    }

    #[must_use]
    pub fn with_chats(mut self, provider: Box<dyn ScreenProvider>) -> Self {
        self.chats = provider;
        self
    }
}

impl Router for GlobalRouter {
    type Route = GlobalRoute;

    fn resolve(&self, route: GlobalRoute) -> ScreenDescriptor {
        match route {
            GlobalRoute::Notifs => self.notifications.render(),
            GlobalRoute::Chats => self.chats.render(),
            GlobalRoute::Option1 | GlobalRoute::Option2 => ScreenDescriptor::Empty,
        }
    }

    fn root(&self) -> ScreenDescriptor {
        self.root.render()
    }
}

/// Router of the dashboard sub-menu.
///
/// The user screens are always present; role screens only exist for apps
/// built around a specific role.
pub struct DashboardRouter {
    home: Box<dyn ScreenProvider>,
    user_profile: Box<dyn ScreenProvider>,
    user_card: Box<dyn ScreenProvider>,
    role_profile: Option<Box<dyn ScreenProvider>>,
    role_card: Option<Box<dyn ScreenProvider>>,
}

impl DashboardRouter {
    pub fn new(user_profile: Box<dyn ScreenProvider>, user_card: Box<dyn ScreenProvider>) -> Self {
        Self {
            home: Box::new(StaticScreen::new("dashboard", "Dashboard")),
            user_profile,
            user_card,
            role_profile: None,
            role_card: None,
        }
    }

    #[must_use]
    pub fn with_role(
        mut self,
        role_profile: Option<Box<dyn ScreenProvider>>,
        role_card: Option<Box<dyn ScreenProvider>>,
    ) -> Self {
        self.role_profile = role_profile;
        self.role_card = role_card;
        self
    }

    #[must_use]
    pub fn with_home(mut self, home: Box<dyn ScreenProvider>) -> Self {
        self.home = home;
        self
    }

    pub fn user_card(&self) -> ScreenDescriptor {
        self.user_card.render()
    }

    pub fn role_card(&self) -> Option<ScreenDescriptor> {
        self.role_card.as_deref().map(ScreenProvider::render)
    }

    pub const fn has_role_card(&self) -> bool {
        self.role_card.is_some()
    }
}

impl Router for DashboardRouter {
    type Route = DashboardRoute;

    fn resolve(&self, route: DashboardRoute) -> ScreenDescriptor {
        match route {
            DashboardRoute::User => self.user_profile.render(),
            DashboardRoute::Role => render_optional(self.role_profile.as_deref()),
        }
    }

    fn root(&self) -> ScreenDescriptor {
        self.home.render()
    }
}
