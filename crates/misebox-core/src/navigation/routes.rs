//! Route registries.
//!
//! The app-wide menu and the dashboard sub-menu are separate enumerations so
//! a dashboard route can never end up on the global path.

use std::fmt::Debug;

use crate::util::capitalize;

/// A closed set of screen identifiers.
pub trait Route: Copy + Eq + Debug + Send + Sync + 'static {
    /// Every route of the registry, in menu order.
    const ALL: &'static [Self];

    /// Stable lowercase identifier.
    fn key(self) -> &'static str;

    /// Symbol name of the route's icon; empty when the route has none.
    fn icon_name(self) -> &'static str;

    fn display_name(self) -> String {
        capitalize(self.key())
    }

    fn from_key(key: &str) -> Option<Self> {
        let key = key.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|route| route.key().eq_ignore_ascii_case(key))
    }
}

/// App-wide destinations reachable from the main toolbar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GlobalRoute {
    Option1,
    Option2,
    Notifs,
    Chats,
}

impl Route for GlobalRoute {
    const ALL: &'static [Self] = &[Self::Option1, Self::Option2, Self::Notifs, Self::Chats];

    fn key(self) -> &'static str {
        match self {
            Self::Option1 => "option1",
            Self::Option2 => "option2",
            Self::Notifs => "notifs",
            Self::Chats => "chats",
        }
    }

    fn icon_name(self) -> &'static str {
        match self {
            Self::Option1 | Self::Option2 => "",
            Self::Notifs => "bell.fill",
            Self::Chats => "message.fill",
        }
    }
}

/// Destinations inside an authenticated dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DashboardRoute {
    User,
    Role,
}

impl Route for DashboardRoute {
    const ALL: &'static [Self] = &[Self::User, Self::Role];

    fn key(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Role => "role",
        }
    }

    fn icon_name(self) -> &'static str {
        match self {
            Self::User => "person.crop.circle",
            Self::Role => "person.badge.key",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_capitalize_keys() {
        let names: Vec<_> = GlobalRoute::ALL
            .iter()
            .map(|route| route.display_name())
            .collect();
        assert_eq!(names, vec!["Option1", "Option2", "Notifs", "Chats"]);
        assert_eq!(DashboardRoute::Role.display_name(), "Role");
    }

    #[test]
    fn only_shortcuts_carry_icons() {
        assert_eq!(GlobalRoute::Option1.icon_name(), "");
        assert_eq!(GlobalRoute::Notifs.icon_name(), "bell.fill");
        assert_eq!(GlobalRoute::Chats.icon_name(), "message.fill");
    }

    #[test]
    fn from_key_is_case_insensitive_and_registry_scoped() {
        assert_eq!(GlobalRoute::from_key(" Notifs "), Some(GlobalRoute::Notifs));
        assert_eq!(GlobalRoute::from_key("user"), None);
        assert_eq!(DashboardRoute::from_key("user"), Some(DashboardRoute::User));
        assert_eq!(DashboardRoute::from_key("chats"), None);
    }
}
