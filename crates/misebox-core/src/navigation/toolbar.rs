//! Toolbar models derived from navigation depth.

use super::{GlobalRoute, NavigationState, Route};
use crate::config::ClientConfig;

const MENU_ICON: &str = "star";
const BACK_ICON: &str = "chevron.left";
const BACK_LABEL: &str = "Back";
const HELP_LABEL: &str = "Help";

/// Labels of the two root menu entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuLabels {
    pub option1: String,
    pub option2: String,
}

impl From<&ClientConfig> for MenuLabels {
    fn from(config: &ClientConfig) -> Self {
        Self {
            option1: config.option1_label.clone(),
            option2: config.option2_label.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolbarAction {
    SelectOption1,
    SelectOption2,
    OpenNotifs,
    OpenChats,
    Back,
    Help,
}

impl ToolbarAction {
    /// Route a menu or shortcut action jumps to.
    pub const fn destination(self) -> Option<GlobalRoute> {
        match self {
            Self::SelectOption1 => Some(GlobalRoute::Option1),
            Self::SelectOption2 => Some(GlobalRoute::Option2),
            Self::OpenNotifs => Some(GlobalRoute::Notifs),
            Self::OpenChats => Some(GlobalRoute::Chats),
            Self::Back | Self::Help => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuEntry {
    pub label: String,
    pub action: ToolbarAction,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolbarItem {
    Menu {
        icon: &'static str,
        entries: Vec<MenuEntry>,
    },
    Back {
        icon: &'static str,
        label: &'static str,
    },
    Title(String),
    Button {
        icon: &'static str,
        label: String,
        action: ToolbarAction,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Toolbar {
    pub leading: Vec<ToolbarItem>,
    pub trailing: Vec<ToolbarItem>,
}

impl Toolbar {
    pub fn shows_back(&self) -> bool {
        self.leading
            .iter()
            .any(|item| matches!(item, ToolbarItem::Back { .. }))
    }
}

const fn back_item() -> ToolbarItem {
    ToolbarItem::Back {
        icon: BACK_ICON,
        label: BACK_LABEL,
    }
}

fn shortcut(route: GlobalRoute, action: ToolbarAction) -> ToolbarItem {
    ToolbarItem::Button {
        icon: route.icon_name(),
        label: route.display_name(),
        action,
    }
}

/// Main toolbar: root menu at depth zero, back button otherwise, plus the
/// notification and chat shortcuts.
pub fn main_toolbar(nav: &NavigationState<GlobalRoute>, labels: &MenuLabels) -> Toolbar {
    let leading = if nav.is_root() {
        ToolbarItem::Menu {
            icon: MENU_ICON,
            entries: vec![
                MenuEntry {
                    label: labels.option1.clone(),
                    action: ToolbarAction::SelectOption1,
                },
                MenuEntry {
                    label: labels.option2.clone(),
                    action: ToolbarAction::SelectOption2,
                },
            ],
        }
    } else {
        back_item()
    };

    Toolbar {
        leading: vec![leading],
        trailing: vec![
            shortcut(GlobalRoute::Notifs, ToolbarAction::OpenNotifs),
            shortcut(GlobalRoute::Chats, ToolbarAction::OpenChats),
        ],
    }
}

/// Toolbar of profile screens: optional back button, title, help.
pub fn profile_toolbar<R: Route>(nav: &NavigationState<R>, title: &str) -> Toolbar {
    let mut leading = Vec::with_capacity(2);
    if !nav.is_root() {
        leading.push(back_item());
    }
    leading.push(ToolbarItem::Title(title.to_string()));

    Toolbar {
        leading,
        trailing: vec![ToolbarItem::Button {
            icon: "",
            label: HELP_LABEL.to_string(),
            action: ToolbarAction::Help,
        }],
    }
}

/// Apply a main toolbar action. Menu and shortcut selections replace the
/// whole path with a single route; they never append.
pub fn apply_main_action(action: ToolbarAction, nav: &NavigationState<GlobalRoute>) {
    if let Some(route) = action.destination() {
        nav.reset([route]);
        return;
    }
    apply_profile_action(action, nav);
}

/// Apply a profile toolbar action on any navigation registry.
pub fn apply_profile_action<R: Route>(action: ToolbarAction, nav: &NavigationState<R>) {
    match action {
        ToolbarAction::Back => {
            nav.pop();
        }
        ToolbarAction::Help => tracing::info!("Help tapped"),
        other => tracing::debug!("Ignoring {:?} on a profile toolbar", other),
    }
}
