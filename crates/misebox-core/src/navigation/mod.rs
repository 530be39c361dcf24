//! Navigation state: a push-down path of route tokens.
//!
//! The path is held in an [`Observable`], so every screen holding a
//! reference can mutate it and every subscriber is told to redraw. An empty
//! path means the root screen is visible.

mod routes;
mod toolbar;

use tokio::sync::watch;

use crate::state::Observable;

pub use routes::{DashboardRoute, GlobalRoute, Route};
pub use toolbar::{
    apply_main_action, apply_profile_action, main_toolbar, profile_toolbar, MenuEntry,
    MenuLabels, Toolbar, ToolbarAction, ToolbarItem,
};

#[derive(Debug)]
pub struct NavigationState<R: Route> {
    path: Observable<Vec<R>>,
}

impl<R: Route> Default for NavigationState<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Route> NavigationState<R> {
    pub fn new() -> Self {
        Self {
            path: Observable::new(Vec::new()),
        }
    }

    /// Append a route; the new route becomes the visible screen.
    pub fn push(&self, route: R) {
        tracing::debug!("nav: push {:?}", route);
        self.path.modify(|path| path.push(route));
    }

    /// Drop the visible route. Popping the root is a silent no-op.
    pub fn pop(&self) -> Option<R> {
        let mut removed = None;
        self.path.modify_if(|path| {
            removed = path.pop();
            removed.is_some()
        });
        match removed {
            Some(route) => tracing::debug!("nav: pop {:?}", route),
            None => tracing::debug!("nav: pop ignored at root"),
        }
        removed
    }

    /// Replace the whole history, e.g. when jumping from a menu.
    pub fn reset(&self, routes: impl IntoIterator<Item = R>) {
        let routes: Vec<R> = routes.into_iter().collect();
        tracing::debug!("nav: reset to {:?}", routes);
        self.path.set(routes);
    }

    pub fn current_depth(&self) -> usize {
        self.path.with(Vec::len)
    }

    pub fn is_root(&self) -> bool {
        self.current_depth() == 0
    }

    /// The visible route, or `None` at the root screen.
    pub fn current(&self) -> Option<R> {
        self.path.with(|path| path.last().copied())
    }

    pub fn path(&self) -> Vec<R> {
        self.path.get()
    }

    pub fn subscribe(&self) -> watch::Receiver<Vec<R>> {
        self.path.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn push_appends_and_current_is_last() {
        let nav = NavigationState::new();
        assert!(nav.is_root());
        assert_eq!(nav.current(), None);

        nav.push(GlobalRoute::Notifs);
        nav.push(GlobalRoute::Chats);
        assert_eq!(nav.path(), vec![GlobalRoute::Notifs, GlobalRoute::Chats]);
        assert_eq!(nav.current(), Some(GlobalRoute::Chats));
        assert_eq!(nav.current_depth(), 2);
    }

    #[test]
    fn pop_on_empty_path_never_underflows() {
        let nav = NavigationState::<GlobalRoute>::new();
        assert_eq!(nav.pop(), None);
        assert_eq!(nav.pop(), None);
        assert!(nav.path().is_empty());

        nav.push(GlobalRoute::Option1);
        assert_eq!(nav.pop(), Some(GlobalRoute::Option1));
        assert_eq!(nav.pop(), None);
        assert_eq!(nav.current_depth(), 0);
    }

    #[test]
    fn arbitrary_push_pop_sequences_stay_consistent() {
        let nav = NavigationState::new();
        let mut model: Vec<GlobalRoute> = Vec::new();
        let script = [1, 0, 0, 2, 3, 0, 1, 0, 0, 0, 2, 2, 0];

        for (step, op) in script.into_iter().enumerate() {
            if op == 0 {
                assert_eq!(nav.pop(), model.pop());
            } else {
                let route = GlobalRoute::ALL[(step + op) % GlobalRoute::ALL.len()];
                nav.push(route);
                model.push(route);
            }
            assert_eq!(nav.path(), model);
        }
    }

    #[test]
    fn reset_replaces_any_prior_path() {
        let nav = NavigationState::new();
        nav.push(GlobalRoute::Option1);
        nav.push(GlobalRoute::Option2);

        nav.reset([GlobalRoute::Notifs]);
        assert_eq!(nav.path(), vec![GlobalRoute::Notifs]);

        nav.reset([]);
        assert!(nav.is_root());

        nav.reset([GlobalRoute::Chats, GlobalRoute::Option1]);
        assert_eq!(nav.path(), vec![GlobalRoute::Chats, GlobalRoute::Option1]);
    }

    #[tokio::test]
    async fn subscribers_see_mutations_but_not_root_pops() {
        let nav = NavigationState::new();
        let mut receiver = nav.subscribe();

        nav.pop();
        assert!(!receiver.has_changed().unwrap());

        nav.push(DashboardRoute::User);
        receiver.changed().await.unwrap();
        assert_eq!(*receiver.borrow_and_update(), vec![DashboardRoute::User]);
    }
}
