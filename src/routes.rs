//! Routing
//!
//! Route guard and navigation. The login page is the only public route;
//! everything else requires a session.

use std::sync::{Arc, Mutex};

use tracing::{debug, info};

use crate::tokens::TokenStore;

pub const LOGIN_PATH: &str = "/login";
pub const LANDING_PATH: &str = "/customers";

/// Where a navigation attempt should end up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardOutcome {
    Allow,
    Redirect(&'static str),
}

/// Pre-navigation check over local session state only
#[derive(Debug, Clone, Copy, Default)]
pub struct RouteGuard;

impl RouteGuard {
    pub fn is_public(path: &str) -> bool {
        path == LOGIN_PATH
    }

    pub fn check(&self, destination: &str, logged_in: bool) -> GuardOutcome {
        let public = Self::is_public(destination);

        if logged_in && public {
            return GuardOutcome::Redirect(LANDING_PATH);
        }
        if !logged_in && !public {
            return GuardOutcome::Redirect(LOGIN_PATH);
        }
        GuardOutcome::Allow
    }
}

/// Commits a route change
pub trait Navigator: Send + Sync {
    fn navigate(&self, path: &str);
}

/// Navigator that remembers every committed route
#[derive(Default)]
pub struct History {
    visits: Mutex<Vec<String>>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<String> {
        self.visits.lock().ok().and_then(|v| v.last().cloned())
    }

    pub fn visits(&self) -> Vec<String> {
        self.visits.lock().map(|v| v.clone()).unwrap_or_default()
    }
}

impl Navigator for History {
    fn navigate(&self, path: &str) {
        info!("Navigated to {}", path);
        if let Ok(mut visits) = self.visits.lock() {
            visits.push(path.to_string());
        }
    }
}

/// Runs the guard in front of every navigation
#[derive(Clone)]
pub struct Router {
    guard: RouteGuard,
    tokens: TokenStore,
    navigator: Arc<dyn Navigator>,
}

impl Router {
    pub fn new(tokens: TokenStore, navigator: Arc<dyn Navigator>) -> Self {
        Self {
            guard: RouteGuard,
            tokens,
            navigator,
        }
    }

    /// Navigate to `destination` or wherever the guard redirects.
    /// Returns the committed path.
    pub fn navigate(&self, destination: &str) -> String {
        let target = match self.guard.check(destination, self.tokens.logged_in()) {
            GuardOutcome::Allow => destination,
            GuardOutcome::Redirect(to) => {
                debug!("Guard redirected {} -> {}", destination, to);
                to
            }
        };

        self.navigator.navigate(target);
        target.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;

    #[test]
    fn authenticated_user_is_sent_away_from_login() {
        assert_eq!(
            RouteGuard.check(LOGIN_PATH, true),
            GuardOutcome::Redirect(LANDING_PATH)
        );
    }

    #[test]
    fn anonymous_user_is_sent_to_login() {
        assert_eq!(
            RouteGuard.check("/anything-else", false),
            GuardOutcome::Redirect(LOGIN_PATH)
        );
        assert_eq!(RouteGuard.check("/", false), GuardOutcome::Redirect(LOGIN_PATH));
    }

    #[test]
    fn matching_state_is_allowed() {
        assert_eq!(RouteGuard.check("/anything-else", true), GuardOutcome::Allow);
        assert_eq!(RouteGuard.check(LOGIN_PATH, false), GuardOutcome::Allow);
    }

    #[test]
    fn router_commits_the_guarded_path() {
        let storage = Arc::new(MemoryStorage::new());
        let tokens = TokenStore::new(storage);
        let history = Arc::new(History::new());
        let router = Router::new(tokens.clone(), history.clone());

        assert_eq!(router.navigate("/customers"), LOGIN_PATH);

        tokens.set_tokens(Some("T"), Some("R"), false).unwrap();
        assert_eq!(router.navigate(LOGIN_PATH), LANDING_PATH);
        assert_eq!(router.navigate("/customers/7"), "/customers/7");

        assert_eq!(history.visits(), vec![LOGIN_PATH, LANDING_PATH, "/customers/7"]);
        assert_eq!(history.current().as_deref(), Some("/customers/7"));
    }
}
