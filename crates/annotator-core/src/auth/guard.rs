//! Role-based route guard for protected views.

use tracing::debug;

use super::profile::Role;
use super::session::{SessionStore, LOGIN_PATH};

const ROOT_PATH: &str = "/";

const ADMIN_ROUTES: &[&str] = &[
    "/dashboard",
    "/datasets",
    "/datasets/:datasetId",
    "/annotators",
    "/datasets/:datasetId/assign",
    "/settings",
];

const ANNOTATOR_ROUTES: &[&str] = &[
    "/dashboard-user",
    "/tasks",
    "/my-work",
    "/history",
    "/settings-user",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    Allow,
    Redirect(String),
}

impl GuardDecision {
    fn redirect(path: &str) -> Self {
        GuardDecision::Redirect(path.to_string())
    }
}

#[derive(Debug, Clone)]
pub struct RouteGuard {
    admin_routes: Vec<String>,
    annotator_routes: Vec<String>,
}

impl Default for RouteGuard {
    fn default() -> Self {
        Self::new(ADMIN_ROUTES, ANNOTATOR_ROUTES)
    }
}

impl RouteGuard {
    pub fn new(admin_routes: &[&str], annotator_routes: &[&str]) -> Self {
        Self {
            admin_routes: admin_routes.iter().map(|r| r.to_string()).collect(),
            annotator_routes: annotator_routes.iter().map(|r| r.to_string()).collect(),
        }
    }

    /// Decide whether `path` may be shown for the current session.
    ///
    /// Runs the lazy expiry check, so an expired session is cleared here.
    pub fn evaluate(&self, session: &SessionStore, path: &str) -> GuardDecision {
        if !session.check_expiry() {
            return GuardDecision::redirect(LOGIN_PATH);
        }
        let Some(role) = session.user().and_then(|u| u.role) else {
            debug!(path, "Session has no role");
            return GuardDecision::redirect(LOGIN_PATH);
        };

        if path == ROOT_PATH {
            return GuardDecision::redirect(role.default_route());
        }

        let decision = match role {
            Role::Admin if matches_any(&self.annotator_routes, path) => {
                GuardDecision::redirect(Role::Admin.default_route())
            }
            Role::Annotator if matches_any(&self.admin_routes, path) => {
                GuardDecision::redirect(Role::Annotator.default_route())
            }
            _ => GuardDecision::Allow,
        };
        debug!(path, %role, ?decision, "Route guard evaluated");
        decision
    }
}

fn matches_any(routes: &[String], path: &str) -> bool {
    routes.iter().any(|route| matches_route(route, path))
}

/// Plain routes match exactly. A route with a `:param` segment matches any
/// path under the part before the first parameter.
fn matches_route(route: &str, path: &str) -> bool {
    match route.split_once("/:") {
        Some((base, _)) => {
            path == base
                || path
                    .strip_prefix(base)
                    .is_some_and(|rest| rest.starts_with('/'))
        }
        None => path == route,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::cookies::MemoryStore;
    use crate::auth::profile::LoginPayload;
    use crate::auth::session::RecordingNavigator;
    use crate::auth::token::encode_test_token;
    use crate::clock::ManualClock;
    use chrono::{DateTime, Duration};
    use serde_json::json;
    use std::sync::Arc;

    const NOW: i64 = 1_700_000_000;

    fn session_for(role: Option<&str>) -> (SessionStore, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(
            DateTime::from_timestamp(NOW, 0).expect("valid timestamp"),
        ));
        let store = SessionStore::new(
            Box::new(MemoryStore::new(clock.clone())),
            clock.clone(),
            Arc::new(RecordingNavigator::new()),
        );
        let token = encode_test_token(&json!({"exp": NOW + 3600}));
        let mut payload = json!({"id": 1, "username": "u", "token": token});
        if let Some(role) = role {
            payload["role"] = json!(role);
        }
        store.set_session(LoginPayload::from_value(payload).expect("payload"));
        (store, clock)
    }

    #[test]
    fn test_matches_route() {
        assert!(matches_route("/tasks", "/tasks"));
        assert!(!matches_route("/tasks", "/tasks/3"));
        assert!(matches_route("/datasets/:datasetId", "/datasets/12"));
        assert!(matches_route("/datasets/:datasetId/assign", "/datasets/12/assign"));
        assert!(matches_route("/datasets/:datasetId", "/datasets"));
        assert!(!matches_route("/datasets/:datasetId", "/datasets-archive"));
    }

    #[test]
    fn test_unauthenticated_goes_to_login() {
        let clock = Arc::new(ManualClock::starting_now());
        let store = SessionStore::new(
            Box::new(MemoryStore::new(clock.clone())),
            clock,
            Arc::new(RecordingNavigator::new()),
        );
        let guard = RouteGuard::default();
        assert_eq!(guard.evaluate(&store, "/tasks"), GuardDecision::Redirect("/login".into()));
    }

    #[test]
    fn test_missing_role_goes_to_login() {
        let (store, _) = session_for(None);
        assert!(store.is_authenticated());
        let guard = RouteGuard::default();
        assert_eq!(guard.evaluate(&store, "/tasks"), GuardDecision::Redirect("/login".into()));
    }

    #[test]
    fn test_admin_routes() {
        let (store, _) = session_for(Some("ADMIN"));
        let guard = RouteGuard::default();
        assert_eq!(guard.evaluate(&store, "/datasets/4/assign"), GuardDecision::Allow);
        assert_eq!(guard.evaluate(&store, "/annotators"), GuardDecision::Allow);
        assert_eq!(guard.evaluate(&store, "/tasks"), GuardDecision::Redirect("/dashboard".into()));
        assert_eq!(guard.evaluate(&store, "/"), GuardDecision::Redirect("/dashboard".into()));
    }

    #[test]
    fn test_annotator_routes() {
        let (store, _) = session_for(Some("ANNOTATOR"));
        let guard = RouteGuard::default();
        assert_eq!(guard.evaluate(&store, "/my-work"), GuardDecision::Allow);
        assert_eq!(
            guard.evaluate(&store, "/datasets/9"),
            GuardDecision::Redirect("/dashboard-user".into())
        );
        assert_eq!(guard.evaluate(&store, "/"), GuardDecision::Redirect("/dashboard-user".into()));
    }

    #[test]
    fn test_unknown_role_and_unlisted_paths_allowed() {
        let (store, _) = session_for(Some("REVIEWER"));
        let guard = RouteGuard::default();
        assert_eq!(guard.evaluate(&store, "/datasets"), GuardDecision::Allow);
        assert_eq!(guard.evaluate(&store, "/"), GuardDecision::Redirect("/dashboard-user".into()));

        let (admin, _) = session_for(Some("ADMIN"));
        assert_eq!(guard.evaluate(&admin, "/profile"), GuardDecision::Allow);
    }

    #[test]
    fn test_guard_clears_expired_session() {
        let (store, clock) = session_for(Some("ANNOTATOR"));
        let guard = RouteGuard::default();
        assert_eq!(guard.evaluate(&store, "/tasks"), GuardDecision::Allow);

        clock.advance(Duration::seconds(3600));
        assert_eq!(guard.evaluate(&store, "/tasks"), GuardDecision::Redirect("/login".into()));
        assert!(!store.is_authenticated());
        assert!(store.token().is_none());
    }

    #[test]
    fn test_guard_redirects_once_cookie_lapses() {
        let clock = Arc::new(ManualClock::new(
            DateTime::from_timestamp(NOW, 0).expect("valid timestamp"),
        ));
        let store = SessionStore::new(
            Box::new(MemoryStore::new(clock.clone())),
            clock.clone(),
            Arc::new(RecordingNavigator::new()),
        );
        let token = encode_test_token(&json!({"exp": NOW + 7 * 24 * 3600}));
        let payload = json!({"id": 1, "username": "u", "role": "ANNOTATOR", "token": token});
        store.set_session(LoginPayload::from_value(payload).expect("payload"));

        clock.advance(Duration::hours(25));
        assert_eq!(RouteGuard::default().evaluate(&store, "/tasks"), GuardDecision::Redirect("/login".into()));
        assert!(!store.is_authenticated());
        assert!(store.bearer_token().is_none());
    }
}
