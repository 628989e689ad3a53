use pagedesk_session::SessionStore;

/// Paths that need a session.
pub const PROTECTED_ROUTES: &[&str] = &["/chat", "/home", "/fb_oauth"];

/// Paths only reachable while signed out.
pub const AUTH_ROUTES: &[&str] = &["/login", "/register", "/"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Landing,
    Login,
    Register,
    Home,
    Chat,
    FbOauth,
}

impl Route {
    pub fn path(self) -> &'static str {
        match self {
            Self::Landing => "/",
            Self::Login => "/login",
            Self::Register => "/register",
            Self::Home => "/home",
            Self::Chat => "/chat",
            Self::FbOauth => "/fb_oauth",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteDecision {
    Proceed,
    Redirect(Route),
}

/// Decide whether `path` may be shown given whether a session exists.
/// A single trailing slash is ignored, so `/fb_oauth/` is protected too.
pub fn guard(path: &str, has_session: bool) -> RouteDecision {
    let path = match path.strip_suffix('/') {
        Some(stripped) if !stripped.is_empty() => stripped,
        _ => path,
    };

    if PROTECTED_ROUTES.contains(&path) && !has_session {
        return RouteDecision::Redirect(Route::Login);
    }

    if AUTH_ROUTES.contains(&path) && has_session {
        return RouteDecision::Redirect(Route::Home);
    }

    RouteDecision::Proceed
}

/// Guard a route against the persisted session.
pub fn check(store: &SessionStore, route: Route) -> RouteDecision {
    guard(route.path(), store.is_present())
}
