//! Navigation contract types
//!
//! The route guard works over this small vocabulary: a table of routes with
//! a `requires_auth` flag, a navigation request (path plus query), and the
//! decision the guard hands back to the host shell. Query values are kept
//! verbatim; internal navigation paths need no percent-encoding.

/// A registered route with its guard metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    /// Route path, e.g. `/profile`.
    pub path: String,
    /// Whether navigation to this route requires a live session.
    pub requires_auth: bool,
}

impl Route {
    /// A route reachable without authentication.
    #[must_use]
    pub fn public(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            requires_auth: false,
        }
    }

    /// A route gated behind authentication.
    #[must_use]
    pub fn protected(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            requires_auth: true,
        }
    }
}

/// The application route table consulted by the route guard.
#[derive(Debug, Clone)]
pub struct RouteTable {
    routes: Vec<Route>,
    login_path: String,
    home_path: String,
}

impl RouteTable {
    /// Creates an empty table with the conventional `/login` and `/` paths.
    #[must_use]
    pub fn new() -> Self {
        Self {
            routes: Vec::new(),
            login_path: "/login".to_string(),
            home_path: "/".to_string(),
        }
    }

    /// Registers a route.
    #[must_use]
    pub fn with_route(mut self, route: Route) -> Self {
        self.routes.push(route);
        self
    }

    /// Whether the given path is registered as requiring authentication.
    /// Unregistered paths require nothing.
    #[must_use]
    pub fn requires_auth(&self, path: &str) -> bool {
        self.routes
            .iter()
            .any(|route| route.path == path && route.requires_auth)
    }

    /// The login route path.
    #[must_use]
    pub fn login_path(&self) -> &str {
        &self.login_path
    }

    /// The home route path.
    #[must_use]
    pub fn home_path(&self) -> &str {
        &self.home_path
    }

    /// Whether the given path is the login route.
    #[must_use]
    pub fn is_login(&self, path: &str) -> bool {
        path == self.login_path
    }
}

impl Default for RouteTable {
    fn default() -> Self {
        Self::new()
    }
}

/// A navigation attempt evaluated by the route guard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationRequest {
    /// Destination path without query.
    pub path: String,
    /// Query parameters in order of appearance.
    pub query: Vec<(String, String)>,
}

impl NavigationRequest {
    /// A navigation to the given path with no query.
    #[must_use]
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            query: Vec::new(),
        }
    }

    /// Parses a `path?key=value&...` string.
    #[must_use]
    pub fn parse(full_path: &str) -> Self {
        let (path, query_string) = match full_path.split_once('?') {
            Some((path, query)) => (path, query),
            None => (full_path, ""),
        };

        let query = query_string
            .split('&')
            .filter(|pair| !pair.is_empty())
            .map(|pair| match pair.split_once('=') {
                Some((key, value)) => (key.to_string(), value.to_string()),
                None => (pair.to_string(), String::new()),
            })
            .collect();

        Self {
            path: path.to_string(),
            query,
        }
    }

    /// Appends a query parameter.
    #[must_use]
    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// First value of the named query parameter.
    #[must_use]
    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// The path with its query string re-attached.
    #[must_use]
    pub fn full_path(&self) -> String {
        if self.query.is_empty() {
            return self.path.clone();
        }
        let query = self
            .query
            .iter()
            .map(|(key, value)| format!("{key}={value}"))
            .collect::<Vec<_>>()
            .join("&");
        format!("{}?{query}", self.path)
    }
}

/// Outcome of a guard evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavigationDecision {
    /// Let the navigation proceed unchanged.
    Proceed,
    /// Send the navigation elsewhere.
    Redirect(NavigationRequest),
}

impl NavigationDecision {
    /// Whether this decision lets the navigation through.
    #[must_use]
    pub const fn is_proceed(&self) -> bool {
        matches!(self, Self::Proceed)
    }

    /// The redirect target's full path, when this is a redirect.
    #[must_use]
    pub fn redirect_path(&self) -> Option<String> {
        match self {
            Self::Proceed => None,
            Self::Redirect(request) => Some(request.full_path()),
        }
    }
}
