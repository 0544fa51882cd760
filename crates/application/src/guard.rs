//! Route guard for protected navigation
//!
//! Evaluated before every navigation. The guard never blocks a public
//! route on an authentication failure; it only decides where protected
//! navigation lands when the session cannot back it.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::warn;

use warden_domain::{NavigationDecision, NavigationRequest, RouteTable};

use crate::service::AuthService;

/// Name of the query parameter carrying the original destination through
/// the login route.
const REDIRECT_PARAM: &str = "redirect";

/// Gates navigation on session state.
pub struct RouteGuard {
    service: Arc<AuthService>,
    routes: RouteTable,
    pending_redirect: AtomicBool,
}

impl RouteGuard {
    /// Creates a guard over the given route table.
    #[must_use]
    pub fn new(service: Arc<AuthService>, routes: RouteTable) -> Self {
        Self {
            service,
            routes,
            pending_redirect: AtomicBool::new(false),
        }
    }

    /// Evaluates a navigation attempt.
    ///
    /// `from` is the path being navigated away from, when known; it keeps
    /// the authenticated-login bounce from redirecting to where the user
    /// already is.
    pub async fn before_navigation(
        &self,
        to: &NavigationRequest,
        from: Option<&str>,
    ) -> NavigationDecision {
        // A redirect this guard just issued passes through untouched.
        if self.pending_redirect.swap(false, Ordering::SeqCst) {
            return NavigationDecision::Proceed;
        }

        if !self.service.snapshot().is_initialized {
            if let Err(error) = self.service.initialize().await {
                warn!(%error, "auth initialization failed during navigation");
            }
        }

        let snapshot = self.service.snapshot();

        if self.routes.requires_auth(&to.path) {
            if !snapshot.is_authenticated {
                return self.login_redirect(to);
            }
            if self.service.token_expired() {
                if let Err(error) = self.service.update_token().await {
                    warn!(%error, "token refresh failed for protected navigation");
                    return self.login_redirect(to);
                }
            }
            return NavigationDecision::Proceed;
        }

        if self.routes.is_login(&to.path) && snapshot.is_authenticated {
            let target = to
                .query_param(REDIRECT_PARAM)
                .map_or_else(|| self.routes.home_path().to_string(), str::to_string);
            // Skip the bounce when the user is already on the target.
            if from.is_some_and(|current| current == target) {
                return NavigationDecision::Proceed;
            }
            return self.redirect_to(NavigationRequest::parse(&target));
        }

        NavigationDecision::Proceed
    }

    fn login_redirect(&self, to: &NavigationRequest) -> NavigationDecision {
        let login = NavigationRequest::new(self.routes.login_path())
            .with_query(REDIRECT_PARAM, to.full_path());
        self.redirect_to(login)
    }

    fn redirect_to(&self, target: NavigationRequest) -> NavigationDecision {
        self.pending_redirect.store(true, Ordering::SeqCst);
        NavigationDecision::Redirect(target)
    }
}
