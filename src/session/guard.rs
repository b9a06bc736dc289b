use super::state::Session;

/// Query parameter carrying the destination a redirected visitor asked for.
const RETURN_PARAM: &str = "from";

/// Routing-layer side effects the session manager needs.
pub trait Navigator: Send + Sync {
    /// Navigate to `path`, replacing the current history entry.
    fn replace(&self, path: &str);
}

/// Outcome of guarding a protected route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    /// Session not resolved yet; show a neutral loading indicator.
    Loading,
    /// Send the visitor to sign-in; `location` preserves the requested destination.
    RedirectToSignIn { location: String },
    Render,
}

/// Route guard predicate for protected areas.
#[derive(Debug, Clone)]
pub struct RouteGuard {
    sign_in_path: String,
}

impl RouteGuard {
    #[must_use]
    pub fn new(sign_in_path: impl Into<String>) -> Self {
        Self {
            sign_in_path: sign_in_path.into(),
        }
    }

    /// Decide what to show for `requested` given `session`.
    #[must_use]
    pub fn decide(&self, session: &Session, requested: &str) -> GuardDecision {
        match session {
            Session::Unknown => GuardDecision::Loading,
            Session::Unauthenticated => GuardDecision::RedirectToSignIn {
                location: self.sign_in_location(requested),
            },
            Session::Authenticated(_) => GuardDecision::Render,
        }
    }

    /// Sign-in path with `requested` preserved for after login.
    #[must_use]
    pub fn sign_in_location(&self, requested: &str) -> String {
        if !is_local_path(requested) || requested == self.sign_in_path {
            return self.sign_in_path.clone();
        }
        format!(
            "{}?{RETURN_PARAM}={}",
            self.sign_in_path,
            urlencoding::encode(requested)
        )
    }

    /// Where to go after a successful sign-in.
    ///
    /// Only same-origin absolute paths are honoured, anything else yields `default`.
    #[must_use]
    pub fn return_destination<'a>(&self, from: Option<&'a str>, default: &'a str) -> &'a str {
        match from {
            Some(path) if is_local_path(path) && !self.is_sign_in(path) => path,
            _ => default,
        }
    }

    /// `path` is the sign-in page itself, with or without query, fragment or
    /// trailing segments. `/login-history` is not.
    fn is_sign_in(&self, path: &str) -> bool {
        path.strip_prefix(self.sign_in_path.as_str())
            .is_some_and(|rest| rest.is_empty() || rest.starts_with(['?', '#', '/']))
    }
}

fn is_local_path(path: &str) -> bool {
    path.starts_with('/') && !path.starts_with("//") && !path.contains('\\')
}
