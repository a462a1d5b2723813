//! Path classification and per-request decisions for the request gate.

use std::str::FromStr;

use crate::{
    AuthzError,
    catalog::Permission,
    page_access::{
        PageAccessMap, default_api_map, default_page_map, is_segment_prefix, normalize_path,
    },
    resolver::has_any_permission_by_resource,
};

pub const SIGN_IN_PATH: &str = "/login";
pub const UNAUTHORIZED_PATH: &str = "/dashboard/unauthorized";
pub const API_PREFIX: &str = "/api/";

/// How the gate treats routes under [`API_PREFIX`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ApiAuthorization {
    /// Check API routes against the API table through the resolver.
    #[default]
    Enforce,
    /// Authentication only; each handler authorizes itself.
    Defer,
}

impl FromStr for ApiAuthorization {
    type Err = AuthzError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "enforce" => Ok(Self::Enforce),
            "defer" => Ok(Self::Defer),
            other => Err(AuthzError::InvalidApiMode(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathClass {
    /// No identity required.
    Public,
    Api,
    /// Identity required, no resource check.
    AuthOnly,
    Protected,
}

/// What the caller looks like by the time the gate decides.
#[derive(Debug, Clone, Copy)]
pub enum Caller<'a> {
    Anonymous,
    Authenticated(&'a [Permission]),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    /// Page route without identity: send to sign-in.
    SignIn,
    /// API route without identity.
    Unauthenticated,
    /// Page route without a grant: send to the unauthorized page.
    Deny,
    /// API route without a grant.
    Forbidden,
}

/// All static tables the gate consults.
#[derive(Debug, Clone)]
pub struct AccessPolicy {
    pages: PageAccessMap,
    api: PageAccessMap,
    public_paths: Vec<String>,
    no_check_paths: Vec<String>,
    api_auth_only: Vec<String>,
    api_mode: ApiAuthorization,
}

impl AccessPolicy {
    pub fn new(pages: PageAccessMap, api: PageAccessMap) -> Self {
        Self {
            pages,
            api,
            public_paths: vec![
                "/health".into(),
                SIGN_IN_PATH.into(),
                UNAUTHORIZED_PATH.into(),
            ],
            no_check_paths: vec![
                "/dashboard".into(),
                UNAUTHORIZED_PATH.into(),
                "/dashboard/messages".into(),
                "/dashboard/settings/change-password".into(),
            ],
            api_auth_only: vec!["/api/graphql".into(), "/api/me".into()],
            api_mode: ApiAuthorization::default(),
        }
    }

    /// Default dashboard and API tables, validated.
    pub fn standard() -> Result<Self, AuthzError> {
        Ok(Self::new(default_page_map()?, default_api_map()?))
    }

    pub fn with_api_mode(mut self, mode: ApiAuthorization) -> Self {
        self.api_mode = mode;
        self
    }

    pub fn api_mode(&self) -> ApiAuthorization {
        self.api_mode
    }

    pub fn pages(&self) -> &PageAccessMap {
        &self.pages
    }

    pub fn api(&self) -> &PageAccessMap {
        &self.api
    }

    pub fn classify(&self, pathname: &str) -> PathClass {
        let pathname = normalize_path(pathname);
        if self
            .public_paths
            .iter()
            .any(|public| is_segment_prefix(public, pathname))
        {
            PathClass::Public
        } else if pathname.starts_with(API_PREFIX) {
            PathClass::Api
        } else if self.no_check_paths.iter().any(|path| path == pathname) {
            PathClass::AuthOnly
        } else {
            PathClass::Protected
        }
    }

    /// Whether deciding on `pathname` needs the caller's permission set.
    pub fn needs_permissions(&self, pathname: &str) -> bool {
        let pathname = normalize_path(pathname);
        match self.classify(pathname) {
            PathClass::Protected => true,
            PathClass::Api => {
                self.api_mode == ApiAuthorization::Enforce
                    && !self.api_auth_only.iter().any(|path| path == pathname)
            }
            PathClass::Public | PathClass::AuthOnly => false,
        }
    }

    /// Page-level check: no-check list, then the page table, fail-closed.
    pub fn can_access_page(&self, user_permissions: &[Permission], pathname: &str) -> bool {
        let pathname = normalize_path(pathname);
        if self.no_check_paths.iter().any(|path| path == pathname) {
            return true;
        }
        match self.pages.required_resources(pathname) {
            Some(required) => has_any_permission_by_resource(user_permissions, required),
            None => false,
        }
    }

    pub fn can_access_api(&self, user_permissions: &[Permission], pathname: &str) -> bool {
        let pathname = normalize_path(pathname);
        if self.api_mode == ApiAuthorization::Defer
            || self.api_auth_only.iter().any(|path| path == pathname)
        {
            return true;
        }
        match self.api.required_resources(pathname) {
            Some(required) => has_any_permission_by_resource(user_permissions, required),
            None => false,
        }
    }

    /// Refusal for a caller whose session could not be verified.
    pub fn refuse(&self, pathname: &str) -> Decision {
        match self.classify(pathname) {
            PathClass::Public => Decision::Allow,
            PathClass::Api => Decision::Forbidden,
            PathClass::AuthOnly | PathClass::Protected => Decision::Deny,
        }
    }

    pub fn decide(&self, pathname: &str, caller: Caller<'_>) -> Decision {
        let class = self.classify(pathname);
        match (class, caller) {
            (PathClass::Public, _) => Decision::Allow,
            (PathClass::Api, Caller::Anonymous) => Decision::Unauthenticated,
            (_, Caller::Anonymous) => Decision::SignIn,
            (PathClass::Api, Caller::Authenticated(permissions)) => {
                if self.can_access_api(permissions, pathname) {
                    Decision::Allow
                } else {
                    Decision::Forbidden
                }
            }
            (PathClass::AuthOnly, Caller::Authenticated(_)) => Decision::Allow,
            (PathClass::Protected, Caller::Authenticated(permissions)) => {
                if self.can_access_page(permissions, pathname) {
                    Decision::Allow
                } else {
                    Decision::Deny
                }
            }
        }
    }
}
