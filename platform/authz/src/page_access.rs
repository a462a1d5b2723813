use std::collections::HashMap;

use crate::{AuthzError, catalog::Resource};

/// Path → resources table used to gate pages and API routes.
///
/// Lookups try an exact match first and then the longest registered prefix,
/// matching on path-segment boundaries. The optional root path is only ever
/// matched exactly.
#[derive(Debug, Clone)]
pub struct PageAccessMap {
    exact: HashMap<String, Vec<Resource>>,
    // longest first
    prefixes: Vec<String>,
    root: Option<String>,
}

impl PageAccessMap {
    pub fn new<P, I>(entries: I) -> Result<Self, AuthzError>
    where
        P: Into<String>,
        I: IntoIterator<Item = (P, Vec<Resource>)>,
    {
        let mut exact = HashMap::new();
        for (path, resources) in entries {
            let path = path.into();
            validate_path(&path)?;
            if resources.is_empty() {
                return Err(AuthzError::EmptyEntry(path));
            }
            if exact.contains_key(&path) {
                return Err(AuthzError::DuplicateEntry(path));
            }
            exact.insert(path, resources);
        }
        let mut prefixes = exact.keys().cloned().collect::<Vec<_>>();
        prefixes.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        Ok(Self {
            exact,
            prefixes,
            root: None,
        })
    }

    /// Excludes `root` from prefix matching so the bare home page never leaks
    /// its requirement onto every child path.
    pub fn with_root(mut self, root: impl Into<String>) -> Self {
        self.root = Some(root.into());
        self
    }

    pub fn required_resources(&self, pathname: &str) -> Option<&[Resource]> {
        let pathname = normalize_path(pathname);
        if let Some(resources) = self.exact.get(pathname) {
            return Some(resources);
        }
        self.prefixes
            .iter()
            .filter(|prefix| self.root.as_deref() != Some(prefix.as_str()))
            .find(|prefix| is_segment_prefix(prefix, pathname))
            .and_then(|prefix| self.exact.get(prefix))
            .map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.exact.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exact.is_empty()
    }

    /// Entries in lookup order (longest path first).
    pub fn entries(&self) -> impl Iterator<Item = (&str, &[Resource])> {
        self.prefixes
            .iter()
            .filter_map(|path| self.exact.get(path).map(|res| (path.as_str(), res.as_slice())))
    }
}

fn validate_path(path: &str) -> Result<(), AuthzError> {
    if !path.starts_with('/') || (path.len() > 1 && path.ends_with('/')) {
        return Err(AuthzError::InvalidPath(path.to_string()));
    }
    Ok(())
}

/// Drops a single trailing `/` so `/dashboard/` looks up like `/dashboard`.
/// The root path `/` is returned unchanged.
pub fn normalize_path(pathname: &str) -> &str {
    match pathname.strip_suffix('/') {
        Some(trimmed) if !trimmed.is_empty() => trimmed,
        _ => pathname,
    }
}

/// True when `prefix` equals `path` or covers it up to a `/` boundary.
pub(crate) fn is_segment_prefix(prefix: &str, path: &str) -> bool {
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/') || prefix.ends_with('/'),
        None => false,
    }
}

pub fn default_page_map() -> Result<PageAccessMap, AuthzError> {
    use Resource::*;
    PageAccessMap::new([
        ("/dashboard", vec![Dashboard]),
        ("/dashboard/chat", vec![CustomerService]),
        ("/dashboard/chatbot", vec![CustomerService]),
        ("/dashboard/consultations", vec![CustomerService]),
        ("/dashboard/voc", vec![CustomerService]),
        ("/dashboard/knowledge", vec![CustomerService]),
        ("/dashboard/orders", vec![OrderManagement]),
        ("/dashboard/leads", vec![OrderManagement]),
        ("/dashboard/sales", vec![OrderManagement]),
        ("/dashboard/reviews", vec![ReviewManagement]),
        ("/dashboard/support", vec![ReviewManagement]),
        ("/dashboard/after-service", vec![AsManagement]),
        ("/dashboard/as", vec![AsManagement]),
        ("/dashboard/inventory", vec![InventoryManagement]),
        ("/dashboard/alerts/inventory", vec![InventoryManagement]),
        ("/dashboard/partners", vec![PartnerManagement]),
        ("/dashboard/performance", vec![PerformanceAnalytics]),
        ("/dashboard/customers", vec![PerformanceAnalytics]),
        ("/dashboard/alerts", vec![PerformanceAnalytics]),
        ("/dashboard/marketing", vec![PerformanceAnalytics]),
        ("/dashboard/reports", vec![PerformanceAnalytics]),
        ("/dashboard/mall", vec![ShoppingMall]),
        ("/dashboard/shopping-mall", vec![ShoppingMall]),
        ("/dashboard/users", vec![SystemManagement]),
        ("/dashboard/roles", vec![SystemManagement]),
        ("/dashboard/settings", vec![SystemManagement]),
        ("/dashboard/data", vec![SystemManagement]),
        ("/dashboard/master-data", vec![MasterData]),
    ])
    .map(|map| map.with_root("/dashboard"))
}

pub fn default_api_map() -> Result<PageAccessMap, AuthzError> {
    use Resource::*;
    PageAccessMap::new([
        ("/api/orders", vec![OrderManagement]),
        ("/api/customers", vec![OrderManagement, PerformanceAnalytics]),
        ("/api/inventory", vec![InventoryManagement]),
        ("/api/partners", vec![PartnerManagement]),
        ("/api/mall", vec![ShoppingMall]),
        ("/api/roles", vec![SystemManagement]),
        ("/api/users", vec![SystemManagement]),
        ("/api/permissions", vec![SystemManagement]),
    ])
}
