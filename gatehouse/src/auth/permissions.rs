//! Route registry for the authorization middleware.
//!
//! Every API group is bound to one [`ResourceCategory`] through its base path. Individual
//! (method, path) pairs can additionally be marked anonymous (no token at all) or allow-all (any
//! authenticated user, no permission check). The registry is built once at startup and is
//! read-only afterwards.
//!
//! Resolution order for a request:
//!
//! 1. exact anonymous (method, path)
//! 2. exact allow-all (method, path)
//! 3. the longest registered base path that prefixes the request path on a segment boundary
//! 4. otherwise unregistered, which the middleware denies

use std::collections::HashSet;

use axum::http::Method;

use crate::types::ResourceCategory;

/// How a request is gated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Anonymous,
    AllowAll,
    Category(ResourceCategory),
    Unregistered,
}

#[derive(Debug, Clone, Default)]
pub struct PermissionRegistry {
    /// Sorted by descending base path length so the first match is the most specific
    groups: Vec<(String, ResourceCategory)>,
    anonymous: HashSet<(Method, String)>,
    allow_all: HashSet<(Method, String)>,
}

#[derive(Debug, Default)]
pub struct PermissionRegistryBuilder {
    groups: Vec<(String, ResourceCategory)>,
    anonymous: HashSet<(Method, String)>,
    allow_all: HashSet<(Method, String)>,
}

impl PermissionRegistryBuilder {
    /// Bind every path under `base_path` to `category`. Registering a base path twice keeps the
    /// last category.
    pub fn group(mut self, base_path: &str, category: ResourceCategory) -> Self {
        let base = normalize(base_path);
        self.groups.retain(|(existing, _)| *existing != base);
        self.groups.push((base, category));
        self
    }

    /// Let `method path` through without a token.
    pub fn anonymous(mut self, method: Method, path: &str) -> Self {
        self.anonymous.insert((method, normalize(path)));
        self
    }

    /// Require a token for `method path` but skip the permission check.
    pub fn allow_all(mut self, method: Method, path: &str) -> Self {
        self.allow_all.insert((method, normalize(path)));
        self
    }

    pub fn build(self) -> PermissionRegistry {
        let mut groups = self.groups;
        // Ties on length cannot both match one path, the secondary key only fixes the order
        groups.sort_by(|(a, _), (b, _)| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));

        PermissionRegistry {
            groups,
            anonymous: self.anonymous,
            allow_all: self.allow_all,
        }
    }
}

impl PermissionRegistry {
    pub fn builder() -> PermissionRegistryBuilder {
        PermissionRegistryBuilder::default()
    }

    /// The product's API surface.
    pub fn standard() -> Self {
        Self::builder()
            .group("/api/hosts", ResourceCategory::Hosts)
            .group("/api/streams", ResourceCategory::Streams)
            .group("/api/certificates", ResourceCategory::Certificates)
            .group("/api/logs", ResourceCategory::Logs)
            .group("/api/integrations", ResourceCategory::Integrations)
            .group("/api/access-lists", ResourceCategory::AccessLists)
            .group("/api/settings", ResourceCategory::Settings)
            .group("/api/users", ResourceCategory::Users)
            .group("/api/nginx", ResourceCategory::NginxServer)
            .group("/api/export", ResourceCategory::ExportData)
            .group("/api/vpns", ResourceCategory::Vpns)
            .group("/api/caches", ResourceCategory::Caches)
            .group("/api/traffic-stats", ResourceCategory::TrafficStats)
            .anonymous(Method::GET, "/healthz")
            .anonymous(Method::HEAD, "/healthz")
            .anonymous(Method::POST, "/api/authentication/login")
            .allow_all(Method::POST, "/api/authentication/logout")
            .allow_all(Method::GET, "/api/users/current")
            .allow_all(Method::PUT, "/api/users/current/password")
            .allow_all(Method::GET, "/api/users/current/totp")
            .allow_all(Method::POST, "/api/users/current/totp")
            .allow_all(Method::DELETE, "/api/users/current/totp")
            .allow_all(Method::POST, "/api/users/current/totp/activate")
            .build()
    }

    pub fn resolve(&self, method: &Method, path: &str) -> Route {
        let path = normalize(path);
        let key = (method.clone(), path);

        if self.anonymous.contains(&key) {
            return Route::Anonymous;
        }
        if self.allow_all.contains(&key) {
            return Route::AllowAll;
        }

        let path = key.1;
        self.groups
            .iter()
            .find(|(base, _)| under(&path, base))
            .map(|(_, category)| Route::Category(*category))
            .unwrap_or(Route::Unregistered)
    }
}

/// Strip trailing slashes so `/api/hosts/` and `/api/hosts` are the same route.
fn normalize(path: &str) -> String {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() { "/".to_string() } else { trimmed.to_string() }
}

fn under(path: &str, base: &str) -> bool {
    if base == "/" {
        return true;
    }
    path.strip_prefix(base).is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
}
