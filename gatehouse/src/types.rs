//! Common type definitions and permission system types.
//!
//! This module defines:
//! - Type aliases for entity IDs
//! - The per-resource [`Permissions`] record held by every user
//! - [`AccessLevel`] and [`ResourceCategory`], the units the authorization middleware reasons in
//!
//! # Permission System
//!
//! Access is attribute-based: rather than a single role, each user carries one [`AccessLevel`]
//! per [`ResourceCategory`]. An API group is bound to exactly one category, and the level the user
//! holds for that category decides whether a given HTTP method is allowed:
//!
//! - `GET` requires at least [`AccessLevel::ReadOnly`]
//! - `POST`, `PUT`, `PATCH` and `DELETE` require [`AccessLevel::ReadWrite`]
//! - every other method is denied
//!
//! ```ignore
//! use gatehouse::types::{AccessLevel, ResourceCategory};
//! use axum::http::Method;
//!
//! let level = user.permissions.level(ResourceCategory::Hosts);
//! assert!(level.permits(&Method::GET));
//! ```
//!
//! # Utility Functions
//!
//! - [`abbrev_uuid`]: Abbreviate UUIDs to first 8 chars for logging

use axum::http::Method;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// Type aliases for IDs
pub type UserId = Uuid;
pub type TokenId = Uuid;

/// Abbreviate a UUID to its first 8 characters for more readable logs and traces
/// Example: "550e8400-e29b-41d4-a716-446655440000" -> "550e8400"
pub fn abbrev_uuid(uuid: &Uuid) -> String {
    uuid.to_string().chars().take(8).collect()
}

/// Capability a user holds over one resource category.
///
/// Variants are declared in ascending order so the derived `Ord` matches the capability order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccessLevel {
    NoAccess,
    ReadOnly,
    ReadWrite,
}

impl AccessLevel {
    /// Whether this level authorizes a request with the given method.
    pub fn permits(self, method: &Method) -> bool {
        if *method == Method::GET {
            self >= AccessLevel::ReadOnly
        } else if is_mutating(method) {
            self == AccessLevel::ReadWrite
        } else {
            false
        }
    }
}

fn is_mutating(method: &Method) -> bool {
    [Method::POST, Method::PUT, Method::PATCH, Method::DELETE].contains(method)
}

impl fmt::Display for AccessLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccessLevel::NoAccess => write!(f, "NO_ACCESS"),
            AccessLevel::ReadOnly => write!(f, "READ_ONLY"),
            AccessLevel::ReadWrite => write!(f, "READ_WRITE"),
        }
    }
}

// Resource categories an API group can be bound to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResourceCategory {
    Hosts,
    Streams,
    Certificates,
    Logs,
    Integrations,
    AccessLists,
    Settings,
    Users,
    NginxServer,
    ExportData,
    Vpns,
    Caches,
    TrafficStats,
}

impl ResourceCategory {
    pub const ALL: [ResourceCategory; 13] = [
        ResourceCategory::Hosts,
        ResourceCategory::Streams,
        ResourceCategory::Certificates,
        ResourceCategory::Logs,
        ResourceCategory::Integrations,
        ResourceCategory::AccessLists,
        ResourceCategory::Settings,
        ResourceCategory::Users,
        ResourceCategory::NginxServer,
        ResourceCategory::ExportData,
        ResourceCategory::Vpns,
        ResourceCategory::Caches,
        ResourceCategory::TrafficStats,
    ];
}

impl fmt::Display for ResourceCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResourceCategory::Hosts => "hosts",
            ResourceCategory::Streams => "streams",
            ResourceCategory::Certificates => "certificates",
            ResourceCategory::Logs => "logs",
            ResourceCategory::Integrations => "integrations",
            ResourceCategory::AccessLists => "access-lists",
            ResourceCategory::Settings => "settings",
            ResourceCategory::Users => "users",
            ResourceCategory::NginxServer => "nginx-server",
            ResourceCategory::ExportData => "export-data",
            ResourceCategory::Vpns => "vpns",
            ResourceCategory::Caches => "caches",
            ResourceCategory::TrafficStats => "traffic-stats",
        };
        f.write_str(name)
    }
}

/// Per-category access levels of a user.
///
/// Every field is required when deserializing: a record missing a category is rejected rather
/// than silently defaulted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct Permissions {
    pub hosts: AccessLevel,
    pub streams: AccessLevel,
    pub certificates: AccessLevel,
    pub logs: AccessLevel,
    pub integrations: AccessLevel,
    pub access_lists: AccessLevel,
    pub settings: AccessLevel,
    pub users: AccessLevel,
    pub nginx_server: AccessLevel,
    pub export_data: AccessLevel,
    pub vpns: AccessLevel,
    pub caches: AccessLevel,
    pub traffic_stats: AccessLevel,
}

impl Permissions {
    /// Every category set to the same level.
    pub const fn uniform(level: AccessLevel) -> Self {
        Self {
            hosts: level,
            streams: level,
            certificates: level,
            logs: level,
            integrations: level,
            access_lists: level,
            settings: level,
            users: level,
            nginx_server: level,
            export_data: level,
            vpns: level,
            caches: level,
            traffic_stats: level,
        }
    }

    pub const fn none() -> Self {
        Self::uniform(AccessLevel::NoAccess)
    }

    pub const fn full() -> Self {
        Self::uniform(AccessLevel::ReadWrite)
    }

    /// Projection from a category to the level held for it.
    pub fn level(&self, category: ResourceCategory) -> AccessLevel {
        match category {
            ResourceCategory::Hosts => self.hosts,
            ResourceCategory::Streams => self.streams,
            ResourceCategory::Certificates => self.certificates,
            ResourceCategory::Logs => self.logs,
            ResourceCategory::Integrations => self.integrations,
            ResourceCategory::AccessLists => self.access_lists,
            ResourceCategory::Settings => self.settings,
            ResourceCategory::Users => self.users,
            ResourceCategory::NginxServer => self.nginx_server,
            ResourceCategory::ExportData => self.export_data,
            ResourceCategory::Vpns => self.vpns,
            ResourceCategory::Caches => self.caches,
            ResourceCategory::TrafficStats => self.traffic_stats,
        }
    }

    /// Copy with one category changed.
    pub fn with(mut self, category: ResourceCategory, level: AccessLevel) -> Self {
        let slot = match category {
            ResourceCategory::Hosts => &mut self.hosts,
            ResourceCategory::Streams => &mut self.streams,
            ResourceCategory::Certificates => &mut self.certificates,
            ResourceCategory::Logs => &mut self.logs,
            ResourceCategory::Integrations => &mut self.integrations,
            ResourceCategory::AccessLists => &mut self.access_lists,
            ResourceCategory::Settings => &mut self.settings,
            ResourceCategory::Users => &mut self.users,
            ResourceCategory::NginxServer => &mut self.nginx_server,
            ResourceCategory::ExportData => &mut self.export_data,
            ResourceCategory::Vpns => &mut self.vpns,
            ResourceCategory::Caches => &mut self.caches,
            ResourceCategory::TrafficStats => &mut self.traffic_stats,
        };
        *slot = level;
        self
    }
}
