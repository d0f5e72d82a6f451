//! Cache key schema
//!
//! Key formats are shared with already deployed cache instances and must not change:
//! - listings: `reports:{status}:{type}:user:{requester}`
//! - dashboard: `admin:dashboard`

/// Namespace of the report listing keys
pub const LISTING_NAMESPACE: &str = "reports";

/// Filter component used when a listing is not narrowed on a dimension
pub const ALL: &str = "all";

/// Requester component for listings fetched without an identity
pub const ANONYMOUS: &str = "anonymous";

/// Cache key builder
pub struct CacheKey;

impl CacheKey {
    /// Enriched report listing for one requester
    /// Format: reports:{status}:{type}:user:{requester}
    pub fn report_listing(status: &str, issue_type: &str, requester: &str) -> String {
        format!(
            "{}:{}:{}:user:{}",
            LISTING_NAMESPACE, status, issue_type, requester
        )
    }

    /// Global admin dashboard snapshot
    pub fn admin_dashboard() -> String {
        "admin:dashboard".to_string()
    }

    /// Extract the namespace (first segment) from a key
    pub fn namespace(key: &str) -> Option<&str> {
        match key.split_once(':') {
            Some((ns, _)) if !ns.is_empty() => Some(ns),
            _ => None,
        }
    }
}
