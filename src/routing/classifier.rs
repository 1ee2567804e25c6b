//! Path classification.
//!
//! # Responsibilities
//! - Decide whether a request path belongs to the storage gateway API
//!
//! # Design Decisions
//! - Path matching is case-sensitive
//! - A prefix matches only on a whole segment: `/bzz` and `/bzz/abc` match,
//!   `/bzzz` does not

/// Path prefixes served by the storage gateway.
pub const STORAGE_PREFIXES: &[&str] = &[
    "/bytes",
    "/bzz",
    "/chunks",
    "/envelope",
    "/feeds",
    "/grantee",
    "/pins",
    "/pss",
    "/soc",
    "/stamps",
    "/tags",
];

/// Which flow a request takes through the proxy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrafficClass {
    /// Gateway traffic: authorized and possibly metered.
    StorageTraffic,
    /// Everything else: reverse-proxied to the validator unmetered.
    OtherTraffic,
}

impl TrafficClass {
    /// Label used in logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            TrafficClass::StorageTraffic => "storage",
            TrafficClass::OtherTraffic => "other",
        }
    }
}

/// Classify a request path against the storage allow-list.
pub fn classify(path: &str) -> TrafficClass {
    let is_storage = STORAGE_PREFIXES
        .iter()
        .any(|prefix| matches_segment_prefix(path, prefix));

    if is_storage {
        TrafficClass::StorageTraffic
    } else {
        TrafficClass::OtherTraffic
    }
}

fn matches_segment_prefix(path: &str, prefix: &str) -> bool {
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_paths() {
        for path in [
            "/bzz",
            "/bzz/abcdef/index.html",
            "/bytes/abcdef",
            "/chunks/abcdef",
            "/tags",
            "/pins/abcdef",
            "/soc/owner/id",
            "/feeds/owner/topic",
            "/pss/send/topic/targets",
            "/stamps",
            "/stamps/topup/batch/100",
        ] {
            assert_eq!(classify(path), TrafficClass::StorageTraffic, "{path}");
        }
    }

    #[test]
    fn test_other_paths() {
        for path in ["/", "", "/api/v0.2/login", "/bzzz", "/index.html", "/BZZ/abc", "/static/bzz"] {
            assert_eq!(classify(path), TrafficClass::OtherTraffic, "{path}");
        }
    }
}
