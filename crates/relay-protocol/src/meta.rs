//! Annotation and version types shared across protocol messages.

use serde::{Deserialize, Serialize};

/// Hints for how a content item should be displayed, per the MCP content
/// annotation shape. The gateway passes these through untouched; it never
/// generates them itself.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Annotations {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audience: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<f64>,
}

/// Protocol versions the gateway understands, oldest first.
///
/// The gateway advertises the newest version it speaks during `initialize`
/// but accepts older client requests to stay interoperable with clients
/// built against earlier protocol revisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum McpVersion {
    V2024_11_05,
    V2025_03_26,
    V2025_06_18,
}

impl McpVersion {
    pub const CURRENT: McpVersion = McpVersion::V2025_06_18;

    pub fn as_str(&self) -> &'static str {
        match self {
            McpVersion::V2024_11_05 => "2024-11-05",
            McpVersion::V2025_03_26 => "2025-03-26",
            McpVersion::V2025_06_18 => "2025-06-18",
        }
    }

    pub fn parse(s: &str) -> Option<McpVersion> {
        match s {
            "2024-11-05" => Some(McpVersion::V2024_11_05),
            "2025-03-26" => Some(McpVersion::V2025_03_26),
            "2025-06-18" => Some(McpVersion::V2025_06_18),
            _ => None,
        }
    }

    /// The version the gateway negotiates for a client request: the
    /// client's version if recognized, otherwise its own current version
    /// (clients are expected to reject a mismatch if they care).
    pub fn negotiate(requested: &str) -> McpVersion {
        McpVersion::parse(requested).unwrap_or(McpVersion::CURRENT)
    }
}

impl std::fmt::Display for McpVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negotiate_keeps_known_version() {
        assert_eq!(McpVersion::negotiate("2024-11-05"), McpVersion::V2024_11_05);
    }

    #[test]
    fn negotiate_falls_back_to_current_for_unknown() {
        assert_eq!(McpVersion::negotiate("2099-01-01"), McpVersion::CURRENT);
    }
}
