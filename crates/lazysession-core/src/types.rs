use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The key-value content of a session.
pub type SessionData = HashMap<String, serde_json::Value>;

/// Fourteen days, in seconds.
pub const DEFAULT_MAX_AGE: u64 = 14 * 24 * 60 * 60;

/// What the request/response layer needs once a request is done with its session.
///
/// The boundary layer emits a `Set-Cookie` header only when `accessed` is true.
/// A `content` of `None` means the client's cookie should be removed
/// (`Max-Age=0`); otherwise the cookie carries `content` with `max_age`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionCookie {
    pub accessed: bool,
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_age: Option<u64>,
}

impl SessionCookie {
    /// Max age the boundary should put on the cookie header.
    ///
    /// Deleting a cookie always uses zero; `None` means a cookie that lives
    /// for the browser session.
    pub fn header_max_age(&self) -> Option<u64> {
        if self.content.is_none() {
            Some(0)
        } else {
            self.max_age
        }
    }
}

/// When a materialized store-backed session is written back.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommitPolicy {
    /// Save every materialized session, modified or not.
    #[default]
    Always,
    /// Save only when a write happened; otherwise keep the entry alive.
    Modified,
}

impl std::fmt::Display for CommitPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CommitPolicy::Always => write!(f, "always"),
            CommitPolicy::Modified => write!(f, "modified"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_max_age_for_removal() {
        let cookie = SessionCookie {
            accessed: true,
            content: None,
            max_age: Some(3600),
        };
        assert_eq!(cookie.header_max_age(), Some(0));
    }

    #[test]
    fn test_header_max_age_passthrough() {
        let cookie = SessionCookie {
            accessed: true,
            content: Some("abc".to_string()),
            max_age: None,
        };
        assert_eq!(cookie.header_max_age(), None);
    }

    #[test]
    fn test_commit_policy_serde() {
        let p: CommitPolicy = serde_json::from_str("\"modified\"").unwrap();
        assert_eq!(p, CommitPolicy::Modified);
        assert_eq!(serde_json::to_string(&CommitPolicy::Always).unwrap(), "\"always\"");
    }
}
