//! Upstream source capability: the post data model, the client trait, and
//! the session manager that owns authentication state.

pub mod http;
pub mod session;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use http::HttpSourceClient;
pub use session::SessionManager;

// ============================================================================
// Session
// ============================================================================

/// Login credentials for the upstream source.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
    pub email: Option<String>,
}

/// One cookie record of the persisted session.
///
/// The full session is a `Vec<SessionCookie>`; it is opaque to everything
/// except the source client, which turns it back into a Cookie header.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionCookie {
    pub key: String,
    pub value: String,
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub expires: Option<DateTime<Utc>>,
}

// ============================================================================
// Post
// ============================================================================

/// Kind of an attached media item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Photo,
    Video,
}

/// One attached media item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Media {
    pub url: String,
    pub kind: MediaKind,
}

/// Reference to the original post behind a repost or quote.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostRef {
    pub id: String,
    pub permanent_url: String,
}

/// One fetched post. Immutable once fetched; the same shape is used on the
/// wire and in the ledger snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: String,
    pub username: String,
    pub text: String,
    /// Creation time in milliseconds since epoch; the ordering key.
    pub timestamp: i64,
    #[serde(default)]
    pub is_reply: bool,
    #[serde(default)]
    pub is_retweet: bool,
    #[serde(default)]
    pub is_quote: bool,
    #[serde(default)]
    pub media: Vec<Media>,
    /// Links embedded in the post body.
    #[serde(default)]
    pub urls: Vec<String>,
    pub permanent_url: String,
    #[serde(default)]
    pub retweeted: Option<PostRef>,
    #[serde(default)]
    pub quoted: Option<PostRef>,
}

impl Post {
    /// An original post, as opposed to a repost or quote.
    pub fn is_original(&self) -> bool {
        !self.is_retweet && !self.is_quote
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Errors surfaced by the upstream source.
#[derive(Debug, Error)]
pub enum SourceError {
    /// Login or session validation was rejected. Recovered by a fresh
    /// login on the next cycle.
    #[error("authentication rejected by source: {0}")]
    Auth(String),

    /// A fetch was attempted without an authenticated session.
    #[error("not authenticated")]
    NotAuthenticated,

    /// HTTP transport failure (connect, timeout, malformed body).
    #[error("source request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The source answered with a non-auth error status.
    #[error("source returned status {status}: {message}")]
    Status { status: u16, message: String },
}

impl SourceError {
    /// Auth-class errors mean the session is dead and a re-login is needed,
    /// as opposed to transient transport failures.
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Auth(_) | Self::NotAuthenticated)
    }
}

// ============================================================================
// Capability
// ============================================================================

/// Capability interface to the upstream source.
///
/// Implementations are stateless with respect to the session; the caller
/// passes the cookie records it wants the request made with.
#[async_trait]
pub trait SourceClient: Send + Sync {
    /// Perform a fresh login and return the resulting session.
    async fn login(&self, credentials: &Credentials) -> Result<Vec<SessionCookie>, SourceError>;

    /// Probe whether a restored session is still accepted.
    async fn is_authenticated(&self, session: &[SessionCookie]) -> Result<bool, SourceError>;

    /// Fetch the latest `count` posts of `account`, as returned by the
    /// source (newest first is typical but not guaranteed).
    async fn fetch_latest(
        &self,
        session: &[SessionCookie],
        account: &str,
        count: usize,
    ) -> Result<Vec<Post>, SourceError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn post_wire_shape_roundtrips() {
        let post = Post {
            id: "1".to_string(),
            username: "someaccount".to_string(),
            text: "hello".to_string(),
            timestamp: 1_700_000_000_000,
            is_reply: false,
            is_retweet: true,
            is_quote: false,
            media: vec![Media {
                url: "https://cdn.example/a.jpg".to_string(),
                kind: MediaKind::Photo,
            }],
            urls: vec!["https://example.com".to_string()],
            permanent_url: "https://x.com/someaccount/status/1".to_string(),
            retweeted: Some(PostRef {
                id: "0".to_string(),
                permanent_url: "https://x.com/other/status/0".to_string(),
            }),
            quoted: None,
        };

        let json = serde_json::to_string(&post).unwrap();
        let back: Post = serde_json::from_str(&json).unwrap();
        assert_eq!(back, post);
    }

    #[test]
    fn post_optional_fields_default() {
        let post: Post = serde_json::from_str(
            r#"{
                "id": "9",
                "username": "someaccount",
                "text": "minimal",
                "timestamp": 100,
                "permanent_url": "https://x.com/someaccount/status/9"
            }"#,
        )
        .unwrap();

        assert!(!post.is_reply);
        assert!(post.media.is_empty());
        assert!(post.urls.is_empty());
        assert!(post.retweeted.is_none());
        assert!(post.is_original());
    }

    #[test]
    fn auth_classification() {
        assert!(SourceError::Auth("bad password".into()).is_auth());
        assert!(SourceError::NotAuthenticated.is_auth());
        assert!(
            !SourceError::Status {
                status: 503,
                message: "overloaded".into()
            }
            .is_auth()
        );
    }
}
