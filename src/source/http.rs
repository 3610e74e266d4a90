//! HTTP implementation of the source capability.
//!
//! Talks to the source's JSON API with a shared reqwest client. Sessions are
//! plain cookie records: login collects them from `Set-Cookie` response
//! headers, later requests send them back as one Cookie header.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::{COOKIE, SET_COOKIE};
use reqwest::{Client, StatusCode};
use serde::Serialize;
use tracing::debug;

use super::{Credentials, Post, SessionCookie, SourceClient, SourceError};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

// ============================================================================
// Client
// ============================================================================

pub struct HttpSourceClient {
    client: Client,
    base_url: String,
}

impl HttpSourceClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, SourceError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    email: Option<&'a str>,
}

#[async_trait]
impl SourceClient for HttpSourceClient {
    async fn login(&self, credentials: &Credentials) -> Result<Vec<SessionCookie>, SourceError> {
        let response = self
            .client
            .post(self.url("/api/auth/login"))
            .json(&LoginRequest {
                username: &credentials.username,
                password: &credentials.password,
                email: credentials.email.as_deref(),
            })
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            let message = response.text().await.unwrap_or_default();
            return Err(SourceError::Auth(message));
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(SourceError::Status {
                status: status.as_u16(),
                message,
            });
        }

        let session = session_from_response(&response);
        if session.is_empty() {
            return Err(SourceError::Auth(
                "login response carried no session cookies".to_string(),
            ));
        }

        debug!(cookies = session.len(), "login succeeded");
        Ok(session)
    }

    async fn is_authenticated(&self, session: &[SessionCookie]) -> Result<bool, SourceError> {
        let response = self
            .client
            .get(self.url("/api/account/verify"))
            .header(COOKIE, cookie_header(session))
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(true);
        }
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Ok(false);
        }
        Err(SourceError::Status {
            status: status.as_u16(),
            message: response.text().await.unwrap_or_default(),
        })
    }

    async fn fetch_latest(
        &self,
        session: &[SessionCookie],
        account: &str,
        count: usize,
    ) -> Result<Vec<Post>, SourceError> {
        let account = account.trim_start_matches('@');
        let response = self
            .client
            .get(self.url(&format!("/api/users/{account}/timeline")))
            .query(&[("count", count)])
            .header(COOKIE, cookie_header(session))
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            let message = response.text().await.unwrap_or_default();
            return Err(SourceError::Auth(message));
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(SourceError::Status {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response.json().await?)
    }
}

// ============================================================================
// Cookie Handling
// ============================================================================

/// Assemble the Cookie request header from stored records.
fn cookie_header(session: &[SessionCookie]) -> String {
    session
        .iter()
        .map(|c| format!("{}={}", c.key, c.value))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Collect session cookies from a response's `Set-Cookie` headers.
fn session_from_response(response: &reqwest::Response) -> Vec<SessionCookie> {
    response
        .headers()
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .filter_map(parse_set_cookie)
        .collect()
}

/// Parse one `Set-Cookie` header value into a cookie record.
///
/// Only the attributes the session model keeps are parsed; everything else
/// (Secure, HttpOnly, SameSite) is dropped.
fn parse_set_cookie(raw: &str) -> Option<SessionCookie> {
    let mut parts = raw.split(';');
    let (key, value) = parts.next()?.split_once('=')?;
    let key = key.trim();
    if key.is_empty() {
        return None;
    }

    let mut cookie = SessionCookie {
        key: key.to_string(),
        value: value.trim().to_string(),
        domain: None,
        path: None,
        expires: None,
    };

    for attribute in parts {
        let Some((name, val)) = attribute.split_once('=') else {
            continue;
        };
        let val = val.trim();
        match name.trim().to_ascii_lowercase().as_str() {
            "domain" => cookie.domain = Some(val.to_string()),
            "path" => cookie.path = Some(val.to_string()),
            "expires" => {
                cookie.expires = DateTime::parse_from_rfc2822(val)
                    .ok()
                    .map(|t| t.with_timezone(&Utc));
            }
            _ => {}
        }
    }

    Some(cookie)
}
