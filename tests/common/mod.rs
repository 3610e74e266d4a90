//! Common test doubles for the cycle tests.

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use xrelay::sink::{DeliveryError, DeliverySink};
use xrelay::source::{Credentials, Post, SessionCookie, SourceClient, SourceError};

pub fn credentials() -> Credentials {
    Credentials {
        username: "watcher".to_string(),
        password: "hunter2".to_string(),
        email: None,
    }
}

pub fn post(id: &str, timestamp: i64) -> Post {
    Post {
        id: id.to_string(),
        username: "watched".to_string(),
        text: format!("post {id}"),
        timestamp,
        is_reply: false,
        is_retweet: false,
        is_quote: false,
        media: Vec::new(),
        urls: Vec::new(),
        permanent_url: format!("https://x.com/watched/status/{id}"),
        retweeted: None,
        quoted: None,
    }
}

pub fn reply(id: &str, timestamp: i64) -> Post {
    Post {
        is_reply: true,
        ..post(id, timestamp)
    }
}

// ============================================================================
// ScriptedSource
// ============================================================================

/// Source double: fetches pop scripted batches in order, logins can be made
/// to fail a fixed number of times.
#[derive(Default)]
pub struct ScriptedSource {
    login_failures: AtomicUsize,
    fetch_failures: AtomicUsize,
    batches: Mutex<VecDeque<Vec<Post>>>,
    login_calls: AtomicUsize,
    fetch_calls: AtomicUsize,
}

impl ScriptedSource {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Make the next `count` logins fail with an auth error.
    pub fn fail_logins(&self, count: usize) {
        self.login_failures.store(count, Ordering::SeqCst);
    }

    /// Make the next `count` fetches fail with a transport-class error.
    pub fn fail_fetches(&self, count: usize) {
        self.fetch_failures.store(count, Ordering::SeqCst);
    }

    pub fn queue_batch(&self, batch: Vec<Post>) {
        self.batches.lock().unwrap().push_back(batch);
    }

    pub fn login_calls(&self) -> usize {
        self.login_calls.load(Ordering::SeqCst)
    }

    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SourceClient for ScriptedSource {
    async fn login(&self, _credentials: &Credentials) -> Result<Vec<SessionCookie>, SourceError> {
        self.login_calls.fetch_add(1, Ordering::SeqCst);
        let remaining = self.login_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.login_failures.store(remaining - 1, Ordering::SeqCst);
            return Err(SourceError::Auth("scripted login failure".to_string()));
        }
        Ok(vec![SessionCookie {
            key: "auth_token".to_string(),
            value: "scripted".to_string(),
            domain: None,
            path: None,
            expires: None,
        }])
    }

    async fn is_authenticated(&self, _session: &[SessionCookie]) -> Result<bool, SourceError> {
        Ok(true)
    }

    async fn fetch_latest(
        &self,
        _session: &[SessionCookie],
        _account: &str,
        _count: usize,
    ) -> Result<Vec<Post>, SourceError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        let remaining = self.fetch_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.fetch_failures.store(remaining - 1, Ordering::SeqCst);
            return Err(SourceError::Status {
                status: 503,
                message: "scripted fetch failure".to_string(),
            });
        }
        Ok(self.batches.lock().unwrap().pop_front().unwrap_or_default())
    }
}

// ============================================================================
// RecordingSink
// ============================================================================

/// Sink double: records delivered post ids, fails the posts it is told to.
#[derive(Default)]
pub struct RecordingSink {
    delivered: Mutex<Vec<String>>,
    failing: Mutex<HashSet<String>>,
}

impl RecordingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Make every delivery of `id` fail.
    pub fn fail_post(&self, id: &str) {
        self.failing.lock().unwrap().insert(id.to_string());
    }

    pub fn delivered_ids(&self) -> Vec<String> {
        self.delivered.lock().unwrap().clone()
    }
}

#[async_trait]
impl DeliverySink for RecordingSink {
    async fn deliver(&self, post: &Post) -> Result<(), DeliveryError> {
        if self.failing.lock().unwrap().contains(&post.id) {
            return Err(DeliveryError::new(&post.id, "scripted delivery failure"));
        }
        self.delivered.lock().unwrap().push(post.id.clone());
        Ok(())
    }
}
