//! Change detection between the ledger snapshot and a fetched batch.

use std::collections::HashSet;

use crate::source::Post;

/// Return the posts in `fetched` that are new relative to `seen`, oldest
/// first.
///
/// Membership is decided by post id alone; timestamps only order the result.
/// A post with an out-of-order or backfilled timestamp can therefore never
/// be reported twice or skipped.
///
/// An absent or empty `seen` is the first cycle for the account: nothing is
/// reported as new (the caller persists the batch as the baseline instead of
/// flooding the destination with history).
pub fn new_posts(seen: Option<&[Post]>, fetched: &[Post]) -> Vec<Post> {
    let seen = match seen {
        Some(seen) if !seen.is_empty() => seen,
        _ => return Vec::new(),
    };

    let known: HashSet<&str> = seen.iter().map(|post| post.id.as_str()).collect();
    let mut fresh: Vec<Post> = fetched
        .iter()
        .filter(|post| !known.contains(post.id.as_str()))
        .cloned()
        .collect();
    fresh.sort_by_key(|post| post.timestamp);
    fresh
}
