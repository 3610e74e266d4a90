//! Presentation formatting for relayed posts.
//!
//! Everything here is a pure function of one post: HTML escaping, mention
//! rewriting, caption assembly, album construction. Nothing touches the
//! network.

use std::sync::LazyLock;

use regex::Regex;
use teloxide::types::{InputFile, InputMedia, InputMediaPhoto, InputMediaVideo, ParseMode};

use crate::source::{MediaKind, Post};

use super::DeliveryError;

/// Telegram albums carry at most this many attachments.
pub const ALBUM_LIMIT: usize = 10;

/// Public profile base, used for title and mention links.
const PROFILE_BASE: &str = "https://x.com";

static MENTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"@(\w+)").expect("mention pattern is valid"));

// ============================================================================
// Text
// ============================================================================

/// Escape the characters Telegram's HTML parse mode treats specially.
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

pub fn profile_url(account: &str) -> String {
    format!("{PROFILE_BASE}/{}", account.trim_start_matches('@'))
}

/// Rewrite `@mention` tokens into profile links, so chat readers land on the
/// real profile instead of a same-named handle on the chat platform.
pub fn link_mentions(text: &str) -> String {
    MENTION
        .replace_all(text, |caps: &regex::Captures| {
            format!(
                "<a href=\"{PROFILE_BASE}/{handle}\">@{handle}</a>",
                handle = &caps[1]
            )
        })
        .into_owned()
}

/// Build the HTML caption for a post: linked author, bold verb, body.
pub fn caption(post: &Post) -> String {
    let verb = if post.is_retweet {
        "reposted 🔁"
    } else if post.is_quote {
        "quoted 📝"
    } else {
        "posted ✏️"
    };
    let title = format!(
        "<a href=\"{}\">{}</a> <b>{verb}:</b>",
        profile_url(&post.username),
        post.username
    );
    format!("{title}\n\n{}", link_mentions(&escape_html(&post.text)))
}

/// Pick the link-preview target: the reshared or quoted original when there
/// is one, else the first embedded link, else nothing (preview disabled).
pub fn preview_url(post: &Post) -> Option<&str> {
    if post.is_retweet {
        post.retweeted.as_ref().map(|r| r.permanent_url.as_str())
    } else if post.is_quote {
        post.quoted.as_ref().map(|q| q.permanent_url.as_str())
    } else {
        post.urls.first().map(String::as_str)
    }
}

// ============================================================================
// Albums
// ============================================================================

/// Build the media-group entries for a multi-attachment post.
///
/// Attachments beyond [`ALBUM_LIMIT`] are dropped. The caption rides on the
/// first entry only; Telegram shows it under the whole album.
pub fn album(post: &Post, caption: &str) -> Result<Vec<InputMedia>, DeliveryError> {
    let mut media = Vec::with_capacity(post.media.len().min(ALBUM_LIMIT));

    for item in post.media.iter().take(ALBUM_LIMIT) {
        let url: reqwest::Url = item
            .url
            .parse()
            .map_err(|_| DeliveryError::new(&post.id, format!("invalid media url: {}", item.url)))?;
        let file = InputFile::url(url);
        let first = media.is_empty();

        let entry = match item.kind {
            MediaKind::Photo => {
                let mut photo = InputMediaPhoto::new(file);
                if first {
                    photo = photo.caption(caption).parse_mode(ParseMode::Html);
                }
                InputMedia::Photo(photo)
            }
            MediaKind::Video => {
                let mut video = InputMediaVideo::new(file);
                if first {
                    video = video.caption(caption).parse_mode(ParseMode::Html);
                }
                InputMedia::Video(video)
            }
        };
        media.push(entry);
    }

    Ok(media)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{Media, PostRef};

    fn post(id: &str) -> Post {
        Post {
            id: id.to_string(),
            username: "someaccount".to_string(),
            text: "hello world".to_string(),
            timestamp: 100,
            is_reply: false,
            is_retweet: false,
            is_quote: false,
            media: Vec::new(),
            urls: Vec::new(),
            permanent_url: format!("https://x.com/someaccount/status/{id}"),
            retweeted: None,
            quoted: None,
        }
    }

    fn photo(url: &str) -> Media {
        Media {
            url: url.to_string(),
            kind: MediaKind::Photo,
        }
    }

    #[test]
    fn escapes_html_specials() {
        assert_eq!(
            escape_html("1 < 2 && <b>bold</b>"),
            "1 &lt; 2 &amp;&amp; &lt;b&gt;bold&lt;/b&gt;"
        );
    }

    #[test]
    fn links_mentions_to_profiles() {
        assert_eq!(
            link_mentions("cc @alice and @bob_99"),
            "cc <a href=\"https://x.com/alice\">@alice</a> and <a href=\"https://x.com/bob_99\">@bob_99</a>"
        );
    }

    #[test]
    fn leaves_text_without_mentions_alone() {
        assert_eq!(link_mentions("no mentions here"), "no mentions here");
    }

    #[test]
    fn caption_names_author_and_verb() {
        let caption = caption(&post("1"));
        assert!(caption.starts_with("<a href=\"https://x.com/someaccount\">someaccount</a>"));
        assert!(caption.contains("<b>posted ✏️:</b>"));
        assert!(caption.ends_with("hello world"));
    }

    #[test]
    fn caption_verb_tracks_post_kind() {
        let mut reposted = post("1");
        reposted.is_retweet = true;
        assert!(caption(&reposted).contains("reposted 🔁"));

        let mut quoted = post("2");
        quoted.is_quote = true;
        assert!(caption(&quoted).contains("quoted 📝"));
    }

    #[test]
    fn caption_escapes_body_before_linking() {
        let mut p = post("1");
        p.text = "<script> & @alice".to_string();
        let caption = caption(&p);
        assert!(caption.contains("&lt;script&gt; &amp;"));
        assert!(caption.contains("<a href=\"https://x.com/alice\">@alice</a>"));
    }

    #[test]
    fn preview_prefers_reshared_original() {
        let mut p = post("1");
        p.is_retweet = true;
        p.urls = vec!["https://example.com".to_string()];
        p.retweeted = Some(PostRef {
            id: "0".to_string(),
            permanent_url: "https://x.com/other/status/0".to_string(),
        });
        assert_eq!(preview_url(&p), Some("https://x.com/other/status/0"));
    }

    #[test]
    fn preview_falls_back_to_first_embedded_link() {
        let mut p = post("1");
        p.urls = vec![
            "https://example.com/a".to_string(),
            "https://example.com/b".to_string(),
        ];
        assert_eq!(preview_url(&p), Some("https://example.com/a"));
    }

    #[test]
    fn preview_absent_without_links() {
        assert_eq!(preview_url(&post("1")), None);
    }

    #[test]
    fn album_is_capped() {
        let mut p = post("1");
        p.media = (0..15)
            .map(|i| photo(&format!("https://cdn.example/{i}.jpg")))
            .collect();

        let media = album(&p, "caption").unwrap();
        assert_eq!(media.len(), ALBUM_LIMIT);
    }

    #[test]
    fn album_caption_only_on_first_entry() {
        let mut p = post("1");
        p.media = vec![
            photo("https://cdn.example/0.jpg"),
            photo("https://cdn.example/1.jpg"),
        ];

        let media = album(&p, "the caption").unwrap();
        match &media[0] {
            InputMedia::Photo(photo) => assert_eq!(photo.caption.as_deref(), Some("the caption")),
            other => panic!("expected photo, got {other:?}"),
        }
        match &media[1] {
            InputMedia::Photo(photo) => assert!(photo.caption.is_none()),
            other => panic!("expected photo, got {other:?}"),
        }
    }

    #[test]
    fn album_keeps_media_order() {
        let mut p = post("1");
        p.media = vec![
            photo("https://cdn.example/0.jpg"),
            Media {
                url: "https://cdn.example/1.mp4".to_string(),
                kind: MediaKind::Video,
            },
        ];

        let media = album(&p, "caption").unwrap();
        assert!(matches!(media[0], InputMedia::Photo(_)));
        assert!(matches!(media[1], InputMedia::Video(_)));
    }

    #[test]
    fn album_rejects_invalid_media_url() {
        let mut p = post("1");
        p.media = vec![photo("not a url")];
        assert!(album(&p, "caption").is_err());
    }
}
