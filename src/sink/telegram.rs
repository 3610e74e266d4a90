//! Telegram delivery via the Bot API.
//!
//! One post becomes one message: a plain text message, a single photo or
//! video with caption, or a media album. A failed rich send falls back to a
//! minimal plain-text message before the failure is reported.

use std::time::Duration;

use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::{
    InlineKeyboardButton, InlineKeyboardMarkup, InputFile, LinkPreviewOptions, MessageId,
    ParseMode, ThreadId,
};
use tracing::{debug, warn};

use crate::config::TelegramConfig;
use crate::source::{MediaKind, Post};

use super::format;
use super::{DeliveryError, DeliverySink};

const BUTTON_LABEL: &str = "View post";

pub struct TelegramSink {
    bot: Bot,
    chat: ChatId,
    thread: Option<ThreadId>,
    admin: Option<ChatId>,
}

impl TelegramSink {
    pub fn new(config: &TelegramConfig) -> Self {
        // Timeout must exceed what Telegram needs to pull remote media.
        let client = teloxide::net::default_reqwest_settings()
            .timeout(Duration::from_secs(60))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .expect("failed to build HTTP client");

        Self {
            bot: Bot::with_client(&config.bot_token, client),
            chat: ChatId(config.chat_id),
            thread: config.thread_id.map(|id| ThreadId(MessageId(id))),
            admin: config.admin_chat_id.map(ChatId),
        }
    }

    /// Best-effort notification to the admin chat, if one is configured.
    pub async fn announce(&self, text: &str) -> Result<(), teloxide::RequestError> {
        let Some(admin) = self.admin else {
            return Ok(());
        };
        self.bot.send_message(admin, text).await?;
        Ok(())
    }

    async fn deliver_rich(&self, post: &Post) -> Result<(), DeliveryError> {
        let caption = format::caption(post);

        // Only original posts carry their own media; reshared media belongs
        // to the linked original and is shown by the preview instead.
        if post.is_original() && !post.media.is_empty() {
            if post.media.len() == 1 {
                self.send_single_media(post, &caption).await
            } else {
                self.send_album(post, &caption).await
            }
        } else {
            self.send_text(post, &caption).await
        }
    }

    async fn send_text(&self, post: &Post, caption: &str) -> Result<(), DeliveryError> {
        let mut preview = LinkPreviewOptions {
            is_disabled: false,
            url: None,
            prefer_small_media: false,
            prefer_large_media: true,
            show_above_text: false,
        };
        match format::preview_url(post) {
            Some(url) => preview.url = Some(url.to_string()),
            None => preview.is_disabled = true,
        }

        let mut request = self
            .bot
            .send_message(self.chat, caption)
            .parse_mode(ParseMode::Html)
            .link_preview_options(preview)
            .reply_markup(self.post_button(post)?);
        if let Some(thread) = self.thread {
            request = request.message_thread_id(thread);
        }
        request.await.map_err(|e| send_error(post, e))?;
        Ok(())
    }

    async fn send_single_media(&self, post: &Post, caption: &str) -> Result<(), DeliveryError> {
        let item = &post.media[0];
        let url: reqwest::Url = item
            .url
            .parse()
            .map_err(|_| DeliveryError::new(&post.id, format!("invalid media url: {}", item.url)))?;
        let file = InputFile::url(url);
        let keyboard = self.post_button(post)?;

        match item.kind {
            MediaKind::Photo => {
                let mut request = self
                    .bot
                    .send_photo(self.chat, file)
                    .caption(caption)
                    .parse_mode(ParseMode::Html)
                    .reply_markup(keyboard);
                if let Some(thread) = self.thread {
                    request = request.message_thread_id(thread);
                }
                request.await.map_err(|e| send_error(post, e))?;
            }
            MediaKind::Video => {
                let mut request = self
                    .bot
                    .send_video(self.chat, file)
                    .caption(caption)
                    .parse_mode(ParseMode::Html)
                    .reply_markup(keyboard);
                if let Some(thread) = self.thread {
                    request = request.message_thread_id(thread);
                }
                request.await.map_err(|e| send_error(post, e))?;
            }
        }
        Ok(())
    }

    async fn send_album(&self, post: &Post, caption: &str) -> Result<(), DeliveryError> {
        // Albums cannot carry reply markup, so the link rides in the caption.
        let caption = format!(
            "{caption}\n\n<a href=\"{}\">{BUTTON_LABEL}</a>",
            post.permanent_url
        );
        let media = format::album(post, &caption)?;

        let mut request = self.bot.send_media_group(self.chat, media);
        if let Some(thread) = self.thread {
            request = request.message_thread_id(thread);
        }
        request.await.map_err(|e| send_error(post, e))?;
        Ok(())
    }

    async fn deliver_plain(&self, post: &Post) -> Result<(), DeliveryError> {
        let text = format!("{}:\n\n{}", post.permanent_url, post.text);
        let mut request = self.bot.send_message(self.chat, text);
        if let Some(thread) = self.thread {
            request = request.message_thread_id(thread);
        }
        request.await.map_err(|e| send_error(post, e))?;
        Ok(())
    }

    fn post_button(&self, post: &Post) -> Result<InlineKeyboardMarkup, DeliveryError> {
        let url: reqwest::Url = post.permanent_url.parse().map_err(|_| {
            DeliveryError::new(&post.id, format!("invalid post url: {}", post.permanent_url))
        })?;
        Ok(InlineKeyboardMarkup::new([[InlineKeyboardButton::url(
            BUTTON_LABEL,
            url,
        )]]))
    }
}

#[async_trait]
impl DeliverySink for TelegramSink {
    async fn deliver(&self, post: &Post) -> Result<(), DeliveryError> {
        match self.deliver_rich(post).await {
            Ok(()) => Ok(()),
            Err(e) => {
                warn!(post_id = %post.id, error = %e, "rich delivery failed, sending plain text");
                self.deliver_plain(post).await?;
                debug!(post_id = %post.id, "plain-text fallback delivered");
                Ok(())
            }
        }
    }
}

fn send_error(post: &Post, error: teloxide::RequestError) -> DeliveryError {
    DeliveryError::new(&post.id, error.to_string())
}
