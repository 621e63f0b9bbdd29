use teloxide::{
    payloads::SendMessageSetters,
    prelude::*,
    types::{ParseMode, UserId},
};

/// Where and to whom a command replies
#[derive(Clone)]
pub struct CommandReplyTarget {
    pub bot: Bot,
    pub chat_id: ChatId,
    /// User who issued the command, if known
    pub sender: Option<UserId>,
}

impl CommandReplyTarget {
    pub fn new(bot: Bot, chat_id: ChatId, sender: Option<UserId>) -> Self {
        Self {
            bot,
            chat_id,
            sender,
        }
    }

    /// Check whether the command was issued by the given user
    pub fn is_sent_by(&self, user: UserId) -> bool {
        self.sender == Some(user)
    }

    /// Send a plain text reply
    pub async fn send_text(&self, text: impl Into<String>) -> ResponseResult<Message> {
        self.bot.send_message(self.chat_id, text).await
    }

    /// Send a reply formatted as Telegram HTML. Dynamic parts must be escaped by the caller.
    pub async fn send_html(&self, html: impl Into<String>) -> ResponseResult<Message> {
        let html = html.into();
        log::debug!("Replying to chat {} with HTML: {}", self.chat_id, html);
        self.bot
            .send_message(self.chat_id, html)
            .parse_mode(ParseMode::Html)
            .await
    }
}
