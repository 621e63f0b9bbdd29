use teloxide::{
    prelude::*,
    types::{InputFile, Recipient},
};

use crate::{error::SendError, storages::PhotoLocator};

/// Outgoing side of the messaging platform used by the distribution engine
#[async_trait::async_trait]
pub trait MessengerTrait: Send + Sync {
    /// Send a stored photo to a channel or user
    async fn send_photo(&self, recipient: Recipient, photo: &PhotoLocator) -> Result<(), SendError>;

    /// Best-effort text notification to the administrator, failures are only logged
    async fn notify_admin(&self, text: &str);
}

pub struct TelegramMessenger {
    bot: Bot,
    admin_chat: ChatId,
}

impl TelegramMessenger {
    pub fn new(bot: Bot, admin_chat: ChatId) -> Self {
        Self { bot, admin_chat }
    }
}

#[async_trait::async_trait]
impl MessengerTrait for TelegramMessenger {
    async fn send_photo(&self, recipient: Recipient, photo: &PhotoLocator) -> Result<(), SendError> {
        let file = match photo {
            PhotoLocator::File(path) => InputFile::file(path.clone()),
            PhotoLocator::Memory(bytes) => InputFile::memory(bytes.to_vec()).file_name("photo.jpg"),
        };
        self.bot.send_photo(recipient, file).await?;
        Ok(())
    }

    async fn notify_admin(&self, text: &str) {
        if let Err(e) = self.bot.send_message(self.admin_chat, text).await {
            log::error!("Failed to notify administrator: {}", e);
        }
    }
}
