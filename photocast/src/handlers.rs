use std::sync::Arc;

use castkit::reply::CommandReplyTarget;
use teloxide::{
    net::Download,
    prelude::*,
    types::{Me, PhotoSize},
    utils::command::{BotCommands, ParseError},
};

use crate::{
    commands::{Command, execute_command},
    config::Settings,
    distributor::Distributor,
    error::StoreError,
    storages::{RecipientRegistry, StorageTrait},
};

/// Handle text messages containing bot commands
pub async fn handle_text_message(
    bot: Bot,
    msg: Message,
    me: Me,
    registry: Arc<RecipientRegistry>,
    distributor: Arc<Distributor>,
    settings: Arc<Settings>,
) -> ResponseResult<()> {
    let Some(text) = msg.text() else {
        return Ok(());
    };
    if !text.starts_with('/') {
        return Ok(());
    }
    let target = CommandReplyTarget::new(bot, msg.chat.id, msg.from.as_ref().map(|user| user.id));
    match Command::parse(text, me.username()) {
        Ok(cmd) => execute_command(target, cmd, registry, distributor, settings.admin_id).await,
        // Commands for other bots in group chats
        Err(ParseError::UnknownCommand(_)) | Err(ParseError::WrongBotName(_)) => Ok(()),
        Err(e) => {
            log::info!("Failed to parse command `{}` in chat {}: {}", text, msg.chat.id, e);
            target
                .send_text(format!("❌ {}\nSend /help for the list of commands.", e))
                .await?;
            Ok(())
        }
    }
}

/// Name under which a received photo is stored
pub fn stored_photo_name(photo: &PhotoSize) -> String {
    format!("{}.jpg", photo.file.unique_id.0)
}

/// Largest available resolution of a received photo
pub fn largest_photo(sizes: &[PhotoSize]) -> Option<&PhotoSize> {
    sizes
        .iter()
        .max_by_key(|size| u64::from(size.width) * u64::from(size.height))
}

/// Store photos sent by the administrator in the image folder
pub async fn handle_photo_message(
    bot: Bot,
    msg: Message,
    storage: Arc<dyn StorageTrait>,
    settings: Arc<Settings>,
) -> ResponseResult<()> {
    let sender = msg.from.as_ref().map(|user| user.id);
    if sender != Some(settings.admin_id) {
        log::info!("Ignoring photo from {:?} in chat {}", sender, msg.chat.id);
        return Ok(());
    }
    let Some(photo) = msg.photo().and_then(largest_photo) else {
        return Ok(());
    };

    let file = bot.get_file(photo.file.id.clone()).await?;
    let mut bytes = Vec::new();
    if let Err(e) = bot.download_file(&file.path, &mut bytes).await {
        log::error!("Failed to download photo {}: {}", file.path, e);
        bot.send_message(msg.chat.id, format!("❌ Failed to download the photo: {}", e))
            .await?;
        return Ok(());
    }

    let name = stored_photo_name(photo);
    let folder = &settings.distribution.folder;
    let reply = match storage
        .as_blob_storage()
        .upload_image(folder, &name, bytes)
        .await
    {
        Ok(image) => {
            log::info!("Stored image {} in folder {}", image.id, folder);
            format!("✅ Image {} stored.", image.id)
        }
        Err(StoreError::AlreadyExists(id)) => format!("Image {} is already stored.", id),
        Err(e) => {
            log::error!("Failed to store image {}: {}", name, e);
            format!("❌ Failed to store the image: {}", e)
        }
    };
    bot.send_message(msg.chat.id, reply).await?;
    Ok(())
}
