use std::sync::Arc;

use castkit::{
    command_trait::{CommandTrait, EmptyArg},
    reply::CommandReplyTarget,
};
use teloxide::{prelude::ResponseResult, types::UserId, utils::html};

use crate::{
    commands::{
        command_add_channel::CommandAddChannel, command_force_post::CommandForcePost,
        command_list_channels::CommandListChannels, command_list_users::CommandListUsers,
        command_remove_channel::CommandRemoveChannel, NO_SENDER_REPLY, reply_with, subscriber_of,
    },
    error::StoreError,
    storages::{RecipientRegistry, SubscriberId},
};

#[derive(Default, Debug, Clone, PartialEq)]
pub struct CommandStart;

impl CommandStart {
    pub async fn subscribe(
        &self,
        registry: &RecipientRegistry,
        subscriber: SubscriberId,
    ) -> Result<String, StoreError> {
        if registry.add_subscriber(subscriber).await? {
            log::info!("New subscriber {}", subscriber);
            Ok("✅ You are subscribed! New images will arrive here on schedule. Send /stop to unsubscribe.".to_string())
        } else {
            Ok("You are already subscribed. Send /stop to unsubscribe.".to_string())
        }
    }
}

impl CommandTrait for CommandStart {
    type A = EmptyArg;
    type B = EmptyArg;

    /// Registry and the administrator, who additionally gets the admin panel
    type Context = (Arc<RecipientRegistry>, UserId);

    const NAME: &'static str = "start";
    const PLACEHOLDERS: &'static [&'static str] = &[];

    fn from_arguments(_: Option<Self::A>, _: Option<Self::B>) -> Self {
        CommandStart
    }

    async fn run(
        &self,
        target: &CommandReplyTarget,
        (registry, admin_id): Self::Context,
    ) -> ResponseResult<()> {
        let Some(subscriber) = subscriber_of(target) else {
            target.send_text(NO_SENDER_REPLY).await?;
            return Ok(());
        };
        reply_with(target, self.subscribe(&registry, subscriber).await).await?;
        if target.is_sent_by(admin_id) {
            target.send_html(admin_panel()).await?;
        }
        Ok(())
    }
}

/// Administrator command overview in Telegram HTML
pub fn admin_panel() -> String {
    let commands = [
        (CommandAddChannel::usage(), "add a channel"),
        (CommandRemoveChannel::usage(), "remove a channel"),
        (CommandListChannels::usage(), "list channels"),
        (CommandListUsers::usage(), "list subscribers"),
        (CommandForcePost::usage(), "run a distribution cycle now"),
    ];
    let lines = commands
        .iter()
        .map(|(usage, description)| format!("<code>{}</code> - {}", html::escape(usage), description))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "<b>🛠 Admin panel</b> (photocast v{})\n\n{}\n\nSend a photo to add it to the image storage.",
        env!("CARGO_PKG_VERSION"),
        lines
    )
}

impl From<CommandStart> for crate::commands::Command {
    fn from(cmd: CommandStart) -> Self {
        crate::commands::Command::Start(cmd)
    }
}
