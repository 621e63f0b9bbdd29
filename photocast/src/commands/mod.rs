pub mod command_add_channel;
pub mod command_force_post;
pub mod command_help;
pub mod command_list_channels;
pub mod command_list_users;
pub mod command_remove_channel;
pub mod command_start;
pub mod command_stop;

use std::sync::Arc;

use castkit::{command_trait::CommandTrait, reply::CommandReplyTarget};
use teloxide::{prelude::*, types::UserId, utils::command::BotCommands};

use crate::{
    commands::{
        command_add_channel::CommandAddChannel, command_force_post::CommandForcePost,
        command_help::CommandHelp, command_list_channels::CommandListChannels,
        command_list_users::CommandListUsers, command_remove_channel::CommandRemoveChannel,
        command_start::CommandStart, command_stop::CommandStop,
    },
    distributor::Distributor,
    error::StoreError,
    storages::{RecipientRegistry, SubscriberId},
};

pub const ADMIN_ONLY_REPLY: &str = "⛔ Sorry, this command is only available to the administrator.";

/// Bot commands
#[derive(BotCommands, Clone, Debug, PartialEq)]
#[command(
    rename_rule = "lowercase",
    description = "These commands are supported:"
)]
pub enum Command {
    #[command(
        description = "subscribe to images",
        parse_with = CommandStart::parse_arguments
    )]
    Start(CommandStart),
    #[command(
        description = "unsubscribe from images",
        parse_with = CommandStop::parse_arguments
    )]
    Stop(CommandStop),
    #[command(
        description = "display this help",
        parse_with = CommandHelp::parse_arguments
    )]
    Help(CommandHelp),
    #[command(
        description = "add a channel (admin)",
        parse_with = CommandAddChannel::parse_arguments
    )]
    AddChannel(CommandAddChannel),
    #[command(
        description = "remove a channel (admin)",
        parse_with = CommandRemoveChannel::parse_arguments
    )]
    RemoveChannel(CommandRemoveChannel),
    #[command(
        description = "list channels (admin)",
        parse_with = CommandListChannels::parse_arguments
    )]
    ListChannels(CommandListChannels),
    #[command(
        description = "list subscribers (admin)",
        parse_with = CommandListUsers::parse_arguments
    )]
    ListUsers(CommandListUsers),
    #[command(
        description = "run a distribution cycle now (admin)",
        parse_with = CommandForcePost::parse_arguments
    )]
    ForcePost(CommandForcePost),
}

impl Command {
    /// Everything except subscription management and help is reserved for the administrator
    pub fn requires_admin(&self) -> bool {
        !matches!(
            self,
            Command::Start(_) | Command::Stop(_) | Command::Help(_)
        )
    }
}

impl From<Command> for String {
    fn from(val: Command) -> Self {
        match val {
            Command::Start(start) => start.to_command_string(),
            Command::Stop(stop) => stop.to_command_string(),
            Command::Help(help) => help.to_command_string(),
            Command::AddChannel(add_channel) => add_channel.to_command_string(),
            Command::RemoveChannel(remove_channel) => remove_channel.to_command_string(),
            Command::ListChannels(list_channels) => list_channels.to_command_string(),
            Command::ListUsers(list_users) => list_users.to_command_string(),
            Command::ForcePost(force_post) => force_post.to_command_string(),
        }
    }
}

impl std::fmt::Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", String::from(self.clone()))
    }
}

/// The user who sent the command, also in group chats. Anonymous senders have none.
pub(crate) fn subscriber_of(target: &CommandReplyTarget) -> Option<SubscriberId> {
    target.sender.map(SubscriberId::from)
}

pub const NO_SENDER_REPLY: &str = "Only users can subscribe, send this command from your own account.";

/// Reply with the outcome of a storage operation
pub(crate) async fn reply_with(
    target: &CommandReplyTarget,
    result: Result<String, StoreError>,
) -> ResponseResult<()> {
    match result {
        Ok(text) => {
            target.send_text(text).await?;
        }
        Err(e) => {
            log::error!("Command storage operation failed: {}", e);
            target.send_text(format!("❌ Error: {}", e)).await?;
        }
    }
    Ok(())
}

/// Execute a single parsed command on behalf of the message sender
pub async fn execute_command(
    target: CommandReplyTarget,
    cmd: Command,
    registry: Arc<RecipientRegistry>,
    distributor: Arc<Distributor>,
    admin_id: UserId,
) -> ResponseResult<()> {
    if cmd.requires_admin() && !target.is_sent_by(admin_id) {
        log::warn!(
            "Rejected {} from non-admin {:?} in chat {}",
            cmd,
            target.sender,
            target.chat_id
        );
        target.send_text(ADMIN_ONLY_REPLY).await?;
        return Ok(());
    }
    log::info!("Executing {} in chat {}", cmd, target.chat_id);
    match cmd {
        Command::Start(start) => start.run(&target, (registry, admin_id)).await,
        Command::Stop(stop) => stop.run(&target, registry).await,
        Command::Help(help) => help.run(&target, ()).await,
        Command::AddChannel(add_channel) => add_channel.run(&target, registry).await,
        Command::RemoveChannel(remove_channel) => remove_channel.run(&target, registry).await,
        Command::ListChannels(list_channels) => list_channels.run(&target, registry).await,
        Command::ListUsers(list_users) => list_users.run(&target, registry).await,
        Command::ForcePost(force_post) => force_post.run(&target, distributor).await,
    }
}
