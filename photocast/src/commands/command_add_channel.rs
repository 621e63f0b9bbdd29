use std::sync::Arc;

use castkit::{
    command_trait::{CommandTrait, EmptyArg},
    reply::CommandReplyTarget,
};
use teloxide::prelude::ResponseResult;

use crate::{
    commands::reply_with,
    error::StoreError,
    storages::{ChannelId, RecipientRegistry},
};

#[derive(Default, Debug, Clone, PartialEq)]
pub struct CommandAddChannel {
    pub channel: Option<ChannelId>,
}

impl CommandAddChannel {
    pub async fn execute(&self, registry: &RecipientRegistry) -> Result<String, StoreError> {
        let Some(channel) = &self.channel else {
            return Ok(format!("Usage: {}", Self::usage()));
        };
        if registry.add_channel(channel.clone()).await? {
            log::info!("Channel {} added", channel);
            Ok(format!("✅ Channel {} added.", channel))
        } else {
            Ok(format!("Channel {} is already in the list.", channel))
        }
    }
}

impl CommandTrait for CommandAddChannel {
    type A = ChannelId;
    type B = EmptyArg;

    type Context = Arc<RecipientRegistry>;

    const NAME: &'static str = "addchannel";
    const PLACEHOLDERS: &'static [&'static str] = &["channel"];

    fn from_arguments(channel: Option<Self::A>, _: Option<Self::B>) -> Self {
        CommandAddChannel { channel }
    }

    fn arguments(&self) -> Vec<String> {
        self.channel.iter().map(ToString::to_string).collect()
    }

    async fn run(&self, target: &CommandReplyTarget, registry: Self::Context) -> ResponseResult<()> {
        reply_with(target, self.execute(&registry).await).await
    }
}

impl From<CommandAddChannel> for crate::commands::Command {
    fn from(cmd: CommandAddChannel) -> Self {
        crate::commands::Command::AddChannel(cmd)
    }
}
