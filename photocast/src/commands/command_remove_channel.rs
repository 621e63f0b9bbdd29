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
pub struct CommandRemoveChannel {
    pub channel: Option<ChannelId>,
}

impl CommandRemoveChannel {
    pub async fn execute(&self, registry: &RecipientRegistry) -> Result<String, StoreError> {
        let Some(channel) = &self.channel else {
            return Ok(format!("Usage: {}", Self::usage()));
        };
        if registry.remove_channel(channel).await? {
            log::info!("Channel {} removed", channel);
            Ok(format!("🗑️ Channel {} removed.", channel))
        } else {
            Ok(format!("Channel {} is not in the list.", channel))
        }
    }
}

impl CommandTrait for CommandRemoveChannel {
    type A = ChannelId;
    type B = EmptyArg;

    type Context = Arc<RecipientRegistry>;

    const NAME: &'static str = "removechannel";
    const PLACEHOLDERS: &'static [&'static str] = &["channel"];

    fn from_arguments(channel: Option<Self::A>, _: Option<Self::B>) -> Self {
        CommandRemoveChannel { channel }
    }

    fn arguments(&self) -> Vec<String> {
        self.channel.iter().map(ToString::to_string).collect()
    }

    async fn run(&self, target: &CommandReplyTarget, registry: Self::Context) -> ResponseResult<()> {
        reply_with(target, self.execute(&registry).await).await
    }
}

impl From<CommandRemoveChannel> for crate::commands::Command {
    fn from(cmd: CommandRemoveChannel) -> Self {
        crate::commands::Command::RemoveChannel(cmd)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storages::KvStorage;

    #[tokio::test]
    async fn test_remove_channel() {
        let registry = RecipientRegistry::new(Arc::new(KvStorage::new()));
        let alpha: ChannelId = "@alpha_channel".parse().unwrap();
        let bravo: ChannelId = "-1001234567890".parse().unwrap();
        registry.add_channel(alpha.clone()).await.unwrap();
        registry.add_channel(bravo.clone()).await.unwrap();

        let cmd = CommandRemoveChannel {
            channel: Some(alpha),
        };
        assert_eq!(
            cmd.execute(&registry).await.unwrap(),
            "🗑️ Channel @alpha_channel removed."
        );
        assert_eq!(
            cmd.execute(&registry).await.unwrap(),
            "Channel @alpha_channel is not in the list."
        );
        assert_eq!(registry.list_channels().await.unwrap(), vec![bravo]);

        assert_eq!(
            CommandRemoveChannel::default().execute(&registry).await.unwrap(),
            "Usage: /removechannel <channel>"
        );
    }
}
