use std::sync::Arc;

use castkit::{
    command_trait::{CommandTrait, EmptyArg},
    reply::CommandReplyTarget,
};
use teloxide::prelude::ResponseResult;

use crate::{commands::reply_with, error::StoreError, storages::RecipientRegistry};

#[derive(Default, Debug, Clone, PartialEq)]
pub struct CommandListChannels;

impl CommandListChannels {
    pub async fn execute(&self, registry: &RecipientRegistry) -> Result<String, StoreError> {
        let channels = registry.list_channels().await?;
        if channels.is_empty() {
            return Ok("No channels yet. Add one with /addchannel <channel>".to_string());
        }
        let lines = channels
            .iter()
            .enumerate()
            .map(|(i, channel)| format!("{}. {}", i + 1, channel))
            .collect::<Vec<_>>()
            .join("\n");
        Ok(format!("📢 Channels ({}):\n{}", channels.len(), lines))
    }
}

impl CommandTrait for CommandListChannels {
    type A = EmptyArg;
    type B = EmptyArg;

    type Context = Arc<RecipientRegistry>;

    const NAME: &'static str = "listchannels";
    const PLACEHOLDERS: &'static [&'static str] = &[];

    fn from_arguments(_: Option<Self::A>, _: Option<Self::B>) -> Self {
        CommandListChannels
    }

    async fn run(&self, target: &CommandReplyTarget, registry: Self::Context) -> ResponseResult<()> {
        reply_with(target, self.execute(&registry).await).await
    }
}

impl From<CommandListChannels> for crate::commands::Command {
    fn from(cmd: CommandListChannels) -> Self {
        crate::commands::Command::ListChannels(cmd)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storages::KvStorage;

    #[tokio::test]
    async fn test_list_channels() {
        let registry = RecipientRegistry::new(Arc::new(KvStorage::new()));
        assert!(
            CommandListChannels
                .execute(&registry)
                .await
                .unwrap()
                .starts_with("No channels yet")
        );

        registry
            .add_channel("@alpha_channel".parse().unwrap())
            .await
            .unwrap();
        registry
            .add_channel("@bravo_channel".parse().unwrap())
            .await
            .unwrap();

        assert_eq!(
            CommandListChannels.execute(&registry).await.unwrap(),
            "📢 Channels (2):\n1. @alpha_channel\n2. @bravo_channel"
        );
    }
}
