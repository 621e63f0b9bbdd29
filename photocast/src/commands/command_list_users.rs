use std::sync::Arc;

use castkit::{
    command_trait::{CommandTrait, EmptyArg},
    reply::CommandReplyTarget,
};
use teloxide::prelude::ResponseResult;

use crate::{commands::reply_with, error::StoreError, storages::RecipientRegistry};

#[derive(Default, Debug, Clone, PartialEq)]
pub struct CommandListUsers;

impl CommandListUsers {
    pub async fn execute(&self, registry: &RecipientRegistry) -> Result<String, StoreError> {
        let subscribers = registry.list_subscribers().await?;
        if subscribers.is_empty() {
            return Ok("No subscribers yet.".to_string());
        }
        let ids = subscribers
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("\n");
        Ok(format!("👥 Subscribers ({}):\n{}", subscribers.len(), ids))
    }
}

impl CommandTrait for CommandListUsers {
    type A = EmptyArg;
    type B = EmptyArg;

    type Context = Arc<RecipientRegistry>;

    const NAME: &'static str = "listusers";
    const PLACEHOLDERS: &'static [&'static str] = &[];

    fn from_arguments(_: Option<Self::A>, _: Option<Self::B>) -> Self {
        CommandListUsers
    }

    async fn run(&self, target: &CommandReplyTarget, registry: Self::Context) -> ResponseResult<()> {
        reply_with(target, self.execute(&registry).await).await
    }
}

impl From<CommandListUsers> for crate::commands::Command {
    fn from(cmd: CommandListUsers) -> Self {
        crate::commands::Command::ListUsers(cmd)
    }
}
