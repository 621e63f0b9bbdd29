use std::sync::Arc;

use castkit::{
    command_trait::{CommandTrait, EmptyArg},
    reply::CommandReplyTarget,
};
use teloxide::prelude::ResponseResult;

use crate::{
    commands::{NO_SENDER_REPLY, reply_with, subscriber_of},
    error::StoreError,
    storages::{RecipientRegistry, SubscriberId},
};

#[derive(Default, Debug, Clone, PartialEq)]
pub struct CommandStop;

impl CommandStop {
    pub async fn unsubscribe(
        &self,
        registry: &RecipientRegistry,
        subscriber: SubscriberId,
    ) -> Result<String, StoreError> {
        if registry.remove_subscriber(subscriber).await? {
            log::info!("Subscriber {} left", subscriber);
            Ok("👋 You are unsubscribed. Send /start to subscribe again.".to_string())
        } else {
            Ok("You are not subscribed.".to_string())
        }
    }
}

impl CommandTrait for CommandStop {
    type A = EmptyArg;
    type B = EmptyArg;

    type Context = Arc<RecipientRegistry>;

    const NAME: &'static str = "stop";
    const PLACEHOLDERS: &'static [&'static str] = &[];

    fn from_arguments(_: Option<Self::A>, _: Option<Self::B>) -> Self {
        CommandStop
    }

    async fn run(&self, target: &CommandReplyTarget, registry: Self::Context) -> ResponseResult<()> {
        let Some(subscriber) = subscriber_of(target) else {
            target.send_text(NO_SENDER_REPLY).await?;
            return Ok(());
        };
        reply_with(target, self.unsubscribe(&registry, subscriber).await).await
    }
}

impl From<CommandStop> for crate::commands::Command {
    fn from(cmd: CommandStop) -> Self {
        crate::commands::Command::Stop(cmd)
    }
}
