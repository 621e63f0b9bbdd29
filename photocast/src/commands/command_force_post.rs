use std::sync::Arc;

use castkit::{
    command_trait::{CommandTrait, EmptyArg},
    reply::CommandReplyTarget,
};
use teloxide::prelude::ResponseResult;

use crate::distributor::Distributor;

pub const STARTING_REPLY: &str = "🚀 Starting distribution now, the report follows when it is done.";
pub const ALREADY_RUNNING_REPLY: &str =
    "⏳ A distribution cycle is already in progress, try again when it finishes.";

#[derive(Default, Debug, Clone, PartialEq)]
pub struct CommandForcePost;

impl CommandForcePost {
    /// Immediate reply, an error when a cycle is already running
    pub fn acknowledgement(&self, distributor: &Distributor) -> Result<&'static str, &'static str> {
        if distributor.is_running() {
            Err(ALREADY_RUNNING_REPLY)
        } else {
            Ok(STARTING_REPLY)
        }
    }

    /// Run a manual cycle and describe its outcome
    pub async fn execute(&self, distributor: &Distributor) -> String {
        match distributor.try_run_cycle().await {
            Some(report) => report.to_string(),
            None => {
                log::warn!("Manual distribution cycle rejected: another cycle is running");
                ALREADY_RUNNING_REPLY.to_string()
            }
        }
    }
}

impl CommandTrait for CommandForcePost {
    type A = EmptyArg;
    type B = EmptyArg;

    type Context = Arc<Distributor>;

    const NAME: &'static str = "forcepost";
    const PLACEHOLDERS: &'static [&'static str] = &[];

    fn from_arguments(_: Option<Self::A>, _: Option<Self::B>) -> Self {
        CommandForcePost
    }

    async fn run(
        &self,
        target: &CommandReplyTarget,
        distributor: Self::Context,
    ) -> ResponseResult<()> {
        match self.acknowledgement(&distributor) {
            Ok(text) => target.send_text(text).await?,
            Err(text) => {
                target.send_text(text).await?;
                return Ok(());
            }
        };
        // The cycle may take minutes, the update handler must not wait for it
        let cmd = self.clone();
        let target = target.clone();
        tokio::spawn(async move {
            let text = cmd.execute(&distributor).await;
            if let Err(e) = target.send_text(text).await {
                log::error!("Failed to send distribution report: {}", e);
            }
        });
        Ok(())
    }
}

impl From<CommandForcePost> for crate::commands::Command {
    fn from(cmd: CommandForcePost) -> Self {
        crate::commands::Command::ForcePost(cmd)
    }
}
