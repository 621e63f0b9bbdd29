use castkit::{
    command_trait::{CommandTrait, EmptyArg},
    reply::CommandReplyTarget,
};
use teloxide::{prelude::ResponseResult, utils::command::BotCommands};

use super::Command;

#[derive(Default, Debug, Clone, PartialEq)]
pub struct CommandHelp;

impl CommandTrait for CommandHelp {
    type A = EmptyArg;
    type B = EmptyArg;

    type Context = ();

    const NAME: &'static str = "help";
    const PLACEHOLDERS: &'static [&'static str] = &[];

    fn from_arguments(_: Option<Self::A>, _: Option<Self::B>) -> Self {
        CommandHelp
    }

    async fn run(&self, target: &CommandReplyTarget, _context: Self::Context) -> ResponseResult<()> {
        target
            .send_text(format!(
                "📷 This bot sends a fresh image on schedule.\n\n{}",
                Command::descriptions()
            ))
            .await?;
        Ok(())
    }
}

impl From<CommandHelp> for crate::commands::Command {
    fn from(cmd: CommandHelp) -> Self {
        crate::commands::Command::Help(cmd)
    }
}
