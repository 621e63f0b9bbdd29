use std::{future::Future, str::FromStr};

use teloxide::{prelude::ResponseResult, utils::command::ParseError};

use crate::api::reply::CommandReplyTarget;

/// Conversion of a single whitespace-separated command argument.
/// An empty string means the argument was not provided.
pub trait ParseCommandArg: Sized {
    fn parse_command_arg(s: &str) -> Result<Option<Self>, ParseError>;
}

impl<T> ParseCommandArg for T
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    fn parse_command_arg(s: &str) -> Result<Option<Self>, ParseError> {
        if s.is_empty() {
            return Ok(None);
        }
        s.parse::<T>()
            .map(Some)
            .map_err(|e| ParseError::Custom(Box::new(e)))
    }
}

/// Placeholder for argument positions a command does not accept
#[derive(Default, Debug, Clone, PartialEq)]
pub struct EmptyArg;

impl ParseCommandArg for EmptyArg {
    fn parse_command_arg(s: &str) -> Result<Option<Self>, ParseError> {
        if s.is_empty() {
            Ok(None)
        } else {
            Err(ParseError::Custom(
                format!("Unexpected argument `{}`", s).into(),
            ))
        }
    }
}

fn get<A: ParseCommandArg>(args: &[String], pos: usize) -> Result<Option<A>, ParseError> {
    let arg = args.get(pos).map(|s| s.as_str()).unwrap_or("");
    A::parse_command_arg(arg)
}

/// Split the first line of the command arguments by spaces.
/// `\ ` keeps a literal space inside an argument, `\\` is a literal backslash.
pub(crate) fn split(arg: &str) -> Vec<String> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut chars = arg.lines().next().unwrap_or("").chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.peek() {
                Some('\\') => {
                    current.push('\\');
                    chars.next();
                }
                Some(' ') => {
                    current.push(' ');
                    chars.next();
                }
                _ => current.push('\\'),
            },
            ' ' | '\t' => {
                if !current.is_empty() {
                    args.push(std::mem::take(&mut current));
                }
            }
            _ => current.push(c),
        }
    }
    if !current.is_empty() {
        args.push(current);
    }
    args
}

pub trait CommandTrait: Sized {
    type A: ParseCommandArg;
    type B: ParseCommandArg;

    type Context;

    const NAME: &'static str;
    const PLACEHOLDERS: &'static [&'static str];

    fn from_arguments(a: Option<Self::A>, b: Option<Self::B>) -> Self;

    /// Entry point for `#[command(parse_with = ...)]` of teloxide's `BotCommands` derive
    fn parse_arguments(args: String) -> Result<(Self,), ParseError> {
        let args = split(&args);
        if args.len() > 2 {
            return Err(ParseError::TooManyArguments {
                expected: 2,
                found: args.len(),
                message: format!("Expected at most 2 arguments, found {}", args.len()),
            });
        }
        let a = get::<Self::A>(&args, 0)?;
        let b = get::<Self::B>(&args, 1)?;
        Ok((Self::from_arguments(a, b),))
    }

    /// Arguments of this command instance, in positional order
    fn arguments(&self) -> Vec<String> {
        Vec::new()
    }

    fn to_command_string(&self) -> String {
        std::iter::once(format!("/{}", Self::NAME))
            .chain(self.arguments())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Usage line with placeholders, e.g. `/addchannel <channel>`
    fn usage() -> String {
        std::iter::once(format!("/{}", Self::NAME))
            .chain(Self::PLACEHOLDERS.iter().map(|p| format!("<{}>", p)))
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn run(
        &self,
        target: &CommandReplyTarget,
        context: Self::Context,
    ) -> impl Future<Output = ResponseResult<()>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct CommandEcho {
        word: Option<String>,
        count: Option<u32>,
    }

    impl CommandTrait for CommandEcho {
        type A = String;
        type B = u32;

        type Context = ();

        const NAME: &'static str = "echo";
        const PLACEHOLDERS: &'static [&'static str] = &["word", "count"];

        fn from_arguments(a: Option<Self::A>, b: Option<Self::B>) -> Self {
            CommandEcho { word: a, count: b }
        }

        fn arguments(&self) -> Vec<String> {
            self.word
                .iter()
                .cloned()
                .chain(self.count.map(|c| c.to_string()))
                .collect()
        }

        async fn run(&self, _target: &CommandReplyTarget, _context: ()) -> ResponseResult<()> {
            Ok(())
        }
    }

    #[derive(Debug, PartialEq)]
    struct CommandPing;

    impl CommandTrait for CommandPing {
        type A = EmptyArg;
        type B = EmptyArg;

        type Context = ();

        const NAME: &'static str = "ping";
        const PLACEHOLDERS: &'static [&'static str] = &[];

        fn from_arguments(_: Option<Self::A>, _: Option<Self::B>) -> Self {
            CommandPing
        }

        async fn run(&self, _target: &CommandReplyTarget, _context: ()) -> ResponseResult<()> {
            Ok(())
        }
    }

    #[test]
    fn test_split_arguments() {
        assert_eq!(split("a  b\tc"), vec!["a", "b", "c"]);
        assert_eq!(split(r"two\ words next"), vec!["two words", "next"]);
        assert_eq!(split(r"back\\slash"), vec![r"back\slash"]);
        // Only the first line is considered
        assert_eq!(split("first\nsecond"), vec!["first"]);
        assert!(split("   ").is_empty());
    }

    #[test]
    fn test_parse_arguments() {
        let (cmd,) = CommandEcho::parse_arguments("hello 3".to_string()).unwrap();
        assert_eq!(
            cmd,
            CommandEcho {
                word: Some("hello".to_string()),
                count: Some(3)
            }
        );
        assert_eq!(cmd.to_command_string(), "/echo hello 3");

        let (cmd,) = CommandEcho::parse_arguments(String::new()).unwrap();
        assert_eq!(cmd, CommandEcho { word: None, count: None });
        assert_eq!(cmd.to_command_string(), "/echo");
    }

    #[test]
    fn test_parse_arguments_errors() {
        // Not a number
        assert!(CommandEcho::parse_arguments("hello three".to_string()).is_err());
        // Too many arguments
        assert!(CommandEcho::parse_arguments("a 1 b".to_string()).is_err());
        // Command without arguments rejects any
        assert!(CommandPing::parse_arguments("extra".to_string()).is_err());
        assert!(CommandPing::parse_arguments(String::new()).is_ok());
    }

    #[test]
    fn test_usage() {
        assert_eq!(CommandEcho::usage(), "/echo <word> <count>");
        assert_eq!(CommandPing::usage(), "/ping");
    }
}
