pub mod command_trait;
pub mod reply;
