//! Castkit - command plumbing shared by the photocast bot

// Private API modules
pub(crate) mod api;

// Public command_trait module with re-exports
pub mod command_trait {
    // Re-export types and traits from internal API
    pub use crate::api::command_trait::{CommandTrait, EmptyArg, ParseCommandArg};
}

// Public reply module with re-exports
pub mod reply {
    pub use crate::api::reply::CommandReplyTarget;
}
