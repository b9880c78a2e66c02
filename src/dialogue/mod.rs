//! Dialogue: routes each session's messages through profile collection,
//! profile commands and question answering.

pub mod command;
pub mod controller;

pub use command::Command;
pub use controller::DialogueController;
