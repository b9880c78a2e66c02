//! Agent module: the event loop that feeds channel events to the dialogue.

mod agent_loop;

pub use agent_loop::Agent;
