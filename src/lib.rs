pub mod backend;
pub mod config;
pub mod contract;
pub mod conversation;
pub mod errors;
pub mod logging;
pub mod phase;
pub mod prompts;
pub mod server;
pub mod store;
pub mod verify;

pub use triage_common as common;
