// ABOUTME: Command module aggregator for the bluegreen CLI.
// ABOUTME: Re-exports deploy and status command handlers.

mod connection;
mod deploy;
mod status;

pub use deploy::deploy;
pub use status::status;
