//! MediaCommandDispatcher: play/pause, next and previous for the island.
//!
//! Platform differences live in `CommandExecutor` script builders; every
//! script runs through one `CommandRunner` (a persistent shell session in
//! production). The dispatcher itself never branches on platform.

mod dispatcher;
mod executor;
mod powershell;
mod session;
mod xdotool;

pub use self::dispatcher::MediaCommandDispatcher;
pub use self::executor::create_command_executor;
pub use self::session::{CommandRunner, CommandSession, DryRunRunner};
