//! Command-line interface components
//!
//! Argument parsing, command handlers and progress display for the
//! `astrovision_sync` binary.

pub mod args;
pub mod commands;
pub mod progress;

pub use args::{
    AuthAction, AuthArgs, Cli, Commands, FetchArgs, GlobalArgs, HashArgs, ListArgs, PublishArgs,
};
pub use commands::{handle_auth, handle_fetch, handle_hash, handle_list, handle_publish};
pub use progress::{ProgressConfig, ProgressDisplay};
