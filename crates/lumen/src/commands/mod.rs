//! Command dispatch: bridges CLI args -> core platform -> output formatting.

pub mod accessories;
pub mod config_cmd;
pub mod reconcile;
pub mod run;
pub mod scan;
pub mod util;

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// Dispatch a command to its handler. Completions are handled in `main`.
pub async fn dispatch(cmd: Command, global: &GlobalOpts) -> Result<(), CliError> {
    match cmd {
        Command::Scan(args) => scan::handle(args, global).await,
        Command::Reconcile(args) => reconcile::handle(args, global).await,
        Command::Run(args) => run::handle(args, global).await,
        Command::Accessories(args) => accessories::handle(args, global),
        Command::Config(args) => config_cmd::handle(args, global),
        Command::Completions(_) => Err(CliError::Internal(
            "completions are generated before dispatch".into(),
        )),
    }
}
