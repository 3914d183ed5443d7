use clap::Parser;
use rotscan::{
    Cli,
    commands::{handle_list_builtins, handle_scan},
    init_logging,
    runtime::{ShutdownCheck, ShutdownFlag},
};
use std::io::{self, IsTerminal};
use std::process::ExitCode;
use std::sync::Arc;

fn main() -> ExitCode {
    let cli = Cli::parse();

    if cli.no_color || !io::stdout().is_terminal() {
        colored::control::set_override(false);
    }

    if let Err(e) = init_logging(cli.verbosity()) {
        eprintln!("Warning: {e}");
    }

    if cli.list_builtins {
        return handle_list_builtins().into();
    }

    let shutdown: Arc<dyn ShutdownCheck> = Arc::new(ShutdownFlag::new());
    handle_scan(&cli, shutdown).into()
}
