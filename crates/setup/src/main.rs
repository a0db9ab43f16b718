//! Entrypoint for the setup-depot action.

#![allow(clippy::print_stderr)]

use setup_depot::cli::{Cli, EXIT_FAILURE};
use setup_depot::tracing::init_tracing;
use setup_depot_github::{ActionsContext, ActionsRunner};

#[tokio::main]
async fn main() {
    std::panic::set_hook(Box::new(|panic_info| {
        eprintln!("Application panicked: {panic_info}");
        eprintln!("Internal error occurred. Run with RUST_LOG=debug for more information.");
    }));

    let runner = ActionsRunner::from_env();
    let cli = match Cli::parse_or_report(std::env::args_os(), &runner) {
        Ok(cli) => cli,
        Err(code) => std::process::exit(code),
    };
    if let Err(error) = init_tracing(cli.tracing_config()) {
        eprintln!("{error:?}");
        std::process::exit(EXIT_FAILURE);
    }

    let config = cli.setup_config();
    let context = ActionsContext::from_env();

    let code = setup_depot::execute(&config, &runner, &context).await;
    std::process::exit(code);
}
