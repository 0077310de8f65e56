// src/main.rs — tasktrack entry point

use clap::Parser;

use tasktrack::cli::{Cli, Commands};
use tasktrack::infra::config::Config;
use tasktrack::infra::logger;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    logger::init_logging(logger::level_for_verbosity(cli.verbose));

    if let Err(e) = run(cli).await {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    // Load config (falls back to defaults if no config.toml)
    let config = if let Some(ref path) = cli.config {
        Config::load_from(std::path::Path::new(path))?
    } else {
        Config::load()?
    };

    match cli.command {
        Commands::Serve { port } => tasktrack::cli::serve::run_serve(port, &config).await,
        Commands::Timer { action } => tasktrack::cli::timer::run_timer(action, &config).await,
        Commands::User { action } => tasktrack::cli::records::run_user(action).await,
        Commands::Project { action } => tasktrack::cli::records::run_project(action).await,
        Commands::Task { action } => tasktrack::cli::records::run_task(action).await,
        Commands::Calendar {
            token,
            user,
            output,
        } => {
            tasktrack::cli::calendar::run_calendar(token.as_deref(), user.as_deref(), output.as_deref(), &config)
                .await
        }
        Commands::Export { format, output } => {
            tasktrack::cli::export::run_export(&format, output.as_deref()).await
        }
    }
}
