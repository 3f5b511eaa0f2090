use clap::Parser;
use tracing_subscriber::EnvFilter;

use bq_utils::commands::{self, CreateViewOptions, RunOptions};
use bq_utils::{Cli, Commands, Result, Settings};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<i32> {
    let settings = Settings::load_from(&cli.config)?;

    match cli.command {
        Commands::Safe {
            query_file,
            max_bytes,
        } => commands::run_safe_query(&settings, &query_file, max_bytes),
        Commands::Run {
            query_file,
            limit,
            output,
            preview,
            dry_run,
            no_analysis,
            confirm,
        } => commands::run_query(
            &settings,
            &RunOptions {
                query_file,
                limit,
                output,
                preview,
                dry_run,
                analysis: !no_analysis,
                confirm,
            },
        ),
        Commands::CreateView {
            name,
            query_file,
            dataset,
            project,
            description,
            replace,
            dry_run,
        } => commands::run_create_view(
            &settings,
            &CreateViewOptions {
                name,
                query_file,
                dataset,
                project,
                description,
                replace,
                dry_run,
            },
        ),
        Commands::Doctor => commands::run_doctor(&settings),
    }
}

fn main() {
    init_tracing();
    let cli = Cli::parse();

    match run(cli) {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}
