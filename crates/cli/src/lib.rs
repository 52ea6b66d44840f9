pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "storefront",
    about = "Storefront operator CLI",
    long_about = "Apply migrations, load the sample catalog, inspect configuration, and preview product recommendations.",
    after_help = "Examples:\n  storefront migrate\n  storefront seed\n  storefront recommend --product smart-watch --limit 3\n  storefront doctor --json"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(about = "Load the sample catalog (idempotent) and verify it")]
    Seed,
    #[command(about = "Inspect effective configuration values with source attribution")]
    Config,
    #[command(about = "Validate config, database connectivity, and schema readiness")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Rank recommendations for a product and show which stage produced each")]
    Recommend {
        #[arg(long, help = "Slug of the product being viewed")]
        product: String,
        #[arg(long, help = "Viewer user id; omit for an anonymous viewer")]
        user: Option<i64>,
        #[arg(long, help = "Maximum number of recommendations (defaults to config)")]
        limit: Option<usize>,
        #[arg(long, help = "Seed for the random fallback stage, for reproducible output")]
        seed: Option<u64>,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(),
        Command::Seed => commands::seed::run(),
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json } => commands::doctor::run(json),
        Command::Recommend { product, user, limit, seed } => {
            commands::recommend::run(commands::recommend::RecommendArgs {
                product_slug: product,
                user_id: user,
                limit,
                seed,
            })
        }
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
