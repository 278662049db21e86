use std::io::IsTerminal;

use clap::{Parser, Subcommand};
use sagepipe::cli::output::{print_error, OutputMode};

#[derive(Parser)]
#[command(name = "sagepipe", version, about = "Sync Sage Accounting data into a warehouse with self-refreshing OAuth tokens")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the one-time browser consent and store the first Sage token
    Auth {
        /// How long to wait for the OAuth callback, in milliseconds
        #[arg(long, env = "SAGEPIPE_OAUTH_TIMEOUT_MS")]
        timeout_ms: Option<u64>,
    },

    /// Show the latest stored token (secrets redacted)
    Status {
        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Print a valid access token, refreshing it if needed
    Token {
        /// Print the full token instead of a masked one
        #[arg(long)]
        show: bool,
    },

    /// GET a Sage API resource and print the JSON response
    Fetch {
        /// Resource path relative to the API base, e.g. "contacts"
        resource: String,
    },

    /// Fetch contacts and load them into the warehouse
    Run {
        /// Destination table as project.dataset.table
        #[arg(long)]
        table: Option<String>,

        /// Fetch and transform but do not write
        #[arg(long)]
        dry_run: bool,

        /// Output the summary in JSON format
        #[arg(long)]
        json: bool,
    },
}

impl Commands {
    fn output_mode(&self) -> OutputMode {
        match self {
            Commands::Status { json } | Commands::Run { json, .. } => OutputMode::from_flag(*json),
            _ => OutputMode::Pretty,
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    // before the subscriber and clap, which both read the environment
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("SAGEPIPE_LOG_LEVEL")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mode = cli.command.output_mode();

    if let Err(e) = run(cli).await {
        print_error(&e, mode, std::io::stderr().is_terminal());
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), sagepipe::SagepipeError> {
    let runtime = sagepipe::Runtime::from_env()?;
    match cli.command {
        Commands::Auth { timeout_ms } => sagepipe::cli::auth::run_auth(&runtime, timeout_ms).await,
        Commands::Status { json } => {
            sagepipe::cli::status::run_status(&runtime, OutputMode::from_flag(json)).await
        }
        Commands::Token { show } => sagepipe::cli::token::run_token(&runtime, show).await,
        Commands::Fetch { resource } => sagepipe::cli::fetch::run_fetch(&runtime, &resource).await,
        Commands::Run {
            table,
            dry_run,
            json,
        } => {
            sagepipe::cli::run::run_pipeline(
                &runtime,
                table.as_deref(),
                dry_run,
                OutputMode::from_flag(json),
            )
            .await
        }
    }
}
