//! Operator command-line tool for the portfolio backend.
//!
//! Commands:
//! - health: Check that the public endpoints respond
//! - webhook-test: Exercise the webhook and contact endpoints end to end
//! - emails / contacts: List or search stored records (admin)
//! - stats: Record counts (admin)
//! - export: Download every record as JSON (admin)
//!
//! Configuration via environment:
//! - PORTFOLIO_URL: Base URL of the server (default: http://localhost:8000)
//! - ADMIN_API_KEY: Bearer token for the admin commands

mod commands;

use clap::{Parser, Subcommand};

use commands::{
    export::ExportArgs, health::HealthArgs, records::ListArgs, webhook_test::WebhookTestArgs,
};

/// Portfolio backend CLI
///
/// Prints JSON by default; pass --human for formatted output.
#[derive(Parser)]
#[command(name = "portfolio")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Output human-readable formatted text instead of JSON
    #[arg(long, global = true)]
    human: bool,

    /// Portfolio server URL
    #[arg(
        long,
        env = "PORTFOLIO_URL",
        default_value = "http://localhost:8000",
        global = true
    )]
    url: String,

    /// Admin API key, sent as a Bearer token
    #[arg(long, env = "ADMIN_API_KEY", global = true, hide_env_values = true)]
    token: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check that the public endpoints respond
    Health(HealthArgs),

    /// Ping the webhook, post a sample email and contact, read status
    WebhookTest(WebhookTestArgs),

    /// List or search stored emails
    Emails(ListArgs),

    /// List or search stored contact messages
    Contacts(ListArgs),

    /// Show record counts
    Stats,

    /// Download every record as JSON
    Export(ExportArgs),
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let base_url = cli.url.trim_end_matches('/').to_string();

    let client = match commands::build_client(cli.token.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };
    let admin = cli.token.is_some();

    let result = match cli.command {
        Commands::Health(args) => {
            commands::health::execute(&client, &base_url, cli.human, args).await
        }
        Commands::WebhookTest(args) => {
            commands::webhook_test::execute(&client, &base_url, cli.human, args).await
        }
        Commands::Emails(args) => {
            commands::records::emails(&client, &base_url, cli.human, admin, args).await
        }
        Commands::Contacts(args) => {
            commands::records::contacts(&client, &base_url, cli.human, admin, args).await
        }
        Commands::Stats => commands::stats::execute(&client, &base_url, cli.human, admin).await,
        Commands::Export(args) => {
            commands::export::execute(&client, &base_url, cli.human, admin, args).await
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
