//! Stockbot CLI - schema and user management tools.
//!
//! # Usage
//!
//! ```bash
//! # Create missing tables and seed roles
//! stockbot-cli schema ensure
//!
//! # Show and apply additive migrations
//! stockbot-cli schema pending
//! stockbot-cli schema apply 0002_users_credentials_encrypted
//!
//! # Register a chat user
//! stockbot-cli user create --telegram-id 123456789 --role admin
//!
//! # Generate ENCRYPTION_KEY and ADMIN_SESSION_SECRET
//! stockbot-cli keygen
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "stockbot-cli")]
#[command(author, version, about = "Stockbot CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create and inspect the database schema
    Schema {
        #[command(subcommand)]
        action: SchemaAction,
    },
    /// Manage chat users
    User {
        #[command(subcommand)]
        action: UserAction,
    },
    /// Print a fresh encryption key and session secret
    Keygen,
}

#[derive(Subcommand)]
enum SchemaAction {
    /// Create missing tables and indexes, then seed roles
    Ensure,
    /// List additive migrations not yet applied
    Pending,
    /// Apply one additive migration by id
    Apply {
        /// Migration id, as printed by `schema pending`
        id: String,
    },
}

#[derive(Subcommand)]
enum UserAction {
    /// Register a Telegram user
    Create {
        /// Telegram user id
        #[arg(short, long)]
        telegram_id: i64,

        /// Role (`admin`, `user`)
        #[arg(short, long, default_value = "user")]
        role: String,

        /// Display name
        #[arg(short, long)]
        name: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), commands::CliError> {
    match cli.command {
        Commands::Schema { action } => match action {
            SchemaAction::Ensure => commands::schema::ensure().await?,
            SchemaAction::Pending => commands::schema::pending().await?,
            SchemaAction::Apply { id } => commands::schema::apply(&id).await?,
        },
        Commands::User { action } => match action {
            UserAction::Create {
                telegram_id,
                role,
                name,
            } => {
                commands::user::create_user(telegram_id, &role, name.as_deref()).await?;
            }
        },
        Commands::Keygen => commands::keygen::print_env(),
    }
    Ok(())
}
