//! Huddle CLI
//!
//! Command-line client for the Huddle group chat.
//!
//! # Commands
//!
//! - `register` - Create an account and sign in
//! - `login` - Sign in to an existing account
//! - `logout` - Forget the stored credential
//! - `whoami` - Show the signed-in member
//! - `send` - Post a message to the feed
//! - `watch` - Follow the feed until interrupted

mod commands;

use clap::{Parser, Subcommand};
use commands::Connection;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Huddle group chat client.
#[derive(Parser)]
#[command(name = "huddle")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Server base URL
    #[arg(
        global = true,
        short,
        long,
        env = "HUDDLE_SERVER",
        default_value = "http://127.0.0.1:8000"
    )]
    server: String,

    /// Path to the credential file
    #[arg(global = true, short, long, env = "HUDDLE_CREDENTIALS")]
    credentials: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create an account and sign in
    Register {
        /// Login name
        username: String,

        /// Password (at least 4 characters)
        #[arg(short, long, env = "HUDDLE_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Sign in to an existing account
    Login {
        /// Login name
        username: String,

        /// Password
        #[arg(short, long, env = "HUDDLE_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Forget the stored credential
    Logout,

    /// Show the signed-in member
    Whoami {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Post a message to the feed
    Send {
        /// Message text
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,
    },

    /// Follow the feed, printing new messages as they arrive
    Watch {
        /// Seconds between polls
        #[arg(short, long, default_value = "5")]
        interval: u64,
    },

    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let connection = Connection::new(cli.server, cli.credentials);

    match cli.command {
        Commands::Register { username, password } => {
            commands::auth::register(&connection, &username, &password).await?;
        }
        Commands::Login { username, password } => {
            commands::auth::login(&connection, &username, &password).await?;
        }
        Commands::Logout => {
            commands::auth::logout(&connection)?;
        }
        Commands::Whoami { format } => {
            commands::auth::whoami(&connection, &format).await?;
        }
        Commands::Send { text } => {
            commands::send::run(&connection, &text.join(" ")).await?;
        }
        Commands::Watch { interval } => {
            commands::watch::run(&connection, interval).await?;
        }
        Commands::Version => {
            println!("Huddle CLI v{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
