use clap::{Parser, Subcommand};

mod admin_cli;

use admin_cli::reading_commands::{ReadingAction, handle_reading_command_with_conn};
use admin_cli::role_commands::{RoleAction, handle_role_command_with_conn};
use admin_cli::user_commands::{UserAction, handle_user_command_with_conn};
use admin_cli::utils::establish_connection;

#[derive(Parser)]
#[command(name = "reef-admin")]
#[command(about = "Reef tank dashboard administration tool")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Manage users")]
    User {
        #[command(subcommand)]
        action: UserAction,
    },
    #[command(about = "Manage role assignments")]
    Role {
        #[command(subcommand)]
        action: RoleAction,
    },
    #[command(about = "Inspect and ingest readings")]
    Reading {
        #[command(subcommand)]
        action: ReadingAction,
    },
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let mut conn = establish_connection()?;

    match cli.command {
        Commands::User { action } => handle_user_command_with_conn(&mut conn, action),
        Commands::Role { action } => handle_role_command_with_conn(&mut conn, action),
        Commands::Reading { action } => handle_reading_command_with_conn(&mut conn, action),
    }
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
