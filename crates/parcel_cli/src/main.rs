//! Console entry point for the parcel tracker.
//!
//! # Responsibility
//! - Own the database connection for the lifetime of one command.
//! - Map subcommands onto `ParcelService` operations and print JSON results.

use clap::{Parser, Subcommand};
use log::error;
use parcel_core::{
    default_log_level, init_logging, open_db, ClientId, ParcelNumber, ParcelService,
    SqliteParcelRepository,
};
use serde_json::json;
use std::error::Error;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(name = "parcel-tracker", version, about = "Track parcels in a SQLite store")]
struct Cli {
    /// SQLite database file; created and migrated when missing.
    #[arg(long, global = true, default_value = "tracker.db")]
    db: PathBuf,

    /// Absolute directory for rolling log files. Logging is off when unset.
    #[arg(long, global = true)]
    log_dir: Option<String>,

    /// Log level for `--log-dir`; defaults to `debug` in debug builds, `info` otherwise.
    #[arg(long, global = true, requires = "log_dir")]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Register a new parcel for a client.
    Register {
        #[arg(long)]
        client: ClientId,
        #[arg(long)]
        address: String,
    },
    /// Show one parcel.
    Get { number: ParcelNumber },
    /// List all parcels of a client.
    List {
        #[arg(long)]
        client: ClientId,
    },
    /// Change the address of a registered parcel.
    SetAddress {
        number: ParcelNumber,
        address: String,
    },
    /// Advance a parcel to its next status.
    NextStatus { number: ParcelNumber },
    /// Delete a registered parcel.
    Delete { number: ParcelNumber },
    /// Register a sample parcel for client 1 and print it.
    Demo,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Some(log_dir) = cli.log_dir.as_deref() {
        let level = cli.log_level.as_deref().unwrap_or(default_log_level());
        if let Err(err) = init_logging(level, log_dir) {
            eprintln!("error: {err}");
            return ExitCode::FAILURE;
        }
    }

    report(run(&cli))
}

/// Prints a command result: JSON on stdout, or the error on stderr with a
/// failing exit code.
fn report(result: Result<serde_json::Value, Box<dyn Error>>) -> ExitCode {
    match result {
        Ok(output) => {
            println!("{output:#}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!("event=cli_command module=cli status=error error={err}");
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<serde_json::Value, Box<dyn Error>> {
    // The connection lives for this scope only and is closed on every return path.
    let conn = open_db(&cli.db)?;
    let service = ParcelService::new(SqliteParcelRepository::try_new(&conn)?);

    let output = match &cli.command {
        Command::Register { client, address } => {
            serde_json::to_value(service.register(*client, address.as_str())?)?
        }
        Command::Get { number } => serde_json::to_value(service.get(*number)?)?,
        Command::List { client } => serde_json::to_value(service.list_by_client(*client)?)?,
        Command::SetAddress { number, address } => {
            service.change_address(*number, address)?;
            serde_json::to_value(service.get(*number)?)?
        }
        Command::NextStatus { number } => {
            let status = service.next_status(*number)?;
            json!({ "number": number, "status": status })
        }
        Command::Delete { number } => {
            service.delete(*number)?;
            json!({ "number": number, "deleted": true })
        }
        Command::Demo => serde_json::to_value(service.register(1, "123 Test Street")?)?,
    };

    Ok(output)
}
