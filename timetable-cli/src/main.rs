//! Timetable Admin CLI
//!
//! Command-line front end for the timetable admin backend.

mod cli;
mod commands;

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use timetable_core::{
    ApiClient, Database, RegisterRequest, ResourceService, ServiceError, Settings, SqliteStore,
};

use crate::cli::{Cli, Command};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    tracing::debug!("Starting timetable v{}", timetable_core::VERSION);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::debug!(error = ?e, "Command failed");
            eprintln!("Error: {e}");
            if e.downcast_ref::<ServiceError>().is_some_and(ServiceError::requires_login) {
                eprintln!("Your session has expired. Run `timetable login` to sign in again.");
            }
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: bool) {
    let directive = if verbose { "timetable=debug" } else { "timetable=warn" };
    let mut filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(tracing::Level::WARN.into());
    if let Ok(directive) = directive.parse() {
        filter = filter.add_directive(directive);
    }

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn open_database(cli: &Cli) -> Result<Database> {
    let db = match &cli.database {
        Some(path) => Database::open_at(path.clone()),
        None => Database::open(),
    }
    .context("Failed to open database")?;
    db.migrate().context("Failed to migrate database")?;
    Ok(db)
}

async fn run(cli: Cli) -> Result<()> {
    let db = open_database(&cli)?;

    if let Command::Config { action } = cli.command {
        return commands::config(&db, action);
    }

    let mut settings = Settings::load(&db);
    if let Some(base_url) = cli.base_url {
        settings.base_url = base_url;
        settings.validate();
    }
    tracing::debug!(base_url = %settings.base_url, database = %db.path().display(), "Client configured");

    let store = Arc::new(SqliteStore::new(db));
    let client = ApiClient::connect(settings, store).context("Failed to build HTTP client")?;

    match cli.command {
        Command::Login { user, password } => commands::login(&client, user, password).await,
        Command::Register {
            username,
            email,
            password,
            registration_number,
            role,
        } => {
            let request = RegisterRequest {
                username,
                email,
                password,
                registration_number,
                role: role.into(),
            };
            commands::register(&client, request).await
        }
        Command::Logout => commands::logout(&client),
        Command::Whoami => commands::whoami(&client),
        Command::Profile => commands::profile(&client).await,
        Command::Courses { action } => commands::resource(ResourceService::courses(&client), action).await,
        Command::Instructors { action } => {
            commands::resource(ResourceService::instructors(&client), action).await
        }
        Command::Rooms { action } => commands::resource(ResourceService::rooms(&client), action).await,
        Command::Timetable { action } => commands::timetable(&client, action).await,
        Command::Config { .. } => Ok(()),
    }
}
