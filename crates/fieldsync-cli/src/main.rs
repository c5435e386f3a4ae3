//! fieldsync CLI - capture field drafts and photos from the terminal
//!
//! Everything is written to the local queue first; `fieldsync sync` and
//! `fieldsync watch` push it to the remote backend.

mod cli;
mod commands;
mod error;
#[cfg(test)]
mod tests;

use clap::Parser;

use crate::cli::{Cli, Commands, DraftCommands, PhotoCommands};
use crate::commands::common::resolve_db_path;
use crate::commands::draft::{run_draft_delete, run_draft_list, run_draft_save, run_draft_show};
use crate::commands::photo::{run_photo_add, run_photo_delete, run_photo_list, PhotoOptions};
use crate::commands::status::{run_log, run_pending, run_status};
use crate::commands::sync::{run_sync, run_watch};
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    let filter = tracing_subscriber::EnvFilter::from_default_env();
    let filter = match "fieldsync=info".parse() {
        Ok(directive) => filter.add_directive(directive),
        Err(_) => filter,
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let db_path = resolve_db_path(cli.db_path);

    match cli.command {
        Commands::Draft(command) => match command {
            DraftCommands::Save {
                parent,
                id,
                fields,
                payload,
                json,
            } => {
                run_draft_save(
                    &parent,
                    id.as_deref(),
                    &fields,
                    payload.as_deref(),
                    json,
                    &db_path,
                )
                .await
            }
            DraftCommands::List { json } => run_draft_list(json, &db_path).await,
            DraftCommands::Show { id, json } => run_draft_show(&id, json, &db_path).await,
            DraftCommands::Delete { id } => run_draft_delete(&id, &db_path).await,
        },
        Commands::Photo(command) => match command {
            PhotoCommands::Add {
                draft_id,
                file,
                category,
                group,
                caption,
                order,
                content_type,
            } => {
                run_photo_add(
                    &draft_id,
                    &file,
                    PhotoOptions {
                        category,
                        group,
                        caption,
                        order,
                        content_type,
                    },
                    &db_path,
                )
                .await
            }
            PhotoCommands::List { draft_id, json } => {
                run_photo_list(&draft_id, json, &db_path).await
            }
            PhotoCommands::Delete { id } => run_photo_delete(&id, &db_path).await,
        },
        Commands::Pending { json } => run_pending(json, &db_path).await,
        Commands::Status { json } => run_status(json, &db_path).await,
        Commands::Log { limit, json } => run_log(limit, json, &db_path).await,
        Commands::Sync { json } => run_sync(json, &db_path).await,
        Commands::Watch => run_watch(&db_path).await,
    }
}
