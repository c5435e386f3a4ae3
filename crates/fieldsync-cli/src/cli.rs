use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "fieldsync")]
#[command(about = "Capture field drafts and photos offline, sync them when online")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Optional path to local database file
    #[arg(long, value_name = "PATH", global = true)]
    pub db_path: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Save, inspect or delete drafts
    #[command(subcommand)]
    Draft(DraftCommands),
    /// Queue, list or delete photos
    #[command(subcommand)]
    Photo(PhotoCommands),
    /// Show entities waiting for sync
    Pending {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the aggregate sync status
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show recent successful remote writes
    Log {
        /// Number of entries to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Run one sync pass now
    Sync {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Keep syncing in the background until interrupted
    Watch,
}

#[derive(Subcommand)]
pub enum DraftCommands {
    /// Create a draft or overwrite an existing one
    #[command(alias = "new")]
    Save {
        /// Remote-domain reference the draft belongs to (e.g. a case id)
        #[arg(long)]
        parent: String,
        /// Existing draft id to overwrite; a new id is generated otherwise
        #[arg(long)]
        id: Option<String>,
        /// Field value as KEY=VALUE (repeatable)
        #[arg(short, long = "field", value_name = "KEY=VALUE")]
        fields: Vec<String>,
        /// Full payload as a JSON object; --field values override its keys
        #[arg(long, value_name = "JSON")]
        payload: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List drafts, most recently edited first
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show one draft and its photos
    Show {
        /// Draft ID
        id: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete a draft and its photos
    Delete {
        /// Draft ID
        id: String,
    },
}

#[derive(Subcommand)]
pub enum PhotoCommands {
    /// Queue an image file against a draft
    Add {
        /// Owning draft ID
        draft_id: String,
        /// Image file to queue
        file: PathBuf,
        /// Business category (e.g. defect, overview)
        #[arg(long)]
        category: Option<String>,
        /// Grouping key (e.g. room or area)
        #[arg(long)]
        group: Option<String>,
        /// Operator caption
        #[arg(long)]
        caption: Option<String>,
        /// Display order within the draft
        #[arg(long, default_value = "0")]
        order: i64,
        /// Override the content type guessed from the file extension
        #[arg(long, value_name = "MIME")]
        content_type: Option<String>,
    },
    /// List photos for a draft in display order
    List {
        /// Owning draft ID
        draft_id: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete a queued photo
    Delete {
        /// Photo ID
        id: String,
    },
}
