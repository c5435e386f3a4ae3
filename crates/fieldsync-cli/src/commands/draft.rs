use std::path::Path;

use fieldsync_core::{Draft, DraftId, DraftInput, Photo};
use serde::Serialize;

use crate::commands::common::{
    build_payload, format_draft_line, format_photo_line, now_millis, open_engine, parse_draft_id,
    require_draft,
};
use crate::error::CliError;

#[derive(Debug, Serialize)]
struct DraftDetail<'a> {
    #[serde(flatten)]
    draft: &'a Draft,
    photos: &'a [Photo],
}

pub async fn run_draft_save(
    parent: &str,
    id: Option<&str>,
    fields: &[String],
    payload: Option<&str>,
    as_json: bool,
    db_path: &Path,
) -> Result<(), CliError> {
    let payload = build_payload(payload, fields)?;
    let id = match id {
        Some(raw) => parse_draft_id(raw)?,
        None => DraftId::new(),
    };

    let engine = open_engine(db_path).await?;
    let draft = engine
        .queue
        .save_draft(&DraftInput::new(id, parent, payload)?)
        .await?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&draft)?);
    } else {
        println!("Saved draft {}", draft.id);
    }
    Ok(())
}

pub async fn run_draft_list(as_json: bool, db_path: &Path) -> Result<(), CliError> {
    let engine = open_engine(db_path).await?;
    let drafts = engine.queue.list_drafts().await?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&drafts)?);
        return Ok(());
    }

    if drafts.is_empty() {
        println!("No drafts yet. Create one with: fieldsync draft save --parent <ID>");
        return Ok(());
    }

    let now = now_millis();
    for draft in &drafts {
        println!("{}", format_draft_line(draft, now));
    }
    Ok(())
}

pub async fn run_draft_show(id: &str, as_json: bool, db_path: &Path) -> Result<(), CliError> {
    let engine = open_engine(db_path).await?;
    let draft = require_draft(&engine.queue, id).await?;
    let photos = engine.queue.list_photos(&draft.id).await?;

    if as_json {
        let detail = DraftDetail {
            draft: &draft,
            photos: &photos,
        };
        println!("{}", serde_json::to_string_pretty(&detail)?);
        return Ok(());
    }

    println!("{}", format_draft_line(&draft, now_millis()));
    println!("{}", serde_json::to_string_pretty(&draft.payload)?);
    if photos.is_empty() {
        println!("No photos.");
    }
    for photo in &photos {
        println!("  {}", format_photo_line(photo));
    }
    Ok(())
}

pub async fn run_draft_delete(id: &str, db_path: &Path) -> Result<(), CliError> {
    let engine = open_engine(db_path).await?;
    let draft = require_draft(&engine.queue, id).await?;
    engine.queue.delete_draft(&draft.id).await?;
    println!("Deleted draft {}", draft.id);
    Ok(())
}
