use std::path::Path;

use fieldsync_core::{NewPhoto, PhotoId};

use crate::commands::common::{format_photo_line, open_engine, require_draft};
use crate::error::CliError;

/// Optional attributes for `photo add`.
#[derive(Debug, Default)]
pub struct PhotoOptions {
    pub category: Option<String>,
    pub group: Option<String>,
    pub caption: Option<String>,
    pub order: i64,
    pub content_type: Option<String>,
}

pub fn resolve_content_type(file: &Path, explicit: Option<&str>) -> String {
    explicit.map_or_else(
        || {
            mime_guess::from_path(file)
                .first_or_octet_stream()
                .essence_str()
                .to_string()
        },
        str::to_string,
    )
}

pub async fn run_photo_add(
    draft_id: &str,
    file: &Path,
    options: PhotoOptions,
    db_path: &Path,
) -> Result<(), CliError> {
    let blob = tokio::fs::read(file)
        .await
        .map_err(|source| CliError::PhotoFile {
            path: file.display().to_string(),
            source,
        })?;
    let content_type = resolve_content_type(file, options.content_type.as_deref());

    let engine = open_engine(db_path).await?;
    let draft = require_draft(&engine.queue, draft_id).await?;

    let mut photo = NewPhoto::new(draft.id, blob, content_type)?.with_order_index(options.order);
    if let Some(category) = options.category {
        photo = photo.with_category(category);
    }
    if let Some(group) = options.group {
        photo = photo.with_group_key(group);
    }
    if let Some(caption) = options.caption {
        photo = photo.with_caption(caption);
    }

    let photo = engine.queue.queue_photo(&photo).await?;
    println!(
        "Queued photo {} ({}, {} bytes)",
        photo.id,
        photo.content_type,
        photo.size_bytes()
    );
    Ok(())
}

pub async fn run_photo_list(draft_id: &str, as_json: bool, db_path: &Path) -> Result<(), CliError> {
    let engine = open_engine(db_path).await?;
    let draft = require_draft(&engine.queue, draft_id).await?;
    let photos = engine.queue.list_photos(&draft.id).await?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&photos)?);
        return Ok(());
    }

    if photos.is_empty() {
        println!("No photos for draft {}.", draft.id);
        return Ok(());
    }

    for photo in &photos {
        println!("{}", format_photo_line(photo));
    }
    Ok(())
}

pub async fn run_photo_delete(id: &str, db_path: &Path) -> Result<(), CliError> {
    let photo_id: PhotoId = id.parse()?;
    let engine = open_engine(db_path).await?;
    engine.queue.delete_photo(&photo_id).await?;
    println!("Deleted photo {photo_id}");
    Ok(())
}
