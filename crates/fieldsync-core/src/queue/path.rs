//! Remote storage paths for photo blobs.

use crate::models::{Photo, RemoteId};
use crate::util::sanitize_token;

/// Build `records/{remote_id}/{group}/{timestamp}-{photo_id}.{ext}`.
///
/// The record and photo ids are percent-encoded, not sanitised, so distinct
/// ids never share a path. The timestamp keeps a retried upload from landing
/// on a path that an earlier attempt may have left behind. The group segment
/// is only for browsing and may fold distinct keys together.
pub fn storage_path(remote_id: &RemoteId, photo: &Photo, timestamp_ms: i64) -> String {
    let record = id_segment(remote_id.as_str());
    let group = photo
        .group_key
        .as_deref()
        .map_or_else(|| "ungrouped".to_string(), group_segment);
    let photo_id = id_segment(photo.id.as_str());
    let ext = extension_for(&photo.content_type);

    format!("records/{record}/{group}/{timestamp_ms}-{photo_id}.{ext}")
}

fn id_segment(raw: &str) -> String {
    let encoded = urlencoding::encode(raw);
    // `.` is left alone by the encoder; keep dot-only ids from reading as
    // relative path segments.
    if encoded.chars().all(|ch| ch == '.') {
        encoded.replace('.', "%2E")
    } else {
        encoded.into_owned()
    }
}

fn group_segment(raw: &str) -> String {
    let token = sanitize_token(raw);
    if token.is_empty() {
        "ungrouped".to_string()
    } else {
        token
    }
}

fn extension_for(content_type: &str) -> &'static str {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    match essence.as_str() {
        "image/jpeg" | "image/jpg" => "jpg",
        "image/png" => "png",
        "image/webp" => "webp",
        "image/heic" | "image/heif" => "heic",
        _ => "bin",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SyncState;

    fn photo(group_key: Option<&str>, content_type: &str) -> Photo {
        Photo {
            id: "P-1".parse().unwrap(),
            draft_id: "d1".parse().unwrap(),
            blob: vec![0; 4],
            content_type: content_type.to_string(),
            state: SyncState::Pending,
            category: "general".to_string(),
            group_key: group_key.map(ToString::to_string),
            caption: None,
            order_index: 0,
            created_at: 0,
            synced_at: None,
            remote_photo_id: None,
            remote_path: None,
        }
    }

    #[test]
    fn path_contains_record_group_and_photo() {
        let remote_id: RemoteId = "r1".parse().unwrap();
        let path = storage_path(&remote_id, &photo(Some("Bath Room/2"), "image/jpeg"), 1700);
        assert_eq!(path, "records/r1/bath-room-2/1700-P-1.jpg");
    }

    #[test]
    fn missing_group_uses_placeholder() {
        let remote_id: RemoteId = "r1".parse().unwrap();
        let path = storage_path(&remote_id, &photo(None, "image/png"), 5);
        assert_eq!(path, "records/r1/ungrouped/5-P-1.png");

        let path = storage_path(&remote_id, &photo(Some("///"), "image/png"), 5);
        assert_eq!(path, "records/r1/ungrouped/5-P-1.png");
    }

    #[test]
    fn ids_differing_only_in_case_or_separators_get_distinct_paths() {
        let remote_id: RemoteId = "r1".parse().unwrap();
        let mut first = photo(Some("Hall"), "image/jpeg");
        first.id = "Photo-1".parse().unwrap();
        let mut second = first.clone();
        second.id = "photo_1".parse().unwrap();

        let first_path = storage_path(&remote_id, &first, 42);
        let second_path = storage_path(&remote_id, &second, 42);
        assert_ne!(first_path, second_path);
        assert_eq!(first_path, "records/r1/hall/42-Photo-1.jpg");
        assert_eq!(second_path, "records/r1/hall/42-photo_1.jpg");
    }

    #[test]
    fn record_ids_cannot_escape_their_segment() {
        let mut p = photo(None, "image/jpeg");
        p.id = "a/b".parse().unwrap();

        let slash: RemoteId = "x/y".parse().unwrap();
        assert_eq!(
            storage_path(&slash, &p, 1),
            "records/x%2Fy/ungrouped/1-a%2Fb.jpg"
        );

        let dots: RemoteId = "..".parse().unwrap();
        assert_eq!(
            storage_path(&dots, &p, 1),
            "records/%2E%2E/ungrouped/1-a%2Fb.jpg"
        );

        let folded: RemoteId = "X_Y".parse().unwrap();
        assert_ne!(storage_path(&slash, &p, 1), storage_path(&folded, &p, 1));
    }

    #[test]
    fn extension_follows_content_type() {
        assert_eq!(extension_for("image/webp"), "webp");
        assert_eq!(extension_for("IMAGE/HEIC"), "heic");
        assert_eq!(extension_for("image/jpeg; q=0.8"), "jpg");
        assert_eq!(extension_for("application/pdf"), "bin");
    }
}
