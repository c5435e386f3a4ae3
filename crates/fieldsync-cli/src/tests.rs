use std::path::Path;

use fieldsync_core::models::{EntityType, SyncAction, SyncLogEntry};
use fieldsync_core::{
    AggregateStatus, BatchNote, DraftId, DraftInput, NetworkState, NewPhoto, PendingCounts,
    SyncFailure, SyncSummary,
};
use serde_json::json;

use crate::commands::common::{
    build_payload, format_log_line, format_relative_time, format_timestamp, open_engine,
    parse_field,
};
use crate::commands::photo::resolve_content_type;
use crate::commands::status::{format_status_lines, StatusReport};
use crate::commands::sync::format_summary_lines;
use crate::error::CliError;

#[test]
fn parse_field_keeps_json_types() {
    assert_eq!(parse_field("rooms=3").unwrap(), ("rooms".to_string(), json!(3)));
    assert_eq!(
        parse_field("ok=true").unwrap(),
        ("ok".to_string(), json!(true))
    );
    assert_eq!(
        parse_field("notes=cracked tile").unwrap(),
        ("notes".to_string(), json!("cracked tile"))
    );
    assert_eq!(
        parse_field("code=007").unwrap(),
        ("code".to_string(), json!("007"))
    );
    assert_eq!(
        parse_field("eq=a=b").unwrap(),
        ("eq".to_string(), json!("a=b"))
    );
}

#[test]
fn parse_field_rejects_missing_key_or_separator() {
    assert!(matches!(
        parse_field("novalue"),
        Err(CliError::InvalidField(_))
    ));
    assert!(matches!(parse_field(" =x"), Err(CliError::InvalidField(_))));
}

#[test]
fn build_payload_fields_override_base_object() {
    let payload = build_payload(
        Some(r#"{"area": "kitchen", "rooms": 2}"#),
        &["rooms=4".to_string()],
    )
    .unwrap();
    assert_eq!(payload.get("area"), Some(&json!("kitchen")));
    assert_eq!(payload.get("rooms"), Some(&json!(4)));
}

#[test]
fn build_payload_rejects_non_object_json() {
    assert!(matches!(
        build_payload(Some("[1, 2]"), &[]),
        Err(CliError::PayloadNotObject)
    ));
    assert!(matches!(
        build_payload(Some("{"), &[]),
        Err(CliError::Serialization(_))
    ));
}

#[test]
fn format_relative_time_units() {
    let now = 10_000_000_000;
    assert_eq!(format_relative_time(now - 30_000, now), "just now");
    assert_eq!(format_relative_time(now - 120_000, now), "2m ago");
    assert_eq!(format_relative_time(now - 2 * 60 * 60_000, now), "2h ago");
    assert_eq!(format_relative_time(now - 3 * 24 * 60 * 60_000, now), "3d ago");
    assert_eq!(
        format_relative_time(now - 14 * 24 * 60 * 60_000, now),
        "2w ago"
    );
}

#[test]
fn format_timestamp_returns_utc_label() {
    assert_eq!(format_timestamp(0), "1970-01-01 00:00:00 UTC");
}

#[test]
fn format_log_line_includes_key_fields() {
    let entry = SyncLogEntry::new(
        EntityType::Photo,
        "p1",
        SyncAction::Create,
        "m7".parse().unwrap(),
        0,
    );
    let line = format_log_line(&entry);
    assert!(line.starts_with("1970-01-01 00:00:00 UTC"));
    assert!(line.contains("photo create"));
    assert!(line.contains("p1"));
    assert!(line.contains("remote=m7"));
}

#[test]
fn resolve_content_type_prefers_explicit_value() {
    assert_eq!(
        resolve_content_type(Path::new("site.JPG"), None),
        "image/jpeg"
    );
    assert_eq!(resolve_content_type(Path::new("plan.png"), None), "image/png");
    assert_eq!(
        resolve_content_type(Path::new("blob"), None),
        "application/octet-stream"
    );
    assert_eq!(
        resolve_content_type(Path::new("site.jpg"), Some("image/heic")),
        "image/heic"
    );
}

#[test]
fn format_summary_lines_reports_batch_notes() {
    let offline = SyncSummary {
        note: Some(BatchNote::Offline),
        ..SyncSummary::default()
    };
    assert_eq!(
        format_summary_lines(&offline),
        vec!["Offline; nothing was sent."]
    );

    let running = SyncSummary {
        note: Some(BatchNote::AlreadyRunning),
        ..SyncSummary::default()
    };
    assert_eq!(
        format_summary_lines(&running),
        vec!["A sync pass is already running."]
    );
}

#[test]
fn format_summary_lines_lists_failures() {
    let summary = SyncSummary {
        synced_drafts: 2,
        synced_photos: 1,
        errors: vec![SyncFailure {
            entity_type: EntityType::Draft,
            entity_id: "d9".to_string(),
            message: "HTTP 500: boom".to_string(),
        }],
        note: None,
    };

    let lines = format_summary_lines(&summary);
    assert_eq!(lines[0], "Synced 2 drafts and 1 photos");
    assert_eq!(lines[1], "  failed draft d9: HTTP 500: boom");
}

#[test]
fn format_status_lines_flag_local_only_mode() {
    let report = StatusReport {
        status: AggregateStatus::Offline,
        network: NetworkState::Offline,
        sync_configured: false,
        pending: PendingCounts {
            drafts: 1,
            photos: 2,
        },
        db_path: "/tmp/fieldsync.db".to_string(),
    };

    let lines = format_status_lines(&report);
    assert_eq!(lines[0], "Status:   offline");
    assert_eq!(lines[2], "Pending:  1 drafts, 2 photos");
    assert!(lines
        .last()
        .is_some_and(|line| line.contains("local-only")));
}

#[tokio::test(flavor = "multi_thread")]
async fn local_only_engine_captures_without_network() {
    let tmp = tempfile::tempdir().unwrap();
    let db_path = tmp.path().join("fieldsync.db");
    let engine = open_engine(&db_path).await.unwrap();
    if engine.sync_configured {
        // A developer environment with real credentials; nothing to assert.
        return;
    }

    let draft = engine
        .queue
        .save_draft(
            &DraftInput::new(
                DraftId::new(),
                "case-1",
                build_payload(None, &["area=hall".to_string()]).unwrap(),
            )
            .unwrap(),
        )
        .await
        .unwrap();
    engine
        .queue
        .queue_photo(&NewPhoto::new(draft.id.clone(), vec![1, 2, 3], "image/jpeg").unwrap())
        .await
        .unwrap();

    let summary = engine.queue.sync_all().await.unwrap();
    assert_eq!(summary.note, Some(BatchNote::Offline));
    assert_eq!(
        engine.queue.get_pending_counts().await.unwrap(),
        PendingCounts {
            drafts: 1,
            photos: 1
        }
    );

    drop(engine);
    let reopened = open_engine(&db_path).await.unwrap();
    assert_eq!(reopened.queue.list_drafts().await.unwrap().len(), 1);
}
