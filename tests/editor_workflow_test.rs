//! Save ordering, failure handling, toggle modes, import and navigation.

use std::sync::Arc;

use gas_core::mock::{BackendCall, MockBackend, Operation};
use gas_core::{ChannelConfig, ChannelDraft, ChannelId, ConsoleError, Device, ImportPayload, ImportRow};
use gas_daq::session_store::MemorySessionStore;
use gas_daq::validation::INVALID_TUMBLER_VOLUME;
use gas_daq::{ChannelEditor, EditorOptions};

fn ch(n: u8) -> ChannelId {
    ChannelId::new(n).unwrap()
}

fn device() -> Device {
    Device::new("gas-02", "Tumbler rack B")
}

fn saved(volume: f64) -> ChannelConfig {
    ChannelConfig {
        inoculum_weight_grams: Some(8.0),
        tumbler_volume: Some(volume),
        in_service: true,
        ..Default::default()
    }
}

fn open_with(backend: &Arc<MockBackend>, options: EditorOptions) -> ChannelEditor {
    ChannelEditor::open(
        device(),
        backend.clone(),
        Arc::new(MemorySessionStore::new()),
        options,
    )
}

#[tokio::test]
async fn test_last_issued_save_wins() {
    let backend = Arc::new(MockBackend::new());
    let mut editor = open_with(&backend, EditorOptions::default());
    editor.refresh().await.unwrap();

    editor.edit(ch(3), |d| d.tumbler_volume = "100".into());
    let first = editor.prepare_save(ch(3)).unwrap();
    editor.edit(ch(3), |d| d.tumbler_volume = "200".into());
    let second = editor.prepare_save(ch(3)).unwrap();

    // Responses arrive out of order.
    let second = second.send(backend.as_ref()).await;
    let first = first.send(backend.as_ref()).await;
    assert!(editor.apply_save(second).unwrap());
    assert!(!editor.apply_save(first).unwrap());

    assert_eq!(editor.confirmed(ch(3)).unwrap().tumbler_volume, Some(200.0));
    assert_eq!(editor.draft(ch(3)).tumbler_volume, "200");
}

#[tokio::test]
async fn test_failed_batch_leaves_state_untouched() {
    let backend = Arc::new(MockBackend::new().with_record(&device().id, ch(1), saved(300.0)));
    let mut editor = open_with(&backend, EditorOptions::default());
    editor.refresh().await.unwrap();

    editor.edit(ch(1), |d| d.tumbler_volume = "350".into());
    editor.edit(ch(2), |d| d.tumbler_volume = "400".into());
    backend.fail_next(Operation::PersistBatch, "device offline");

    let err = editor.save_all().await.unwrap_err();
    assert_eq!(err.backend_message(), Some("device offline"));
    assert_eq!(editor.confirmed(ch(1)).unwrap().tumbler_volume, Some(300.0));
    assert_eq!(editor.confirmed(ch(2)), None);
    assert_eq!(editor.draft(ch(1)).tumbler_volume, "350");

    let report = editor.save_all().await.unwrap();
    assert_eq!(report.saved, vec![ch(1), ch(2)]);
    assert_eq!(backend.record(&device().id, ch(2)).unwrap().tumbler_volume, Some(400.0));
}

#[tokio::test]
async fn test_save_all_writes_placeholders_and_inactive_records() {
    let backend = Arc::new(MockBackend::new().with_record(&device().id, ch(5), saved(300.0)));
    let mut editor = open_with(
        &backend,
        EditorOptions {
            clear_on_toggle: false,
            ..Default::default()
        },
    );
    editor.refresh().await.unwrap();

    editor.toggle_service(ch(5)).await.unwrap();
    editor.toggle_service(ch(6)).await.unwrap();
    assert!(!editor.draft(ch(5)).in_service);
    assert!(editor.draft(ch(6)).in_service);

    let report = editor.save_all().await.unwrap();
    assert_eq!(report.saved, vec![ch(5), ch(6)]);
    assert_eq!(report.skipped.len(), 13);

    let inactive = backend.record(&device().id, ch(5)).unwrap();
    assert!(!inactive.in_service);
    assert_eq!(inactive.tumbler_volume, Some(300.0));
    let placeholder = backend.record(&device().id, ch(6)).unwrap();
    assert!(placeholder.in_service);
    assert!(!placeholder.is_configured());
}

#[tokio::test]
async fn test_commit_on_toggle_writes_service_flag() {
    let backend = Arc::new(MockBackend::new().with_record(&device().id, ch(2), saved(450.0)));
    let mut editor = open_with(
        &backend,
        EditorOptions {
            clear_on_toggle: false,
            commit_on_toggle: true,
            ..Default::default()
        },
    );
    editor.refresh().await.unwrap();

    editor.toggle_service(ch(2)).await.unwrap();
    assert!(backend.clear_calls().is_empty());
    assert!(backend
        .calls()
        .iter()
        .any(|call| matches!(call, BackendCall::Persist(_, channel, config) if *channel == ch(2) && !config.in_service)));

    let record = backend.record(&device().id, ch(2)).unwrap();
    assert!(!record.in_service);
    assert_eq!(record.tumbler_volume, Some(450.0));
    assert_eq!(editor.draft(ch(2)).tumbler_volume, "450");

    assert_eq!(backend.write_count(), 1);

    editor.toggle_service(ch(2)).await.unwrap();
    let record = backend.record(&device().id, ch(2)).unwrap();
    assert!(record.in_service);
    assert_eq!(record.tumbler_volume, Some(450.0));
    assert!(editor.confirmed(ch(2)).unwrap().in_service);
    assert_eq!(backend.write_count(), 2);
}

#[tokio::test]
async fn test_commit_on_toggle_activates_saved_inactive_channel() {
    let backend = Arc::new(MockBackend::new().with_record(
        &device().id,
        ch(2),
        ChannelConfig {
            in_service: false,
            ..saved(450.0)
        },
    ));
    let mut editor = open_with(
        &backend,
        EditorOptions {
            clear_on_toggle: false,
            commit_on_toggle: true,
            ..Default::default()
        },
    );
    editor.refresh().await.unwrap();
    assert!(!editor.draft(ch(2)).in_service);

    editor.toggle_service(ch(2)).await.unwrap();
    assert!(editor.draft(ch(2)).in_service);
    assert!(backend.record(&device().id, ch(2)).unwrap().in_service);
    assert_eq!(backend.write_count(), 1);
}

#[tokio::test]
async fn test_toggle_without_commit_writes_nothing() {
    let backend = Arc::new(MockBackend::new().with_record(&device().id, ch(2), saved(450.0)));
    let mut editor = open_with(
        &backend,
        EditorOptions {
            clear_on_toggle: false,
            ..Default::default()
        },
    );
    editor.refresh().await.unwrap();

    editor.toggle_service(ch(2)).await.unwrap();
    editor.toggle_service(ch(9)).await.unwrap();
    assert!(!editor.draft(ch(2)).in_service);
    assert!(editor.draft(ch(9)).in_service);
    assert_eq!(backend.write_count(), 0);
}

#[tokio::test]
async fn test_single_save_failure_leaves_state_untouched() {
    let backend = Arc::new(MockBackend::new().with_record(&device().id, ch(3), saved(300.0)));
    let mut editor = open_with(&backend, EditorOptions::default());
    editor.refresh().await.unwrap();

    editor.edit(ch(3), |d| d.tumbler_volume = "320".into());
    backend.fail_next(Operation::Persist, "calibration lock on channel 3");

    let err = editor.save_channel(ch(3)).await.unwrap_err();
    assert_eq!(err.backend_message(), Some("calibration lock on channel 3"));
    assert_eq!(editor.confirmed(ch(3)).unwrap().tumbler_volume, Some(300.0));
    assert_eq!(editor.draft(ch(3)).tumbler_volume, "320");
    assert_eq!(backend.record(&device().id, ch(3)).unwrap().tumbler_volume, Some(300.0));

    assert!(editor.save_channel(ch(3)).await.unwrap());
    assert_eq!(editor.confirmed(ch(3)).unwrap().tumbler_volume, Some(320.0));
    assert_eq!(backend.record(&device().id, ch(3)).unwrap().tumbler_volume, Some(320.0));
}

#[tokio::test]
async fn test_invalid_single_save_sets_inline_error_and_sends_nothing() {
    let backend = Arc::new(MockBackend::new());
    let mut editor = open_with(&backend, EditorOptions::default());
    editor.refresh().await.unwrap();

    editor.edit(ch(8), |d| d.tumbler_volume = "a lot".into());
    let err = editor.save_channel(ch(8)).await.unwrap_err();
    assert!(matches!(err, ConsoleError::Validation(_)));
    assert_eq!(editor.error(ch(8)), INVALID_TUMBLER_VOLUME);
    assert_eq!(editor.confirmed(ch(8)), None);
    assert_eq!(backend.write_count(), 0);

    editor.edit(ch(8), |d| d.tumbler_volume = "400".into());
    assert!(editor.save_channel(ch(8)).await.unwrap());
    assert_eq!(editor.error(ch(8)), "");
}

#[tokio::test]
async fn test_failed_clear_keeps_draft_and_record() {
    let backend = Arc::new(MockBackend::new().with_record(&device().id, ch(4), saved(500.0)));
    let mut editor = open_with(&backend, EditorOptions::default());
    editor.refresh().await.unwrap();
    backend.fail_next(Operation::Clear, "busy");

    let err = editor.toggle_service(ch(4)).await.unwrap_err();
    assert!(matches!(err, ConsoleError::Backend(_)));
    assert!(editor.draft(ch(4)).in_service);
    assert_eq!(editor.draft(ch(4)).tumbler_volume, "500");
    assert!(editor.confirmed(ch(4)).is_some());
}

#[tokio::test]
async fn test_selection_toggle_clears_every_selected_record() {
    let backend = Arc::new(
        MockBackend::new()
            .with_record(&device().id, ch(1), saved(100.0))
            .with_record(&device().id, ch(2), saved(200.0)),
    );
    let mut editor = open_with(&backend, EditorOptions::default());
    editor.refresh().await.unwrap();
    editor.toggle_selected(ch(1));
    editor.toggle_selected(ch(2));
    editor.toggle_selected(ch(3));

    editor.toggle_service(ch(1)).await.unwrap();
    let mut cleared = backend.clear_calls();
    cleared.sort();
    assert_eq!(cleared, vec![ch(1), ch(2)]);
    for n in 1..=3 {
        assert_eq!(*editor.draft(ch(n)), ChannelDraft::default());
    }
}

#[tokio::test]
async fn test_import_is_all_or_nothing() {
    let backend = Arc::new(MockBackend::new());
    let mut editor = open_with(&backend, EditorOptions::default());
    editor.refresh().await.unwrap();

    backend.set_import_response(ImportPayload {
        configurations: vec![
            ImportRow {
                channel: 1,
                tumbler_volume: Some(100.0),
                ..Default::default()
            },
            ImportRow {
                channel: 2,
                tumbler_volume: Some(f64::NAN),
                ..Default::default()
            },
        ],
    });
    let err = editor.import_file(b"ignored").await.unwrap_err();
    assert!(matches!(err, ConsoleError::ImportFormat(_)));
    assert_eq!(editor.confirmed(ch(1)), None);
    assert_eq!(*editor.draft(ch(1)), ChannelDraft::default());

    backend.set_import_response(ImportPayload {
        configurations: vec![ImportRow {
            channel: 1,
            tumbler_volume: Some(100.0),
            chimera_channel: Some(4),
            ..Default::default()
        }],
    });
    assert_eq!(editor.import_file(b"ignored").await.unwrap(), vec![ch(1)]);
    let config = editor.confirmed(ch(1)).unwrap();
    assert_eq!(config.tumbler_volume, Some(100.0));
    assert_eq!(config.chimera_channel, None);
}

#[tokio::test]
async fn test_drafts_survive_navigation() {
    let backend = Arc::new(MockBackend::new().with_record(&device().id, ch(5), saved(300.0)));
    let store = Arc::new(MemorySessionStore::new());

    let mut editor = ChannelEditor::open(device(), backend.clone(), store.clone(), EditorOptions::default());
    editor.refresh().await.unwrap();
    editor.edit(ch(5), |d| d.tumbler_volume = "333".into());
    drop(editor);

    let mut reopened = ChannelEditor::open(device(), backend.clone(), store, EditorOptions::default());
    assert_eq!(reopened.draft(ch(5)).tumbler_volume, "333");
    reopened.refresh().await.unwrap();
    assert_eq!(reopened.draft(ch(5)).tumbler_volume, "333");
    assert!(reopened.draft(ch(5)).in_service);
}
