//! Upload control handle and observer integration tests.
//!
//! Run with: `cargo test -p medrec-uploads --test control_surface_test`

mod helpers;

use helpers::fixtures::pdf;
use helpers::{manager, manager_with_config, upload_config, MockFileApi};
use medrec_core::models::{BatchOutcome, EntityType};
use medrec_core::DocumentMode;
use medrec_uploads::{DocumentManager, NoOpObserver, UploadError};
use std::sync::Arc;

#[tokio::test]
async fn test_control_reads_live_pending_count() {
    let api = MockFileApi::new();
    let (manager, observer) = manager(&api, DocumentMode::Create, None);

    // Registered before any file was added; must not report a stale count.
    let control = observer.control();
    assert_eq!(*observer.registrations.lock().unwrap(), 1);
    assert!(!control.has_pending_files().await);

    for name in ["a.pdf", "b.pdf", "c.pdf"] {
        manager.add_file(pdf(name), "").await.unwrap();
    }
    assert_eq!(control.pending_files_count().await, 3);
    assert!(control.has_pending_files().await);

    let outcome = control.upload_pending_files(5).await.unwrap();
    assert_eq!(
        outcome,
        BatchOutcome {
            succeeded: 3,
            duplicates: 0,
            failed: 0
        }
    );
    assert_eq!(control.pending_files_count().await, 0);
    assert!(!control.is_blocking().await);
    assert_eq!(*observer.registrations.lock().unwrap(), 1);
}

#[tokio::test]
async fn test_control_after_manager_dropped() {
    let api = MockFileApi::new();
    let (manager, observer) = manager(&api, DocumentMode::Create, None);
    manager.add_file(pdf("a.pdf"), "").await.unwrap();
    let control = observer.control();

    drop(manager);

    assert!(control.is_closed());
    assert_eq!(control.pending_files_count().await, 0);
    assert!(matches!(
        control.upload_pending_files(1).await,
        Err(UploadError::Closed)
    ));
    assert_eq!(api.upload_count(), 0);
}

#[tokio::test]
async fn test_clear_pending_files() {
    let api = MockFileApi::new();
    let (manager, observer) = manager(&api, DocumentMode::Create, None);
    manager.add_file(pdf("a.pdf"), "").await.unwrap();
    manager.add_file(pdf("b.pdf"), "").await.unwrap();
    assert_eq!(manager.upload_records().await.len(), 2);

    observer.control().clear_pending_files().await.unwrap();

    assert!(manager.pending_files().await.is_empty());
    assert!(manager.upload_records().await.is_empty());
    assert_eq!(observer.last_count(), Some(0));
}

#[tokio::test]
async fn test_remove_pending_file_updates_count() {
    let api = MockFileApi::new();
    let (manager, observer) = manager(&api, DocumentMode::Create, None);
    let a = manager.add_file(pdf("a.pdf"), "").await.unwrap();
    manager.add_file(pdf("b.pdf"), "").await.unwrap();

    assert!(manager.remove_pending_file(a).await);
    assert!(!manager.remove_pending_file(a).await);

    let pending = manager.pending_files().await;
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].file.name, "b.pdf");
    assert_eq!(manager.upload_records().await.len(), 1);
    assert_eq!(observer.last_count(), Some(1));
}

#[tokio::test]
async fn test_edit_and_view_modes_require_entity() {
    let api = MockFileApi::new();
    for mode in [DocumentMode::Edit, DocumentMode::View] {
        let result = DocumentManager::new(
            api.clone(),
            EntityType::Medication,
            None,
            upload_config(mode),
            Arc::new(NoOpObserver),
        );
        assert!(matches!(result, Err(UploadError::MissingEntity(m)) if m == mode));
    }

    let result = DocumentManager::new(
        api.clone(),
        EntityType::Medication,
        Some(0),
        upload_config(DocumentMode::Edit),
        Arc::new(NoOpObserver),
    );
    assert!(matches!(result, Err(UploadError::InvalidEntityId(0))));
}

#[tokio::test]
async fn test_auto_upload_in_edit_mode() {
    let api = MockFileApi::new();
    let config = helpers::upload_config(DocumentMode::Edit);
    let config = medrec_core::UploadConfig {
        auto_upload: true,
        ..config
    };
    let (manager, observer) = manager_with_config(&api, config, Some(9));

    let report = manager
        .add_files(vec![(pdf("invoice.pdf"), String::new())])
        .await
        .unwrap();

    assert_eq!(report.added.len(), 1);
    assert_eq!(report.uploaded.map(|o| o.succeeded), Some(1));
    assert!(manager.pending_files().await.is_empty());
    assert_eq!(manager.files().await.len(), 1);
    assert_eq!(observer.last_count(), Some(1));
    assert_eq!(api.uploads.lock().unwrap()[0].entity_id, 9);
}

#[tokio::test]
async fn test_create_mode_auto_uploads_once_entity_exists() {
    let api = MockFileApi::new();
    let config = medrec_core::UploadConfig {
        auto_upload: true,
        ..upload_config(DocumentMode::Create)
    };
    let (manager, observer) = manager_with_config(&api, config, None);

    let report = manager
        .add_files(vec![(pdf("referral.pdf"), String::new())])
        .await
        .unwrap();
    assert!(report.uploaded.is_none());
    assert_eq!(manager.pending_files().await.len(), 1);
    assert_eq!(api.upload_count(), 0);

    observer.control().upload_pending_files(15).await.unwrap();
    assert_eq!(manager.entity_id().await, Some(15));

    let report = manager
        .add_files(vec![(pdf("invoice.pdf"), String::new())])
        .await
        .unwrap();
    assert_eq!(report.uploaded.map(|o| o.succeeded), Some(1));
    assert!(manager.pending_files().await.is_empty());
    assert_eq!(api.upload_count(), 2);
    assert_eq!(api.uploads.lock().unwrap()[1].entity_id, 15);
    assert_eq!(manager.files().await.len(), 2);
}

#[tokio::test]
async fn test_close_discards_staged_state() {
    let api = MockFileApi::new();
    let (manager, observer) = manager(&api, DocumentMode::Create, None);
    manager.add_file(pdf("a.pdf"), "").await.unwrap();

    manager.close().await.unwrap();

    assert!(manager.pending_files().await.is_empty());
    assert_eq!(observer.last_count(), Some(0));
}
