//! Capture lifecycle, commit semantics and storage failure handling.

mod common;

use common::{logs_payload, record_session, FailingStore, TestTraceBuilder};
use otlp_recorder::capture::CaptureService;
use otlp_recorder::core::{CaptureConfig, RecorderError, SessionStatus, SignalType};
use otlp_recorder::session::{SelectionStrategy, SessionManager};
use otlp_recorder::storage::{BlobStore, FsBlobStore, InMemoryBlobStore};
use std::sync::Arc;

#[tokio::test]
async fn test_uncommitted_session_is_invisible() {
    let store = Arc::new(InMemoryBlobStore::new());
    let capture = CaptureService::new(store.clone());
    let manager = SessionManager::new(store.clone());

    capture.start_capture(CaptureConfig::new("open")).await.unwrap();
    capture
        .capture_otlp_data("open", TestTraceBuilder::new(0).build(), SignalType::Traces)
        .await
        .unwrap();

    assert_eq!(store.list_objects("sessions/open/raw/").await.unwrap().len(), 1);
    assert!(manager.list_sessions(None).await.unwrap().is_empty());
    assert!(matches!(
        manager.get_session("open").await,
        Err(RecorderError::SessionNotFound(_))
    ));

    // Still visible to the capture service itself
    assert_eq!(capture.get_capture_status("open").await.unwrap().status, SessionStatus::Active);

    capture.stop_capture("open").await.unwrap();
    assert_eq!(manager.list_sessions(None).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_concurrent_captures_are_all_counted() {
    let store = Arc::new(InMemoryBlobStore::new());
    let capture = Arc::new(CaptureService::new(store.clone()));
    capture.start_capture(CaptureConfig::new("busy")).await.unwrap();

    let tasks: Vec<_> = (0..20)
        .map(|i| {
            let capture = Arc::clone(&capture);
            tokio::spawn(async move {
                capture
                    .capture_otlp_data("busy", TestTraceBuilder::new(i).build(), SignalType::Traces)
                    .await
                    .unwrap()
                    .unwrap()
            })
        })
        .collect();

    let mut stored_bytes = 0;
    for task in tasks {
        stored_bytes += task.await.unwrap().size_bytes;
    }

    let session = capture.stop_capture("busy").await.unwrap();
    assert_eq!(session.captured_traces, 20);
    assert_eq!(session.total_size_bytes, stored_bytes);
    assert_eq!(store.list_objects("sessions/busy/raw/").await.unwrap().len(), 20);
}

#[tokio::test]
async fn test_failed_blob_write_leaves_counters_alone() {
    let store = Arc::new(FailingStore::new());
    let capture = CaptureService::new(store.clone());
    capture.start_capture(CaptureConfig::new("s1")).await.unwrap();

    store.fail_data_writes(true);
    let err = capture
        .capture_otlp_data("s1", logs_payload(2), SignalType::Logs)
        .await
        .unwrap_err();
    assert!(matches!(err, RecorderError::StorageFailure(_)));

    store.fail_data_writes(false);
    let session = capture.stop_capture("s1").await.unwrap();
    assert_eq!(session.captured_logs, 0);
    assert_eq!(session.total_size_bytes, 0);
}

#[tokio::test]
async fn test_failed_metadata_write_marks_session_failed() {
    let store = Arc::new(FailingStore::new());
    let capture = CaptureService::new(store.clone());
    capture.start_capture(CaptureConfig::new("s1")).await.unwrap();
    capture
        .capture_otlp_data("s1", TestTraceBuilder::new(0).build(), SignalType::Traces)
        .await
        .unwrap();

    store.fail_metadata_writes(true);
    assert!(capture.stop_capture("s1").await.is_err());
    assert_eq!(capture.get_capture_status("s1").await.unwrap().status, SessionStatus::Failed);

    store.fail_metadata_writes(false);
    let manager = SessionManager::new(store.clone());
    assert!(manager.list_sessions(None).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_selection_over_captured_sessions() {
    let store = Arc::new(InMemoryBlobStore::new());
    let capture = CaptureService::new(store.clone());

    for (id, payloads) in [("ten", 10), ("fifty", 50), ("five", 5)] {
        let batch: Vec<_> = (0..payloads).map(|_| (SignalType::Logs, logs_payload(1))).collect();
        capture.start_capture(CaptureConfig::new(id)).await.unwrap();
        for (signal, payload) in batch {
            capture.capture_otlp_data(id, payload, signal).await.unwrap();
        }
        capture.stop_capture(id).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(2)).await;
    }

    let manager = SessionManager::new(store);
    let pick = |strategy| {
        let manager = manager.clone();
        async move { manager.select_session(strategy, None).await.unwrap() }
    };

    assert_eq!(pick(SelectionStrategy::Largest).await.captured_logs, 50);
    assert_eq!(pick(SelectionStrategy::Smallest).await.captured_logs, 5);
    assert_eq!(pick(SelectionStrategy::Latest).await.session_id, "five");
}

#[tokio::test]
async fn test_delete_removes_everything() {
    let store = Arc::new(InMemoryBlobStore::new());
    let capture = CaptureService::new(store.clone());
    record_session(
        &capture,
        "doomed",
        &[(SignalType::Traces, TestTraceBuilder::new(0).build()), (SignalType::Logs, logs_payload(3))],
    )
    .await;
    record_session(&capture, "kept", &[(SignalType::Logs, logs_payload(1))]).await;

    let manager = SessionManager::new(store.clone());
    assert_eq!(manager.delete_session("doomed").await.unwrap(), 3);
    assert!(store.list_objects("sessions/doomed/").await.unwrap().is_empty());

    let remaining: Vec<_> = manager
        .list_sessions(None)
        .await
        .unwrap()
        .into_iter()
        .map(|s| s.session_id)
        .collect();
    assert_eq!(remaining, vec!["kept"]);
}

#[tokio::test]
async fn test_filesystem_session_with_temp_like_id_is_listed() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(FsBlobStore::new(dir.path()));
    let capture = CaptureService::new(store.clone());
    record_session(
        &capture,
        "load.tmp-1",
        &[(SignalType::Traces, TestTraceBuilder::new(0).build()), (SignalType::Logs, logs_payload(2))],
    )
    .await;

    let manager = SessionManager::new(store.clone());
    let listed = manager.list_sessions(None).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].session_id, "load.tmp-1");
    assert_eq!(capture.list_capture_sessions().await.unwrap().len(), 1);
    assert_eq!(
        manager.select_session(SelectionStrategy::Latest, None).await.unwrap().session_id,
        "load.tmp-1"
    );
    assert_eq!(manager.list_data_files("load.tmp-1", None).await.unwrap().len(), 2);
}
