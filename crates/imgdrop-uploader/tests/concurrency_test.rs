mod helpers;

use std::sync::mpsc;
use std::sync::Arc;
use std::time::Duration;

use helpers::*;
use imgdrop_core::{UploadCandidate, UploadError, UploadOutcome, UploaderConfig};
use imgdrop_storage::MemoryStorage;
use imgdrop_uploader::{UploadOrchestrator, UploadState};

/// Wait until the attempt is parked inside the HEIF conversion.
async fn wait_until_converting(orchestrator: &UploadOrchestrator) {
    for _ in 0..500 {
        if orchestrator.is_uploading() && matches!(orchestrator.state(), UploadState::Normalizing) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    panic!("upload never started");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_trigger_while_in_flight_is_ignored() {
    let (release, gate) = mpsc::channel();
    let (memory, orchestrator) = open_orchestrator();
    let orchestrator = Arc::new(orchestrator.with_heif_decoder(Arc::new(GatedDecoder::new(gate))));
    let mut states = orchestrator.subscribe();

    orchestrator.select_file(Some(UploadCandidate::new("IMG_0001.heic", vec![0u8; 512])));
    let first = tokio::spawn({
        let orchestrator = Arc::clone(&orchestrator);
        async move { orchestrator.trigger_upload().await }
    });

    wait_until_converting(&orchestrator).await;
    assert!(orchestrator.state().is_busy());
    assert!(orchestrator.trigger_upload().await.is_none());

    release.send(()).unwrap();
    let outcome = first.await.unwrap().unwrap();

    assert!(outcome.is_success());
    assert_eq!(memory.write_attempts(), 1);
    assert_eq!(orchestrator.upload_count(), 1);
    assert!(!orchestrator.is_uploading());
    assert!(matches!(
        *states.borrow_and_update(),
        UploadState::Completed(UploadOutcome::Succeeded { .. })
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_new_selection_during_attempt_survives() {
    let (release, gate) = mpsc::channel();
    let (_, orchestrator) = open_orchestrator();
    let orchestrator = Arc::new(orchestrator.with_heif_decoder(Arc::new(GatedDecoder::new(gate))));

    orchestrator.select_file(Some(UploadCandidate::new("first.heic", vec![0u8; 512])));
    let first = tokio::spawn({
        let orchestrator = Arc::clone(&orchestrator);
        async move { orchestrator.trigger_upload().await }
    });
    wait_until_converting(&orchestrator).await;

    orchestrator.select_file(Some(UploadCandidate::new("second.png", png_bytes(4, 4))));
    release.send(()).unwrap();
    assert!(first.await.unwrap().unwrap().is_success());

    let selected = orchestrator.selected().expect("second selection must be kept");
    assert_eq!(selected.declared_name(), "second.png");

    // The kept selection is what the next trigger uploads.
    let outcome = orchestrator.trigger_upload().await.unwrap();
    assert!(outcome.reference().unwrap().key.starts_with("images/image1"));
}

#[tokio::test]
async fn test_stage_deadline_fails_the_attempt() {
    let (release, gate) = mpsc::channel::<()>();
    let memory = Arc::new(MemoryStorage::new());
    let config = UploaderConfig {
        stage_timeout: Some(Duration::from_millis(50)),
        ..UploaderConfig::default()
    };
    let orchestrator = UploadOrchestrator::new(
        &config,
        memory.clone(),
        session(Some(TOKEN), Some(TOKEN), 0),
    )
    .with_heif_decoder(Arc::new(GatedDecoder::new(gate)));

    orchestrator.select_file(Some(UploadCandidate::new("slow.heic", vec![0u8; 64])));
    let outcome = orchestrator.trigger_upload().await.unwrap();

    assert!(matches!(
        outcome,
        UploadOutcome::Failed {
            error: UploadError::Conversion(_)
        }
    ));
    assert!(!orchestrator.is_uploading());
    assert_eq!(memory.write_attempts(), 0);

    // Unblock the abandoned conversion thread.
    drop(release);
}
