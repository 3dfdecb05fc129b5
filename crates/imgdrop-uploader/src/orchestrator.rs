//! Upload orchestrator: drives one candidate through the pipeline.
//!
//! validate → (normalize) → (reduce) → authorize → name → transfer
//!
//! The orchestrator owns the only mutable state of the pipeline: the selected
//! candidate, the sequence counter and the in-flight flag. Stages return new values
//! and never touch that state themselves.

use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use imgdrop_core::{
    FailureKind, RejectionReason, UploadCandidate, UploadError, UploadOutcome, UploaderConfig,
};
use imgdrop_processing::{FormatNormalizer, FormatValidator, HeifDecoder, SizeReducer};
use imgdrop_storage::Storage;
use tokio::sync::watch;

use crate::gate::{AccessGate, GateDecision};
use crate::naming::NameGenerator;
use crate::notify::{log_outcome, Notification, Notifier, TracingNotifier};
use crate::session::Session;
use crate::transfer::TransferClient;

/// Observable pipeline state.
///
/// `Idle` and `Completed` both accept the next trigger.
#[derive(Debug, Clone)]
pub enum UploadState {
    Idle,
    Validating,
    Normalizing,
    Reducing,
    Authorizing,
    Transferring,
    Completed(UploadOutcome),
}

impl UploadState {
    pub fn is_busy(&self) -> bool {
        !matches!(self, UploadState::Idle | UploadState::Completed(_))
    }
}

#[derive(Default)]
struct Selection {
    /// Bumped on every selection so a finished attempt can tell whether the user
    /// picked another file meanwhile.
    generation: u64,
    candidate: Option<UploadCandidate>,
}

/// Holds the in-flight flag; clears it on drop, on every exit path.
struct UploadingGuard<'a>(&'a AtomicBool);

impl<'a> UploadingGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for UploadingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct UploadOrchestrator {
    validator: FormatValidator,
    normalizer: FormatNormalizer,
    reducer: SizeReducer,
    gate: AccessGate,
    session: Session,
    names: NameGenerator,
    transfer: TransferClient,
    notifier: Arc<dyn Notifier>,
    stage_timeout: Option<Duration>,
    uploading: AtomicBool,
    upload_count: AtomicU64,
    selection: Mutex<Selection>,
    state: watch::Sender<UploadState>,
}

impl UploadOrchestrator {
    pub fn new(config: &UploaderConfig, storage: Arc<dyn Storage>, session: Session) -> Self {
        let (state, _) = watch::channel(UploadState::Idle);
        Self {
            validator: FormatValidator::from_config(config),
            normalizer: FormatNormalizer::with_ffmpeg(&config.ffmpeg_path),
            reducer: SizeReducer::new(config.reduce.clone()),
            gate: AccessGate,
            upload_count: AtomicU64::new(session.initial_count),
            session,
            names: NameGenerator::new(config.key_prefix.clone()),
            transfer: TransferClient::new(storage),
            notifier: Arc::new(TracingNotifier),
            stage_timeout: config.stage_timeout,
            uploading: AtomicBool::new(false),
            selection: Mutex::new(Selection::default()),
            state,
        }
    }

    /// Bootstrap a session from the launch query and build the orchestrator.
    pub async fn start(
        config: &UploaderConfig,
        storage: Arc<dyn Storage>,
        launch_query: Option<&str>,
    ) -> Self {
        let session = Session::bootstrap(config, &storage, launch_query).await;
        Self::new(config, storage, session)
    }

    pub fn with_heif_decoder(mut self, decoder: Arc<dyn HeifDecoder>) -> Self {
        self.normalizer = FormatNormalizer::new(decoder);
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Replace the selected file. Nothing is processed until [`trigger_upload`].
    ///
    /// [`trigger_upload`]: UploadOrchestrator::trigger_upload
    pub fn select_file(&self, candidate: Option<UploadCandidate>) {
        let mut selection = self.selection();
        selection.generation += 1;
        selection.candidate = candidate;
    }

    pub fn selected(&self) -> Option<UploadCandidate> {
        self.selection().candidate.clone()
    }

    pub fn is_uploading(&self) -> bool {
        self.uploading.load(Ordering::Acquire)
    }

    /// Successful uploads plus the startup seed.
    pub fn upload_count(&self) -> u64 {
        self.upload_count.load(Ordering::Acquire)
    }

    pub fn state(&self) -> UploadState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<UploadState> {
        self.state.subscribe()
    }

    /// Run the selected file through the pipeline.
    ///
    /// Returns `None` without doing anything when another attempt is in flight.
    /// Otherwise the attempt always runs to a terminal outcome, which is also
    /// published as [`UploadState::Completed`] and sent to the notifier.
    pub async fn trigger_upload(&self) -> Option<UploadOutcome> {
        let Some(_guard) = UploadingGuard::acquire(&self.uploading) else {
            tracing::debug!("Upload already in progress, ignoring trigger");
            return None;
        };

        let (generation, candidate) = {
            let selection = self.selection();
            (selection.generation, selection.candidate.clone())
        };

        let start = Instant::now();
        let outcome = self.run(candidate).await;

        if outcome.is_success() {
            self.upload_count.fetch_add(1, Ordering::AcqRel);
        }
        if matches!(
            outcome,
            UploadOutcome::Succeeded { .. }
                | UploadOutcome::Rejected {
                    reason: RejectionReason::InvalidFormat { .. }
                }
        ) {
            self.clear_selection_if_unchanged(generation);
        }

        log_outcome(&outcome);
        tracing::debug!(
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            upload_count = self.upload_count(),
            "Upload attempt finished"
        );
        self.notifier.notify(&Notification::from_outcome(&outcome));
        self.state.send_replace(UploadState::Completed(outcome.clone()));

        Some(outcome)
    }

    async fn run(&self, candidate: Option<UploadCandidate>) -> UploadOutcome {
        let Some(candidate) = candidate else {
            return UploadOutcome::Rejected {
                reason: RejectionReason::NoFileSelected,
            };
        };

        self.enter(UploadState::Validating);
        if let Err(e) = self.validator.validate(&candidate) {
            return UploadOutcome::Rejected { reason: e.into() };
        }

        let candidate = if self.normalizer.applies_to(&candidate) {
            self.enter(UploadState::Normalizing);
            let normalized = self
                .with_deadline(FailureKind::Conversion, self.normalizer.normalize(candidate))
                .await;
            match normalized {
                Ok(candidate) => candidate,
                Err(error) => return UploadOutcome::Failed { error },
            }
        } else {
            candidate
        };

        let candidate = if self.reducer.should_reduce(&candidate) {
            self.enter(UploadState::Reducing);
            let reduced = self
                .with_deadline(FailureKind::Compression, self.reducer.reduce(candidate))
                .await;
            match reduced {
                Ok(candidate) => candidate,
                Err(error) => return UploadOutcome::Failed { error },
            }
        } else {
            candidate
        };

        self.enter(UploadState::Authorizing);
        if self.gate.authorize(&self.session.auth) == GateDecision::Closed {
            return UploadOutcome::Rejected {
                reason: RejectionReason::Unauthorized,
            };
        }

        let key = self
            .names
            .allocate(self.upload_count(), candidate.extension());

        self.enter(UploadState::Transferring);
        let bytes = candidate.raw_bytes().to_vec();
        match self
            .with_deadline(FailureKind::Transfer, self.transfer.upload(bytes, &key))
            .await
        {
            Ok(reference) => UploadOutcome::Succeeded { reference },
            Err(error) => UploadOutcome::Failed { error },
        }
    }

    fn enter(&self, state: UploadState) {
        tracing::debug!(state = ?state, "Pipeline stage");
        self.state.send_replace(state);
    }

    /// Bound a suspending stage by the configured deadline.
    ///
    /// Expiry is reported as the stage's own failure kind. A blocking conversion that
    /// times out keeps running on its thread, but its result is discarded.
    async fn with_deadline<T, F>(&self, kind: FailureKind, stage: F) -> Result<T, UploadError>
    where
        F: Future<Output = Result<T, UploadError>>,
    {
        match self.stage_timeout {
            Some(limit) => tokio::time::timeout(limit, stage).await.unwrap_or_else(|_| {
                Err(UploadError::new(
                    kind,
                    format!("Stage timed out after {:?}", limit),
                ))
            }),
            None => stage.await,
        }
    }

    fn clear_selection_if_unchanged(&self, generation: u64) {
        let mut selection = self.selection();
        if selection.generation == generation {
            selection.candidate = None;
        }
    }

    fn selection(&self) -> MutexGuard<'_, Selection> {
        self.selection
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
