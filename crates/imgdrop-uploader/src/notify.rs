//! User-facing notifications, one per completed upload attempt.

use imgdrop_core::{ErrorMetadata, LogLevel, UploadOutcome};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Success,
    Rejection,
    Failure,
}

/// A blocking acknowledgment shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub kind: NotificationKind,
    pub title: String,
    /// Internal reason, for failures only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl Notification {
    pub fn from_outcome(outcome: &UploadOutcome) -> Self {
        match outcome {
            UploadOutcome::Succeeded { .. } => Self {
                kind: NotificationKind::Success,
                title: "Your Image has been Uploaded!".to_string(),
                detail: None,
            },
            UploadOutcome::Rejected { reason } => Self {
                kind: NotificationKind::Rejection,
                title: reason.client_message(),
                detail: None,
            },
            UploadOutcome::Failed { error } => Self {
                kind: NotificationKind::Failure,
                title: error.client_message(),
                detail: Some(error.detail().to_string()),
            },
        }
    }
}

/// Delivers notifications to whatever presents them.
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: &Notification);
}

/// Notifier that only logs; the default when no view is attached.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, notification: &Notification) {
        tracing::info!(
            kind = ?notification.kind,
            title = %notification.title,
            detail = notification.detail.as_deref().unwrap_or(""),
            "Notification"
        );
    }
}

/// Log an outcome at the level its error class calls for.
pub(crate) fn log_outcome(outcome: &UploadOutcome) {
    match outcome {
        UploadOutcome::Succeeded { reference } => {
            tracing::info!(key = %reference.key, url = %reference.url, "Upload succeeded");
        }
        UploadOutcome::Rejected { reason } => match reason.log_level() {
            LogLevel::Warn | LogLevel::Error => {
                tracing::warn!(code = reason.error_code(), reason = %reason, "Upload rejected")
            }
            LogLevel::Debug => {
                tracing::debug!(code = reason.error_code(), reason = %reason, "Upload rejected")
            }
        },
        UploadOutcome::Failed { error } => {
            tracing::error!(
                code = error.error_code(),
                class = ?error.class(),
                error = %error,
                "Upload failed"
            );
        }
    }
}
