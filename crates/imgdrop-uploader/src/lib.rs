//! imgdrop Uploader
//!
//! This crate assembles the upload pipeline:
//! - Shared-secret gate (gate)
//! - Storage key allocation (naming)
//! - Write-then-resolve transfer (transfer)
//! - The orchestrator owning counter, flag and selection (orchestrator)
//! - Process-start bootstrap (session) and user notifications (notify)

pub mod gate;
pub mod naming;
pub mod notify;
pub mod orchestrator;
pub mod session;
pub mod telemetry;
pub mod transfer;

// Re-export commonly used types
pub use gate::{AccessGate, AuthorizationContext, GateDecision};
pub use naming::NameGenerator;
pub use notify::{Notification, NotificationKind, Notifier, TracingNotifier};
pub use orchestrator::{UploadOrchestrator, UploadState};
pub use session::Session;
pub use transfer::TransferClient;
