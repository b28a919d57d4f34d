//! Record Watch Library
//!
//! Watches one field of one record and turns value transitions into toast
//! notifications, with merge-field templating and an optional delayed view
//! refresh.
//!
//! # Architecture
//!
//! The library is the change-detection and notification-policy engine:
//! - Tracks the last observed value and decides what counts as a transition
//! - Renders `{oldValue}`/`{newValue}`/`{recordId}`/`{objectName}` tokens
//! - Keeps a single change-event subscription scoped to the watched record
//! - Emits toasts and refresh signals as [`WatchEvent`]s on a channel
//!
//! The library does NOT:
//! - Read records (the host supplies a [`RecordSource`])
//! - Talk to a real pub/sub bus (the host supplies a [`ChangeEventTransport`])
//! - Render anything (the host consumes the emitted events)
//!
//! # Example Usage
//!
//! ```no_run
//! use record_watch_core::{
//!     InMemoryTransport, ManualTimer, Notifier, RecordData, RecordingSource, WatchConfig,
//! };
//! use std::sync::Arc;
//!
//! # async fn run() {
//! let config = WatchConfig::new("Case", "500A", "Status")
//!     .with_message("Status changed from {oldValue} to {newValue}")
//!     .with_refresh(1000);
//!
//! let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
//! let mut notifier = Notifier::new(
//!     config,
//!     Arc::new(RecordingSource::new()),
//!     Arc::new(InMemoryTransport::new()),
//!     Arc::new(ManualTimer::new()),
//!     tx,
//! );
//!
//! notifier.activate().await;
//! notifier.on_record(Ok(RecordData::new("500A").with_field("Status", "New")));
//! notifier.on_record(Ok(RecordData::new("500A").with_field("Status", "Closed")));
//!
//! while let Ok(event) = rx.try_recv() {
//!     println!("{:?}", event);
//! }
//! notifier.deactivate().await;
//! # }
//! ```

/// Debug logging gated by the watch's debug flag
macro_rules! watch_debug {
    ($enabled:expr, $($arg:tt)+) => {
        if $enabled {
            log::debug!($($arg)+);
        }
    };
}

/// Failure logging, silent unless the watch's debug flag is set
macro_rules! watch_warn {
    ($enabled:expr, $($arg:tt)+) => {
        if $enabled {
            log::warn!($($arg)+);
        }
    };
}

// Public modules
pub mod config;
pub mod notifier;
pub mod scheduler;
pub mod source;
pub mod subscription;
pub mod template;
pub mod tracker;
pub mod transport;
pub mod types;

// Re-export main types for convenience
pub use config::WatchConfig;
pub use notifier::{Notifier, NotifierState};
pub use scheduler::{ManualTimer, RefreshScheduler, Timer, TimerTask, TokioTimer};
pub use source::{RecordSource, RecordingSource, SourceCall};
pub use subscription::{
    change_event_message, channel_for, record_ids, ChangeEventTransport, ErrorCallback,
    MatchCallback, MessageHandler, ReplayMarker, SubscriptionHandle, SubscriptionManager,
};
pub use template::{format_value, has_tokens, render, MergeContext};
pub use tracker::{Decision, TransitionTracker};
pub use transport::InMemoryTransport;
pub use types::{
    FieldSlot, FieldValue, RecordData, RecordDelivery, Result, ToastMode, ToastRequest,
    ToastVariant, WatchError, WatchEvent,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
