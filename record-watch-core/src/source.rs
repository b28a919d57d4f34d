//! Record data source
//!
//! The data source pushes record snapshots to the notifier (see
//! [`Notifier::on_record`](crate::Notifier::on_record)); the notifier only
//! asks it to start/stop watching and to refetch.

use crate::types::{Result, WatchError};
use parking_lot::Mutex;

pub trait RecordSource: Send + Sync {
    /// Start pushing the given field paths of `record_id`
    fn watch(&self, record_id: &str, field_paths: &[String]) -> Result<()>;

    /// Re-pull the current field values of `record_id`
    fn refetch(&self, record_id: &str);

    /// Stop pushing updates for `record_id`
    fn unwatch(&self, record_id: &str);
}

/// A call made on a [`RecordingSource`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceCall {
    Watch { record_id: String, field_paths: Vec<String> },
    Refetch { record_id: String },
    Unwatch { record_id: String },
}

/// Record source that only records what it was asked to do
#[derive(Debug, Default)]
pub struct RecordingSource {
    calls: Mutex<Vec<SourceCall>>,
    fail_watch: Mutex<Option<String>>,
}

impl RecordingSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `watch` fail with the given reason
    pub fn fail_watch_with(&self, reason: impl Into<String>) {
        *self.fail_watch.lock() = Some(reason.into());
    }

    pub fn calls(&self) -> Vec<SourceCall> {
        self.calls.lock().clone()
    }

    pub fn refetch_count(&self) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|call| matches!(call, SourceCall::Refetch { .. }))
            .count()
    }
}

impl RecordSource for RecordingSource {
    fn watch(&self, record_id: &str, field_paths: &[String]) -> Result<()> {
        if let Some(reason) = self.fail_watch.lock().clone() {
            return Err(WatchError::Source(reason));
        }
        self.calls.lock().push(SourceCall::Watch {
            record_id: record_id.to_string(),
            field_paths: field_paths.to_vec(),
        });
        Ok(())
    }

    fn refetch(&self, record_id: &str) {
        self.calls.lock().push(SourceCall::Refetch {
            record_id: record_id.to_string(),
        });
    }

    fn unwatch(&self, record_id: &str) {
        self.calls.lock().push(SourceCall::Unwatch {
            record_id: record_id.to_string(),
        });
    }
}
