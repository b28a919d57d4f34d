//! Transition tracking
//!
//! Keeps the last observed value of the watched field and decides whether a
//! newly observed value is a transition worth notifying about.

use crate::types::FieldValue;

/// Outcome of feeding one observed value to the tracker
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    /// First observation of the activation; stored, never notified
    Baseline,
    /// Same value as before, or notify-once already used up
    Suppressed,
    /// The value changed and policy allows a notification
    Notify { old: FieldValue, new: FieldValue },
}

/// Per-activation transition state
#[derive(Debug, Clone, Default)]
pub struct TransitionTracker {
    /// `None` until the first value arrives (distinct from `FieldValue::Null`)
    last_seen: Option<FieldValue>,
    previous: Option<FieldValue>,
    has_notified: bool,
    notify_once: bool,
}

impl TransitionTracker {
    pub fn new(notify_once: bool) -> Self {
        Self {
            notify_once,
            ..Self::default()
        }
    }

    /// Feed a newly observed value
    pub fn evaluate(&mut self, new: FieldValue) -> Decision {
        let Some(last) = self.last_seen.take() else {
            self.previous = Some(new.clone());
            self.last_seen = Some(new);
            return Decision::Baseline;
        };

        if last == new {
            self.last_seen = Some(last);
            return Decision::Suppressed;
        }

        // State follows the truth even when the toast is suppressed
        self.previous = Some(last.clone());
        self.last_seen = Some(new.clone());

        if self.notify_once && self.has_notified {
            return Decision::Suppressed;
        }

        Decision::Notify { old: last, new }
    }

    /// Record that a notification was actually emitted
    pub fn mark_notified(&mut self) {
        self.has_notified = true;
    }

    pub fn has_notified(&self) -> bool {
        self.has_notified
    }

    pub fn last_seen(&self) -> Option<&FieldValue> {
        self.last_seen.as_ref()
    }

    pub fn previous(&self) -> Option<&FieldValue> {
        self.previous.as_ref()
    }

    /// True once a baseline has been stored
    pub fn is_initialized(&self) -> bool {
        self.last_seen.is_some()
    }
}
