//! Watch configuration types
//!
//! A `WatchConfig` is supplied when a notifier activates and never changes
//! afterwards. Every option has a default so a partial TOML/JSON table is
//! enough to describe a watch.

use crate::types::{Result, ToastMode, ToastVariant, WatchError};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for watching one field on one record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatchConfig {
    /// Object type API name (e.g. "Account", "Invoice__c")
    #[serde(default)]
    pub object_name: Option<String>,

    /// Id of the watched record
    #[serde(default)]
    pub record_id: Option<String>,

    /// API name of the watched field
    #[serde(default)]
    pub field_name: String,

    /// Toast title, may contain merge tokens
    #[serde(default = "default_title")]
    pub title: String,

    /// Toast message, may contain merge tokens
    #[serde(default = "default_message")]
    pub message: String,

    #[serde(default)]
    pub variant: ToastVariant,

    #[serde(default)]
    pub mode: ToastMode,

    /// Emit a view refresh after each notification
    #[serde(default)]
    pub refresh_view: bool,

    /// Delay before the refresh is emitted (default: 1000ms)
    #[serde(default = "default_refresh_delay")]
    pub refresh_delay_ms: u64,

    /// Only the first transition of an activation produces a toast
    #[serde(default)]
    pub notify_once: bool,

    /// Enable debug logging for this watch
    #[serde(default)]
    pub debug: bool,

    /// Text substituted for null or empty values
    #[serde(default = "default_empty_placeholder")]
    pub empty_placeholder: String,
}

fn default_title() -> String {
    "Notification".to_string()
}

fn default_message() -> String {
    "The field was updated".to_string()
}

fn default_refresh_delay() -> u64 {
    1000
}

fn default_empty_placeholder() -> String {
    "empty".to_string()
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            object_name: None,
            record_id: None,
            field_name: String::new(),
            title: default_title(),
            message: default_message(),
            variant: ToastVariant::default(),
            mode: ToastMode::default(),
            refresh_view: false,
            refresh_delay_ms: default_refresh_delay(),
            notify_once: false,
            debug: false,
            empty_placeholder: default_empty_placeholder(),
        }
    }
}

impl WatchConfig {
    /// Create a watch for `field_name` on the given record
    pub fn new(
        object_name: impl Into<String>,
        record_id: impl Into<String>,
        field_name: impl Into<String>,
    ) -> Self {
        Self {
            object_name: Some(object_name.into()),
            record_id: Some(record_id.into()),
            field_name: field_name.into(),
            ..Self::default()
        }
    }

    /// Builder method: set the title template
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Builder method: set the message template
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Builder method: set the toast variant
    pub fn with_variant(mut self, variant: ToastVariant) -> Self {
        self.variant = variant;
        self
    }

    /// Builder method: set the toast mode
    pub fn with_mode(mut self, mode: ToastMode) -> Self {
        self.mode = mode;
        self
    }

    /// Builder method: enable the view refresh with the given delay
    pub fn with_refresh(mut self, delay_ms: u64) -> Self {
        self.refresh_view = true;
        self.refresh_delay_ms = delay_ms;
        self
    }

    /// Builder method: only notify on the first transition
    pub fn with_notify_once(mut self, enabled: bool) -> Self {
        self.notify_once = enabled;
        self
    }

    /// Builder method: enable debug logging
    pub fn with_debug(mut self, enabled: bool) -> Self {
        self.debug = enabled;
        self
    }

    /// Builder method: set the placeholder for empty values
    pub fn with_empty_placeholder(mut self, placeholder: impl Into<String>) -> Self {
        self.empty_placeholder = placeholder.into();
        self
    }

    /// A watch needs both a record id and an object type
    ///
    /// Empty strings count as missing.
    pub fn is_enabled(&self) -> bool {
        let present = |s: &Option<String>| s.as_deref().is_some_and(|s| !s.is_empty());
        present(&self.object_name) && present(&self.record_id)
    }

    /// Fully qualified field paths requested from the data source
    pub fn field_paths(&self) -> Vec<String> {
        match &self.object_name {
            Some(object) => vec![format!("{}.{}", object, self.field_name)],
            None => Vec::new(),
        }
    }

    pub fn refresh_delay(&self) -> Duration {
        Duration::from_millis(self.refresh_delay_ms)
    }

    /// Check the names of an enabled watch
    ///
    /// A disabled watch is always valid: it simply never does anything.
    pub fn validate(&self) -> Result<()> {
        if !self.is_enabled() {
            return Ok(());
        }

        if self.field_name.is_empty() {
            return Err(WatchError::InvalidConfig("field name is empty".to_string()));
        }
        check_api_name("field name", &self.field_name)?;

        if let Some(object) = &self.object_name {
            check_api_name("object name", object)?;
        }

        Ok(())
    }
}

fn check_api_name(what: &str, name: &str) -> Result<()> {
    if name.chars().any(|c| c.is_whitespace() || c == '.') {
        return Err(WatchError::InvalidConfig(format!(
            "{} '{}' is not a valid API name",
            what, name
        )));
    }
    Ok(())
}
