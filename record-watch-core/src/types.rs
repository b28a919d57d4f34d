//! Core types for the record watch library
//!
//! This module defines the values the notifier observes and the events it
//! emits. Collaborator traits live next to the components that consume them.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Result type for record watch operations
pub type Result<T> = std::result::Result<T, WatchError>;

/// Errors that can occur while watching a record
#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    #[error("Invalid watch configuration: {0}")]
    InvalidConfig(String),

    #[error("Change-event transport error: {0}")]
    Transport(String),

    #[error("Record source error: {0}")]
    Source(String),

    #[error("Timer unavailable: {0}")]
    Timer(String),

    #[error("Failed to emit {0}: receiver is gone")]
    EmitFailed(&'static str),
}

/// A scalar field value as delivered by the record data source
///
/// Equality is strict: `Number(0.0)` and `Text("0")` are different values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// Explicit null (a legal field value, unlike "not yet observed")
    Null,
    /// Checkbox / boolean field
    Bool(bool),
    /// Any numeric field (currency, percent, number)
    Number(f64),
    /// Text, picklist, id and date fields
    Text(String),
}

impl FieldValue {
    /// True for values that render as the empty placeholder
    pub fn is_blank(&self) -> bool {
        match self {
            FieldValue::Null => true,
            FieldValue::Text(s) => s.is_empty(),
            _ => false,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Null => write!(f, "null"),
            FieldValue::Bool(v) => write!(f, "{}", v),
            FieldValue::Number(v) => write!(f, "{}", v),
            FieldValue::Text(v) => write!(f, "{}", v),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Number(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Number(value as f64)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Bool(value)
    }
}

/// A single field slot inside a record delivery
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSlot {
    pub value: FieldValue,
}

/// Record data pushed by the data source
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordData {
    /// Id of the record the delivery belongs to
    #[serde(default)]
    pub id: Option<String>,
    /// Field name -> value slot
    #[serde(default)]
    pub fields: HashMap<String, FieldSlot>,
}

impl RecordData {
    /// Create a delivery for `id` with no fields
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            fields: HashMap::new(),
        }
    }

    /// Builder method: add a field value
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(name.into(), FieldSlot { value: value.into() });
        self
    }

    /// Look up the value of a field, if the delivery carries it
    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name).map(|slot| &slot.value)
    }
}

/// One push from the record data source: either data or an error
pub type RecordDelivery = std::result::Result<RecordData, String>;

/// Toast style
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToastVariant {
    #[default]
    Info,
    Success,
    Warning,
    Error,
}

impl fmt::Display for ToastVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ToastVariant::Info => write!(f, "info"),
            ToastVariant::Success => write!(f, "success"),
            ToastVariant::Warning => write!(f, "warning"),
            ToastVariant::Error => write!(f, "error"),
        }
    }
}

/// Toast persistence mode
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToastMode {
    /// Stays until dismissed or a timeout elapses
    #[default]
    Dismissable,
    /// Stays until the user closes it
    Sticky,
    /// Disappears on its own, no close button
    Pester,
}

impl fmt::Display for ToastMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ToastMode::Dismissable => write!(f, "dismissable"),
            ToastMode::Sticky => write!(f, "sticky"),
            ToastMode::Pester => write!(f, "pester"),
        }
    }
}

/// A rendered notification request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToastRequest {
    pub title: String,
    pub message: String,
    pub variant: ToastVariant,
    pub mode: ToastMode,
}

/// Events emitted by the notifier towards the UI
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum WatchEvent {
    /// Show a toast
    Toast(ToastRequest),
    /// Re-render the hosting view
    Refresh,
}
