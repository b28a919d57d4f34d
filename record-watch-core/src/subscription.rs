//! Change-event subscription management
//!
//! Keeps at most one live subscription to the change-event channel of the
//! watched object type and forwards messages that mention the watched record.

use crate::types::Result;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Callback invoked by the transport for every message on a channel
pub type MessageHandler = Arc<dyn Fn(&Value) + Send + Sync>;

/// Callback invoked by the transport on asynchronous transport errors
pub type ErrorCallback = Arc<dyn Fn(&str) + Send + Sync>;

/// Callback invoked when a message targets the watched record
pub type MatchCallback = Arc<dyn Fn() + Send + Sync>;

const CHANNEL_PREFIX: &str = "/data/";
const CUSTOM_SUFFIX: &str = "__c";

/// Transport cursor selecting which events a subscription receives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplayMarker(pub i64);

impl ReplayMarker {
    /// Only events published after the subscription was made
    pub const NEW_EVENTS_ONLY: ReplayMarker = ReplayMarker(-1);
}

/// Opaque reference to one live channel subscription
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle {
    channel: String,
    id: u64,
}

impl SubscriptionHandle {
    pub fn new(channel: impl Into<String>, id: u64) -> Self {
        Self {
            channel: channel.into(),
            id,
        }
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    pub fn id(&self) -> u64 {
        self.id
    }
}

impl fmt::Display for SubscriptionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.channel, self.id)
    }
}

/// Pub/sub transport delivering change events
#[async_trait]
pub trait ChangeEventTransport: Send + Sync {
    /// Register a callback for transport-level errors
    fn on_error(&self, callback: ErrorCallback);

    /// Subscribe `handler` to `channel` starting at `replay`
    async fn subscribe(
        &self,
        channel: &str,
        replay: ReplayMarker,
        handler: MessageHandler,
    ) -> Result<SubscriptionHandle>;

    /// Cancel a subscription
    async fn unsubscribe(&self, handle: SubscriptionHandle) -> Result<()>;
}

/// Change-event channel for an object type
///
/// `Invoice__c` maps to `/data/Invoice__ChangeEvent`, `Account` to
/// `/data/AccountChangeEvent`.
pub fn channel_for(object_name: Option<&str>) -> Option<String> {
    let name = object_name.filter(|n| !n.is_empty())?;
    match name.strip_suffix(CUSTOM_SUFFIX) {
        Some(base) => Some(format!("{}{}__ChangeEvent", CHANNEL_PREFIX, base)),
        None => Some(format!("{}{}ChangeEvent", CHANNEL_PREFIX, name)),
    }
}

/// Record ids listed in a change-event message header
///
/// Any missing or malformed segment yields an empty list.
pub fn record_ids(message: &Value) -> Vec<&str> {
    message
        .pointer("/data/payload/ChangeEventHeader/recordIds")
        .and_then(Value::as_array)
        .map(|ids| ids.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default()
}

/// True if the message lists `record_id` among the changed records
pub fn targets_record(message: &Value, record_id: &str) -> bool {
    record_ids(message).contains(&record_id)
}

/// Build a change-event message for the given records
pub fn change_event_message(change_type: &str, ids: &[&str]) -> Value {
    json!({
        "data": {
            "payload": {
                "ChangeEventHeader": {
                    "changeType": change_type,
                    "recordIds": ids,
                }
            }
        }
    })
}

/// Owner of the (at most one) live subscription of a notifier
pub struct SubscriptionManager {
    transport: Arc<dyn ChangeEventTransport>,
    handle: Option<SubscriptionHandle>,
    /// Cleared on teardown so a lingering transport handler goes quiet
    live: Arc<AtomicBool>,
    debug: bool,
}

impl SubscriptionManager {
    pub fn new(transport: Arc<dyn ChangeEventTransport>, debug: bool) -> Self {
        Self {
            transport,
            handle: None,
            live: Arc::new(AtomicBool::new(false)),
            debug,
        }
    }

    pub fn is_subscribed(&self) -> bool {
        self.handle.is_some()
    }

    pub fn handle(&self) -> Option<&SubscriptionHandle> {
        self.handle.as_ref()
    }

    /// Subscribe to `channel`, forwarding messages about `record_id` to `on_match`
    ///
    /// Does nothing when the channel or record id is missing or a subscription
    /// already exists. A failed subscribe is logged and leaves the manager
    /// unsubscribed.
    pub async fn activate(
        &mut self,
        channel: Option<&str>,
        record_id: Option<&str>,
        on_match: MatchCallback,
    ) {
        let (Some(channel), Some(record_id)) = (channel, record_id) else {
            watch_debug!(
                self.debug,
                "Change events not enabled - channel: {:?}, record: {:?}",
                channel,
                record_id
            );
            return;
        };

        if let Some(handle) = &self.handle {
            watch_debug!(self.debug, "Already subscribed as {}", handle);
            return;
        }

        watch_debug!(self.debug, "Subscribing to {} for record {}", channel, record_id);

        let debug = self.debug;
        self.transport.on_error(Arc::new(move |error: &str| {
            watch_warn!(debug, "Change-event transport error: {}", error);
        }));

        let live = Arc::new(AtomicBool::new(true));
        self.live = live.clone();

        let handler = message_filter(record_id.to_string(), live.clone(), on_match, self.debug);

        match self
            .transport
            .subscribe(channel, ReplayMarker::NEW_EVENTS_ONLY, handler)
            .await
        {
            Ok(handle) => {
                watch_debug!(self.debug, "Subscribed as {} for record {}", handle, record_id);
                self.handle = Some(handle);
            }
            Err(e) => {
                live.store(false, Ordering::SeqCst);
                watch_warn!(self.debug, "Failed to subscribe to {}: {}", channel, e);
            }
        }
    }

    /// Tear down the subscription, if any
    ///
    /// The handle is cleared whatever the transport reports; calling this
    /// without a subscription is a no-op.
    pub async fn deactivate(&mut self) {
        self.live.store(false, Ordering::SeqCst);

        let Some(handle) = self.handle.take() else {
            return;
        };

        match self.transport.unsubscribe(handle.clone()).await {
            Ok(()) => watch_debug!(self.debug, "Unsubscribed {}", handle),
            Err(e) => watch_warn!(self.debug, "Failed to unsubscribe {}: {}", handle, e),
        }
    }
}

fn message_filter(
    record_id: String,
    live: Arc<AtomicBool>,
    on_match: MatchCallback,
    debug: bool,
) -> MessageHandler {
    Arc::new(move |message: &Value| {
        if !live.load(Ordering::SeqCst) {
            return;
        }

        if targets_record(message, &record_id) {
            watch_debug!(debug, "Change event for record {}", record_id);
            on_match();
        } else {
            watch_debug!(
                debug,
                "Change event for {:?} ignored, watching {}",
                record_ids(message),
                record_id
            );
        }
    })
}
