//! In-memory change-event transport
//!
//! Delivers published messages synchronously to the handlers subscribed to
//! a channel. Used by tests and by the CLI replay.

use crate::subscription::{
    ChangeEventTransport, ErrorCallback, MessageHandler, ReplayMarker, SubscriptionHandle,
};
use crate::types::{Result, WatchError};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Default)]
pub struct InMemoryTransport {
    state: Mutex<TransportState>,
}

#[derive(Default)]
struct TransportState {
    next_id: u64,
    subscriptions: BTreeMap<u64, (String, MessageHandler)>,
    error_callbacks: Vec<ErrorCallback>,
    replay_markers: Vec<ReplayMarker>,
    subscribe_calls: usize,
    unsubscribe_calls: usize,
    fail_subscribe: bool,
    fail_unsubscribe: bool,
}

impl InMemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent subscribe calls fail
    pub fn set_fail_subscribe(&self, fail: bool) {
        self.state.lock().fail_subscribe = fail;
    }

    /// Make subsequent unsubscribe calls fail (the subscription is kept)
    pub fn set_fail_unsubscribe(&self, fail: bool) {
        self.state.lock().fail_unsubscribe = fail;
    }

    /// Deliver `message` to every handler subscribed to `channel`
    ///
    /// Returns the number of handlers invoked.
    pub fn publish(&self, channel: &str, message: &Value) -> usize {
        let handlers: Vec<MessageHandler> = {
            let state = self.state.lock();
            state
                .subscriptions
                .values()
                .filter(|(subscribed, _)| subscribed == channel)
                .map(|(_, handler)| handler.clone())
                .collect()
        };

        for handler in &handlers {
            handler(message);
        }
        handlers.len()
    }

    /// Report a transport error to every registered error callback
    pub fn raise_error(&self, error: &str) {
        let callbacks = self.state.lock().error_callbacks.clone();
        for callback in &callbacks {
            callback(error);
        }
    }

    pub fn active_subscriptions(&self) -> usize {
        self.state.lock().subscriptions.len()
    }

    pub fn replay_markers(&self) -> Vec<ReplayMarker> {
        self.state.lock().replay_markers.clone()
    }

    pub fn error_callbacks(&self) -> usize {
        self.state.lock().error_callbacks.len()
    }

    pub fn subscribe_calls(&self) -> usize {
        self.state.lock().subscribe_calls
    }

    pub fn unsubscribe_calls(&self) -> usize {
        self.state.lock().unsubscribe_calls
    }
}

#[async_trait]
impl ChangeEventTransport for InMemoryTransport {
    fn on_error(&self, callback: ErrorCallback) {
        self.state.lock().error_callbacks.push(callback);
    }

    async fn subscribe(
        &self,
        channel: &str,
        replay: ReplayMarker,
        handler: MessageHandler,
    ) -> Result<SubscriptionHandle> {
        let mut state = self.state.lock();
        state.subscribe_calls += 1;
        state.replay_markers.push(replay);

        if state.fail_subscribe {
            return Err(WatchError::Transport(format!(
                "subscribe to {} rejected",
                channel
            )));
        }

        let id = state.next_id;
        state.next_id += 1;
        state
            .subscriptions
            .insert(id, (channel.to_string(), handler));

        Ok(SubscriptionHandle::new(channel, id))
    }

    async fn unsubscribe(&self, handle: SubscriptionHandle) -> Result<()> {
        let mut state = self.state.lock();
        state.unsubscribe_calls += 1;

        if state.fail_unsubscribe {
            return Err(WatchError::Transport(format!(
                "unsubscribe of {} rejected",
                handle
            )));
        }

        state
            .subscriptions
            .remove(&handle.id())
            .map(|_| ())
            .ok_or_else(|| WatchError::Transport(format!("unknown subscription {}", handle)))
    }
}
