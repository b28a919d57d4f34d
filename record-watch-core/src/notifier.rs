//! Notifier: the orchestrator
//!
//! Wires the record source, the transition tracker, the templating and the
//! change-event subscription together for one watched record.
//!
//! Every entry point takes `&mut self` and runs to completion, so transition
//! evaluations never interleave. Nothing in here returns an error to the
//! host: failures are logged and degrade to "no notification this time".

use crate::config::WatchConfig;
use crate::scheduler::{RefreshScheduler, Timer};
use crate::source::RecordSource;
use crate::subscription::{channel_for, ChangeEventTransport, MatchCallback, SubscriptionManager};
use crate::template::{self, MergeContext};
use crate::tracker::{Decision, TransitionTracker};
use crate::types::{FieldValue, RecordDelivery, Result, ToastRequest, WatchError, WatchEvent};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;

/// Activation lifecycle of a notifier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifierState {
    Inactive,
    Activating,
    Active,
}

/// Watches one field of one record and emits toasts on transitions
pub struct Notifier {
    config: WatchConfig,
    source: Arc<dyn RecordSource>,
    subscription: SubscriptionManager,
    refresh: RefreshScheduler,
    events: UnboundedSender<WatchEvent>,
    tracker: TransitionTracker,
    state: NotifierState,
    /// False while inactive, when the watch is disabled, or activation failed
    comparing: bool,
    /// Refetch trigger shared by change-event matches and [`Notifier::request_refetch`]
    refetch: Option<MatchCallback>,
}

impl Notifier {
    pub fn new(
        config: WatchConfig,
        source: Arc<dyn RecordSource>,
        transport: Arc<dyn ChangeEventTransport>,
        timer: Arc<dyn Timer>,
        events: UnboundedSender<WatchEvent>,
    ) -> Self {
        let subscription = SubscriptionManager::new(transport, config.debug);
        let refresh = RefreshScheduler::new(timer, events.clone());
        let tracker = TransitionTracker::new(config.notify_once);

        Self {
            config,
            source,
            subscription,
            refresh,
            events,
            tracker,
            state: NotifierState::Inactive,
            comparing: false,
            refetch: None,
        }
    }

    pub fn config(&self) -> &WatchConfig {
        &self.config
    }

    pub fn state(&self) -> NotifierState {
        self.state
    }

    pub fn tracker(&self) -> &TransitionTracker {
        &self.tracker
    }

    pub fn is_subscribed(&self) -> bool {
        self.subscription.is_subscribed()
    }

    /// True when deliveries are compared against the baseline
    pub fn is_comparing(&self) -> bool {
        self.comparing
    }

    /// Attach: start the data-source watch and subscribe to change events
    ///
    /// A disabled or invalid watch, or a failing data source, leaves the
    /// notifier active but silent.
    pub async fn activate(&mut self) {
        if self.state != NotifierState::Inactive {
            watch_debug!(self.config.debug, "Notifier already {:?}", self.state);
            return;
        }

        watch_debug!(
            self.config.debug,
            "Activating watch on {:?} {:?} field {}",
            self.config.object_name,
            self.config.record_id,
            self.config.field_name
        );

        self.state = NotifierState::Activating;
        self.tracker = TransitionTracker::new(self.config.notify_once);

        match self.start_watch() {
            Ok(Some(record_id)) => {
                self.comparing = true;
                let channel = channel_for(self.config.object_name.as_deref());
                let on_match = self.refetch_callback(record_id.clone());
                self.refetch = Some(on_match.clone());
                self.subscription
                    .activate(channel.as_deref(), Some(&record_id), on_match)
                    .await;
            }
            Ok(None) => {
                watch_debug!(self.config.debug, "Watch disabled: object or record id missing");
            }
            Err(e) => {
                watch_warn!(self.config.debug, "Record watch not started: {}", e);
            }
        }

        self.state = NotifierState::Active;
    }

    /// Detach: drop the subscription and the data-source watch
    ///
    /// Safe to call at any time, any number of times. Pending delayed
    /// refreshes are left to fire.
    pub async fn deactivate(&mut self) {
        watch_debug!(self.config.debug, "Deactivating watch for {:?}", self.config.record_id);

        self.subscription.deactivate().await;

        if self.comparing {
            if let Some(record_id) = &self.config.record_id {
                self.source.unwatch(record_id);
            }
        }

        self.comparing = false;
        self.refetch = None;
        self.tracker = TransitionTracker::new(self.config.notify_once);
        self.state = NotifierState::Inactive;
    }

    /// Handle one push from the record data source
    ///
    /// Returns the tracker decision, or `None` when the delivery was not
    /// considered at all (inactive, error, other record, field missing).
    pub fn on_record(&mut self, delivery: RecordDelivery) -> Option<Decision> {
        if !self.comparing {
            return None;
        }

        let data = match delivery {
            Ok(data) => data,
            Err(e) => {
                watch_warn!(
                    self.config.debug,
                    "Record source error for {:?}: {}",
                    self.config.record_id,
                    e
                );
                return None;
            }
        };

        // Stale deliveries for a previously bound record
        let watched = self.config.record_id.as_deref();
        if let (Some(got), Some(watched)) = (data.id.as_deref(), watched) {
            if got != watched {
                watch_debug!(
                    self.config.debug,
                    "Ignoring delivery for {} (watching {})",
                    got,
                    watched
                );
                return None;
            }
        }

        let Some(value) = data.field(&self.config.field_name) else {
            watch_debug!(self.config.debug, "Delivery without field {}", self.config.field_name);
            return None;
        };

        let decision = self.tracker.evaluate(value.clone());
        match &decision {
            Decision::Baseline => {
                watch_debug!(
                    self.config.debug,
                    "Baseline value of {}: {}",
                    self.config.field_name,
                    value
                );
            }
            Decision::Suppressed => {
                watch_debug!(self.config.debug, "No notification for value {}", value);
            }
            Decision::Notify { old, new } => {
                watch_debug!(
                    self.config.debug,
                    "Field {} changed from {} to {}",
                    self.config.field_name,
                    old,
                    new
                );
                match self.emit(old, new) {
                    Ok(()) => self.tracker.mark_notified(),
                    Err(e) => watch_warn!(self.config.debug, "Notification not shown: {}", e),
                }
            }
        }

        Some(decision)
    }

    /// Ask the data source to re-pull the watched record
    ///
    /// The fresh value comes back through [`Notifier::on_record`].
    /// Does nothing unless the notifier is comparing.
    pub fn request_refetch(&self) {
        if let Some(refetch) = &self.refetch {
            refetch();
        }
    }

    /// Render the toast for `old -> new` without emitting it
    pub fn render_toast(&self, old: &FieldValue, new: &FieldValue) -> ToastRequest {
        let context = MergeContext::new(
            Some(old),
            Some(new),
            self.config.record_id.as_deref(),
            self.config.object_name.as_deref(),
            &self.config.empty_placeholder,
        );

        ToastRequest {
            title: self.apply_template(&self.config.title, &context),
            message: self.apply_template(&self.config.message, &context),
            variant: self.config.variant,
            mode: self.config.mode,
        }
    }

    fn apply_template(&self, text: &str, context: &MergeContext) -> String {
        if !template::has_tokens(text) {
            return text.to_string();
        }
        let rendered = template::render(text, context);
        watch_debug!(self.config.debug, "Rendered {:?} as {:?}", text, rendered);
        rendered
    }

    fn emit(&self, old: &FieldValue, new: &FieldValue) -> Result<()> {
        let toast = self.render_toast(old, new);
        watch_debug!(self.config.debug, "Showing toast: {:?}", toast);

        self.events
            .send(WatchEvent::Toast(toast))
            .map_err(|_| WatchError::EmitFailed("toast"))?;

        if self.config.refresh_view {
            let delay = self.config.refresh_delay();
            watch_debug!(self.config.debug, "Scheduling view refresh in {:?}", delay);
            if let Err(e) = self.refresh.schedule_refresh(delay) {
                watch_warn!(self.config.debug, "View refresh not scheduled: {}", e);
            }
        }

        Ok(())
    }

    fn refetch_callback(&self, record_id: String) -> MatchCallback {
        let source = self.source.clone();
        let debug = self.config.debug;
        Arc::new(move || {
            watch_debug!(debug, "Refetching record {}", record_id);
            source.refetch(&record_id);
        })
    }

    /// Validate the config and start the data-source watch
    ///
    /// Returns the watched record id, or `None` for a disabled watch.
    fn start_watch(&self) -> Result<Option<String>> {
        if !self.config.is_enabled() {
            return Ok(None);
        }
        let Some(record_id) = self.config.record_id.clone() else {
            return Ok(None);
        };

        self.config.validate()?;
        self.source.watch(&record_id, &self.config.field_paths())?;
        Ok(Some(record_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::ManualTimer;
    use crate::source::{RecordingSource, SourceCall};
    use crate::subscription::change_event_message;
    use crate::transport::InMemoryTransport;
    use crate::types::{RecordData, ToastMode, ToastVariant};
    use std::time::Duration;
    use tokio::sync::mpsc::{self, UnboundedReceiver};

    struct Harness {
        notifier: Notifier,
        source: Arc<RecordingSource>,
        transport: Arc<InMemoryTransport>,
        timer: Arc<ManualTimer>,
        events: UnboundedReceiver<WatchEvent>,
    }

    fn harness(config: WatchConfig) -> Harness {
        let source = Arc::new(RecordingSource::new());
        let transport = Arc::new(InMemoryTransport::new());
        let timer = Arc::new(ManualTimer::new());
        let (tx, events) = mpsc::unbounded_channel();
        let notifier = Notifier::new(config, source.clone(), transport.clone(), timer.clone(), tx);
        Harness {
            notifier,
            source,
            transport,
            timer,
            events,
        }
    }

    fn status(value: &str) -> RecordDelivery {
        Ok(RecordData::new("500A").with_field("Status", value))
    }

    fn drain(events: &mut UnboundedReceiver<WatchEvent>) -> Vec<WatchEvent> {
        let mut out = Vec::new();
        while let Ok(event) = events.try_recv() {
            out.push(event);
        }
        out
    }

    fn case_config() -> WatchConfig {
        WatchConfig::new("Case", "500A", "Status")
            .with_title("Case {recordId}")
            .with_message("{oldValue} -> {newValue}")
            .with_variant(ToastVariant::Warning)
            .with_mode(ToastMode::Sticky)
    }

    #[tokio::test]
    async fn test_activation_lifecycle() {
        let mut h = harness(case_config());
        assert_eq!(h.notifier.state(), NotifierState::Inactive);

        h.notifier.activate().await;
        assert_eq!(h.notifier.state(), NotifierState::Active);
        assert!(h.notifier.is_subscribed());
        assert!(h.notifier.is_comparing());
        assert_eq!(
            h.source.calls(),
            vec![SourceCall::Watch {
                record_id: "500A".into(),
                field_paths: vec!["Case.Status".into()],
            }]
        );

        h.notifier.deactivate().await;
        assert_eq!(h.notifier.state(), NotifierState::Inactive);
        assert!(!h.notifier.is_subscribed());
        assert_eq!(h.transport.active_subscriptions(), 0);
        assert_eq!(
            h.source.calls().last(),
            Some(&SourceCall::Unwatch { record_id: "500A".into() })
        );
    }

    #[tokio::test]
    async fn test_transition_emits_rendered_toast() {
        let mut h = harness(case_config());
        h.notifier.activate().await;

        assert_eq!(h.notifier.on_record(status("New")), Some(Decision::Baseline));
        assert_eq!(h.notifier.on_record(status("New")), Some(Decision::Suppressed));
        assert!(drain(&mut h.events).is_empty());

        h.notifier.on_record(status("Escalated"));
        assert_eq!(
            drain(&mut h.events),
            vec![WatchEvent::Toast(ToastRequest {
                title: "Case 500A".into(),
                message: "New -> Escalated".into(),
                variant: ToastVariant::Warning,
                mode: ToastMode::Sticky,
            })]
        );
        assert!(h.notifier.tracker().has_notified());
    }

    #[tokio::test]
    async fn test_token_free_templates_pass_through() {
        let config = WatchConfig::new("Case", "500A", "Status")
            .with_title("Heads up")
            .with_message("Status {changed}");
        let mut h = harness(config);
        h.notifier.activate().await;

        h.notifier.on_record(status("New"));
        h.notifier.on_record(status("Closed"));

        match drain(&mut h.events).as_slice() {
            [WatchEvent::Toast(toast)] => {
                assert_eq!(toast.title, "Heads up");
                assert_eq!(toast.message, "Status {changed}");
            }
            other => panic!("unexpected events: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_empty_values_use_placeholder() {
        let config = WatchConfig::new("Case", "500A", "Status")
            .with_message("{oldValue} -> {newValue}")
            .with_empty_placeholder("vazio");
        let mut h = harness(config);
        h.notifier.activate().await;

        h.notifier.on_record(Ok(RecordData::new("500A").with_field("Status", FieldValue::Null)));
        h.notifier.on_record(status("Open"));
        h.notifier.on_record(status(""));

        let messages: Vec<String> = drain(&mut h.events)
            .into_iter()
            .filter_map(|event| match event {
                WatchEvent::Toast(toast) => Some(toast.message),
                WatchEvent::Refresh => None,
            })
            .collect();
        assert_eq!(messages, vec!["vazio -> Open", "Open -> vazio"]);
    }

    #[tokio::test]
    async fn test_deliveries_for_other_records_are_ignored() {
        let mut h = harness(case_config());
        h.notifier.activate().await;

        h.notifier.on_record(status("New"));
        let stale = Ok(RecordData::new("500B").with_field("Status", "Closed"));
        assert_eq!(h.notifier.on_record(stale), None);
        assert_eq!(h.notifier.tracker().last_seen(), Some(&FieldValue::from("New")));
        assert!(drain(&mut h.events).is_empty());
    }

    #[tokio::test]
    async fn test_source_errors_and_missing_fields_are_skipped() {
        let mut h = harness(case_config());
        h.notifier.activate().await;

        assert_eq!(h.notifier.on_record(Err("row lock".into())), None);
        assert_eq!(h.notifier.on_record(Ok(RecordData::new("500A"))), None);
        assert!(!h.notifier.tracker().is_initialized());

        // The next good delivery is still the baseline
        assert_eq!(h.notifier.on_record(status("New")), Some(Decision::Baseline));
    }

    #[tokio::test]
    async fn test_notify_once() {
        let mut h = harness(case_config().with_notify_once(true));
        h.notifier.activate().await;

        h.notifier.on_record(status("A"));
        h.notifier.on_record(status("B"));
        assert_eq!(h.notifier.on_record(status("C")), Some(Decision::Suppressed));
        assert_eq!(h.notifier.on_record(status("A")), Some(Decision::Suppressed));

        assert_eq!(drain(&mut h.events).len(), 1);
        assert_eq!(h.notifier.tracker().last_seen(), Some(&FieldValue::from("A")));
    }

    #[tokio::test]
    async fn test_refresh_is_scheduled_after_delay() {
        let mut h = harness(case_config().with_refresh(1000));
        h.notifier.activate().await;

        h.notifier.on_record(status("A"));
        h.notifier.on_record(status("B"));
        assert!(matches!(drain(&mut h.events).as_slice(), [WatchEvent::Toast(_)]));

        h.timer.advance(Duration::from_millis(999));
        assert!(drain(&mut h.events).is_empty());
        h.timer.advance(Duration::from_millis(1));
        assert_eq!(drain(&mut h.events), vec![WatchEvent::Refresh]);
    }

    #[tokio::test]
    async fn test_zero_delay_refresh_follows_toast() {
        let mut h = harness(case_config().with_refresh(0));
        h.notifier.activate().await;

        h.notifier.on_record(status("A"));
        h.notifier.on_record(status("B"));
        let events = drain(&mut h.events);
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], WatchEvent::Toast(_)));
        assert_eq!(events[1], WatchEvent::Refresh);
        assert_eq!(h.timer.pending(), 0);
    }

    #[tokio::test]
    async fn test_failed_emit_does_not_count_as_notified() {
        let mut h = harness(case_config().with_notify_once(true));
        h.notifier.activate().await;
        h.notifier.on_record(status("A"));

        let (closed_tx, closed_rx) = mpsc::unbounded_channel();
        drop(closed_rx);
        h.notifier.events = closed_tx;

        assert!(matches!(h.notifier.on_record(status("B")), Some(Decision::Notify { .. })));
        assert!(!h.notifier.tracker().has_notified());

        // Later transitions are still evaluated
        assert!(matches!(h.notifier.on_record(status("C")), Some(Decision::Notify { .. })));
    }

    #[tokio::test]
    async fn test_change_event_triggers_refetch_only() {
        let mut h = harness(case_config());
        h.notifier.activate().await;
        h.notifier.on_record(status("A"));

        h.transport.publish("/data/CaseChangeEvent", &change_event_message("UPDATE", &["500A"]));
        h.transport.publish("/data/CaseChangeEvent", &change_event_message("UPDATE", &["500Z"]));

        assert_eq!(h.source.refetch_count(), 1);
        assert!(drain(&mut h.events).is_empty());
        assert_eq!(h.notifier.tracker().last_seen(), Some(&FieldValue::from("A")));
    }

    #[tokio::test]
    async fn test_disabled_watch_does_nothing() {
        let mut config = case_config();
        config.object_name = None;
        let mut h = harness(config);
        h.notifier.activate().await;

        assert_eq!(h.notifier.state(), NotifierState::Active);
        assert!(!h.notifier.is_comparing());
        assert!(!h.notifier.is_subscribed());
        assert!(h.source.calls().is_empty());
        assert_eq!(h.transport.subscribe_calls(), 0);
        assert_eq!(h.notifier.on_record(status("A")), None);

        h.notifier.request_refetch();
        assert_eq!(h.source.refetch_count(), 0);
    }

    #[tokio::test]
    async fn test_empty_record_id_disables_watch() {
        let mut h = harness(WatchConfig::new("Case", "", "Status"));
        h.notifier.activate().await;

        assert_eq!(h.notifier.state(), NotifierState::Active);
        assert!(!h.notifier.is_subscribed());
        assert!(!h.notifier.is_comparing());
        assert!(h.source.calls().is_empty());
        assert_eq!(h.transport.subscribe_calls(), 0);
        assert_eq!(h.notifier.on_record(Ok(RecordData::new("").with_field("Status", "A"))), None);
    }

    #[tokio::test]
    async fn test_manual_and_event_refetch_share_one_path() {
        let mut h = harness(case_config());
        h.notifier.request_refetch();
        assert_eq!(h.source.refetch_count(), 0);

        h.notifier.activate().await;
        h.notifier.request_refetch();
        h.transport.publish("/data/CaseChangeEvent", &change_event_message("UPDATE", &["500A"]));
        assert_eq!(h.source.refetch_count(), 2);

        h.notifier.deactivate().await;
        h.notifier.request_refetch();
        assert_eq!(h.source.refetch_count(), 2);
    }

    #[tokio::test]
    async fn test_invalid_config_degrades_silently() {
        let mut h = harness(WatchConfig::new("Case", "500A", "Bad Field"));
        h.notifier.activate().await;

        assert_eq!(h.notifier.state(), NotifierState::Active);
        assert!(!h.notifier.is_comparing());
        assert_eq!(h.transport.subscribe_calls(), 0);
    }

    #[tokio::test]
    async fn test_failing_source_watch_degrades_silently() {
        let mut h = harness(case_config());
        h.source.fail_watch_with("no access");
        h.notifier.activate().await;

        assert!(!h.notifier.is_comparing());
        assert_eq!(h.notifier.on_record(status("A")), None);
    }

    #[tokio::test]
    async fn test_subscribe_failure_keeps_comparing() {
        let mut h = harness(case_config());
        h.transport.set_fail_subscribe(true);
        h.notifier.activate().await;

        assert!(!h.notifier.is_subscribed());
        assert!(h.notifier.is_comparing());
        h.notifier.on_record(status("A"));
        h.notifier.on_record(status("B"));
        assert_eq!(drain(&mut h.events).len(), 1);
    }

    #[tokio::test]
    async fn test_teardown_is_idempotent() {
        let mut h = harness(case_config());
        h.notifier.deactivate().await;
        h.notifier.activate().await;
        h.notifier.deactivate().await;
        h.notifier.deactivate().await;

        assert!(!h.notifier.is_subscribed());
        assert_eq!(h.transport.unsubscribe_calls(), 1);
        let unwatches = h
            .source
            .calls()
            .iter()
            .filter(|call| matches!(call, SourceCall::Unwatch { .. }))
            .count();
        assert_eq!(unwatches, 1);
    }

    #[tokio::test]
    async fn test_reactivation_starts_from_a_fresh_baseline() {
        let mut h = harness(case_config().with_notify_once(true));
        h.notifier.activate().await;
        h.notifier.on_record(status("A"));
        h.notifier.on_record(status("B"));
        h.notifier.deactivate().await;

        assert_eq!(h.notifier.on_record(status("C")), None);

        h.notifier.activate().await;
        assert_eq!(h.notifier.on_record(status("C")), Some(Decision::Baseline));
        assert!(matches!(h.notifier.on_record(status("D")), Some(Decision::Notify { .. })));
        assert_eq!(drain(&mut h.events).len(), 2);
    }

    #[tokio::test]
    async fn test_pending_refresh_survives_deactivate() {
        let mut h = harness(case_config().with_refresh(500));
        h.notifier.activate().await;
        h.notifier.on_record(status("A"));
        h.notifier.on_record(status("B"));
        h.notifier.deactivate().await;

        h.timer.advance(Duration::from_millis(500));
        let events = drain(&mut h.events);
        assert_eq!(events.last(), Some(&WatchEvent::Refresh));
    }
}
