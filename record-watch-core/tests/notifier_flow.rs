// End-to-end flow: change event -> refetch -> delivery -> toast -> refresh
use record_watch_core::{
    change_event_message, Decision, InMemoryTransport, Notifier, RecordData, RecordSource,
    RecordingSource, ToastVariant, TokioTimer, WatchConfig, WatchEvent,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

fn invoice_config() -> WatchConfig {
    WatchConfig::new("Invoice__c", "a01X", "Stage__c")
        .with_title("{objectName} updated")
        .with_message("Stage moved from {oldValue} to {newValue}")
        .with_variant(ToastVariant::Success)
        .with_refresh(1000)
        .with_debug(true)
}

fn stage(value: &str) -> RecordData {
    RecordData::new("a01X").with_field("Stage__c", value)
}

#[tokio::test(start_paused = true)]
async fn change_event_round_trip_with_delayed_refresh() {
    let _ = env_logger::builder().is_test(true).try_init();

    let source = Arc::new(RecordingSource::new());
    let transport = Arc::new(InMemoryTransport::new());
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut notifier = Notifier::new(
        invoice_config(),
        source.clone(),
        transport.clone(),
        Arc::new(TokioTimer::current().unwrap()),
        tx,
    );

    notifier.activate().await;
    assert!(notifier.is_subscribed());

    assert_eq!(notifier.on_record(Ok(stage("Draft"))), Some(Decision::Baseline));

    // The transport only asks for a refetch; the host feeds the fresh value back
    let delivered = transport.publish(
        "/data/Invoice__ChangeEvent",
        &change_event_message("UPDATE", &["a01X", "a01Y"]),
    );
    assert_eq!(delivered, 1);
    assert_eq!(source.refetch_count(), 1);
    assert!(rx.try_recv().is_err());

    let decision = notifier.on_record(Ok(stage("Sent")));
    assert!(matches!(decision, Some(Decision::Notify { .. })));

    match rx.try_recv() {
        Ok(WatchEvent::Toast(toast)) => {
            assert_eq!(toast.title, "Invoice__c updated");
            assert_eq!(toast.message, "Stage moved from Draft to Sent");
            assert_eq!(toast.variant, ToastVariant::Success);
        }
        other => panic!("expected a toast, got {:?}", other),
    }

    let start = tokio::time::Instant::now();
    assert_eq!(rx.recv().await, Some(WatchEvent::Refresh));
    assert!(start.elapsed() >= Duration::from_millis(1000));

    notifier.deactivate().await;
    assert_eq!(transport.active_subscriptions(), 0);

    // Nothing is forwarded once the subscription is gone
    transport.publish(
        "/data/Invoice__ChangeEvent",
        &change_event_message("UPDATE", &["a01X"]),
    );
    assert_eq!(source.refetch_count(), 1);
}

#[tokio::test]
async fn record_ids_not_watched_are_ignored() {
    let source = Arc::new(RecordingSource::new());
    let transport = Arc::new(InMemoryTransport::new());
    let (tx, _rx) = mpsc::unbounded_channel();
    let mut notifier = Notifier::new(
        invoice_config(),
        source.clone(),
        transport.clone(),
        Arc::new(record_watch_core::ManualTimer::new()),
        tx,
    );
    notifier.activate().await;

    for message in [
        change_event_message("UPDATE", &["c"]),
        change_event_message("UPDATE", &[]),
        serde_json::json!({"data": {"payload": {}}}),
    ] {
        transport.publish("/data/Invoice__ChangeEvent", &message);
    }
    assert_eq!(source.refetch_count(), 0);

    notifier.request_refetch();
    assert_eq!(source.refetch_count(), 1);
}

#[tokio::test]
async fn numeric_and_text_values_are_distinct() {
    // Current behaviour: a number replaced by its string form is a transition
    let source: Arc<dyn RecordSource> = Arc::new(RecordingSource::new());
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut notifier = Notifier::new(
        WatchConfig::new("Account", "001", "Score__c").with_message("{oldValue}->{newValue}"),
        source,
        Arc::new(InMemoryTransport::new()),
        Arc::new(record_watch_core::ManualTimer::new()),
        tx,
    );
    notifier.activate().await;

    notifier.on_record(Ok(RecordData::new("001").with_field("Score__c", 0_i64)));
    notifier.on_record(Ok(RecordData::new("001").with_field("Score__c", "0")));

    match rx.try_recv() {
        Ok(WatchEvent::Toast(toast)) => assert_eq!(toast.message, "0->0"),
        other => panic!("expected a toast, got {:?}", other),
    }
}
