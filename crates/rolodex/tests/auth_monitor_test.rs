use anyhow::Result;
use rolodex::{AuthSessionMonitor, Identity, IdentityEvent};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::timeout;

fn uid(event: &IdentityEvent) -> Option<String> {
    event.as_ref().map(|identity| identity.uid().to_string())
}

#[tokio::test]
async fn test_observe_replays_then_delivers_every_transition() -> Result<()> {
    let monitor = AuthSessionMonitor::new();
    monitor.publish(Some(Identity::new("alice")));

    let (tx, mut rx) = mpsc::unbounded_channel();
    let subscription = monitor.observe(move |event| {
        let _ = tx.send(uid(&event));
    });

    monitor.publish(None);
    monitor.publish(Some(Identity::new("bob")));

    let mut seen = Vec::new();
    for _ in 0..3 {
        seen.push(timeout(Duration::from_secs(1), rx.recv()).await?.flatten());
    }
    assert_eq!(
        seen,
        vec![Some("alice".to_string()), None, Some("bob".to_string())]
    );
    assert!(subscription.is_active());

    Ok(())
}

#[tokio::test]
async fn test_cancel_is_idempotent_and_stops_delivery() -> Result<()> {
    let monitor = AuthSessionMonitor::new();
    let seen = Arc::new(Mutex::new(Vec::new()));

    let subscription = {
        let seen = seen.clone();
        monitor.observe(move |event| seen.lock().unwrap().push(uid(&event)))
    };
    assert_eq!(monitor.subscriber_count(), 1);

    assert!(subscription.cancel());
    assert!(!subscription.cancel());
    assert!(!subscription.is_active());
    assert_eq!(monitor.subscriber_count(), 0);

    monitor.publish(Some(Identity::new("alice")));
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(seen.lock().unwrap().is_empty());

    Ok(())
}

#[tokio::test]
async fn test_dropping_subscription_unregisters() -> Result<()> {
    let monitor = AuthSessionMonitor::new();
    {
        let _subscription = monitor.observe(|_| {});
        assert_eq!(monitor.subscriber_count(), 1);
    }
    assert_eq!(monitor.subscriber_count(), 0);

    Ok(())
}

#[tokio::test]
async fn test_current_tracks_latest_identity() -> Result<()> {
    let monitor = AuthSessionMonitor::new();
    assert!(monitor.current().is_none());
    assert!(!monitor.has_state());

    monitor.publish(Some(Identity::with_token("alice", "t1")));
    assert_eq!(
        monitor.current().and_then(|i| i.id_token().map(String::from)),
        Some("t1".to_string())
    );

    Ok(())
}
