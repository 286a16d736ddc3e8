mod common;

use std::time::{Duration, Instant};

use common::{Call, FailureKind, FakeConnector, QueueFile};
use obs_show_sync::{
    config::Config,
    control::CallErrorPolicy,
    dispatch::TickOutcome,
    session::Session,
};

/// Ahead of the wall clock, so a failed connect is stamped with the instant the
/// test passed in rather than the real time it returned.
fn synthetic_now() -> Instant {
    Instant::now() + Duration::from_secs(3600)
}

fn config_for(queue: &QueueFile) -> Config {
    Config {
        queue_path: queue.path.clone(),
        ..Config::default()
    }
}

#[test]
fn startup_connect_failure_retries_after_delay_while_polling_continues() {
    let queue = QueueFile::new();
    queue.write_item("a1", "One", "", "");

    let connector = FakeConnector::failing(1);
    let mut session = Session::new(&config_for(&queue), connector.clone());
    let t0 = synthetic_now();

    session.start(t0);
    assert_eq!(connector.attempts.get(), 1);
    assert!(!session.control().is_connected());
    assert_eq!(session.control().retry_at(), Some(t0 + Duration::from_millis(3000)));

    // Polls even though the link is down.
    let wake = session.step(t0);
    assert_eq!(session.dispatcher().last_seen_id(), Some("a1"));
    assert_eq!(wake, t0 + Duration::from_millis(2000));
    assert_eq!(connector.attempts.get(), 1);

    let wake = session.step(t0 + Duration::from_millis(2000));
    assert_eq!(wake, t0 + Duration::from_millis(3000));
    assert_eq!(connector.attempts.get(), 1);

    session.step(t0 + Duration::from_millis(2999));
    assert_eq!(connector.attempts.get(), 1);

    session.step(t0 + Duration::from_millis(3000));
    assert_eq!(connector.attempts.get(), 2);
    assert!(session.control().is_connected());
}

#[test]
fn repeated_failures_keep_the_fixed_delay() {
    let queue = QueueFile::new();
    let connector = FakeConnector::failing(u32::MAX);
    let mut session = Session::new(&config_for(&queue), connector.clone());
    let t0 = synthetic_now();

    session.start(t0);
    for n in 1..=4u32 {
        let retry_at = session.control().retry_at().unwrap();
        assert_eq!(retry_at, t0 + Duration::from_millis(3000) * n);
        session.step(retry_at);
        assert_eq!(connector.attempts.get(), n + 1);
    }
}

#[test]
fn item_changes_are_picked_up_on_the_next_due_poll() {
    let queue = QueueFile::new();
    queue.write_item("a1", "One", "", "");

    let connector = FakeConnector::new();
    let mut session = Session::new(&config_for(&queue), connector.clone());
    let t0 = synthetic_now();
    session.start(t0);
    session.step(t0);
    assert_eq!(connector.calls().len(), 4);

    queue.write_item("b2", "Two", "", "");
    // Not due yet.
    session.step(t0 + Duration::from_millis(1500));
    assert_eq!(connector.calls().len(), 4);

    session.step(t0 + Duration::from_millis(2000));
    assert_eq!(connector.calls().len(), 8);
    assert_eq!(session.dispatcher().last_seen_id(), Some("b2"));
}

#[test]
fn unreadable_queue_does_not_stop_polling() {
    let queue = QueueFile::new();
    queue.write("[{ broken");

    let connector = FakeConnector::new();
    let mut session = Session::new(&config_for(&queue), connector.clone());
    let t0 = synthetic_now();
    session.start(t0);

    assert!(session.tick().is_none());
    let wake = session.step(t0);
    assert_eq!(wake, t0 + Duration::from_millis(2000));

    queue.write_item("a1", "Recovered", "", "");
    session.step(wake);
    assert_eq!(session.dispatcher().last_seen_id(), Some("a1"));
}

#[test]
fn transport_errors_keep_the_link_by_default() {
    let queue = QueueFile::new();
    queue.write_item("a1", "One", "", "");

    let connector = FakeConnector::new();
    connector.call_failure.set(Some(FailureKind::Transport));
    let mut session = Session::new(&config_for(&queue), connector.clone());
    let t0 = synthetic_now();
    session.start(t0);
    session.step(t0);

    assert!(session.control().is_connected());
    assert_eq!(connector.attempts.get(), 1);
    assert_eq!(connector.calls().len(), 4);
}

#[test]
fn reconnect_policy_drops_link_on_transport_error() {
    let queue = QueueFile::new();
    queue.write_item("a1", "One", "", "");

    let connector = FakeConnector::new();
    connector.call_failure.set(Some(FailureKind::Transport));
    let config = Config {
        call_error_policy: CallErrorPolicy::Reconnect,
        ..config_for(&queue)
    };
    let mut session = Session::new(&config, connector.clone());
    let t0 = synthetic_now();
    session.start(t0);
    session.step(t0);

    // First failing call closes the link; the rest of the item goes out offline.
    assert!(!session.control().is_connected());
    assert_eq!(
        connector.calls(),
        vec![
            Call::Text {
                source: "Headline_Text".to_string(),
                text: "One".to_string(),
            },
            Call::Close,
        ]
    );
    assert_eq!(session.control().retry_at(), Some(t0 + Duration::from_millis(3000)));

    connector.call_failure.set(None);
    session.step(t0 + Duration::from_millis(3000));
    assert_eq!(connector.attempts.get(), 2);
    assert!(session.control().is_connected());
}

#[test]
fn reconnect_policy_ignores_remote_rejections() {
    let queue = QueueFile::new();
    queue.write_item("a1", "One", "", "");

    let connector = FakeConnector::new();
    connector.call_failure.set(Some(FailureKind::Remote));
    let config = Config {
        call_error_policy: CallErrorPolicy::Reconnect,
        ..config_for(&queue)
    };
    let mut session = Session::new(&config, connector.clone());
    let t0 = synthetic_now();
    session.start(t0);
    session.step(t0);

    assert!(session.control().is_connected());
    assert_eq!(connector.calls().len(), 4);
}

#[test]
fn shutdown_closes_the_link_and_stays_closed() {
    let queue = QueueFile::new();
    let connector = FakeConnector::new();
    let mut session = Session::new(&config_for(&queue), connector.clone());
    let t0 = synthetic_now();
    session.start(t0);
    assert!(session.control().is_connected());

    session.shutdown();
    assert!(session.control().is_closed());
    assert_eq!(connector.calls(), vec![Call::Close]);

    session.step(t0 + Duration::from_secs(60));
    assert_eq!(connector.attempts.get(), 1);
}

#[test]
fn run_once_dispatches_and_disconnects() {
    let queue = QueueFile::new();
    queue.write_item("a1", "One", "", "");

    let connector = FakeConnector::new();
    let mut session = Session::new(&config_for(&queue), connector.clone());
    let outcome = session.run_once(Instant::now());

    assert!(matches!(outcome, Some(TickOutcome::Dispatched(_))));
    let calls = connector.calls();
    assert_eq!(calls.len(), 5);
    assert_eq!(calls.last(), Some(&Call::Close));
}

#[test]
fn run_returns_on_shutdown_message() {
    let queue = QueueFile::new();
    queue.write_item("a1", "One", "", "");

    let connector = FakeConnector::new();
    let mut session = Session::new(&config_for(&queue), connector.clone());
    let (tx, rx) = crossbeam_channel::bounded::<()>(1);
    tx.send(()).unwrap();

    session.run(&rx);
    assert!(session.control().is_closed());
    assert_eq!(session.dispatcher().last_seen_id(), Some("a1"));
}

#[test]
fn retry_delay_counts_from_when_a_slow_attempt_fails() {
    let queue = QueueFile::new();
    let connector = FakeConnector::failing(1);
    let attempt_time = Duration::from_millis(300);
    connector.connect_delay.set(attempt_time);

    let mut session = Session::new(&config_for(&queue), connector.clone());
    let started = Instant::now();
    session.start(started);
    let returned = Instant::now();

    let retry_at = session.control().retry_at().unwrap();
    assert!(retry_at >= started + attempt_time + Duration::from_millis(3000));
    assert!(retry_at <= returned + Duration::from_millis(3000));

    // The attempt's own duration does not eat into the delay.
    session.step(started + Duration::from_millis(3000));
    assert_eq!(session.control().attempts(), 1);
    session.step(retry_at - Duration::from_millis(1));
    assert_eq!(session.control().attempts(), 1);

    connector.connect_delay.set(Duration::ZERO);
    session.step(retry_at);
    assert_eq!(session.control().attempts(), 2);
    assert!(session.control().is_connected());
}

#[test]
fn real_time_gap_between_failed_attempts_is_at_least_the_delay() {
    let queue = QueueFile::new();
    let connector = FakeConnector::failing(u32::MAX);
    let attempt_time = Duration::from_millis(150);
    let delay = Duration::from_millis(200);
    connector.connect_delay.set(attempt_time);
    let config = Config {
        reconnect_delay: delay,
        ..config_for(&queue)
    };
    let mut session = Session::new(&config, connector.clone());

    let mut last_attempt_started = Instant::now();
    session.start(last_attempt_started);

    let give_up = Instant::now() + Duration::from_secs(10);
    while session.control().attempts() < 3 && Instant::now() < give_up {
        let before = session.control().attempts();
        let now = Instant::now();
        let wake = session.step(now);
        if session.control().attempts() > before {
            // The previous attempt failed no earlier than `attempt_time` after it started.
            let gap = now.duration_since(last_attempt_started);
            assert!(gap >= attempt_time + delay, "next attempt only {gap:?} after previous start");
            last_attempt_started = now;
        }
        std::thread::sleep(wake.saturating_duration_since(Instant::now()));
    }
    assert_eq!(session.control().attempts(), 3);
}
