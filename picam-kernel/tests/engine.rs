//! Engine behaviour under tokio's paused clock: polling cadence, probe
//! independence, action convergence and the snapshot cache.

use picam_devkit::TestHarness;
use picam_kernel::engine::EngineError;
use std::time::Duration;
use tokio::time::{advance, sleep, Instant};

#[tokio::test(start_paused = true)]
async fn first_cycle_fills_every_device() {
    let h = TestHarness::new(&["a", "b"]);
    h.camera_up("a").host_up("a");
    h.camera_down("b").host_down("b");

    let poller = h.engine.start();
    assert_eq!(poller.len(), 2);
    sleep(Duration::from_millis(100)).await;

    for st in h.engine.list_devices() {
        assert!(st.last_checked.is_some(), "{} never polled", st.id);
        assert!(st.host_info.is_some() ^ st.host_error.is_some());
    }
    let a = h.engine.get_device("a").unwrap();
    assert!(a.service_reachable && a.host_reachable);
    let b = h.engine.get_device("b").unwrap();
    assert!(!b.service_reachable && !b.host_reachable);

    poller.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn poller_keeps_cadence_per_device() {
    let h = TestHarness::new(&["a"]);
    h.camera_down("a").host_down("a");

    let poller = h.engine.start();
    sleep(Duration::from_millis(100)).await;
    assert_eq!(h.status_fetches("a"), 1);

    // 5s d'intervalle : ticks à 0, 5, 10
    sleep(Duration::from_secs(10)).await;
    assert_eq!(h.status_fetches("a"), 3);
    assert_eq!(poller.running(), 1);

    poller.shutdown().await;
    sleep(Duration::from_secs(20)).await;
    assert_eq!(h.status_fetches("a"), 3);
}

#[tokio::test(start_paused = true)]
async fn camera_down_host_up_are_reported_independently() {
    let h = TestHarness::new(&["a"]);
    h.camera_down("a").host_up("a");

    let st = h.engine.poll_device("a").await.unwrap();
    assert!(!st.service_reachable);
    assert!(st.service_status.is_none());
    assert!(st.service_error.as_deref().unwrap().contains("timeout"));
    assert!(st.host_reachable);
    assert_eq!(st.host_info.as_ref().unwrap().mem_pct, 37);
    assert!(st.host_error.is_none());
}

#[tokio::test(start_paused = true)]
async fn camera_up_host_down_are_reported_independently() {
    let h = TestHarness::new(&["a"]);
    h.camera_up("a").host_down("a");

    let st = h.engine.poll_device("a").await.unwrap();
    assert!(st.service_reachable);
    assert!(st.service_status.is_some());
    assert!(!st.host_reachable);
    assert!(st.host_info.is_none());
    assert!(st.host_error.as_deref().unwrap().contains("No route to host"));
}

#[tokio::test(start_paused = true)]
async fn malformed_status_payload_counts_as_unreachable() {
    let h = TestHarness::new(&["a"]);
    h.host_up("a");
    h.http.set_json(&picam_devkit::fixtures::status_url("a"), serde_json::json!({"name": "a"}));

    let st = h.engine.poll_device("a").await.unwrap();
    assert!(!st.service_reachable);
    assert!(st.service_error.as_deref().unwrap().contains("Invalid status payload"));
}

#[tokio::test(start_paused = true)]
async fn one_device_failing_does_not_touch_another() {
    let h = TestHarness::new(&["a", "b"]);
    h.camera_up("a").host_up("a");
    h.camera_down("b").host_down("b");

    h.engine.poll_device("b").await.unwrap();
    let a = h.engine.get_device("a").unwrap();
    assert!(a.last_checked.is_none());
    assert!(a.service_error.is_none());
}

#[tokio::test(start_paused = true)]
async fn slow_device_does_not_hold_back_the_others() {
    let h = TestHarness::new(&["slow", "fast"]);
    h.camera_up("slow").camera_slow("slow", Duration::from_secs(4)).host_up("slow");
    h.camera_up("fast").host_up("fast");

    let poller = h.engine.start();
    sleep(Duration::from_millis(100)).await;

    let fast = h.engine.get_device("fast").unwrap();
    assert!(fast.last_checked.is_some());
    assert!(fast.service_reachable && fast.host_reachable);
    assert!(h.engine.get_device("slow").unwrap().last_checked.is_none());

    // 2e tick de `fast` à 5s pendant que `slow` finit son 1er cycle à 4s
    sleep(Duration::from_secs(5)).await;
    assert_eq!(h.status_fetches("fast"), 2);
    assert!(h.engine.get_device("slow").unwrap().service_reachable);

    poller.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn late_cycle_never_overwrites_a_newer_one() {
    let h = TestHarness::new(&["a"]);
    h.camera_down("a").camera_slow("a", Duration::from_secs(3)).host_up("a");

    let engine = h.engine.clone();
    let late = tokio::spawn(async move { engine.poll_device("a").await });
    sleep(Duration::from_secs(1)).await;

    // le service revient ; poll forcé pendant que le premier cycle est en vol
    h.camera_slow("a", Duration::ZERO).camera_up("a");
    let fresh = h.engine.poll_device("a").await.unwrap();
    assert!(fresh.service_reachable);

    let returned = late.await.unwrap().unwrap();
    assert!(returned.service_reachable);
    let st = h.engine.get_device("a").unwrap();
    assert!(st.service_reachable);
    assert!(st.service_error.is_none());
    assert_eq!(st.last_checked, fresh.last_checked);
}

#[tokio::test(start_paused = true)]
async fn disable_mode_twice_is_idempotent() {
    let h = TestHarness::new(&["a"]);
    h.camera_up_with_mode("a", false).host_up("a");
    h.executor.actions_succeed();

    for _ in 0..2 {
        let st = h.engine.perform_action("a", "disable-mode").await.unwrap();
        assert!(st.service_reachable);
        assert!(!st.service_status.as_ref().unwrap().hdr);
        assert!(st.last_action_error.is_none());
    }

    let actions = h.executor.action_calls();
    assert_eq!(actions.len(), 2);
    assert!(actions.iter().all(|c| c.command.contains("HDR=0") && c.command.contains("systemctl restart")));
}

#[tokio::test(start_paused = true)]
async fn restart_returns_as_soon_as_service_is_back() {
    let h = TestHarness::new(&["a"]);
    h.camera_up_after("a", Duration::from_secs(6)).host_up("a");
    h.executor.actions_succeed();

    let started = Instant::now();
    let st = h.engine.perform_action("a", "restart").await.unwrap();
    let took = started.elapsed();

    assert!(st.service_reachable);
    assert!(st.last_action_error.is_none());
    assert!(took >= Duration::from_secs(6));
    assert!(took < Duration::from_secs(10), "waited {took:?}");
    // polls forcés à 3s puis 6s
    assert_eq!(h.status_fetches("a"), 2);
}

#[tokio::test(start_paused = true)]
async fn start_gives_up_after_deadline_without_action_error() {
    let h = TestHarness::new(&["a"]);
    h.camera_down("a").host_up("a");
    h.executor.actions_succeed();

    let started = Instant::now();
    let st = h.engine.perform_action("a", "start").await.unwrap();
    let took = started.elapsed();

    assert!(!st.service_reachable);
    assert!(st.last_action_error.is_none());
    assert!(took >= Duration::from_secs(30));
    assert!(took < Duration::from_secs(34), "waited {took:?}");
    assert_eq!(h.executor.action_calls().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn stop_settles_then_polls_once() {
    let h = TestHarness::new(&["a"]);
    h.camera_down("a").host_up("a");
    h.executor.actions_succeed();

    let started = Instant::now();
    let st = h.engine.perform_action("a", "stop").await.unwrap();
    let took = started.elapsed();

    assert!(!st.service_reachable);
    assert!(st.host_reachable);
    assert!(took >= Duration::from_millis(1500) && took < Duration::from_secs(3));
    assert_eq!(h.status_fetches("a"), 1);
    assert_eq!(h.executor.action_calls()[0].command, "sudo systemctl stop picamera");
}

#[tokio::test(start_paused = true)]
async fn invalid_action_never_reaches_the_device() {
    let h = TestHarness::new(&["a"]);
    h.camera_up("a").host_up("a");
    let before = h.engine.get_device("a").unwrap();

    let err = h.engine.perform_action("a", "reboot").await.unwrap_err();
    assert!(matches!(err, EngineError::InvalidAction(ref a) if a == "reboot"));
    assert_eq!(h.executor.call_count(), 0);
    assert_eq!(h.http.total_calls(), 0);
    assert_eq!(h.engine.get_device("a").unwrap().last_checked, before.last_checked);
}

#[tokio::test(start_paused = true)]
async fn failed_command_records_error_then_next_action_clears_it() {
    let h = TestHarness::new(&["a"]);
    h.camera_up("a").host_up("a");
    h.executor.respond(
        "systemctl",
        Err(picam_kernel::RemoteExecutionError::NonZeroExit {
            code: 5,
            output: "Failed to start picamera.service: Unit picamera.service not found.".into(),
        }),
    );

    let (message, state) = match h.engine.perform_action("a", "start").await {
        Err(EngineError::ActionFailed { message, state }) => (message, state),
        other => panic!("expected ActionFailed, got {other:?}"),
    };
    assert!(message.contains("code 5"));
    let state = state.unwrap();
    assert_eq!(state.last_action_error.as_deref(), Some(message.as_str()));
    // poll best-effort effectué malgré l'échec
    assert!(state.last_checked.is_some());
    assert!(state.service_reachable);

    h.executor.actions_succeed();
    let st = h.engine.perform_action("a", "restart").await.unwrap();
    assert!(st.last_action_error.is_none());
}

#[tokio::test(start_paused = true)]
async fn unknown_device_is_not_found_everywhere() {
    let h = TestHarness::new(&["a"]);
    h.camera_up("a").host_up("a");
    h.executor.actions_succeed();
    let before: Vec<_> = h.engine.list_devices().into_iter().map(|s| (s.id, s.last_checked)).collect();

    assert!(matches!(h.engine.get_device("ghost"), Err(EngineError::NotFound(_))));
    assert!(matches!(h.engine.poll_device("ghost").await, Err(EngineError::NotFound(_))));
    assert!(matches!(h.engine.get_snapshot("ghost").await, Err(EngineError::NotFound(_))));
    assert!(matches!(h.engine.perform_action("ghost", "start").await, Err(EngineError::NotFound(_))));
    assert!(matches!(h.engine.perform_action("ghost", "reboot").await, Err(EngineError::NotFound(_))));
    assert!(matches!(h.engine.unit_status("ghost").await, Err(EngineError::NotFound(_))));

    let after: Vec<_> = h.engine.list_devices().into_iter().map(|s| (s.id, s.last_checked)).collect();
    assert_eq!(before, after);
    assert_eq!(h.executor.call_count(), 0);
    assert_eq!(h.http.total_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn snapshot_is_cached_then_served_stale_on_failure() {
    let h = TestHarness::new(&["a"]);
    h.snapshot("a", b"frame-1");

    let first = h.engine.get_snapshot("a").await.unwrap();
    assert_eq!(first.data, b"frame-1");
    assert_eq!(first.content_type, "image/jpeg");
    assert_eq!(h.snapshot_fetches("a"), 1);
    assert!(h.engine.get_device("a").unwrap().snapshot_fetched.is_some());

    // T+5s : encore frais, pas de fetch
    advance(Duration::from_secs(5)).await;
    assert_eq!(h.engine.get_snapshot("a").await.unwrap().data, b"frame-1");
    assert_eq!(h.snapshot_fetches("a"), 1);

    // T+11s : expiré, fetch tenté, échec => image périmée servie
    advance(Duration::from_secs(6)).await;
    h.snapshot_down("a");
    let stale = h.engine.get_snapshot("a").await.unwrap();
    assert_eq!(stale.data, b"frame-1");
    assert!(stale.age() >= Duration::from_secs(11));
    assert_eq!(h.snapshot_fetches("a"), 2);

    // le Pi revient : l'entrée est remplacée
    h.snapshot("a", b"frame-2");
    assert_eq!(h.engine.get_snapshot("a").await.unwrap().data, b"frame-2");
    assert_eq!(h.snapshot_fetches("a"), 3);
}

#[tokio::test(start_paused = true)]
async fn snapshot_without_cache_is_unavailable() {
    let h = TestHarness::new(&["a"]);
    h.snapshot_down("a");

    let err = h.engine.get_snapshot("a").await.unwrap_err();
    assert!(matches!(err, EngineError::SnapshotUnavailable(ref m) if m.contains("no snapshot available")));
}

#[tokio::test(start_paused = true)]
async fn unit_status_returns_raw_output() {
    let h = TestHarness::new(&["a"]);
    h.executor.respond("is-active", Ok("inactive".into()));

    assert_eq!(h.engine.unit_status("a").await.unwrap(), "inactive");
    assert!(h.executor.calls()[0].command.starts_with("systemctl is-active picamera"));
}
