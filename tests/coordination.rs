/*
 *  tests/coordination.rs
 *
 *  End-to-end producer/consumer scenarios over the mock seams
 *
 *  Vigil - worth the glance
 *  (c) 2020-26 Stuart Hunter
 */

use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use tokio::sync::watch;
use tokio::time::sleep;

use vigil::beacon::MockBeacon;
use vigil::buttons::{MockInput, NavSignal};
use vigil::calendar::{EventRecord, StaticSource};
use vigil::display::MockRenderer;
use vigil::display::mock::RenderOp;
use vigil::monitor::{PresenceConfig, PresenceMonitor};
use vigil::navigator::InputController;
use vigil::refresher::EventRefresher;
use vigil::scheduler::{DisplayScheduler, ScrollConfig};
use vigil::sensor::MockSensor;
use vigil::state::{Presence, SharedState};

const NEAR: f64 = 8.0;
const FAR: f64 = 150.0;

fn record(tag: &str) -> EventRecord {
    EventRecord {
        start: Local::now(),
        summary: tag.to_string(),
        reminder_minutes: 15,
        line1: format!("when {tag}"),
        line2: tag.to_string(),
        line3: "clear sky - 18 °C".to_string(),
    }
}

fn records(n: usize) -> Vec<EventRecord> {
    (0..n).map(|i| record(&format!("E{i}"))).collect()
}

fn fast_presence() -> PresenceConfig {
    PresenceConfig {
        poll_interval: Duration::from_millis(10),
        sample_window: Duration::ZERO,
        sample_gap: Duration::from_millis(1),
        threshold_cm: 20.0,
    }
}

fn fast_scroll() -> ScrollConfig {
    ScrollConfig {
        step_px: 7,
        tick: Duration::from_millis(2),
        start_hold: Duration::ZERO,
        arrow_hold: Duration::from_millis(1),
    }
}

struct Rig {
    state: Arc<SharedState>,
    sensor: MockSensor,
    beacon: MockBeacon,
    renderer: MockRenderer,
    buttons: tokio::sync::mpsc::Sender<NavSignal>,
    shutdown_tx: watch::Sender<bool>,
    tasks: Vec<tokio::task::JoinHandle<()>>,
}

impl Rig {
    /// Spin up monitor, input controller, and scheduler against one
    /// shared state, all on mock hardware. The sensor starts far away,
    /// so the rig comes up asleep like the real daemon.
    fn start(initial_events: Vec<EventRecord>, sleep_timeout: Duration) -> Self {
        let state = Arc::new(SharedState::new(initial_events, 15, sleep_timeout));
        let sensor = MockSensor::at(FAR);
        let beacon = MockBeacon::new();
        let renderer = MockRenderer::new();
        let (input, buttons) = MockInput::new();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let tasks = vec![
            tokio::spawn(
                PresenceMonitor::new(
                    sensor.clone(),
                    beacon.clone(),
                    Arc::clone(&state),
                    fast_presence(),
                    shutdown_rx.clone(),
                )
                .run(),
            ),
            tokio::spawn(
                InputController::new(input, Arc::clone(&state), shutdown_rx.clone()).run(),
            ),
            tokio::spawn(
                DisplayScheduler::new(
                    renderer.clone(),
                    Arc::clone(&state),
                    fast_scroll(),
                    "10.0.0.7\nVigil".to_string(),
                    shutdown_rx,
                )
                .run(),
            ),
        ];

        Self {
            state,
            sensor,
            beacon,
            renderer,
            buttons,
            shutdown_tx,
            tasks,
        }
    }

    async fn stop(self) {
        let _ = self.shutdown_tx.send(true);
        for task in self.tasks {
            let _ = tokio::time::timeout(Duration::from_secs(2), task).await;
        }
    }
}

async fn settle() {
    sleep(Duration::from_millis(150)).await;
}

fn scrollables(ops: &[RenderOp]) -> Vec<String> {
    ops.iter()
        .filter_map(|op| match op {
            RenderOp::Scrollable(_, line2, _) => Some(line2.clone()),
            _ => None,
        })
        .collect()
}

#[tokio::test(flavor = "multi_thread")]
async fn wake_splash_then_two_next_presses_walk_the_cache() {
    let rig = Rig::start(records(3), Duration::from_secs(60));
    settle().await;

    // asleep: only the hide + idle status have hit the renderer
    assert!(!rig.state.is_awake());
    assert_eq!(rig.renderer.hide_count(), 1);

    rig.sensor.set_distance(NEAR);
    settle().await;
    assert!(rig.state.is_awake());
    assert!(rig.beacon.is_lit());

    rig.buttons.send(NavSignal::Next).await.unwrap();
    rig.buttons.send(NavSignal::Next).await.unwrap();
    settle().await;

    assert_eq!(rig.state.cursor(), 2);
    assert_eq!(scrollables(&rig.renderer.ops()), vec!["E0", "E1", "E2"]);

    // third press is a bound no-op: nothing new renders
    rig.buttons.send(NavSignal::Next).await.unwrap();
    settle().await;
    assert_eq!(rig.state.cursor(), 2);
    assert_eq!(scrollables(&rig.renderer.ops()), vec!["E0", "E1", "E2"]);

    rig.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn idle_timeout_sleeps_atomically() {
    let rig = Rig::start(records(3), Duration::from_millis(40));
    settle().await;
    let hides_at_start = rig.renderer.hide_count();

    rig.sensor.set_distance(NEAR);
    settle().await;
    rig.buttons.send(NavSignal::Next).await.unwrap();
    rig.buttons.send(NavSignal::Next).await.unwrap();
    settle().await;
    assert_eq!(rig.state.cursor(), 2);

    // walk away: countdown burns out and the display goes dark
    rig.sensor.set_distance(FAR);
    sleep(Duration::from_millis(400)).await;

    assert_eq!(rig.state.with_lock(|s| s.presence), Presence::Asleep);
    assert_eq!(rig.state.cursor(), 0, "sleep must reset the cursor");
    assert!(!rig.beacon.is_lit());
    assert_eq!(
        rig.renderer.hide_count(),
        hides_at_start + 1,
        "hide runs exactly once per sleep transition"
    );
    let ops = rig.renderer.ops();
    assert!(
        matches!(ops.last(), Some(RenderOp::Static(s)) if s.contains("Vigil")),
        "idle status follows the hide"
    );

    rig.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn presses_while_asleep_wait_for_the_wake_broadcast() {
    let rig = Rig::start(records(2), Duration::from_secs(60));
    settle().await;
    assert!(!rig.state.is_awake());

    rig.buttons.send(NavSignal::Next).await.unwrap();
    settle().await;
    assert_eq!(rig.state.cursor(), 0, "no navigation while the display is off");
    assert!(scrollables(&rig.renderer.ops()).is_empty());

    rig.sensor.set_distance(NEAR);
    settle().await;
    // the parked press applies right after the wake splash
    assert_eq!(rig.state.cursor(), 1);
    assert_eq!(scrollables(&rig.renderer.ops()), vec!["E0", "E1"]);

    rig.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn empty_cache_wake_shows_the_fallback_message() {
    let rig = Rig::start(Vec::new(), Duration::from_secs(60));
    settle().await;

    rig.sensor.set_distance(NEAR);
    settle().await;

    assert!(
        rig.renderer
            .ops()
            .contains(&RenderOp::Static("No scheduled events".to_string()))
    );

    rig.stop().await;
}

#[tokio::test]
async fn failed_refresh_perturbs_nothing() {
    let state = Arc::new(SharedState::new(records(3), 15, Duration::from_secs(60)));
    let (_shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut source = StaticSource::new(records(1));
    source.fail_next = true;
    let mut refresher = EventRefresher::new(
        source,
        Arc::clone(&state),
        Duration::from_secs(3600),
        shutdown_rx,
    );

    refresher.refresh_once().await;
    assert_eq!(state.with_lock(|s| s.events.len()), 3);
    assert!(state.queue_is_empty());

    // the next interval succeeds and swaps the cache in
    refresher.refresh_once().await;
    assert_eq!(state.with_lock(|s| s.events.len()), 1);
    assert!(state.queue_is_empty());
}
