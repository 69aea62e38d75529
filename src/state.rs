/*
 *  state.rs
 *
 *  Vigil - worth the glance
 *  (c) 2020-26 Stuart Hunter
 *
 *  Shared coordination state: presence gate, navigation cursor,
 *  event cache, and the FIFO action queue
 *
 *  This program is free software: you can redistribute it and/or modify
 *  it under the terms of the GNU General Public License as published by
 *  the Free Software Foundation, either version 3 of the License, or
 *  (at your option) any later version.
 *
 *  This program is distributed in the hope that it will be useful,
 *  but WITHOUT ANY WARRANTY; without even the implied warranty of
 *  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *  GNU General Public License for more details.
 *
 *  See <http://www.gnu.org/licenses/> to get a copy of the GNU General
 *  Public License.
 *
 */

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use tokio::sync::{Notify, watch};

use crate::calendar::EventRecord;

pub const DEFAULT_EVENT_CAPACITY: usize = 15;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    Awake,
    Asleep,
}

/// One unit of display work, produced by the input controller and consumed
/// exactly once by the scheduler, in FIFO order. `DisplayEvent` carries a
/// value snapshot taken at push time, so it renders correctly even if the
/// cache is replaced while it sits in the queue.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Previous,
    Next,
    DisplayEvent(EventRecord),
}

#[derive(Debug)]
pub struct StateInner {
    pub presence: Presence,
    pub cursor: usize,
    pub events: Vec<EventRecord>,
    pub queue: VecDeque<Action>,
    pub sleep_countdown: Duration,
}

/// Outcome of one absent poll tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SleepTick {
    AlreadyAsleep,
    CountingDown(Duration),
    FellAsleep,
}

/// The single source of truth shared by all four tasks.
///
/// Presence, cursor, cache, and queue live behind one mutex; a watch
/// channel mirrors Awake/Asleep for blocking waiters and a `Notify`
/// signals queue pushes. Both are updated inside the lock scope, so no
/// reader can observe the flag and the broadcast out of step.
pub struct SharedState {
    inner: Mutex<StateInner>,
    wake_tx: watch::Sender<bool>,
    queue_notify: Notify,
    capacity: usize,
    countdown_max: Duration,
}

impl SharedState {
    /// Seed the state. The process always starts Asleep; the presence
    /// monitor wakes it on the first positive sample.
    pub fn new(initial_events: Vec<EventRecord>, capacity: usize, countdown_max: Duration) -> Self {
        let capacity = capacity.max(1);
        let mut events = initial_events;
        events.truncate(capacity);
        let (wake_tx, _) = watch::channel(false);
        Self {
            inner: Mutex::new(StateInner {
                presence: Presence::Asleep,
                cursor: 0,
                events,
                queue: VecDeque::new(),
                sleep_countdown: countdown_max,
            }),
            wake_tx,
            queue_notify: Notify::new(),
            capacity,
            countdown_max,
        }
    }

    /// Scoped exclusive access to the coordination state. Keep the closure
    /// short and never perform blocking I/O inside it; fetch/sample/render
    /// outside and apply the result here.
    pub fn with_lock<T>(&self, f: impl FnOnce(&mut StateInner) -> T) -> T {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut inner)
    }

    pub fn subscribe_wake(&self) -> watch::Receiver<bool> {
        self.wake_tx.subscribe()
    }

    pub fn is_awake(&self) -> bool {
        self.with_lock(|s| s.presence == Presence::Awake)
    }

    /// Presence detected: wake immediately (no hysteresis) and rearm the
    /// countdown. Returns true when this transitioned Asleep -> Awake.
    pub fn set_present(&self) -> bool {
        self.with_lock(|s| {
            s.sleep_countdown = self.countdown_max;
            let woke = s.presence == Presence::Asleep;
            s.presence = Presence::Awake;
            self.wake_tx.send_replace(true);
            woke
        })
    }

    /// Absent poll tick: burn `elapsed` off the countdown. At zero the
    /// whole sleep transition - presence flag, cursor reset, wake
    /// broadcast - applies under this single lock acquisition.
    pub fn tick_absent(&self, elapsed: Duration) -> SleepTick {
        self.with_lock(|s| {
            if s.presence == Presence::Asleep {
                return SleepTick::AlreadyAsleep;
            }
            s.sleep_countdown = s.sleep_countdown.saturating_sub(elapsed);
            if s.sleep_countdown.is_zero() {
                s.presence = Presence::Asleep;
                s.cursor = 0;
                self.wake_tx.send_replace(false);
                SleepTick::FellAsleep
            } else {
                SleepTick::CountingDown(s.sleep_countdown)
            }
        })
    }

    /// Handle a Previous signal. The bound hit is a silent no-op; either
    /// way the countdown is rearmed. Returns true when actions were queued.
    pub fn nav_previous(&self) -> bool {
        self.with_lock(|s| {
            s.sleep_countdown = self.countdown_max;
            if s.events.is_empty() || s.cursor == 0 {
                return false;
            }
            s.cursor -= 1;
            let record = s.events[s.cursor].clone();
            s.queue.push_back(Action::Previous);
            s.queue.push_back(Action::DisplayEvent(record));
            self.queue_notify.notify_one();
            true
        })
    }

    /// Handle a Next signal; forward navigation is bounded by both the
    /// cache length and its configured capacity.
    pub fn nav_next(&self) -> bool {
        self.with_lock(|s| {
            s.sleep_countdown = self.countdown_max;
            let last = s.events.len().min(self.capacity).saturating_sub(1);
            if s.events.is_empty() || s.cursor >= last {
                return false;
            }
            s.cursor += 1;
            let record = s.events[s.cursor].clone();
            s.queue.push_back(Action::Next);
            s.queue.push_back(Action::DisplayEvent(record));
            self.queue_notify.notify_one();
            true
        })
    }

    /// Queue the event under the cursor without moving it, so the display
    /// shows the nearest event without requiring a button press.
    pub fn push_display_current(&self) -> bool {
        self.with_lock(|s| {
            let Some(record) = s.events.get(s.cursor).cloned() else {
                return false;
            };
            s.queue.push_back(Action::DisplayEvent(record));
            self.queue_notify.notify_one();
            true
        })
    }

    pub fn pop_action(&self) -> Option<Action> {
        self.with_lock(|s| s.queue.pop_front())
    }

    pub fn queue_is_empty(&self) -> bool {
        self.with_lock(|s| s.queue.is_empty())
    }

    /// Future resolving on the next queue push. Create it *before*
    /// re-checking the queue to avoid a missed wakeup.
    pub fn action_pushed(&self) -> impl Future<Output = ()> + '_ {
        self.queue_notify.notified()
    }

    /// Atomically swap in a freshly fetched cache, clamping the cursor so
    /// it is never left dangling past the new end.
    pub fn replace_events(&self, new_events: Vec<EventRecord>) {
        self.with_lock(|s| {
            let mut events = new_events;
            events.truncate(self.capacity);
            s.cursor = if events.is_empty() {
                0
            } else {
                s.cursor.min(events.len() - 1)
            };
            s.events = events;
        })
    }

    pub fn events_is_empty(&self) -> bool {
        self.with_lock(|s| s.events.is_empty())
    }

    pub fn cursor(&self) -> usize {
        self.with_lock(|s| s.cursor)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn countdown_max(&self) -> Duration {
        self.countdown_max
    }
}

/// Block until a watch flag reads true. Returns false when the sender is
/// gone, which every waiter treats as a wind-down. Used for both the wake
/// broadcast and the shutdown flag.
pub async fn wait_until_set(rx: &mut watch::Receiver<bool>) -> bool {
    loop {
        if *rx.borrow_and_update() {
            return true;
        }
        if rx.changed().await.is_err() {
            return false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Local;

    fn record(tag: &str) -> EventRecord {
        EventRecord {
            start: Local::now(),
            summary: tag.to_string(),
            reminder_minutes: 10,
            line1: format!("line1 {tag}"),
            line2: tag.to_string(),
            line3: String::new(),
        }
    }

    fn records(n: usize) -> Vec<EventRecord> {
        (0..n).map(|i| record(&format!("E{i}"))).collect()
    }

    fn awake_state(n: usize) -> SharedState {
        let state = SharedState::new(records(n), DEFAULT_EVENT_CAPACITY, Duration::from_secs(60));
        state.set_present();
        state
    }

    #[test]
    fn cursor_stays_in_bounds_for_any_signal_sequence() {
        let state = awake_state(3);
        let signals = [true, true, true, true, false, false, false, false, true, false, true, true];
        for &next in &signals {
            if next {
                state.nav_next();
            } else {
                state.nav_previous();
            }
            let (cursor, len) = state.with_lock(|s| (s.cursor, s.events.len()));
            assert!(cursor < len.max(1), "cursor {cursor} escaped cache of {len}");
        }
    }

    #[test]
    fn boundary_signals_are_silent_noops() {
        let state = awake_state(2);

        assert!(!state.nav_previous());
        assert_eq!(state.cursor(), 0);
        assert!(state.queue_is_empty());

        state.nav_next();
        while !state.queue_is_empty() {
            state.pop_action();
        }
        assert!(!state.nav_next());
        assert_eq!(state.cursor(), 1);
        assert!(state.queue_is_empty());
    }

    #[test]
    fn navigation_queues_fifo_pairs() {
        // cache = [E0,E1,E2], cursor=0, Awake; Next twice then a bounded Next
        let state = awake_state(3);

        assert!(state.nav_next());
        assert!(state.nav_next());
        assert_eq!(state.cursor(), 2);
        assert!(!state.nav_next());

        let drained: Vec<Action> = std::iter::from_fn(|| state.pop_action()).collect();
        assert_eq!(drained.len(), 4);
        assert_eq!(drained[0], Action::Next);
        assert!(matches!(&drained[1], Action::DisplayEvent(e) if e.summary == "E1"));
        assert_eq!(drained[2], Action::Next);
        assert!(matches!(&drained[3], Action::DisplayEvent(e) if e.summary == "E2"));
    }

    #[test]
    fn forward_navigation_is_capacity_bounded() {
        let state = SharedState::new(records(5), 3, Duration::from_secs(60));
        state.set_present();

        assert!(state.nav_next());
        assert!(state.nav_next());
        assert!(!state.nav_next(), "capacity must cap the cursor before the cache end");
        assert_eq!(state.cursor(), 2);
    }

    #[test]
    fn any_handled_signal_rearms_the_countdown() {
        let state = awake_state(1);
        state.tick_absent(Duration::from_secs(45));
        assert!(state.with_lock(|s| s.sleep_countdown) < state.countdown_max());

        // boundary no-op still counts as interaction
        assert!(!state.nav_previous());
        assert_eq!(state.with_lock(|s| s.sleep_countdown), state.countdown_max());
    }

    #[test]
    fn countdown_expiry_applies_the_whole_sleep_transition() {
        let state = awake_state(3);
        state.nav_next();
        state.nav_next();
        assert_eq!(state.cursor(), 2);

        assert_eq!(
            state.tick_absent(Duration::from_secs(30)),
            SleepTick::CountingDown(Duration::from_secs(30))
        );
        assert_eq!(state.tick_absent(Duration::from_secs(30)), SleepTick::FellAsleep);

        let mut wake = state.subscribe_wake();
        let (presence, cursor, awake_flag) =
            state.with_lock(|s| (s.presence, s.cursor, *wake.borrow_and_update()));
        assert_eq!(presence, Presence::Asleep);
        assert_eq!(cursor, 0);
        assert!(!awake_flag);

        assert_eq!(state.tick_absent(Duration::from_secs(30)), SleepTick::AlreadyAsleep);
    }

    #[test]
    fn wake_is_immediate_and_rearms() {
        let state = awake_state(1);
        state.tick_absent(Duration::from_secs(60));
        assert!(!state.is_awake());

        assert!(state.set_present());
        assert!(state.is_awake());
        assert_eq!(state.with_lock(|s| s.sleep_countdown), state.countdown_max());
        // a second positive sample is not a transition
        assert!(!state.set_present());
    }

    #[test]
    fn refresh_clamps_the_cursor() {
        let state = awake_state(5);
        for _ in 0..4 {
            state.nav_next();
        }
        assert_eq!(state.cursor(), 4);

        state.replace_events(records(2));
        assert_eq!(state.cursor(), 1);

        state.replace_events(Vec::new());
        assert_eq!(state.cursor(), 0);
        assert!(state.events_is_empty());
    }

    #[test]
    fn refresh_respects_capacity() {
        let state = SharedState::new(Vec::new(), 15, Duration::from_secs(60));
        state.replace_events(records(40));
        assert_eq!(state.with_lock(|s| s.events.len()), 15);
    }

    #[test]
    fn empty_cache_navigation_never_queues() {
        let state = SharedState::new(Vec::new(), 15, Duration::from_secs(60));
        state.set_present();
        assert!(!state.nav_next());
        assert!(!state.nav_previous());
        assert!(!state.push_display_current());
        assert!(state.queue_is_empty());
        assert_eq!(state.cursor(), 0);
    }
}
