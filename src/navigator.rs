/*
 *  navigator.rs
 *
 *  Vigil - worth the glance
 *  (c) 2020-26 Stuart Hunter
 *
 *  Input controller: turns button signals into cursor moves and
 *  queued display actions, gated on presence
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

use std::sync::Arc;

use log::{debug, info};
use tokio::sync::watch;

use crate::buttons::{InputSource, NavSignal};
use crate::state::{SharedState, wait_until_set};

/// Reacts to discrete previous/next signals.
///
/// While the display is asleep this task parks on the wake broadcast; a
/// press received meanwhile is applied the instant the monitor wakes the
/// state. Bound hits are silent no-ops, but still count as interaction
/// and rearm the sleep countdown. Debouncing already happened at the
/// input source; none is repeated here.
pub struct InputController<I: InputSource> {
    input: I,
    state: Arc<SharedState>,
    wake: watch::Receiver<bool>,
    shutdown: watch::Receiver<bool>,
}

impl<I: InputSource> InputController<I> {
    pub fn new(input: I, state: Arc<SharedState>, shutdown: watch::Receiver<bool>) -> Self {
        let wake = state.subscribe_wake();
        Self {
            input,
            state,
            wake,
            shutdown,
        }
    }

    pub async fn run(mut self) {
        // First wake: splash the nearest event without requiring a press.
        tokio::select! {
            awake = wait_until_set(&mut self.wake) => {
                if !awake {
                    return;
                }
            }
            _ = wait_until_set(&mut self.shutdown) => return,
        }
        if !self.state.push_display_current() {
            debug!("first wake with an empty event cache");
        }
        info!("input controller ready");

        loop {
            let signal = tokio::select! {
                sig = self.input.next_signal() => {
                    match sig {
                        Some(s) => s,
                        None => break, // input source is gone
                    }
                }
                _ = wait_until_set(&mut self.shutdown) => break,
            };

            // Presence gate: no navigation while the display is off.
            tokio::select! {
                awake = wait_until_set(&mut self.wake) => {
                    if !awake {
                        break;
                    }
                }
                _ = wait_until_set(&mut self.shutdown) => break,
            }

            let handled = match signal {
                NavSignal::Previous => self.state.nav_previous(),
                NavSignal::Next => self.state.nav_next(),
            };
            debug!(
                "{:?} -> {}",
                signal,
                if handled { "queued" } else { "no-op at boundary" }
            );
        }
        info!("input controller stopped");
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::Local;
    use tokio::time::sleep;

    use super::*;
    use crate::buttons::MockInput;
    use crate::calendar::EventRecord;
    use crate::state::Action;

    fn records(n: usize) -> Vec<EventRecord> {
        (0..n)
            .map(|i| EventRecord {
                start: Local::now(),
                summary: format!("E{i}"),
                reminder_minutes: 0,
                line1: format!("when {i}"),
                line2: format!("E{i}"),
                line3: String::new(),
            })
            .collect()
    }

    async fn settle() {
        sleep(Duration::from_millis(50)).await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn first_wake_splashes_the_nearest_event() {
        let state = Arc::new(SharedState::new(records(3), 15, Duration::from_secs(60)));
        let (input, _buttons) = MockInput::new();
        let (_shutdown_tx, shutdown) = watch::channel(false);
        let controller = InputController::new(input, Arc::clone(&state), shutdown);
        let task = tokio::spawn(controller.run());

        settle().await;
        assert!(state.queue_is_empty(), "nothing may queue before the first wake");

        state.set_present();
        settle().await;
        assert!(
            matches!(state.pop_action(), Some(Action::DisplayEvent(e)) if e.summary == "E0")
        );
        assert!(state.queue_is_empty());
        task.abort();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn signals_park_while_asleep_and_apply_on_wake() {
        let state = Arc::new(SharedState::new(records(3), 15, Duration::from_secs(60)));
        state.set_present();
        let (input, buttons) = MockInput::new();
        let (_shutdown_tx, shutdown) = watch::channel(false);
        let task = tokio::spawn(InputController::new(input, Arc::clone(&state), shutdown).run());

        settle().await;
        // drain the startup splash
        while state.pop_action().is_some() {}

        // fall asleep, then press Next while dark
        state.tick_absent(Duration::from_secs(60));
        buttons.send(NavSignal::Next).await.unwrap();
        settle().await;
        assert!(state.queue_is_empty(), "presses must not navigate while asleep");
        assert_eq!(state.cursor(), 0);

        state.set_present();
        settle().await;
        assert_eq!(state.cursor(), 1);
        let drained: Vec<Action> = std::iter::from_fn(|| state.pop_action()).collect();
        assert_eq!(drained[0], Action::Next);
        assert!(matches!(&drained[1], Action::DisplayEvent(e) if e.summary == "E1"));
        task.abort();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn shutdown_unparks_a_sleeping_controller() {
        let state = Arc::new(SharedState::new(records(1), 15, Duration::from_secs(60)));
        let (input, _buttons) = MockInput::new();
        let (shutdown_tx, shutdown) = watch::channel(false);
        let task = tokio::spawn(InputController::new(input, Arc::clone(&state), shutdown).run());

        settle().await;
        shutdown_tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .expect("controller must exit on shutdown")
            .expect("task completes cleanly");
    }
}
