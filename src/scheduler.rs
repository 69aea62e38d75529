/*
 *  scheduler.rs
 *
 *  Vigil - worth the glance
 *  (c) 2020-26 Stuart Hunter
 *
 *  Display scheduler: the sole renderer consumer - drains the action
 *  queue, animates scrolls, honors the presence gate
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
use std::time::Duration;

use log::{debug, error, info, warn};
use tokio::sync::watch;
use tokio::time::sleep;

use crate::display::{ArrowDirection, Renderer};
use crate::state::{Action, SharedState, wait_until_set};

const NO_EVENTS_MESSAGE: &str = "No scheduled events";

#[derive(Debug, Clone)]
pub struct ScrollConfig {
    /// Pixels advanced per scroll step
    pub step_px: u32,

    /// Delay between scroll steps
    pub tick: Duration,

    /// Hold before a fresh message starts moving
    pub start_hold: Duration,

    /// How long a navigation arrow stays up
    pub arrow_hold: Duration,
}

impl Default for ScrollConfig {
    fn default() -> Self {
        Self {
            step_px: 7,
            tick: Duration::from_millis(30),
            start_hold: Duration::from_millis(1500),
            arrow_hold: Duration::from_millis(50),
        }
    }
}

/// Where the consumer state machine currently sits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerPhase {
    /// Queue empty, nothing actively rendering
    Idle,
    /// Sequentially popping and rendering actions
    Draining,
    /// Queue drained but the last message is still mid-scroll
    ContinuingScroll,
}

#[derive(Debug)]
struct ScrollJob {
    span: u32,
    offset: u32,
    held: bool,
}

/// The single consumer of the action queue.
///
/// While Asleep the scheduler issues no draws at all - entering sleep is
/// the cancellation point where an in-flight scroll is abandoned, the
/// panel hidden (exactly once per transition) and the idle status line
/// drawn. While Awake it drains actions in FIFO order; every queued
/// action is rendered at least momentarily, but a scroll animation is
/// preempted the moment a new action arrives. Renderer faults are logged
/// and the scheduler moves on, so one bad draw never wedges navigation.
pub struct DisplayScheduler<R: Renderer> {
    renderer: R,
    state: Arc<SharedState>,
    cfg: ScrollConfig,
    idle_status: String,
    wake: watch::Receiver<bool>,
    shutdown: watch::Receiver<bool>,
    phase: SchedulerPhase,
    scroll: Option<ScrollJob>,
    sleep_screen_drawn: bool,
}

impl<R: Renderer> DisplayScheduler<R> {
    pub fn new(
        renderer: R,
        state: Arc<SharedState>,
        cfg: ScrollConfig,
        idle_status: String,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        let wake = state.subscribe_wake();
        Self {
            renderer,
            state,
            cfg,
            idle_status,
            wake,
            shutdown,
            phase: SchedulerPhase::Idle,
            scroll: None,
            sleep_screen_drawn: false,
        }
    }

    pub fn phase(&self) -> SchedulerPhase {
        self.phase
    }

    pub async fn run(mut self) {
        info!("display scheduler started");
        loop {
            if *self.shutdown.borrow() {
                break;
            }

            if !*self.wake.borrow_and_update() {
                self.enter_sleep();
                tokio::select! {
                    changed = self.wake.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                    _ = wait_until_set(&mut self.shutdown) => break,
                }
                continue;
            }

            if self.sleep_screen_drawn {
                // fresh wake
                self.sleep_screen_drawn = false;
                let nothing_to_show = self
                    .state
                    .with_lock(|s| s.events.is_empty() && s.queue.is_empty());
                if nothing_to_show {
                    if let Err(e) = self.renderer.show_static(NO_EVENTS_MESSAGE) {
                        error!("fallback message failed: {e}");
                    }
                }
            }

            if let Some(action) = self.state.pop_action() {
                self.phase = SchedulerPhase::Draining;
                self.handle_action(action).await;
                continue;
            }

            if self.scroll.is_some() {
                self.phase = SchedulerPhase::ContinuingScroll;
                self.step_scroll().await;
                continue;
            }

            self.phase = SchedulerPhase::Idle;
            let pushed = self.state.action_pushed();
            tokio::select! {
                _ = pushed => {}
                changed = self.wake.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                _ = wait_until_set(&mut self.shutdown) => break,
            }
        }

        // power the panel down on the way out
        if let Err(e) = self.renderer.hide() {
            warn!("could not hide display on shutdown: {e}");
        }
        info!("display scheduler stopped");
    }

    /// Sleep entry: abandon any in-flight scroll, hide the panel exactly
    /// once per transition, leave the idle status up for passers-by.
    fn enter_sleep(&mut self) {
        if self.scroll.take().is_some() {
            debug!("scroll abandoned on sleep");
        }
        self.phase = SchedulerPhase::Idle;
        if !self.sleep_screen_drawn {
            if let Err(e) = self.renderer.hide() {
                error!("hide failed: {e}");
            }
            if let Err(e) = self.renderer.show_static(&self.idle_status) {
                error!("idle status draw failed: {e}");
            }
            self.sleep_screen_drawn = true;
        }
    }

    async fn handle_action(&mut self, action: Action) {
        match action {
            Action::Previous => self.transition_arrow(ArrowDirection::Left).await,
            Action::Next => self.transition_arrow(ArrowDirection::Right).await,
            Action::DisplayEvent(record) => {
                match self
                    .renderer
                    .render_scrollable(&record.line1, &record.line2, &record.line3)
                {
                    Ok(span) => {
                        debug!("showing '{}' (scroll span {span})", record.summary);
                        self.scroll = (span > 0).then_some(ScrollJob {
                            span,
                            offset: 0,
                            held: false,
                        });
                    }
                    Err(e) => {
                        // recoverable: skip to the next queued action
                        error!("event render failed: {e}");
                        self.scroll = None;
                    }
                }
            }
        }
    }

    async fn transition_arrow(&mut self, direction: ArrowDirection) {
        // an arrow wipes whatever was mid-scroll
        self.scroll = None;
        if let Err(e) = self.renderer.draw_arrow(direction) {
            error!("arrow draw failed: {e}");
            return;
        }
        sleep(self.cfg.arrow_hold).await;
    }

    /// Advance the current scroll by one step. The initial hold and every
    /// step yield first, so a freshly pushed action preempts mid-flight.
    async fn step_scroll(&mut self) {
        let Some(job) = self.scroll.as_mut() else {
            return;
        };

        if !job.held {
            job.held = true;
            tokio::select! {
                _ = sleep(self.cfg.start_hold) => {}
                _ = self.state.action_pushed() => {}
            }
            return;
        }

        job.offset = job.offset.saturating_add(self.cfg.step_px);
        if job.offset >= job.span {
            debug!("scroll complete");
            self.scroll = None;
            return;
        }
        let offset = job.offset;
        if let Err(e) = self.renderer.set_scroll_position(offset) {
            error!("scroll step failed: {e}");
            self.scroll = None;
            return;
        }
        sleep(self.cfg.tick).await;
    }
}
