/*
 *  refresher.rs
 *
 *  Vigil - worth the glance
 *  (c) 2020-26 Stuart Hunter
 *
 *  Periodic event cache refresh
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

use log::{info, warn};
use tokio::sync::watch;
use tokio::time::sleep;

use crate::calendar::EventSource;
use crate::state::SharedState;

/// Refresh is not time-critical; hours between fetches is plenty.
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(3 * 3600);

/// Periodically replaces the event cache from the calendar source.
///
/// The fetch runs entirely outside the shared lock; the swap (and any
/// cursor clamping it forces) is applied atomically afterwards. A failed
/// fetch keeps the previous cache and is retried next interval. Refresh
/// never queues an action - on-screen content only changes through
/// navigation or the idle reset.
pub struct EventRefresher<E: EventSource> {
    source: E,
    state: Arc<SharedState>,
    interval: Duration,
    shutdown: watch::Receiver<bool>,
}

impl<E: EventSource> EventRefresher<E> {
    pub fn new(
        source: E,
        state: Arc<SharedState>,
        interval: Duration,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            source,
            state,
            interval,
            shutdown,
        }
    }

    pub async fn run(mut self) {
        info!("event refresher started (every {:?})", self.interval);
        loop {
            tokio::select! {
                changed = self.shutdown.changed() => {
                    if changed.is_err() || *self.shutdown.borrow() {
                        break;
                    }
                }
                _ = sleep(self.interval) => {
                    self.refresh_once().await;
                }
            }
        }
        info!("event refresher stopped");
    }

    pub async fn refresh_once(&mut self) {
        let limit = self.state.capacity();
        match self.source.fetch_upcoming(limit).await {
            Ok(events) => {
                info!("event cache refreshed ({} upcoming)", events.len());
                self.state.replace_events(events);
            }
            Err(e) => {
                warn!("event refresh failed, keeping previous cache: {e}");
            }
        }
    }
}
