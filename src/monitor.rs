/*
 *  monitor.rs
 *
 *  Vigil - worth the glance
 *  (c) 2020-26 Stuart Hunter
 *
 *  Presence monitor: polls the proximity sensor, drives the wake/sleep
 *  gate and the activity lamp
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

use log::{debug, info};
use tokio::sync::watch;
use tokio::time::{Instant, sleep};

use crate::beacon::Beacon;
use crate::sensor::PresenceSensor;
use crate::state::{SharedState, SleepTick};

#[derive(Debug, Clone)]
pub struct PresenceConfig {
    /// Cadence of presence decisions; also the countdown decrement unit
    pub poll_interval: Duration,

    /// How long one aggregate measurement samples the sensor
    pub sample_window: Duration,

    /// Gap between raw samples inside the window
    pub sample_gap: Duration,

    /// Mean distance below this means somebody is in front of the display
    pub threshold_cm: f64,
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(800),
            sample_window: Duration::from_secs(1),
            sample_gap: Duration::from_millis(150),
            threshold_cm: 20.0,
        }
    }
}

/// Polls the proximity sensor and owns the Awake/Asleep decision.
///
/// Wake on presence is immediate; sleep is debounced by the countdown so a
/// brief step away does not flicker the display. Sensor faults bias the
/// window mean out of range - failing toward power saving - and never stop
/// the monitor.
pub struct PresenceMonitor<S: PresenceSensor, B: Beacon> {
    sensor: S,
    beacon: B,
    state: Arc<SharedState>,
    cfg: PresenceConfig,
    shutdown: watch::Receiver<bool>,
}

impl<S: PresenceSensor, B: Beacon> PresenceMonitor<S, B> {
    pub fn new(
        sensor: S,
        beacon: B,
        state: Arc<SharedState>,
        cfg: PresenceConfig,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            sensor,
            beacon,
            state,
            cfg,
            shutdown,
        }
    }

    pub async fn run(mut self) {
        info!(
            "presence monitor started (threshold {} cm, poll {:?})",
            self.cfg.threshold_cm, self.cfg.poll_interval
        );
        loop {
            tokio::select! {
                changed = self.shutdown.changed() => {
                    if changed.is_err() || *self.shutdown.borrow() {
                        break;
                    }
                }
                _ = sleep(self.cfg.poll_interval) => {
                    self.poll_once().await;
                }
            }
        }
        self.beacon.off();
        info!("presence monitor stopped");
    }

    /// One poll: aggregate a sample window, then apply the presence
    /// decision to the shared state and the lamp.
    pub async fn poll_once(&mut self) {
        if self.measure_presence().await {
            if self.state.set_present() {
                info!("presence detected - display awake");
            }
            self.beacon.on();
        } else {
            match self.state.tick_absent(self.cfg.poll_interval) {
                SleepTick::FellAsleep => {
                    info!("idle countdown expired - display asleep");
                    self.beacon.off();
                }
                SleepTick::CountingDown(left) => {
                    debug!("absent, {:?} until sleep", left);
                }
                SleepTick::AlreadyAsleep => {}
            }
        }
    }

    // Mean distance over the sample window against the threshold. A failed
    // read is recorded as an out-of-range distance for that sample.
    async fn measure_presence(&mut self) -> bool {
        let deadline = Instant::now() + self.cfg.sample_window;
        let mut readings = Vec::new();
        loop {
            match self.sensor.sample().await {
                Ok(distance) => readings.push(distance),
                Err(e) => {
                    debug!("sensor read failed ({e}), counting sample as out of range");
                    readings.push(self.cfg.threshold_cm * 2.0);
                }
            }
            if Instant::now() >= deadline {
                break;
            }
            sleep(self.cfg.sample_gap).await;
        }
        let mean = readings.iter().sum::<f64>() / readings.len() as f64;
        mean < self.cfg.threshold_cm
    }
}
