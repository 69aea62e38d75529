/*
 *  buttons.rs
 *
 *  Vigil - worth the glance
 *  (c) 2020-26 Stuart Hunter
 *
 *  Push-button input: GPIO edge interrupts, debounced, delivered as
 *  discrete navigation signals
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

use std::time::{Duration, Instant};

use async_trait::async_trait;
use rppal::gpio::{Gpio, InputPin, Trigger};
use tokio::sync::mpsc::{self, Receiver, Sender};

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(300);

/// Discrete navigation signal, already debounced at this boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavSignal {
    Previous,
    Next,
}

/// Blocking source of navigation signals. `None` means the source is gone
/// and the consumer should wind down.
#[async_trait]
pub trait InputSource: Send {
    async fn next_signal(&mut self) -> Option<NavSignal>;
}

/// Suppresses repeated edges from a single physical press.
struct Debouncer {
    window: Duration,
    last: Option<Instant>,
}

impl Debouncer {
    fn new(window: Duration) -> Self {
        Self { window, last: None }
    }

    fn accept(&mut self, now: Instant) -> bool {
        match self.last {
            Some(prev) if now.duration_since(prev) < self.window => false,
            _ => {
                self.last = Some(now);
                true
            }
        }
    }
}

/// Two pull-up buttons on GPIO rising edges. Interrupt callbacks run on
/// rppal's own thread and push into a small channel; pressed-while-full
/// signals are dropped rather than queued beyond human patience.
pub struct GpioButtons {
    rx: Receiver<NavSignal>,
    // Pins are held so the interrupt registrations stay alive
    _left: InputPin,
    _right: InputPin,
}

impl GpioButtons {
    pub fn new(
        gpio: &Gpio,
        left_pin: u8,
        right_pin: u8,
        debounce: Duration,
    ) -> Result<Self, rppal::gpio::Error> {
        let (tx, rx) = mpsc::channel(16);

        let mut left = gpio.get(left_pin)?.into_input_pullup();
        let tx_left = tx.clone();
        let mut bounce = Debouncer::new(debounce);
        left.set_async_interrupt(Trigger::RisingEdge, move |_| {
            if bounce.accept(Instant::now()) {
                let _ = tx_left.try_send(NavSignal::Previous);
            }
        })?;

        let mut right = gpio.get(right_pin)?.into_input_pullup();
        let tx_right = tx;
        let mut bounce = Debouncer::new(debounce);
        right.set_async_interrupt(Trigger::RisingEdge, move |_| {
            if bounce.accept(Instant::now()) {
                let _ = tx_right.try_send(NavSignal::Next);
            }
        })?;

        Ok(Self {
            rx,
            _left: left,
            _right: right,
        })
    }
}

#[async_trait]
impl InputSource for GpioButtons {
    async fn next_signal(&mut self) -> Option<NavSignal> {
        self.rx.recv().await
    }
}

/// Channel-backed input source for tests: the returned sender stands in
/// for the physical buttons.
pub struct MockInput {
    rx: Receiver<NavSignal>,
}

impl MockInput {
    pub fn new() -> (Self, Sender<NavSignal>) {
        let (tx, rx) = mpsc::channel(16);
        (Self { rx }, tx)
    }
}

#[async_trait]
impl InputSource for MockInput {
    async fn next_signal(&mut self) -> Option<NavSignal> {
        self.rx.recv().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debouncer_accepts_first_edge() {
        let mut bounce = Debouncer::new(DEFAULT_DEBOUNCE);
        assert!(bounce.accept(Instant::now()));
    }

    #[test]
    fn debouncer_suppresses_edges_inside_the_window() {
        let mut bounce = Debouncer::new(Duration::from_millis(300));
        let t0 = Instant::now();
        assert!(bounce.accept(t0));
        assert!(!bounce.accept(t0 + Duration::from_millis(5)));
        assert!(!bounce.accept(t0 + Duration::from_millis(299)));
        assert!(bounce.accept(t0 + Duration::from_millis(300)));
    }

    #[test]
    fn debouncer_windows_chain_from_last_accepted_edge() {
        let mut bounce = Debouncer::new(Duration::from_millis(300));
        let t0 = Instant::now();
        assert!(bounce.accept(t0));
        assert!(bounce.accept(t0 + Duration::from_millis(400)));
        // window restarts at the accepted edge, not the suppressed ones
        assert!(!bounce.accept(t0 + Duration::from_millis(500)));
    }
}
