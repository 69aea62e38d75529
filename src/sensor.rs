/*
 *  sensor.rs
 *
 *  Vigil - worth the glance
 *  (c) 2020-26 Stuart Hunter
 *
 *  Proximity sensing: HC-SR04 ultrasonic ranger behind the
 *  PresenceSensor seam
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

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use rppal::gpio::{Gpio, InputPin, OutputPin};
use thiserror::Error;

// Round-trip speed of sound, cm/s
const SPEED_OF_SOUND: f64 = 34_029.0;

// An echo that has not come back within this window never will
const ECHO_TIMEOUT: Duration = Duration::from_millis(30);

const TRIGGER_PULSE: Duration = Duration::from_micros(10);

#[derive(Debug, Error)]
pub enum SensorError {
    #[error("GPIO error: {0}")]
    Gpio(#[from] rppal::gpio::Error),
    #[error("echo timeout")]
    Timeout,
}

/// One distance reading on demand. The presence monitor owns the
/// aggregation (window mean against the threshold).
#[async_trait]
pub trait PresenceSensor: Send {
    async fn sample(&mut self) -> Result<f64, SensorError>;
}

/// HC-SR04 ultrasonic ranger on two GPIO pins.
pub struct Hcsr04 {
    trigger: OutputPin,
    echo: InputPin,
}

impl Hcsr04 {
    pub fn new(gpio: &Gpio, trigger_pin: u8, echo_pin: u8) -> Result<Self, SensorError> {
        let trigger = gpio.get(trigger_pin)?.into_output_low();
        let echo = gpio.get(echo_pin)?.into_input();
        Ok(Self { trigger, echo })
    }

    // Fire the trigger and time the echo. Busy-waits, bounded by
    // ECHO_TIMEOUT either side of the pulse.
    fn pulse(&mut self) -> Result<f64, SensorError> {
        self.trigger.set_high();
        std::thread::sleep(TRIGGER_PULSE);
        self.trigger.set_low();

        let deadline = Instant::now() + ECHO_TIMEOUT;
        while self.echo.is_low() {
            if Instant::now() >= deadline {
                return Err(SensorError::Timeout);
            }
        }
        let rise = Instant::now();
        let deadline = rise + ECHO_TIMEOUT;
        while self.echo.is_high() {
            if Instant::now() >= deadline {
                return Err(SensorError::Timeout);
            }
        }
        let flight = rise.elapsed();

        Ok(flight.as_secs_f64() * SPEED_OF_SOUND / 2.0)
    }
}

#[async_trait]
impl PresenceSensor for Hcsr04 {
    async fn sample(&mut self) -> Result<f64, SensorError> {
        self.pulse()
    }
}

/// Internal state for the mock sensor (shared for manipulation in tests)
#[derive(Debug, Default)]
pub struct MockSensorState {
    pub distance_cm: f64,
    pub fail_next: bool,
    pub sample_count: usize,
}

/// Scripted sensor for tests: reports a settable distance and can
/// simulate a read fault.
#[derive(Debug, Clone, Default)]
pub struct MockSensor {
    state: Arc<Mutex<MockSensorState>>,
}

impl MockSensor {
    pub fn at(distance_cm: f64) -> Self {
        let sensor = Self::default();
        sensor.state.lock().unwrap().distance_cm = distance_cm;
        sensor
    }

    pub fn state(&self) -> Arc<Mutex<MockSensorState>> {
        Arc::clone(&self.state)
    }

    pub fn set_distance(&self, distance_cm: f64) {
        self.state.lock().unwrap().distance_cm = distance_cm;
    }
}

#[async_trait]
impl PresenceSensor for MockSensor {
    async fn sample(&mut self) -> Result<f64, SensorError> {
        let mut state = self.state.lock().unwrap();
        state.sample_count += 1;
        if state.fail_next {
            state.fail_next = false;
            return Err(SensorError::Timeout);
        }
        Ok(state.distance_cm)
    }
}
