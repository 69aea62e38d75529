// src/beacon.rs  (activity lamp)

use std::sync::{Arc, Mutex};

use rppal::gpio::{Gpio, OutputPin};

/// Power/activity indicator raised while the display is awake.
/// Driven only by the presence monitor.
pub trait Beacon: Send {
    fn on(&mut self);
    fn off(&mut self);
}

/// Single LED on a GPIO pin, low at rest.
pub struct LedBeacon {
    pin: OutputPin,
}

impl LedBeacon {
    pub fn new(gpio: &Gpio, pin: u8) -> Result<Self, rppal::gpio::Error> {
        Ok(Self {
            pin: gpio.get(pin)?.into_output_low(),
        })
    }
}

impl Beacon for LedBeacon {
    fn on(&mut self) {
        self.pin.set_high();
    }

    fn off(&mut self) {
        self.pin.set_low();
    }
}

/// Recording lamp for tests.
#[derive(Debug, Clone, Default)]
pub struct MockBeacon {
    state: Arc<Mutex<MockBeaconState>>,
}

#[derive(Debug, Default)]
pub struct MockBeaconState {
    pub lit: bool,
    /// Every on/off call, in order
    pub transitions: Vec<bool>,
}

impl MockBeacon {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> Arc<Mutex<MockBeaconState>> {
        Arc::clone(&self.state)
    }

    pub fn is_lit(&self) -> bool {
        self.state.lock().unwrap().lit
    }
}

impl Beacon for MockBeacon {
    fn on(&mut self) {
        let mut state = self.state.lock().unwrap();
        state.lit = true;
        state.transitions.push(true);
    }

    fn off(&mut self) {
        let mut state = self.state.lock().unwrap();
        state.lit = false;
        state.transitions.push(false);
    }
}
