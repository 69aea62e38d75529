/*
 *  main.rs
 *
 *  Vigil - worth the glance
 *  (c) 2020-26 Stuart Hunter
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

use anyhow::{Context, anyhow};
use env_logger::Env;
use local_ip_address::local_ip;
use log::{error, info, warn};
use tokio::signal::unix::{SignalKind, signal};
use tokio::sync::watch;

use vigil::beacon::LedBeacon;
use vigil::buttons::GpioButtons;
use vigil::calendar::{EventSource, GoogleCalendar};
use vigil::config;
use vigil::display::OledRenderer;
use vigil::monitor::PresenceMonitor;
use vigil::navigator::InputController;
use vigil::refresher::EventRefresher;
use vigil::scheduler::DisplayScheduler;
use vigil::sensor::Hcsr04;
use vigil::state::SharedState;
use vigil::weather::Weather;

include!(concat!(env!("OUT_DIR"), "/build_info.rs"));

/// Waits for SIGINT, SIGTERM, or SIGHUP and returns so the caller can
/// flip the shutdown flag and join the tasks.
async fn signal_handler() -> anyhow::Result<()> {
    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sighup = signal(SignalKind::hangup())?;

    tokio::select! {
        _ = sigint.recv() => {
            info!("SIGINT received. Initiating graceful shutdown.");
        }
        _ = sigterm.recv() => {
            info!("SIGTERM received. Initiating graceful shutdown.");
        }
        _ = sighup.recv() => {
            info!("SIGHUP received. Initiating graceful shutdown.");
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = config::load().context("configuration")?;
    env_logger::Builder::from_env(
        Env::default().default_filter_or(cfg.log_level.as_deref().unwrap_or("info")),
    )
    .init();
    info!("Vigil starting (built {})", BUILD_DATE);

    // Hardware first; an unreachable sensor, button, or panel is the one
    // genuinely fatal startup condition.
    let pins = cfg.pins();
    let gpio = rppal::gpio::Gpio::new().context("GPIO controller")?;
    let sensor = Hcsr04::new(&gpio, pins.trigger, pins.echo).context("ultrasonic sensor")?;
    let buttons =
        GpioButtons::new(&gpio, pins.previous, pins.next, cfg.debounce()).context("navigation buttons")?;
    let beacon = LedBeacon::new(&gpio, pins.lamp).context("activity lamp")?;
    let (bus, address) = cfg.i2c();
    let renderer = OledRenderer::new(&bus, address).context("OLED display")?;

    let creds = cfg
        .calendar_credentials()
        .ok_or_else(|| anyhow!("calendar credentials missing from configuration"))?;
    let home = cfg
        .home()
        .ok_or_else(|| anyhow!("home coordinates missing from configuration"))?;
    let weather = match cfg.weather_key() {
        Some(key) => Some(Weather::new(&key).context("weather client")?),
        None => {
            info!("no weather key configured; event lines omit conditions");
            None
        }
    };
    let mut source = GoogleCalendar::new(creds, home, weather).context("calendar client")?;

    // Seed the cache. A failed first fetch is not fatal: come up asleep and
    // empty, show the fallback on first wake, let the refresher catch up.
    let capacity = cfg.event_capacity();
    let initial = match source.fetch_upcoming(capacity).await {
        Ok(events) => {
            info!("seeded {} upcoming events", events.len());
            events
        }
        Err(e) => {
            warn!("initial event fetch failed ({e}); starting with an empty cache");
            Vec::new()
        }
    };
    let state = Arc::new(SharedState::new(initial, capacity, cfg.sleep_timeout()));

    let idle_status = format!(
        "{}\nVigil",
        local_ip()
            .map(|ip| ip.to_string())
            .unwrap_or_else(|_| "no network".to_string())
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let tasks = vec![
        tokio::spawn(
            PresenceMonitor::new(
                sensor,
                beacon,
                Arc::clone(&state),
                cfg.presence_config(),
                shutdown_rx.clone(),
            )
            .run(),
        ),
        tokio::spawn(InputController::new(buttons, Arc::clone(&state), shutdown_rx.clone()).run()),
        tokio::spawn(
            EventRefresher::new(
                source,
                Arc::clone(&state),
                cfg.refresh_interval(),
                shutdown_rx.clone(),
            )
            .run(),
        ),
        tokio::spawn(
            DisplayScheduler::new(
                renderer,
                Arc::clone(&state),
                cfg.scroll_config(),
                idle_status,
                shutdown_rx,
            )
            .run(),
        ),
    ];

    if let Err(e) = signal_handler().await {
        error!("signal handler failed: {e}");
    }
    let _ = shutdown_tx.send(true);
    for task in tasks {
        if let Err(e) = task.await {
            error!("task join error: {e}");
        }
    }
    info!("Vigil stopped");
    Ok(())
}
