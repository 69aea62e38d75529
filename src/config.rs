use clap::{ArgAction, Parser, ValueHint};
use dirs_next::home_dir;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use std::{
    fs,
    path::{Path, PathBuf},
};
use thiserror::Error;

use crate::buttons::DEFAULT_DEBOUNCE;
use crate::calendar::CalendarCredentials;
use crate::monitor::PresenceConfig;
use crate::refresher::DEFAULT_REFRESH_INTERVAL;
use crate::scheduler::ScrollConfig;
use crate::state::DEFAULT_EVENT_CAPACITY;

pub const DEFAULT_I2C_BUS: &str = "/dev/i2c-1";
pub const DEFAULT_I2C_ADDRESS: u8 = 0x3c;

// BCM numbering, matching the original wiring
pub const DEFAULT_TRIGGER_PIN: u8 = 22;
pub const DEFAULT_ECHO_PIN: u8 = 27;
pub const DEFAULT_PREVIOUS_PIN: u8 = 23;
pub const DEFAULT_NEXT_PIN: u8 = 24;
pub const DEFAULT_LAMP_PIN: u8 = 25;

pub const DEFAULT_SLEEP_TIMEOUT_SECS: u64 = 60;

/// Error type for config loading/validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Top-level app configuration; every field optional so YAML and CLI can
/// be layered Option-by-Option.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    pub log_level: Option<String>, // e.g., "info" | "debug"
    pub calendar: Option<CalendarSection>,
    pub weather: Option<WeatherSection>,
    pub presence: Option<PresenceSection>,
    pub input: Option<InputSection>,
    pub events: Option<EventsSection>,
    pub display: Option<DisplaySection>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CalendarSection {
    pub calendar_id: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub refresh_token: Option<String>,
    pub home_lat: Option<f64>,
    pub home_lng: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct WeatherSection {
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PresenceSection {
    pub trigger_pin: Option<u8>,
    pub echo_pin: Option<u8>,
    pub lamp_pin: Option<u8>,
    pub poll_interval_ms: Option<u64>,
    pub sample_window_ms: Option<u64>,
    pub sample_gap_ms: Option<u64>,
    pub threshold_cm: Option<f64>,
    pub sleep_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct InputSection {
    pub previous_pin: Option<u8>,
    pub next_pin: Option<u8>,
    pub debounce_ms: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct EventsSection {
    pub capacity: Option<usize>,
    pub refresh_interval_secs: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DisplaySection {
    pub bus: Option<String>,
    pub address: Option<u8>,
    pub scroll_step_px: Option<u32>,
    pub scroll_tick_ms: Option<u64>,
    pub scroll_start_hold_ms: Option<u64>,
    pub arrow_hold_ms: Option<u64>,
}

/// Effective GPIO assignment after defaults.
#[derive(Debug, Clone, Copy)]
pub struct Pins {
    pub trigger: u8,
    pub echo: u8,
    pub previous: u8,
    pub next: u8,
    pub lamp: u8,
}

/// CLI overrides. All fields are Options so we can layer them over YAML.
#[derive(Debug, Parser, Clone)]
#[command(name = "Vigil", about = "Vigil presence-aware calendar display", disable_help_flag = false)]
pub struct Cli {
    /// Path to a YAML config file (overrides search)
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub config: Option<PathBuf>,
    #[arg(long)]
    pub log_level: Option<String>,
    #[arg(long)]
    pub sleep_timeout_secs: Option<u64>,
    #[arg(long)]
    pub threshold_cm: Option<f64>,
    #[arg(long)]
    pub event_capacity: Option<usize>,
    #[arg(long)]
    pub refresh_interval_secs: Option<u64>,
    #[arg(long)]
    pub i2c_bus: Option<String>,
    /// dump fully merged config (after overrides) and exit
    #[arg(long, action = ArgAction::SetTrue)]
    pub dump_config: bool,
}

/// Public entry point: parse CLI, read YAML, merge, validate.
pub fn load() -> Result<Config, ConfigError> {
    let cli = Cli::parse();

    // 1) defaults (from `Default` impl)
    let mut cfg = Config::default();

    // 2) YAML file (explicit path or search)
    if let Some(p) = cli.config.as_ref() {
        if p.exists() {
            let y = read_yaml(p)?;
            merge(&mut cfg, y);
        } else {
            return Err(ConfigError::Validation(format!(
                "Config file not found: {}",
                p.display()
            )));
        }
    } else if let Some(p) = find_config_file() {
        let y = read_yaml(&p)?;
        merge(&mut cfg, y);
    }

    // 3) CLI overrides (highest precedence)
    apply_cli_overrides(&mut cfg, &cli);

    // 4) Validate
    validate(&cfg)?;

    if cli.dump_config {
        // Pretty YAML of effective config (nice for debugging)
        let s = serde_yaml::to_string(&cfg)?;
        println!("{s}");
        std::process::exit(0);
    }

    Ok(cfg)
}

/// Try common locations in order (first hit wins).
fn find_config_file() -> Option<PathBuf> {
    // XDG-style: ~/.config/vigil/config.yaml
    if let Some(home) = home_dir() {
        let p = home.join(".config/vigil/config.yaml");
        if p.exists() {
            return Some(p);
        }
        let p = home.join(".config/vigil.yaml");
        if p.exists() {
            return Some(p);
        }
    }
    // project local
    for candidate in &["vigil.yaml", "config.yaml", "config/vigil.yaml"] {
        let p = PathBuf::from(candidate);
        if p.exists() {
            return Some(p);
        }
    }
    None
}

fn read_yaml(path: &Path) -> Result<Config, ConfigError> {
    let s = fs::read_to_string(path)?;
    let cfg: Config = serde_yaml::from_str(&s)?;
    Ok(cfg)
}

/// Shallow merge `src` into `dst`, section-by-section.
fn merge(dst: &mut Config, src: Config) {
    if src.log_level.is_some() {
        dst.log_level = src.log_level;
    }
    if src.calendar.is_some() {
        dst.calendar = src.calendar;
    }
    if src.weather.is_some() {
        dst.weather = src.weather;
    }
    if src.presence.is_some() {
        dst.presence = src.presence;
    }
    if src.input.is_some() {
        dst.input = src.input;
    }
    if src.events.is_some() {
        dst.events = src.events;
    }
    if src.display.is_some() {
        dst.display = src.display;
    }
}

fn apply_cli_overrides(cfg: &mut Config, cli: &Cli) {
    if cli.log_level.is_some() {
        cfg.log_level = cli.log_level.clone();
    }
    if cli.sleep_timeout_secs.is_some() || cli.threshold_cm.is_some() {
        let presence = cfg.presence.get_or_insert_with(PresenceSection::default);
        if cli.sleep_timeout_secs.is_some() {
            presence.sleep_timeout_secs = cli.sleep_timeout_secs;
        }
        if cli.threshold_cm.is_some() {
            presence.threshold_cm = cli.threshold_cm;
        }
    }
    if cli.event_capacity.is_some() || cli.refresh_interval_secs.is_some() {
        let events = cfg.events.get_or_insert_with(EventsSection::default);
        if cli.event_capacity.is_some() {
            events.capacity = cli.event_capacity;
        }
        if cli.refresh_interval_secs.is_some() {
            events.refresh_interval_secs = cli.refresh_interval_secs;
        }
    }
    if let Some(bus) = cli.i2c_bus.as_ref() {
        cfg.display.get_or_insert_with(DisplaySection::default).bus = Some(bus.clone());
    }
}

/// Put any invariants here (required fields, ranges, etc.)
fn validate(cfg: &Config) -> Result<(), ConfigError> {
    if let Some(events) = cfg.events.as_ref() {
        if events.capacity == Some(0) {
            return Err(ConfigError::Validation("events capacity must be > 0".into()));
        }
    }
    if let Some(presence) = cfg.presence.as_ref() {
        if let Some(t) = presence.threshold_cm {
            if t <= 0.0 {
                return Err(ConfigError::Validation("presence threshold_cm must be > 0".into()));
            }
        }
        if presence.sleep_timeout_secs == Some(0) {
            return Err(ConfigError::Validation("presence sleep_timeout_secs must be > 0".into()));
        }
    }
    if let Some(display) = cfg.display.as_ref() {
        if let Some(addr) = display.address {
            if addr > 0x7f {
                return Err(ConfigError::Validation("display address must be a 7-bit I2C address".into()));
            }
        }
        if display.scroll_step_px == Some(0) {
            return Err(ConfigError::Validation("display scroll_step_px must be > 0".into()));
        }
    }

    let pins = cfg.pins();
    let mut assigned = [pins.trigger, pins.echo, pins.previous, pins.next, pins.lamp];
    assigned.sort_unstable();
    if assigned.windows(2).any(|w| w[0] == w[1]) {
        return Err(ConfigError::Validation(
            "GPIO pins must be distinct across sensor, buttons, and lamp".into(),
        ));
    }
    Ok(())
}

impl Config {
    pub fn pins(&self) -> Pins {
        let presence = self.presence.clone().unwrap_or_default();
        let input = self.input.clone().unwrap_or_default();
        Pins {
            trigger: presence.trigger_pin.unwrap_or(DEFAULT_TRIGGER_PIN),
            echo: presence.echo_pin.unwrap_or(DEFAULT_ECHO_PIN),
            previous: input.previous_pin.unwrap_or(DEFAULT_PREVIOUS_PIN),
            next: input.next_pin.unwrap_or(DEFAULT_NEXT_PIN),
            lamp: presence.lamp_pin.unwrap_or(DEFAULT_LAMP_PIN),
        }
    }

    pub fn presence_config(&self) -> PresenceConfig {
        let section = self.presence.clone().unwrap_or_default();
        let defaults = PresenceConfig::default();
        PresenceConfig {
            poll_interval: section
                .poll_interval_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.poll_interval),
            sample_window: section
                .sample_window_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.sample_window),
            sample_gap: section
                .sample_gap_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.sample_gap),
            threshold_cm: section.threshold_cm.unwrap_or(defaults.threshold_cm),
        }
    }

    pub fn scroll_config(&self) -> ScrollConfig {
        let section = self.display.clone().unwrap_or_default();
        let defaults = ScrollConfig::default();
        ScrollConfig {
            step_px: section.scroll_step_px.unwrap_or(defaults.step_px),
            tick: section
                .scroll_tick_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.tick),
            start_hold: section
                .scroll_start_hold_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.start_hold),
            arrow_hold: section
                .arrow_hold_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.arrow_hold),
        }
    }

    pub fn sleep_timeout(&self) -> Duration {
        let secs = self
            .presence
            .as_ref()
            .and_then(|p| p.sleep_timeout_secs)
            .unwrap_or(DEFAULT_SLEEP_TIMEOUT_SECS);
        Duration::from_secs(secs)
    }

    pub fn debounce(&self) -> Duration {
        self.input
            .as_ref()
            .and_then(|i| i.debounce_ms)
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_DEBOUNCE)
    }

    pub fn event_capacity(&self) -> usize {
        self.events
            .as_ref()
            .and_then(|e| e.capacity)
            .unwrap_or(DEFAULT_EVENT_CAPACITY)
    }

    pub fn refresh_interval(&self) -> Duration {
        self.events
            .as_ref()
            .and_then(|e| e.refresh_interval_secs)
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_REFRESH_INTERVAL)
    }

    pub fn i2c(&self) -> (String, u8) {
        let section = self.display.clone().unwrap_or_default();
        (
            section.bus.unwrap_or_else(|| DEFAULT_I2C_BUS.to_string()),
            section.address.unwrap_or(DEFAULT_I2C_ADDRESS),
        )
    }

    pub fn home(&self) -> Option<(f64, f64)> {
        let section = self.calendar.as_ref()?;
        Some((section.home_lat?, section.home_lng?))
    }

    /// Calendar credentials when fully configured.
    pub fn calendar_credentials(&self) -> Option<CalendarCredentials> {
        let section = self.calendar.as_ref()?;
        Some(CalendarCredentials {
            calendar_id: section.calendar_id.clone()?,
            client_id: section.client_id.clone()?,
            client_secret: section.client_secret.clone()?,
            refresh_token: section.refresh_token.clone()?,
        })
    }

    pub fn weather_key(&self) -> Option<String> {
        self.weather.as_ref().and_then(|w| w.api_key.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let cfg = Config::default();
        assert!(validate(&cfg).is_ok());
        assert_eq!(cfg.event_capacity(), DEFAULT_EVENT_CAPACITY);
        assert_eq!(cfg.sleep_timeout(), Duration::from_secs(DEFAULT_SLEEP_TIMEOUT_SECS));
        assert_eq!(cfg.i2c().0, DEFAULT_I2C_BUS);
        assert!(cfg.calendar_credentials().is_none());
    }

    #[test]
    fn zero_capacity_is_rejected() {
        let mut cfg = Config::default();
        cfg.events = Some(EventsSection {
            capacity: Some(0),
            ..Default::default()
        });
        assert!(validate(&cfg).is_err());
    }

    #[test]
    fn duplicate_pins_are_rejected() {
        let mut cfg = Config::default();
        cfg.input = Some(InputSection {
            previous_pin: Some(DEFAULT_TRIGGER_PIN),
            ..Default::default()
        });
        assert!(validate(&cfg).is_err());
    }

    #[test]
    fn yaml_section_overrides_defaults() {
        let yaml = r#"
log_level: debug
presence:
  threshold_cm: 35.5
  sleep_timeout_secs: 120
events:
  capacity: 5
"#;
        let mut cfg = Config::default();
        merge(&mut cfg, serde_yaml::from_str(yaml).expect("yaml parses"));
        assert_eq!(cfg.log_level.as_deref(), Some("debug"));
        assert_eq!(cfg.presence_config().threshold_cm, 35.5);
        assert_eq!(cfg.sleep_timeout(), Duration::from_secs(120));
        assert_eq!(cfg.event_capacity(), 5);
        // untouched sections fall back to defaults
        assert_eq!(cfg.pins().lamp, DEFAULT_LAMP_PIN);
    }

    #[test]
    fn credentials_require_every_field() {
        let mut cfg = Config::default();
        cfg.calendar = Some(CalendarSection {
            calendar_id: Some("primary".into()),
            client_id: Some("id".into()),
            client_secret: None,
            refresh_token: Some("tok".into()),
            home_lat: Some(45.07),
            home_lng: Some(7.68),
        });
        assert!(cfg.calendar_credentials().is_none());
        assert_eq!(cfg.home(), Some((45.07, 7.68)));
    }
}
