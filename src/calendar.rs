/*
 *  calendar.rs
 *
 *  Vigil - worth the glance
 *  (c) 2020-26 Stuart Hunter
 *
 *  Google Calendar event source and display-line formatting
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
use chrono::{DateTime, Local, SecondsFormat, Utc};
use log::warn;
use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;

use crate::weather::{Forecast, Weather};

const CALENDAR_API: &str = "https://www.googleapis.com/calendar/v3";
const TOKEN_URL: &str = "https://www.googleapis.com/oauth2/v4/token";

// Refresh the access token a minute before Google says it expires
const TOKEN_EXPIRY_SLACK_SECS: u64 = 60;

/// Custom error type for calendar operations.
#[derive(Debug, Error)]
pub enum CalendarError {
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("token refresh rejected: {0}")]
    Token(String),
    #[error("malformed events payload: {0}")]
    Payload(String),
}

/// Immutable snapshot of one upcoming calendar entry, pre-formatted into
/// the three lines the display shows. Never mutated after creation; the
/// whole cache is replaced wholesale on refresh.
#[derive(Debug, Clone, PartialEq)]
pub struct EventRecord {
    pub start: DateTime<Local>,
    pub summary: String,
    pub reminder_minutes: u32,
    pub line1: String,
    pub line2: String,
    pub line3: String,
}

/// Anything that can produce an ordered list of upcoming events on demand.
#[async_trait]
pub trait EventSource: Send {
    async fn fetch_upcoming(&mut self, limit: usize) -> Result<Vec<EventRecord>, CalendarError>;
}

// --- wire payloads ---------------------------------------------------------

#[derive(Debug, Deserialize)]
struct EventsPage {
    #[serde(default)]
    items: Vec<RawEvent>,
}

#[derive(Debug, Deserialize)]
struct RawEvent {
    summary: Option<String>,
    start: Option<EventTime>,
    reminders: Option<Reminders>,
}

#[derive(Debug, Deserialize)]
struct EventTime {
    #[serde(rename = "dateTime")]
    date_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct Reminders {
    overrides: Option<Vec<ReminderOverride>>,
}

#[derive(Debug, Deserialize)]
struct ReminderOverride {
    minutes: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

/// A raw event reduced to the fields the display needs.
#[derive(Debug, Clone)]
struct ShapedEvent {
    start: DateTime<Utc>,
    summary: String,
    reminder_minutes: u32,
}

fn shape_event(raw: RawEvent) -> Option<ShapedEvent> {
    // All-day events carry a date, not a dateTime; they have no slot on a
    // countdown display and are skipped.
    let start = raw.start.and_then(|s| s.date_time)?;
    let reminder_minutes = raw
        .reminders
        .and_then(|r| r.overrides)
        .and_then(|o| o.into_iter().next())
        .and_then(|o| o.minutes)
        .unwrap_or(0);
    Some(ShapedEvent {
        start,
        summary: raw.summary.unwrap_or_default(),
        reminder_minutes,
    })
}

fn shape_events(items: Vec<RawEvent>, now: DateTime<Utc>) -> Vec<ShapedEvent> {
    let mut shaped: Vec<ShapedEvent> = items.into_iter().filter_map(shape_event).collect();
    // The query can return the current, in-progress event; not upcoming.
    if shaped.first().is_some_and(|e| e.start < now) {
        shaped.remove(0);
    }
    shaped
}

fn format_lines(
    start: DateTime<Local>,
    summary: &str,
    reminder_minutes: u32,
    forecast: Option<&Forecast>,
) -> (String, String, String) {
    let line1 = format!("{} - rem: {}", start.format("%d %b - %H:%M"), reminder_minutes);
    let line2 = summary.to_string();
    let line3 = match forecast {
        Some(f) => format!("{} - {:.0} °C", f.description, f.temp_c),
        None => String::new(),
    };
    (line1, line2, line3)
}

// --- Google Calendar client ------------------------------------------------

/// Credentials for the Google Calendar API, resolved from configuration.
#[derive(Debug, Clone)]
pub struct CalendarCredentials {
    pub calendar_id: String,
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
}

/// Google Calendar `EventSource`.
///
/// Holds a short-lived access token obtained from the stored refresh token
/// and re-fetches it when it nears expiry. The optional weather client only
/// feeds the third display line; its failures never fail a fetch.
pub struct GoogleCalendar {
    client: Client,
    creds: CalendarCredentials,
    home: (f64, f64),
    weather: Option<Weather>,
    access_token: Option<String>,
    token_expiry: Option<Instant>,
}

impl GoogleCalendar {
    pub fn new(
        creds: CalendarCredentials,
        home: (f64, f64),
        weather: Option<Weather>,
    ) -> Result<Self, CalendarError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(15))
            .build()?;
        Ok(Self {
            client,
            creds,
            home,
            weather,
            access_token: None,
            token_expiry: None,
        })
    }

    async fn ensure_token(&mut self) -> Result<String, CalendarError> {
        if let (Some(token), Some(expiry)) = (&self.access_token, self.token_expiry) {
            if Instant::now() < expiry {
                return Ok(token.clone());
            }
        }

        let resp = self
            .client
            .post(TOKEN_URL)
            .form(&[
                ("grant_type", "refresh_token"),
                ("client_id", self.creds.client_id.as_str()),
                ("client_secret", self.creds.client_secret.as_str()),
                ("refresh_token", self.creds.refresh_token.as_str()),
            ])
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(CalendarError::Token(format!("HTTP {}", resp.status())));
        }
        let token: TokenResponse = resp.json().await?;

        self.token_expiry = Some(
            Instant::now()
                + Duration::from_secs(token.expires_in.saturating_sub(TOKEN_EXPIRY_SLACK_SECS)),
        );
        self.access_token = Some(token.access_token.clone());
        Ok(token.access_token)
    }

    async fn to_record(&self, event: ShapedEvent) -> EventRecord {
        let start_local = event.start.with_timezone(&Local);
        let forecast = match &self.weather {
            Some(w) => match w.forecast_at(self.home.0, self.home.1, event.start).await {
                Ok(f) => Some(f),
                Err(e) => {
                    warn!("forecast unavailable for {}: {}", start_local, e);
                    None
                }
            },
            None => None,
        };
        let (line1, line2, line3) = format_lines(
            start_local,
            &event.summary,
            event.reminder_minutes,
            forecast.as_ref(),
        );
        EventRecord {
            start: start_local,
            summary: event.summary,
            reminder_minutes: event.reminder_minutes,
            line1,
            line2,
            line3,
        }
    }
}

#[async_trait]
impl EventSource for GoogleCalendar {
    async fn fetch_upcoming(&mut self, limit: usize) -> Result<Vec<EventRecord>, CalendarError> {
        let token = self.ensure_token().await?;
        let now = Utc::now();
        let url = format!("{}/calendars/{}/events", CALENDAR_API, self.creds.calendar_id);
        let page: EventsPage = self
            .client
            .get(&url)
            .bearer_auth(&token)
            .query(&[
                ("maxResults", limit.to_string()),
                ("timeMin", now.to_rfc3339_opts(SecondsFormat::Secs, true)),
                ("orderBy", "startTime".to_string()),
                ("singleEvents", "true".to_string()),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let shaped = shape_events(page.items, now);
        let mut records = Vec::with_capacity(shaped.len());
        for event in shaped {
            records.push(self.to_record(event).await);
        }
        Ok(records)
    }
}

/// Fixed event source: serves a pre-built list. Used by the test suite and
/// handy for bench-top runs without calendar credentials.
#[derive(Debug, Default)]
pub struct StaticSource {
    events: Vec<EventRecord>,
    pub fail_next: bool,
}

impl StaticSource {
    pub fn new(events: Vec<EventRecord>) -> Self {
        Self {
            events,
            fail_next: false,
        }
    }

    pub fn set_events(&mut self, events: Vec<EventRecord>) {
        self.events = events;
    }
}

#[async_trait]
impl EventSource for StaticSource {
    async fn fetch_upcoming(&mut self, limit: usize) -> Result<Vec<EventRecord>, CalendarError> {
        if self.fail_next {
            self.fail_next = false;
            return Err(CalendarError::Payload("simulated fetch failure".to_string()));
        }
        Ok(self.events.iter().take(limit).cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn page(json: &str) -> EventsPage {
        serde_json::from_str(json).expect("fixture parses")
    }

    #[test]
    fn shape_drops_in_progress_leading_event() {
        let now = Utc.with_ymd_and_hms(2026, 3, 5, 12, 0, 0).unwrap();
        let fixture = r#"{
            "items": [
                {"summary": "Standup", "start": {"dateTime": "2026-03-05T11:30:00Z"},
                 "reminders": {"overrides": [{"method": "popup", "minutes": 10}]}},
                {"summary": "Dentist", "start": {"dateTime": "2026-03-05T14:30:00Z"},
                 "reminders": {"overrides": [{"method": "popup", "minutes": 30}]}}
            ]
        }"#;

        let shaped = shape_events(page(fixture).items, now);
        assert_eq!(shaped.len(), 1);
        assert_eq!(shaped[0].summary, "Dentist");
        assert_eq!(shaped[0].reminder_minutes, 30);
    }

    #[test]
    fn shape_keeps_future_leading_event() {
        let now = Utc.with_ymd_and_hms(2026, 3, 5, 12, 0, 0).unwrap();
        let fixture = r#"{
            "items": [
                {"summary": "Dentist", "start": {"dateTime": "2026-03-05T14:30:00Z"}}
            ]
        }"#;

        let shaped = shape_events(page(fixture).items, now);
        assert_eq!(shaped.len(), 1);
        assert_eq!(shaped[0].reminder_minutes, 0);
    }

    #[test]
    fn shape_skips_all_day_events() {
        let now = Utc.with_ymd_and_hms(2026, 3, 5, 12, 0, 0).unwrap();
        let fixture = r#"{
            "items": [
                {"summary": "Holiday", "start": {"date": "2026-03-06"}},
                {"summary": "Dentist", "start": {"dateTime": "2026-03-06T09:00:00Z"}}
            ]
        }"#;

        let shaped = shape_events(page(fixture).items, now);
        assert_eq!(shaped.len(), 1);
        assert_eq!(shaped[0].summary, "Dentist");
    }

    #[test]
    fn empty_page_shapes_to_nothing() {
        let now = Utc::now();
        assert!(shape_events(page(r#"{}"#).items, now).is_empty());
    }

    #[test]
    fn line_formatting_matches_display_layout() {
        let start = Local.with_ymd_and_hms(2026, 3, 5, 14, 30, 0).unwrap();
        let forecast = Forecast {
            description: "light rain".to_string(),
            temp_c: 7.6,
            at: Utc::now(),
        };

        let (l1, l2, l3) = format_lines(start, "Dentist", 30, Some(&forecast));
        assert_eq!(l1, "05 Mar - 14:30 - rem: 30");
        assert_eq!(l2, "Dentist");
        assert_eq!(l3, "light rain - 8 °C");

        let (_, _, l3) = format_lines(start, "Dentist", 30, None);
        assert!(l3.is_empty());
    }
}
