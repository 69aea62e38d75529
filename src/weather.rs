/*
 *  weather.rs
 *
 *  Vigil - worth the glance
 *  (c) 2020-26 Stuart Hunter
 *
 *  3-hourly forecast lookup for event display lines
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

use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use log::debug;
use mini_moka::sync::Cache;
use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;

const FORECAST_URL: &str = "https://api.openweathermap.org/data/2.5/forecast";
const CURRENT_URL: &str = "https://api.openweathermap.org/data/2.5/weather";

// The provider returns forecasts in 3-hour slots
const SLOT_SECS: i64 = 3 * 3600;

/// Custom error type for weather API operations.
#[derive(Debug, Error)]
pub enum WeatherApiError {
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("missing weather data: {0}")]
    MissingData(String),
}

/// Conditions at (or nearest to) a requested instant.
#[derive(Debug, Clone, PartialEq)]
pub struct Forecast {
    pub description: String,
    pub temp_c: f64,
    pub at: DateTime<Utc>,
}

// --- wire payloads ---------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ForecastPage {
    #[serde(default)]
    list: Vec<Slot>,
}

#[derive(Debug, Deserialize)]
struct Slot {
    dt: i64,
    main: MainBlock,
    #[serde(default)]
    weather: Vec<Condition>,
}

#[derive(Debug, Deserialize)]
struct MainBlock {
    temp: f64,
}

#[derive(Debug, Deserialize)]
struct Condition {
    description: String,
}

fn slot_to_forecast(slot: &Slot) -> Forecast {
    Forecast {
        description: slot
            .weather
            .first()
            .map(|c| c.description.clone())
            .unwrap_or_default(),
        temp_c: slot.main.temp,
        at: Utc.timestamp_opt(slot.dt, 0).single().unwrap_or_else(Utc::now),
    }
}

/// Closest forecast slot to the target, or None when the target falls
/// outside the forecast horizon.
fn pick_slot(list: &[Slot], target: DateTime<Utc>) -> Option<&Slot> {
    let best = list.iter().min_by_key(|s| (s.dt - target.timestamp()).abs())?;
    if (best.dt - target.timestamp()).abs() > SLOT_SECS {
        return None;
    }
    Some(best)
}

fn bucket_of(when: DateTime<Utc>) -> i64 {
    when.timestamp().div_euclid(SLOT_SECS)
}

/// Forecast client.
///
/// Results are cached per 3-hour bucket so formatting a full event cache
/// costs at most one provider round-trip per distinct slot.
pub struct Weather {
    client: Client,
    api_key: String,
    cache: Cache<i64, Forecast>,
}

impl Weather {
    pub fn new(api_key: &str) -> Result<Self, WeatherApiError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            api_key: api_key.to_string(),
            cache: Cache::builder()
                .max_capacity(64)
                .time_to_live(Duration::from_secs(3600))
                .build(),
        })
    }

    /// Conditions at `when` for the given coordinates. Falls back to the
    /// current conditions when `when` is outside the forecast horizon,
    /// matching how a just-started event still gets a weather line.
    pub async fn forecast_at(
        &self,
        lat: f64,
        lon: f64,
        when: DateTime<Utc>,
    ) -> Result<Forecast, WeatherApiError> {
        let bucket = bucket_of(when);
        if let Some(hit) = self.cache.get(&bucket) {
            return Ok(hit);
        }

        let page: ForecastPage = self
            .client
            .get(FORECAST_URL)
            .query(&[
                ("lat", lat.to_string()),
                ("lon", lon.to_string()),
                ("units", "metric".to_string()),
                ("appid", self.api_key.clone()),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let forecast = match pick_slot(&page.list, when) {
            Some(slot) => slot_to_forecast(slot),
            None => {
                debug!("no forecast slot near {}, using current conditions", when);
                self.current(lat, lon).await?
            }
        };
        self.cache.insert(bucket, forecast.clone());
        Ok(forecast)
    }

    async fn current(&self, lat: f64, lon: f64) -> Result<Forecast, WeatherApiError> {
        let slot: Slot = self
            .client
            .get(CURRENT_URL)
            .query(&[
                ("lat", lat.to_string()),
                ("lon", lon.to_string()),
                ("units", "metric".to_string()),
                ("appid", self.api_key.clone()),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        if slot.weather.is_empty() {
            return Err(WeatherApiError::MissingData(
                "current conditions without a weather block".to_string(),
            ));
        }
        Ok(slot_to_forecast(&slot))
    }
}
