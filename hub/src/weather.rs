use std::{collections::HashMap, time::Duration};

use anyhow::Context;
use chrono::Utc;
use serde::Serialize;
use tracing::warn;

use ledhub_common::{
    weather::{OpenMeteoResponse, SOURCE_CACHE},
    WeatherSnapshot,
};

use crate::store::WeatherCache;

const OPEN_METEO_URL: &str = "https://api.open-meteo.com/v1/forecast";
const FETCH_TIMEOUT: Duration = Duration::from_secs(8);

#[derive(Debug, Clone, Default)]
pub struct WeatherQuery {
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub label: Option<String>,
    pub cache_only: bool,
}

impl WeatherQuery {
    /// Reads `lat`, `lon`, `label` and `cache_only` from query parameters.
    /// Unparseable coordinates count as missing.
    pub fn from_params(params: &HashMap<String, String>) -> Self {
        let coordinate = |key: &str| {
            params
                .get(key)
                .and_then(|value| value.trim().parse::<f64>().ok())
                .filter(|value| value.is_finite())
        };
        Self {
            lat: coordinate("lat"),
            lon: coordinate("lon"),
            label: params.get("label").cloned(),
            cache_only: params.get("cache_only").is_some_and(|flag| {
                matches!(flag.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes")
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeatherReply {
    pub ok: bool,
    #[serde(flatten)]
    pub snapshot: Option<WeatherSnapshot>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl WeatherReply {
    pub fn live(snapshot: WeatherSnapshot) -> Self {
        Self {
            ok: true,
            snapshot: Some(snapshot),
            error: None,
        }
    }

    pub fn cached(mut snapshot: WeatherSnapshot, error: Option<String>) -> Self {
        snapshot.source = SOURCE_CACHE.to_string();
        Self {
            ok: true,
            snapshot: Some(snapshot),
            error,
        }
    }

    pub fn failed(error: &str) -> Self {
        Self {
            ok: false,
            snapshot: None,
            error: Some(error.to_string()),
        }
    }
}

/// Open-Meteo client backed by the last-known snapshot on disk.
#[derive(Clone)]
pub struct WeatherService {
    client: reqwest::Client,
    endpoint: String,
    cache: WeatherCache,
}

impl WeatherService {
    pub fn new(cache: WeatherCache) -> anyhow::Result<Self> {
        Self::with_endpoint(cache, OPEN_METEO_URL)
    }

    pub fn with_endpoint(cache: WeatherCache, endpoint: impl Into<String>) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .build()
            .context("failed to build weather http client")?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            cache,
        })
    }

    pub fn cache(&self) -> &WeatherCache {
        &self.cache
    }

    /// Fetches current conditions and overwrites the cache on success.
    pub async fn fetch(&self, lat: f64, lon: f64, label: &str) -> anyhow::Result<WeatherSnapshot> {
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("latitude", lat.to_string()),
                ("longitude", lon.to_string()),
                (
                    "current",
                    "temperature_2m,relative_humidity_2m,wind_speed_10m,weather_code".to_string(),
                ),
                ("temperature_unit", "fahrenheit".to_string()),
                ("wind_speed_unit", "mph".to_string()),
                ("timezone", "auto".to_string()),
            ])
            .send()
            .await
            .context("weather request failed")?
            .error_for_status()
            .context("weather service returned an error")?;
        let body: OpenMeteoResponse = response
            .json()
            .await
            .context("weather response was not valid json")?;

        let current = body.current.unwrap_or_default();
        let snapshot = WeatherSnapshot::from_open_meteo(label, lat, lon, &current, utc_timestamp());
        self.cache.write(&snapshot).await;
        Ok(snapshot)
    }

    /// Live lookup with fallback to the cached snapshot.
    pub async fn lookup(&self, query: &WeatherQuery) -> WeatherReply {
        let cached = self.cache.read().await;
        let (lat, lon) = match (query.lat, query.lon) {
            (Some(lat), Some(lon)) if !query.cache_only => (lat, lon),
            _ => {
                return match cached {
                    Some(snapshot) => WeatherReply::cached(snapshot, None),
                    None => WeatherReply::failed("missing_location_and_cache"),
                }
            }
        };

        let label = query.label.as_deref().unwrap_or_default();
        match self.fetch(lat, lon, label).await {
            Ok(snapshot) => WeatherReply::live(snapshot),
            Err(err) => {
                warn!("weather fetch failed: {err:#}");
                match cached {
                    Some(snapshot) => WeatherReply::cached(snapshot, Some(format!("{err:#}"))),
                    None => WeatherReply::failed("unavailable"),
                }
            }
        }
    }
}

/// UTC ISO-8601 with microseconds and a trailing `Z`.
pub fn utc_timestamp() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%S%.6fZ").to_string()
}
