use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::lenient;

pub const SOURCE_OPEN_METEO: &str = "open-meteo";
pub const SOURCE_MANUAL: &str = "manual";
pub const SOURCE_CACHE: &str = "cache";

/// Last-known weather, as shown on the kiosk page and cached on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherSnapshot {
    pub location: String,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub temp_f: Option<f64>,
    pub humidity: Option<f64>,
    pub wind_mph: Option<f64>,
    pub condition: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<i64>,
    pub updated: String,
    pub source: String,
}

/// The `current` block of an Open-Meteo forecast response.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct OpenMeteoCurrent {
    pub temperature_2m: Option<f64>,
    pub relative_humidity_2m: Option<f64>,
    pub wind_speed_10m: Option<f64>,
    pub weather_code: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct OpenMeteoResponse {
    pub current: Option<OpenMeteoCurrent>,
}

impl WeatherSnapshot {
    pub fn from_open_meteo(
        label: &str,
        lat: f64,
        lon: f64,
        current: &OpenMeteoCurrent,
        updated: String,
    ) -> Self {
        let code = current
            .weather_code
            .filter(|code| code.is_finite())
            .map(|code| code as i64);
        Self {
            location: non_empty_or(label, "Your location"),
            lat: Some(lat),
            lon: Some(lon),
            temp_f: rounded(current.temperature_2m),
            humidity: rounded(current.relative_humidity_2m),
            wind_mph: rounded(current.wind_speed_10m),
            condition: code
                .and_then(weather_code_label)
                .unwrap_or("Weather")
                .to_string(),
            code,
            updated,
            source: SOURCE_OPEN_METEO.to_string(),
        }
    }
}

impl WeatherSnapshot {
    /// Builds a snapshot from a hand-entered form. Numbers may arrive as JSON
    /// numbers or numeric strings; `temp`, `wind` and `label` are accepted as
    /// aliases.
    pub fn from_manual(body: &Value, updated: String) -> Self {
        let location = text_field(body, &["location", "label"]);
        let condition = text_field(body, &["condition"]);
        Self {
            location: non_empty_or(location.unwrap_or_default(), "Manual entry"),
            lat: number_field(body, &["lat"]),
            lon: number_field(body, &["lon"]),
            temp_f: number_field(body, &["temp_f", "temp"]),
            humidity: number_field(body, &["humidity"]),
            wind_mph: number_field(body, &["wind_mph", "wind"]),
            condition: non_empty_or(condition.unwrap_or_default(), "Manual entry"),
            code: None,
            updated,
            source: SOURCE_MANUAL.to_string(),
        }
    }
}

fn text_field<'a>(body: &'a Value, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .filter_map(|key| body.get(*key).and_then(Value::as_str))
        .find(|value| !value.trim().is_empty())
}

fn number_field(body: &Value, keys: &[&str]) -> Option<f64> {
    keys.iter().find_map(|key| body.get(*key).and_then(lenient::number))
}

pub fn non_empty_or(value: &str, fallback: &str) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        fallback.to_string()
    } else {
        trimmed.to_string()
    }
}

fn rounded(value: Option<f64>) -> Option<f64> {
    value.filter(|value| value.is_finite()).map(f64::round)
}

/// WMO weather interpretation codes.
pub fn weather_code_label(code: i64) -> Option<&'static str> {
    let label = match code {
        0 => "Clear sky",
        1 => "Mostly clear",
        2 => "Partly cloudy",
        3 => "Overcast",
        45 => "Foggy",
        48 => "Rime fog",
        51 => "Light drizzle",
        53 => "Drizzle",
        55 => "Heavy drizzle",
        56 => "Freezing drizzle",
        57 => "Freezing drizzle (heavy)",
        61 => "Light rain",
        63 => "Rain",
        65 => "Heavy rain",
        66 => "Freezing rain",
        67 => "Freezing rain (heavy)",
        71 => "Light snow",
        73 => "Snow",
        75 => "Heavy snow",
        77 => "Snow grains",
        80 => "Rain showers",
        81 => "Heavy rain showers",
        82 => "Violent rain showers",
        85 => "Snow showers",
        86 => "Heavy snow showers",
        95 => "Thunderstorm",
        96 => "Thunderstorm with hail",
        99 => "Thunderstorm with heavy hail",
        _ => return None,
    };
    Some(label)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_open_meteo_current_block() {
        let response: OpenMeteoResponse = serde_json::from_str(
            r#"{"current":{"temperature_2m":71.6,"relative_humidity_2m":44.2,"wind_speed_10m":5.5,"weather_code":3}}"#,
        )
        .unwrap();
        let current = response.current.unwrap();

        let snapshot = WeatherSnapshot::from_open_meteo(
            "Niland",
            33.2378,
            -115.518,
            &current,
            "2026-01-05T10:00:00.000000Z".into(),
        );

        assert_eq!(snapshot.location, "Niland");
        assert_eq!(snapshot.temp_f, Some(72.0));
        assert_eq!(snapshot.humidity, Some(44.0));
        assert_eq!(snapshot.wind_mph, Some(6.0));
        assert_eq!(snapshot.condition, "Overcast");
        assert_eq!(snapshot.code, Some(3));
        assert_eq!(snapshot.source, SOURCE_OPEN_METEO);
    }

    #[test]
    fn unknown_code_and_blank_label_fall_back() {
        let current = OpenMeteoCurrent {
            weather_code: Some(42.0),
            ..OpenMeteoCurrent::default()
        };

        let snapshot = WeatherSnapshot::from_open_meteo("  ", 0.0, 0.0, &current, String::new());

        assert_eq!(snapshot.location, "Your location");
        assert_eq!(snapshot.condition, "Weather");
        assert_eq!(snapshot.temp_f, None);
    }

    #[test]
    fn manual_entry_accepts_strings_and_aliases() {
        let body = serde_json::json!({
            "label": "Back porch",
            "temp": "71.5",
            "humidity": 40,
            "wind": " 3 ",
            "lat": "north"
        });

        let snapshot = WeatherSnapshot::from_manual(&body, "2026-01-05T10:00:00.000000Z".into());

        assert_eq!(snapshot.location, "Back porch");
        assert_eq!(snapshot.temp_f, Some(71.5));
        assert_eq!(snapshot.humidity, Some(40.0));
        assert_eq!(snapshot.wind_mph, Some(3.0));
        assert_eq!(snapshot.lat, None);
        assert_eq!(snapshot.condition, "Manual entry");
        assert_eq!(snapshot.source, SOURCE_MANUAL);
    }

    #[test]
    fn manual_entry_defaults_location() {
        let snapshot = WeatherSnapshot::from_manual(&serde_json::json!({}), String::new());
        assert_eq!(snapshot.location, "Manual entry");
        assert_eq!(snapshot.temp_f, None);
    }
}
