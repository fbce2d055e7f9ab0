use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::{
    camming::DEFAULT_STRIPS,
    topics::{DEFAULT_CAMMING_TOPIC, DEFAULT_LED_TOPIC},
    types::StripConfig,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MqttConfig {
    pub host: String,
    pub port: u16,
    pub user: Option<String>,
    pub pass: Option<String>,
    pub led_topic: String,
    pub camming_topic: String,
    pub client_id: String,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            host: "10.42.0.1".to_string(),
            port: 1883,
            user: None,
            pass: None,
            led_topic: DEFAULT_LED_TOPIC.to_string(),
            camming_topic: DEFAULT_CAMMING_TOPIC.to_string(),
            client_id: "led-web-ui".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    pub esp_ip: String,
    pub esp2_ip: String,
    pub esp3_ip: String,
    pub serial_port: String,
    pub esptool: String,
    pub camming_strips: Vec<StripConfig>,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            esp_ip: "10.42.0.13".to_string(),
            esp2_ip: "10.42.0.29".to_string(),
            esp3_ip: "10.42.0.173".to_string(),
            serial_port: "/dev/ttyACM0".to_string(),
            esptool: "esptool.py".to_string(),
            camming_strips: DEFAULT_STRIPS.to_vec(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub led_states: PathBuf,
    pub camming_states: PathBuf,
    pub weather_cache: PathBuf,
}

impl StorageConfig {
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        Self {
            led_states: dir.join("led_states.json"),
            camming_states: dir.join("esp3_states.json"),
            weather_cache: dir.join("weather_cache.json"),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self::in_dir(".")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HubConfig {
    pub mqtt: MqttConfig,
    pub devices: DeviceConfig,
    pub storage: StorageConfig,
    pub http_port: u16,
    pub watch_interval_secs: u64,
    pub web_root: Option<PathBuf>,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            mqtt: MqttConfig::default(),
            devices: DeviceConfig::default(),
            storage: StorageConfig::default(),
            http_port: 5000,
            watch_interval_secs: 5,
            web_root: None,
        }
    }
}

impl HubConfig {
    /// Builds a config from environment-style lookups, falling back to the
    /// defaults for anything unset or unparseable.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let text = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let mut config = Self::default();

        if let Some(dir) = text("LED_DATA_DIR") {
            config.storage = StorageConfig::in_dir(dir);
        }
        if let Some(path) = text("LED_STATE_FILE") {
            config.storage.led_states = PathBuf::from(path);
        }
        if let Some(path) = text("ESP3_STATE_FILE") {
            config.storage.camming_states = PathBuf::from(path);
        }
        if let Some(path) = text("WEATHER_CACHE_FILE") {
            config.storage.weather_cache = PathBuf::from(path);
        }

        if let Some(host) = text("MQTT_HOST") {
            config.mqtt.host = host;
        }
        if let Some(port) = text("MQTT_PORT").and_then(|value| value.parse::<u16>().ok()) {
            config.mqtt.port = port;
        }
        config.mqtt.user = text("MQTT_USER");
        config.mqtt.pass = text("MQTT_PASS");
        if let Some(topic) = text("MQTT_CMD_TOPIC") {
            config.mqtt.led_topic = topic;
        }
        if let Some(topic) = text("ESP3_CMD_TOPIC") {
            config.mqtt.camming_topic = topic;
        }

        if let Some(ip) = text("ESP_IP") {
            config.devices.esp_ip = ip;
        }
        if let Some(ip) = text("ESP2_IP") {
            config.devices.esp2_ip = ip;
        }
        if let Some(ip) = text("ESP3_IP") {
            config.devices.esp3_ip = ip;
        }
        if let Some(port) = text("ESP_SERIAL_PORT") {
            config.devices.serial_port = port;
        }
        if let Some(tool) = text("ESPTOOL") {
            config.devices.esptool = tool;
        }

        if let Some(port) = text("PORT").and_then(|value| value.parse::<u16>().ok()) {
            config.http_port = port;
        }
        if let Some(secs) = text("WATCH_INTERVAL_SECS").and_then(|value| value.parse::<u64>().ok()) {
            config.watch_interval_secs = secs;
        }
        config.web_root = text("LED_WEB_ROOT").map(PathBuf::from);

        config.sanitize();
        config
    }

    pub fn sanitize(&mut self) {
        if self.mqtt.port == 0 {
            self.mqtt.port = 1883;
        }
        self.watch_interval_secs = self.watch_interval_secs.clamp(1, 300);
        if self.devices.camming_strips.is_empty() {
            self.devices.camming_strips = DEFAULT_STRIPS.to_vec();
        }
    }
}
