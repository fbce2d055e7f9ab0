use serde::{Deserialize, Deserializer, Serialize};

pub type Rgb = [u8; 3];

pub const SEGMENTS: [&str; 4] = ["strip0", "strip1", "strip2", "strip3"];
pub const DEFAULT_SEGMENT: &str = "strip1";

pub fn segment_label(segment: &str) -> Option<&'static str> {
    match segment {
        "strip1" => Some("Main Surround Lights"),
        "strip2" => Some("Right Speaker"),
        "strip3" => Some("Left Speaker"),
        _ => None,
    }
}

pub fn is_known_segment(segment: &str) -> bool {
    SEGMENTS.contains(&segment)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentPattern {
    Solid,
    Rainbow,
    Sine,
    WindMeter,
    MicVu,
}

impl SegmentPattern {
    pub const ALL: [SegmentPattern; 5] = [
        Self::Solid,
        Self::Rainbow,
        Self::Sine,
        Self::WindMeter,
        Self::MicVu,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Solid => "solid",
            Self::Rainbow => "rainbow",
            Self::Sine => "sine",
            Self::WindMeter => "wind_meter",
            Self::MicVu => "mic_vu",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|pattern| pattern.as_str() == value)
    }
}

/// Camming-light patterns. Anything unrecognised falls back to `White`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CammingPattern {
    White,
    Rainbow,
    RainbowHills,
}

impl CammingPattern {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::White => "white",
            Self::Rainbow => "rainbow",
            Self::RainbowHills => "rainbow_hills",
        }
    }

    pub fn parse_lossy(value: &str) -> Self {
        match value {
            "rainbow" => Self::Rainbow,
            "rainbow_hills" => Self::RainbowHills,
            _ => Self::White,
        }
    }
}

impl<'de> Deserialize<'de> for CammingPattern {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::parse_lossy(&raw))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CammingTarget {
    Both,
    A,
    B,
}

impl CammingTarget {
    pub fn parse_lossy(value: &str) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "a" => Self::A,
            "b" => Self::B,
            _ => Self::Both,
        }
    }
}

impl<'de> Deserialize<'de> for CammingTarget {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::parse_lossy(&raw))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StripConfig {
    pub pin: u8,
    pub length: u16,
}

/// A partial segment update. Used for `/api/set` bodies and as the stored
/// form of each segment inside a preset snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub segment: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern: Option<SegmentPattern>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub brightness: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speed: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<Rgb>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wave_shape: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wave_count: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mic_gain: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mic_floor: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mic_smooth: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mic_enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mic_beat: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gradient_enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gradient_low: Option<Rgb>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gradient_mid: Option<Rgb>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gradient_high: Option<Rgb>,
}

/// Last-applied parameters for one segment, as held by the state cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentState {
    pub segment: String,
    pub pattern: SegmentPattern,
    pub brightness: f64,
    pub speed: f64,
    pub color: Rgb,
    pub wave_shape: String,
    pub wave_count: f64,
    pub mic_gain: f64,
    pub mic_floor: f64,
    pub mic_smooth: f64,
    pub mic_enabled: bool,
    pub mic_beat: bool,
    pub gradient_enabled: bool,
    pub gradient_low: Rgb,
    pub gradient_mid: Rgb,
    pub gradient_high: Rgb,
}

impl SegmentState {
    pub fn initial(segment: &str) -> Self {
        Self {
            segment: segment.to_string(),
            pattern: SegmentPattern::Solid,
            brightness: 180.0,
            speed: 1.0,
            color: [0, 180, 160],
            wave_shape: "sine".to_string(),
            wave_count: 5.0,
            mic_gain: 0.3,
            mic_floor: 0.02,
            mic_smooth: 0.3,
            mic_enabled: true,
            mic_beat: false,
            gradient_enabled: false,
            gradient_low: [0, 120, 255],
            gradient_mid: [255, 255, 255],
            gradient_high: [255, 0, 120],
        }
    }

    /// Overwrites every field present in `update`; absent fields keep their value.
    pub fn merge(&mut self, update: &SegmentUpdate) {
        if let Some(pattern) = update.pattern {
            self.pattern = pattern;
        }
        if let Some(brightness) = finite(update.brightness) {
            self.brightness = brightness.clamp(0.0, 255.0);
        }
        if let Some(speed) = finite(update.speed) {
            self.speed = speed.max(0.0);
        }
        if let Some(color) = update.color {
            self.color = color;
        }
        if let Some(wave_shape) = &update.wave_shape {
            self.wave_shape = wave_shape.clone();
        }
        if let Some(wave_count) = finite(update.wave_count) {
            self.wave_count = wave_count;
        }
        if let Some(mic_gain) = finite(update.mic_gain) {
            self.mic_gain = mic_gain;
        }
        if let Some(mic_floor) = finite(update.mic_floor) {
            self.mic_floor = mic_floor;
        }
        if let Some(mic_smooth) = finite(update.mic_smooth) {
            self.mic_smooth = mic_smooth;
        }
        if let Some(mic_enabled) = update.mic_enabled {
            self.mic_enabled = mic_enabled;
        }
        if let Some(mic_beat) = update.mic_beat {
            self.mic_beat = mic_beat;
        }
        if let Some(gradient_enabled) = update.gradient_enabled {
            self.gradient_enabled = gradient_enabled;
        }
        if let Some(low) = update.gradient_low {
            self.gradient_low = low;
        }
        if let Some(mid) = update.gradient_mid {
            self.gradient_mid = mid;
        }
        if let Some(high) = update.gradient_high {
            self.gradient_high = high;
        }
    }

    pub fn to_update(&self) -> SegmentUpdate {
        SegmentUpdate {
            segment: Some(self.segment.clone()),
            pattern: Some(self.pattern),
            brightness: Some(self.brightness),
            speed: Some(self.speed),
            color: Some(self.color),
            wave_shape: Some(self.wave_shape.clone()),
            wave_count: Some(self.wave_count),
            mic_gain: Some(self.mic_gain),
            mic_floor: Some(self.mic_floor),
            mic_smooth: Some(self.mic_smooth),
            mic_enabled: Some(self.mic_enabled),
            mic_beat: Some(self.mic_beat),
            gradient_enabled: Some(self.gradient_enabled),
            gradient_low: Some(self.gradient_low),
            gradient_mid: Some(self.gradient_mid),
            gradient_high: Some(self.gradient_high),
        }
    }

    pub fn command(&self) -> SetCommand {
        SetCommand {
            segment: Some(self.segment.clone()),
            pattern: self.pattern,
            brightness: self.brightness,
            speed: self.speed,
            params: CommandParams {
                color: Some(self.color),
                wave_shape: Some(self.wave_shape.clone()).filter(|shape| !shape.is_empty()),
                wave_count: Some(self.wave_count),
                mic_gain: Some(self.mic_gain),
                mic_floor: Some(self.mic_floor),
                mic_smooth: Some(self.mic_smooth),
                mic_enabled: Some(self.mic_enabled),
                mic_beat: Some(self.mic_beat),
                gradient_enabled: Some(self.gradient_enabled),
                gradient_low: Some(self.gradient_low),
                gradient_mid: Some(self.gradient_mid),
                gradient_high: Some(self.gradient_high),
            },
        }
    }
}

fn finite(value: Option<f64>) -> Option<f64> {
    value.filter(|value| value.is_finite())
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CommandParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<Rgb>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wave_shape: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wave_count: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mic_gain: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mic_floor: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mic_smooth: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mic_enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mic_beat: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gradient_enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gradient_low: Option<Rgb>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gradient_mid: Option<Rgb>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gradient_high: Option<Rgb>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SetCommand {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub segment: Option<String>,
    pub pattern: SegmentPattern,
    pub brightness: f64,
    pub speed: f64,
    pub params: CommandParams,
}

/// Wire format on the LED command topic.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "cmd", rename_all = "lowercase")]
pub enum LedCommand {
    Set(SetCommand),
    Ping {
        #[serde(skip_serializing_if = "Option::is_none")]
        segment: Option<String>,
    },
}

/// Wire format on the camming-light command topic.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CammingCommand {
    pub cmd: &'static str,
    pub pattern: CammingPattern,
    pub brightness: f64,
    pub white_balance: f64,
    pub target: CammingTarget,
    pub strips: Vec<StripConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<Rgb>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn set_command_wire_shape() {
        let state = SegmentState::initial("strip2");
        let value = serde_json::to_value(LedCommand::Set(state.command())).unwrap();

        assert_eq!(value["cmd"], "set");
        assert_eq!(value["segment"], "strip2");
        assert_eq!(value["pattern"], "solid");
        assert_eq!(value["brightness"], 180.0);
        assert_eq!(value["params"]["color"], json!([0, 180, 160]));
        assert_eq!(value["params"]["wave_shape"], "sine");
    }

    #[test]
    fn empty_wave_shape_is_omitted_from_params() {
        let mut state = SegmentState::initial("strip1");
        state.wave_shape.clear();
        let value = serde_json::to_value(LedCommand::Set(state.command())).unwrap();

        assert!(value["params"].get("wave_shape").is_none());
    }

    #[test]
    fn ping_without_segment() {
        let value = serde_json::to_value(LedCommand::Ping { segment: None }).unwrap();
        assert_eq!(value, json!({"cmd": "ping"}));
    }

    #[test]
    fn merge_clamps_brightness_and_speed() {
        let mut state = SegmentState::initial("strip1");
        state.merge(&SegmentUpdate {
            brightness: Some(400.0),
            speed: Some(-2.0),
            ..SegmentUpdate::default()
        });

        assert_eq!(state.brightness, 255.0);
        assert_eq!(state.speed, 0.0);
    }

    #[test]
    fn camming_values_are_lossy() {
        let pattern: CammingPattern = serde_json::from_value(json!("strobe")).unwrap();
        let target: CammingTarget = serde_json::from_value(json!("B")).unwrap();

        assert_eq!(pattern, CammingPattern::White);
        assert_eq!(target, CammingTarget::B);
    }

    #[test]
    fn segment_update_accepts_nulls_and_extra_keys() {
        let update: SegmentUpdate = serde_json::from_value(json!({
            "segment": "strip3",
            "pattern": "mic_vu",
            "wave_shape": null,
            "unused": 1
        }))
        .unwrap();

        assert_eq!(update.segment.as_deref(), Some("strip3"));
        assert_eq!(update.pattern, Some(SegmentPattern::MicVu));
        assert_eq!(update.wave_shape, None);
    }
}
