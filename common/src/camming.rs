use serde::{Deserialize, Serialize};

use crate::{
    color::color_temp_to_rgb,
    presets::CammingSnapshot,
    types::{CammingCommand, CammingPattern, CammingTarget, StripConfig},
};

pub const DEFAULT_STRIPS: [StripConfig; 2] = [
    StripConfig {
        pin: 33,
        length: 300,
    },
    StripConfig {
        pin: 32,
        length: 300,
    },
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CammingState {
    pub brightness: f64,
    pub white_balance: f64,
    pub last_pattern: CammingPattern,
    pub target: CammingTarget,
}

impl Default for CammingState {
    fn default() -> Self {
        Self {
            brightness: 200.0,
            white_balance: 4500.0,
            last_pattern: CammingPattern::White,
            target: CammingTarget::Both,
        }
    }
}

/// Body of a direct camming `set` request.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CammingSetRequest {
    pub pattern: Option<CammingPattern>,
    pub brightness: Option<f64>,
    pub white_balance: Option<f64>,
    pub target: Option<CammingTarget>,
}

/// Live camming-light state plus the manual-off latch.
///
/// The latch is set by an explicit zero brightness and cleared by an explicit
/// non-zero one. While it is set, automatic default application is refused.
/// The main LED group has no equivalent.
#[derive(Debug, Clone)]
pub struct CammingLights {
    state: CammingState,
    off_latch: bool,
    strips: Vec<StripConfig>,
}

impl Default for CammingLights {
    fn default() -> Self {
        Self::new(DEFAULT_STRIPS.to_vec())
    }
}

impl CammingLights {
    pub fn new(strips: Vec<StripConfig>) -> Self {
        Self {
            state: CammingState::default(),
            off_latch: false,
            strips,
        }
    }

    pub fn state(&self) -> &CammingState {
        &self.state
    }

    pub fn is_off_latched(&self) -> bool {
        self.off_latch
    }

    /// Direct control. Pattern and target default to `white`/`both` rather
    /// than the previous values; brightness and white balance carry over.
    pub fn set(&mut self, request: &CammingSetRequest) -> CammingCommand {
        let brightness = match finite(request.brightness) {
            Some(brightness) => {
                self.off_latch = brightness <= 0.0;
                brightness
            }
            None => self.state.brightness,
        };

        self.state = CammingState {
            brightness,
            white_balance: finite(request.white_balance).unwrap_or(self.state.white_balance),
            last_pattern: request.pattern.unwrap_or(CammingPattern::White),
            target: request.target.unwrap_or(CammingTarget::Both),
        };
        self.command()
    }

    /// Applies a stored preset; every missing field keeps its live value.
    pub fn apply_snapshot(&mut self, snapshot: &CammingSnapshot) -> CammingCommand {
        self.state = CammingState {
            brightness: finite(snapshot.brightness).unwrap_or(self.state.brightness),
            white_balance: finite(snapshot.white_balance).unwrap_or(self.state.white_balance),
            last_pattern: snapshot.pattern.unwrap_or(self.state.last_pattern),
            target: snapshot.target.unwrap_or(self.state.target),
        };
        self.command()
    }

    pub fn snapshot(&self) -> CammingSnapshot {
        CammingSnapshot {
            pattern: Some(self.state.last_pattern),
            brightness: Some(self.state.brightness),
            white_balance: Some(self.state.white_balance),
            target: Some(self.state.target),
        }
    }

    fn command(&self) -> CammingCommand {
        let color = (self.state.last_pattern == CammingPattern::White)
            .then(|| color_temp_to_rgb(self.state.white_balance));
        CammingCommand {
            cmd: "set",
            pattern: self.state.last_pattern,
            brightness: self.state.brightness,
            white_balance: self.state.white_balance,
            target: self.state.target,
            strips: self.strips.clone(),
            color,
        }
    }
}

fn finite(value: Option<f64>) -> Option<f64> {
    value.filter(|value| value.is_finite())
}
