pub mod cache;
pub mod camming;
pub mod color;
pub mod config;
pub mod lenient;
pub mod presets;
pub mod reachability;
pub mod topics;
pub mod types;
pub mod weather;

pub use cache::{StateCache, UpdateError};
pub use camming::{CammingLights, CammingSetRequest, CammingState};
pub use color::color_temp_to_rgb;
pub use config::{DeviceConfig, HubConfig, MqttConfig, StorageConfig};
pub use presets::{CammingSnapshot, PresetBook, PresetError, PresetSnapshot, SegmentsSnapshot};
pub use reachability::{Reachability, ReachabilityTracker};
pub use topics::*;
pub use types::{
    is_known_segment, segment_label, CammingCommand, CammingPattern, CammingTarget, LedCommand,
    Rgb, SegmentPattern, SegmentState, SegmentUpdate, SetCommand, StripConfig, DEFAULT_SEGMENT,
    SEGMENTS,
};
pub use weather::WeatherSnapshot;
