//! Forgiving readers for hand-edited or older JSON files. Each returns `None`
//! when the value cannot be understood, leaving the caller to decide whether
//! that is worth a warning.

use serde_json::Value;

use crate::types::Rgb;

/// A finite number, given either as a JSON number or as numeric text.
pub fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|value| value.is_finite())
}

/// Booleans, 0/1 style numbers and the usual spellings of true and false.
pub fn flag(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(flag) => Some(*flag),
        Value::Number(_) => number(value).map(|number| number != 0.0),
        Value::String(text) => match text.trim().to_ascii_lowercase().as_str() {
            "true" | "on" | "yes" | "1" => Some(true),
            "false" | "off" | "no" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// The first three channels of an array, each clamped to 0..=255. Extra
/// channels are ignored; fewer than three is unreadable.
pub fn rgb(value: &Value) -> Option<Rgb> {
    let channels = value.as_array()?;
    if channels.len() < 3 {
        return None;
    }
    let mut color = [0u8; 3];
    for (slot, channel) in color.iter_mut().zip(channels) {
        *slot = number(channel)?.round().clamp(0.0, 255.0) as u8;
    }
    Some(color)
}
