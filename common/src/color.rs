use crate::types::Rgb;

pub const MIN_KELVIN: f64 = 1500.0;
pub const MAX_KELVIN: f64 = 9000.0;

/// Approximates a black-body color temperature as an RGB triple.
///
/// Input is clamped to `MIN_KELVIN..=MAX_KELVIN`, so anything outside that
/// window maps to the nearest boundary color.
pub fn color_temp_to_rgb(kelvin: f64) -> Rgb {
    let kelvin = if kelvin.is_nan() {
        MIN_KELVIN
    } else {
        kelvin.clamp(MIN_KELVIN, MAX_KELVIN)
    };
    let tmp = kelvin / 100.0;

    let (red, green, blue) = if tmp <= 66.0 {
        let green = 99.470_802_586_1 * tmp.ln() - 161.119_568_166_1;
        let blue = if tmp <= 19.0 {
            0.0
        } else {
            138.517_731_223_1 * (tmp - 10.0).ln() - 305.044_792_730_7
        };
        (255.0, green, blue)
    } else {
        let red = 329.698_727_446 * (tmp - 60.0).powf(-0.133_204_759_2);
        let green = 288.122_169_528_3 * (tmp - 60.0).powf(-0.075_514_849_2);
        (red, green, 255.0)
    };

    [channel(red), channel(green), channel(blue)]
}

fn channel(value: f64) -> u8 {
    value.clamp(0.0, 255.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamps_below_and_above_range() {
        assert_eq!(color_temp_to_rgb(500.0), color_temp_to_rgb(MIN_KELVIN));
        assert_eq!(color_temp_to_rgb(1_000.0), color_temp_to_rgb(1_500.0));
        assert_eq!(color_temp_to_rgb(20_000.0), color_temp_to_rgb(MAX_KELVIN));
        assert_eq!(color_temp_to_rgb(9_001.0), color_temp_to_rgb(9_000.0));
    }

    #[test]
    fn warm_end_is_red_heavy_and_cool_end_is_blue_heavy() {
        let warm = color_temp_to_rgb(MIN_KELVIN);
        let cool = color_temp_to_rgb(MAX_KELVIN);

        assert_eq!(warm[0], 255);
        assert_eq!(warm[2], 0);
        assert_eq!(cool[2], 255);
        assert!(cool[0] < 255);
    }

    #[test]
    fn blue_rises_and_red_falls_monotonically() {
        let mut previous = color_temp_to_rgb(MIN_KELVIN);
        let mut kelvin = MIN_KELVIN;
        while kelvin <= MAX_KELVIN {
            let current = color_temp_to_rgb(kelvin);
            assert!(current[0] <= previous[0], "red rose at {kelvin}K");
            assert!(current[2] >= previous[2], "blue fell at {kelvin}K");
            previous = current;
            kelvin += 50.0;
        }
    }

    #[test]
    fn neutral_white_is_close_to_white() {
        let rgb = color_temp_to_rgb(6_600.0);
        assert_eq!(rgb[0], 255);
        assert!(rgb[1] > 240);
        assert!(rgb[2] > 240);
    }
}
