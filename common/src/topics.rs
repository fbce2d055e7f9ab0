pub const DEFAULT_LED_TOPIC: &str = "led/command";
pub const DEFAULT_CAMMING_TOPIC: &str = "esp32u/command";
