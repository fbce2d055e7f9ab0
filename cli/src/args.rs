use clap::{Parser, Subcommand};

use ledhub_common::{
    is_known_segment,
    types::{CommandParams, Rgb},
    LedCommand, SegmentPattern, SetCommand, DEFAULT_LED_TOPIC,
};

/// Send one command to the LED controller over MQTT.
#[derive(Debug, Parser)]
#[command(name = "ledhub-cli", version)]
pub struct Cli {
    /// Broker host
    #[arg(long, env = "MQTT_HOST")]
    pub host: String,

    /// Broker port
    #[arg(long, env = "MQTT_PORT", default_value_t = 1883)]
    pub port: u16,

    /// Command topic the controller subscribes to
    #[arg(long, env = "MQTT_CMD_TOPIC", default_value = DEFAULT_LED_TOPIC)]
    pub topic: String,

    #[arg(long)]
    pub username: Option<String>,

    #[arg(long)]
    pub password: Option<String>,

    /// Target segment, e.g. strip1. The firmware default applies when omitted.
    #[arg(long)]
    pub segment: Option<String>,

    #[command(subcommand)]
    pub action: Action,
}

#[derive(Debug, Clone, PartialEq, Subcommand)]
pub enum Action {
    /// Set pattern and parameters
    Set {
        #[arg(long, value_parser = parse_pattern)]
        pattern: SegmentPattern,

        #[arg(long, default_value_t = 255.0)]
        brightness: f64,

        #[arg(long, default_value_t = 1.0)]
        speed: f64,

        /// Red, green and blue, each clamped to 0..=255
        #[arg(
            long,
            num_args = 3,
            value_names = ["R", "G", "B"],
            allow_negative_numbers = true
        )]
        color: Option<Vec<i64>>,

        #[arg(long)]
        wave_shape: Option<String>,
    },
    /// Ask the controller to blink a segment
    Ping,
}

fn parse_pattern(value: &str) -> Result<SegmentPattern, String> {
    SegmentPattern::parse(value.trim()).ok_or_else(|| {
        let known: Vec<&str> = SegmentPattern::ALL
            .iter()
            .map(|pattern| pattern.as_str())
            .collect();
        format!("expected one of {}", known.join(", "))
    })
}

fn clamp_color(components: &[i64]) -> Option<Rgb> {
    match components {
        [red, green, blue] => Some([*red, *green, *blue].map(|c| c.clamp(0, 255) as u8)),
        _ => None,
    }
}

impl Cli {
    pub fn led_command(&self) -> LedCommand {
        let segment = self.segment.clone().filter(|segment| !segment.is_empty());
        match &self.action {
            Action::Set {
                pattern,
                brightness,
                speed,
                color,
                wave_shape,
            } => LedCommand::Set(SetCommand {
                segment,
                pattern: *pattern,
                brightness: *brightness,
                speed: *speed,
                params: CommandParams {
                    color: color.as_deref().and_then(clamp_color),
                    wave_shape: wave_shape.clone().filter(|shape| !shape.is_empty()),
                    ..CommandParams::default()
                },
            }),
            Action::Ping => LedCommand::Ping { segment },
        }
    }

    /// True when `--segment` names something the hub does not declare.
    /// Firmware may still accept it, so this only warrants a warning.
    pub fn has_unknown_segment(&self) -> bool {
        self.segment
            .as_deref()
            .is_some_and(|segment| !segment.is_empty() && !is_known_segment(segment))
    }

    /// Username and password, when a non-empty username was given.
    pub fn credentials(&self) -> Option<(String, String)> {
        let user = self.username.clone().filter(|user| !user.is_empty())?;
        Some((user, self.password.clone().unwrap_or_default()))
    }
}

#[cfg(test)]
mod tests {
    use std::ffi::OsStr;

    use clap::{error::ErrorKind, CommandFactory};
    use serde_json::json;

    use super::*;

    fn parse(line: &str) -> Result<Cli, clap::Error> {
        Cli::try_parse_from(std::iter::once("ledhub-cli").chain(line.split_whitespace()))
    }

    #[test]
    fn set_builds_the_led_wire_command() {
        let cli = parse(
            "--host 10.42.0.1 --port 1883 --topic led/command --segment strip2 \
             set --pattern solid --color 255 300 -4 --speed 0.5",
        )
        .unwrap();

        assert_eq!(cli.port, 1883);
        assert_eq!(cli.topic, "led/command");
        assert_eq!(
            serde_json::to_value(cli.led_command()).unwrap(),
            json!({
                "cmd": "set",
                "segment": "strip2",
                "pattern": "solid",
                "brightness": 255.0,
                "speed": 0.5,
                "params": {"color": [255, 255, 0]}
            })
        );
    }

    #[test]
    fn ping_without_segment() {
        let cli = parse("--host broker.lan --port 1884 --topic led/test ping").unwrap();

        assert_eq!(cli.host, "broker.lan");
        assert_eq!(cli.port, 1884);
        assert_eq!(cli.action, Action::Ping);
        assert_eq!(
            serde_json::to_value(cli.led_command()).unwrap(),
            json!({"cmd": "ping"})
        );
    }

    #[test]
    fn broker_flags_fall_back_to_environment() {
        let command = Cli::command();
        let env_of = |id: &str| {
            command
                .get_arguments()
                .find(|arg| arg.get_id() == id)
                .and_then(|arg| arg.get_env())
                .map(OsStr::to_os_string)
        };

        assert_eq!(env_of("host"), Some("MQTT_HOST".into()));
        assert_eq!(env_of("port"), Some("MQTT_PORT".into()));
        assert_eq!(env_of("topic"), Some("MQTT_CMD_TOPIC".into()));
        command.debug_assert();
    }

    #[test]
    fn rejects_bad_input() {
        let kind = |line: &str| parse(line).map(|_| ()).unwrap_err().kind();

        assert_eq!(kind("--host h set"), ErrorKind::MissingRequiredArgument);
        assert_eq!(kind("--host h set --pattern disco"), ErrorKind::ValueValidation);
        assert_eq!(kind("--host h --port many ping"), ErrorKind::ValueValidation);
        assert_eq!(kind("--host h ping --pattern solid"), ErrorKind::UnknownArgument);
        assert!(parse("--host h set --pattern solid --color 1 2").is_err());
        assert!(parse("--host h").is_err());
    }

    #[test]
    fn wave_shape_is_optional_and_segments_are_checked() {
        let cli = parse("--host h set --pattern sine --wave-shape sawtooth").unwrap();
        let value = serde_json::to_value(cli.led_command()).unwrap();
        assert_eq!(value["params"]["wave_shape"], "sawtooth");
        assert!(!cli.has_unknown_segment());

        let cli = parse("--host h --segment strip7 set --pattern sine").unwrap();
        assert!(cli.has_unknown_segment());
        assert!(serde_json::to_value(cli.led_command()).unwrap()["params"]
            .get("wave_shape")
            .is_none());
    }

    #[test]
    fn credentials_need_a_username() {
        let cli = parse("--host h --password secret ping").unwrap();
        assert_eq!(cli.credentials(), None);

        let cli = parse("--host h --username led --password secret ping").unwrap();
        assert_eq!(cli.credentials(), Some(("led".into(), "secret".into())));
    }
}
