use std::{
    io,
    net::IpAddr,
    path::Path,
    process::{Output, Stdio},
    time::Duration,
};

use serde::Serialize;
use thiserror::Error;
use tokio::{net::TcpStream, process::Command, time::timeout};
use tracing::{debug, warn};

const PING_TIMEOUT: Duration = Duration::from_secs(3);
const BROKER_CONNECT_TIMEOUT: Duration = Duration::from_secs(1);
const SHELL_TOOL_TIMEOUT: Duration = Duration::from_secs(2);
const ESPTOOL_TIMEOUT: Duration = Duration::from_secs(8);
const THERMAL_ZONE: &str = "/sys/class/thermal/thermal_zone0/temp";
const DNSMASQ_LEASES: &str = "/var/lib/misc/dnsmasq.leases";
const NM_LEASES: &str = "/var/lib/NetworkManager/dnsmasq-wlan1.leases";

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("{program} did not finish within {limit:?}")]
    TimedOut { program: String, limit: Duration },
}

/// Runs a helper program to completion or until `limit` passes, whichever
/// comes first. A child still running at the deadline is killed.
async fn run_tool(program: &str, args: &[&str], limit: Duration) -> Result<Output, ToolError> {
    let mut command = Command::new(program);
    command
        .args(args)
        .stdin(Stdio::null())
        .kill_on_drop(true);

    match timeout(limit, command.output()).await {
        Ok(Ok(output)) => Ok(output),
        Ok(Err(source)) => Err(ToolError::Spawn {
            program: program.to_string(),
            source,
        }),
        Err(_) => Err(ToolError::TimedOut {
            program: program.to_string(),
            limit,
        }),
    }
}

/// An IP literal or a plain hostname. Anything else, in particular text
/// starting with `-`, never reaches a command line.
pub fn is_host_address(target: &str) -> bool {
    if target.parse::<IpAddr>().is_ok() {
        return true;
    }
    !target.is_empty()
        && target.len() <= 253
        && !target.starts_with(['-', '.'])
        && target
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.')
}

/// One ICMP echo with a one second reply deadline.
pub async fn ping_ip(target: &str) -> bool {
    if !is_host_address(target) {
        warn!(ip = target, "refusing to ping malformed address");
        return false;
    }
    match run_tool("ping", &["-c", "1", "-W", "1", target], PING_TIMEOUT).await {
        Ok(output) => output.status.success(),
        Err(err @ ToolError::TimedOut { .. }) => {
            debug!(ip = target, "{err}");
            false
        }
        Err(err) => {
            warn!("{err}");
            false
        }
    }
}

/// Plain TCP connect to the broker port.
pub async fn check_mqtt(host: &str, port: u16) -> bool {
    matches!(
        timeout(BROKER_CONNECT_TIMEOUT, TcpStream::connect((host, port))).await,
        Ok(Ok(_))
    )
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WlanStatus {
    pub up: bool,
    pub ip: Option<String>,
}

pub async fn check_wlan() -> WlanStatus {
    match run_tool("ip", &["-4", "addr", "show", "wlan0"], SHELL_TOOL_TIMEOUT).await {
        Ok(output) if output.status.success() => {
            parse_wlan(&String::from_utf8_lossy(&output.stdout))
        }
        Ok(_) => WlanStatus::default(),
        Err(err) => {
            warn!("{err}");
            WlanStatus::default()
        }
    }
}

fn parse_wlan(output: &str) -> WlanStatus {
    let up = output.contains("state UP") || output.contains("LOWER_UP");
    let ip = output
        .lines()
        .map(str::trim)
        .find_map(|line| line.strip_prefix("inet "))
        .and_then(|rest| rest.split_whitespace().next())
        .map(str::to_string);
    WlanStatus { up, ip }
}

/// CPU temperature in Celsius, rounded to a tenth.
pub async fn read_pi_temp() -> Option<f64> {
    if let Ok(raw) = tokio::fs::read_to_string(THERMAL_ZONE).await {
        if let Some(celsius) = parse_millidegrees(&raw) {
            return Some(celsius);
        }
    }

    match run_tool("vcgencmd", &["measure_temp"], SHELL_TOOL_TIMEOUT).await {
        Ok(output) => parse_vcgencmd(&String::from_utf8_lossy(&output.stdout)),
        Err(err) => {
            debug!("{err}");
            None
        }
    }
}

fn parse_millidegrees(raw: &str) -> Option<f64> {
    let millis = raw.trim().parse::<f64>().ok()?;
    Some(round_tenth(millis / 1000.0))
}

fn parse_vcgencmd(output: &str) -> Option<f64> {
    let celsius = output
        .trim()
        .strip_prefix("temp=")?
        .strip_suffix("'C")?
        .parse::<f64>()
        .ok()?;
    Some(round_tenth(celsius))
}

fn round_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Best guess at the LED controller's address from the DHCP leases.
pub async fn guess_esp_ip() -> Option<String> {
    let mut last = None;
    for (path, marker) in [(DNSMASQ_LEASES, "esp32"), (NM_LEASES, "esp")] {
        let Ok(leases) = tokio::fs::read_to_string(path).await else {
            continue;
        };
        let guess = pick_lease(&leases, marker);
        if guess.matched {
            return guess.ip;
        }
        if guess.ip.is_some() {
            last = guess.ip;
        }
    }
    last
}

#[derive(Debug, PartialEq, Eq)]
struct LeaseGuess {
    ip: Option<String>,
    matched: bool,
}

/// dnsmasq lease lines: `expiry mac ip hostname client-id`.
fn pick_lease(leases: &str, marker: &str) -> LeaseGuess {
    let mut last = None;
    for line in leases.lines() {
        let fields: Vec<&str> = line.split_whitespace().collect();
        let Some(ip) = fields.get(2) else {
            continue;
        };
        let host = fields.get(3).copied().unwrap_or_default();
        if host.to_ascii_lowercase().contains(marker) {
            return LeaseGuess {
                ip: Some(ip.to_string()),
                matched: true,
            };
        }
        last = Some(ip.to_string());
    }
    LeaseGuess {
        ip: last,
        matched: false,
    }
}

/// Toggles the controller's reset line over USB serial. Skipped when the
/// port is absent.
pub async fn reset_esp_serial(esptool: &str, port: &str) -> bool {
    if !Path::new(port).exists() {
        return false;
    }
    let args = [
        "--chip",
        "esp32s3",
        "--port",
        port,
        "--before",
        "default_reset",
        "--after",
        "hard_reset",
        "chip_id",
    ];
    match run_tool(esptool, &args, ESPTOOL_TIMEOUT).await {
        Ok(output) => output.status.success(),
        Err(err) => {
            warn!("{err}");
            false
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ChromiumClose {
    pub ok: bool,
    pub killed: bool,
    pub errors: Vec<String>,
}

pub async fn close_chromium() -> ChromiumClose {
    let mut result = ChromiumClose::default();
    for pattern in ["chromium-browser", "chromium"] {
        match run_tool("pkill", &["-f", pattern], SHELL_TOOL_TIMEOUT).await {
            Ok(output) if output.status.success() => result.killed = true,
            Ok(_) => {}
            Err(err) => result.errors.push(err.to_string()),
        }
    }
    result.ok = result.errors.is_empty();
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wlan_parses_state_and_first_address() {
        let output = "\
3: wlan0: <BROADCAST,MULTICAST,UP,LOWER_UP> mtu 1500 qdisc pfifo_fast state UP group default qlen 1000
    inet 10.42.0.1/24 brd 10.42.0.255 scope global noprefixroute wlan0
       valid_lft forever preferred_lft forever
    inet 192.168.4.1/24 scope global secondary wlan0
";
        assert_eq!(
            parse_wlan(output),
            WlanStatus {
                up: true,
                ip: Some("10.42.0.1/24".into())
            }
        );
    }

    #[test]
    fn wlan_down_without_address() {
        let output = "3: wlan0: <NO-CARRIER,BROADCAST,MULTICAST,UP> mtu 1500 state DOWN";
        assert_eq!(parse_wlan(output), WlanStatus::default());
    }

    #[test]
    fn temperatures_round_to_a_tenth() {
        assert_eq!(parse_millidegrees("48312\n"), Some(48.3));
        assert_eq!(parse_millidegrees("garbage"), None);
        assert_eq!(parse_vcgencmd("temp=51.54'C\n"), Some(51.5));
        assert_eq!(parse_vcgencmd("error"), None);
    }

    #[test]
    fn lease_prefers_marked_hostname() {
        let leases = "\
1767600000 aa:bb:cc:dd:ee:01 10.42.0.50 phone *
1767600000 aa:bb:cc:dd:ee:02 10.42.0.13 ESP32-LED *
1767600000 aa:bb:cc:dd:ee:03 10.42.0.77 laptop *
";
        assert_eq!(
            pick_lease(leases, "esp32"),
            LeaseGuess {
                ip: Some("10.42.0.13".into()),
                matched: true
            }
        );
    }

    #[test]
    fn lease_falls_back_to_last_entry() {
        let leases = "\
1767600000 aa:bb:cc:dd:ee:01 10.42.0.50 phone *
short line
1767600000 aa:bb:cc:dd:ee:03 10.42.0.77
";
        assert_eq!(
            pick_lease(leases, "esp32"),
            LeaseGuess {
                ip: Some("10.42.0.77".into()),
                matched: false
            }
        );
        assert_eq!(
            pick_lease("", "esp"),
            LeaseGuess {
                ip: None,
                matched: false
            }
        );
    }

    #[test]
    fn host_addresses_reject_option_like_text() {
        assert!(is_host_address("10.42.0.13"));
        assert!(is_host_address("fe80::1"));
        assert!(is_host_address("esp32-led.local"));
        assert!(!is_host_address("-f"));
        assert!(!is_host_address("--help"));
        assert!(!is_host_address("10.42.0.13 -f"));
        assert!(!is_host_address(""));
    }

    #[tokio::test]
    async fn ping_refuses_option_like_targets() {
        assert!(!ping_ip("-c").await);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn slow_tools_are_cut_off() {
        let started = std::time::Instant::now();
        let result = run_tool("sleep", &["5"], Duration::from_millis(200)).await;

        assert!(matches!(result, Err(ToolError::TimedOut { .. })));
        assert!(started.elapsed() < Duration::from_secs(3));
    }

    #[tokio::test]
    async fn missing_tools_report_spawn_errors() {
        let result = run_tool("ledhub-no-such-tool", &[], SHELL_TOOL_TIMEOUT).await;
        assert!(matches!(result, Err(ToolError::Spawn { .. })));
    }

    #[tokio::test]
    async fn serial_reset_skipped_without_port() {
        assert!(!reset_esp_serial("esptool.py", "/dev/definitely-not-a-tty").await);
    }
}
