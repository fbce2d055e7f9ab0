use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::Context;
use clap::Parser;
use rumqttc::{AsyncClient, Event, MqttOptions, Outgoing, QoS};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::args::Cli;

const SEND_TIMEOUT: Duration = Duration::from_secs(5);

pub async fn run() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Cli::parse();

    if args.has_unknown_segment() {
        warn!(
            segment = args.segment.as_deref().unwrap_or_default(),
            "segment is not one the hub knows about, sending anyway"
        );
    }

    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis())
        .unwrap_or_default();
    let mut mqtt_options = MqttOptions::new(format!("led-cli-{millis}"), &args.host, args.port);
    mqtt_options.set_keep_alive(Duration::from_secs(15));
    if let Some((user, pass)) = args.credentials() {
        mqtt_options.set_credentials(user, pass);
    }

    let (mqtt, mut eventloop) = AsyncClient::new(mqtt_options, 10);

    let payload = serde_json::to_vec(&args.led_command()).context("failed to encode led command")?;
    mqtt.publish(&args.topic, QoS::AtMostOnce, false, payload)
        .await
        .context("failed to queue led command")?;
    mqtt.disconnect()
        .await
        .context("failed to queue mqtt disconnect")?;

    tokio::time::timeout(SEND_TIMEOUT, async {
        loop {
            match eventloop.poll().await {
                Ok(Event::Outgoing(Outgoing::Disconnect)) => return Ok(()),
                Ok(_) => {}
                Err(err) => return Err(err),
            }
        }
    })
    .await
    .with_context(|| format!("timed out talking to {}:{}", args.host, args.port))?
    .with_context(|| format!("mqtt connection to {}:{} failed", args.host, args.port))?;

    info!(topic = %args.topic, host = %args.host, "command sent");
    Ok(())
}
