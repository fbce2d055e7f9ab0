use std::{
    net::SocketAddr,
    path::PathBuf,
    sync::Arc,
    time::{Duration, Instant},
};

use anyhow::Context;
use axum::{
    routing::{get, post},
    Router,
};
use rumqttc::{AsyncClient, Event, Incoming, MqttOptions};
use tokio::{net::TcpListener, sync::watch, task::JoinHandle};
use tower_http::services::ServeDir;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use ledhub_common::{CammingSnapshot, HubConfig, SegmentsSnapshot};

use crate::{
    devices::{CammingDevice, LedStrips, PresetGroup},
    diagnostics,
    publisher::{CommandSink, MqttSink},
    routes,
    store::{PresetStore, WeatherCache},
    watcher::run_default_watcher,
    weather::WeatherService,
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<HubConfig>,
    pub strips: Arc<LedStrips>,
    pub camming: Arc<CammingDevice>,
    pub led_presets: Arc<PresetGroup<SegmentsSnapshot>>,
    pub camming_presets: Arc<PresetGroup<CammingSnapshot>>,
    pub weather: WeatherService,
    pub started: Instant,
}

impl AppState {
    pub fn new(config: HubConfig, sink: Arc<dyn CommandSink>) -> anyhow::Result<Self> {
        let strips = Arc::new(LedStrips::new(sink.clone(), config.mqtt.led_topic.clone()));
        let camming = Arc::new(CammingDevice::new(
            sink,
            config.mqtt.camming_topic.clone(),
            config.devices.camming_strips.clone(),
        ));
        let led_presets = Arc::new(PresetGroup::new(
            "led",
            PresetStore::new(config.storage.led_states.clone()),
            strips.clone(),
        ));
        let camming_presets = Arc::new(PresetGroup::new(
            "camming",
            PresetStore::new(config.storage.camming_states.clone()),
            camming.clone(),
        ));
        let weather = WeatherService::new(WeatherCache::new(config.storage.weather_cache.clone()))?;

        Ok(Self {
            config: Arc::new(config),
            strips,
            camming,
            led_presets,
            camming_presets,
            weather,
            started: Instant::now(),
        })
    }
}

pub async fn run() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = HubConfig::from_lookup(|key| std::env::var(key).ok());

    let mut mqtt_options = MqttOptions::new(
        config.mqtt.client_id.clone(),
        config.mqtt.host.clone(),
        config.mqtt.port,
    );
    mqtt_options.set_keep_alive(Duration::from_secs(30));
    if let Some(user) = config.mqtt.user.clone() {
        mqtt_options.set_credentials(user, config.mqtt.pass.clone().unwrap_or_default());
    }
    let (mqtt, eventloop) = AsyncClient::new(mqtt_options, 64);
    spawn_mqtt_loop(eventloop);

    let app_state = AppState::new(config, Arc::new(MqttSink::new(mqtt)))?;
    let config = app_state.config.clone();

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let watchers = spawn_default_watchers(&app_state, shutdown_rx);

    // Devices already online at boot never produce a down-to-up edge.
    app_state.led_presets.apply_default().await;
    app_state.camming_presets.apply_default().await;

    let web_root = config
        .web_root
        .clone()
        .unwrap_or_else(|| PathBuf::from(format!("{}/web", env!("CARGO_MANIFEST_DIR"))));
    let app = router(app_state, web_root);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.http_port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind hub server at {addr}"))?;

    info!(
        broker = %config.mqtt.host,
        topic = %config.mqtt.led_topic,
        "led hub listening on http://{addr}"
    );
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("shutting down");
    let _ = shutdown_tx.send(true);
    for watcher in watchers {
        if let Err(err) = watcher.await {
            warn!("watcher task ended abnormally: {err}");
        }
    }
    Ok(())
}

pub fn router(app_state: AppState, web_root: PathBuf) -> Router {
    Router::new()
        .route("/api/set", post(routes::api_set))
        .route("/api/set-all", post(routes::api_set_all))
        .route("/api/ping", post(routes::api_ping))
        .route("/api/state", get(routes::api_state))
        .route("/api/states", get(routes::api_states))
        .route("/api/state/save", post(routes::api_state_save))
        .route("/api/state/apply", post(routes::api_state_apply))
        .route("/api/state/default", post(routes::api_state_default))
        .route("/api/state/delete", post(routes::api_state_delete))
        .route("/api/state/apply-default", post(routes::api_state_apply_default))
        .route("/api/esp3/state", get(routes::api_esp3_state))
        .route("/api/esp3/states", get(routes::api_esp3_states))
        .route("/api/esp3/state/save", post(routes::api_esp3_state_save))
        .route("/api/esp3/state/apply", post(routes::api_esp3_state_apply))
        .route("/api/esp3/state/default", post(routes::api_esp3_state_default))
        .route("/api/esp3/state/delete", post(routes::api_esp3_state_delete))
        .route("/api/esp3/set", post(routes::api_esp3_set))
        .route("/api/status", get(routes::api_status))
        .route("/api/esp-status", get(routes::api_esp_status))
        .route("/api/troubleshoot", get(routes::api_troubleshoot))
        .route("/api/weather", get(routes::api_weather))
        .route("/api/weather/manual", post(routes::api_weather_manual))
        .route("/api/pi-temp", get(routes::api_pi_temp))
        .route("/api/close-chromium", post(routes::api_close_chromium))
        .fallback_service(ServeDir::new(web_root))
        .with_state(app_state)
}

fn spawn_mqtt_loop(mut eventloop: rumqttc::EventLoop) {
    tokio::spawn(async move {
        loop {
            match eventloop.poll().await {
                Ok(Event::Incoming(Incoming::ConnAck(_))) => {
                    info!("mqtt connected");
                }
                Ok(_) => {}
                Err(err) => {
                    warn!("mqtt poll error: {err}");
                    tokio::time::sleep(Duration::from_secs(2)).await;
                }
            }
        }
    });
}

fn spawn_default_watchers(
    app_state: &AppState,
    shutdown: watch::Receiver<bool>,
) -> Vec<JoinHandle<()>> {
    let period = Duration::from_secs(app_state.config.watch_interval_secs);
    let led_ip = app_state.config.devices.esp_ip.clone();
    let camming_ip = app_state.config.devices.esp3_ip.clone();

    let led_presets = app_state.led_presets.clone();
    let led = tokio::spawn(run_default_watcher(
        "led",
        period,
        move || {
            let ip = led_ip.clone();
            async move { diagnostics::ping_ip(&ip).await }
        },
        move || {
            let presets = led_presets.clone();
            async move {
                presets.apply_default().await;
            }
        },
        shutdown.clone(),
    ));

    let camming_presets = app_state.camming_presets.clone();
    let camming = tokio::spawn(run_default_watcher(
        "camming",
        period,
        move || {
            let ip = camming_ip.clone();
            async move { diagnostics::ping_ip(&ip).await }
        },
        move || {
            let presets = camming_presets.clone();
            async move {
                presets.apply_default().await;
            }
        },
        shutdown,
    ));

    vec![led, camming]
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!("failed to listen for ctrl-c: {err}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                term.recv().await;
            }
            Err(err) => {
                warn!("failed to install SIGTERM handler: {err}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}


#[cfg(test)]
mod tests {
    use serde_json::Value;

    use super::{testing::test_hub, *};

    #[tokio::test]
    async fn router_serves_api_and_static_files() {
        let hub = test_hub();
        let web_root = hub.dir.path().join("web");
        std::fs::create_dir_all(&web_root).unwrap();
        std::fs::write(web_root.join("index.html"), "<h1>lights</h1>").unwrap();

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = router(hub.state.clone(), web_root);
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        let client = reqwest::Client::new();

        let body: Value = client
            .get(format!("http://{addr}/api/state"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["state"].as_array().map(Vec::len), Some(4));

        let response = client
            .post(format!("http://{addr}/api/set"))
            .body(r#"{"segment":"strip2","brightness":40}"#)
            .send()
            .await
            .unwrap();
        assert!(response.status().is_success());
        assert_eq!(hub.sink.messages().len(), 1);

        let page = client
            .get(format!("http://{addr}/index.html"))
            .send()
            .await
            .unwrap()
            .text()
            .await
            .unwrap();
        assert_eq!(page, "<h1>lights</h1>");
    }
}
