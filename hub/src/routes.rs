use std::collections::HashMap;

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::warn;

use ledhub_common::{
    segment_label, CammingSetRequest, PresetError, PresetSnapshot, SegmentUpdate,
    WeatherSnapshot, DEFAULT_SEGMENT, SEGMENTS,
};

use crate::{
    devices::PresetGroup,
    diagnostics,
    host::AppState,
    weather::{utc_timestamp, WeatherQuery, WeatherReply},
};

#[derive(Debug, Serialize)]
struct ErrorBody {
    ok: bool,
    error: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct NameBody {
    name: Option<String>,
}

impl NameBody {
    fn name(&self) -> &str {
        self.name.as_deref().unwrap_or_default()
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PingBody {
    segment: Option<String>,
}

/// Bodies are read as JSON whatever the content type says. An empty body is
/// treated as `{}`.
fn parse_body<T: DeserializeOwned + Default>(body: &Bytes) -> Result<T, Response> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body).map_err(|err| {
        warn!("rejecting request body: {err}");
        error_response(StatusCode::BAD_REQUEST, "Invalid JSON body")
    })
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (
        status,
        Json(ErrorBody {
            ok: false,
            error: message.to_string(),
        }),
    )
        .into_response()
}

fn preset_error(err: PresetError) -> Response {
    let status = match err {
        PresetError::EmptyName => StatusCode::BAD_REQUEST,
        PresetError::NotFound(_) => StatusCode::NOT_FOUND,
    };
    error_response(status, &err.to_string())
}

pub async fn api_set(State(state): State<AppState>, body: Bytes) -> Response {
    let update: SegmentUpdate = match parse_body(&body) {
        Ok(update) => update,
        Err(response) => return response,
    };
    match state.strips.set(&update) {
        Ok(()) => Json(json!({"ok": true})).into_response(),
        Err(err) => error_response(StatusCode::BAD_REQUEST, &err.to_string()),
    }
}

pub async fn api_set_all(State(state): State<AppState>, body: Bytes) -> Response {
    let update: SegmentUpdate = match parse_body(&body) {
        Ok(update) => update,
        Err(response) => return response,
    };
    let entries = state.strips.set_all(&update);
    Json(json!({"ok": true, "state": entries})).into_response()
}

pub async fn api_ping(State(state): State<AppState>, body: Bytes) -> Response {
    let ping: PingBody = match parse_body(&body) {
        Ok(ping) => ping,
        Err(response) => return response,
    };
    let segment = ping.segment.unwrap_or_else(|| DEFAULT_SEGMENT.to_string());
    state.strips.ping(Some(segment));
    Json(json!({"ok": true})).into_response()
}

pub async fn api_state(State(state): State<AppState>) -> Response {
    Json(json!({"state": state.strips.entries()})).into_response()
}

pub async fn api_states(State(state): State<AppState>) -> Response {
    Json(state.led_presets.list().await).into_response()
}

pub async fn api_state_save(State(state): State<AppState>, body: Bytes) -> Response {
    let snapshot = state.strips.snapshot();
    save_preset(&state.led_presets, &body, snapshot).await
}

pub async fn api_state_apply(State(state): State<AppState>, body: Bytes) -> Response {
    let request: NameBody = match parse_body(&body) {
        Ok(request) => request,
        Err(response) => return response,
    };
    match state.led_presets.apply_preset(request.name()).await {
        Ok(applied) => Json(json!({"ok": true, "state": applied})).into_response(),
        Err(err) => preset_error(err),
    }
}

pub async fn api_state_default(State(state): State<AppState>, body: Bytes) -> Response {
    set_default(&state.led_presets, &body).await
}

pub async fn api_state_delete(State(state): State<AppState>, body: Bytes) -> Response {
    delete_preset(&state.led_presets, &body).await
}

pub async fn api_state_apply_default(State(state): State<AppState>) -> Response {
    let applied = state.led_presets.apply_default().await;
    Json(json!({"ok": applied})).into_response()
}

pub async fn api_esp3_state(State(state): State<AppState>) -> Response {
    Json(json!({
        "ok": true,
        "state": state.camming.state(),
        "ip": state.config.devices.esp3_ip,
    }))
    .into_response()
}

pub async fn api_esp3_states(State(state): State<AppState>) -> Response {
    Json(state.camming_presets.list().await).into_response()
}

pub async fn api_esp3_state_save(State(state): State<AppState>, body: Bytes) -> Response {
    let snapshot = state.camming.snapshot();
    save_preset(&state.camming_presets, &body, snapshot).await
}

pub async fn api_esp3_state_apply(State(state): State<AppState>, body: Bytes) -> Response {
    let request: NameBody = match parse_body(&body) {
        Ok(request) => request,
        Err(response) => return response,
    };
    match state.camming_presets.apply_preset(request.name()).await {
        Ok(applied) => Json(json!({
            "ok": true,
            "state": applied,
            "applied": state.camming.state(),
        }))
        .into_response(),
        Err(err) => preset_error(err),
    }
}

pub async fn api_esp3_state_default(State(state): State<AppState>, body: Bytes) -> Response {
    set_default(&state.camming_presets, &body).await
}

pub async fn api_esp3_state_delete(State(state): State<AppState>, body: Bytes) -> Response {
    delete_preset(&state.camming_presets, &body).await
}

pub async fn api_esp3_set(State(state): State<AppState>, body: Bytes) -> Response {
    let request: CammingSetRequest = match parse_body(&body) {
        Ok(request) => request,
        Err(response) => return response,
    };
    let camming = state.camming.set(&request);
    Json(json!({"ok": true, "state": camming})).into_response()
}

async fn save_preset<S: PresetSnapshot>(
    group: &PresetGroup<S>,
    body: &Bytes,
    snapshot: S,
) -> Response {
    let request: NameBody = match parse_body(body) {
        Ok(request) => request,
        Err(response) => return response,
    };
    match group.save_preset(request.name(), snapshot).await {
        Ok(saved) => Json(json!({"ok": true, "state": saved})).into_response(),
        Err(err) => preset_error(err),
    }
}

async fn set_default<S: PresetSnapshot>(group: &PresetGroup<S>, body: &Bytes) -> Response {
    let request: NameBody = match parse_body(body) {
        Ok(request) => request,
        Err(response) => return response,
    };
    match group.set_default(request.name()).await {
        Ok(name) => Json(json!({"ok": true, "default": name})).into_response(),
        Err(err) => preset_error(err),
    }
}

async fn delete_preset<S: PresetSnapshot>(group: &PresetGroup<S>, body: &Bytes) -> Response {
    let request: NameBody = match parse_body(body) {
        Ok(request) => request,
        Err(response) => return response,
    };
    match group.delete_preset(request.name()).await {
        Ok(default) => Json(json!({"ok": true, "default": default})).into_response(),
        Err(err) => preset_error(err),
    }
}

pub async fn api_status(State(state): State<AppState>) -> Response {
    let uptime = state.started.elapsed().as_secs_f64();
    Json(json!({
        "service": "running",
        "uptime_seconds": (uptime * 10.0).round() / 10.0,
        "mqtt_host": state.config.mqtt.host,
        "mqtt_topic": state.config.mqtt.led_topic,
        "esp_default_ip": state.config.devices.esp_ip,
        "esp3_default_ip": state.config.devices.esp3_ip,
        "segments": SEGMENTS
            .iter()
            .map(|segment| json!({"name": segment, "label": segment_label(segment)}))
            .collect::<Vec<_>>(),
    }))
    .into_response()
}

fn ip_param(params: &HashMap<String, String>) -> Option<String> {
    params
        .get("ip")
        .map(|ip| ip.trim())
        .filter(|ip| !ip.is_empty())
        .map(str::to_string)
}

pub async fn api_esp_status(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let configured = Some(state.config.devices.esp_ip.clone()).filter(|ip| !ip.is_empty());
    let target = match ip_param(&params).or(configured) {
        Some(ip) => ip,
        None => diagnostics::guess_esp_ip().await.unwrap_or_default(),
    };
    let reachable = !target.is_empty() && diagnostics::ping_ip(&target).await;
    Json(json!({"ip": target, "reachable": reachable})).into_response()
}

pub async fn api_troubleshoot(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let target = match ip_param(&params) {
        Some(ip) => ip,
        None => diagnostics::guess_esp_ip()
            .await
            .unwrap_or_else(|| state.config.devices.esp_ip.clone()),
    };

    let devices = &state.config.devices;
    let (wlan, esp_reachable, mqtt_reachable, esp_reset_attempted) = tokio::join!(
        diagnostics::check_wlan(),
        diagnostics::ping_ip(&target),
        diagnostics::check_mqtt(&state.config.mqtt.host, state.config.mqtt.port),
        diagnostics::reset_esp_serial(&devices.esptool, &devices.serial_port),
    );

    let mut suggestions = Vec::new();
    if !mqtt_reachable {
        suggestions.push(format!(
            "Ensure mosquitto is running on the hub (systemctl restart mosquitto) and port {} accepts LAN clients.",
            state.config.mqtt.port
        ));
    }
    if !esp_reachable {
        suggestions.push(
            "Power-cycle the ESP32 and verify it joins the hub's access point.".to_string(),
        );
    }

    Json(json!({
        "esp_ip": target,
        "esp_reachable": esp_reachable,
        "mqtt_reachable": mqtt_reachable,
        "mosquitto_restarted": false,
        "esp_reset_attempted": esp_reset_attempted,
        "wlan": wlan,
        "suggestions": suggestions,
        "state": state.strips.entries(),
    }))
    .into_response()
}

pub async fn api_weather(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let query = WeatherQuery::from_params(&params);
    Json(state.weather.lookup(&query).await).into_response()
}

pub async fn api_weather_manual(State(state): State<AppState>, body: Bytes) -> Response {
    let form: Value = match parse_body::<Option<Value>>(&body) {
        Ok(form) => form.unwrap_or_else(|| json!({})),
        Err(response) => return response,
    };
    let snapshot = WeatherSnapshot::from_manual(&form, utc_timestamp());
    state.weather.cache().write(&snapshot).await;
    Json(WeatherReply::live(snapshot)).into_response()
}

pub async fn api_pi_temp() -> Response {
    let temp = diagnostics::read_pi_temp().await;
    Json(json!({"temp_c": temp, "ok": temp.is_some()})).into_response()
}

pub async fn api_close_chromium() -> Response {
    Json(diagnostics::close_chromium().await).into_response()
}
