//! HTTP API handlers
//!
//! The `/sdrangel/...` routes speak the mirror wire format so another
//! instance can target this one. The `/api/...` routes are for local
//! tooling and use the [`ApiResponse`] envelope.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::api::server::AppState;
use crate::settings::wire::{apply_json_fields, device_settings_document, fields_to_json, DEVICE_HW_TYPE};
use crate::settings::SettingsKey;

/// API response wrapper
#[derive(Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(msg.into()),
        }
    }
}

fn error_response(status: StatusCode, msg: impl Into<String>) -> Response {
    (status, Json(ApiResponse::<()>::error(msg))).into_response()
}

fn check_index(state: &AppState, index: u16) -> Result<(), Response> {
    if index == state.device_set_index {
        Ok(())
    } else {
        Err(error_response(
            StatusCode::NOT_FOUND,
            format!("There is no device set with index {}", index),
        ))
    }
}

fn run_state(state: &AppState) -> Json<Value> {
    Json(json!({ "state": state.input.engine_state() }))
}

/// Device status
#[derive(Debug, Serialize)]
pub struct DeviceStatus {
    pub description: &'static str,
    pub sample_rate: u32,
    pub center_frequency: i64,
    pub state: &'static str,
}

/// Get device status
pub async fn get_status(State(state): State<Arc<AppState>>) -> Json<ApiResponse<DeviceStatus>> {
    let input = &state.input;
    Json(ApiResponse::ok(DeviceStatus {
        description: input.device_description(),
        sample_rate: input.sample_rate(),
        center_frequency: input.center_frequency(),
        state: input.engine_state(),
    }))
}

/// Get available audio inputs
#[cfg(feature = "audio-capture")]
pub async fn get_audio_inputs() -> Json<ApiResponse<Vec<crate::audio::AudioInputInfo>>> {
    Json(ApiResponse::ok(crate::audio::list_input_devices()))
}

/// Get the full settings
pub async fn get_settings(
    State(state): State<Arc<AppState>>,
    Path(index): Path<u16>,
) -> Response {
    if let Err(resp) = check_index(&state, index) {
        return resp;
    }

    let settings = state.input.settings();
    Json(device_settings_document(fields_to_json(&settings, SettingsKey::ALL))).into_response()
}

/// Overwrite the settings present in the body; only `PUT` is forced
async fn put_patch_settings(state: &AppState, index: u16, body: Value, force: bool) -> Response {
    if let Err(resp) = check_index(state, index) {
        return resp;
    }

    if let Some(hw_type) = body.get("deviceHwType").and_then(Value::as_str) {
        if hw_type != DEVICE_HW_TYPE {
            return error_response(
                StatusCode::BAD_REQUEST,
                format!("Device type {} does not match {}", hw_type, DEVICE_HW_TYPE),
            );
        }
    }

    let Some(fields) = body.get("fcdProSettings").and_then(Value::as_object) else {
        return error_response(StatusCode::BAD_REQUEST, "Missing fcdProSettings object");
    };

    let mut settings = state.input.settings();
    let keys = match apply_json_fields(&mut settings, fields) {
        Ok(keys) => keys,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, e.to_string()),
    };
    tracing::debug!("REST settings update: {} key(s), force={}", keys.len(), force);

    let document = device_settings_document(fields_to_json(&settings, SettingsKey::ALL));
    match state.input.configure(settings, force) {
        Ok(()) => Json(document).into_response(),
        Err(e) => error_response(StatusCode::SERVICE_UNAVAILABLE, e.to_string()),
    }
}

pub async fn patch_settings(
    State(state): State<Arc<AppState>>,
    Path(index): Path<u16>,
    Json(body): Json<Value>,
) -> Response {
    put_patch_settings(&state, index, body, false).await
}

pub async fn put_settings(
    State(state): State<Arc<AppState>>,
    Path(index): Path<u16>,
    Json(body): Json<Value>,
) -> Response {
    put_patch_settings(&state, index, body, true).await
}

/// Get the acquisition state
pub async fn get_run(State(state): State<Arc<AppState>>, Path(index): Path<u16>) -> Response {
    if let Err(resp) = check_index(&state, index) {
        return resp;
    }
    run_state(&state).into_response()
}

async fn start_stop(state: &AppState, index: u16, run: bool) -> Response {
    if let Err(resp) = check_index(state, index) {
        return resp;
    }

    match state.input.start_stop(run) {
        Ok(()) => run_state(state).into_response(),
        Err(e) => error_response(StatusCode::SERVICE_UNAVAILABLE, e.to_string()),
    }
}

/// Start acquisition
pub async fn post_run(State(state): State<Arc<AppState>>, Path(index): Path<u16>) -> Response {
    start_stop(&state, index, true).await
}

/// Stop acquisition
pub async fn delete_run(State(state): State<Arc<AppState>>, Path(index): Path<u16>) -> Response {
    start_stop(&state, index, false).await
}
