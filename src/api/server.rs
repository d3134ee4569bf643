//! Axum server for the peer REST API

use axum::{routing::get, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};

use super::handlers;
use crate::config::ApiConfig;
use crate::device::InputHandle;

/// Shared state of the handlers
pub struct AppState {
    pub input: InputHandle,
    /// Device set index this instance answers for
    pub device_set_index: u16,
}

/// REST API server
pub struct ApiServer {
    config: ApiConfig,
    state: Arc<AppState>,
}

impl ApiServer {
    pub fn new(config: ApiConfig, input: InputHandle) -> Self {
        let state = Arc::new(AppState {
            input,
            device_set_index: config.device_set_index,
        });
        Self { config, state }
    }

    pub fn router(&self) -> Router {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);

        let router = Router::new()
            .route("/api/status", get(handlers::get_status))
            .route(
                "/sdrangel/deviceset/:index/device/settings",
                get(handlers::get_settings)
                    .patch(handlers::patch_settings)
                    .put(handlers::put_settings),
            )
            .route(
                "/sdrangel/deviceset/:index/device/run",
                get(handlers::get_run)
                    .post(handlers::post_run)
                    .delete(handlers::delete_run),
            );

        #[cfg(feature = "audio-capture")]
        let router = router.route("/api/audio-inputs", get(handlers::get_audio_inputs));

        router.layer(cors).with_state(self.state.clone())
    }

    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.config.bind_address, self.config.http_port)
    }

    /// Bind and serve until the task is dropped
    pub async fn run(self) -> std::io::Result<()> {
        let listener = TcpListener::bind(self.addr()).await?;
        tracing::info!("REST API listening on http://{}", listener.local_addr()?);
        self.serve(listener).await
    }

    /// Serve on an already bound listener
    pub async fn serve(self, listener: TcpListener) -> std::io::Result<()> {
        axum::serve(listener, self.router()).await
    }

    /// Start in background task
    pub fn start_background(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            if let Err(e) = self.run().await {
                tracing::error!("REST API error: {}", e);
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{AcquisitionState, FcdProInput};
    use crate::hardware::hid;
    use crate::hardware::sim::{SimulatedTuner, ToneSource};
    use crate::network::RemoteMirror;
    use crate::settings::FcdProSettings;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value};
    use std::time::{Duration, Instant};
    use tower::ServiceExt;

    fn server() -> (ApiServer, FcdProInput) {
        let (input, handle) =
            FcdProInput::builder(SimulatedTuner::new(), ToneSource::new(1_000.0, 64))
                .fifo(4, 64)
                .build();
        let config = ApiConfig {
            device_set_index: 1,
            ..ApiConfig::default()
        };
        (ApiServer::new(config, handle), input)
    }

    async fn call(router: Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = router.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    #[tokio::test]
    async fn test_get_settings_document() {
        let (server, _input) = server();
        let (status, body) =
            call(server.router(), "GET", "/sdrangel/deviceset/1/device/settings", None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["deviceHwType"], "FCDPro");
        assert_eq!(body["fcdProSettings"]["centerFrequency"], 435_000_000);
        assert_eq!(body["fcdProSettings"]["dcBlock"], 0);
    }

    #[tokio::test]
    async fn test_wrong_index_is_404() {
        let (server, _input) = server();
        let (status, body) =
            call(server.router(), "GET", "/sdrangel/deviceset/0/device/run", None).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn test_patch_overwrites_present_keys_only() {
        let (server, mut input) = server();
        let router = server.router();

        let patch = json!({
            "deviceHwType": "FCDPro",
            "tx": 0,
            "fcdProSettings": {"bandIndex": 2, "iqCorrection": 1}
        });
        let (status, body) =
            call(router.clone(), "PATCH", "/sdrangel/deviceset/1/device/settings", Some(patch)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["fcdProSettings"]["bandIndex"], 2);

        input.handle_input_messages();
        let settings = input.settings();
        assert_eq!(settings.band_index, 2);
        assert!(settings.iq_correction);
        assert_eq!(settings.center_frequency, 435_000_000);
    }

    #[tokio::test]
    async fn test_bad_documents_rejected() {
        let (server, mut input) = server();
        let router = server.router();
        let uri = "/sdrangel/deviceset/1/device/settings";

        let wrong_type = json!({"deviceHwType": "RTLSDR", "fcdProSettings": {}});
        let (status, _) = call(router.clone(), "PATCH", uri, Some(wrong_type)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let unknown = json!({"fcdProSettings": {"gain": 3}});
        let (status, _) = call(router.clone(), "PUT", uri, Some(unknown)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let missing = json!({"deviceHwType": "FCDPro"});
        let (status, _) = call(router.clone(), "PATCH", uri, Some(missing)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let out_of_range = json!({"fcdProSettings": {"rfFilterIndex": 99}});
        let (status, body) = call(router, "PATCH", uri, Some(out_of_range)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("rfFilterIndex"));

        assert_eq!(input.handle_input_messages(), 0);
    }

    #[tokio::test]
    async fn test_run_endpoints() {
        let (server, mut input) = server();
        let router = server.router();
        let uri = "/sdrangel/deviceset/1/device/run";

        let (_, body) = call(router.clone(), "GET", uri, None).await;
        assert_eq!(body["state"], "idle");

        let (status, _) = call(router.clone(), "POST", uri, None).await;
        assert_eq!(status, StatusCode::OK);
        input.handle_input_messages();
        let (_, body) = call(router.clone(), "GET", uri, None).await;
        assert_eq!(body["state"], "running");

        call(router.clone(), "DELETE", uri, None).await;
        input.handle_input_messages();
        assert_eq!(input.state(), AcquisitionState::OpenIdle);
    }

    #[tokio::test]
    async fn test_status() {
        let (server, _input) = server();
        let (status, body) = call(server.router(), "GET", "/api/status", None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["description"], "FunCube Dongle Pro");
        assert_eq!(body["data"]["sample_rate"], 96_000);
    }

    /// One instance mirroring into another over real HTTP
    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_mirror_into_peer() {
        // Peer B: REST API over its own control plane thread
        let tuner_b = SimulatedTuner::new();
        let probe_b = tuner_b.probe();
        let (input_b, handle_b) = FcdProInput::builder(tuner_b, ToneSource::new(1_000.0, 64))
            .fifo(4, 64)
            .build();
        let consumer_b = input_b.spawn().unwrap();

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let server_b = ApiServer::new(ApiConfig::default(), handle_b.clone());
        tokio::spawn(server_b.serve(listener));

        // Instance A mirrors to B
        let mirror = RemoteMirror::from_current(Duration::from_secs(2)).unwrap();
        let (mut input_a, handle_a) =
            FcdProInput::builder(SimulatedTuner::new(), ToneSource::new(1_000.0, 64))
                .fifo(4, 64)
                .mirror(mirror)
                .build();

        let mut settings = FcdProSettings::default();
        settings.remote_mirror.enabled = true;
        settings.remote_mirror.port = port;
        settings.rf_filter_index = 9;
        settings.center_frequency = 436_500_000;
        handle_a.configure(settings, false).unwrap();
        tokio::task::block_in_place(|| input_a.handle_input_messages());

        let deadline = Instant::now() + Duration::from_secs(5);
        while handle_b.center_frequency() != 436_500_000 && Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }

        // Mirror target changed: B receives every key
        let mirrored = handle_b.settings();
        assert_eq!(mirrored.center_frequency, 436_500_000);
        assert_eq!(mirrored.rf_filter_index, 9);
        assert!(!mirrored.remote_mirror.enabled);
        assert_eq!(probe_b.param_writes(hid::SET_RF_FILTER), vec![9]);

        handle_b.shutdown().unwrap();
        tokio::task::block_in_place(|| consumer_b.join().unwrap());
    }
}
