//! Remote mirror: best-effort replication to a peer control plane
//!
//! Requests are spawned onto the tokio runtime and never awaited by the
//! control path. Failures are logged and dropped; there is no retry.

use reqwest::{Client, Method};
use serde_json::Value;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use crate::error::MirrorError;
use crate::settings::wire::{device_settings_document, fields_to_json};
use crate::settings::{ChangeSet, FcdProSettings, RemoteMirrorSettings, SettingsKey};

/// `http://{address}:{port}/sdrangel/deviceset/{index}/device/settings`
pub fn settings_url(target: &RemoteMirrorSettings) -> String {
    format!(
        "http://{}:{}/sdrangel/deviceset/{}/device/settings",
        target.address, target.port, target.device_index
    )
}

/// `http://{address}:{port}/sdrangel/deviceset/{index}/device/run`
pub fn run_url(target: &RemoteMirrorSettings) -> String {
    format!(
        "http://{}:{}/sdrangel/deviceset/{}/device/run",
        target.address, target.port, target.device_index
    )
}

/// PATCH body carrying the changed keys, or every key for a full update
pub fn settings_body(settings: &FcdProSettings, changes: &ChangeSet, full: bool) -> Value {
    let fields = if full {
        fields_to_json(settings, SettingsKey::ALL)
    } else {
        fields_to_json(settings, changes.iter())
    };
    device_settings_document(fields)
}

/// HTTP client side of the mirror
#[derive(Debug, Clone)]
pub struct RemoteMirror {
    client: Client,
    runtime: Handle,
}

impl RemoteMirror {
    pub fn new(runtime: Handle, timeout: Duration) -> Result<Self, MirrorError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| MirrorError::ClientInit(e.to_string()))?;

        Ok(Self { client, runtime })
    }

    /// Bind to the runtime of the calling context
    pub fn from_current(timeout: Duration) -> Result<Self, MirrorError> {
        let runtime = Handle::try_current().map_err(|_| MirrorError::NoRuntime)?;
        Self::new(runtime, timeout)
    }

    /// Spawn a PATCH of the settings to the peer
    pub fn send_settings(
        &self,
        target: &RemoteMirrorSettings,
        settings: &FcdProSettings,
        changes: &ChangeSet,
        full: bool,
    ) -> JoinHandle<Result<(), MirrorError>> {
        let url = settings_url(target);
        let body = settings_body(settings, changes, full);
        let keys = if full { SettingsKey::ALL.len() } else { changes.len() };
        tracing::debug!("Mirror PATCH {} ({} keys)", url, keys);
        self.spawn(Method::PATCH, url, Some(body))
    }

    /// Spawn a POST (start) or DELETE (stop) of the peer's acquisition
    pub fn send_start_stop(
        &self,
        target: &RemoteMirrorSettings,
        start: bool,
    ) -> JoinHandle<Result<(), MirrorError>> {
        let method = if start { Method::POST } else { Method::DELETE };
        let url = run_url(target);
        tracing::debug!("Mirror {} {}", method, url);
        self.spawn(method, url, None)
    }

    fn spawn(
        &self,
        method: Method,
        url: String,
        body: Option<Value>,
    ) -> JoinHandle<Result<(), MirrorError>> {
        let client = self.client.clone();
        self.runtime.spawn(async move {
            let result = send(&client, method.clone(), &url, body).await;
            if let Err(e) = &result {
                tracing::warn!("Mirror {} failed: {}", method, e);
            }
            result
        })
    }
}

async fn send(
    client: &Client,
    method: Method,
    url: &str,
    body: Option<Value>,
) -> Result<(), MirrorError> {
    let mut request = client.request(method, url);
    if let Some(body) = body {
        request = request.json(&body);
    }

    let response = request.send().await.map_err(|e| MirrorError::RequestFailed {
        url: url.to_string(),
        reason: e.to_string(),
    })?;

    let status = response.status();
    if !status.is_success() {
        return Err(MirrorError::Status {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::State;
    use axum::http::{Method as HttpMethod, StatusCode};
    use axum::routing::any;
    use axum::{Json, Router};
    use parking_lot::Mutex;
    use std::sync::Arc;

    type Seen = Arc<Mutex<Vec<(String, String, Option<Value>)>>>;

    async fn record(
        State(seen): State<Seen>,
        method: HttpMethod,
        uri: axum::http::Uri,
        body: Option<Json<Value>>,
    ) -> StatusCode {
        seen.lock()
            .push((method.to_string(), uri.path().to_string(), body.map(|Json(v)| v)));
        StatusCode::OK
    }

    async fn peer() -> (RemoteMirrorSettings, Seen) {
        let seen: Seen = Arc::new(Mutex::new(Vec::new()));
        let app = Router::new()
            .route("/*path", any(record))
            .with_state(seen.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let target = RemoteMirrorSettings {
            enabled: true,
            address: "127.0.0.1".into(),
            port,
            device_index: 2,
        };
        (target, seen)
    }

    #[test]
    fn test_urls() {
        let target = RemoteMirrorSettings {
            enabled: true,
            address: "10.0.0.5".into(),
            port: 8091,
            device_index: 1,
        };
        assert_eq!(
            settings_url(&target),
            "http://10.0.0.5:8091/sdrangel/deviceset/1/device/settings"
        );
        assert_eq!(run_url(&target), "http://10.0.0.5:8091/sdrangel/deviceset/1/device/run");
    }

    #[test]
    fn test_body_only_changed_keys() {
        let settings = FcdProSettings {
            dc_block: true,
            ..Default::default()
        };
        let changes: ChangeSet = [SettingsKey::DcBlock, SettingsKey::CenterFrequency]
            .into_iter()
            .collect();

        let body = settings_body(&settings, &changes, false);
        assert_eq!(body["deviceHwType"], "FCDPro");
        assert_eq!(body["tx"], 0);
        let fields = body["fcdProSettings"].as_object().unwrap();
        assert_eq!(fields.len(), 2);
        assert_eq!(fields["dcBlock"], 1);
        assert_eq!(fields["centerFrequency"], 435_000_000);

        let full = settings_body(&settings, &changes, true);
        assert_eq!(
            full["fcdProSettings"].as_object().unwrap().len(),
            SettingsKey::ALL.len()
        );
    }

    #[tokio::test]
    async fn test_patch_reaches_peer() {
        let (target, seen) = peer().await;
        let mirror = RemoteMirror::from_current(Duration::from_secs(2)).unwrap();

        let changes: ChangeSet = [SettingsKey::BandIndex].into_iter().collect();
        let settings = FcdProSettings {
            band_index: 3,
            ..Default::default()
        };
        mirror
            .send_settings(&target, &settings, &changes, false)
            .await
            .unwrap()
            .unwrap();

        let seen = seen.lock();
        assert_eq!(seen.len(), 1);
        let (method, path, body) = &seen[0];
        assert_eq!(method, "PATCH");
        assert_eq!(path, "/sdrangel/deviceset/2/device/settings");
        assert_eq!(body.as_ref().unwrap()["fcdProSettings"]["bandIndex"], 3);
    }

    #[tokio::test]
    async fn test_run_methods() {
        let (target, seen) = peer().await;
        let mirror = RemoteMirror::from_current(Duration::from_secs(2)).unwrap();

        mirror.send_start_stop(&target, true).await.unwrap().unwrap();
        mirror.send_start_stop(&target, false).await.unwrap().unwrap();

        let seen = seen.lock();
        let methods: Vec<_> = seen.iter().map(|(m, p, _)| (m.as_str(), p.as_str())).collect();
        assert_eq!(
            methods,
            vec![
                ("POST", "/sdrangel/deviceset/2/device/run"),
                ("DELETE", "/sdrangel/deviceset/2/device/run")
            ]
        );
    }

    #[tokio::test]
    async fn test_unreachable_peer_is_an_error() {
        let target = RemoteMirrorSettings {
            enabled: true,
            address: "127.0.0.1".into(),
            // Nothing listens on the discard port
            port: 9,
            device_index: 0,
        };
        let mirror = RemoteMirror::from_current(Duration::from_millis(500)).unwrap();

        let result = mirror.send_start_stop(&target, true).await.unwrap();
        assert!(matches!(result, Err(MirrorError::RequestFailed { .. })));
    }

    #[test]
    fn test_no_runtime() {
        assert!(matches!(
            RemoteMirror::from_current(Duration::from_secs(1)),
            Err(MirrorError::NoRuntime)
        ));
    }
}
