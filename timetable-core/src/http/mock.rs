//! Scripted transport for tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde_json::json;
use tokio::sync::Notify;

use super::request::{ApiRequest, ApiResponse, HttpMethod};
use super::transport::{Transport, TransportError};

pub const BASE_URL: &str = "http://backend.test";

type Responder = Box<dyn Fn(&ApiRequest) -> Result<ApiResponse, TransportError> + Send + Sync>;

struct Route {
    responder: Responder,
    /// When set, the reply is held until the gate is notified.
    gate: Option<Arc<Notify>>,
}

/// A request as the transport saw it, after the client's interceptor ran.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub url: String,
    pub request: ApiRequest,
}

impl RecordedRequest {
    pub fn authorization(&self) -> Option<&str> {
        self.request.header("Authorization")
    }
}

/// Mock transport that answers from per-URL responders and records every call.
#[derive(Default)]
pub struct MockTransport {
    routes: Mutex<HashMap<(HttpMethod, String), Arc<Route>>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `method path` with the responder.
    pub fn on<F>(&self, method: HttpMethod, path: &str, responder: F)
    where
        F: Fn(&ApiRequest) -> Result<ApiResponse, TransportError> + Send + Sync + 'static,
    {
        self.insert(method, path, Box::new(responder), None);
    }

    /// Like [`MockTransport::on`], but each reply waits for the gate.
    pub fn on_gated<F>(&self, method: HttpMethod, path: &str, gate: Arc<Notify>, responder: F)
    where
        F: Fn(&ApiRequest) -> Result<ApiResponse, TransportError> + Send + Sync + 'static,
    {
        self.insert(method, path, Box::new(responder), Some(gate));
    }

    /// Answer with a fixed JSON body.
    pub fn on_json(&self, method: HttpMethod, path: &str, status: u16, body: serde_json::Value) {
        self.on(method, path, move |_| Ok(ApiResponse::json_body(status, &body)));
    }

    /// 200 only for `Authorization: Bearer <token>`, otherwise 401.
    pub fn on_protected(&self, method: HttpMethod, path: &str, token: &str) {
        let expected = format!("Bearer {token}");
        self.on(method, path, move |request| {
            if request.header("Authorization") == Some(expected.as_str()) {
                Ok(ApiResponse::json_body(200, &json!({"data": "ok"})))
            } else {
                Ok(ApiResponse::json_body(401, &json!({"message": "jwt expired"})))
            }
        });
    }

    fn insert(&self, method: HttpMethod, path: &str, responder: Responder, gate: Option<Arc<Notify>>) {
        self.routes.lock().unwrap().insert(
            (method, format!("{BASE_URL}{path}")),
            Arc::new(Route { responder, gate }),
        );
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Recorded calls to `method path`.
    pub fn calls(&self, method: HttpMethod, path: &str) -> Vec<RecordedRequest> {
        let url = format!("{BASE_URL}{path}");
        self.requests()
            .into_iter()
            .filter(|r| r.request.method == method && r.url == url)
            .collect()
    }
}

#[async_trait::async_trait]
impl Transport for MockTransport {
    async fn execute(&self, url: &str, request: &ApiRequest) -> Result<ApiResponse, TransportError> {
        self.requests.lock().unwrap().push(RecordedRequest {
            url: url.to_string(),
            request: request.clone(),
        });

        let route = self
            .routes
            .lock()
            .unwrap()
            .get(&(request.method, url.to_string()))
            .cloned();

        let Some(route) = route else {
            return Err(TransportError(format!(
                "No mock response configured for {} {}",
                request.method, url
            )));
        };

        if let Some(gate) = &route.gate {
            gate.notified().await;
        }

        (route.responder)(request)
    }
}
